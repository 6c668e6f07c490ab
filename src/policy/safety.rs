//! Step-wise safety policy
//!
//! Given the latest telemetry, decides whether to lower, raise or hold the
//! operating point. Any ceiling breach forces a decrease, voltage first; a cool
//! device is sped up, frequency first. Candidates are always clamped into the
//! profile bounds and, when enforced, snapped onto the safe pairing table.

use std::fmt;

use crate::domain::{GlobalSettings, OperatingPoint, TelemetrySample, TuningProfile};
use crate::policy::pairing::SafePairingTable;

/// Which way a proposal moves the operating point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

/// A ceiling that the latest sample hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breach {
    Temperature,
    Power,
    VrTemperature,
}

impl fmt::Display for Breach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breach::Temperature => f.write_str("temperature"),
            Breach::Power => f.write_str("power"),
            Breach::VrTemperature => f.write_str("VR temperature"),
        }
    }
}

/// Outcome of one policy evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    /// Hold the current operating point
    NoChange,
    /// Move to `point`
    Adjust {
        point: OperatingPoint,
        direction: Direction,
        breaches: Vec<Breach>,
    },
    /// Ceilings are breached but no lower permitted point exists
    Pinned { breaches: Vec<Breach> },
}

impl Proposal {
    /// Target point, if the proposal changes anything
    pub fn point(&self) -> Option<OperatingPoint> {
        match self {
            Proposal::Adjust { point, .. } => Some(*point),
            _ => None,
        }
    }
}

/// The tuning heuristic. Stateless; see `propose`.
pub struct SafetyPolicy;

impl SafetyPolicy {
    /// Compute the next operating point for a device
    pub fn propose(
        current: &TelemetrySample,
        profile: &TuningProfile,
        settings: &GlobalSettings,
        table: Option<&SafePairingTable>,
    ) -> Proposal {
        let point = current.operating_point();
        let breaches = Self::breaches(current, profile, settings);

        // Decrease wins at exact boundaries
        let (candidate, direction) = if !breaches.is_empty() {
            (Self::step_down(point, profile, settings), Direction::Decrease)
        } else if current.temp <= settings.default_target_temp - settings.temp_tolerance
            && Self::has_headroom(point, profile)
        {
            (Self::step_up(point, profile, settings), Direction::Increase)
        } else {
            return Proposal::NoChange;
        };

        let mut candidate = profile.clamp(candidate);

        if settings.enforce_safe_pairing {
            match table.and_then(|t| t.snap(candidate, direction, profile)) {
                Some(snapped) => candidate = snapped,
                None => return Self::hold(direction, breaches),
            }
        }

        if candidate == point {
            return Self::hold(direction, breaches);
        }

        Proposal::Adjust {
            point: candidate,
            direction,
            breaches,
        }
    }

    /// Ceilings hit by this sample
    pub fn breaches(current: &TelemetrySample, profile: &TuningProfile, settings: &GlobalSettings) -> Vec<Breach> {
        let mut breaches = Vec::new();
        if current.temp >= profile.max_temp - settings.temp_tolerance {
            breaches.push(Breach::Temperature);
        }
        if current.power >= profile.max_watts {
            breaches.push(Breach::Power);
        }
        if current.vr_temp >= profile.max_vr_temp {
            breaches.push(Breach::VrTemperature);
        }
        breaches
    }

    fn hold(direction: Direction, breaches: Vec<Breach>) -> Proposal {
        match direction {
            Direction::Decrease => Proposal::Pinned { breaches },
            Direction::Increase => Proposal::NoChange,
        }
    }

    /// Voltage first; frequency only once voltage is at its floor
    fn step_down(point: OperatingPoint, profile: &TuningProfile, settings: &GlobalSettings) -> OperatingPoint {
        if point.core_voltage > profile.min_volt {
            OperatingPoint::new(point.frequency, point.core_voltage.saturating_sub(settings.voltage_step))
        } else {
            OperatingPoint::new(point.frequency.saturating_sub(settings.frequency_step), point.core_voltage)
        }
    }

    /// Frequency first; voltage only once frequency is at its ceiling
    fn step_up(point: OperatingPoint, profile: &TuningProfile, settings: &GlobalSettings) -> OperatingPoint {
        if point.frequency < profile.max_freq {
            OperatingPoint::new(point.frequency.saturating_add(settings.frequency_step), point.core_voltage)
        } else {
            OperatingPoint::new(point.frequency, point.core_voltage.saturating_add(settings.voltage_step))
        }
    }

    fn has_headroom(point: OperatingPoint, profile: &TuningProfile) -> bool {
        point.frequency < profile.max_freq || point.core_voltage < profile.max_volt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> TuningProfile {
        TuningProfile {
            min_freq: 400,
            max_freq: 600,
            start_freq: Some(500),
            min_volt: 1100,
            max_volt: 1200,
            start_volt: Some(1150),
            max_temp: 60.0,
            max_watts: 15.0,
            max_vr_temp: 85.0,
        }
    }

    fn settings() -> GlobalSettings {
        GlobalSettings {
            default_target_temp: 55.0,
            temp_tolerance: 2.0,
            frequency_step: 25,
            voltage_step: 10,
            ..Default::default()
        }
    }

    fn sample(temp: f64, freq: u32, volt: u32) -> TelemetrySample {
        TelemetrySample::at(freq, volt).with_temp(temp).with_power(10.0).with_vr_temp(50.0)
    }

    #[test]
    fn test_hot_device_lowers_voltage_first() {
        let p = SafetyPolicy::propose(&sample(63.0, 500, 1150), &profile(), &settings(), None);
        assert_eq!(p.point(), Some(OperatingPoint::new(500, 1140)));
        assert!(matches!(p, Proposal::Adjust { direction: Direction::Decrease, .. }));
    }

    #[test]
    fn test_cool_device_raises_frequency_first() {
        let p = SafetyPolicy::propose(&sample(50.0, 500, 1150), &profile(), &settings(), None);
        assert_eq!(p.point(), Some(OperatingPoint::new(525, 1150)));
        assert!(matches!(p, Proposal::Adjust { direction: Direction::Increase, .. }));
    }

    #[test]
    fn test_inside_band_holds() {
        let p = SafetyPolicy::propose(&sample(56.0, 500, 1150), &profile(), &settings(), None);
        assert_eq!(p, Proposal::NoChange);
    }

    #[test]
    fn test_exact_ceiling_boundary_decreases() {
        // 58 == max_temp - tolerance
        let p = SafetyPolicy::propose(&sample(58.0, 500, 1150), &profile(), &settings(), None);
        assert_eq!(p.point(), Some(OperatingPoint::new(500, 1140)));
    }

    #[test]
    fn test_exact_target_boundary_increases() {
        // 53 == target - tolerance
        let p = SafetyPolicy::propose(&sample(53.0, 500, 1150), &profile(), &settings(), None);
        assert_eq!(p.point(), Some(OperatingPoint::new(525, 1150)));
    }

    #[test]
    fn test_power_breach_forces_decrease_even_when_cool() {
        let s = sample(45.0, 500, 1150).with_power(15.0);
        let p = SafetyPolicy::propose(&s, &profile(), &settings(), None);
        match p {
            Proposal::Adjust { point, direction, breaches } => {
                assert_eq!(point, OperatingPoint::new(500, 1140));
                assert_eq!(direction, Direction::Decrease);
                assert_eq!(breaches, vec![Breach::Power]);
            }
            other => panic!("expected decrease, got {:?}", other),
        }
    }

    #[test]
    fn test_vr_breach_forces_decrease() {
        let s = sample(45.0, 500, 1150).with_vr_temp(90.0);
        let p = SafetyPolicy::propose(&s, &profile(), &settings(), None);
        assert_eq!(p.point(), Some(OperatingPoint::new(500, 1140)));
    }

    #[test]
    fn test_decrease_at_voltage_floor_lowers_frequency() {
        let p = SafetyPolicy::propose(&sample(63.0, 500, 1100), &profile(), &settings(), None);
        assert_eq!(p.point(), Some(OperatingPoint::new(475, 1100)));
    }

    #[test]
    fn test_increase_at_frequency_ceiling_raises_voltage() {
        let p = SafetyPolicy::propose(&sample(50.0, 600, 1150), &profile(), &settings(), None);
        assert_eq!(p.point(), Some(OperatingPoint::new(600, 1160)));
    }

    #[test]
    fn test_no_headroom_holds() {
        let p = SafetyPolicy::propose(&sample(40.0, 600, 1200), &profile(), &settings(), None);
        assert_eq!(p, Proposal::NoChange);
    }

    #[test]
    fn test_hot_at_minimum_is_pinned() {
        let p = SafetyPolicy::propose(&sample(70.0, 400, 1100), &profile(), &settings(), None);
        assert_eq!(p, Proposal::Pinned { breaches: vec![Breach::Temperature] });
    }

    #[test]
    fn test_candidate_is_clamped() {
        // 590 + 25 would overshoot max_freq
        let p = SafetyPolicy::propose(&sample(50.0, 590, 1150), &profile(), &settings(), None);
        assert_eq!(p.point(), Some(OperatingPoint::new(600, 1150)));

        // Device reports a voltage below the floor; the decrease lands back in bounds
        let p = SafetyPolicy::propose(&sample(63.0, 500, 1095), &profile(), &settings(), None);
        assert_eq!(p.point(), Some(OperatingPoint::new(475, 1100)));
    }

    #[test]
    fn test_proposals_stay_in_bounds_across_grid() {
        let profile = profile();
        for temp in [30.0, 53.0, 56.0, 58.0, 75.0] {
            for freq in (350..=650).step_by(35) {
                for volt in (1050..=1250).step_by(15) {
                    if let Some(point) = SafetyPolicy::propose(&sample(temp, freq, volt), &profile, &settings(), None).point() {
                        assert!(profile.contains(point), "{} out of bounds", point);
                    }
                }
            }
        }
    }

    #[test]
    fn test_safe_pairing_without_floor_entry_holds() {
        let table = SafePairingTable::new(vec![OperatingPoint::new(550, 1175), OperatingPoint::new(600, 1200)]).unwrap();
        let settings = GlobalSettings {
            enforce_safe_pairing: true,
            ..settings()
        };
        let p = SafetyPolicy::propose(&sample(50.0, 500, 1150), &profile(), &settings, Some(&table));
        assert_eq!(p, Proposal::NoChange);
    }

    #[test]
    fn test_safe_pairing_missing_table_holds() {
        let settings = GlobalSettings {
            enforce_safe_pairing: true,
            ..settings()
        };
        let p = SafetyPolicy::propose(&sample(50.0, 500, 1150), &profile(), &settings, None);
        assert_eq!(p, Proposal::NoChange);
    }

    #[test]
    fn test_safe_pairing_snaps_onto_table() {
        let table = SafePairingTable::new(vec![
            OperatingPoint::new(450, 1100),
            OperatingPoint::new(500, 1150),
            OperatingPoint::new(525, 1160),
        ])
        .unwrap();
        let settings = GlobalSettings {
            enforce_safe_pairing: true,
            ..settings()
        };

        let up = SafetyPolicy::propose(&sample(50.0, 500, 1150), &profile(), &settings, Some(&table));
        assert_eq!(up.point(), Some(OperatingPoint::new(525, 1160)));

        let down = SafetyPolicy::propose(&sample(63.0, 500, 1150), &profile(), &settings, Some(&table));
        assert_eq!(down.point(), Some(OperatingPoint::new(450, 1100)));
        assert!(table.contains(down.point().unwrap()));
    }
}
