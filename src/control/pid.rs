//! PID controller for room heating
//!
//! Produces a bounded actuation value from a target/measured temperature pair
//! and the time elapsed since the previous update. The heating decision only
//! looks at the sign of the output; the clamp keeps the integral term from
//! winding up past the actuation range while a room is cold for a long time.
//!
//! The integral only builds while the room is below its set point and is
//! cleared once the set point is reached, so heat demand accumulated during a
//! cold spell never keeps a warm room heating.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_KD, DEFAULT_KI, DEFAULT_KP, PID_OUTPUT_MAX, PID_OUTPUT_MIN};

/// Controller gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            ki: DEFAULT_KI,
            kd: DEFAULT_KD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    setpoint: f64,
    /// Already scaled by `ki`
    integral: f64,
    prev_measurement: Option<f64>,
    output_min: f64,
    output_max: f64,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            setpoint: 0.0,
            integral: 0.0,
            prev_measurement: None,
            output_min: PID_OUTPUT_MIN,
            output_max: PID_OUTPUT_MAX,
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn set_target(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    pub fn target(&self) -> f64 {
        self.setpoint
    }

    /// Compute the output for `measurement` after `elapsed`
    pub fn update(&mut self, measurement: f64, elapsed: Duration) -> f64 {
        let dt = elapsed.as_secs_f64();
        let error = self.setpoint - measurement;

        // Integral, clamped to the output range; spent at the set point
        self.integral = if error > 0.0 {
            (self.integral + error * dt * self.gains.ki).clamp(self.output_min, self.output_max)
        } else {
            0.0
        };

        // Derivative on measurement, so setpoint changes do not kick
        let derivative = match self.prev_measurement {
            Some(prev) if dt > 0.0 => -(measurement - prev) / dt,
            _ => 0.0,
        };
        self.prev_measurement = Some(measurement);

        let output = self.gains.kp * error + self.integral + self.gains.kd * derivative;
        output.clamp(self.output_min, self.output_max)
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_measurement = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_response() {
        let mut pid = PidController::new(PidGains::default());
        pid.set_target(20.0);
        assert_eq!(pid.update(15.0, Duration::ZERO), 5.0);
    }

    #[test]
    fn test_output_clamped_to_range() {
        let mut pid = PidController::new(PidGains::default());
        pid.set_target(20.0);
        assert_eq!(pid.update(25.0, Duration::ZERO), 0.0);
        assert_eq!(pid.update(-500.0, Duration::ZERO), 100.0);
    }

    #[test]
    fn test_integral_does_not_wind_up() {
        let mut pid = PidController::new(PidGains::default());
        pid.set_target(20.0);
        for _ in 0..100 {
            pid.update(10.0, Duration::from_secs(60));
        }
        assert_eq!(pid.integral, 100.0);
        assert_eq!(pid.update(10.0, Duration::from_secs(60)), 100.0);
    }

    #[test]
    fn test_integral_cleared_at_set_point() {
        let mut pid = PidController::new(PidGains::default());
        pid.set_target(20.0);
        pid.update(15.0, Duration::from_secs(60));
        pid.update(15.0, Duration::from_secs(60));
        assert_eq!(pid.integral, 100.0);

        assert_eq!(pid.update(20.0, Duration::from_secs(60)), 0.0);
        assert_eq!(pid.integral, 0.0);
        assert_eq!(pid.update(20.5, Duration::from_secs(60)), 0.0);

        // Demand rebuilds from zero once the room cools again
        assert_eq!(pid.update(19.0, Duration::from_secs(2)), 2.0);
    }

    #[test]
    fn test_integral_accumulates_over_time() {
        let mut pid = PidController::new(PidGains {
            kp: 0.0,
            ki: 0.5,
            kd: 0.0,
        });
        pid.set_target(20.0);
        let first = pid.update(19.0, Duration::from_secs(2));
        let second = pid.update(19.0, Duration::from_secs(2));
        assert_eq!(first, 1.0);
        assert_eq!(second, 2.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut pid = PidController::new(PidGains::default());
        pid.set_target(20.0);
        pid.update(18.0, Duration::from_secs(10));
        pid.reset();
        assert_eq!(pid.update(20.0, Duration::ZERO), 0.0);
    }
}
