use rand::Rng;

use crate::error::ArmError;
use crate::kinematic_traits::{ServoAngles, KINEMATIC_SERVOS};

const SERVO_NAMES: [&str; 6] = [
    "base rotate", "shoulder", "elbow", "wrist pitch", "wrist rotate", "gripper",
];

/// Servo ranges in degrees. Unlike joint bounds of the chain, these are physical
/// limits of the actuators and never wrap around.
#[derive(Debug, Clone, PartialEq)]
pub struct ServoLimits {
    pub from: [f64; 6],
    pub to: [f64; 6],
}

impl ServoLimits {
    pub fn new(limits: &[(f64, f64); 6]) -> Self {
        ServoLimits {
            from: limits.map(|(lo, hi)| lo.min(hi)),
            to: limits.map(|(lo, hi)| lo.max(hi)),
        }
    }

    /// Clamp the five kinematic servos into range. The gripper is left alone.
    pub fn clamp(&self, angles: &mut ServoAngles) {
        for i in 0..KINEMATIC_SERVOS {
            angles[i] = angles[i].clamp(self.from[i], self.to[i]);
        }
    }

    /// Clamped copy of all six angles, gripper included.
    pub fn clamped_all(&self, angles: &ServoAngles) -> ServoAngles {
        std::array::from_fn(|i| angles[i].clamp(self.from[i], self.to[i]))
    }

    pub fn compliant(&self, angles: &ServoAngles) -> bool {
        (0..6).all(|i| angles[i] >= self.from[i] && angles[i] <= self.to[i])
    }

    /// Like `compliant` but names the first offending servo.
    pub fn validate(&self, angles: &ServoAngles) -> Result<(), ArmError> {
        for i in 0..6 {
            if !angles[i].is_finite() || angles[i] < self.from[i] || angles[i] > self.to[i] {
                return Err(ArmError::Validation(format!(
                    "{} servo angle {:.1} outside [{}, {}]",
                    SERVO_NAMES[i], angles[i], self.from[i], self.to[i]
                )));
            }
        }
        Ok(())
    }

    /// Random angles within limits, uniformly distributed per servo.
    pub fn random_angles<R: Rng>(&self, rng: &mut R) -> ServoAngles {
        std::array::from_fn(|i| {
            if self.from[i] == self.to[i] {
                self.from[i]
            } else {
                rng.gen_range(self.from[i]..=self.to[i])
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ArmParameters;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn limits() -> ServoLimits {
        ServoLimits::new(&ArmParameters::wearm().servo_limits)
    }

    #[test]
    fn test_clamp_keeps_gripper() {
        let mut angles = [300.0, 10.0, 130.0, 260.0, 0.0, 250.0];
        limits().clamp(&mut angles);
        assert_eq!(angles, [270.0, 50.0, 130.0, 210.0, 40.0, 250.0]);
    }

    #[test]
    fn test_validate_names_servo() {
        let err = limits().validate(&[190.0, 30.0, 130.0, 130.0, 130.0, 130.0]).unwrap_err();
        assert!(err.to_string().contains("shoulder"), "{}", err);
        assert!(limits().validate(&[190.0, 130.0, 130.0, 130.0, 130.0, 130.0]).is_ok());
        assert!(limits().validate(&[f64::NAN, 130.0, 130.0, 130.0, 130.0, 130.0]).is_err());
    }

    #[test]
    fn test_swapped_limits() {
        let l = ServoLimits::new(&[(10.0, 0.0); 6]);
        assert!(l.compliant(&[5.0; 6]));
    }

    #[test]
    fn test_random_within_limits() {
        let l = limits();
        let mut rng = StdRng::from_seed([7u8; 32]);
        for _ in 0..100 {
            assert!(l.compliant(&l.random_angles(&mut rng)));
        }
    }
}
