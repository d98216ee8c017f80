use tracing::{debug, warn};

use crate::chain::KinematicChain;
use crate::constraints::ServoLimits;
use crate::error::ArmError;
use crate::kinematic_traits::{Kinematics, Position, ServoAngles, Solution, GRIPPER};
use crate::parameters::ArmParameters;
use crate::solver::{IkSolver, LevenbergMarquardt};
use crate::utils::{max_angle_change, mm_to_position, position_to_mm};

/// Refinement passes of the inverse kinematics.
pub const MAX_IK_ITERATIONS: usize = 10;

/// Change of servo angles (degrees) between passes that counts as converged.
pub const IK_TOLERANCE_DEG: f64 = 1e-3;

/// Remaining error above which the result is logged as inaccurate.
const ACCURACY_WARNING: f64 = 0.005;

/// Kinematics of the arm: the chain, servo calibration and limits, and the numeric
/// solver used for each inverse kinematics pass.
pub struct ArmKinematics<S: IkSolver = LevenbergMarquardt> {
    parameters: ArmParameters,
    chain: KinematicChain,
    limits: ServoLimits,
    solver: S,
}

impl ArmKinematics<LevenbergMarquardt> {
    /// Creates a new `ArmKinematics` instance with the given parameters.
    pub fn new(parameters: ArmParameters) -> Self {
        Self::with_solver(parameters, LevenbergMarquardt::default())
    }
}

impl<S: IkSolver> ArmKinematics<S> {
    pub fn with_solver(parameters: ArmParameters, solver: S) -> Self {
        let chain = KinematicChain::new(&parameters);
        let limits = ServoLimits::new(&parameters.servo_limits);
        ArmKinematics { parameters, chain, limits, solver }
    }

    pub fn parameters(&self) -> &ArmParameters {
        &self.parameters
    }

    pub fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    pub fn limits(&self) -> &ServoLimits {
        &self.limits
    }

    /// Forward kinematics with the result in millimeters.
    pub fn forward_mm(&self, angles: &ServoAngles) -> [f64; 3] {
        position_to_mm(&self.forward(angles))
    }

    /// Inverse kinematics for the target given in millimeters.
    pub fn inverse_mm(&self, target_mm: &[f64; 3], current: &ServoAngles) -> Result<Solution, ArmError> {
        self.inverse(&mm_to_position(target_mm), current)
    }
}

impl<S: IkSolver> Kinematics for ArmKinematics<S> {
    fn forward(&self, angles: &ServoAngles) -> Position {
        self.chain.position(&self.chain.servo_to_chain(angles))
    }

    /// Runs up to `MAX_IK_ITERATIONS` solver passes, each seeded with the clamped result
    /// of the previous one. Clamping may make a pass worse than an earlier one, so the
    /// best pass is returned rather than the last.
    fn inverse(&self, target: &Position, current: &ServoAngles) -> Result<Solution, ArmError> {
        let mut seed = self.chain.servo_to_chain(current);
        let mut best: Option<Solution> = None;
        let mut previous: Option<ServoAngles> = None;

        for iteration in 1..=MAX_IK_ITERATIONS {
            let chain_angles = self.solver.solve(&self.chain, target, &seed)?;
            let mut angles = self.chain.chain_to_servo(&chain_angles, current[GRIPPER]);
            self.limits.clamp(&mut angles);
            let error = (self.forward(&angles) - target).norm();

            if best.is_none_or(|b| error < b.error) {
                best = Some(Solution { angles, error, iterations: iteration });
            }

            let converged = previous
                .is_some_and(|p| max_angle_change(&angles, &p) <= IK_TOLERANCE_DEG);
            if converged {
                debug!("IK converged after {} passes", iteration);
                break;
            }
            previous = Some(angles);
            seed = self.chain.servo_to_chain(&angles);
        }

        let solution = best.ok_or_else(|| ArmError::Unreachable("no solver pass was run".into()))?;
        if solution.error > ACCURACY_WARNING {
            warn!("IK for [{:.3}, {:.3}, {:.3}] leaves {:.1} mm error",
                  target.x, target.y, target.z, solution.error * 1000.0);
        }
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematic_traits::{ChainAngles, HOME_ANGLES};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn robot() -> ArmKinematics {
        ArmKinematics::new(ArmParameters::wearm())
    }

    #[test]
    fn test_forward_home() {
        let p = robot().forward(&HOME_ANGLES);
        assert!((p - Position::new(0.0, 0.0, 0.446)).norm() < 1e-9);
    }

    #[test]
    fn test_gripper_is_carried_over() {
        let mut current = HOME_ANGLES;
        current[GRIPPER] = 175.0;
        let solution = robot().inverse(&Position::new(0.15, 0.0, 0.20), &current).unwrap();
        assert_eq!(solution.angles[GRIPPER], 175.0);
    }

    #[test]
    fn test_mm_boundary() {
        let robot = robot();
        let solution = robot.inverse_mm(&[150.0, 0.0, 200.0], &HOME_ANGLES).unwrap();
        let reached = robot.forward_mm(&solution.angles);
        assert!((reached[0] - 150.0).abs() < 1.0);
        assert!((reached[2] - 200.0).abs() < 1.0);
    }

    /// Solver that fails on demand
    struct FailingSolver;

    impl IkSolver for FailingSolver {
        fn solve(&self, _chain: &KinematicChain, _target: &Position, _seed: &ChainAngles)
                 -> Result<ChainAngles, ArmError> {
            Err(ArmError::Unreachable("degenerate".into()))
        }
    }

    #[test]
    fn test_solver_failure_propagates() {
        let robot = ArmKinematics::with_solver(ArmParameters::wearm(), FailingSolver);
        let result = robot.inverse(&Position::new(0.15, 0.0, 0.20), &HOME_ANGLES);
        assert!(matches!(result, Err(ArmError::Unreachable(_))));
    }

    /// Solver returning the same answer every time
    struct FixedSolver {
        calls: AtomicUsize,
    }

    impl IkSolver for FixedSolver {
        fn solve(&self, _chain: &KinematicChain, _target: &Position, _seed: &ChainAngles)
                 -> Result<ChainAngles, ArmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok([0.0; 10])
        }
    }

    #[test]
    fn test_stops_when_converged() {
        let robot = ArmKinematics::with_solver(
            ArmParameters::wearm(), FixedSolver { calls: AtomicUsize::new(0) });
        let solution = robot.inverse(&Position::new(0.0, 0.0, 0.446), &HOME_ANGLES).unwrap();
        // Second pass repeats the first one, that is convergence
        assert_eq!(robot.solver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(solution.iterations, 1);
        assert!(solution.error < 1e-9);
    }
}
