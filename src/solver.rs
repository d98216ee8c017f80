//! Single numeric inverse kinematics pass over the chain.

extern crate nalgebra as na;

use std::f64::consts::PI;

use na::{Matrix5, Vector5};
use tracing::debug;

use crate::chain::{KinematicChain, ACTUATED};
use crate::error::ArmError;
use crate::jacobian::position_jacobian;
use crate::kinematic_traits::{ChainAngles, Position};
use crate::utils::is_valid;

/// One numeric inverse kinematics pass: chain angles that bring the tip to `target`,
/// starting the search from `seed`. Only position is solved, orientation is free.
/// The result must respect the joint bounds of the chain.
pub trait IkSolver: Send + Sync {
    fn solve(&self, chain: &KinematicChain, target: &Position, seed: &ChainAngles)
             -> Result<ChainAngles, ArmError>;
}

/// Damped least squares (Levenberg - Marquardt) on the tip position, with joint bounds
/// enforced by projection after every step.
///
/// The straight up pose of the arm is singular for the vertical direction and for the
/// base rotation, and the base joint cannot turn to every bearing. When the search
/// cannot make progress but the target is not reached, the best pose found so far is
/// restarted from a few fixed alternatives: bent forward, and turned round with the arm
/// leaning backwards.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    /// Step budget of the pass, restarts included.
    pub max_iterations: usize,

    /// Distance to the target (meters) that counts as reached.
    pub tolerance: f64,

    /// Damping at the start and after every restart.
    pub initial_damping: f64,

    /// Damping above which the search is considered stuck.
    pub max_damping: f64,

    /// Additional forward bend (radians) of the pitch joints on restart.
    pub restart_bend: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-7,
            initial_damping: 1e-3,
            max_damping: 1e6,
            restart_bend: 0.3,
        }
    }
}

/// Pitch joints (shoulder, elbow, wrist pitch) in chain indexing.
const PITCH: [usize; 3] = [2, 4, 6];

const RESTARTS: usize = 3;

impl LevenbergMarquardt {
    /// Alternative starting point number `attempt`, derived from `q`.
    fn restart(&self, chain: &KinematicChain, q: &ChainAngles, attempt: usize) -> ChainAngles {
        let mut c = *q;
        match attempt {
            0 => {
                for i in PITCH {
                    c[i] += self.restart_bend;
                }
            }
            _ => {
                // Face the opposite way, lean the arm backwards
                c[0] += if c[0] > -PI / 2.0 { -PI } else { PI };
                for i in PITCH {
                    c[i] = -c[i];
                    if attempt > 1 {
                        c[i] -= self.restart_bend;
                    }
                }
            }
        }
        chain.clamp_to_bounds(&mut c);
        c
    }
}

impl IkSolver for LevenbergMarquardt {
    fn solve(&self, chain: &KinematicChain, target: &Position, seed: &ChainAngles)
             -> Result<ChainAngles, ArmError> {
        if !is_valid(target.as_slice()) {
            return Err(ArmError::Unreachable(format!("target is not finite: {:?}", target)));
        }
        if !is_valid(seed) {
            return Err(ArmError::Unreachable("initial joint angles are not finite".into()));
        }

        let mut q = *seed;
        chain.clamp_to_bounds(&mut q);
        let mut residual = target - chain.position(&q);
        let mut cost = residual.norm_squared();
        let mut best = (cost, q);
        let mut damping = self.initial_damping;
        let mut restarts = 0;

        for _ in 0..self.max_iterations {
            if cost.sqrt() < self.tolerance {
                break;
            }
            let jacobian = position_jacobian(chain, &q);
            let gradient: Vector5<f64> = jacobian.transpose() * residual;

            if gradient.norm() < 1e-12 || damping > self.max_damping {
                if cost < best.0 {
                    best = (cost, q);
                }
                if restarts >= RESTARTS {
                    break;
                }
                debug!("IK stalled at {:.4} m, restart {}", cost.sqrt(), restarts);
                q = self.restart(chain, &best.1, restarts);
                restarts += 1;
                residual = target - chain.position(&q);
                cost = residual.norm_squared();
                damping = self.initial_damping;
                continue;
            }

            let normal = jacobian.transpose() * jacobian + Matrix5::identity() * damping;
            let step = match normal.cholesky() {
                Some(cholesky) => cholesky.solve(&gradient),
                None => normal.lu().solve(&gradient).ok_or_else(|| {
                    ArmError::Unreachable("normal equations are singular".into())
                })?,
            };

            let mut candidate = q;
            for (k, &i) in ACTUATED.iter().enumerate() {
                candidate[i] += step[k];
            }
            chain.clamp_to_bounds(&mut candidate);
            let candidate_residual = target - chain.position(&candidate);
            let candidate_cost = candidate_residual.norm_squared();

            if candidate_cost < cost {
                q = candidate;
                residual = candidate_residual;
                cost = candidate_cost;
                damping = (damping * 0.5).max(1e-9);
            } else {
                damping *= 4.0;
            }
        }

        if cost < best.0 {
            best = (cost, q);
        }
        if !is_valid(&best.1) {
            return Err(ArmError::Unreachable("solution is not finite".into()));
        }
        Ok(best.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ArmParameters;

    fn chain() -> KinematicChain {
        KinematicChain::new(&ArmParameters::wearm())
    }

    #[test]
    fn test_reaches_point_in_front() {
        let chain = chain();
        let target = Position::new(0.15, 0.0, 0.20);
        let q = LevenbergMarquardt::default().solve(&chain, &target, &[0.0; 10]).unwrap();
        assert!((chain.position(&q) - target).norm() < 1e-6);
    }

    #[test]
    fn test_turns_round_for_sideways_point() {
        // The base can not turn to +Y directly, the arm must lean back from the other side
        let chain = chain();
        let target = Position::new(0.0, 0.15, 0.05);
        let q = LevenbergMarquardt::default().solve(&chain, &target, &[0.0; 10]).unwrap();
        assert!((chain.position(&q) - target).norm() < 1e-4, "{:?}", chain.position(&q));
    }

    #[test]
    fn test_respects_bounds() {
        let chain = chain();
        // Far out of reach, the arm stretches towards the target
        let target = Position::new(1.0, 0.0, 0.1);
        let q = LevenbergMarquardt::default().solve(&chain, &target, &[0.0; 10]).unwrap();
        for &i in ACTUATED.iter() {
            let (lo, hi) = chain.links()[i].joint.as_ref().unwrap().bounds;
            assert!(q[i] >= lo && q[i] <= hi);
        }
    }

    #[test]
    fn test_non_finite_target() {
        let chain = chain();
        let target = Position::new(f64::NAN, 0.0, 0.1);
        let result = LevenbergMarquardt::default().solve(&chain, &target, &[0.0; 10]);
        assert!(matches!(result, Err(ArmError::Unreachable(_))));
    }
}
