//! Core types and the kinematics trait shared by the planner, executor and automation.

extern crate nalgebra as na;

use na::Vector3;
use crate::error::ArmError;

/// Cartesian position of the gripper tip relative to the arm base, in meters.
/// ```
/// use wearm_kinematics::kinematic_traits::Position;
/// let p = Position::new(0.15, 0.0, 0.20);
/// assert_eq!(p.z, 0.20);
/// ```
pub type Position = Vector3<f64>;

/// Six servo angles in degrees: five kinematic joints followed by the gripper.
pub type ServoAngles = [f64; 6];

/// Joint angles of the ten link chain, in radians. Fixed links always have 0 here.
pub type ChainAngles = [f64; 10];

/// Number of servos that take part in kinematics (the gripper does not).
pub const KINEMATIC_SERVOS: usize = 5;

/// Index of the gripper servo in `ServoAngles`.
pub const GRIPPER: usize = 5;

/// Home pose of the arm, everything straight up.
pub const HOME_ANGLES: ServoAngles = [190.0, 130.0, 130.0, 130.0, 130.0, 130.0];

/// Result of the inverse kinematics. The error is the remaining distance in meters
/// between the target and the forward kinematics of `angles`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub angles: ServoAngles,
    pub error: f64,
    /// Refinement iterations actually done.
    pub iterations: usize,
}

pub trait Kinematics: Send + Sync {
    /// Gripper tip position for the given servo angles.
    fn forward(&self, angles: &ServoAngles) -> Position;

    /// Servo angles reaching `target` as close as possible, starting from `current`.
    /// The gripper angle of `current` is carried over unchanged. All kinematic angles
    /// of the solution are within servo limits.
    fn inverse(&self, target: &Position, current: &ServoAngles) -> Result<Solution, ArmError>;
}
