//! Kinematics, path planning and pick and place automation for a five axis servo arm
//! with a gripper.
//!
//! The arm is a serial chain: base rotation, shoulder, elbow and wrist pitch, wrist
//! rotation, and the gripper on the tip. It stands straight up when every joint is at
//! its zero point. Servos take angles in degrees with their own calibration, the chain
//! works in radians; [`chain::KinematicChain`] maps between the two.
//!
//! # Features
//!
//! - Forward kinematics of the tip position.
//! - Numeric inverse kinematics for the tip position (orientation is free), refined over
//!   several passes. Servo limits are always respected and the best pass is returned.
//! - Path planning between Cartesian points: direct moves for short distances, spherical
//!   interpolation around the base, and a horizontal arc at safe height when the bearing
//!   around the base changes a lot.
//! - Execution of planned paths through any [`command::CommandSink`], with pause and stop.
//! - Pick and place automation on a worker thread, with task points persisted in YAML.
//!
//! # Units
//!
//! Kinematics and planning work in meters. Task points, heights and the command line
//! are in millimeters; [`utils::mm_to_position`] and [`utils::position_to_mm`] convert.
//!
//! ## Example
//!
//! ```
//! use wearm_kinematics::kinematic_traits::{Kinematics, Position, HOME_ANGLES};
//! use wearm_kinematics::kinematics_impl::ArmKinematics;
//! use wearm_kinematics::parameters::ArmParameters;
//!
//! let robot = ArmKinematics::new(ArmParameters::wearm());
//! let solution = robot.inverse(&Position::new(0.15, 0.0, 0.20), &HOME_ANGLES).unwrap();
//! assert!(solution.error < 0.005);
//! ```

pub mod error;
pub mod parameters;

#[cfg(feature = "allow_filesystem")]
pub mod parameters_from_file;

#[path = "utils/utils.rs"]
pub mod utils;
pub mod kinematic_traits;
pub mod constraints;

pub mod chain;
pub mod jacobian;
pub mod solver;
pub mod kinematics_impl;

pub mod annotations;

pub mod path_plan {
    pub mod interpolator;
    pub mod planner;
}

pub mod command;
pub mod executor;
pub mod automation;

#[cfg(test)]
mod tests;
