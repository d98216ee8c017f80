//! Servo commands and the transport seam they are sent through.

use crate::kinematic_traits::{ServoAngles, GRIPPER, KINEMATIC_SERVOS};

/// Servo id of the gripper on the wire.
const GRIPPER_ID: usize = GRIPPER;

#[derive(Debug, Clone, PartialEq)]
pub enum ServoCommand {
    /// The five kinematic joints, the gripper stays as it is.
    Joints { angles: [f64; KINEMATIC_SERVOS], speed: u32 },

    /// All six servos including the gripper.
    All { angles: ServoAngles, speed: u32 },

    /// Gripper only.
    Gripper { angle: f64, speed: u32 },
}

impl ServoCommand {
    /// Joint command for the kinematic part of `angles`.
    pub fn joints(angles: &ServoAngles, speed: u32) -> Self {
        let mut joints = [0.0; KINEMATIC_SERVOS];
        joints.copy_from_slice(&angles[..KINEMATIC_SERVOS]);
        ServoCommand::Joints { angles: joints, speed }
    }

    pub fn speed(&self) -> u32 {
        match self {
            ServoCommand::Joints { speed, .. }
            | ServoCommand::All { speed, .. }
            | ServoCommand::Gripper { speed, .. } => *speed,
        }
    }

    /// Text form understood by the arm controller: `id:angle:speed` for every servo,
    /// comma separated, angles rounded to whole degrees.
    /// ```
    /// use wearm_kinematics::command::ServoCommand;
    /// let command = ServoCommand::Gripper { angle: 174.6, speed: 2 };
    /// assert_eq!(command.encode(), "5:175:2");
    /// ```
    pub fn encode(&self) -> String {
        let speed = self.speed();
        let part = |id: usize, angle: f64| format!("{}:{}:{}", id, angle.round() as i64, speed);
        match self {
            ServoCommand::Joints { angles, .. } => angles
                .iter()
                .enumerate()
                .map(|(id, &a)| part(id, a))
                .collect::<Vec<_>>()
                .join(","),
            ServoCommand::All { angles, .. } => angles
                .iter()
                .enumerate()
                .map(|(id, &a)| part(id, a))
                .collect::<Vec<_>>()
                .join(","),
            ServoCommand::Gripper { angle, .. } => part(GRIPPER_ID, *angle),
        }
    }
}

/// Transport that delivers commands to the arm (serial port on the real device).
/// Failures are reported as a human readable reason.
pub trait CommandSink: Send + Sync {
    fn is_connected(&self) -> bool;

    fn send(&self, command: &ServoCommand) -> Result<(), String>;
}
