//! Defines the arm parameter data structure

use crate::kinematic_traits::{ServoAngles, HOME_ANGLES, KINEMATIC_SERVOS};
use crate::utils::deg;

/// Axis aligned box the gripper tip may be commanded into, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Workspace {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Workspace {
    pub fn contains(&self, p: &[f64; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

/// Parameters of the arm. Geometry, calibration of the servos and their ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmParameters {
    /// Link lengths in meters: pillar, upper arm, forearm, wrist pitch link,
    /// wrist rotate servo and gripper. The last two form the fixed tool offset.
    pub link_lengths: [f64; 6],

    /// Servo angle (degrees) at which the joint is at zero in the chain.
    pub zero_points: [f64; KINEMATIC_SERVOS],

    /// Specifies the direction of positive rotation from the zero angle for each joint.
    /// A value of `-1` means the servo turns against the chain joint.
    pub sign_corrections: [i8; KINEMATIC_SERVOS],

    /// Chain joint bounds in radians (lower, upper).
    pub joint_bounds: [(f64, f64); KINEMATIC_SERVOS],

    /// Servo limits in degrees (lower, upper), gripper included.
    pub servo_limits: [(f64, f64); 6],

    /// Where the arm returns at the end of the automated task.
    pub home: ServoAngles,

    pub gripper_open: f64,
    pub gripper_closed: f64,

    pub workspace: Workspace,
}

impl ArmParameters {
    /// The five axis servo arm with the parallel gripper.
    pub fn wearm() -> Self {
        let d = f64::to_radians;
        ArmParameters {
            link_lengths: [0.090, 0.100, 0.100, 0.065, 0.001, 0.090],
            zero_points: [190.0, 130.0, 130.0, 130.0, 130.0],
            sign_corrections: [1, -1, 1, 1, -1],
            joint_bounds: [
                (d(-190.0), d(80.0)),
                (d(-80.0), d(80.0)),
                (d(-110.0), d(120.0)),
                (d(-90.0), d(80.0)),
                (d(-180.0), d(180.0)),
            ],
            servo_limits: [
                (0.0, 270.0),
                (50.0, 210.0),
                (20.0, 250.0),
                (40.0, 210.0),
                (40.0, 210.0),
                (100.0, 175.0),
            ],
            home: HOME_ANGLES,
            gripper_open: 100.0,
            gripper_closed: 175.0,
            workspace: Workspace {
                min: [-0.6, -0.6, 0.0],
                max: [0.6, 0.6, 0.6],
            },
        }
    }

    /// Length of the fixed tool offset after the wrist rotation.
    pub fn tool_length(&self) -> f64 {
        self.link_lengths[4] + self.link_lengths[5]
    }

    /// Convert to string yaml representation (quick viewing, etc).
    pub fn to_yaml(&self) -> String {
        let pairs = |v: &[(f64, f64)]| {
            v.iter()
                .map(|(a, b)| format!("[{}, {}]", a, b))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let list = |v: &[f64]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(", ");

        format!(
            "link_lengths: [{}]\n\
            zero_points: [{}]\n\
            sign_corrections: [{}]\n\
            joint_bounds: [{}]\n\
            servo_limits: [{}]\n\
            home: [{}]\n\
            gripper_open: {}\n\
            gripper_closed: {}\n\
            workspace:\n  \
              min: [{}]\n  \
              max: [{}]\n",
            list(&self.link_lengths),
            list(&self.zero_points),
            self.sign_corrections.iter().map(|x| x.to_string())
                .collect::<Vec<_>>().join(", "),
            self.joint_bounds.iter().map(|(a, b)| format!("[{}, {}]", deg(a), deg(b)))
                .collect::<Vec<_>>().join(", "),
            pairs(&self.servo_limits),
            list(&self.home),
            self.gripper_open,
            self.gripper_closed,
            list(&self.workspace.min),
            list(&self.workspace.max),
        )
    }
}

impl Default for ArmParameters {
    fn default() -> Self {
        Self::wearm()
    }
}
