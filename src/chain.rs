//! Fixed kinematic chain of the arm, from the base to the gripper tip.
//!
//! The chain has ten links. Five are actuated rotational joints without own length,
//! five are fixed structural offsets between them:
//!
//! | # | link               | kind                        |
//! |---|--------------------|-----------------------------|
//! | 0 | `base_rotate`      | joint about Z (servo 0)     |
//! | 1 | `pillar`           | offset along Z              |
//! | 2 | `shoulder`         | joint about Y (servo 1)     |
//! | 3 | `upper_arm`        | offset along Z              |
//! | 4 | `elbow`            | joint about Y (servo 2)     |
//! | 5 | `forearm`          | offset along Z              |
//! | 6 | `wrist_pitch`      | joint about Y (servo 3)     |
//! | 7 | `wrist_pitch_link` | offset along Z              |
//! | 8 | `wrist_rotate`     | joint about Z (servo 4)     |
//! | 9 | `tool`             | offset along Z to the tip   |
//!
//! With all chain angles at zero the arm stands straight up.

extern crate nalgebra as na;

use na::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};

use crate::kinematic_traits::{ChainAngles, Position, ServoAngles, KINEMATIC_SERVOS};
use crate::parameters::ArmParameters;

/// Indices of actuated links in the chain, in servo order.
pub const ACTUATED: [usize; KINEMATIC_SERVOS] = [0, 2, 4, 6, 8];

/// Rotational joint of a link.
#[derive(Debug, Clone)]
pub struct Joint {
    pub axis: Unit<Vector3<f64>>,
    /// Bounds in radians (lower, upper).
    pub bounds: (f64, f64),
}

/// Link of the chain. The translation is applied first, then the rotation of the joint
/// (if any).
#[derive(Debug, Clone)]
pub struct Link {
    pub name: &'static str,
    pub translation: Vector3<f64>,
    pub joint: Option<Joint>,
}

impl Link {
    fn fixed(name: &'static str, length: f64) -> Self {
        Link { name, translation: Vector3::new(0.0, 0.0, length), joint: None }
    }

    fn revolute(name: &'static str, axis: Unit<Vector3<f64>>, bounds: (f64, f64)) -> Self {
        Link { name, translation: Vector3::zeros(), joint: Some(Joint { axis, bounds }) }
    }

    /// Transform of this link for the given joint angle.
    pub fn transform(&self, angle: f64) -> Isometry3<f64> {
        let rotation = match &self.joint {
            Some(joint) => UnitQuaternion::from_axis_angle(&joint.axis, angle),
            None => UnitQuaternion::identity(),
        };
        Isometry3::from_parts(Translation3::from(self.translation), rotation)
    }
}

#[derive(Debug, Clone)]
pub struct KinematicChain {
    links: Vec<Link>,
    zero_points: [f64; KINEMATIC_SERVOS],
    sign_corrections: [i8; KINEMATIC_SERVOS],
}

impl KinematicChain {
    pub fn new(parameters: &ArmParameters) -> Self {
        let l = &parameters.link_lengths;
        let b = &parameters.joint_bounds;
        let links = vec![
            Link::revolute("base_rotate", Vector3::z_axis(), b[0]),
            Link::fixed("pillar", l[0]),
            Link::revolute("shoulder", Vector3::y_axis(), b[1]),
            Link::fixed("upper_arm", l[1]),
            Link::revolute("elbow", Vector3::y_axis(), b[2]),
            Link::fixed("forearm", l[2]),
            Link::revolute("wrist_pitch", Vector3::y_axis(), b[3]),
            Link::fixed("wrist_pitch_link", l[3]),
            Link::revolute("wrist_rotate", Vector3::z_axis(), b[4]),
            Link::fixed("tool", parameters.tool_length()),
        ];
        KinematicChain {
            links,
            zero_points: parameters.zero_points,
            sign_corrections: parameters.sign_corrections,
        }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Servo angles (degrees) to chain angles (radians). Fixed links get 0,
    /// the gripper is ignored.
    pub fn servo_to_chain(&self, servo: &ServoAngles) -> ChainAngles {
        let mut chain = [0.0; 10];
        for (k, &i) in ACTUATED.iter().enumerate() {
            let sign = self.sign_corrections[k] as f64;
            chain[i] = (sign * (servo[k] - self.zero_points[k])).to_radians();
        }
        chain
    }

    /// Chain angles (radians) to servo angles (degrees). The gripper is not part of
    /// the chain and takes the given value.
    pub fn chain_to_servo(&self, chain: &ChainAngles, gripper: f64) -> ServoAngles {
        let mut servo = [0.0; 6];
        for (k, &i) in ACTUATED.iter().enumerate() {
            let sign = self.sign_corrections[k] as f64;
            servo[k] = sign * chain[i].to_degrees() + self.zero_points[k];
        }
        servo[5] = gripper;
        servo
    }

    /// World pose of every link frame, after the link's own transform.
    pub fn frames(&self, chain: &ChainAngles) -> Vec<Isometry3<f64>> {
        let mut pose = Isometry3::identity();
        self.links
            .iter()
            .zip(chain.iter())
            .map(|(link, &angle)| {
                pose *= link.transform(angle);
                pose
            })
            .collect()
    }

    /// Pose of the gripper tip.
    pub fn forward_pose(&self, chain: &ChainAngles) -> Isometry3<f64> {
        self.links
            .iter()
            .zip(chain.iter())
            .fold(Isometry3::identity(), |pose, (link, &angle)| pose * link.transform(angle))
    }

    pub fn position(&self, chain: &ChainAngles) -> Position {
        self.forward_pose(chain).translation.vector
    }

    /// Project the actuated angles into the joint bounds.
    pub fn clamp_to_bounds(&self, chain: &mut ChainAngles) {
        for &i in ACTUATED.iter() {
            if let Some(joint) = &self.links[i].joint {
                chain[i] = chain[i].clamp(joint.bounds.0, joint.bounds.1);
            }
        }
    }
}
