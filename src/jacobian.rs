extern crate nalgebra as na;

use na::{Matrix3x5, Vector3};

use crate::chain::{KinematicChain, ACTUATED};
use crate::kinematic_traits::ChainAngles;

/// Positional Jacobian of the gripper tip over the five actuated joints.
///
/// Each column is the linear velocity of the tip for the unit angular velocity of
/// one joint: the joint's world axis crossed with the lever arm from the joint to the tip.
/// The wrist rotation column is zero as the tip lies on its axis.
pub fn position_jacobian(chain: &KinematicChain, angles: &ChainAngles) -> Matrix3x5<f64> {
    let frames = chain.frames(angles);
    let tip = frames[frames.len() - 1].translation.vector;
    let links = chain.links();

    let mut jacobian = Matrix3x5::zeros();
    for (column, &i) in ACTUATED.iter().enumerate() {
        let Some(joint) = &links[i].joint else {
            continue;
        };
        let frame = &frames[i];
        let axis: Vector3<f64> = frame.rotation * joint.axis.into_inner();
        let lever = tip - frame.translation.vector;
        jacobian.set_column(column, &axis.cross(&lever));
    }
    jacobian
}
