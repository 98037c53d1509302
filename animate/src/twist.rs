//! Helpers for authoring the corrective rotation of a bone mapping.

use {
    crate::transform::mul_normalized,
    nalgebra as na,
    std::f32::consts::FRAC_PI_2,
};

/// Rotation axis of a twist angle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Rounds the rotation angle about one axis to the nearest multiple of 90°.
///
/// The rotation is decomposed into roll (X), pitch (Y) and yaw (Z) angles,
/// the chosen angle is rounded and the rotation is recomposed.
pub fn snap(
    twist: &na::UnitQuaternion<f32>,
    axis: Axis,
) -> na::UnitQuaternion<f32> {
    let (mut roll, mut pitch, mut yaw) = twist.euler_angles();
    let angle = match axis {
        Axis::X => &mut roll,
        Axis::Y => &mut pitch,
        Axis::Z => &mut yaw,
    };
    *angle = (*angle / FRAC_PI_2).round() * FRAC_PI_2;

    na::UnitQuaternion::from_euler_angles(roll, pitch, yaw)
}

/// Snaps all three axis angles, in X, Y, Z order.
pub fn cardinalize(twist: &na::UnitQuaternion<f32>) -> na::UnitQuaternion<f32> {
    let twist = snap(twist, Axis::X);
    let twist = snap(&twist, Axis::Y);
    snap(&twist, Axis::Z)
}

/// Guesses the twist that turns `source_model` into `target_model`.
///
/// Both are model-space orientations of corresponding bones, typically taken
/// from similar poses of the two skeletons.
pub fn estimate(
    source_model: &na::UnitQuaternion<f32>,
    target_model: &na::UnitQuaternion<f32>,
) -> na::UnitQuaternion<f32> {
    cardinalize(&mul_normalized(&source_model.inverse(), target_model))
}
