use {
    nalgebra as na,
    serde::{Deserialize, Serialize},
};

/// Smallest magnitude a scale component may have when used as a divisor.
pub const SCALE_EPSILON: f32 = 1e-6;

/// Translation, rotation and non-uniform scale of a bone.
///
/// Used both for transforms relative to a parent (bind and local) and for
/// model-space transforms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformRepr", into = "TransformRepr")]
pub struct Transform {
    pub translation: na::Vector3<f32>,
    pub rotation: na::UnitQuaternion<f32>,
    pub scale: na::Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Transform::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Transform {
            translation: na::Vector3::zeros(),
            rotation: na::UnitQuaternion::identity(),
            scale: na::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn new(
        translation: na::Vector3<f32>,
        rotation: na::UnitQuaternion<f32>,
        scale: na::Vector3<f32>,
    ) -> Self {
        Transform {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: na::Vector3<f32>) -> Self {
        Transform {
            translation,
            ..Transform::identity()
        }
    }

    pub fn from_rotation(rotation: na::UnitQuaternion<f32>) -> Self {
        Transform {
            rotation,
            ..Transform::identity()
        }
    }

    pub fn from_scale(scale: na::Vector3<f32>) -> Self {
        Transform {
            scale,
            ..Transform::identity()
        }
    }

    /// Applies `child` in the space of `self`.
    ///
    /// Scale composes component-wise. The child translation is scaled by
    /// this transform's scale before it is rotated and offset, so ancestor
    /// scale is applied to it exactly once.
    pub fn combine(&self, child: &Transform) -> Transform {
        let offset =
            self.rotation * self.scale.component_mul(&child.translation);

        Transform {
            translation: self.translation + offset,
            rotation: mul_normalized(&self.rotation, &child.rotation),
            scale: self.scale.component_mul(&child.scale),
        }
    }

    /// Transforms a point from this transform's local space.
    pub fn transform_point(&self, point: &na::Point3<f32>) -> na::Point3<f32> {
        let scaled = self.scale.component_mul(&point.coords);
        na::Point3::from(self.rotation * scaled + self.translation)
    }

    pub fn to_homogeneous(&self) -> na::Matrix4<f32> {
        let iso = na::Isometry3::from_parts(
            na::Translation3::from(self.translation),
            self.rotation,
        );
        iso.to_homogeneous() * na::Matrix4::new_nonuniform_scaling(&self.scale)
    }
}

/// Multiplies two rotations and renormalizes the product.
///
/// Long chains of products drift away from unit length without this.
pub fn mul_normalized(
    lhs: &na::UnitQuaternion<f32>,
    rhs: &na::UnitQuaternion<f32>,
) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::new_normalize(lhs.quaternion() * rhs.quaternion())
}

/// Component-wise `lhs / rhs`.
///
/// Returns `None` if any component of `rhs` is too close to zero or is not
/// finite.
pub fn checked_div(
    lhs: &na::Vector3<f32>,
    rhs: &na::Vector3<f32>,
) -> Option<na::Vector3<f32>> {
    if rhs.iter().any(|c| !c.is_finite() || c.abs() < SCALE_EPSILON) {
        None
    } else {
        Some(lhs.component_div(rhs))
    }
}

/// Tests two rotations for equality up to quaternion double cover.
pub fn rotations_equal(
    lhs: &na::UnitQuaternion<f32>,
    rhs: &na::UnitQuaternion<f32>,
    epsilon: f32,
) -> bool {
    lhs.coords.dot(&rhs.coords).abs() >= 1.0 - epsilon
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
struct TransformRepr {
    translation: na::Vector3<f32>,
    rotation: na::Quaternion<f32>,
    scale: na::Vector3<f32>,
}

impl Default for TransformRepr {
    fn default() -> Self {
        Transform::identity().into()
    }
}

impl From<TransformRepr> for Transform {
    fn from(repr: TransformRepr) -> Self {
        Transform {
            translation: repr.translation,
            rotation: na::UnitQuaternion::new_normalize(repr.rotation),
            scale: repr.scale,
        }
    }
}

impl From<Transform> for TransformRepr {
    fn from(transform: Transform) -> Self {
        TransformRepr {
            translation: transform.translation,
            rotation: transform.rotation.into_inner(),
            scale: transform.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::f32::consts::FRAC_PI_2};

    #[test]
    fn combine_scales_child_translation_once() {
        let parent = Transform::new(
            na::Vector3::new(1.0, 0.0, 0.0),
            na::UnitQuaternion::from_axis_angle(
                &na::Vector3::z_axis(),
                FRAC_PI_2,
            ),
            na::Vector3::new(2.0, 3.0, 1.0),
        );
        let child =
            Transform::from_translation(na::Vector3::new(1.0, 1.0, 0.0));

        let model = parent.combine(&child);

        // (1, 1, 0) scaled to (2, 3, 0), rotated to (-3, 2, 0), offset by x.
        let expected = na::Vector3::new(-2.0, 2.0, 0.0);
        assert!((model.translation - expected).norm() < 1e-5);
        assert!((model.scale - na::Vector3::new(2.0, 3.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn combine_matches_matrix_product_for_uniform_scale() {
        let parent = Transform::new(
            na::Vector3::new(0.5, -1.0, 2.0),
            na::UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
            na::Vector3::new(2.0, 2.0, 2.0),
        );
        let child = Transform::new(
            na::Vector3::new(1.0, 2.0, 3.0),
            na::UnitQuaternion::from_euler_angles(-0.7, 0.4, 0.1),
            na::Vector3::new(0.5, 0.5, 0.5),
        );

        let expected = parent.to_homogeneous() * child.to_homogeneous();
        let actual = parent.combine(&child).to_homogeneous();

        assert!((expected - actual).norm() < 1e-4);
    }

    #[test]
    fn checked_div_rejects_near_zero() {
        let one = na::Vector3::new(1.0, 1.0, 1.0);
        assert!(checked_div(&one, &na::Vector3::new(1.0, 0.0, 1.0)).is_none());
        assert!(
            checked_div(&one, &na::Vector3::new(f32::NAN, 1.0, 1.0)).is_none()
        );
        assert!(checked_div(&one, &na::Vector3::new(1.0, f32::INFINITY, 1.0))
            .is_none());
        assert_eq!(
            checked_div(&one, &na::Vector3::new(2.0, 4.0, 0.5)),
            Some(na::Vector3::new(0.5, 0.25, 2.0)),
        );
    }

    #[test]
    fn rotations_equal_accepts_negated_quaternion() {
        let q = na::UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        let neg = na::UnitQuaternion::new_unchecked(-q.into_inner());
        assert!(rotations_equal(&q, &neg, 1e-6));
    }
}
