//! Skeletal animation retargeting.
//!
//! Converts an animation authored for one skeleton into an animation for a
//! differently shaped skeleton, guided by a table of bone correspondences.

pub mod animation;
pub mod error;
pub mod mapping;
pub mod pose;
pub mod retarget;
pub mod sampler;
pub mod skeleton;
pub mod transform;
pub mod twist;

pub use self::{
    animation::{Animation, BoneTrack},
    error::{AnimationError, PoseError, RetargetError, SkeletonError},
    mapping::{BoneMapping, MappingTable},
    pose::Pose,
    retarget::{retarget, retarget_pose, RetargetOptions},
    sampler::apply_frame,
    skeleton::{Bone, Skeleton},
    transform::Transform,
    twist::Axis,
};
