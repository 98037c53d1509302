/// Skeleton description is malformed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SkeletonError {
    #[error("Bone {index} has an empty name")]
    EmptyName { index: usize },

    #[error("Bone name `{name}` is used by bones {first} and {second}")]
    DuplicateName {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("Bone `{name}` refers to parent {parent} out of {count} bones")]
    ParentOutOfRange {
        name: String,
        parent: usize,
        count: usize,
    },

    #[error("Bone `{name}` is part of a parent cycle")]
    Cycle { name: String },
}

/// Misuse of a skeletal pose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PoseError {
    #[error("Bone index {index} is out of range for {count} bones")]
    BoneOutOfRange { index: usize, count: usize },

    /// Local transforms were changed after the last model-space update.
    #[error("Model-space transforms are stale, update the pose first")]
    Stale,
}

/// Animation or track data violates its invariants.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum AnimationError {
    #[error("Track for bone {bone} has no samples")]
    EmptyTrack { bone: usize },

    #[error("Track for bone {bone} has {times} times and {len} {what}s")]
    LengthMismatch {
        bone: usize,
        times: usize,
        len: usize,
        what: &'static str,
    },

    #[error("Animation has more than one track for bone {bone}")]
    DuplicateTrack { bone: usize },

    #[error("Track for bone {bone} starts at {time} instead of 0")]
    FirstTimeNotZero { bone: usize, time: f32 },

    #[error("Track for bone {bone} has decreasing time at sample {index}")]
    DecreasingTime { bone: usize, index: usize },

    #[error("Frame {frame} is past the {len} samples of track for bone {bone}")]
    FrameOutOfRange {
        bone: usize,
        frame: usize,
        len: usize,
    },

    #[error("Track for bone {bone} has other times than bone {reference}")]
    MismatchedTimes { bone: usize, reference: usize },

    #[error("Track targets bone {bone} out of {count} skeleton bones")]
    UnknownBone { bone: usize, count: usize },
}

/// Retargeting could not be performed.
///
/// No partial animation is produced when any of these is returned.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RetargetError {
    #[error("Animation `{animation}` has no bone tracks to retarget")]
    NoBoneTracks { animation: String },

    #[error("Animation `{animation}` has no frames left to retarget")]
    NoFrames { animation: String },

    #[error("Target bone `{target}` is mapped from missing `{source_bone}`")]
    MissingSourceBone { target: String, source_bone: String },

    #[error("Target bone `{target}` is mapped from {count} source bones")]
    ManySourceBones { target: String, count: usize },

    #[error("Degenerate scale of bone `{bone}` at frame {frame}")]
    DegenerateScale { bone: String, frame: usize },

    #[error("Animation {what} {value} is negative or not finite")]
    InvalidTiming { what: &'static str, value: f32 },

    #[error("Skeleton `{what}` height is degenerate")]
    DegenerateHeight { what: &'static str },

    #[error(transparent)]
    Animation(#[from] AnimationError),

    #[error(transparent)]
    Pose(#[from] PoseError),
}
