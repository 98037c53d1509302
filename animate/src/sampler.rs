use crate::{animation::Animation, error::RetargetError, pose::Pose};

/// Drives `pose` with the samples stored at `frame` and refreshes its model
/// space.
///
/// Bones without a track keep their current local transform. All tracks are
/// expected to share the first track's timestamps; this is not re-validated
/// here.
pub fn apply_frame(
    animation: &Animation,
    pose: &mut Pose<'_>,
    frame: usize,
) -> Result<(), RetargetError> {
    for track in animation.tracks() {
        let local = track.sample(frame)?;
        pose.set_local_transform(track.bone(), local)?;
    }

    pose.update_model_space();
    Ok(())
}
