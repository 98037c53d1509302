use crate::{error::PoseError, skeleton::Skeleton, transform::Transform};

/// Instantaneous pose of a skeleton.
///
/// Local transforms are relative to each bone's bind transform. Model-space
/// transforms are derived from them and must be refreshed with
/// [`Pose::update_model_space`] after any local transform changes.
#[derive(Clone, Debug)]
pub struct Pose<'a> {
    skeleton: &'a Skeleton,
    locals: Box<[Transform]>,
    models: Box<[Transform]>,

    /// Earliest pre-order position whose model transform is out of date.
    dirty: Option<usize>,
}

impl<'a> Pose<'a> {
    /// Creates a pose in bind configuration.
    pub fn new(skeleton: &'a Skeleton) -> Self {
        Pose {
            skeleton,
            locals: vec![Transform::identity(); skeleton.len()].into(),
            models: skeleton.bind_model_transforms().into(),
            dirty: None,
        }
    }

    pub fn skeleton(&self) -> &'a Skeleton {
        self.skeleton
    }

    /// Returns every bone to its bind transform and refreshes model space.
    pub fn reset(&mut self) {
        for local in self.locals.iter_mut() {
            *local = Transform::identity();
        }
        self.dirty = Some(0);
        self.update_model_space();
    }

    pub fn local_transform(
        &self,
        bone: usize,
    ) -> Result<&Transform, PoseError> {
        self.check(bone)?;
        Ok(&self.locals[bone])
    }

    /// Overwrites one bone's local transform.
    ///
    /// Model space is not refreshed.
    pub fn set_local_transform(
        &mut self,
        bone: usize,
        local: Transform,
    ) -> Result<(), PoseError> {
        self.check(bone)?;
        self.locals[bone] = local;

        let position = self.skeleton.position(bone);
        self.dirty = Some(match self.dirty {
            Some(dirty) => dirty.min(position),
            None => position,
        });
        Ok(())
    }

    /// Recomputes model-space transforms, parents before children.
    ///
    /// Only the bones at or after the earliest modified pre-order position
    /// are visited. Every other bone's ancestors precede it and are untouched.
    pub fn update_model_space(&mut self) {
        let start = match self.dirty.take() {
            Some(start) => start,
            None => return,
        };

        let bones = self.skeleton.bones();
        for &index in &self.skeleton.pre_order()[start..] {
            let bone = &bones[index];
            let local = bone.bind.combine(&self.locals[index]);
            self.models[index] = match bone.parent {
                Some(parent) => self.models[parent].combine(&local),
                None => local,
            };
        }
    }

    pub fn is_stale(&self) -> bool {
        self.dirty.is_some()
    }

    /// Model-space transform of a bone.
    ///
    /// Fails if local transforms changed since the last update.
    pub fn model_transform(
        &self,
        bone: usize,
    ) -> Result<&Transform, PoseError> {
        self.check(bone)?;
        if self.dirty.is_some() {
            return Err(PoseError::Stale);
        }
        Ok(&self.models[bone])
    }

    fn check(&self, bone: usize) -> Result<(), PoseError> {
        if bone < self.locals.len() {
            Ok(())
        } else {
            Err(PoseError::BoneOutOfRange {
                index: bone,
                count: self.locals.len(),
            })
        }
    }
}
