use {
    crate::{
        animation::{Animation, BoneTrack},
        error::RetargetError,
        mapping::MappingTable,
        pose::Pose,
        sampler::apply_frame,
        skeleton::Skeleton,
        transform::{checked_div, mul_normalized, Transform, SCALE_EPSILON},
    },
    nalgebra as na,
};

/// Parameters of one retarget request.
#[derive(Clone, Debug, PartialEq)]
pub struct RetargetOptions {
    /// Name of the produced animation.
    pub name: String,

    /// Per-axis scale applied to root translations.
    pub ratio: na::Vector3<f32>,

    /// Drop the first frame of the source animation.
    pub skip_first_frame: bool,

    /// Seconds per frame. Derived from the source animation when `None`.
    pub frame_period: Option<f32>,

    /// Copy translation samples of mapped source bones into non-root
    /// target bones instead of leaving them at zero.
    pub carry_translations: bool,
}

impl Default for RetargetOptions {
    fn default() -> Self {
        RetargetOptions::new("retargeted")
    }
}

impl RetargetOptions {
    pub fn new(name: impl Into<String>) -> Self {
        RetargetOptions {
            name: name.into(),
            ratio: na::Vector3::new(1.0, 1.0, 1.0),
            skip_first_frame: false,
            frame_period: None,
            carry_translations: false,
        }
    }

    /// Scales root translation by the ratio of bind-pose heights.
    pub fn with_height_ratio(
        mut self,
        source: &Skeleton,
        target: &Skeleton,
    ) -> Result<Self, RetargetError> {
        let source_height = source.height();
        if source_height < SCALE_EPSILON {
            return Err(RetargetError::DegenerateHeight { what: "source" });
        }
        let ratio = target.height() / source_height;
        self.ratio = na::Vector3::new(ratio, ratio, ratio);
        Ok(self)
    }
}

#[derive(Clone, Copy, Debug)]
struct Resolved {
    source: usize,
    twist: na::UnitQuaternion<f32>,

    /// Index of the source bone's track, when translations are carried.
    track: Option<usize>,
}

/// Mapping table resolved to bone indices of a skeleton pair.
///
/// Indexed by target bone.
struct ResolvedMap {
    entries: Box<[Option<Resolved>]>,
}

impl ResolvedMap {
    fn new(
        map: &MappingTable,
        source: &Skeleton,
        target: &Skeleton,
    ) -> Result<Self, RetargetError> {
        let mut entries = vec![None; target.len()];

        for mapping in map.iter() {
            let target_index = match target.index_of(mapping.target()) {
                Some(index) => index,
                None => {
                    tracing::warn!(
                        "Target skeleton has no bone `{}`, mapping ignored",
                        mapping.target(),
                    );
                    continue;
                }
            };

            if mapping.sources().len() != 1 {
                return Err(RetargetError::ManySourceBones {
                    target: mapping.target().to_owned(),
                    count: mapping.sources().len(),
                });
            }

            let source_index =
                source.index_of(mapping.source()).ok_or_else(|| {
                    RetargetError::MissingSourceBone {
                        target: mapping.target().to_owned(),
                        source_bone: mapping.source().to_owned(),
                    }
                })?;

            entries[target_index] = Some(Resolved {
                source: source_index,
                twist: *mapping.twist(),
                track: None,
            });
        }

        Ok(ResolvedMap {
            entries: entries.into(),
        })
    }

    fn attach_tracks(&mut self, animation: &Animation) {
        for entry in self.entries.iter_mut().flatten() {
            entry.track = animation
                .tracks()
                .iter()
                .position(|track| track.bone() == entry.source);
        }
    }
}

/// Poses `target_pose` to mimic the already posed `source_pose`.
///
/// Unmapped target bones are left in bind pose. Root translations are not
/// scaled and non-root bones get no translation.
pub fn retarget_pose(
    source_pose: &Pose<'_>,
    target_pose: &mut Pose<'_>,
    map: &MappingTable,
) -> Result<(), RetargetError> {
    let resolved =
        ResolvedMap::new(map, source_pose.skeleton(), target_pose.skeleton())?;
    let ratio = na::Vector3::new(1.0, 1.0, 1.0);
    pose_frame(&resolved, source_pose, target_pose, &ratio, None, 0)
}

fn pose_frame(
    resolved: &ResolvedMap,
    source_pose: &Pose<'_>,
    target_pose: &mut Pose<'_>,
    ratio: &na::Vector3<f32>,
    carry: Option<&Animation>,
    frame: usize,
) -> Result<(), RetargetError> {
    let target = target_pose.skeleton();
    target_pose.reset();

    for &index in target.pre_order() {
        let entry = match &resolved.entries[index] {
            Some(entry) => entry,
            None => continue,
        };
        let bone = &target.bones()[index];
        let source_model = *source_pose.model_transform(entry.source)?;

        let degenerate = || RetargetError::DegenerateScale {
            bone: bone.name.clone(),
            frame,
        };

        let inverse_bind = bone.bind.rotation.inverse();

        let local = match bone.parent {
            None => {
                // Model translation is the scaled source translation, so the
                // bind offset is undone here.
                let offset = source_model.translation.component_mul(ratio)
                    - bone.bind.translation;
                let translation =
                    checked_div(&(inverse_bind * offset), &bone.bind.scale)
                        .ok_or_else(degenerate)?;

                Transform {
                    translation,
                    rotation: mul_normalized(
                        &inverse_bind,
                        &source_model.rotation,
                    ),
                    scale: checked_div(&source_model.scale, &bone.bind.scale)
                        .ok_or_else(degenerate)?,
                }
            }
            Some(parent) => {
                target_pose.update_model_space();
                let parent_model = *target_pose.model_transform(parent)?;

                let rotation = mul_normalized(
                    &parent_model.rotation.inverse(),
                    &source_model.rotation,
                );
                let rotation = mul_normalized(&inverse_bind, &rotation);
                let rotation = mul_normalized(&rotation, &entry.twist);

                let scale =
                    checked_div(&source_model.scale, &parent_model.scale)
                        .and_then(|s| checked_div(&s, &bone.bind.scale))
                        .ok_or_else(degenerate)?;

                let translation = match (carry, entry.track) {
                    (Some(animation), Some(track)) => {
                        animation.tracks()[track].sample(frame)?.translation
                    }
                    _ => na::Vector3::zeros(),
                };

                Transform {
                    translation,
                    rotation,
                    scale,
                }
            }
        };

        target_pose.set_local_transform(index, local)?;
    }

    target_pose.update_model_space();
    Ok(())
}

#[derive(Default)]
struct TrackBuilder {
    translations: Vec<na::Vector3<f32>>,
    rotations: Vec<na::UnitQuaternion<f32>>,
    scales: Vec<na::Vector3<f32>>,
}

impl TrackBuilder {
    fn push(&mut self, local: &Transform) {
        self.translations.push(local.translation);
        self.rotations.push(local.rotation);
        self.scales.push(local.scale);
    }
}

/// Converts `animation` of the `source` skeleton into an animation of the
/// `target` skeleton.
///
/// Every target bone with a mapping gets one track; unmapped bones get none.
/// Configuration problems are reported before any frame is processed and no
/// partial animation is returned on error.
///
/// All tracks of `animation` must share the same timestamps.
#[tracing::instrument(
    skip(source, animation, target, map, options),
    fields(animation = %animation.name, name = %options.name),
)]
pub fn retarget(
    source: &Skeleton,
    animation: &Animation,
    target: &Skeleton,
    map: &MappingTable,
    options: &RetargetOptions,
) -> Result<Animation, RetargetError> {
    let reference = animation.first_bone_track().ok_or_else(|| {
        RetargetError::NoBoneTracks {
            animation: animation.name.clone(),
        }
    })?;
    animation.check_bones(source.len())?;
    animation.check_shared_times()?;

    let frame_count = reference.len();
    let skip = if options.skip_first_frame { 1 } else { 0 };
    if frame_count <= skip {
        return Err(RetargetError::NoFrames {
            animation: animation.name.clone(),
        });
    }

    check_timing("length", animation.length)?;
    let frame_period = match options.frame_period {
        Some(period) => check_timing("frame period", period)?,
        None => animation.length / frame_count as f32,
    };

    let mut resolved = ResolvedMap::new(map, source, target)?;
    if options.carry_translations {
        resolved.attach_tracks(animation);
    }
    let carry = if options.carry_translations {
        Some(animation)
    } else {
        None
    };

    let start = reference.times()[skip];
    let times: Vec<f32> =
        reference.times()[skip..].iter().map(|t| t - start).collect();

    let mut builders: Vec<Option<TrackBuilder>> = resolved
        .entries
        .iter()
        .map(|entry| entry.as_ref().map(|_| TrackBuilder::default()))
        .collect();

    tracing::debug!(
        "Retargeting {} frames onto {} mapped bones",
        frame_count - skip,
        builders.iter().flatten().count(),
    );

    let mut source_pose = Pose::new(source);
    let mut target_pose = Pose::new(target);

    for frame in skip..frame_count {
        apply_frame(animation, &mut source_pose, frame)?;
        pose_frame(
            &resolved,
            &source_pose,
            &mut target_pose,
            &options.ratio,
            carry,
            frame,
        )?;

        for (index, builder) in builders.iter_mut().enumerate() {
            if let Some(builder) = builder {
                builder.push(target_pose.local_transform(index)?);
            }
        }
        tracing::trace!(frame, "Frame retargeted");
    }

    let length = (frame_count - skip) as f32 * frame_period;
    let mut result = Animation::new(options.name.clone(), length);

    for (index, builder) in builders.into_iter().enumerate() {
        if let Some(builder) = builder {
            result.add_track(BoneTrack::new(
                index,
                times.clone(),
                builder.translations,
                builder.rotations,
                Some(builder.scales),
            )?);
        }
    }

    Ok(result)
}

fn check_timing(what: &'static str, value: f32) -> Result<f32, RetargetError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(RetargetError::InvalidTiming { what, value })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{mapping::BoneMapping, skeleton::Bone},
        std::f32::consts::FRAC_PI_2,
    };

    fn chain(names: [&str; 2]) -> Skeleton {
        Skeleton::new(vec![
            Bone::root(names[0], Transform::identity()),
            Bone::child(
                names[1],
                0,
                Transform::from_translation(na::Vector3::new(0.0, 1.0, 0.0)),
            ),
        ])
        .unwrap()
    }

    fn walk() -> Animation {
        let track = BoneTrack::new(
            0,
            vec![0.0, 0.5, 1.0],
            vec![
                na::Vector3::new(0.0, 0.0, 0.0),
                na::Vector3::new(0.5, 0.1, 0.0),
                na::Vector3::new(1.0, 0.0, 0.0),
            ],
            vec![
                na::UnitQuaternion::identity(),
                na::UnitQuaternion::from_euler_angles(0.0, 0.3, 0.0),
                na::UnitQuaternion::from_euler_angles(0.0, 0.6, 0.0),
            ],
            None,
        )
        .unwrap();
        Animation::new("walk", 1.5).with_track(track)
    }

    fn pair_map() -> MappingTable {
        let mut map = MappingTable::new();
        map.insert(BoneMapping::new("Hips", "Root"));
        map.insert(BoneMapping::new("Back", "Spine"));
        map
    }

    #[test]
    fn root_translation_passes_through() {
        let source = chain(["Root", "Spine"]);
        let target = chain(["Hips", "Back"]);

        let result = retarget(
            &source,
            &walk(),
            &target,
            &pair_map(),
            &RetargetOptions::new("walk"),
        )
        .unwrap();

        let hips = result.track_for_bone(0).unwrap();
        assert_eq!(hips.translations()[1], na::Vector3::new(0.5, 0.1, 0.0));
        assert_eq!(hips.translations()[2], na::Vector3::new(1.0, 0.0, 0.0));
        assert!((result.length - 1.5).abs() < 1e-6);
    }

    #[test]
    fn ratio_scales_root_translation() {
        let source = chain(["Root", "Spine"]);
        let target = chain(["Hips", "Back"]);
        let mut options = RetargetOptions::new("walk");
        options.ratio = na::Vector3::new(2.0, 2.0, 2.0);

        let result =
            retarget(&source, &walk(), &target, &pair_map(), &options).unwrap();

        let hips = result.track_for_bone(0).unwrap();
        let expected = na::Vector3::new(2.0, 0.0, 0.0);
        assert!((hips.translations()[2] - expected).norm() < 1e-6);
    }

    #[test]
    fn skip_first_frame_shifts_times() {
        let source = chain(["Root", "Spine"]);
        let target = chain(["Hips", "Back"]);
        let mut options = RetargetOptions::new("walk");
        options.skip_first_frame = true;

        let result =
            retarget(&source, &walk(), &target, &pair_map(), &options).unwrap();

        let hips = result.track_for_bone(0).unwrap();
        assert_eq!(hips.times(), &[0.0, 0.5]);
        assert_eq!(hips.translations()[0], na::Vector3::new(0.5, 0.1, 0.0));
        assert!((result.length - 1.0).abs() < 1e-6);
    }

    #[test]
    fn many_source_bones_are_rejected() {
        let source = chain(["Root", "Spine"]);
        let target = chain(["Hips", "Back"]);
        let mut map = pair_map();
        map.insert(
            BoneMapping::new("Back", "Spine").add_source_bones(vec!["Root"]),
        );

        let err = retarget(
            &source,
            &walk(),
            &target,
            &map,
            &RetargetOptions::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            RetargetError::ManySourceBones {
                target: "Back".to_owned(),
                count: 2,
            }
        );
    }

    #[test]
    fn collapsed_parent_scale_fails_at_its_frame() {
        let source = chain(["Root", "Spine"]);
        let target = chain(["Hips", "Back"]);
        let collapse = BoneTrack::new(
            0,
            vec![0.0, 0.5, 1.0],
            vec![na::Vector3::zeros(); 3],
            vec![na::UnitQuaternion::identity(); 3],
            Some(vec![
                na::Vector3::new(1.0, 1.0, 1.0),
                na::Vector3::new(1.0, 0.0, 1.0),
                na::Vector3::new(1.0, 1.0, 1.0),
            ]),
        )
        .unwrap();
        let animation = Animation::new("collapse", 1.5).with_track(collapse);

        let err = retarget(
            &source,
            &animation,
            &target,
            &pair_map(),
            &RetargetOptions::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            RetargetError::DegenerateScale {
                bone: "Back".to_owned(),
                frame: 1,
            }
        );
    }

    #[test]
    fn invalid_timing_is_rejected() {
        let source = chain(["Root", "Spine"]);
        let target = chain(["Hips", "Back"]);

        let mut animation = walk();
        animation.length = f32::NAN;
        let err = retarget(
            &source,
            &animation,
            &target,
            &pair_map(),
            &RetargetOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RetargetError::InvalidTiming { what: "length", .. }
        ));

        let mut options = RetargetOptions::default();
        options.frame_period = Some(-0.1);
        let err = retarget(&source, &walk(), &target, &pair_map(), &options)
            .unwrap_err();
        assert_eq!(
            err,
            RetargetError::InvalidTiming {
                what: "frame period",
                value: -0.1,
            }
        );
    }

    #[test]
    fn degenerate_bind_scale_fails_fast() {
        let source = chain(["Root", "Spine"]);
        let target = Skeleton::new(vec![Bone::root(
            "Hips",
            Transform::from_scale(na::Vector3::new(1.0, 0.0, 1.0)),
        )])
        .unwrap();

        let err = retarget(
            &source,
            &walk(),
            &target,
            &pair_map(),
            &RetargetOptions::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            RetargetError::DegenerateScale {
                bone: "Hips".to_owned(),
                frame: 0,
            }
        );
    }

    #[test]
    fn carried_translations_follow_source_track() {
        let source = chain(["Root", "Spine"]);
        let target = chain(["Hips", "Back"]);
        let spine = BoneTrack::new(
            1,
            vec![0.0, 0.5, 1.0],
            vec![na::Vector3::new(0.0, 0.2, 0.0); 3],
            vec![na::UnitQuaternion::identity(); 3],
            None,
        )
        .unwrap();
        let animation = walk().with_track(spine);

        let mut options = RetargetOptions::new("walk");
        options.carry_translations = true;
        let carried =
            retarget(&source, &animation, &target, &pair_map(), &options)
                .unwrap();
        options.carry_translations = false;
        let plain =
            retarget(&source, &animation, &target, &pair_map(), &options)
                .unwrap();

        let back = carried.track_for_bone(1).unwrap();
        assert_eq!(back.translations()[1], na::Vector3::new(0.0, 0.2, 0.0));
        let back = plain.track_for_bone(1).unwrap();
        assert_eq!(back.translations()[1], na::Vector3::zeros());
    }

    #[test]
    fn pose_preview_applies_twist() {
        let source = chain(["Root", "Spine"]);
        let target = chain(["Hips", "Back"]);
        let twist = na::UnitQuaternion::from_axis_angle(
            &na::Vector3::x_axis(),
            FRAC_PI_2,
        );
        let mut map = pair_map();
        map.set_twist("Back", twist);

        let source_pose = Pose::new(&source);
        let mut target_pose = Pose::new(&target);
        retarget_pose(&source_pose, &mut target_pose, &map).unwrap();

        let back = target_pose.model_transform(1).unwrap();
        assert!((back.rotation.angle_to(&twist)).abs() < 1e-5);
    }

    #[test]
    fn height_ratio() {
        let source = chain(["Root", "Spine"]);
        let tall = Skeleton::new(vec![
            Bone::root("Hips", Transform::identity()),
            Bone::child(
                "Back",
                0,
                Transform::from_translation(na::Vector3::new(0.0, 3.0, 0.0)),
            ),
        ])
        .unwrap();

        let options = RetargetOptions::default()
            .with_height_ratio(&source, &tall)
            .unwrap();
        let expected = na::Vector3::new(3.0, 3.0, 3.0);
        assert!((options.ratio - expected).norm() < 1e-6);

        let flat =
            Skeleton::new(vec![Bone::root("Root", Transform::identity())])
                .unwrap();
        assert_eq!(
            RetargetOptions::default().with_height_ratio(&flat, &tall),
            Err(RetargetError::DegenerateHeight { what: "source" }),
        );
    }
}
