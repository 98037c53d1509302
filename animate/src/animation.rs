use {
    crate::{error::AnimationError, transform::Transform},
    nalgebra as na,
    serde::{Deserialize, Serialize},
    std::convert::TryFrom,
};

/// Time-sampled transforms of one bone.
///
/// Times, translations, rotations and optional scales are parallel arrays.
/// The first sample is always at time 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BoneTrackRepr", into = "BoneTrackRepr")]
pub struct BoneTrack {
    bone: usize,
    times: Box<[f32]>,
    translations: Box<[na::Vector3<f32>]>,
    rotations: Box<[na::UnitQuaternion<f32>]>,
    scales: Option<Box<[na::Vector3<f32>]>>,
}

impl BoneTrack {
    pub fn new(
        bone: usize,
        times: Vec<f32>,
        translations: Vec<na::Vector3<f32>>,
        rotations: Vec<na::UnitQuaternion<f32>>,
        scales: Option<Vec<na::Vector3<f32>>>,
    ) -> Result<Self, AnimationError> {
        if times.is_empty() {
            return Err(AnimationError::EmptyTrack { bone });
        }

        let check_len = |len: usize, what: &'static str| {
            if len == times.len() {
                Ok(())
            } else {
                Err(AnimationError::LengthMismatch {
                    bone,
                    times: times.len(),
                    len,
                    what,
                })
            }
        };
        check_len(translations.len(), "translation")?;
        check_len(rotations.len(), "rotation")?;
        if let Some(scales) = &scales {
            check_len(scales.len(), "scale")?;
        }

        if times[0] != 0.0 {
            return Err(AnimationError::FirstTimeNotZero {
                bone,
                time: times[0],
            });
        }

        if let Some(index) = times.windows(2).position(|w| w[1] < w[0]) {
            return Err(AnimationError::DecreasingTime {
                bone,
                index: index + 1,
            });
        }

        Ok(BoneTrack {
            bone,
            times: times.into(),
            translations: translations.into(),
            rotations: rotations.into(),
            scales: scales.map(Into::into),
        })
    }

    /// Index of the animated bone.
    pub fn bone(&self) -> usize {
        self.bone
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn translations(&self) -> &[na::Vector3<f32>] {
        &self.translations
    }

    pub fn rotations(&self) -> &[na::UnitQuaternion<f32>] {
        &self.rotations
    }

    pub fn scales(&self) -> Option<&[na::Vector3<f32>]> {
        self.scales.as_deref()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Local transform stored at a sample index.
    ///
    /// Tracks without scales yield unit scale.
    pub fn sample(&self, frame: usize) -> Result<Transform, AnimationError> {
        if frame >= self.len() {
            return Err(AnimationError::FrameOutOfRange {
                bone: self.bone,
                frame,
                len: self.len(),
            });
        }

        let scale = match &self.scales {
            Some(scales) => scales[frame],
            None => na::Vector3::new(1.0, 1.0, 1.0),
        };

        Ok(Transform::new(
            self.translations[frame],
            self.rotations[frame],
            scale,
        ))
    }
}

/// Named clip made of bone tracks.
///
/// Holds at most one track per bone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AnimationRepr", into = "AnimationRepr")]
pub struct Animation {
    pub name: String,

    /// Duration in seconds.
    pub length: f32,
    tracks: Vec<BoneTrack>,
}

impl Animation {
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Animation {
            name: name.into(),
            length,
            tracks: Vec::new(),
        }
    }

    /// Adds a track, replacing any previous track for the same bone.
    pub fn add_track(&mut self, track: BoneTrack) {
        match self.tracks.iter_mut().find(|t| t.bone == track.bone) {
            Some(existing) => {
                tracing::debug!(
                    "Replacing track for bone {} in animation `{}`",
                    track.bone,
                    self.name,
                );
                *existing = track;
            }
            None => self.tracks.push(track),
        }
    }

    pub fn with_track(mut self, track: BoneTrack) -> Self {
        self.add_track(track);
        self
    }

    pub fn tracks(&self) -> &[BoneTrack] {
        &self.tracks
    }

    pub fn track_for_bone(&self, bone: usize) -> Option<&BoneTrack> {
        self.tracks.iter().find(|t| t.bone == bone)
    }

    /// The track whose timestamps define the clip's frames.
    pub fn first_bone_track(&self) -> Option<&BoneTrack> {
        self.tracks.first()
    }

    pub fn frame_count(&self) -> usize {
        self.first_bone_track().map_or(0, BoneTrack::len)
    }

    pub fn times(&self) -> &[f32] {
        self.first_bone_track().map_or(&[][..], BoneTrack::times)
    }

    /// Checks that every track shares the first track's timestamps.
    pub fn check_shared_times(&self) -> Result<(), AnimationError> {
        let reference = match self.first_bone_track() {
            Some(track) => track,
            None => return Ok(()),
        };

        for track in &self.tracks[1..] {
            if track.times != reference.times {
                return Err(AnimationError::MismatchedTimes {
                    bone: track.bone,
                    reference: reference.bone,
                });
            }
        }
        Ok(())
    }

    /// Checks that every track targets an existing bone.
    pub fn check_bones(
        &self,
        bone_count: usize,
    ) -> Result<(), AnimationError> {
        match self.tracks.iter().find(|t| t.bone >= bone_count) {
            Some(track) => Err(AnimationError::UnknownBone {
                bone: track.bone,
                count: bone_count,
            }),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct AnimationRepr {
    name: String,
    length: f32,
    #[serde(default)]
    tracks: Vec<BoneTrack>,
}

impl TryFrom<AnimationRepr> for Animation {
    type Error = AnimationError;

    fn try_from(repr: AnimationRepr) -> Result<Self, AnimationError> {
        let mut animation = Animation::new(repr.name, repr.length);
        for track in repr.tracks {
            if animation.track_for_bone(track.bone).is_some() {
                return Err(AnimationError::DuplicateTrack {
                    bone: track.bone,
                });
            }
            animation.tracks.push(track);
        }
        Ok(animation)
    }
}

impl From<Animation> for AnimationRepr {
    fn from(animation: Animation) -> Self {
        AnimationRepr {
            name: animation.name,
            length: animation.length,
            tracks: animation.tracks,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct BoneTrackRepr {
    bone: usize,
    times: Vec<f32>,
    translations: Vec<na::Vector3<f32>>,
    rotations: Vec<na::Quaternion<f32>>,
    #[serde(default)]
    scales: Option<Vec<na::Vector3<f32>>>,
}

impl TryFrom<BoneTrackRepr> for BoneTrack {
    type Error = AnimationError;

    fn try_from(repr: BoneTrackRepr) -> Result<Self, AnimationError> {
        let rotations = repr
            .rotations
            .into_iter()
            .map(na::UnitQuaternion::new_normalize)
            .collect();

        BoneTrack::new(
            repr.bone,
            repr.times,
            repr.translations,
            rotations,
            repr.scales,
        )
    }
}

impl From<BoneTrack> for BoneTrackRepr {
    fn from(track: BoneTrack) -> Self {
        BoneTrackRepr {
            bone: track.bone,
            times: track.times.into_vec(),
            translations: track.translations.into_vec(),
            rotations: track
                .rotations
                .iter()
                .map(|r| r.into_inner())
                .collect(),
            scales: track.scales.map(|s| s.into_vec()),
        }
    }
}
