use {
    crate::{
        skeleton::Skeleton,
        transform::rotations_equal,
        twist::{self, Axis},
    },
    nalgebra as na,
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

/// Fraction of matching bone names below which a table is considered
/// invalid for a skeleton.
pub const MATCH_THRESHOLD: f32 = 0.9995;

/// Correspondence of one target bone to source bone(s).
#[derive(Clone, Debug, PartialEq)]
pub struct BoneMapping {
    target: String,
    sources: Vec<String>,
    twist: na::UnitQuaternion<f32>,
}

impl BoneMapping {
    pub fn new(target: impl Into<String>, source: impl Into<String>) -> Self {
        BoneMapping::with_twist(target, source, na::UnitQuaternion::identity())
    }

    pub fn with_twist(
        target: impl Into<String>,
        source: impl Into<String>,
        twist: na::UnitQuaternion<f32>,
    ) -> Self {
        BoneMapping {
            target: target.into(),
            sources: vec![source.into()],
            twist,
        }
    }

    pub fn with_axis_angle(
        target: impl Into<String>,
        source: impl Into<String>,
        axis: &na::Unit<na::Vector3<f32>>,
        angle: f32,
    ) -> Self {
        let twist = na::UnitQuaternion::from_axis_angle(axis, angle);
        BoneMapping::with_twist(target, source, twist)
    }

    /// Appends more source bones for a many-to-one mapping.
    pub fn add_source_bones<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Primary source bone name.
    pub fn source(&self) -> &str {
        &self.sources[0]
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn twist(&self) -> &na::UnitQuaternion<f32> {
        &self.twist
    }

    pub fn set_twist(&mut self, twist: na::UnitQuaternion<f32>) {
        self.twist = twist;
    }
}

/// Target-to-source bone correspondences with twist corrections.
///
/// Entries keep insertion order, which is also the persisted order.
/// Bone names are not validated against any skeleton here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<MappingRecord>", into = "Vec<MappingRecord>")]
pub struct MappingTable {
    mappings: Vec<BoneMapping>,
    by_target: HashMap<String, usize>,
}

impl MappingTable {
    pub fn new() -> Self {
        MappingTable::default()
    }

    /// Table mapping every bone of `skeleton` onto itself.
    pub fn identity(skeleton: &Skeleton) -> Self {
        let mut table = MappingTable::new();
        for bone in skeleton.bones() {
            table.insert(BoneMapping::new(bone.name(), bone.name()));
        }
        table
    }

    /// Maps `target` from `source`.
    ///
    /// Replaces and returns a previous mapping for `target`, if any.
    pub fn add_mapping(
        &mut self,
        target: impl Into<String>,
        source: impl Into<String>,
        twist: na::UnitQuaternion<f32>,
    ) -> Option<BoneMapping> {
        self.insert(BoneMapping::with_twist(target, source, twist))
    }

    /// Inserts a mapping. Last write wins.
    pub fn insert(&mut self, mapping: BoneMapping) -> Option<BoneMapping> {
        match self.by_target.get(&mapping.target) {
            Some(&index) => {
                tracing::warn!(
                    "Multiple mappings for target bone `{}`",
                    mapping.target,
                );
                Some(std::mem::replace(&mut self.mappings[index], mapping))
            }
            None => {
                self.by_target
                    .insert(mapping.target.clone(), self.mappings.len());
                self.mappings.push(mapping);
                None
            }
        }
    }

    pub fn remove(&mut self, target: &str) -> Option<BoneMapping> {
        let index = self.by_target.remove(target)?;
        let removed = self.mappings.remove(index);
        for slot in self.by_target.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.mappings.clear();
        self.by_target.clear();
    }

    pub fn mapping_for_target(&self, target: &str) -> Option<&BoneMapping> {
        self.by_target.get(target).map(|&index| &self.mappings[index])
    }

    /// First mapping in table order whose primary source is `source`.
    ///
    /// Several targets may share a source; only one is returned.
    pub fn mapping_for_source(&self, source: &str) -> Option<&BoneMapping> {
        self.mappings.iter().find(|m| m.source() == source)
    }

    pub fn is_target_mapped(&self, target: &str) -> bool {
        self.by_target.contains_key(target)
    }

    pub fn is_source_mapped(&self, source: &str) -> bool {
        self.mapping_for_source(source).is_some()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoneMapping> + '_ {
        self.mappings.iter()
    }

    pub fn target_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.mappings.iter().map(BoneMapping::target)
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.mappings.iter().map(BoneMapping::source)
    }

    pub fn set_twist(
        &mut self,
        target: &str,
        twist: na::UnitQuaternion<f32>,
    ) -> bool {
        match self.mapping_mut(target) {
            Some(mapping) => {
                mapping.twist = twist;
                true
            }
            None => false,
        }
    }

    pub fn snap_twist(&mut self, target: &str, axis: Axis) -> bool {
        match self.mapping_mut(target) {
            Some(mapping) => {
                mapping.twist = twist::snap(&mapping.twist, axis);
                true
            }
            None => false,
        }
    }

    pub fn cardinalize_twist(&mut self, target: &str) -> bool {
        match self.mapping_mut(target) {
            Some(mapping) => {
                mapping.twist = twist::cardinalize(&mapping.twist);
                true
            }
            None => false,
        }
    }

    /// Swaps source and target roles and inverts every twist.
    ///
    /// Each source name of a many-to-one entry becomes a target of its own.
    /// Targets sharing a source are merged into one many-to-one entry that
    /// keeps the first twist, so inverting twice restores the table.
    pub fn invert(&self) -> MappingTable {
        let mut inverse = MappingTable::new();
        for mapping in &self.mappings {
            let twist = mapping.twist.inverse();
            for source in &mapping.sources {
                match inverse.by_target.get(source.as_str()).copied() {
                    Some(index) => {
                        let merged = &mut inverse.mappings[index];
                        if !rotations_equal(&merged.twist, &twist, 1e-6) {
                            tracing::warn!(
                                "Bones `{}` and `{}` share source `{}` with \
                                 different twists, keeping the first",
                                merged.source(),
                                mapping.target,
                                source,
                            );
                        }
                        merged.sources.push(mapping.target.clone());
                    }
                    None => {
                        inverse.insert(BoneMapping::with_twist(
                            source.as_str(),
                            mapping.target.as_str(),
                            twist,
                        ));
                    }
                }
            }
        }
        inverse
    }

    /// Same mappings in the same order, twists equal up to sign.
    pub fn is_equivalent(&self, other: &MappingTable, epsilon: f32) -> bool {
        self.len() == other.len()
            && self.mappings.iter().zip(&other.mappings).all(|(a, b)| {
                a.target == b.target
                    && a.sources == b.sources
                    && rotations_equal(&a.twist, &b.twist, epsilon)
            })
    }

    /// Fraction of source names found in `skeleton`.
    pub fn matches_source(&self, skeleton: &Skeleton) -> f32 {
        match_fraction(self.source_names(), self.len(), skeleton)
    }

    /// Fraction of target names found in `skeleton`.
    pub fn matches_target(&self, skeleton: &Skeleton) -> f32 {
        match_fraction(self.target_names(), self.len(), skeleton)
    }

    pub fn has_invalid_mappings(
        &self,
        source: &Skeleton,
        target: &Skeleton,
    ) -> bool {
        self.matches_source(source) < MATCH_THRESHOLD
            || self.matches_target(target) < MATCH_THRESHOLD
    }

    fn mapping_mut(&mut self, target: &str) -> Option<&mut BoneMapping> {
        let index = *self.by_target.get(target)?;
        Some(&mut self.mappings[index])
    }
}

fn match_fraction<'a>(
    names: impl Iterator<Item = &'a str>,
    count: usize,
    skeleton: &Skeleton,
) -> f32 {
    if count == 0 {
        return 1.0;
    }
    let found = names.filter(|name| skeleton.contains(name)).count();
    found as f32 / count as f32
}

/// Persisted form of a bone mapping.
#[derive(Clone, Serialize, Deserialize)]
struct MappingRecord {
    target: String,
    source: SourceNames,

    /// Quaternion as `[x, y, z, w]`.
    #[serde(default = "identity_twist")]
    twist: [f32; 4],
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SourceNames {
    One(String),
    Many(Vec<String>),
}

fn identity_twist() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl From<Vec<MappingRecord>> for MappingTable {
    fn from(records: Vec<MappingRecord>) -> Self {
        let mut table = MappingTable::new();
        for record in records {
            let sources = match record.source {
                SourceNames::One(name) => vec![name],
                SourceNames::Many(names) if names.is_empty() => {
                    tracing::warn!(
                        "Mapping for target bone `{}` has no source bones",
                        record.target,
                    );
                    continue;
                }
                SourceNames::Many(names) => names,
            };
            let [x, y, z, w] = record.twist;
            table.insert(BoneMapping {
                target: record.target,
                sources,
                twist: na::UnitQuaternion::new_normalize(na::Quaternion::new(
                    w, x, y, z,
                )),
            });
        }
        table
    }
}

impl From<MappingTable> for Vec<MappingRecord> {
    fn from(table: MappingTable) -> Self {
        table
            .mappings
            .into_iter()
            .map(|mapping| {
                let c = mapping.twist.coords;
                let source = match mapping.sources.len() {
                    1 => SourceNames::One(mapping.sources[0].clone()),
                    _ => SourceNames::Many(mapping.sources),
                };
                MappingRecord {
                    target: mapping.target,
                    source,
                    twist: [c.x, c.y, c.z, c.w],
                }
            })
            .collect()
    }
}
