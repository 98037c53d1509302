use {
    crate::{error::SkeletonError, transform::Transform},
    serde::{Deserialize, Serialize},
    std::{collections::HashMap, convert::TryFrom},
};

/// Named node of a skeleton.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,

    /// Index of the parent bone. `None` for roots.
    #[serde(default)]
    pub parent: Option<usize>,

    /// Rest transform relative to the parent.
    #[serde(default)]
    pub bind: Transform,
}

impl Bone {
    pub fn new(
        name: impl Into<String>,
        parent: Option<usize>,
        bind: Transform,
    ) -> Self {
        Bone {
            name: name.into(),
            parent,
            bind,
        }
    }

    pub fn root(name: impl Into<String>, bind: Transform) -> Self {
        Bone::new(name, None, bind)
    }

    pub fn child(
        name: impl Into<String>,
        parent: usize,
        bind: Transform,
    ) -> Self {
        Bone::new(name, Some(parent), bind)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn bind(&self) -> &Transform {
        &self.bind
    }
}

/// Tree-like structure of bones.
///
/// Bones are addressed by index. Bind transforms are fixed once the
/// skeleton is built.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bone>", into = "Vec<Bone>")]
pub struct Skeleton {
    bones: Box<[Bone]>,
    children: Box<[Box<[usize]>]>,

    /// Bone indices, parents before children.
    order: Box<[usize]>,

    /// Position of each bone in `order`.
    position: Box<[usize]>,
    names: HashMap<String, usize>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Result<Self, SkeletonError> {
        let count = bones.len();
        let mut names = HashMap::with_capacity(count);
        let mut children = vec![Vec::new(); count];

        for (index, bone) in bones.iter().enumerate() {
            if bone.name.is_empty() {
                return Err(SkeletonError::EmptyName { index });
            }

            if let Some(first) = names.insert(bone.name.clone(), index) {
                return Err(SkeletonError::DuplicateName {
                    name: bone.name.clone(),
                    first,
                    second: index,
                });
            }

            if let Some(parent) = bone.parent {
                if parent >= count {
                    return Err(SkeletonError::ParentOutOfRange {
                        name: bone.name.clone(),
                        parent,
                        count,
                    });
                }
                children[parent].push(index);
            }
        }

        let mut order = Vec::with_capacity(count);
        let mut stack: Vec<usize> = (0..count)
            .rev()
            .filter(|&index| bones[index].parent.is_none())
            .collect();

        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(children[index].iter().rev());
        }

        // Bones on a cycle are unreachable from any root.
        if order.len() < count {
            let mut reached = vec![false; count];
            for &index in &order {
                reached[index] = true;
            }
            let index = reached.iter().position(|r| !r).unwrap_or(0);
            return Err(SkeletonError::Cycle {
                name: bones[index].name.clone(),
            });
        }

        let mut position = vec![0; count];
        for (pos, &index) in order.iter().enumerate() {
            position[index] = pos;
        }

        tracing::trace!("Skeleton with {} bones built", count);

        Ok(Skeleton {
            bones: bones.into_boxed_slice(),
            children: children.into_iter().map(Vec::into_boxed_slice).collect(),
            order: order.into_boxed_slice(),
            position: position.into_boxed_slice(),
            names,
        })
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn bone_by_name(&self, name: &str) -> Option<&Bone> {
        self.index_of(name).map(|index| &self.bones[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, bone)| bone.parent.is_none())
            .map(|(index, _)| index)
    }

    /// Bone indices in pre-order: every parent precedes its children.
    pub fn pre_order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn position(&self, index: usize) -> usize {
        self.position[index]
    }

    /// Model-space transforms of all bones in the bind pose.
    pub fn bind_model_transforms(&self) -> Vec<Transform> {
        let mut models = vec![Transform::identity(); self.len()];
        for &index in self.order.iter() {
            let bone = &self.bones[index];
            models[index] = match bone.parent {
                Some(parent) => models[parent].combine(&bone.bind),
                None => bone.bind,
            };
        }
        models
    }

    /// Vertical extent of the bind pose.
    pub fn height(&self) -> f32 {
        let models = self.bind_model_transforms();
        let (min, max) = models.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY),
            |(min, max), model| {
                let y = model.translation.y;
                (min.min(y), max.max(y))
            },
        );

        if models.is_empty() {
            0.0
        } else {
            max - min
        }
    }
}

impl TryFrom<Vec<Bone>> for Skeleton {
    type Error = SkeletonError;

    fn try_from(bones: Vec<Bone>) -> Result<Self, SkeletonError> {
        Skeleton::new(bones)
    }
}

impl From<Skeleton> for Vec<Bone> {
    fn from(skeleton: Skeleton) -> Self {
        skeleton.bones.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, nalgebra as na};

    fn offset(y: f32) -> Transform {
        Transform::from_translation(na::Vector3::new(0.0, y, 0.0))
    }

    #[test]
    fn pre_order_visits_parents_first() {
        // Children are listed before their parents on purpose.
        let skeleton = Skeleton::new(vec![
            Bone::child("hand", 2, offset(1.0)),
            Bone::root("root", offset(0.0)),
            Bone::child("arm", 1, offset(1.0)),
            Bone::child("leg", 1, offset(-1.0)),
        ])
        .unwrap();

        assert_eq!(skeleton.pre_order(), &[1, 2, 0, 3]);
        assert_eq!(skeleton.children(1), &[2, 3]);
        assert_eq!(skeleton.roots().collect::<Vec<_>>(), vec![1]);
        assert_eq!(skeleton.index_of("arm"), Some(2));
        assert_eq!(skeleton.position(0), 2);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Skeleton::new(vec![
            Bone::root("a", Transform::identity()),
            Bone::child("a", 0, Transform::identity()),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            SkeletonError::DuplicateName {
                name: "a".to_owned(),
                first: 0,
                second: 1,
            }
        );
    }

    #[test]
    fn rejects_cycles() {
        let err = Skeleton::new(vec![
            Bone::root("root", Transform::identity()),
            Bone::child("a", 2, Transform::identity()),
            Bone::child("b", 1, Transform::identity()),
        ])
        .unwrap_err();

        assert_eq!(err, SkeletonError::Cycle { name: "a".to_owned() });
    }

    #[test]
    fn rejects_parent_out_of_range() {
        let err =
            Skeleton::new(vec![Bone::child("a", 3, Transform::identity())])
                .unwrap_err();

        assert!(matches!(err, SkeletonError::ParentOutOfRange { .. }));
    }

    #[test]
    fn height_spans_bind_pose() {
        let skeleton = Skeleton::new(vec![
            Bone::root("root", offset(1.0)),
            Bone::child("up", 0, offset(2.0)),
            Bone::child("down", 0, offset(-0.5)),
        ])
        .unwrap();

        assert!((skeleton.height() - 2.5).abs() < 1e-6);
    }
}
