use {
    animate::{RetargetError, RetargetOptions, Skeleton},
    color_eyre::Report,
    eyre::WrapErr,
    nalgebra as na,
    std::path::{Path, PathBuf},
};

/// One retarget job.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    pub source_skeleton: PathBuf,
    pub source_animation: PathBuf,
    pub target_skeleton: PathBuf,
    pub map: PathBuf,
    pub output: PathBuf,

    /// Name of the produced animation. Defaults to the source animation's.
    #[serde(default)]
    pub name: Option<String>,

    /// Use the map with source and target roles swapped.
    #[serde(default)]
    pub invert_map: bool,

    #[serde(default)]
    pub ratio: RatioConfig,

    #[serde(default)]
    pub skip_first_frame: bool,

    #[serde(default)]
    pub carry_translations: bool,

    #[serde(default)]
    pub frame_period: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
pub enum RatioConfig {
    Unit,
    Uniform(f32),
    PerAxis((f32, f32, f32)),
    SkeletonHeight,
}

impl Default for RatioConfig {
    fn default() -> Self {
        RatioConfig::Unit
    }
}

impl Config {
    pub fn load_default() -> Result<Self, Report> {
        let path = std::env::args_os()
            .nth(1)
            .or_else(|| std::env::var_os("MAUD_RETARGET_CONFIG_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./retarget.ron"));

        Self::load(&path)
    }

    #[tracing::instrument]
    pub fn load(path: &Path) -> Result<Self, Report> {
        load_ron(path)
    }

    pub fn options(
        &self,
        default_name: &str,
        source: &Skeleton,
        target: &Skeleton,
    ) -> Result<RetargetOptions, RetargetError> {
        let name = self.name.as_deref().unwrap_or(default_name);
        let mut options = RetargetOptions::new(name);
        options.skip_first_frame = self.skip_first_frame;
        options.carry_translations = self.carry_translations;
        options.frame_period = self.frame_period;

        match self.ratio {
            RatioConfig::Unit => {}
            RatioConfig::Uniform(ratio) => {
                options.ratio = na::Vector3::new(ratio, ratio, ratio);
            }
            RatioConfig::PerAxis((x, y, z)) => {
                options.ratio = na::Vector3::new(x, y, z);
            }
            RatioConfig::SkeletonHeight => {
                options = options.with_height_ratio(source, target)?;
            }
        }
        Ok(options)
    }
}

/// Reads a RON document from a file.
pub fn load_ron<T>(path: &Path) -> Result<T, Report>
where
    T: serde::de::DeserializeOwned,
{
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("Failed to open `{}`", path.display()))?;
    let value = ron::de::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse `{}`", path.display()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        animate::{Bone, Transform},
    };

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = ron::de::from_str(
            r#"(
                source_skeleton: "a.ron",
                source_animation: "walk.ron",
                target_skeleton: "b.ron",
                map: "a_to_b.ron",
                output: "walk_b.ron",
            )"#,
        )
        .unwrap();

        assert_eq!(config.ratio, RatioConfig::Unit);
        assert!(!config.invert_map);
        assert!(config.name.is_none());
    }

    #[test]
    fn options_follow_config() {
        let config: Config = ron::de::from_str(
            r#"(
                source_skeleton: "a.ron",
                source_animation: "walk.ron",
                target_skeleton: "b.ron",
                map: "a_to_b.ron",
                output: "walk_b.ron",
                name: Some("walk_b"),
                ratio: PerAxis((1.0, 2.0, 3.0)),
                skip_first_frame: true,
            )"#,
        )
        .unwrap();

        let skeleton =
            Skeleton::new(vec![Bone::root("Root", Transform::identity())])
                .unwrap();
        let options = config.options("walk", &skeleton, &skeleton).unwrap();

        assert_eq!(options.name, "walk_b");
        assert_eq!(options.ratio, na::Vector3::new(1.0, 2.0, 3.0));
        assert!(options.skip_first_frame);
        assert!(!options.carry_translations);
    }
}
