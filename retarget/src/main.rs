mod config;

use {
    self::config::{load_ron, Config},
    animate::{retarget, Animation, MappingTable, Skeleton},
    color_eyre::Report,
    eyre::WrapErr,
    tracing_subscriber::{prelude::*, EnvFilter},
};

fn main() -> Result<(), Report> {
    install_tracing();
    color_eyre::install()?;

    let config = Config::load_default()?;
    run(&config)
}

fn install_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_error::ErrorLayer::default())
        .init();
}

#[tracing::instrument(skip(config))]
fn run(config: &Config) -> Result<(), Report> {
    let source: Skeleton = load_ron(&config.source_skeleton)?;
    let target: Skeleton = load_ron(&config.target_skeleton)?;
    let animation: Animation = load_ron(&config.source_animation)?;
    let mut map: MappingTable = load_ron(&config.map)?;

    if config.invert_map {
        map = map.invert();
    }

    tracing::info!(
        "Map matches {:.1}% of source and {:.1}% of target bones",
        map.matches_source(&source) * 100.0,
        map.matches_target(&target) * 100.0,
    );
    if map.has_invalid_mappings(&source, &target) {
        tracing::warn!("Map refers to bones missing from the skeletons");
    }

    let options = config.options(&animation.name, &source, &target)?;
    let result = retarget(&source, &animation, &target, &map, &options)
        .wrap_err_with(|| {
            format!("Failed to retarget animation `{}`", animation.name)
        })?;

    tracing::info!(
        "Animation `{}` with {} tracks and length {}s produced",
        result.name,
        result.tracks().len(),
        result.length,
    );

    let text = ron::ser::to_string_pretty(
        &result,
        ron::ser::PrettyConfig::default(),
    )?;
    std::fs::write(&config.output, text).wrap_err_with(|| {
        format!("Failed to write `{}`", config.output.display())
    })?;

    Ok(())
}
