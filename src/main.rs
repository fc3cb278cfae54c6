mod app;

use anyhow::{Context, Result};
use rdk_experiment::SessionConfig;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!(
        "random dot motion task on {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = SessionConfig::load(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("loading config from {}", path.display()),
        None => "validating the default config".to_string(),
    })?;

    app::run(&config)
}
