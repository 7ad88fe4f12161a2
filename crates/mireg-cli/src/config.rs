//! Registration settings from the command line and TOML files.

use std::path::Path;

use anyhow::{Context, Result};
use mireg_registration::RegistrationConfig;

/// Reads `path` as a TOML [`RegistrationConfig`], or starts from the defaults
/// when no file is given. `seed` overrides the file's sampling seed.
pub fn load_registration_config(path: Option<&Path>, seed: Option<u64>) -> Result<RegistrationConfig> {
    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<RegistrationConfig>(&contents).context("Invalid registration config")?
        }
        None => RegistrationConfig::default(),
    };
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    config.validate().context("Invalid registration config")?;
    Ok(config)
}
