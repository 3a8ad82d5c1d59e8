use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const APP_NAME: &str = "vt-cli";
const FILE_NAME: Option<&str> = None;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct UserConfig {
  pub apikey: Option<String>,
  pub host: Option<String>,
  pub threads: Option<usize>,
}

/// Read ~/.config/vt-cli/default-config.toml (or OS equivalent).
///
/// A missing or unreadable file yields the default configuration.
pub fn load() -> UserConfig {
  match confy::load(APP_NAME, FILE_NAME) {
    Ok(cfg) => cfg,
    Err(e) => {
      warn!("ignoring unreadable config file: {e}");
      UserConfig::default()
    }
  }
}

pub fn store(cfg: &UserConfig) -> anyhow::Result<()> {
  confy::store(APP_NAME, FILE_NAME, cfg)?;
  if let Ok(path) = path() {
    debug!("stored config at {}", path.display());
  }
  Ok(())
}

pub fn path() -> anyhow::Result<std::path::PathBuf> {
  confy::get_configuration_file_path(APP_NAME, FILE_NAME).map_err(Into::into)
}
