//! Profile file, API directory lookup and per-run settings.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::help::pager::{self, Style};

pub const ENV_CONFIG_FILE: &str = "SVCCLI_CONFIG_FILE";
pub const ENV_API_DIR: &str = "SVCCLI_API_DIR";

const CONFIG_DIR: &str = ".svccli";
const CONFIG_FILE: &str = "config.toml";
const API_DIR: &str = "apis";

/// Contents of `~/.svccli/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_dir: Option<PathBuf>,
    pub profiles: BTreeMap<String, Profile>,
}

/// One named profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub access_key_id: Option<String>,
    pub secret_key: Option<String>,
    pub residency: Option<String>,
    pub endpoint: Option<String>,
    pub base_url: Option<String>,
}

impl Config {
    /// Load from `$SVCCLI_CONFIG_FILE` or the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var_os(ENV_CONFIG_FILE) {
            Some(path) => PathBuf::from(path),
            None => home_dir()?.join(CONFIG_DIR).join(CONFIG_FILE),
        };
        Self::load_from(&path)
    }

    /// A missing file is an empty config.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Where the per-service API documents live.
    pub fn api_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(ENV_API_DIR) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = &self.api_dir {
            return Ok(dir.clone());
        }
        Ok(home_dir()?.join(CONFIG_DIR).join(API_DIR))
    }
}

fn home_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::NoHome {
        var: ENV_CONFIG_FILE,
    })
}

/// Settings for one run, fixed before parsing starts.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub debug: bool,
    /// Shows a rendered help page.
    pub pager: fn(&str) -> io::Result<()>,
    pub style: Style,
}

impl RuntimeConfig {
    /// Page through `less` when attached to a terminal, else print plainly.
    pub fn detect(debug: bool) -> Self {
        if pager::terminal_pager_available() {
            Self {
                debug,
                pager: pager::page_with_less,
                style: Style::TERMINAL,
            }
        } else {
            Self::plain(debug)
        }
    }

    pub fn plain(debug: bool) -> Self {
        Self {
            debug,
            pager: pager::print_plain,
            style: Style::PLAIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn profiles_are_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
api_dir = "/srv/apis"

[profiles.default]
access_key_id = "AK"
secret_key = "SK"

[profiles.eu]
residency = "emea"
endpoint = "integration"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.api_dir, Some(PathBuf::from("/srv/apis")));
        assert_eq!(config.profiles["default"].access_key_id.as_deref(), Some("AK"));
        assert_eq!(config.profiles["eu"].residency.as_deref(), Some("emea"));
        assert_eq!(config.profiles["eu"].secret_key, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "profiles = [").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn plain_runtime_has_no_decoration() {
        let runtime = RuntimeConfig::plain(true);
        assert!(runtime.debug);
        assert_eq!(runtime.style, Style::PLAIN);
    }
}
