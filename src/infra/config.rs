use crate::domain::{AliasTable, AliasTableFile};
use crate::ui::theme::DEFAULT_THEME;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".claudelogrc";
pub const THEME_ENV: &str = "CLAUDELOG_THEME";
pub const ALIASES_ENV: &str = "CLAUDELOG_ALIASES";

/// Contents of `~/.claudelogrc`. Every key is optional.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub theme: Option<String>,
    /// Option string used when `-s` is not given.
    pub show: Option<String>,
    pub aliases: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn config_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

pub fn load_config(path: &Path) -> Result<AppConfig, LoadConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Ok(AppConfig::default());
        }
        Err(error) => return Err(error.into()),
    };
    Ok(serde_json::from_str(&raw)?)
}

/// A broken config file never stops the viewer; it is reported and ignored.
pub fn load_config_or_default(path: Option<&Path>) -> AppConfig {
    let Some(path) = path else {
        return AppConfig::default();
    };
    match load_config(path) {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "ignoring config file");
            AppConfig::default()
        }
    }
}

/// `--theme` > `--no-color` > environment > config file > default.
pub fn determine_theme<'a>(
    cli_theme: Option<&'a str>,
    no_color: bool,
    env_theme: Option<&'a str>,
    config: &'a AppConfig,
) -> &'a str {
    if let Some(theme) = cli_theme.filter(|theme| !theme.is_empty() && *theme != "list") {
        return theme;
    }
    if no_color {
        return "mono";
    }
    if let Some(theme) = env_theme.filter(|theme| !theme.is_empty()) {
        return theme;
    }
    config.theme.as_deref().unwrap_or(DEFAULT_THEME)
}

/// `--aliases` > environment > config file. `None` means the built-in table.
pub fn alias_table_path(
    cli_path: Option<&Path>,
    env_path: Option<&Path>,
    config: &AppConfig,
) -> Option<PathBuf> {
    cli_path
        .or(env_path)
        .or(config.aliases.as_deref())
        .map(Path::to_path_buf)
}

#[derive(Debug, Error)]
pub enum LoadAliasTableError {
    #[error("failed to read alias table {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse alias table {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Built-in aliases with the file's sections laid over them.
pub fn load_alias_table(path: &Path) -> Result<AliasTable, LoadAliasTableError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadAliasTableError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: AliasTableFile =
        serde_json::from_str(&raw).map_err(|source| LoadAliasTableError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(AliasTable::default().with_overrides(file))
}
