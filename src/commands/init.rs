//! Init command implementation

use crate::config::{Config, PathsConfig};
use crate::error::{Error, Result};
use crate::prompt::DEFAULT_TEMPLATE;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// What `init` left on disk
#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub config_path: PathBuf,
    pub notes_dir: PathBuf,
    pub prompt_path: PathBuf,
    /// False when an existing prompt template was kept
    pub prompt_written: bool,
}

/// Write a default config at `config_path`, create the notes directory and
/// seed the prompt template.
///
/// An existing config is only replaced with `force`. An existing prompt
/// template is never replaced, since it is usually hand edited.
pub fn cmd_init(config_path: &Path, force: bool) -> Result<InitOutcome> {
    if config_path.exists() && !force {
        return Err(Error::InvalidConfiguration(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_base_dir);

    let mut config = Config::default();
    config.paths = PathsConfig {
        base_dir,
        config_file: config_path.to_path_buf(),
    };
    config.validate()?;
    config.save()?;

    let notes_dir = config.notes_dir();
    std::fs::create_dir_all(&notes_dir).map_err(|e| Error::file_access(&notes_dir, e))?;
    info!("Notes directory ready at {:?}", notes_dir);

    let prompt_path = config.prompt_template_path();
    let prompt_written = !prompt_path.exists();
    if prompt_written {
        if let Some(parent) = prompt_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::file_access(parent, e))?;
        }
        std::fs::write(&prompt_path, DEFAULT_TEMPLATE)
            .map_err(|e| Error::file_access(&prompt_path, e))?;
        info!("Wrote prompt template to {:?}", prompt_path);
    }

    Ok(InitOutcome {
        config_path: config_path.to_path_buf(),
        notes_dir,
        prompt_path,
        prompt_written,
    })
}
