use std::path::Path;
use std::process::Command;

use crate::config::{Config, config_file_path, ensure_config_file};
use crate::error::AppError;
use crate::path::display_path;

#[derive(Debug, Default)]
pub struct ConfigOptions {
    pub show_path: bool,
    pub edit: bool,
    pub sync_to_cloud: Option<bool>,
    pub metrics_enabled: Option<bool>,
}

pub fn execute_config(options: ConfigOptions) -> Result<(), AppError> {
    if options.show_path {
        let path = config_file_path()?;
        println!("Configuration file: {}", display_path(&path));
    }

    let updating = options.sync_to_cloud.is_some() || options.metrics_enabled.is_some();
    if updating {
        let mut config = Config::load()?;
        if let Some(sync) = options.sync_to_cloud {
            config.sync_to_cloud = sync;
            println!("Cloud sync {}.", if sync { "enabled" } else { "disabled" });
        }
        if let Some(metrics) = options.metrics_enabled {
            config.metrics_enabled = metrics;
            println!("Metrics {}.", if metrics { "enabled" } else { "disabled" });
        }
        config.save()?;
    }

    if options.edit {
        let path = ensure_config_file()?;
        open_editor(&path)?;
    }

    if !options.show_path && !updating && !options.edit {
        let path = config_file_path()?;
        let config = Config::load()?;
        println!("Configuration file: {}", display_path(&path));
        print!("{}", toml::to_string_pretty(&config)?);
    }

    Ok(())
}

fn open_editor(path: &Path) -> Result<(), AppError> {
    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| "nano".to_string());

    let status = Command::new(&editor)
        .arg(path)
        .status()
        .map_err(|err| AppError::Editor(err.to_string()))?;

    if status.success() {
        Ok(())
    } else {
        Err(AppError::Editor(format!("Editor exited with status {}", status)))
    }
}
