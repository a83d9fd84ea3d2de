use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::AppError;
use dirs_next as dirs;

/// Replace the home directory prefix with `~` to make output easier to read.
pub fn display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        let mut display = PathBuf::from("~");
        display.push(stripped);
        return display.display().to_string();
    }

    path.display().to_string()
}

/// Expand a leading `~` against the home directory.
pub fn expand_home(value: &Path) -> PathBuf {
    let Some(text) = value.to_str() else {
        return value.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if text == "~" => home,
        Some(home) => match text.strip_prefix("~/") {
            Some(stripped) => home.join(stripped),
            None => value.to_path_buf(),
        },
        None => value.to_path_buf(),
    }
}

/// Resolve a user-supplied path to an absolute path that exists on disk.
///
/// `.` and `..` are folded lexically; symlinks are kept as the operator wrote them.
/// Mount sources are canonicalized separately when the run specification is built.
pub fn resolve_absolute(path: &Path) -> Result<PathBuf, AppError> {
    let expanded = expand_home(path);
    let path_error = |err: std::io::Error| AppError::Path { path: path.to_path_buf(), reason: err.to_string() };
    fs::metadata(&expanded).map_err(path_error)?;
    let absolute = std::path::absolute(&expanded).map_err(path_error)?;
    Ok(normalize(&absolute))
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Location of a previous scan's results artifact relative to the scanned repository.
pub fn results_artifact(repository: &Path, suffix: &Path) -> PathBuf {
    repository.join(suffix)
}
