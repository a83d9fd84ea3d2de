use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::config::ACCESS_KEY_ENV;
use crate::error::AppError;

/// Supplies the access key used to pull and run the scanning image.
pub trait AccessResolver {
    fn resolve(&self) -> Result<String, AppError>;
}

/// Reads the key from the environment, falling back to the stored key file.
/// A key supplied through the environment is persisted for later runs.
#[derive(Debug, Clone)]
pub struct KeyFileAccess {
    pub key_path: PathBuf,
}

impl KeyFileAccess {
    pub fn new(key_path: PathBuf) -> Self {
        Self { key_path }
    }
}

impl AccessResolver for KeyFileAccess {
    fn resolve(&self) -> Result<String, AppError> {
        if let Ok(from_env) = std::env::var(ACCESS_KEY_ENV) {
            let key = validate(&from_env)?;
            write_key_file(&self.key_path, &key)?;
            return Ok(key);
        }

        match fs::read_to_string(&self.key_path) {
            Ok(contents) => validate(&contents),
            Err(err) => Err(AppError::Access(format!(
                "no key in ${ACCESS_KEY_ENV} and {} is unreadable ({err})",
                self.key_path.display()
            ))),
        }
    }
}

/// Write the access key so that only the current user can read it.
pub fn write_key_file(path: &Path, key: &str) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        options.mode(0o600);
        let mut file = options.open(path)?;
        // `mode` only applies on creation; tighten a key file left by an older run.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(key.as_bytes())?;
    }
    #[cfg(not(unix))]
    {
        let mut file = options.open(path)?;
        file.write_all(key.as_bytes())?;
    }
    Ok(())
}

fn validate(raw: &str) -> Result<String, AppError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(AppError::Access("access key is empty".to_string()));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(AppError::Access("access key contains whitespace".to_string()));
    }
    Ok(key.to_string())
}

/// Identity values handed to the scanning engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_hash: String,
    pub session_id: String,
}

impl UserIdentity {
    pub fn from_access_key(key: &str) -> Self {
        Self { user_hash: sha256_hex(key.as_bytes()), session_id: new_session_id() }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn new_session_id() -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or_default();
    let seed = format!("{nanos}:{}", process::id());
    sha256_hex(seed.as_bytes())[..32].to_string()
}
