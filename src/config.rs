use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".book-haven";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "library.sqlite";
const UPLOADS_DIR_NAME: &str = "uploads";
const EXPORT_FILE_NAME: &str = "exported_books.csv";
pub const LOG_FILE_NAME: &str = "book-haven.log";

/// Overrides the data directory when set.
pub const DATA_DIR_ENV: &str = "BOOK_HAVEN_DATA_DIR";
/// Password given to the `admin` account the first time the store is created.
pub const ADMIN_PASSWORD_ENV: &str = "BOOK_HAVEN_ADMIN_PASSWORD";
const DEFAULT_ADMIN_PASSWORD: &str = "12345678";

/// Runtime settings. Everything on disk lives under `data_dir`.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub admin_password: String,
}

impl Config {
    /// Read settings from the environment (a `.env` file is loaded by the
    /// binary beforehand), falling back to `~/.book-haven`.
    pub fn from_env() -> Result<Self> {
        let data_dir = match env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };
        let admin_password = env::var(ADMIN_PASSWORD_ENV)
            .ok()
            .filter(|password| !password.is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());

        Ok(Self {
            data_dir,
            admin_password,
        })
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOADS_DIR_NAME)
    }

    pub fn export_path(&self) -> PathBuf {
        self.data_dir.join(EXPORT_FILE_NAME)
    }

    /// Create the data and upload directories so the log writer and the
    /// database can open their files.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.uploads_dir()).with_context(|| {
            format!("failed to create data directory {}", self.data_dir.display())
        })
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}
