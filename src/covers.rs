//! Storage for uploaded cover images. The catalog only records the reference
//! a store hands back; where the bytes end up is the store's business.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{CatalogError, Result};

/// Image types the add form accepts.
const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
/// Suffixes tried (`name-1.jpg`, `name-2.jpg`, ...) before giving up on a
/// crowded file name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A cover image travelling alongside an `add_book` call.
#[derive(Debug, Clone)]
pub struct CoverUpload {
    /// Original file name; only its final component and extension are used.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl CoverUpload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a cover from disk, keeping its file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| CatalogError::Io {
            action: format!("failed to read cover image {}", path.display()),
            source,
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }
}

/// Blob storage collaborator: persist `bytes` under `name` and return the
/// reference to record in `books.cover_path`. Every call gets its own
/// reference; an earlier cover is never replaced.
pub trait CoverStore {
    fn store(&self, name: &str, bytes: &[u8]) -> Result<String>;

    /// Drop a cover stored by this store. Missing covers are not an error.
    fn remove(&self, reference: &str) -> Result<()>;
}

/// Keep covers as plain files inside one directory.
#[derive(Debug, Clone)]
pub struct FsCoverStore {
    dir: PathBuf,
}

impl FsCoverStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CoverStore for FsCoverStore {
    fn store(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let file_name = sanitize_file_name(name)?;

        fs::create_dir_all(&self.dir).map_err(|source| CatalogError::Io {
            action: format!("failed to create upload directory {}", self.dir.display()),
            source,
        })?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(numbered_name(&file_name, attempt));
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(CatalogError::Io {
                        action: format!("failed to create cover image {}", path.display()),
                        source,
                    })
                }
            };

            if let Err(source) = file.write_all(bytes) {
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(CatalogError::Io {
                    action: format!("failed to write cover image {}", path.display()),
                    source,
                });
            }

            info!(path = %path.display(), size = bytes.len(), "stored cover image");
            return Ok(path.to_string_lossy().into_owned());
        }

        Err(CatalogError::validation(
            "cover",
            format!("too many covers already named \"{file_name}\""),
        ))
    }

    fn remove(&self, reference: &str) -> Result<()> {
        match fs::remove_file(reference) {
            Ok(()) => {
                debug!(path = reference, "removed cover image");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CatalogError::Io {
                action: format!("failed to remove cover image {reference}"),
                source,
            }),
        }
    }
}

/// `dune.jpg` for the first attempt, then `dune-1.jpg`, `dune-2.jpg`, ...
fn numbered_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    match path.extension() {
        Some(ext) => format!("{stem}-{attempt}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{attempt}"),
    }
}

/// Strip any directory components and insist on an image extension.
fn sanitize_file_name(name: &str) -> Result<String> {
    let file_name = Path::new(name.trim())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CatalogError::validation("cover", "file name is required"))?;

    let extension = Path::new(&file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(file_name),
        _ => Err(CatalogError::validation(
            "cover",
            format!("\"{file_name}\" must be a .jpg, .jpeg or .png image"),
        )),
    }
}
