//! Atomic file operations for small structured documents.
//!
//! Provides a thin layer for safe concurrent access to the TOML configuration
//! and the JSON history files.

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Errors that can occur during atomic file operations.
#[derive(Debug)]
pub enum AtomicFileError {
    /// File I/O error.
    IoError(std::io::Error),
    /// Document could not be parsed.
    ParseError(String),
    /// Document could not be serialized.
    SerializeError(String),
    /// File locking error.
    LockError(String),
}

impl std::fmt::Display for AtomicFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicFileError::IoError(e) => write!(f, "I/O error: {}", e),
            AtomicFileError::ParseError(e) => write!(f, "Parse error: {}", e),
            AtomicFileError::SerializeError(e) => write!(f, "Serialization error: {}", e),
            AtomicFileError::LockError(e) => write!(f, "Lock error: {}", e),
        }
    }
}

impl std::error::Error for AtomicFileError {}

impl From<std::io::Error> for AtomicFileError {
    fn from(e: std::io::Error) -> Self {
        AtomicFileError::IoError(e)
    }
}

impl From<AtomicFileError> for daydream_core::DaydreamError {
    fn from(e: AtomicFileError) -> Self {
        match e {
            AtomicFileError::IoError(io) => io.into(),
            other => daydream_core::DaydreamError::persistence(other.to_string()),
        }
    }
}

/// On-disk encoding of an [`AtomicFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
}

impl FileFormat {
    fn decode<T: DeserializeOwned>(self, content: &str) -> Result<T, AtomicFileError> {
        match self {
            FileFormat::Toml => {
                toml::from_str(content).map_err(|e| AtomicFileError::ParseError(e.to_string()))
            }
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| AtomicFileError::ParseError(e.to_string())),
        }
    }

    fn encode<T: Serialize>(self, data: &T) -> Result<String, AtomicFileError> {
        match self {
            FileFormat::Toml => toml::to_string_pretty(data)
                .map_err(|e| AtomicFileError::SerializeError(e.to_string())),
            FileFormat::Json => serde_json::to_string_pretty(data)
                .map_err(|e| AtomicFileError::SerializeError(e.to_string())),
        }
    }
}

/// A handle to a structured file that is replaced atomically.
///
/// Provides:
/// - **Atomicity**: Updates are all-or-nothing via tmp file + atomic rename
/// - **Isolation**: Writers serialize on an advisory `<path>.lock` file
/// - **Durability**: Explicit fsync before rename
pub struct AtomicFile<T> {
    path: PathBuf,
    format: FileFormat,
    _phantom: PhantomData<T>,
}

impl<T> AtomicFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a new handle.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the file
    /// * `format` - Encoding used for load and save
    pub fn new(path: PathBuf, format: FileFormat) -> Self {
        Self {
            path,
            format,
            _phantom: PhantomData,
        }
    }

    pub fn toml(path: PathBuf) -> Self {
        Self::new(path, FileFormat::Toml)
    }

    pub fn json(path: PathBuf) -> Self {
        Self::new(path, FileFormat::Json)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicFileError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        self.format.decode(&content).map(Some)
    }

    /// Saves data atomically via a temporary file and rename, holding the
    /// file lock for the duration of the write.
    pub fn save(&self, data: &T) -> Result<(), AtomicFileError> {
        let _lock = FileLock::acquire(&self.path)?;
        self.write_unlocked(data)
    }

    /// Writes `data` only if the file is missing or empty.
    ///
    /// The existence check and the write happen under the same lock, so two
    /// concurrent callers cannot both create the file. Returns `true` when
    /// this call wrote it.
    pub fn create(&self, data: &T) -> Result<bool, AtomicFileError> {
        let _lock = FileLock::acquire(&self.path)?;
        if self.load()?.is_some() {
            return Ok(false);
        }
        self.write_unlocked(data)?;
        Ok(true)
    }

    fn write_unlocked(&self, data: &T) -> Result<(), AtomicFileError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = self.format.encode(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(content.as_bytes())?;

        // Ensure data is written to disk
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicFileError> {
        let parent = self.path.parent().ok_or_else(|| {
            AtomicFileError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        })?;

        let file_name = self.path.file_name().ok_or_else(|| {
            AtomicFileError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no file name",
            ))
        })?;

        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(parent.join(tmp_name))
    }
}

/// Exclusive advisory lock on `<path>.lock`, released when dropped.
///
/// The lock file is left in place: unlinking it while another process waits
/// on the old inode would let a third one lock a fresh file concurrently.
struct FileLock {
    _file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, AtomicFileError> {
        let lock_path = path.with_extension("lock");

        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive().map_err(|e| {
                AtomicFileError::LockError(format!("Failed to acquire lock: {}", e))
            })?;
        }

        Ok(FileLock { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        name: String,
        count: u32,
    }

    #[test]
    fn test_save_and_load_both_formats() {
        let temp_dir = TempDir::new().unwrap();
        let value = Counter {
            name: "dreams".to_string(),
            count: 3,
        };

        for (file, format) in [("c.toml", FileFormat::Toml), ("c.json", FileFormat::Json)] {
            let atomic = AtomicFile::<Counter>::new(temp_dir.path().join(file), format);
            atomic.save(&value).unwrap();
            assert_eq!(atomic.load().unwrap(), Some(value.clone()));
        }
    }

    #[test]
    fn test_load_missing_or_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.json");
        let atomic = AtomicFile::<Counter>::json(path.clone());
        assert!(atomic.load().unwrap().is_none());

        fs::write(&path, "  \n").unwrap();
        assert!(atomic.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let atomic = AtomicFile::<Counter>::json(path);
        assert!(matches!(atomic.load(), Err(AtomicFileError::ParseError(_))));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("c.toml");
        let atomic = AtomicFile::<Counter>::toml(path.clone());

        atomic
            .save(&Counter {
                name: "d".to_string(),
                count: 10,
            })
            .unwrap();

        assert_eq!(atomic.load().unwrap().unwrap().count, 10);
        assert!(!temp_dir.path().join("nested").join(".c.toml.tmp").exists());
        assert!(path.with_extension("lock").exists());
    }

    #[test]
    fn test_create_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let atomic = AtomicFile::<Counter>::json(temp_dir.path().join("c.json"));
        let first = Counter {
            name: "first".to_string(),
            count: 1,
        };
        let second = Counter {
            name: "second".to_string(),
            count: 2,
        };

        assert!(atomic.create(&first).unwrap());
        assert!(!atomic.create(&second).unwrap());
        assert_eq!(atomic.load().unwrap(), Some(first));
    }

    #[cfg(unix)]
    #[test]
    fn test_concurrent_saves_keep_file_parseable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.json");

        let writers: Vec<_> = (0..8)
            .map(|count| {
                let path = path.clone();
                std::thread::spawn(move || {
                    AtomicFile::<Counter>::json(path)
                        .save(&Counter {
                            name: format!("writer-{count}"),
                            count,
                        })
                        .unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let loaded = AtomicFile::<Counter>::json(path).load().unwrap().unwrap();
        assert_eq!(loaded.name, format!("writer-{}", loaded.count));
    }
}
