//! Pass package creation.
//!
//! Writes package members into an in-memory zip container. Members are
//! written in the order given, so identical inputs with a fixed modification
//! time produce identical archives.
//!
//! # Examples
//!
//! ```
//! use passkit::archive::{pack, ArchiveOptions, CompressionLevel, PackageMember};
//!
//! let members = vec![PackageMember::new("pass.json", b"{}".to_vec())];
//! let bytes = pack(&members, &ArchiveOptions::new().compression_level(CompressionLevel::NONE))?;
//! assert!(bytes.starts_with(b"PK"));
//! # Ok::<(), passkit::Error>(())
//! ```

use crate::{Error, Result};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// ZIP compression level for package creation.
///
/// Compression never changes the member bytes that the manifest hashes;
/// it only affects the size of the container.
///
/// # Examples
///
/// ```
/// use passkit::archive::CompressionLevel;
///
/// let fast = CompressionLevel::NONE;
/// let balanced = CompressionLevel::DEFAULT;
/// let small = CompressionLevel::MAX;
///
/// // Custom levels are clamped to 0-9
/// let custom = CompressionLevel::new(12);
/// assert_eq!(custom.level(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression (level 0). Members are stored.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Fast compression (level 1).
    pub const FAST: CompressionLevel = CompressionLevel(1);

    /// Default compression (level 6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum compression (level 9).
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::FAST
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// One named file inside a pass package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMember {
    pub name: String,
    pub content: Vec<u8>,
}

impl PackageMember {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }
}

/// Settings for the zip container.
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    compression_level: CompressionLevel,
    modified: Option<DateTime>,
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression level (default: fast).
    pub fn compression_level(mut self, level: impl Into<CompressionLevel>) -> Self {
        self.compression_level = level.into();
        self
    }

    /// Stamp every member with a fixed modification time.
    ///
    /// Without this the zip writer's default timestamp is used.
    pub fn modified(mut self, modified: DateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Stamp every member with a fixed modification time given as calendar
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the date cannot be represented in a zip
    /// entry (years before 1980 or after 2107, or out-of-range fields).
    pub fn modified_at(
        self,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self> {
        let modified = DateTime::from_date_and_time(year, month, day, hour, minute, second)
            .map_err(|_| {
                Error::Config(format!(
                    "Invalid archive timestamp {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                ))
            })?;
        Ok(self.modified(modified))
    }

    pub fn level(&self) -> CompressionLevel {
        self.compression_level
    }

    fn file_options(&self) -> SimpleFileOptions {
        let options = if self.compression_level.level() == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.compression_level.level() as i64))
        };

        match self.modified {
            Some(modified) => options.last_modified_time(modified),
            None => options,
        }
    }
}

/// Writes `members` into a zip container and returns its bytes.
///
/// # Errors
///
/// Returns [`Error::Archive`] if any member cannot be written or the archive
/// cannot be finalized. No partial archive is returned.
pub fn pack(members: &[PackageMember], options: &ArchiveOptions) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let file_options = options.file_options();

    for member in members {
        zip.start_file(member.name.as_str(), file_options)
            .map_err(|e| Error::Archive(format!("Failed to add {}: {}", member.name, e)))?;
        zip.write_all(&member.content)
            .map_err(|e| Error::Archive(format!("Failed to write {}: {}", member.name, e)))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| Error::Archive(format!("Failed to finalize archive: {}", e)))?;

    Ok(cursor.into_inner())
}
