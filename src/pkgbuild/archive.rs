//! Source archive extraction
//!
//! Only gzip and bzip2 compressed tarballs are understood; the compression is
//! chosen from the final file extension (`.gz` or `.bz2`).

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use tracing::debug;

use crate::core::CmtError;

/// Compression of a source tarball.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// `.tar.gz`
    Gzip,
    /// `.tar.bz2`
    Bzip2,
}

impl Compression {
    /// Compression implied by the extension of `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default();
        match extension.as_str() {
            "gz" => Ok(Self::Gzip),
            "bz2" => Ok(Self::Bzip2),
            _ => Err(CmtError::UnsupportedArchive {
                path: path.display().to_string(),
                extension,
            }
            .into()),
        }
    }
}

/// Extracts the tarball `file` into `outdir`.
///
/// # Errors
///
/// [`CmtError::UnsupportedArchive`] for an unknown extension, I/O errors
/// for unreadable or corrupt archives.
pub fn uncompress(file: &Path, outdir: &Path) -> Result<()> {
    let compression = Compression::from_path(file)?;
    debug!(target: "pkgbuild", "uncompressing [{}] into [{}]...", file.display(), outdir.display());

    let input = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let reader: Box<dyn Read> = match compression {
        Compression::Gzip => Box::new(GzDecoder::new(input)),
        Compression::Bzip2 => Box::new(BzDecoder::new(input)),
    };
    Archive::new(reader)
        .unpack(outdir)
        .with_context(|| format!("Failed to extract {}", file.display()))
}
