//! Zip archive handling for execution inputs and outputs

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive entry '{0}' would be written outside the target directory")]
    UnsafePath(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

/// Extracts a zip archive into `dest`, returning entry names in archive order
pub fn extract(data: &[u8], dest: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut names = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafePath(entry.name().to_string()))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&target)?;
            io::copy(&mut entry, &mut file)?;
        }

        names.push(entry.name().to_string());
    }

    Ok(names)
}

/// Packs every file under `dir` into a deflated zip, paths relative to `dir`
///
/// An empty directory yields a valid empty archive.
pub fn pack_dir(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| ArchiveError::UnsafePath(entry.path().display().to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        writer.start_file(name, options)?;
        io::copy(&mut File::open(entry.path())?, &mut writer)?;
    }

    Ok(writer.finish()?.into_inner())
}
