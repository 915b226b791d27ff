//! Archive packaging.
//!
//! Writes the loose pages of a chapter or volume into a `.cbz` (zip)
//! container. Subdirectories are flattened; entries are added in file name
//! order so archives are reproducible.

use crate::error::DownloadError;
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Packs every file under `folder` into `archive`, returning the entry count.
pub fn pack_folder(folder: &Path, archive: &Path) -> Result<usize, DownloadError> {
    let mut files = Vec::new();
    collect_files(folder, &mut files)?;
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent)?;
    }

    let out = File::create(archive)?;
    let mut zip = ZipWriter::new(out);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &files {
        add_file(&mut zip, path, options)?;
    }
    zip.finish()?.flush()?;

    Ok(files.len())
}

/// Packs `folder` and removes it once the archive is complete.
pub fn pack_and_remove(folder: &Path, archive: &Path) -> Result<usize, DownloadError> {
    let count = pack_folder(folder, archive)?;
    fs::remove_dir_all(folder)?;
    Ok(count)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn add_file<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    options: FileOptions,
) -> Result<(), DownloadError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable file name: {}", path.display()),
            )
        })?;

    zip.start_file(name, options)?;
    let mut file = File::open(path)?;
    io::copy(&mut file, zip)?;
    Ok(())
}
