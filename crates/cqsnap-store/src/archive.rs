//! Deterministic directory archives
//!
//! Source trees and partial databases are stored as gzip'd tar archives.
//! Entries are written in sorted path order with zeroed mtime, uid and gid,
//! so archiving the same tree twice yields identical bytes.

use crate::errors::{archive_error, io_error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Component, Path};
use tar::{Builder, EntryType, Header};
use walkdir::WalkDir;

/// Required suffix of an archive file
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Archive `dir` into a new file at `out`
///
/// `dir` must be a directory, `out` must not exist and must end in
/// [`ARCHIVE_SUFFIX`].
pub fn archive_dir(dir: &Path, out: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(archive_error(
            "archive_dir",
            format!("source path {} is not a directory", dir.display()),
        ));
    }
    if out.exists() {
        return Err(archive_error(
            "archive_dir",
            format!("archive path {} already exists", out.display()),
        ));
    }
    if !out.to_string_lossy().ends_with(ARCHIVE_SUFFIX) {
        return Err(archive_error(
            "archive_dir",
            format!("archive path {} does not end with '{}'", out.display(), ARCHIVE_SUFFIX),
        ));
    }

    let file = File::options()
        .write(true)
        .create_new(true)
        .open(out)
        .map_err(|e| io_error("archive_create", e))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut entries = 0usize;
    for entry in WalkDir::new(dir).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = entry.map_err(|e| archive_error("archive_walk", e.to_string()))?;
        let path = entry.path();
        if path == dir {
            continue;
        }
        let rel = path
            .strip_prefix(dir)
            .map_err(|e| archive_error("archive_walk", e.to_string()))?;
        let metadata =
            fs::symlink_metadata(path).map_err(|e| io_error("archive_metadata", e))?;
        let file_type = metadata.file_type();

        let mut header = Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        let appended = if file_type.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder.append_data(&mut header, rel, std::io::empty())
        } else if file_type.is_file() {
            header.set_entry_type(EntryType::Regular);
            header.set_mode(if is_executable(&metadata) { 0o755 } else { 0o644 });
            header.set_size(metadata.len());
            let file = File::open(path).map_err(|e| io_error("archive_read", e))?;
            builder.append_data(&mut header, rel, file)
        } else if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(|e| io_error("archive_read_link", e))?;
            if target.is_absolute() {
                tracing::debug!(path = %path.display(), "Skipping absolute symlink");
                continue;
            }
            header.set_entry_type(EntryType::Symlink);
            header.set_mode(0o777);
            header.set_size(0);
            builder.append_link(&mut header, rel, &target)
        } else {
            continue;
        };
        appended.map_err(|e| archive_error("archive_append", e.to_string()))?;
        entries += 1;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| archive_error("archive_finish", e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| archive_error("archive_finish", e.to_string()))?
        .into_inner()
        .map_err(|e| archive_error("archive_finish", e.to_string()))?
        .sync_all()
        .map_err(|e| io_error("archive_sync", e))?;

    tracing::debug!(dir = %dir.display(), entries, "Archived directory");
    Ok(())
}

/// Unpack an archive made by [`archive_dir`] into `dest`
///
/// Entries with absolute paths or `..` components are refused.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| io_error("extract_open", e))?;
    fs::create_dir_all(dest).map_err(|e| io_error("extract_create_dest", e))?;

    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let entries = tar
        .entries()
        .map_err(|e| archive_error("extract_archive", e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error("extract_archive", e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| archive_error("extract_archive", e.to_string()))?
            .into_owned();
        if !is_safe_entry_path(&path) {
            return Err(archive_error(
                "extract_archive",
                format!("refusing unsafe entry path {}", path.display()),
            ));
        }
        entry
            .unpack_in(dest)
            .map_err(|e| archive_error("extract_archive", e.to_string()))?;
    }

    Ok(())
}

fn is_safe_entry_path(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}
