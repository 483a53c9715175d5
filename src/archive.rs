//! Streaming tar encode/decode for directory and single-file transfers.
//!
//! The encoder walks a tree depth-first (name-sorted, so streams are stable
//! across runs) and emits one tar record per accepted entry: header, then
//! payload, never interleaved. The decoder recreates the tree, restoring
//! mode and timestamps. A reserved trailing record (`END_OF_TAR`) is the
//! receiver's only proof that the producer finished; a stream that ends
//! without it is reported as truncated no matter how cleanly the bytes
//! stopped.

use crate::error::{Error, Result};
use crate::filter::FileFilter;
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, Entry, EntryType, Header};
use walkdir::WalkDir;

/// Reserved entry name marking the end of a complete stream. Uppercase and
/// unlikely; real relative paths never collide with it in practice.
pub const END_OF_STREAM_NAME: &str = "END_OF_TAR";

/// PAX attribute restating the payload size in decimal.
pub const ATTR_SIZE: &str = "SIZE";
/// PAX attribute flagging a single-file stream; the decoder writes the
/// payload to the destination path itself instead of nesting under it.
pub const ATTR_SINGLE_FILE_ONLY: &str = "SINGLE_FILE_ONLY";

/// Encode a directory tree onto `sink` as a tar stream.
///
/// With a filter pattern set, only matching files are emitted and directory
/// records are left out entirely; the decoder recreates whatever ancestors
/// the surviving files need. Without a pattern, directory records are
/// emitted too, so empty directories round-trip.
pub fn write_directory_tree<W: Write>(
    sink: W,
    root: &Path,
    filter: &FileFilter,
    end_marker: bool,
) -> Result<()> {
    if !root.is_dir() {
        return Err(Error::MissingPath(root.to_path_buf()));
    }

    let mut builder = Builder::new(sink);

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(path);
        let name = entry.file_name().to_string_lossy();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if !filter.is_unfiltered() {
                continue;
            }
            let meta = entry.metadata()?;
            let mut header = entry_header(&meta, EntryType::Directory, 0);
            builder.append_data(&mut header, rel, io::empty())?;
        } else if file_type.is_file() {
            if !filter.matches(false, &name) {
                continue;
            }
            let meta = entry.metadata()?;
            append_file_entry(&mut builder, path, rel, &meta, false)?;
        }
        // Symlinks and special files are not transferred
    }

    if end_marker {
        write_end_marker(&mut builder)?;
    }

    let mut sink = builder.into_inner()?;
    sink.flush()?;
    Ok(())
}

/// Encode exactly one file onto `sink`, tagged so the decoder writes the
/// payload straight to its destination path. The entry name is the file's
/// base name; the decoder ignores it when the tag is present.
pub fn write_single_file<W: Write>(sink: W, file_path: &Path, end_marker: bool) -> Result<()> {
    let meta = match fs::metadata(file_path) {
        Ok(m) if m.is_file() => m,
        _ => return Err(Error::MissingPath(file_path.to_path_buf())),
    };

    let name: PathBuf = file_path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("file"));

    let mut builder = Builder::new(sink);
    append_file_entry(&mut builder, file_path, &name, &meta, true)?;
    if end_marker {
        write_end_marker(&mut builder)?;
    }

    let mut sink = builder.into_inner()?;
    sink.flush()?;
    Ok(())
}

fn append_file_entry<W: Write>(
    builder: &mut Builder<W>,
    abs_path: &Path,
    rel_path: &Path,
    meta: &fs::Metadata,
    single_file: bool,
) -> Result<()> {
    let size = meta.len();
    let size_text = size.to_string();
    let mut attrs: Vec<(&str, &[u8])> = vec![(ATTR_SIZE, size_text.as_bytes())];
    if single_file {
        attrs.push((ATTR_SINGLE_FILE_ONLY, b"1"));
    }
    builder.append_pax_extensions(attrs)?;

    let mut header = entry_header(meta, EntryType::Regular, size);
    let file = File::open(abs_path)?;
    builder.append_data(&mut header, rel_path, file)?;
    Ok(())
}

fn write_end_marker<W: Write>(builder: &mut Builder<W>) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(0);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, END_OF_STREAM_NAME, io::empty())?;
    Ok(())
}

fn entry_header(meta: &fs::Metadata, kind: EntryType, size: u64) -> Header {
    let mtime = FileTime::from_last_modification_time(meta)
        .unix_seconds()
        .max(0) as u64;
    let atime = FileTime::from_last_access_time(meta).unix_seconds().max(0) as u64;

    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_size(size);
    header.set_mode(mode_bits(meta));
    header.set_mtime(mtime);
    if let Some(gnu) = header.as_gnu_mut() {
        gnu.set_atime(atime);
    }
    header
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        0o644
    }
}

/// Decode a tar stream from `source` into `dest`.
///
/// Directory timestamps are restored only after the loop, in reverse receipt
/// order, because writing children bumps the parent's mtime. Fails with
/// [`Error::Truncated`] when the stream ends before the end-of-stream
/// marker.
pub fn read_archive<R: Read>(source: R, dest: &Path) -> Result<()> {
    let mut archive = Archive::new(source);
    let mut found_end_marker = false;
    let mut deferred_dir_times: Vec<(PathBuf, FileTime, FileTime)> = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel: PathBuf = entry.path()?.into_owned();

        if rel.as_os_str() == END_OF_STREAM_NAME {
            // Must be last; anything after it is not ours to interpret
            found_end_marker = true;
            break;
        }

        let header = entry.header();
        let kind = header.entry_type();
        let mode = header.mode()?;
        let mtime_secs = header.mtime()? as i64;
        let atime_secs = header
            .as_gnu()
            .and_then(|gnu| gnu.atime().ok())
            .map(|a| a as i64)
            .unwrap_or(mtime_secs);
        let mtime = FileTime::from_unix_time(mtime_secs, 0);
        let atime = FileTime::from_unix_time(atime_secs, 0);

        if kind.is_dir() {
            let dir_path = join_checked(dest, &rel)?;
            fs::create_dir_all(&dir_path)?;
            set_mode(&dir_path, mode)?;
            deferred_dir_times.push((dir_path, atime, mtime));
        } else if kind == EntryType::Regular || kind == EntryType::GNUSparse {
            let file_path = if is_single_file_entry(&mut entry)? {
                dest.to_path_buf()
            } else {
                join_checked(dest, &rel)?
            };
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut file = File::create(&file_path)?;
            io::copy(&mut entry, &mut file)?;
            drop(file);

            set_mode(&file_path, mode)?;
            filetime::set_file_times(&file_path, atime, mtime)?;
        }
        // Other entry kinds (links, fifos) are skipped
    }

    for (dir_path, atime, mtime) in deferred_dir_times.iter().rev() {
        filetime::set_file_times(dir_path, *atime, *mtime)?;
    }

    if !found_end_marker {
        return Err(Error::Truncated);
    }
    Ok(())
}

fn is_single_file_entry<R: Read>(entry: &mut Entry<R>) -> Result<bool> {
    if let Some(extensions) = entry.pax_extensions()? {
        for ext in extensions {
            let ext = ext?;
            if ext.key().ok() == Some(ATTR_SINGLE_FILE_ONLY) && ext.value().ok() == Some("1") {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Join a stream-supplied relative path under `dest`, refusing components
/// that would escape it.
fn join_checked(dest: &Path, rel: &Path) -> Result<PathBuf> {
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("archive entry path escapes destination: {}", rel.display()),
                )))
            }
        }
    }
    Ok(dest.join(rel))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
