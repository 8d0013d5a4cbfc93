//! Atomic snapshot writes.
//!
//! Output is written to a hidden sibling file, synced, then renamed over the
//! target so readers never observe a half-written snapshot.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Component, Utf8Path};
use cap_std::fs::{Dir, OpenOptions};

use crate::error::RegistryError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes `contents` to `path` inside `dir` atomically.
///
/// `path` must be a bare file name relative to `dir`.
///
/// # Errors
///
/// Returns [`RegistryError::WriteError`] if the file cannot be written.
pub(crate) fn write_atomic(
    dir: &Dir,
    path: &Utf8Path,
    contents: &[u8],
) -> Result<(), RegistryError> {
    let write_error = |message: String| RegistryError::WriteError {
        path: path.to_path_buf(),
        message,
    };
    let mut components = path.components();
    let (Some(Utf8Component::Normal(file_name)), None) = (components.next(), components.next())
    else {
        return Err(write_error("output path must be a file name".to_owned()));
    };
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(".{file_name}.tmp.{}.{counter}", std::process::id());

    let written =
        write_temp(dir, &tmp_name, contents).and_then(|()| replace(dir, &tmp_name, file_name));
    if let Err(err) = written {
        if dir.remove_file(&tmp_name).is_err() {
            // Nothing left to clean up.
        }
        return Err(write_error(err.to_string()));
    }
    if dir.open(".").and_then(|parent| parent.sync_all()).is_err() {
        // Directory sync is best effort.
    }
    Ok(())
}

fn write_temp(dir: &Dir, tmp_name: &str, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    let mut file = dir.open_with(tmp_name, &options)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(windows)]
fn replace(dir: &Dir, tmp_name: &str, target_name: &str) -> io::Result<()> {
    match dir.remove_file(target_name) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    dir.rename(tmp_name, dir, target_name)
}

#[cfg(not(windows))]
fn replace(dir: &Dir, tmp_name: &str, target_name: &str) -> io::Result<()> {
    dir.rename(tmp_name, dir, target_name)
}
