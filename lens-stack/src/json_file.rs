//! JSON file writes that either complete or leave the target untouched.
//!
//! The document is written to `<path>.tmp`, synced, and only then renamed
//! over `path`. A failed write removes the temporary file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Temporary file used while replacing `path`
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `value` to the temporary file next to `path` and return its path.
pub(crate) fn write_temp<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<PathBuf> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let temp = temp_path(path);

    let result = File::create(&temp).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.flush()?;
        file.sync_all()
    });
    if let Err(e) = result {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    Ok(temp)
}

/// Replace `path` with the JSON encoding of `value`.
pub(crate) fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let temp = write_temp(path, value)?;
    fs::rename(temp, path)
}
