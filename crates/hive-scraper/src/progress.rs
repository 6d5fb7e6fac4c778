//! Resume offset for long sequential runs: a text file holding the next
//! index to process.

use std::fs;
use std::io;
use std::path::Path;

/// The saved offset, or 0 when the file is missing or unreadable.
pub fn read_offset(path: &Path) -> usize {
    match fs::read_to_string(path) {
        Ok(text) => text.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(path = %path.display(), "Progress file unreadable, starting from 0");
            0
        }),
        Err(_) => 0,
    }
}

pub fn write_offset(path: &Path, offset: usize) -> io::Result<()> {
    fs::write(path, offset.to_string())?;
    tracing::info!(path = %path.display(), offset, "Progress saved");
    Ok(())
}
