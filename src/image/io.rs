//! I/O helpers for binary rasters and JSON.
//!
//! - `load_binary`: read a PNG/JPEG/etc., convert to grayscale and threshold
//!   it into a foreground/background buffer.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::BinaryBuffer;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image from disk and binarize it: pixels darker than `threshold`
/// become foreground.
pub fn load_binary(path: &Path, threshold: u8) -> Result<BinaryBuffer, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_luma8();
    let w = img.width() as usize;
    let h = img.height() as usize;
    let mut buf = BinaryBuffer::new(w, h);
    for (i, px) in img.into_raw().into_iter().enumerate() {
        buf.data[i] = u8::from(px < threshold);
    }
    Ok(buf)
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
