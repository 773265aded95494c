//! Helpers for keeping patient data out of logs and span attributes.
//!
//! Logs carry the file name or a hash of the full path, never the
//! directory layout of the upload store.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// File name of an incoming path, for log fields and progress events.
///
/// Upload names are already sanitized to ASCII by intake; files dropped in
/// by other means are shown lossily.
pub fn redact_path(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => "<unknown>".to_string(),
    }
}

/// Stable 64-bit hex digest of a path, used to correlate log lines for
/// the same file or directory.
pub fn hash_path(path: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
