//! Deposits uploaded files into the incoming directory.
//!
//! The upload endpoint itself lives elsewhere; this is the file-system half
//! of it. Files are written under a hidden temporary name and renamed into
//! place, so the watcher only ever sees complete payloads.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::StorageError;
use crate::worker::filter::FileFilter;

/// Status reported for a freshly deposited file: analysis has not run yet.
pub const PENDING: &str = "pending";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    pub file_name: String,
    /// Public reference, e.g. `/uploads/<id>_<name>`.
    pub file_location: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub status: &'static str,
}

pub struct IncomingStore {
    incoming_directory: PathBuf,
    location_prefix: String,
}

impl IncomingStore {
    pub fn new<P: AsRef<Path>>(incoming_directory: P, location_prefix: &str) -> Self {
        Self {
            incoming_directory: incoming_directory.as_ref().to_path_buf(),
            location_prefix: location_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn incoming_directory(&self) -> &Path {
        &self.incoming_directory
    }

    pub fn deposit(&self, original_name: &str, content: &[u8]) -> Result<DepositReceipt, StorageError> {
        let sanitized = sanitize_file_name(original_name)?;
        let file_name = format!("{}_{}", uuid::Uuid::new_v4().simple(), sanitized);
        let final_path = self.incoming_directory.join(&file_name);

        // Temp and sidecar suffixes are never picked up by the watcher.
        if !FileFilter::default().is_candidate(&final_path) {
            return Err(StorageError::InvalidFileName(original_name.to_string()));
        }

        self.ensure_directory()?;

        let staging_path = self.incoming_directory.join(format!(".{}.partial", file_name));

        write_new(&staging_path, content)?;

        if final_path.exists() {
            let _ = std::fs::remove_file(&staging_path);
            return Err(StorageError::FileExists(final_path));
        }
        if let Err(e) = std::fs::rename(&staging_path, &final_path) {
            let _ = std::fs::remove_file(&staging_path);
            return Err(StorageError::MoveFile {
                from: staging_path,
                to: final_path,
                source: e,
            });
        }

        debug!(file = %file_name, bytes = content.len(), "Deposited incoming file");

        Ok(DepositReceipt {
            file_location: format!("{}/{}", self.location_prefix, file_name),
            file_name,
            path: final_path,
            status: PENDING,
        })
    }

    fn ensure_directory(&self) -> Result<(), StorageError> {
        if !self.incoming_directory.exists() {
            std::fs::create_dir_all(&self.incoming_directory).map_err(|e| {
                StorageError::CreateDirectory {
                    path: self.incoming_directory.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }
}

/// Keeps the last path component and replaces every character outside
/// `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(original_name: &str) -> Result<String, StorageError> {
    // Browsers on Windows send full client paths.
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(|c| c == '.' || c == '_').is_empty() {
        return Err(StorageError::InvalidFileName(original_name.to_string()));
    }
    Ok(sanitized)
}

fn write_new(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

    file.write_all(content)
        .and_then(|_| file.sync_all())
        .map_err(|e| {
            let _ = std::fs::remove_file(path);
            StorageError::WriteFile {
                path: path.to_path_buf(),
                source: e,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report1.pdf").unwrap(), "report1.pdf");
        assert_eq!(
            sanitize_file_name("Jane Doe (scan) #2.pdf").unwrap(),
            "Jane_Doe__scan___2.pdf"
        );
        assert_eq!(
            sanitize_file_name("C:\\Users\\jd\\report.pdf").unwrap(),
            "report.pdf"
        );
        assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_file_name("résumé.pdf").unwrap(), "r_sum_.pdf");
    }

    #[test]
    fn test_sanitize_rejects_empty_names() {
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("dir/").is_err());
    }

    #[test]
    fn test_deposit_writes_file() {
        let temp = TempDir::new().unwrap();
        let incoming = temp.child("uploads");
        let store = IncomingStore::new(incoming.path(), "/uploads/");

        let receipt = store.deposit("report 1.pdf", b"%PDF-1.7").unwrap();

        assert!(receipt.file_name.ends_with("_report_1.pdf"));
        assert_eq!(receipt.file_location, format!("/uploads/{}", receipt.file_name));
        assert_eq!(receipt.status, PENDING);
        incoming.child(&receipt.file_name).assert("%PDF-1.7");

        let leftovers: Vec<_> = std::fs::read_dir(incoming.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_deposits_never_collide() {
        let temp = TempDir::new().unwrap();
        let store = IncomingStore::new(temp.path(), "/uploads");

        let a = store.deposit("report.pdf", b"a").unwrap();
        let b = store.deposit("report.pdf", b"b").unwrap();

        assert_ne!(a.file_name, b.file_name);
        temp.child(&a.file_name).assert("a");
        temp.child(&b.file_name).assert("b");
    }

    #[test]
    fn test_deposit_is_watcher_candidate() {
        let temp = TempDir::new().unwrap();
        let store = IncomingStore::new(temp.path(), "/uploads");

        let receipt = store.deposit(".hidden.pdf", b"x").unwrap();
        assert!(FileFilter::default().is_candidate(&receipt.path));
    }

    #[test]
    fn test_deposit_rejects_names_the_watcher_skips() {
        let temp = TempDir::new().unwrap();
        let store = IncomingStore::new(temp.path(), "/uploads");

        for name in ["results.tmp", "x.pdf.meta.json", "scan.PART", "notes.swp"] {
            let err = store.deposit(name, b"x").unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidFileName(ref n) if n == name),
                "{name}: {err:?}"
            );
        }

        let leftovers = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_storage_errors_show_only_file_names() {
        let err = StorageError::MoveFile {
            from: PathBuf::from("/srv/uploads/.abc_jane.pdf.partial"),
            to: PathBuf::from("/srv/uploads/abc_jane.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "cross-device link"),
        };
        let message = err.to_string();
        assert!(message.contains("'abc_jane.pdf'"), "{message}");
        assert!(!message.contains("/srv/uploads"), "{message}");
    }

    #[test]
    fn test_receipt_serialization() {
        let temp = TempDir::new().unwrap();
        let store = IncomingStore::new(temp.path(), "/uploads");
        let receipt = store.deposit("r.pdf", b"x").unwrap();

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json["fileLocation"].as_str().unwrap().starts_with("/uploads/"));
        assert!(json.get("path").is_none());
    }
}
