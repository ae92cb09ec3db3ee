//! The versioned durable store.
//!
//! Each registered *type* (today: transfers) declares a name, a current
//! version, an identifier function and reader/writer functions. Writes
//! always use the current version; reads accept every version up to it,
//! so old stores stay loadable across upgrades. Layout on disk:
//!
//! ```text
//! <path>/<currency>/<network>/<type>-v<version>/<identifier>.bin
//! ```
//!
//! A record that fails to decode is skipped with a warning and never
//! aborts a bulk load; it will be rewritten the next time its entity is
//! saved. Saves are atomic (write to a temp file, then rename).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::transfer::TransferRecord;

/// How a file-service failure should be handled.
#[derive(Debug, thiserror::Error)]
pub enum FileServiceError {
    /// A coding error; fatal for the operation, not recoverable by retry.
    #[error("File service implementation error: {0}")]
    Impl(String),
    /// An OS-level error; retrying later may succeed.
    #[error("File service I/O error: {0}")]
    Unix(#[from] io::Error),
    /// One record failed to encode/decode; skip it and keep going.
    #[error("Bad {type_name} record: {reason}")]
    Entity {
        type_name: &'static str,
        reason: String,
    },
    /// The store itself is damaged; the caller should force a resync.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// One persistable entity type.
pub trait FileType {
    type Entity;

    const NAME: &'static str;
    const CURRENT_VERSION: u32;

    /// A filesystem-safe identifier, unique per entity. Replaces the
    /// previous record for the same identifier on save.
    fn identifier(entity: &Self::Entity) -> Result<String, FileServiceError>;

    fn write(entity: &Self::Entity) -> Result<Vec<u8>, FileServiceError>;

    fn read(version: u32, bytes: &[u8])
        -> Result<Self::Entity, FileServiceError>;
}

/// One currency+network scope of the on-disk store.
#[derive(Debug)]
pub struct FileService {
    root: PathBuf,
}

impl FileService {
    pub fn new(
        base: &Path,
        currency: &str,
        network: &str,
    ) -> Result<Self, FileServiceError> {
        let root = base.join(currency).join(network);
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn type_dir<T: FileType>(&self, version: u32) -> PathBuf {
        self.root.join(format!("{}-v{version}", T::NAME))
    }

    /// Load every stored entity of type `T`, across all readable
    /// versions. Undecodable records are skipped with a warning.
    pub fn load_all<T: FileType>(
        &self,
    ) -> Result<Vec<T::Entity>, FileServiceError> {
        let mut entities = Vec::new();

        for version in 1..=T::CURRENT_VERSION {
            let dir = self.type_dir::<T>(version);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("bin") {
                    continue;
                }
                let bytes = fs::read(&path)?;
                match T::read(version, &bytes) {
                    Ok(entity) => entities.push(entity),
                    Err(e) => {
                        // Entity errors never abort a load; the record is
                        // retried on the next save of its entity.
                        warn!("Skipping undecodable {} at {}: {e}", T::NAME, path.display());
                    }
                }
            }
        }

        debug!("Loaded {} {} record(s)", entities.len(), T::NAME);
        Ok(entities)
    }

    /// Save (or replace) one entity at the current version.
    pub fn save<T: FileType>(
        &self,
        entity: &T::Entity,
    ) -> Result<(), FileServiceError> {
        let id = T::identifier(entity)?;
        let bytes = T::write(entity)?;

        let dir = self.type_dir::<T>(T::CURRENT_VERSION);
        fs::create_dir_all(&dir)?;

        let tmp = dir.join(format!("{id}.tmp"));
        let dst = dir.join(format!("{id}.bin"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &dst)?;
        Ok(())
    }

    /// Remove one entity's record, across all versions it may exist at.
    pub fn remove<T: FileType>(
        &self,
        entity: &T::Entity,
    ) -> Result<(), FileServiceError> {
        let id = T::identifier(entity)?;
        for version in 1..=T::CURRENT_VERSION {
            let path = self.type_dir::<T>(version).join(format!("{id}.bin"));
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Erase the whole `<path>/<currency>/<network>` subtree. Missing
    /// directories are fine.
    pub fn wipe(
        base: &Path,
        currency: &str,
        network: &str,
    ) -> Result<(), FileServiceError> {
        let root = base.join(currency).join(network);
        match fs::remove_dir_all(&root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Transfers, version 1: serde-encoded [`TransferRecord`]s keyed by the
/// transfer hash (first 32 bytes, left-zero-padded).
pub struct TransferFileType;

impl FileType for TransferFileType {
    type Entity = TransferRecord;

    const NAME: &'static str = "transfer";
    const CURRENT_VERSION: u32 = 1;

    fn identifier(record: &TransferRecord) -> Result<String, FileServiceError> {
        let hash = record.payload.hash().ok_or_else(|| {
            FileServiceError::Impl(
                "Cannot persist a transfer without a hash".to_owned(),
            )
        })?;

        let bytes = hash.as_bytes();
        let take = bytes.len().min(32);
        let mut id = "00".repeat(32 - take);
        for b in &bytes[..take] {
            id.push_str(&format!("{b:02x}"));
        }
        Ok(id)
    }

    fn write(record: &TransferRecord) -> Result<Vec<u8>, FileServiceError> {
        serde_json::to_vec(record)
            .map_err(|e| FileServiceError::Impl(e.to_string()))
    }

    fn read(
        version: u32,
        bytes: &[u8],
    ) -> Result<TransferRecord, FileServiceError> {
        match version {
            1 => serde_json::from_slice(bytes).map_err(|e| {
                FileServiceError::Entity {
                    type_name: Self::NAME,
                    reason: e.to_string(),
                }
            }),
            v => Err(FileServiceError::Impl(format!(
                "Unknown transfer version {v}"
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // A tiny stand-in type so these tests don't depend on transfer
    // construction.
    struct NoteFile;

    impl FileType for NoteFile {
        type Entity = (String, String);
        const NAME: &'static str = "note";
        const CURRENT_VERSION: u32 = 1;

        fn identifier(e: &Self::Entity) -> Result<String, FileServiceError> {
            Ok(e.0.clone())
        }
        fn write(e: &Self::Entity) -> Result<Vec<u8>, FileServiceError> {
            Ok(e.1.as_bytes().to_vec())
        }
        fn read(
            _version: u32,
            bytes: &[u8],
        ) -> Result<Self::Entity, FileServiceError> {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| FileServiceError::Entity {
                    type_name: Self::NAME,
                    reason: e.to_string(),
                })?
                .to_owned();
            if text.contains('!') {
                return Err(FileServiceError::Entity {
                    type_name: Self::NAME,
                    reason: "corrupt".to_owned(),
                });
            }
            Ok(("?".to_owned(), text))
        }
    }

    #[test]
    fn save_load_remove_wipe() {
        let tmp = tempfile::tempdir().unwrap();
        let fs1 = FileService::new(tmp.path(), "xrp", "mainnet").unwrap();

        fs1.save::<NoteFile>(&("a".into(), "alpha".into())).unwrap();
        fs1.save::<NoteFile>(&("b".into(), "beta".into())).unwrap();
        // Saving the same identifier replaces.
        fs1.save::<NoteFile>(&("a".into(), "alpha2".into())).unwrap();

        let mut loaded = fs1.load_all::<NoteFile>().unwrap();
        loaded.sort_by(|x, y| x.1.cmp(&y.1));
        let values: Vec<_> = loaded.into_iter().map(|e| e.1).collect();
        assert_eq!(values, vec!["alpha2", "beta"]);

        fs1.remove::<NoteFile>(&("a".into(), String::new())).unwrap();
        assert_eq!(fs1.load_all::<NoteFile>().unwrap().len(), 1);

        FileService::wipe(tmp.path(), "xrp", "mainnet").unwrap();
        assert_eq!(fs1.load_all::<NoteFile>().unwrap().len(), 0);
        // Wiping a missing tree is fine.
        FileService::wipe(tmp.path(), "xrp", "mainnet").unwrap();
    }

    #[test]
    fn corrupt_records_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = FileService::new(tmp.path(), "xtz", "mainnet").unwrap();

        svc.save::<NoteFile>(&("good".into(), "fine".into())).unwrap();
        svc.save::<NoteFile>(&("bad".into(), "broken!".into())).unwrap();

        let loaded = svc.load_all::<NoteFile>().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].1, "fine");
    }
}
