//! Save-state files
//!
//! An adapter's opaque [`SaveStateBlob`] is wrapped in a small envelope before
//! it touches disk:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "RBSS"
//! 4       2     envelope version (LE)
//! 6       1     system id length N
//! 7       N     system id (ASCII)
//! 7+N     4     adapter schema version (LE)
//! 11+N    8     payload length (LE)
//! 19+N    20    SHA-1 of payload
//! 39+N    ..    payload
//! ```
//!
//! Files are written to a temporary file in the destination directory,
//! synced, then renamed over the target, so an existing state is never left
//! half-written.

use crate::adapter::SaveStateBlob;
use rb_core::config::SaveStateConfig;
use rb_core::{BridgeError, StateError, SystemId};
use sha1::{Digest, Sha1};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const MAGIC: &[u8; 4] = b"RBSS";
const ENVELOPE_VERSION: u16 = 1;
const DIGEST_LEN: usize = 20;

/// File extension for save states
pub const STATE_EXTENSION: &str = "rbss";

fn corrupt(reason: impl Into<String>) -> StateError {
    StateError::CorruptBlob(reason.into())
}

/// Wrap `blob` for `system`
pub fn encode(system: SystemId, blob: &SaveStateBlob) -> Vec<u8> {
    let id = system.as_str().as_bytes();
    let id_len = id.len().min(u8::MAX as usize);
    let digest = Sha1::digest(&blob.data);

    let mut out = Vec::with_capacity(39 + id_len + blob.data.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&ENVELOPE_VERSION.to_le_bytes());
    out.push(id_len as u8);
    out.extend_from_slice(&id[..id_len]);
    out.extend_from_slice(&blob.schema_version.to_le_bytes());
    out.extend_from_slice(&(blob.data.len() as u64).to_le_bytes());
    out.extend_from_slice(&digest);
    out.extend_from_slice(&blob.data);
    out
}

/// Cursor over envelope bytes that reports truncation as corruption
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], StateError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| corrupt(format!("truncated {}", what)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], StateError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }
}

/// Unwrap an envelope written for `system`
pub fn decode(bytes: &[u8], system: SystemId, verify: bool) -> Result<SaveStateBlob, StateError> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(4, "header")? != MAGIC {
        return Err(corrupt("not a save state"));
    }
    let version = u16::from_le_bytes(reader.array("header")?);
    if version != ENVELOPE_VERSION {
        return Err(StateError::IncompatibleSchema {
            expected: format!("envelope v{}", ENVELOPE_VERSION),
            found: format!("envelope v{}", version),
        });
    }

    let [id_len] = reader.array::<1>("system id")?;
    let id = reader.take(id_len as usize, "system id")?;
    if id != system.as_str().as_bytes() {
        return Err(StateError::IncompatibleSchema {
            expected: system.to_string(),
            found: String::from_utf8_lossy(id).into_owned(),
        });
    }

    let schema_version = u32::from_le_bytes(reader.array("schema version")?);
    let payload_len = u64::from_le_bytes(reader.array("payload length")?);
    let digest: [u8; DIGEST_LEN] = reader.array("checksum")?;
    let payload_len =
        usize::try_from(payload_len).map_err(|_| corrupt("payload length out of range"))?;
    let payload = reader.take(payload_len, "payload")?;
    if reader.pos != bytes.len() {
        return Err(corrupt("trailing bytes after payload"));
    }

    if verify && Sha1::digest(payload).as_slice() != &digest[..] {
        return Err(corrupt("checksum mismatch"));
    }

    Ok(SaveStateBlob {
        schema_version,
        data: payload.to_vec(),
    })
}

/// Replace `path` with `bytes` via a synced temporary file and a rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BridgeError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| BridgeError::Io(e.error))?;
    Ok(())
}

/// Reads and writes save-state files for one system
#[derive(Debug, Clone)]
pub struct SaveStateManager {
    system: SystemId,
    directory: PathBuf,
    verify_checksum: bool,
}

impl SaveStateManager {
    pub fn new(system: SystemId, config: &SaveStateConfig) -> Self {
        Self {
            system,
            directory: config.directory.clone(),
            verify_checksum: config.verify_checksum,
        }
    }

    /// Default location of numbered slot `slot` for game `title`
    pub fn slot_path(&self, title: &str, slot: u32) -> PathBuf {
        self.directory
            .join(self.system.as_str())
            .join(format!("{}.{}.{}", title, slot, STATE_EXTENSION))
    }

    /// Reserved location of the state kept when game `title` is stopped
    pub fn auto_path(&self, title: &str) -> PathBuf {
        self.directory
            .join(self.system.as_str())
            .join(format!("{}.auto.{}", title, STATE_EXTENSION))
    }

    pub fn save(&self, path: &Path, blob: &SaveStateBlob) -> Result<(), BridgeError> {
        let bytes = encode(self.system, blob);
        write_atomic(path, &bytes)?;
        tracing::info!(
            "Saved state to {} ({} bytes, schema {})",
            path.display(),
            bytes.len(),
            blob.schema_version
        );
        Ok(())
    }

    pub fn load(&self, path: &Path) -> Result<SaveStateBlob, BridgeError> {
        let bytes = std::fs::read(path)?;
        let blob = decode(&bytes, self.system, self.verify_checksum)?;
        tracing::debug!("Read state from {} (schema {})", path.display(), blob.schema_version);
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob() -> SaveStateBlob {
        SaveStateBlob {
            schema_version: 3,
            data: (0..=255u8).cycle().take(1000).collect(),
        }
    }

    #[test]
    fn test_envelope_round_trip() {
        let bytes = encode(SystemId("nes"), &blob());
        assert_eq!(&bytes[..4], b"RBSS");
        assert_eq!(decode(&bytes, SystemId("nes"), true).unwrap(), blob());
    }

    #[test]
    fn test_truncation_is_corrupt() {
        let bytes = encode(SystemId("nes"), &blob());
        for len in [0, 3, 10, 40, bytes.len() - 1] {
            assert!(matches!(
                decode(&bytes[..len], SystemId("nes"), true),
                Err(StateError::CorruptBlob(_))
            ));
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = encode(SystemId("nes"), &blob());
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            decode(&bytes, SystemId("nes"), true),
            Err(StateError::CorruptBlob(_))
        ));
        // Verification can be switched off
        assert!(decode(&bytes, SystemId("nes"), false).is_ok());
    }

    #[test]
    fn test_wrong_system_is_incompatible() {
        let bytes = encode(SystemId("snes"), &blob());
        let err = decode(&bytes, SystemId("nes"), true).unwrap_err();
        assert_eq!(
            err,
            StateError::IncompatibleSchema {
                expected: "nes".to_string(),
                found: "snes".to_string(),
            }
        );
    }

    #[test]
    fn test_atomic_replace() {
        let dir = tempfile::tempdir().unwrap();
        let config = SaveStateConfig {
            directory: dir.path().to_path_buf(),
            verify_checksum: true,
            auto_save_on_stop: false,
        };
        let manager = SaveStateManager::new(SystemId("gba"), &config);
        let path = manager.slot_path("Golden Sun", 1);
        assert!(path.ends_with("gba/Golden Sun.1.rbss"));
        assert!(manager
            .auto_path("Golden Sun")
            .ends_with("gba/Golden Sun.auto.rbss"));

        manager.save(&path, &blob()).unwrap();
        let mut newer = blob();
        newer.data[0] = 0xAA;
        manager.save(&path, &newer).unwrap();
        assert_eq!(manager.load(&path).unwrap(), newer);

        // Only the target remains; no temporary files are left behind
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveStateManager::new(
            SystemId("gba"),
            &SaveStateConfig {
                directory: dir.path().to_path_buf(),
                verify_checksum: true,
                auto_save_on_stop: false,
            },
        );
        assert!(matches!(
            manager.load(&dir.path().join("none.rbss")),
            Err(BridgeError::Io(_))
        ));
    }
}
