//! JSON encoding shared by the snapshot blobs.

use emu_core::SnapshotError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encode `state`. A failure is logged and yields an empty blob, which any
/// restore rejects as malformed.
pub(crate) fn encode<T: Serialize>(what: &str, state: &T) -> Vec<u8> {
    serde_json::to_vec(state).unwrap_or_else(|e| {
        log::error!("cannot encode {what} state: {e}");
        Vec::new()
    })
}

pub(crate) fn decode<T: DeserializeOwned>(blob: &[u8]) -> Result<T, SnapshotError> {
    serde_json::from_slice(blob).map_err(|e| SnapshotError::Malformed(e.to_string()))
}

/// Reject a blob written by another schema version.
pub(crate) fn check_version(found: u16, expected: u16) -> Result<(), SnapshotError> {
    if found == expected {
        Ok(())
    } else {
        Err(SnapshotError::Version { found, expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_blob_is_malformed() {
        assert!(matches!(
            decode::<u16>(&[]),
            Err(SnapshotError::Malformed(_))
        ));
    }

    #[test]
    fn version_mismatch() {
        assert_eq!(
            check_version(2, 1),
            Err(SnapshotError::Version {
                found: 2,
                expected: 1
            })
        );
        assert!(check_version(1, 1).is_ok());
    }
}
