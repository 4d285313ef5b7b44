//! Device state persistence.

use std::fmt;

/// A device whose runtime state can be saved to and restored from an opaque
/// byte blob.
///
/// Configuration (ROM images, timing, port maps) is not part of the blob; a
/// blob only restores into a device built from the same configuration.
pub trait Snapshot {
    /// Encode the current runtime state.
    fn get_state(&self) -> Vec<u8>;

    /// Replace the runtime state with a previously encoded blob.
    ///
    /// On error the device is left unchanged.
    fn restore_state(&mut self, blob: &[u8]) -> Result<(), SnapshotError>;
}

/// Why a blob could not be restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The blob could not be decoded.
    Malformed(String),
    /// The blob was written by an incompatible schema version.
    Version { found: u16, expected: u16 },
    /// The blob decoded but does not fit this device's configuration.
    Layout(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed state blob: {msg}"),
            Self::Version { found, expected } => {
                write!(f, "state blob version {found}, expected {expected}")
            }
            Self::Layout(msg) => write!(f, "state blob does not match device: {msg}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_error_names_both_versions() {
        let err = SnapshotError::Version {
            found: 3,
            expected: 1,
        };
        assert_eq!(err.to_string(), "state blob version 3, expected 1");
    }
}
