use thiserror::Error;

/// Errors raised while decoding persisted snapshots. These never surface
/// through the prediction operations: corrupt or missing state falls back to
/// fresh defaults at load time.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("weight matrices do not match the fixed 20-64-32-3 topology")]
    ShapeMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_error_formatting() {
        let error = SnapshotError::UnsupportedVersion {
            found: 7,
            expected: 1,
        };
        let message = error.to_string();
        assert!(message.contains('7'));
        assert!(message.contains('1'));
    }
}
