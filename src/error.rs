use thiserror::Error;

/// Errors surfaced by the recovery engine and its glue code.
///
/// Samples with an unrecognized diff shape and propagation hypotheses without
/// key candidates are not errors. They are dropped locally and only show up
/// in the logs and in `RecoveryStats`.
#[derive(Debug, Error)]
pub enum DfaError {
    /// Block width or length mismatch, or unparsable block text. Aborts the batch.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// None of the 256 completions of the DES round key reproduces the reference.
    #[error("no master key matches the known plaintext/ciphertext pair")]
    KeyNotFound,

    /// A key segment never received a single candidate.
    #[error("not enough usable faults: key segment {segment} has no candidate")]
    InsufficientFaults { segment: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("worker thread error: {0}")]
    Thread(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The JSON recovery report could not be written.
    #[error("report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_failures_are_report_errors() {
        let err: DfaError = serde_json::from_str::<u8>("\"AB\"").unwrap_err().into();
        assert!(matches!(err, DfaError::Report(_)));
        assert!(err.to_string().starts_with("report serialization failed"));
    }
}
