//! Validation seam in front of the downstream engine's checker

use std::str::Utf8Error;

use ingest_schema::{check_config, CheckError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("candidate is not valid UTF-8: {0}")]
    Utf8(#[from] Utf8Error),

    #[error(transparent)]
    Check(#[from] CheckError),
}

/// Semantic check run on every candidate before commit.
pub trait ConfigChecker: Send + Sync {
    fn check(&self, candidate: &[u8]) -> Result<(), ValidationError>;
}

/// Delegates to the engine's `check_config`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineChecker;

impl ConfigChecker for EngineChecker {
    fn check(&self, candidate: &[u8]) -> Result<(), ValidationError> {
        let text = std::str::from_utf8(candidate)?;
        check_config(text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_checker_accepts_minimal_config() {
        let doc = br#"{"outbounds": [{"type": "direct", "tag": "direct"}]}"#;
        EngineChecker.check(doc).unwrap();
    }

    #[test]
    fn test_engine_checker_reports_semantic_issue() {
        let doc = br#"{
            "outbounds": [{"type": "direct", "tag": "direct"}],
            "route": {"final": "proxy"}
        }"#;
        let err = EngineChecker.check(doc).unwrap_err();
        assert!(matches!(err, ValidationError::Check(CheckError::Invalid(_))));
    }

    #[test]
    fn test_engine_checker_rejects_non_utf8() {
        let err = EngineChecker.check(&[0xff, 0x00]).unwrap_err();
        assert!(matches!(err, ValidationError::Utf8(_)));
    }
}
