//! Image encoding backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the single operation the converter needs:
//! decode a source file and encode it to an [`OutputFormat`].
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), statically linked
//! into the binary.

use super::params::EncodeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image encoding backends.
///
/// Shared across the worker pool, hence `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Decode `params.source`, apply the resize policy, and return the
    /// encoded bytes.
    fn encode(&self, params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::{EncodeSettings, OutputFormat};
    use std::sync::Mutex;

    /// Mock backend that records operations without decoding anything.
    /// Uses Mutex (not RefCell) so it is Sync and works on the worker pool.
    #[derive(Default)]
    pub struct MockBackend {
        pub operations: Mutex<Vec<RecordedOp>>,
        /// When set, every encode fails with this message.
        pub fail_with: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedOp {
        pub source: String,
        pub format: OutputFormat,
        pub quality: u32,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(message: &str) -> Self {
            Self {
                operations: Mutex::new(Vec::new()),
                fail_with: Some(message.to_string()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encode_count(&self) -> usize {
            self.operations.lock().unwrap().len()
        }

        /// Bytes the mock produces for a given source and format.
        pub fn expected_bytes(source: &str, format: OutputFormat) -> Vec<u8> {
            format!("{format}:{source}").into_bytes()
        }
    }

    impl ImageBackend for MockBackend {
        fn encode(&self, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
            let source = params.source.to_string_lossy().to_string();
            self.operations.lock().unwrap().push(RecordedOp {
                source: source.clone(),
                format: params.format,
                quality: params.settings.quality.value(),
            });
            if let Some(message) = &self.fail_with {
                return Err(BackendError::ProcessingFailed(message.clone()));
            }
            Ok(Self::expected_bytes(&source, params.format))
        }
    }

    #[test]
    fn mock_records_encode() {
        let backend = MockBackend::new();
        let bytes = backend
            .encode(&EncodeParams {
                source: "/src/cover.png".into(),
                format: OutputFormat::Avif,
                settings: EncodeSettings::default(),
            })
            .unwrap();

        assert_eq!(bytes, b"avif:/src/cover.png");
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].format, OutputFormat::Avif);
        assert_eq!(ops[0].quality, 80);
    }

    #[test]
    fn failing_mock_still_records() {
        let backend = MockBackend::failing("boom");
        let result = backend.encode(&EncodeParams {
            source: "x.png".into(),
            format: OutputFormat::Webp,
            settings: EncodeSettings::default(),
        });
        assert!(matches!(result, Err(BackendError::ProcessingFailed(m)) if m == "boom"));
        assert_eq!(backend.encode_count(), 1);
    }
}
