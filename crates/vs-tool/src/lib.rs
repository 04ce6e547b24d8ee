mod case;
mod encoding;
mod runner;
mod source;

pub use case::{ExpectedEvent, FrameSpec, TestCase, TestStep, TESTCASE_SCHEMA_V1};
pub use encoding::{decode_value, encode_value};
pub use runner::{assert_case, build_scope, run_case, RunReport};
pub use source::{read_cases_from_dir, read_test_case};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VsToolError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse testcase {path}: {source}")]
    ParseCase {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid testcase schema version \"{found}\", expected \"{expected}\".")]
    InvalidSchemaVersion { expected: String, found: String },
    #[error("No testcase.json files under {path}.")]
    CasesEmpty { path: PathBuf },
    #[error("Testcase chain is empty.")]
    EmptyChain,
    #[error("Step {step_index}: {key} is already bound.")]
    AlreadyBound { step_index: usize, key: String },
    #[error("Step {step_index}: {key} is not bound.")]
    NotBound { step_index: usize, key: String },
    #[error("Expected event count {expected}, actual {actual}. observed={observed}")]
    EventCountMismatch {
        expected: usize,
        actual: usize,
        observed: String,
    },
    #[error("Event mismatch at index {index}. expected={expected} actual={actual}")]
    EventMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("Failed to serialize event for diff: {0}")]
    EventSerialize(serde_json::Error),
}
