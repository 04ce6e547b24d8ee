use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{TestCase, VsToolError, TESTCASE_SCHEMA_V1};

const TESTCASE_FILE: &str = "testcase.json";

pub fn read_cases_from_dir(cases_dir: &Path) -> Result<Vec<PathBuf>, VsToolError> {
    let mut cases: Vec<PathBuf> = WalkDir::new(cases_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == TESTCASE_FILE)
        .map(|entry| entry.into_path())
        .collect();
    cases.sort();

    if cases.is_empty() {
        return Err(VsToolError::CasesEmpty {
            path: cases_dir.to_path_buf(),
        });
    }
    Ok(cases)
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, VsToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| VsToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase = serde_json::from_str(&raw).map_err(|source| VsToolError::ParseCase {
        path: case_path.to_path_buf(),
        source,
    })?;

    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(VsToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}
