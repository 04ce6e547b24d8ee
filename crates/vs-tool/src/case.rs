use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const TESTCASE_SCHEMA_V1: &str = "vs-tool-case.v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    pub chain: Vec<FrameSpec>,
    #[serde(default)]
    pub helpers: BTreeMap<String, JsonValue>,
    #[serde(default)]
    pub steps: Vec<TestStep>,
    #[serde(default)]
    pub expected_events: Vec<ExpectedEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSpec {
    pub context: JsonValue,
    #[serde(default)]
    pub special: bool,
    #[serde(default)]
    pub not_context: bool,
    #[serde(default)]
    pub view_model: bool,
    #[serde(default)]
    pub variable: bool,
    #[serde(default)]
    pub template_context: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TestStep {
    Get {
        key: String,
        #[serde(default, rename = "wholeChain")]
        whole_chain: bool,
    },
    Set {
        key: String,
        value: JsonValue,
    },
    Bind {
        key: String,
    },
    Unbind {
        key: String,
    },
    State {
        key: String,
    },
}

impl TestStep {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::Set { .. } => "set",
            Self::Bind { .. } => "bind",
            Self::Unbind { .. } => "unbind",
            Self::State { .. } => "state",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExpectedEvent {
    Value {
        key: String,
        value: JsonValue,
    },
    Set {
        key: String,
        how: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    Error {
        key: String,
        code: String,
    },
    Change {
        key: String,
        value: JsonValue,
    },
    State {
        key: String,
        state: String,
    },
}
