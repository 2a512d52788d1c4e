//! Adapter and runner configuration

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Configuration for the truncating adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncatingConfig {
    /// Maximum number of characters echoed back from the prompt
    #[serde(default = "default_n")]
    pub n: usize,

    /// Name reported in identifying params and usage output
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_n() -> usize {
    4
}

fn default_model_name() -> String {
    "truncating-llm".to_string()
}

impl Default for TruncatingConfig {
    fn default() -> Self {
        Self {
            n: default_n(),
            model_name: default_model_name(),
        }
    }
}

impl TruncatingConfig {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            ..Self::default()
        }
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(LlmError::Config("modelName must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Per-runner execution settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Name reported in run events (defaults to the adapter's type label)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,

    /// Tags inherited by every run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Metadata inherited by every run
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    /// Maximum concurrent invocations during `batch` (unbounded if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

impl RunConfig {
    pub fn with_run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == Some(0) {
            return Err(LlmError::Config(
                "maxConcurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
