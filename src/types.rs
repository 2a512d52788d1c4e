//! Core data types for a3s-llm
//!
//! All types use camelCase JSON serialization for wire compatibility.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Options accompanying a single completion request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOptions {
    /// Stop sequences; generation should end before any of them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Free-form provider keywords passed through to the adapter
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl CallOptions {
    /// Add a stop sequence
    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }

    /// Add a provider keyword
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Incremental fragment of a completion produced while streaming
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationChunk {
    /// Text fragment
    pub text: String,

    /// Incremental metadata carried by this fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<Map<String, Value>>,
}

impl GenerationChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            generation_info: None,
        }
    }

    /// Attach a metadata entry
    pub fn with_info(mut self, key: impl Into<String>, value: Value) -> Self {
        self.generation_info
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Append another chunk: text is concatenated, metadata merged with
    /// the later chunk's keys winning.
    pub fn merge(&mut self, other: GenerationChunk) {
        self.text.push_str(&other.text);
        if let Some(info) = other.generation_info {
            self.generation_info
                .get_or_insert_with(Map::new)
                .extend(info);
        }
    }
}

impl std::ops::Add for GenerationChunk {
    type Output = GenerationChunk;

    fn add(mut self, rhs: GenerationChunk) -> GenerationChunk {
        self.merge(rhs);
        self
    }
}

/// One candidate output for a prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    /// Generated text
    pub text: String,

    /// Free-form generation metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<Map<String, Value>>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            generation_info: None,
        }
    }

    /// Attach a metadata entry
    pub fn with_info(mut self, key: impl Into<String>, value: Value) -> Self {
        self.generation_info
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}

impl From<GenerationChunk> for Generation {
    fn from(chunk: GenerationChunk) -> Self {
        Self {
            text: chunk.text,
            generation_info: chunk.generation_info,
        }
    }
}

/// Usage counters reported by an adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Run identifier assigned to one input of a generate call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub run_id: Uuid,
}

/// Result of a batch generation
///
/// `generations[i]` holds the candidates for input `i`; every inner list
/// is non-empty for a well-behaved adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResult {
    pub generations: Vec<Vec<Generation>>,

    /// Aggregate adapter output (usage, model name, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<Value>,

    /// One entry per input, filled by the runner
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run: Vec<RunInfo>,
}

impl LlmResult {
    pub fn new(generations: Vec<Vec<Generation>>) -> Self {
        Self {
            generations,
            llm_output: None,
            run: Vec::new(),
        }
    }

    pub fn with_llm_output(mut self, output: Value) -> Self {
        self.llm_output = Some(output);
        self
    }

    /// Text of the first generation for input `index`
    pub fn text(&self, index: usize) -> Option<&str> {
        self.generations
            .get(index)
            .and_then(|g| g.first())
            .map(|g| g.text.as_str())
    }

    /// Usage record reported under `llmOutput.tokenUsage`, if any
    pub fn token_usage(&self) -> Option<TokenUsage> {
        let usage = self.llm_output.as_ref()?.get("tokenUsage")?;
        serde_json::from_value(usage.clone()).ok()
    }

    /// Split into one single-input result per prompt
    ///
    /// The first result keeps `llm_output` as is; the rest carry a zeroed
    /// `tokenUsage` so usage summed over the parts equals the batch total.
    pub fn flatten(&self) -> Vec<LlmResult> {
        self.generations
            .iter()
            .enumerate()
            .map(|(i, gens)| LlmResult {
                generations: vec![gens.clone()],
                llm_output: if i == 0 {
                    self.llm_output.clone()
                } else {
                    self.llm_output.clone().map(zero_usage)
                },
                run: self.run.get(i).copied().into_iter().collect(),
            })
            .collect()
    }
}

fn zero_usage(mut output: Value) -> Value {
    if let Some(usage) = output.get_mut("tokenUsage") {
        *usage = serde_json::json!(TokenUsage::default());
    }
    output
}
