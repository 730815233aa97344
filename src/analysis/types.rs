// Extraction batch types and response decoding
//
// The extraction collaborator is loosely structured: sometimes a wrapper
// object, sometimes a bare array, optional fields throughout. Decoding is
// a tagged union with exactly two recognized shapes per call; anything
// else is a parse error.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::models::StatementType;

/// One extracted statement, possibly nested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    #[serde(default)]
    pub speaker: String,
    /// Transcript-local speaker id ("speaker_1") when the collaborator
    /// carried it through
    #[serde(default)]
    pub speaker_id: Option<String>,
    pub text: String,
    #[serde(rename = "type", default)]
    pub statement_type: String,
    /// 1-based source line that produced this statement; authoritative,
    /// never renumbered
    #[serde(default)]
    pub line_index: Option<i64>,
    #[serde(default)]
    pub children: Vec<Statement>,
    /// Exact text of an existing claim to nest under (incremental calls)
    #[serde(default)]
    pub parent_text: Option<String>,
    #[serde(default)]
    pub fact_check: Option<FactCheck>,
    #[serde(default)]
    pub fallacy: Option<Fallacy>,
}

impl Statement {
    /// Normalize the untrusted type string to the enumerated set.
    /// Unknown types keep the statement but fall back to `claim`.
    pub fn normalized_type(&self) -> StatementType {
        match StatementType::parse(&self.statement_type) {
            Some(t) => t,
            None => {
                if !self.statement_type.is_empty() {
                    log::warn!(
                        "Unrecognized statement type '{}', storing as claim",
                        self.statement_type,
                    );
                }
                StatementType::Claim
            }
        }
    }

    /// The speaker reference to store on the occurrence row: the
    /// transcript-local id when present, otherwise the display name
    pub fn speaker_ref(&self) -> &str {
        match &self.speaker_id {
            Some(id) if !id.is_empty() => id,
            _ => &self.speaker,
        }
    }
}

/// A factual-accuracy flag attached by the collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCheck {
    pub verdict: String,
    #[serde(default)]
    pub correction: String,
    #[serde(default)]
    pub search_query: String,
}

/// A logical-fallacy flag attached by the collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fallacy {
    pub name: String,
    #[serde(default)]
    pub explanation: String,
}

/// A corrective instruction against an already-stored statement, keyed by
/// the line index of its occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementUpdate {
    pub line_index: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "type", default)]
    pub statement_type: Option<String>,
    #[serde(default)]
    pub parent_text: Option<String>,
}

/// Decoded incremental extraction response
#[derive(Debug, Clone, Default)]
pub struct IncrementalResponse {
    pub statements: Vec<Statement>,
    pub updates: Vec<StatementUpdate>,
}

impl IncrementalResponse {
    /// Decode a raw incremental response: an object
    /// `{statements, updates?}`, or a bare statement array. Anything else
    /// is an error.
    pub fn decode(raw: &str) -> Result<Self> {
        let text = strip_code_fences(raw);
        let value: Value = serde_json::from_str(text)
            .map_err(|e| anyhow!("extraction response is not valid JSON: {}", e))?;

        match value {
            Value::Object(ref obj) if obj.contains_key("statements") || obj.contains_key("updates") => {
                let statements = match obj.get("statements") {
                    Some(v) => serde_json::from_value(v.clone())
                        .map_err(|e| anyhow!("bad statements field: {}", e))?,
                    None => Vec::new(),
                };
                let updates = match obj.get("updates") {
                    Some(Value::Null) | None => Vec::new(),
                    Some(v) => serde_json::from_value(v.clone())
                        .map_err(|e| anyhow!("bad updates field: {}", e))?,
                };
                Ok(IncrementalResponse { statements, updates })
            }
            Value::Array(_) => {
                let statements = serde_json::from_value(value)
                    .map_err(|e| anyhow!("bad statement array: {}", e))?;
                Ok(IncrementalResponse { statements, updates: Vec::new() })
            }
            other => Err(anyhow!(
                "extraction response matches neither recognized shape: {}",
                shape_name(&other),
            )),
        }
    }
}

/// Decoded full-analysis response
#[derive(Debug, Clone, Default)]
pub struct AnalysisResponse {
    pub title: Option<String>,
    pub statements: Vec<Statement>,
}

impl AnalysisResponse {
    /// Decode a raw full-analysis response: an object
    /// `{title?, statements}`, or a bare statement array.
    pub fn decode(raw: &str) -> Result<Self> {
        let text = strip_code_fences(raw);
        let value: Value = serde_json::from_str(text)
            .map_err(|e| anyhow!("analysis response is not valid JSON: {}", e))?;

        match value {
            Value::Object(ref obj) if obj.contains_key("statements") => {
                let title = obj.get("title").and_then(Value::as_str).map(str::to_string);
                let statements = serde_json::from_value(obj["statements"].clone())
                    .map_err(|e| anyhow!("bad statements field: {}", e))?;
                Ok(AnalysisResponse { title, statements })
            }
            Value::Array(_) => {
                let statements = serde_json::from_value(value)
                    .map_err(|e| anyhow!("bad statement array: {}", e))?;
                Ok(AnalysisResponse { title: None, statements })
            }
            other => Err(anyhow!(
                "analysis response matches neither recognized shape: {}",
                shape_name(&other),
            )),
        }
    }
}

/// Collaborators occasionally wrap JSON in markdown fences despite
/// instructions; strip them before parsing
fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wrapper_object() {
        let raw = r#"{
            "statements": [
                {"speaker": "Alex", "speaker_id": "speaker_1", "text": "AI will replace jobs",
                 "type": "claim", "line_index": 3, "children": []}
            ],
            "updates": [
                {"line_index": 1, "type": "rebuttal"}
            ]
        }"#;

        let decoded = IncrementalResponse::decode(raw).unwrap();
        assert_eq!(decoded.statements.len(), 1);
        assert_eq!(decoded.statements[0].line_index, Some(3));
        assert_eq!(decoded.updates.len(), 1);
        assert_eq!(decoded.updates[0].statement_type.as_deref(), Some("rebuttal"));
    }

    #[test]
    fn test_decode_bare_array() {
        let raw = r#"[
            {"speaker": "Alex", "text": "one", "type": "claim"},
            {"speaker": "Jordan", "text": "two", "type": "rebuttal", "parent_text": "one"}
        ]"#;

        let decoded = IncrementalResponse::decode(raw).unwrap();
        assert_eq!(decoded.statements.len(), 2);
        assert!(decoded.updates.is_empty());
        assert_eq!(decoded.statements[1].parent_text.as_deref(), Some("one"));
    }

    #[test]
    fn test_decode_empty_statements_object() {
        let decoded = IncrementalResponse::decode(r#"{"statements": []}"#).unwrap();
        assert!(decoded.statements.is_empty());
        assert!(decoded.updates.is_empty());
    }

    #[test]
    fn test_decode_strips_markdown_fences() {
        let raw = "```json\n{\"statements\": []}\n```";
        assert!(IncrementalResponse::decode(raw).is_ok());
    }

    #[test]
    fn test_decode_rejects_unrecognized_shapes() {
        assert!(IncrementalResponse::decode("\"just a string\"").is_err());
        assert!(IncrementalResponse::decode("42").is_err());
        assert!(IncrementalResponse::decode(r#"{"foo": "bar"}"#).is_err());
        assert!(IncrementalResponse::decode("not json at all").is_err());
    }

    #[test]
    fn test_decode_analysis_with_title() {
        let raw = r#"{"title": "Jobs Debate", "statements": [{"speaker": "A", "text": "x", "type": "claim"}]}"#;
        let decoded = AnalysisResponse::decode(raw).unwrap();
        assert_eq!(decoded.title.as_deref(), Some("Jobs Debate"));
        assert_eq!(decoded.statements.len(), 1);
    }

    #[test]
    fn test_speaker_ref_prefers_local_id() {
        let mut s = Statement {
            speaker: "Alex".to_string(),
            speaker_id: Some("speaker_1".to_string()),
            text: "x".to_string(),
            statement_type: "claim".to_string(),
            line_index: None,
            children: Vec::new(),
            parent_text: None,
            fact_check: None,
            fallacy: None,
        };
        assert_eq!(s.speaker_ref(), "speaker_1");

        s.speaker_id = None;
        assert_eq!(s.speaker_ref(), "Alex");
    }

    #[test]
    fn test_normalized_type_falls_back_to_claim() {
        let s = Statement {
            speaker: String::new(),
            speaker_id: None,
            text: "x".to_string(),
            statement_type: "hot-take".to_string(),
            line_index: None,
            children: Vec::new(),
            parent_text: None,
            fact_check: None,
            fallacy: None,
        };
        assert_eq!(s.normalized_type(), StatementType::Claim);
    }
}
