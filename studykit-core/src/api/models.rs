//! Wire types for the ask endpoints.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Speaker of one history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior turn of the conversation, replayed so the backend can resolve
/// follow-up questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request body shared by the atomic and streaming ask endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParams {
    /// Project/collection the question runs against.
    pub target: String,
    pub message: String,
    pub history: Vec<ChatTurn>,
    pub selected_document_ids: Vec<String>,
}

impl ChatParams {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
            history: Vec::new(),
            selected_document_ids: Vec::new(),
        }
    }
}

/// One evidence record pointing back at a source document.
///
/// Canonical wire names are `documentId` / `documentName` / `excerptText`;
/// older backends emit `doc_id` / `doc_name` / `chunk_text`, accepted as
/// aliases. Only the id is required, and it may arrive as a string or a
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    #[serde(
        rename = "documentId",
        alias = "doc_id",
        deserialize_with = "document_id_from_scalar"
    )]
    pub document_id: String,
    #[serde(rename = "documentName", alias = "doc_name", default)]
    pub document_name: String,
    #[serde(rename = "excerptText", alias = "chunk_text", default)]
    pub excerpt_text: String,
}

fn document_id_from_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(D::Error::custom(format!(
            "document id must be a string or number, got {other}"
        ))),
    }
}

/// Body of the atomic ask endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
}

/// The single terminal outcome of a streaming session. Failure is a value
/// here, not an error: `errored` with a readable message in `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalResult {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub errored: bool,
}
