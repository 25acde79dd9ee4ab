//! Chat prompt payloads, plain and encrypted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatPrompt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(rename = "escapedPrompt", default, skip_serializing_if = "Option::is_none")]
    pub escaped_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatParams {
    #[serde(rename = "tabId")]
    pub tab_id: String,
    #[serde(default)]
    pub prompt: ChatPrompt,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Chat params as sent over an encrypted session: `message` is a JWE token
/// whose claim set is the [`ChatParams`] itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedChatParams {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}
