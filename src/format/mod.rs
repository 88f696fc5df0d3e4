//! Tool output rendering
//!
//! Every tool answers with a string: markdown for people, or pretty JSON of
//! the same data when the caller asks for `response_format: "json"`.

pub mod markdown;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::TickTickError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Markdown,
    Json,
}

impl ResponseFormat {
    /// Render `value` as JSON, or with `markdown` otherwise.
    pub fn render<T, F>(self, value: &T, markdown: F) -> String
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T) -> String,
    {
        match self {
            ResponseFormat::Markdown => markdown(value),
            ResponseFormat::Json => to_json(value),
        }
    }

    pub fn error(self, err: &TickTickError) -> String {
        match self {
            ResponseFormat::Markdown => format!("**Error**: {}", err),
            ResponseFormat::Json => json!({
                "error": err.code(),
                "message": err.to_string(),
            })
            .to_string(),
        }
    }

    /// A one-line confirmation such as "Task deleted".
    pub fn message(self, text: &str) -> String {
        match self {
            ResponseFormat::Markdown => text.to_string(),
            ResponseFormat::Json => json!({ "success": true, "message": text }).to_string(),
        }
    }
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| json!({ "error": "json_error", "message": e.to_string() }).to_string())
}
