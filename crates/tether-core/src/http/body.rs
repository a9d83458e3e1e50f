//! Request parameter encodings

use serde::{Deserialize, Serialize};

/// How request parameters travel to the server
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ParameterEncoding {
    /// JSON body
    #[default]
    Json,
    /// Parameters are sent as query items
    UrlEncoded,
    /// Caller-supplied multipart body
    MultipartForm { boundary: String },
}

impl ParameterEncoding {
    pub fn content_type(&self) -> String {
        match self {
            ParameterEncoding::Json => "application/json; charset=utf-8".to_string(),
            ParameterEncoding::UrlEncoded => "application/x-www-form-urlencoded; charset=utf-8".to_string(),
            ParameterEncoding::MultipartForm { boundary } => {
                format!("multipart/form-data; charset=utf-8; boundary={}", boundary)
            }
        }
    }
}

/// Render a body for debug logging: pretty JSON when it parses, lossy text otherwise
pub fn describe(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}
