//! 📦 EsResponse — what came back, exactly as it came back.
//!
//! Read-only after construction. The raw body is kept verbatim; JSON parsing
//! happens on demand so pass-through consumers never pay for it.

use serde_json::Value;

use crate::error::{EsError, EsResult};

/// 📡 One HTTP answer from the cluster: status + raw body.
///
/// Typed interpretation lives elsewhere — `BulkResponse` decodes an item
/// array, `SearchResponse` digs out hits, plain calls just read this as-is.
/// This struct does not judge. It only carries.
#[derive(Debug, Clone)]
pub struct EsResponse {
    status: u16,
    body: String,
}

impl EsResponse {
    pub(crate) fn new(status: u16, body: String) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The raw body, byte-for-byte as the server sent it.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// 🔄 Parse the body as JSON. 💀 `EsError::Parse` if the cluster sent us
    /// something that only looks like JSON from a distance.
    pub fn json(&self) -> EsResult<Value> {
        serde_json::from_str(&self.body).map_err(|e| EsError::Parse(e.to_string()))
    }

    /// 💬 Best-effort human-readable reason for an error response.
    ///
    /// Elasticsearch error bodies are poetry. Dark poetry. The good line is
    /// usually at `error.reason`; failing that, `error` as a string; failing
    /// THAT, the opening of the raw body, truncated before it becomes a saga.
    pub(crate) fn error_reason(&self) -> String {
        if let Ok(json) = self.json() {
            if let Some(reason) = json["error"]["reason"].as_str() {
                return reason.to_string();
            }
            if let Some(err) = json["error"].as_str() {
                return err.to_string();
            }
        }
        let mut snippet = self.body.clone();
        if snippet.len() > 200 {
            // -- ✂️ truncate on a char boundary; panicking inside error reporting
            // -- would be a little too on-the-nose
            let cut = (1..=200).rev().find(|i| snippet.is_char_boundary(*i)).unwrap_or(0);
            snippet.truncate(cut);
            snippet.push('…');
        }
        if snippet.is_empty() {
            snippet = "<empty body>".to_string();
        }
        snippet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_reason_is_lifted_from_error_reason() {
        let resp = EsResponse::new(
            400,
            r#"{"error":{"type":"mapper_parsing_exception","reason":"failed to parse field"}}"#
                .to_string(),
        );
        assert_eq!(resp.error_reason(), "failed to parse field");
    }

    #[test]
    fn the_one_where_a_non_json_body_gets_truncated_not_worshipped() {
        let resp = EsResponse::new(502, "x".repeat(500));
        let reason = resp.error_reason();
        assert!(reason.len() < 250, "long bodies get cut, got {} chars", reason.len());
        assert!(reason.ends_with('…'));
    }

    #[test]
    fn the_one_where_success_is_a_range_not_a_number() {
        assert!(EsResponse::new(201, String::new()).is_success());
        assert!(!EsResponse::new(404, String::new()).is_success());
        assert!(!EsResponse::new(199, String::new()).is_success());
    }
}
