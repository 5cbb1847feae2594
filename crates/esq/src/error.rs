//! 💀 Error taxonomy — every way this can go wrong, with a name tag on each.
//!
//! 🧠 Knowledge graph:
//! - `Config` / `BodyAlreadySet` / `Serialization` → raised BEFORE any network call
//! - `Transport` → the network failed; retries already happened; this is the obituary
//! - `Api` → Elasticsearch answered, and the answer was "no"
//! - `CursorExpired` → the scroll context died of old age between two pages
//! - Bulk per-item failures are NOT here — those travel as data in `BulkItem`,
//!   because a batch where 3 of 100 items failed is still 97 successes.
//!
//! 🦆 The duck reviewed this taxonomy and found it taxonomically sound.

use thiserror::Error;

/// Shorthand for the library's fallible returns.
pub type EsResult<T> = std::result::Result<T, EsError>;

/// 🏷️ The one error enum to rule them all.
///
/// Callers can `match` on the variant instead of grepping a string — the
/// difference between a diagnosis and a shrug. Variants are grouped by WHEN
/// they can happen: pre-dispatch (config/state/serialization), in-flight
/// (transport), and post-flight (api/parse/cursor).
#[derive(Debug, Error)]
pub enum EsError {
    /// 📋 A required field is missing or a value makes no sense.
    /// Raised synchronously, before a single byte leaves the building.
    #[error("request mis-configured: {0}")]
    Config(String),

    /// 🔒 The body can be set exactly once per request. This was twice.
    #[error("request body can only be set once (it was already set)")]
    BodyAlreadySet,

    /// 🔄 The payload failed the JSON round-trip sanity check.
    /// If we can't parse what we're about to send, neither can the cluster.
    #[error("payload failed the json round-trip: {0}")]
    Serialization(#[source] serde_json::Error),

    /// 📡 The network said no, `attempts` times in a row.
    /// `attempts` counts every try, including the first non-retry one.
    #[error("transport gave up after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// 💀 Elasticsearch answered with an error status for the call as a whole.
    /// The `reason` is lifted from the response's `error.reason` when the
    /// cluster was kind enough to provide one.
    #[error("elasticsearch returned {status}: {reason}")]
    Api { status: u16, reason: String },

    /// 🐛 We got an HTTP response, but its body was not the JSON we were promised.
    #[error("could not make sense of the response: {0}")]
    Parse(String),

    /// ⏳ The server-side scroll context expired or vanished. Fatal for this
    /// cursor — not retryable, and NOT the same thing as "no more data"
    /// (that's an empty page). The whole scroll must be restarted.
    #[error("scroll context is gone (status {status}); restart the scroll from the top")]
    CursorExpired { status: u16 },
}

impl EsError {
    /// 📋 Convenience constructor — `EsError::config("no index specified")`.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// 🐛 Convenience constructor for response-shape complaints.
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
