//! 🔌 Requests — one value type, many faces.
//!
//! 🎭 This module is the casting agency. Need to index a document? Update one?
//! Scroll a result set into oblivion? There's a request variant for that.
//! We've got variants for days. Fewer forms than the DMV, and ours are typed.
//!
//! 🧠 Knowledge graph:
//! - [`EsRequest`] is the one concrete request value: method, path pieces,
//!   url params, body, retry budget. Every operation compiles down to it.
//! - [`Body`] is a tagged union {RawJson, Structured, Ndjson} — serialization
//!   is resolved by matching the tag, never by runtime type sniffing.
//! - [`RequestKind`] carries the per-variant smarts: which HTTP method, which
//!   preconditions to check BEFORE any network happens, and how to judge the
//!   response that comes back. The dispatcher calls all three uniformly.
//! - Typed builders (one per submodule) wrap `EsRequest` with fluent setters
//!   and hand it to the dispatcher by value. Built once, executed once.
//!
//! 🦆 The duck is here because every module hub must have one. This is law.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::{Map, Value};

use crate::error::{EsError, EsResult};
use crate::response::EsResponse;

pub(crate) mod delete;
pub(crate) mod get;
pub(crate) mod index;
pub(crate) mod search;
pub(crate) mod update;

// 🎯 Re-export the builders so callers can do `esq::requests::IndexRequest`
// instead of spelunking into `requests::index::IndexRequest`.
// Convenience is a feature. So is not typing "requests::index::" fourteen times per file.
pub use delete::DeleteRequest;
pub use get::GetRequest;
pub use index::IndexRequest;
pub use search::{SearchRequest, SearchResponse};
pub use update::UpdateRequest;

/// 📦 The request body, as a tagged union — no runtime type inspection, ever.
///
/// - `RawJson`: a pre-serialized JSON string, passed through verbatim (but
///   integrity-checked by parsing it back before dispatch — if WE can't parse
///   it, the cluster definitely can't).
/// - `Structured`: a key→value map, serialized at dispatch time.
/// - `Ndjson`: a fully rendered newline-delimited payload for `/_bulk`.
///   Not JSON. Don't parse it as JSON. It will not end well.
#[derive(Debug, Clone)]
pub(crate) enum Body {
    RawJson(String),
    Structured(Map<String, Value>),
    Ndjson(String),
}

/// 🎭 The many faces of a request — a polymorphic casting call, as an enum.
///
/// Each variant knows its own preconditions (`validate`), its HTTP verb
/// (`http_method`), its URL suffix (`endpoint`), and how to interpret what
/// comes back (`unwrap_response`). The dispatcher invokes these uniformly and
/// never match-es on kinds itself. The variant set is closed, so enum dispatch
/// beats a trait object here — same pattern, fewer vtables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    Index,
    Update,
    Delete,
    Get,
    Search,
    ScrollContinue,
    ClearScroll,
    Bulk,
}

impl RequestKind {
    /// 🏷️ The action name this operation goes by when riding in a bulk batch.
    /// `None` means "this kind does not do bulk" — and the batch will say so loudly.
    pub(crate) fn bulk_op_name(self) -> Option<&'static str> {
        match self {
            RequestKind::Index => Some("index"),
            RequestKind::Update => Some("update"),
            RequestKind::Delete => Some("delete"),
            _ => None,
        }
    }

    /// 📡 The URL suffix for this kind, if it has one.
    /// NB: only a few requests, such as get, don't need an endpoint.
    pub(crate) fn endpoint(self) -> Option<&'static str> {
        match self {
            RequestKind::Update => Some("_update"),
            RequestKind::Search => Some("_search"),
            RequestKind::ScrollContinue | RequestKind::ClearScroll => Some("_search/scroll"),
            RequestKind::Bulk => Some("_bulk"),
            RequestKind::Index | RequestKind::Delete | RequestKind::Get => None,
        }
    }

    /// 🔍 Check for necessary parameters BEFORE any network activity.
    /// E.g. an update needs an index-name, type and id — a missing one is a
    /// `Config` error here, not a 400 from the cluster thirty milliseconds later.
    pub(crate) fn validate(self, req: &EsRequest) -> EsResult<()> {
        let need_index = |what: &str| -> EsResult<()> {
            if req.index.is_none() {
                return Err(EsError::config(format!("no index specified for {what}")));
            }
            if req.doc_type.is_none() {
                return Err(EsError::config(format!("no type specified for {what}")));
            }
            Ok(())
        };
        let need_id = |what: &str| -> EsResult<()> {
            if req.id.is_none() {
                return Err(EsError::config(format!("no id specified for {what}")));
            }
            Ok(())
        };
        match self {
            RequestKind::Index => {
                need_index("index")?;
                if req.body.is_none() {
                    return Err(EsError::config("no document supplied for index"));
                }
                Ok(())
            }
            RequestKind::Update => {
                need_index("update")?;
                need_id("update")
            }
            RequestKind::Delete => {
                need_index("delete")?;
                need_id("delete")
            }
            RequestKind::Get => {
                need_index("get")?;
                need_id("get")
            }
            RequestKind::Search => {
                if req.index.is_none() {
                    return Err(EsError::config("no index specified for search"));
                }
                Ok(())
            }
            RequestKind::ScrollContinue | RequestKind::ClearScroll => {
                if req.body.is_none() {
                    return Err(EsError::config("no scroll_id supplied for scroll call"));
                }
                Ok(())
            }
            RequestKind::Bulk => {
                if req.body.is_none() {
                    return Err(EsError::config("bulk request has no rendered payload"));
                }
                Ok(())
            }
        }
    }

    /// 📬 The HTTP verb. Index is the one two-faced kind: PUT with an explicit
    /// id, POST when the cluster gets to invent one.
    pub(crate) fn http_method(self, req: &EsRequest) -> Method {
        match self {
            RequestKind::Index => {
                if req.id.is_some() {
                    Method::PUT
                } else {
                    Method::POST
                }
            }
            RequestKind::Update | RequestKind::Search | RequestKind::ScrollContinue | RequestKind::Bulk => {
                Method::POST
            }
            RequestKind::Delete | RequestKind::ClearScroll => Method::DELETE,
            RequestKind::Get => Method::GET,
        }
    }

    /// 🔄 Judge the raw response, per kind. Default is pass-through-on-success;
    /// the interesting variants:
    /// - `Get` and `ClearScroll` pass ANY status through (a 404 get is data,
    ///   a failed scroll cleanup is a shrug, not an error).
    /// - `ScrollContinue` turns "your context is gone" into
    ///   [`EsError::CursorExpired`] — fatal for the cursor, distinct from EOF.
    pub(crate) fn unwrap_response(self, resp: EsResponse) -> EsResult<EsResponse> {
        match self {
            RequestKind::Get | RequestKind::ClearScroll => Ok(resp),
            RequestKind::ScrollContinue => {
                let gone = resp.status() == 404
                    || (!resp.is_success() && resp.body().contains("search_context_missing"));
                if gone {
                    return Err(EsError::CursorExpired { status: resp.status() });
                }
                if !resp.is_success() {
                    return Err(api_error(&resp));
                }
                Ok(resp)
            }
            _ => {
                if !resp.is_success() {
                    return Err(api_error(&resp));
                }
                Ok(resp)
            }
        }
    }
}

fn api_error(resp: &EsResponse) -> EsError {
    EsError::Api {
        status: resp.status(),
        reason: resp.error_reason(),
    }
}

/// 📦 One HTTP call, fully described: where, what, with which body, and how
/// stubborn to be about network failures.
///
/// Built by a typed builder, consumed exactly once by the dispatcher.
/// At most ONE index name per request — the field is singular on purpose;
/// multi-index addressing only means anything for search, and even there we
/// keep it to one. The builders uphold this by construction.
#[derive(Debug, Clone)]
pub struct EsRequest {
    pub(crate) kind: RequestKind,
    pub(crate) index: Option<String>,
    pub(crate) doc_type: Option<String>,
    pub(crate) id: Option<String>,
    /// The url params — i.e. those passed via the query string. See `body` for the rest.
    pub(crate) params: HashMap<String, String>,
    pub(crate) body: Option<Body>,
    pub(crate) retries: u32,
}

impl EsRequest {
    pub(crate) fn new(
        kind: RequestKind,
        index: Option<String>,
        doc_type: Option<String>,
        id: Option<String>,
    ) -> Self {
        Self {
            kind,
            index,
            doc_type,
            id,
            params: HashMap::new(),
            body: None,
            retries: 0,
        }
    }

    /// 🔧 Set a url query param. Last write wins; the map is unordered and
    /// nobody downstream depends on ordering. (The wire doesn't either.)
    pub(crate) fn param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// 🔄 How many EXTRA attempts after a transport failure. 0 = fail fast.
    pub(crate) fn set_retries(&mut self, retries: u32) {
        self.retries = retries;
    }

    /// 📦 Set the request body from a pre-serialized JSON string.
    /// 💀 Can only be called once — a second set is a state error, not a merge.
    pub(crate) fn set_source_raw(&mut self, json: impl Into<String>) -> EsResult<()> {
        if self.body.is_some() {
            return Err(EsError::BodyAlreadySet);
        }
        self.body = Some(Body::RawJson(json.into()));
        Ok(())
    }

    /// 📦 Set the request body from a structured map. Same once-only rule.
    pub(crate) fn set_source_map(&mut self, map: Map<String, Value>) -> EsResult<()> {
        if self.body.is_some() {
            return Err(EsError::BodyAlreadySet);
        }
        self.body = Some(Body::Structured(map));
        Ok(())
    }

    /// 🔧 Insert one entry into a structured body, creating the map on first use.
    ///
    /// This is how the update builder grows its `{"doc": …, "upsert": …}` body
    /// incrementally. 💀 If a raw body was already set, there is no map to grow
    /// into — that's the same state error as setting the source twice.
    pub(crate) fn body_entry(&mut self, key: &str, value: Value) -> EsResult<()> {
        match &mut self.body {
            None => {
                let mut map = Map::new();
                map.insert(key.to_string(), value);
                self.body = Some(Body::Structured(map));
                Ok(())
            }
            Some(Body::Structured(map)) => {
                map.insert(key.to_string(), value);
                Ok(())
            }
            Some(Body::RawJson(_)) | Some(Body::Ndjson(_)) => Err(EsError::BodyAlreadySet),
        }
    }

    /// 📦 The body as a JSON string, or `None` if no body was set.
    ///
    /// Raw strings are passed through verbatim — but sanity-checked by parsing
    /// them back first. If the round-trip fails, this is a `Serialization`
    /// error HERE, before dispatch, not a cryptic 400 from the cluster later.
    pub fn body_json(&self) -> EsResult<Option<String>> {
        match &self.body {
            None => Ok(None),
            Some(Body::RawJson(s)) => {
                serde_json::from_str::<Value>(s).map_err(EsError::Serialization)?;
                Ok(Some(s.clone()))
            }
            Some(Body::Structured(map)) => Ok(Some(
                serde_json::to_string(map).map_err(EsError::Serialization)?,
            )),
            Some(Body::Ndjson(s)) => Ok(Some(s.clone())),
        }
    }

    /// 📏 The body as EXACTLY one line, for bulk source lines.
    ///
    /// A verbatim raw body is allowed to be pretty-printed; NDJSON is not.
    /// We scan for `\n` with memchr (fast path: none found, string reused
    /// as-is) and re-serialize from the parsed form only when we must —
    /// `serde_json::to_string` never emits literal newlines.
    pub(crate) fn body_json_single_line(&self) -> EsResult<Option<String>> {
        let Some(json) = self.body_json()? else {
            return Ok(None);
        };
        if memchr::memchr(b'\n', json.as_bytes()).is_none() {
            return Ok(Some(json));
        }
        let value: Value = serde_json::from_str(&json).map_err(EsError::Serialization)?;
        Ok(Some(
            serde_json::to_string(&value).map_err(EsError::Serialization)?,
        ))
    }
}
