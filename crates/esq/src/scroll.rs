//! 📜 Scroll — turning a page-oriented API into one long, lazy sequence.
//!
//! 🎬 COLD OPEN — INT. DATA CENTER — 3:47 AM
//!
//! Ten million documents need reading. The search API hands them over one
//! page at a time, like a librarian who only trusts you with six books per
//! visit. Between visits, the server holds your place with an opaque token.
//! Lose the token, or dawdle past its lifetime, and your place is gone —
//! not "no more books", GONE. These are different things. This module knows
//! the difference.
//!
//! 🧠 Knowledge graph:
//! - State machine: NotStarted → (first fetch) → Active → (empty page) → Exhausted
//! - The token is OPAQUE and REPLACEABLE: every response may issue a new one;
//!   we always continue with the latest. No reading tea leaves in it.
//! - Exhaustion = an empty page. Expiry = [`EsError::CursorExpired`]. EOF is
//!   data; expiry is an error; the two never dress as each other.
//! - Release runs on every exit path: natural exhaustion, explicit
//!   [`ScrollCursor::release`], and a best-effort fire-and-forget on Drop.
//!   Best-effort means best-effort — a failed release is a shrug in the logs,
//!   never an error for the consumer.
//! - One cursor, one driver. The token is a single linear position; two
//!   concurrent consumers would teleport each other around the result set.
//!   Out of contract. Don't.
//!
//! 🦆 The duck has read the whole result set. It won't say how it ends.

use std::time::Duration;

use async_channel::Receiver;
use async_trait::async_trait;
use futures::Stream;
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::client::EsClient;
use crate::error::{EsError, EsResult};
use crate::requests::search::SearchResponse;
use crate::requests::{EsRequest, RequestKind};

/// 🚰 Anything that produces result pages until it runs dry.
///
/// Implement this and you too can be the origin of someone else's pagination
/// problems. The contract is the simplest of all streaming contracts:
/// `Ok(Some(page))` while data flows, `Ok(None)` when the well is dry —
/// permanently dry, not "try again later" dry.
#[async_trait]
pub trait PageSource {
    /// 📄 Fetch the next page of hits. `None` = EOF. Forever.
    async fn next_page(&mut self) -> EsResult<Option<Vec<Value>>>;
}

/// The three ages of a scroll. There is no going back, only forward and done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrollState {
    NotStarted,
    Active,
    Exhausted,
}

/// 📜 A lazy, one-pass walk over an entire result set.
///
/// Wraps a seed search plus a server-side context lifetime, and pulls pages
/// until the server sends an empty one. Total hits delivered across all pages
/// equals the result-set size at scroll start — the last page carries the
/// remainder when the page size doesn't divide evenly, and the page after
/// that is empty and ends things. `keep_alive` bounds the gap BETWEEN pulls,
/// not the whole trip.
///
/// Built via [`crate::requests::SearchRequest::scroll_over_all`]. Not
/// restartable; make a new one. Not shareable; see the module notes.
#[derive(Debug)]
pub struct ScrollCursor {
    client: EsClient,
    /// The seed search — consumed by the first pull, `None` forever after.
    seed: Option<EsRequest>,
    keep_alive: Duration,
    /// The server's bookmark. Opaque. Latest one wins, always.
    scroll_id: Option<String>,
    state: ScrollState,
}

impl ScrollCursor {
    pub(crate) fn new(client: EsClient, seed: EsRequest, keep_alive: Duration) -> Self {
        Self {
            client,
            seed: Some(seed),
            keep_alive,
            scroll_id: None,
            state: ScrollState::NotStarted,
        }
    }

    /// 📏 Ask for this many hits per page — UNLESS the seed search already
    /// chose its own size, in which case the search wins and this is a no-op.
    /// The search was there first.
    pub fn set_page_size(&mut self, size: usize) -> &mut Self {
        if let Some(seed) = &mut self.seed {
            if !seed.params.contains_key("size") {
                seed.param("size", size.to_string());
            }
        }
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ScrollState::Exhausted
    }

    /// 📄 Pull the next page. The whole state machine lives here.
    ///
    /// - First call: runs the seed search with a `scroll` lifetime attached,
    ///   pockets the cursor token, hands back page one.
    /// - Later calls: posts `{scroll, scroll_id}` to the continuation
    ///   endpoint — the server keeps the query state, we keep only the token.
    /// - Empty page: transition to Exhausted, release the server context,
    ///   return `None`. Every call after that returns `None` without so much
    ///   as glancing at the network. 💀 An expired context surfaces as
    ///   [`EsError::CursorExpired`] and also parks the cursor at Exhausted —
    ///   the scroll must be restarted from the top, says the contract.
    pub async fn next_page(&mut self) -> EsResult<Option<Vec<Value>>> {
        match self.state {
            ScrollState::Exhausted => Ok(None),
            ScrollState::NotStarted => {
                let mut seed = self
                    .seed
                    .take()
                    .ok_or_else(|| EsError::config("scroll cursor has no seed search"))?;
                seed.param("scroll", keep_alive_param(self.keep_alive));
                self.state = ScrollState::Active;
                let resp = self.client.execute(seed).await?;
                let search = SearchResponse::decode(resp)?;
                self.scroll_id = search.scroll_id().map(str::to_string);
                debug!(
                    "📜 scroll opened: {} hit(s) on page one, total ~{:?}",
                    search.hits().len(),
                    search.total()
                );
                self.page_or_exhaust(search).await
            }
            ScrollState::Active => {
                let Some(scroll_id) = self.scroll_id.clone() else {
                    // The server never issued a token (single-page result on a
                    // cluster that doesn't bother) — nothing left to continue with.
                    self.state = ScrollState::Exhausted;
                    return Ok(None);
                };
                let mut req = EsRequest::new(RequestKind::ScrollContinue, None, None, None);
                let mut body = Map::new();
                body.insert("scroll".to_string(), json!(keep_alive_param(self.keep_alive)));
                body.insert("scroll_id".to_string(), json!(scroll_id));
                req.set_source_map(body)?;
                let resp = match self.client.execute(req).await {
                    Ok(resp) => resp,
                    Err(expired @ EsError::CursorExpired { .. }) => {
                        // ⏳ The context died between pulls. Fatal for this
                        // cursor; there is nothing left to release either.
                        self.state = ScrollState::Exhausted;
                        self.scroll_id = None;
                        return Err(expired);
                    }
                    Err(other) => return Err(other),
                };
                let search = SearchResponse::decode(resp)?;
                if let Some(id) = search.scroll_id() {
                    // 🔄 tokens may change between calls; always keep the latest
                    self.scroll_id = Some(id.to_string());
                }
                self.page_or_exhaust(search).await
            }
        }
    }

    /// Either hand the page over, or — on the empty page that means "done" —
    /// flip to Exhausted and free the server side.
    async fn page_or_exhaust(&mut self, search: SearchResponse) -> EsResult<Option<Vec<Value>>> {
        let hits = search.hits().to_vec();
        if hits.is_empty() {
            self.state = ScrollState::Exhausted;
            self.release().await;
            return Ok(None);
        }
        Ok(Some(hits))
    }

    /// 🗑️ Free the server-side scroll context, best-effort.
    ///
    /// Safe to call at any time, any number of times — it only acts when
    /// there's a token to surrender. Call this when abandoning a scroll
    /// early; natural exhaustion calls it for you. Failures are logged and
    /// swallowed: cleanup is a courtesy, not a correctness requirement.
    pub async fn release(&mut self) {
        let Some(scroll_id) = self.scroll_id.take() else {
            return;
        };
        clear_scroll(&self.client, scroll_id).await;
    }

    /// 🌊 The cursor as a `futures::Stream` of pages. Same one-pass contract,
    /// combinator-friendly shape.
    pub fn into_stream(self) -> impl Stream<Item = EsResult<Vec<Value>>> {
        futures::stream::try_unfold(self, |mut cursor| async move {
            match cursor.next_page().await? {
                Some(page) => Ok(Some((page, cursor))),
                None => Ok(None),
            }
        })
    }

    /// ✉️ Spawn a producer task that drives this cursor and mails each page
    /// into a bounded channel. The cursor stays single-driver (the task);
    /// the CONSUMER gets to live anywhere. If the consumer hangs up early,
    /// the producer notices the dead channel, releases the server context,
    /// and goes home without a fuss.
    pub fn spawn_into_channel(
        mut self,
        capacity: usize,
    ) -> (Receiver<Vec<Value>>, JoinHandle<EsResult<()>>) {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        let handle = tokio::spawn(async move {
            loop {
                match self.next_page().await? {
                    Some(page) => {
                        if tx.send(page).await.is_err() {
                            // 📴 consumer hung up — stop fetching, free the server side
                            self.release().await;
                            break;
                        }
                    }
                    None => break,
                }
            }
            Ok(())
        });
        (rx, handle)
    }
}

#[async_trait]
impl PageSource for ScrollCursor {
    async fn next_page(&mut self) -> EsResult<Option<Vec<Value>>> {
        ScrollCursor::next_page(self).await
    }
}

// 🗑️ Scoped acquisition, the async-flavored way: if the cursor still holds a
// token when it dies, fling a release at the server from a detached task.
// No runtime at hand → nothing we can do, and that's fine — the context
// expires on its own schedule anyway. Keep-alive is the real safety net.
impl Drop for ScrollCursor {
    fn drop(&mut self) {
        if let Some(scroll_id) = self.scroll_id.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let client = self.client.clone();
                handle.spawn(async move { clear_scroll(&client, scroll_id).await });
            } else {
                trace!("📜 dropping un-released scroll with no runtime around; the ttl will sweep it up");
            }
        }
    }
}

/// The `scroll=` lifetime in the units the API speaks: whole minutes when the
/// duration divides cleanly, seconds otherwise.
fn keep_alive_param(keep_alive: Duration) -> String {
    let secs = keep_alive.as_secs().max(1);
    if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// DELETE `/_search/scroll` with the token. Outcome: logged, swallowed.
async fn clear_scroll(client: &EsClient, scroll_id: String) {
    let mut req = EsRequest::new(RequestKind::ClearScroll, None, None, None);
    let mut body = Map::new();
    body.insert("scroll_id".to_string(), json!([scroll_id]));
    if req.set_source_map(body).is_err() {
        return;
    }
    match client.execute(req).await {
        Ok(resp) if resp.is_success() => trace!("🗑️ scroll context released — the server may forget us now"),
        Ok(resp) => warn!(
            "⚠️ scroll release answered {} — shrugging, cleanup is best-effort",
            resp.status()
        ),
        Err(e) => warn!("⚠️ scroll release failed in transit: {e} — shrugging, cleanup is best-effort"),
    }
}
