//! 🔧 Client configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! 🧠 Knowledge graph:
//! - Env vars (`ESQ_*`) form the base layer; an optional TOML file merges on top
//! - TOML wins on conflicts — files are deliberate, env vars are ambient
//! - Everything except `url` has a serde default, so the minimal config is one line

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::error::{EsError, EsResult};

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// 📦 Everything the client needs to know about the cluster it's bothering.
///
/// 🔧 Auth is tri-modal: username+password, api_key, or "I hope anonymous
/// works" (on a production cluster, it won't). `api_key` outranks basic auth
/// wherever both are set. This is not a democracy.
#[derive(Debug, Deserialize, Clone)]
pub struct EsConfig {
    /// 📡 The URL of your Elasticsearch cluster. Include scheme + port. Yes, all of it.
    /// No, `localhost` alone is not enough. Yes, I know it worked in dev. Yes, I know.
    pub url: String,
    /// 🔒 Username for basic auth. Optional, like flossing. You know you should have one.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. If this is in plaintext in your config file, I've already filed
    /// a complaint with the Department of Security Choices.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key auth — the fancy way. Preferred over basic auth wherever both exist.
    #[serde(default)]
    pub api_key: Option<String>,
    /// 🔄 How many EXTRA attempts a request gets after a transport failure.
    /// 0 (the default) means "fail fast, no second chances, we're not a casino."
    /// Application-level error responses are never retried — only dead sockets are.
    #[serde(default)]
    pub retries: u32,
    /// ⏱️ Connect timeout. If the cluster can't handshake in 10 seconds,
    /// it's not having a good time and neither are we.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// ⏱️ Whole-request timeout. Bulk requests can be meaty and we're not monsters.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 🫁 Gzip bulk payloads at or above this many bytes (`Content-Encoding: gzip`).
    /// `None` (the default) means never compress. Bytes are squishy; opt in.
    #[serde(default)]
    pub gzip_bulk_over_bytes: Option<usize>,
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            api_key: None,
            retries: 0,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            gzip_bulk_over_bytes: None,
        }
    }
}

/// 🚀 Load the config — from env vars, an optional TOML file, or the sheer power of hoping.
///
/// 📐 DESIGN NOTE (no cap, this is tribal knowledge):
///   - If `config_file` is None  → env vars only. No file. No assumptions.
///   - If `config_file` is Some  → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Returns `EsError::Config` if the merge can't produce a valid `EsConfig` —
/// the message names the file (or the lack of one), so 3am-you knows where to look.
pub fn load_config(config_file: Option<&Path>) -> EsResult<EsConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file.unwrap_or(Path::new("<env only>"))
    );

    // 🏗️ Start with env vars as the base layer — like a good sourdough starter.
    // ALL ESQ_* vars accepted. No ID required. No velvet rope. Everyone's invited.
    let figment = Figment::new().merge(Env::prefixed("ESQ_"));

    // 🎯 Conditionally layer in TOML only if a file was actually provided.
    // No file? No problem. We trust the env. Like a golden retriever trusts everyone.
    let figment = match config_file {
        Some(file_name) => figment.merge(Toml::file(file_name)),
        None => figment,
    };

    figment.extract().map_err(|e| {
        // 💬 A context message that actually TELLS you what went wrong.
        // None of that "error: error" energy. This isn't a Kafka novel. (The author, not the queue.)
        let where_from = match config_file {
            Some(path) => format!("file '{}' merged with env vars (ESQ_*)", path.display()),
            None => "environment variables (ESQ_*) alone — no file was provided".to_string(),
        };
        EsError::config(format!("💀 failed to assemble EsConfig from {where_from}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    // 🧪 Figment wants TOML from disk, like it's method acting. So: disk it is.
    fn write_test_config(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new()
            .expect("💀 Failed to create temp config. The filesystem said 'new phone who dis'.");
        fs::write(file.path(), contents)
            .expect("💀 Failed to write test config. Even the temp dir has trust issues.");
        file
    }

    #[test]
    fn the_one_where_a_minimal_config_gets_all_the_defaults() {
        let file = write_test_config(r#"url = "http://localhost:9200""#);

        let config: EsConfig = Figment::new()
            .merge(Toml::file(file.path()))
            .extract()
            .expect("💀 One-line config should parse. Serde left us on read otherwise.");

        assert_eq!(config.url, "http://localhost:9200");
        assert_eq!(config.retries, 0, "default is fail-fast, no retry");
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.username.is_none());
        assert!(config.gzip_bulk_over_bytes.is_none());
    }

    #[test]
    fn the_one_where_every_knob_gets_turned() {
        let file = write_test_config(
            r#"
            url = "https://es.example.com:9243"
            username = "elastic"
            password = "hunter2"
            retries = 2
            connect_timeout_secs = 3
            request_timeout_secs = 120
            gzip_bulk_over_bytes = 65536
            "#,
        );

        let config = load_config(Some(file.path()))
            .expect("💀 Fully specified config should parse. The schema drift goblin loses today.");

        assert_eq!(config.url, "https://es.example.com:9243");
        assert_eq!(config.username.as_deref(), Some("elastic"));
        assert_eq!(config.retries, 2);
        assert_eq!(config.connect_timeout_secs, 3);
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.gzip_bulk_over_bytes, Some(65536));
    }

    #[test]
    fn the_one_where_garbage_toml_fails_with_a_named_file() {
        let file = write_test_config("url = [this is not toml, this is a cry for help");

        let err = load_config(Some(file.path()))
            .expect_err("💀 Garbage in should NOT mean config out.");
        let msg = err.to_string();
        assert!(
            msg.contains("failed to assemble EsConfig"),
            "error should say what failed, got: {msg}"
        );
    }
}
