//! 🚀 esq-cli — the front door, the bouncer, the maitre d' of esq.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, and then lets the library do the heavy lifting.
//! Like a manager. 🦆
//!
//! Subcommands: `ping` (is it alive), `get` (one doc), `search` (ask a
//! question, get a table), `dump` (scroll the whole index to stdout as
//! NDJSON), `load` (bulk-feed an NDJSON file back in).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use esq::{EsClient, Refresh};
use indicatif::ProgressBar;
use serde_json::{Value, json};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "esq", about = "Talk to an Elasticsearch cluster without writing curl by hand")]
struct Cli {
    /// Config file (TOML). Falls back to ./esq.toml if present, env vars (ESQ_*) otherwise.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 📡 "Hello? Is this thing on?" — print the cluster's info blob.
    Ping,
    /// 📄 Fetch one document by id and print its _source.
    Get {
        index: String,
        doc_type: String,
        id: String,
    },
    /// 🔍 Run a query_string search (or match_all) and print a table of hits.
    Search {
        index: String,
        /// A query_string query, e.g. 'name:Becca AND age:>30'. Omit for match_all.
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long, default_value_t = 10)]
        size: usize,
    },
    /// 📜 Scroll the ENTIRE index to stdout, one _source per line (NDJSON).
    Dump {
        index: String,
        #[arg(long, default_value_t = 500)]
        page_size: usize,
        /// Scroll context lifetime between pages, in minutes.
        #[arg(long, default_value_t = 5)]
        keep_alive_mins: u64,
    },
    /// 📋 Bulk-load an NDJSON file (one document per line) into an index.
    Load {
        index: String,
        doc_type: String,
        file: PathBuf,
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
    },
}

/// 🚀 main() — where it all begins. The genesis. The "I pressed enter and
/// held my breath" moment.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 🔒 Resolve the config file: an explicit --config must exist (failing
    // quietly on a typo'd path is how 3am incidents are born); the implicit
    // ./esq.toml is optional, like a welcome mat.
    let config_file: Option<PathBuf> = match cli.config {
        Some(path) => {
            if !path.try_exists().context(format!(
                "💀 Couldn't even CHECK whether '{}' exists. Permissions? A cursed mount? \
                 Try an absolute path, to be absolutely certain.",
                path.display()
            ))? {
                anyhow::bail!("💀 Config file '{}' does not exist. Typo? pwd? We believe in you.", path.display());
            }
            Some(path)
        }
        None => {
            let default = Path::new("esq.toml");
            default.is_file().then(|| default.to_path_buf())
        }
    };

    let config = esq::load_config(config_file.as_deref())
        .context("💀 Couldn't load the config. Check the file, check ESQ_* env vars, check that you didn't forget something obvious")?;
    let client = EsClient::new(config).context("💀 Couldn't construct the HTTP client")?;

    // 🚀 SEND IT. No take-backs.
    let result = run(client, cli.command).await;

    // 💀 Error handling: the part where we find out what went wrong
    // and print it in a way that's helpful at 3am
    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        // -- 📡 if it smells like a connection problem, it's probably a connection problem
        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: looks like the cluster isn't reachable. Double-check the url in \
                your config, and that Elasticsearch is actually running. If you're using \
                Docker, try `docker ps`, or `docker compose up -d` to resurrect it. \
                Even clusters need a nudge sometimes. ☕"
            );
        }

        std::process::exit(1);
    }

    Ok(())
}

async fn run(client: EsClient, command: Command) -> Result<()> {
    match command {
        Command::Ping => {
            let info = client.ping().await.context("ping failed")?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Get { index, doc_type, id } => {
            match client.get_doc(index.as_str(), doc_type.as_str(), id.as_str()).await? {
                Some(source) => println!("{}", serde_json::to_string_pretty(&source)?),
                None => println!("(not found)"),
            }
        }
        Command::Search { index, query, size } => {
            let mut search = client.prepare_search(index.as_str()).size(size);
            if let Some(q) = query {
                search = search.query(json!({"query_string": {"query": q}}))?;
            }
            let resp = search.execute().await.context("search failed")?;

            // 🍽️ serve the hits on a comfy table
            let mut table = Table::new();
            table
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["_id", "_score", "_source"]);
            for hit in resp.hits() {
                table.add_row(vec![
                    hit["_id"].as_str().unwrap_or("?").to_string(),
                    hit["_score"]
                        .as_f64()
                        .map(|s| format!("{s:.3}"))
                        .unwrap_or_else(|| "-".to_string()),
                    preview(&hit["_source"]),
                ]);
            }
            println!("{table}");
            if let Some(total) = resp.total() {
                println!("{} of {} matching doc(s)", resp.hits().len(), total);
            }
        }
        Command::Dump { index, page_size, keep_alive_mins } => {
            let mut cursor = client
                .prepare_search(index.as_str())
                .scroll_over_all(Duration::from_secs(keep_alive_mins * 60));
            cursor.set_page_size(page_size);

            // 📊 spinner on stderr, data on stdout — pipes stay clean
            let progress = ProgressBar::new_spinner();
            let mut dumped: u64 = 0;
            while let Some(page) = cursor.next_page().await.context("scroll fetch failed")? {
                for hit in &page {
                    let doc = if hit["_source"].is_null() { hit } else { &hit["_source"] };
                    println!("{doc}");
                }
                dumped += page.len() as u64;
                progress.set_message(format!("{dumped} doc(s) dumped"));
                progress.tick();
            }
            progress.finish_with_message(format!("✅ done — {dumped} doc(s) dumped"));
        }
        Command::Load { index, doc_type, file, batch_size } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .context(format!("💀 Couldn't read '{}'", file.display()))?;
            let docs: Vec<&str> = contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect();

            let progress = ProgressBar::new(docs.len() as u64);
            let mut batches = 0usize;
            let mut failures: Vec<String> = Vec::new();
            let chunk_count = docs.len().div_ceil(batch_size.max(1));

            for (chunk_index, chunk) in docs.chunks(batch_size.max(1)).enumerate() {
                let mut bulk = client.prepare_bulk();
                for line in chunk {
                    bulk.add(
                        client
                            .prepare_index(index.as_str(), doc_type.as_str())
                            .source_json(line.to_string())
                            .context("a document line refused to become a body")?,
                    );
                }
                // 🔄 the last batch waits for a refresh, so "load then read"
                // behaves the way humans expect it to
                if chunk_index + 1 == chunk_count {
                    bulk.set_refresh(Refresh::WaitFor);
                }
                let resp = bulk.execute().await.context("bulk flight failed outright")?;
                if let Some(summary) = resp.error_summary() {
                    failures.push(format!("batch {chunk_index}: {summary}"));
                }
                batches += 1;
                progress.inc(chunk.len() as u64);
            }
            progress.finish();

            // 🍽️ the after-action report
            let mut table = Table::new();
            table
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["docs", "batches", "failed batches"]);
            table.add_row(vec![
                docs.len().to_string(),
                batches.to_string(),
                failures.len().to_string(),
            ]);
            println!("{table}");

            if !failures.is_empty() {
                for failure in &failures {
                    error!("💀 {failure}");
                }
                anyhow::bail!("{} batch(es) had per-item failures — see above", failures.len());
            }
        }
    }
    Ok(())
}

/// ✂️ First ~60 chars of a JSON value — enough to recognize a document,
/// not enough to wrap the terminal three times.
fn preview(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= 60 {
        rendered
    } else {
        let cut: String = rendered.chars().take(60).collect();
        format!("{cut}…")
    }
}
