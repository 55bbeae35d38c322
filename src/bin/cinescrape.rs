//! cinescrape: movie lookup chat core.
//!
//! `repl` reads `chat_id<TAB>text` lines from stdin and prints each reply as
//! a JSON line, standing in for a real chat transport. `lookup` runs one
//! query and prints the records.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

use cinescrape::cache::{JsonFileStore, SnapshotStore};
use cinescrape::config::{Config, Settings};
use cinescrape::{ChatId, Cinescrape, ConversationController, MovieLookup, normalize};

/// Movie lookup chat core.
#[derive(Parser)]
#[command(name = "cinescrape")]
#[command(version)]
#[command(about = "Scrape, parse, and cache movie search results for a chat bot")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve chat messages from stdin, one `chat_id<TAB>text` per line
    Repl {
        /// Chat id for lines without a `chat_id<TAB>` prefix
        #[arg(long, default_value_t = 1)]
        chat_id: i64,
    },

    /// Look up a single query and print the records as JSON
    Lookup {
        /// Free-text query
        #[arg(required = true)]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Configuration errors are the only fatal ones
    let settings = Config::load(args.config.as_deref())?.validate()?;
    let lookup = build_lookup(&settings)?;

    let store: Option<Arc<dyn SnapshotStore>> = settings
        .snapshot_path
        .clone()
        .map(|path| Arc::new(JsonFileStore::new(path)) as Arc<dyn SnapshotStore>);
    if let Some(store) = &store {
        restore_snapshot(&lookup, store.as_ref());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        search_url = %settings.search_url,
        "cinescrape starting"
    );

    match args.command {
        Command::Lookup { query } => run_lookup(&lookup, &query.join(" ")).await?,
        Command::Repl { chat_id } => {
            run_repl(lookup.clone(), &settings, store.clone(), ChatId(chat_id)).await?;
        }
    }

    if let Some(store) = store {
        save_snapshot(&lookup, store).await;
    }
    Ok(())
}

/// Build a [`MovieLookup`] from validated settings.
fn build_lookup(settings: &Settings) -> cinescrape::Result<MovieLookup> {
    Cinescrape::builder()
        .search_url(settings.search_url.clone())
        .http(settings.http.clone())
        .retry(settings.retry.clone())
        .rate_limit(settings.rate_limit.clone())
        .cache(settings.cache.clone())
        .selectors(settings.selectors.clone())
        .build()
}

async fn run_lookup(lookup: &MovieLookup, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let key = normalize(query);
    let entry = lookup.lookup(&key).await?;
    if entry.is_negative() {
        info!(key = %key, "no results");
    }
    println!("{}", serde_json::to_string_pretty(&entry.records)?);
    Ok(())
}

async fn run_repl(
    lookup: MovieLookup,
    settings: &Settings,
    store: Option<Arc<dyn SnapshotStore>>,
    default_chat: ChatId,
) -> Result<(), Box<dyn std::error::Error>> {
    let controller = Arc::new(ConversationController::new(
        lookup.clone(),
        settings.sessions.clone(),
    ));

    let mut background: Vec<JoinHandle<()>> = vec![spawn_sweeper(
        Arc::clone(&controller),
        settings.sweep_interval,
    )];
    if let Some(store) = store {
        background.push(spawn_snapshotter(lookup, store, settings.snapshot_interval));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = JoinSet::new();
    while let Some(line) = lines.next_line().await? {
        let (chat_id, text) = split_line(&line, default_chat);
        if text.trim().is_empty() {
            continue;
        }

        // the session sees lines in input order; lookups then run concurrently
        let reply = controller.submit(chat_id, text);
        pending.spawn(async move {
            if let Some(reply) = reply.await {
                match serde_json::to_string(&reply) {
                    Ok(json) => println!("{json}"),
                    Err(e) => warn!(chat_id = %chat_id, error = %e, "failed to encode reply"),
                }
            }
        });
        while pending.try_join_next().is_some() {}
    }

    while pending.join_next().await.is_some() {}
    for task in background {
        task.abort();
    }
    Ok(())
}

/// Split `chat_id<TAB>text`; lines without a numeric prefix go to `default_chat`.
fn split_line(line: &str, default_chat: ChatId) -> (ChatId, &str) {
    match line.split_once('\t') {
        Some((id, text)) => match id.trim().parse::<i64>() {
            Ok(id) => (ChatId(id), text),
            Err(_) => (default_chat, line),
        },
        None => (default_chat, line),
    }
}

fn spawn_sweeper(controller: Arc<ConversationController>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            controller.sweep_idle_sessions();
        }
    })
}

fn spawn_snapshotter(
    lookup: MovieLookup,
    store: Arc<dyn SnapshotStore>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            save_snapshot(&lookup, Arc::clone(&store)).await;
        }
    })
}

fn restore_snapshot(lookup: &MovieLookup, store: &dyn SnapshotStore) {
    match store.load() {
        Ok(entries) => {
            let total = entries.len();
            let restored = lookup.cache().restore(entries);
            info!(restored, skipped = total - restored, "restored cache snapshot");
        }
        Err(e) => warn!(error = %e, "failed to load cache snapshot"),
    }
}

async fn save_snapshot(lookup: &MovieLookup, store: Arc<dyn SnapshotStore>) {
    let entries = lookup.cache().snapshot();
    let count = entries.len();
    match tokio::task::spawn_blocking(move || store.save(&entries)).await {
        Ok(Ok(())) => info!(entries = count, "saved cache snapshot"),
        Ok(Err(e)) => warn!(error = %e, "failed to save cache snapshot"),
        Err(e) => warn!(error = %e, "snapshot task failed"),
    }
}
