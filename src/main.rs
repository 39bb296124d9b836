//! Amnesia Paginator
//!
//! Paginates a plain-text file with the configured layout and prints a
//! JSON summary. Page boundaries are cached, so a second run is a lookup.

use std::env;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amnesia_paginator::paging::{BookSource, LayoutConfig, PagingSession, Position};
use amnesia_paginator::text::PlainTextBook;
use amnesia_paginator::Config;

#[derive(Serialize)]
struct Summary {
    book: String,
    pages: usize,
    layout: LayoutConfig,
    hash: Option<String>,
    from_cache: bool,
    cache_file: String,
    marks: Vec<Position>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "amnesia_paginator=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let path = env::args()
        .nth(1)
        .context("usage: amnesia-paginator <file.txt>")?;

    tracing::info!("Starting Amnesia Paginator v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Cache directory: {}", config.cache.dir.display());
    tracing::info!("Layout: {} font {}", config.layout, config.layout.font_size);

    config.layout.validate().context("Configured layout cannot be paginated")?;

    let book = Arc::new(
        PlainTextBook::open(&path).with_context(|| format!("Failed to open {}", path))?,
    );
    let mut session = PagingSession::from_config(&config)?;
    session.set_book(Some(book.clone()), None);
    session.set_layout_config(config.layout);
    session.wait_until_loaded().await;

    let slot = session
        .current_slot()
        .context("Paging finished without a result")?;
    tracing::info!(pages = slot.marks.len(), from_cache = slot.from_cache, "Paginated {}", book.id());

    let summary = Summary {
        book: book.id().to_string(),
        pages: slot.marks.len(),
        layout: slot.config,
        hash: slot.hash.map(|h| h.to_hex()),
        from_cache: slot.from_cache,
        cache_file: session
            .store()
            .path_for(book.id(), &slot.config)
            .display()
            .to_string(),
        marks: slot.marks.as_slice().to_vec(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
    );

    Ok(())
}
