//! Command-line fetcher.
//!
//! Resolves a location, reads it one or more times through an in-memory
//! cache, and reports what came back.

mod args;

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use terrafetch::{
    CachePolicy, Content, Fetcher, IoOptions, MemoryContentCache, Uri, UriContext,
    supports_https,
};

use crate::args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let args = Args::parse();

    let mut context = UriContext::with_referrer(args.referrer.clone().unwrap_or_default());
    for (name, value) in &args.headers {
        context = context.with_header(name, value);
    }
    let uri = Uri::with_context(&args.location, context);

    if !supports_https() && uri.full().to_ascii_lowercase().starts_with("https://") {
        tracing::warn!("built without TLS support; HTTPS reads will fail");
    }

    let fetcher = Fetcher::new();
    let cache = Arc::new(MemoryContentCache::new());
    let io = IoOptions::new()
        .with_cache(cache)
        .with_max_network_attempts(args.attempts)
        .with_cache_policy(CachePolicy::from_usage(args.usage));

    tracing::info!(uri = uri.full(), usage = %args.usage, "reading");

    let mut last: Option<Content> = None;
    let mut failed = false;
    for _ in 0..args.repeat.max(1) {
        match fetcher.read(&uri, &io).await {
            Ok(content) => {
                println!(
                    "{}\t{}\t{} bytes",
                    uri.full(),
                    display_type(&content),
                    content.len()
                );
                last = Some(content);
            }
            Err(e) => {
                tracing::error!(uri = uri.full(), kind = %e.kind(), "{e}");
                failed = true;
            }
        }
    }

    let stats = fetcher.stats();
    tracing::info!(
        hits = stats.hits(),
        gets = stats.gets(),
        hit_ratio = stats.hit_ratio(),
        "cache statistics"
    );

    if let (Some(path), Some(content)) = (&args.output, &last) {
        if let Err(e) = std::fs::write(path, content.data()) {
            tracing::error!(path = %path.display(), "failed to write output: {e}");
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %path.display(), bytes = content.len(), "wrote payload");
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn display_type(content: &Content) -> &str {
    match content.content_type() {
        "" => "unknown",
        content_type => content_type,
    }
}
