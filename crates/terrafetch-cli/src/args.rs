//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;
use terrafetch::{CacheUsage, DEFAULT_MAX_NETWORK_ATTEMPTS};

/// Parse a `name:value` header argument.
fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected name:value, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in '{s}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[derive(Parser, Debug)]
#[command(about = "Fetch a map or imagery resource from a file or HTTP server")]
pub struct Args {
    /// Path or URL to read; may contain a `[abc]` mirror rotation marker.
    pub location: String,

    /// Location that relative references are resolved against.
    #[arg(long)]
    pub referrer: Option<String>,

    /// Extra request header (format: name:value). May be repeated.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Maximum network attempts per read.
    #[arg(long, default_value_t = DEFAULT_MAX_NETWORK_ATTEMPTS)]
    pub attempts: u32,

    /// Cache usage: read-write, read-only, cache-only or no-cache.
    #[arg(long, default_value_t = CacheUsage::ReadWrite)]
    pub usage: CacheUsage,

    /// Number of times to read the location.
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Write the payload of the last successful read to this file.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}
