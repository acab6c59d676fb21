//! SRG Fetch - Command-line client for SRG Network.
//!
//! Fetches a JSON document and optionally follows its pagination, printing
//! each page to stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use srg_network::{
    json_field_paginator, link_header_paginator, query_page_paginator, query_sizer,
    BaseRequest, FirstPageRequest, HttpResponse, NetworkActivity, Page, RequestOptions,
    RetryConfig, Session, SessionConfig, UrlRequest,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "srg-fetch")]
#[command(version = srg_network::MARKETING_VERSION)]
#[command(about = "Fetch paginated JSON documents with SRG Network")]
struct Args {
    /// URL of the first page
    url: String,

    /// Maximum number of pages to fetch
    #[arg(long, default_value = "1")]
    pages: u32,

    /// Page size to request (omit to let the service decide)
    #[arg(long)]
    page_size: Option<u32>,

    /// Query parameter carrying the page size
    #[arg(long, default_value = "pageSize")]
    size_param: String,

    /// Query parameter carrying the page number (JSON array responses)
    #[arg(long)]
    page_param: Option<String>,

    /// Dictionary field holding the next page URL (defaults to the Link header)
    #[arg(long)]
    next_field: Option<String>,

    /// Number of retries for failed requests
    #[arg(long, default_value = "2")]
    retries: u32,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Deliver HTTP error responses instead of failing
    #[arg(long)]
    allow_http_errors: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

type PageOutcome = (
    srg_network::Result<Value>,
    Page,
    Option<Page>,
    Option<HttpResponse>,
);

/// How the next page is located.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pagination {
    Field(String),
    Query(String),
    LinkHeader,
}

impl Pagination {
    fn from_args(args: &Args) -> Result<Self> {
        match (&args.next_field, &args.page_param) {
            (Some(_), Some(_)) => bail!("--next-field and --page-param are mutually exclusive"),
            (Some(field), None) => Ok(Pagination::Field(field.clone())),
            (None, Some(param)) => Ok(Pagination::Query(param.clone())),
            (None, None) => Ok(Pagination::LinkHeader),
        }
    }

    fn next_request(
        &self,
        url_request: &UrlRequest,
        value: Option<&Value>,
        response: Option<&HttpResponse>,
        size: u32,
        number: u32,
    ) -> Option<UrlRequest> {
        match self {
            Pagination::Field(field) => json_field_paginator(field)(
                url_request,
                value.and_then(Value::as_object),
                response,
                size,
                number,
            ),
            Pagination::Query(param) => query_page_paginator(param)(
                url_request,
                value.and_then(Value::as_array),
                response,
                size,
                number,
            ),
            Pagination::LinkHeader => {
                link_header_paginator::<Value>()(url_request, value, response, size, number)
            }
        }
    }
}

fn init_logging(args: &Args) {
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if args.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    }
}

fn session_config(args: &Args) -> SessionConfig {
    SessionConfig::new()
        .with_timeout(Duration::from_secs(args.timeout))
        .with_retry(RetryConfig::new().with_max_attempts(args.retries.saturating_add(1)))
}

fn request_options(args: &Args) -> RequestOptions {
    RequestOptions::new().with_http_errors_disabled(args.allow_http_errors)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let pagination = Pagination::from_args(&args)?;
    let url_request = UrlRequest::get(&args.url)?;
    let session = Session::with_config(session_config(&args))?;
    NetworkActivity::shared().enable();

    info!("SRG Network {}", srg_network::marketing_version());

    let (tx, mut rx) = mpsc::unbounded_channel::<PageOutcome>();
    let first = FirstPageRequest::object(
        url_request,
        &session,
        request_options(&args),
        |data| Ok(serde_json::from_slice::<Value>(data)?),
        query_sizer(&args.size_param),
        move |url_request, value, response, size, number| {
            pagination.next_request(url_request, value, response, size, number)
        },
        move |result, page, next_page, response| {
            let _ = tx.send((result, page, next_page, response));
        },
    );
    let first = match args.page_size {
        Some(size) => first.with_page_size(size),
        None => first,
    };

    let mut request = first.with_page(None);
    for _ in 0..args.pages {
        request.resume();

        let (result, page, next_page, response) = tokio::select! {
            outcome = rx.recv() => outcome.context("request ended without completion")?,
            _ = tokio::signal::ctrl_c() => {
                request.cancel();
                warn!("Interrupted, request cancelled");
                return Ok(());
            }
        };

        let value = result.with_context(|| format!("failed to fetch {}", page))?;
        if let Some(response) = &response {
            info!("{} -> {}", page, response.status());
        }
        println!("{}", serde_json::to_string_pretty(&value)?);

        match next_page {
            Some(next_page) => request = first.with_page(Some(&next_page)),
            None => break,
        }
    }

    Ok(())
}
