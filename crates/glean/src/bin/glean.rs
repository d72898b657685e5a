// ABOUTME: CLI binary for glean: extracts values, records or pagination links from an HTML file or fetched URL.
// ABOUTME: Prints pretty JSON to stdout or a file; logs go to stderr with verbosity set by -v.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use digests_glean::{
    count, exists, extract_multiple, extract_pagination, extract_single, extract_structured,
    extract_structured_list, ExtractOptions, FetcherBuilder, ProxyConfig, Schema, SelectorKind,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "glean")]
#[command(about = "Extract data from HTML with XPath or CSS selectors")]
struct Args {
    /// HTML file to read
    #[arg(long = "html", conflicts_with = "fetch", required_unless_present = "fetch")]
    html: Option<PathBuf>,

    /// URL to fetch instead of reading a file
    #[arg(long = "fetch")]
    fetch: Option<String>,

    /// Retries after the first fetch attempt
    #[arg(long = "retries", default_value_t = 3)]
    retries: u32,

    /// Delay between fetch attempts in milliseconds
    #[arg(long = "retry-delay-ms", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Per-attempt timeout in seconds
    #[arg(long = "timeout-secs", default_value_t = 30)]
    timeout_secs: u64,

    /// Rotate browser User-Agent strings
    #[arg(long = "random-user-agent")]
    random_user_agent: bool,

    /// Proxy URL (http, https, socks4 or socks5)
    #[arg(long = "proxy")]
    proxy: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long = "insecure")]
    insecure: bool,

    /// JSON schema file describing the fields of a record
    #[arg(long = "schema", conflicts_with_all = ["pagination", "selector"])]
    schema: Option<PathBuf>,

    /// Container selector; with --schema, extracts one record per container
    #[arg(long = "container", requires = "schema")]
    container: Option<String>,

    /// Pagination container selector
    #[arg(long = "pagination", conflicts_with = "selector")]
    pagination: Option<String>,

    /// Selector for a single query
    #[arg(long = "selector")]
    selector: Option<String>,

    /// Attribute to read from matched elements
    #[arg(long = "attribute", requires = "selector")]
    attribute: Option<String>,

    /// Return every match instead of the first
    #[arg(long = "multiple", requires = "selector")]
    multiple: bool,

    /// Return serialized markup
    #[arg(long = "raw")]
    raw: bool,

    /// Keep empty values in multiple-value results
    #[arg(long = "keep-empty")]
    keep_empty: bool,

    /// Print the number of matches
    #[arg(long = "count", requires = "selector", conflicts_with_all = ["exists", "multiple"])]
    count: bool,

    /// Print whether the selector matches anything
    #[arg(long = "exists", requires = "selector", conflicts_with = "multiple")]
    exists: bool,

    /// Selector language: xpath (default) or css
    #[arg(long = "kind", default_value = "xpath")]
    kind: SelectorKind,

    /// Base URL for resolving relative links (defaults to the fetched URL)
    #[arg(long = "base-url")]
    base_url: Option<String>,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("digests_glean=warn,warn"),
        1 => EnvFilter::new("digests_glean=info,warn"),
        2 => EnvFilter::new("digests_glean=debug,info"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn load_html(args: &Args) -> anyhow::Result<String> {
    if let Some(path) = &args.html {
        return fs::read_to_string(path).with_context(|| format!("reading {:?}", path));
    }
    let Some(url) = &args.fetch else {
        bail!("one of --html or --fetch is required");
    };

    let mut builder = FetcherBuilder::new()
        .retries(args.retries)
        .retry_delay(Duration::from_millis(args.retry_delay_ms))
        .timeout(Duration::from_secs(args.timeout_secs))
        .random_user_agent(args.random_user_agent)
        .ignore_ssl_errors(args.insecure);
    if let Some(proxy) = &args.proxy {
        builder = builder.proxy(ProxyConfig::new(proxy));
    }

    let response = builder.build().fetch_html(url).await?;
    tracing::info!(url = %url, status = response.status, bytes = response.data.len(), "fetched");
    Ok(response.data)
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let json = fs::read_to_string(path).with_context(|| format!("reading schema {:?}", path))?;
    Schema::from_json(&json).with_context(|| format!("loading schema {:?}", path))
}

fn extract(args: &Args, html: &str, opts: &ExtractOptions) -> anyhow::Result<Value> {
    if let Some(schema_path) = &args.schema {
        let schema = load_schema(schema_path)?;
        return Ok(match &args.container {
            Some(container) => Value::Array(
                extract_structured_list(html, container, args.kind, &schema, opts)
                    .into_iter()
                    .map(Value::Object)
                    .collect(),
            ),
            None => Value::Object(extract_structured(html, &schema, opts)),
        });
    }

    if let Some(container) = &args.pagination {
        let pages = extract_pagination(html, container, args.kind, opts);
        return Ok(serde_json::to_value(pages)?);
    }

    let Some(selector) = &args.selector else {
        bail!("one of --schema, --pagination or --selector is required");
    };
    let attribute = args.attribute.as_deref();
    Ok(if args.count {
        Value::from(count(html, selector, args.kind, opts))
    } else if args.exists {
        Value::Bool(exists(html, selector, args.kind, opts))
    } else if args.multiple {
        Value::Array(extract_multiple(html, selector, args.kind, attribute, opts))
    } else {
        extract_single(html, selector, args.kind, attribute, opts).unwrap_or(Value::Null)
    })
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let html = load_html(args).await?;

    let mut opts = ExtractOptions::new()
        .verbose(args.verbose > 0)
        .raw(args.raw)
        .keep_empty(args.keep_empty);
    if let Some(base) = args.base_url.as_ref().or(args.fetch.as_ref()) {
        opts = opts.with_base_url(base.clone());
    }

    let value = extract(args, &html, &opts)?;
    let output = serde_json::to_string_pretty(&value)?;

    match &args.output {
        Some(path) => fs::write(path, &output).with_context(|| format!("writing to {:?}", path))?,
        None => println!("{}", output),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
