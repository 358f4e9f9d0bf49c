//! pf-cli: fetch a page through PhantomJS from the command line
//!
//! Usage:
//!   pf-cli --url https://example.com
//!   pf-cli --url https://example.com --post user=bob --post token=
//!   pf-cli --url https://example.com --screenshot page.png --timeout 30

use pf_core::{FetchRequest, Session, SessionConfig};
use tracing_subscriber::EnvFilter;

/// Everything collected from argv.
#[derive(Debug, Default)]
struct CliArgs {
    url: Option<String>,
    post_fields: Vec<(String, String)>,
    post_requested: bool,
    screenshot: Option<String>,
    user_agent: Option<String>,
    cookie_jar: Option<String>,
    proxy: Option<String>,
    timeout_secs: Option<u64>,
    delay_secs: Option<u64>,
    headers: Vec<(String, String)>,
    inspect_iframes: bool,
    no_content: bool,
    request_response: bool,
    debug: bool,
    help: bool,
    version: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    if args.help {
        print_help();
        return Ok(());
    }
    if args.version {
        println!("pf-cli {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                if args.debug { "debug" } else { "info" }.parse()?,
            ),
        )
        .with_writer(std::io::stderr)
        .init();

    let url = args
        .url
        .ok_or_else(|| anyhow::anyhow!("--url is required (see --help)"))?;

    tracing::info!("Starting pf-cli {}", env!("CARGO_PKG_VERSION"));

    let mut builder = SessionConfig::builder()
        .debug(args.debug)
        .inspect_iframes(args.inspect_iframes)
        .with_content(!args.no_content)
        .with_request_response(args.request_response);
    if let Some(ua) = args.user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(jar) = args.cookie_jar {
        builder = builder.cookie_jar(jar);
    }
    if let Some(proxy) = args.proxy {
        builder = builder.proxy(proxy);
    }
    if let Some(timeout) = args.timeout_secs {
        builder = builder.timeout_secs(timeout);
    }
    if let Some(delay) = args.delay_secs {
        builder = builder.delay_secs(delay);
    }
    for (name, value) in args.headers {
        builder = builder.header(name, value);
    }

    let session = Session::new(builder.build())?;

    let mut request = FetchRequest::new(url);
    if args.post_requested {
        request = request.post_fields(args.post_fields);
    }
    if let Some(path) = args.screenshot {
        request = request.screenshot(path);
    }

    match session.fetch(request).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("fetch failed: {}", err);
            if let Some(stdout) = err.stdout() {
                eprintln!("--- raw stdout ({} bytes) ---", stdout.len());
                eprintln!("{}", stdout);
            }
            if let Some(stderr) = err.stderr() {
                eprintln!("--- raw stderr ({} bytes) ---", stderr.len());
                eprintln!("{}", stderr);
            }
            std::process::exit(1);
        }
    }
}

/// Parse command line arguments
fn parse_args(mut argv: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut args = CliArgs::default();

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--help" | "-h" => args.help = true,
            "--version" | "-v" => args.version = true,
            "--debug" => args.debug = true,
            "--inspect-iframes" => args.inspect_iframes = true,
            "--no-content" => args.no_content = true,
            "--request-response" => args.request_response = true,
            "--url" => args.url = Some(required_value(&mut argv, "--url")?),
            "--post" => {
                let item = required_value(&mut argv, "--post")?;
                args.post_fields.push(split_post_item(&item)?);
                args.post_requested = true;
            }
            "--screenshot" => {
                args.screenshot = Some(required_value(&mut argv, "--screenshot")?)
            }
            "--user-agent" => {
                args.user_agent = Some(required_value(&mut argv, "--user-agent")?)
            }
            "--cookie-jar" => {
                args.cookie_jar = Some(required_value(&mut argv, "--cookie-jar")?)
            }
            "--proxy" => args.proxy = Some(required_value(&mut argv, "--proxy")?),
            "--timeout" => {
                args.timeout_secs = Some(parse_seconds(
                    &required_value(&mut argv, "--timeout")?,
                    "--timeout",
                )?)
            }
            "--delay" => {
                args.delay_secs = Some(parse_seconds(
                    &required_value(&mut argv, "--delay")?,
                    "--delay",
                )?)
            }
            "--header" => {
                let item = required_value(&mut argv, "--header")?;
                args.headers.push(split_post_item(&item)?);
            }
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }

    Ok(args)
}

fn required_value(
    argv: &mut impl Iterator<Item = String>,
    flag: &str,
) -> anyhow::Result<String> {
    argv.next()
        .ok_or_else(|| anyhow::anyhow!("{} requires a value", flag))
}

fn parse_seconds(value: &str, flag: &str) -> anyhow::Result<u64> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("{} expects whole seconds, got {:?}", flag, value))
}

/// Split a `key=value` item; the key must be non-empty, the value may be
/// empty (`token=` sends an empty field).
fn split_post_item(item: &str) -> anyhow::Result<(String, String)> {
    match item.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => anyhow::bail!("expected key=value, got {:?}", item),
    }
}

/// Print help message
fn print_help() {
    println!("pf-cli - fetch a page through PhantomJS");
    println!();
    println!("Usage:");
    println!("  pf-cli --url <URL> [options]");
    println!();
    println!("Options:");
    println!("  --url <URL>             Target URL (http:// or https://, required)");
    println!("  --post <key=value>      POST field, repeatable; value may be empty");
    println!("  --screenshot <path>     Write a screenshot to <path>");
    println!("  --user-agent <string>   User-Agent for page requests");
    println!("  --cookie-jar <path>     Persistent cookie file (must be writable)");
    println!("  --proxy <addr>          HTTP proxy address");
    println!("  --timeout <seconds>     Page-load timeout; the process is killed");
    println!("                          30s after it");
    println!("  --delay <seconds>       Wait after load before scraping");
    println!("  --header <name=value>   Extra HTTP header, repeatable");
    println!("  --inspect-iframes       Recurse into iframes");
    println!("  --no-content            Omit page content from the result");
    println!("  --request-response      Record request/response traces");
    println!("  --debug                 PhantomJS debug output + debug logging");
    println!("  --help                  Show this help message");
    println!("  --version               Show version");
    println!();
    println!("Environment Variables:");
    println!("  PHANTOMJS_BIN           Path to the phantomjs binary");
    println!("                          (default: phantomjs on PATH)");
}
