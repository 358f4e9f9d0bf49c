//! Fetch session management
//!
//! A [`Session`] holds the immutable per-session configuration and drives
//! one rendering-process run per fetch: validate the URL, build the
//! invocation, run under the supervisory deadline, strip stdout noise,
//! parse the payload.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::args::build_invocation;
use crate::error::{FetchError, Result};
use crate::parse::parse_payload;
use crate::protocol::{DEFAULT_SCRIPT, MARKER};
use crate::runner::{PhantomRunner, ProcessRunner, SUPERVISORY_MARGIN};
use crate::sanitize::strip_noise;

const ACCEPTED_PROTOCOLS: [&str; 2] = ["http://", "https://"];

/// Session configuration, immutable once a [`Session`] is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// User-Agent string sent by the page requests.
    pub user_agent: Option<String>,
    /// File holding persistent cookies; must be writable when set.
    pub cookie_jar: Option<PathBuf>,
    /// HTTP proxy address.
    pub proxy: Option<String>,
    /// Script-level page-load timeout in seconds. The enforced supervisory
    /// deadline is this plus a fixed margin; unset means wait indefinitely.
    pub timeout_secs: Option<u64>,
    /// Recursively inspect iframes and report their content per frame.
    pub inspect_iframes: bool,
    /// Forward PhantomJS debug output and log stderr/noise at debug level.
    pub debug: bool,
    /// Seconds to wait after page load before scraping, for late async JS.
    pub delay_secs: Option<u64>,
    /// Include page content in the result.
    pub with_content: bool,
    /// Record every request/response the page makes.
    pub with_request_response: bool,
    /// Extra HTTP headers; ordered map so invocations are deterministic.
    pub headers: Option<BTreeMap<String, String>>,
    /// Path to the capture script.
    pub script: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            cookie_jar: None,
            proxy: None,
            timeout_secs: None,
            inspect_iframes: false,
            debug: false,
            delay_secs: None,
            with_content: true,
            with_request_response: false,
            headers: None,
            script: PathBuf::from(DEFAULT_SCRIPT),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration builder
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for SessionConfig
#[derive(Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn cookie_jar(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cookie_jar = Some(path.into());
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy.into());
        self
    }

    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.config.timeout_secs = Some(seconds);
        self
    }

    pub fn inspect_iframes(mut self, inspect: bool) -> Self {
        self.config.inspect_iframes = inspect;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn delay_secs(mut self, seconds: u64) -> Self {
        self.config.delay_secs = Some(seconds);
        self
    }

    pub fn with_content(mut self, with_content: bool) -> Self {
        self.config.with_content = with_content;
        self
    }

    pub fn with_request_response(mut self, with_rr: bool) -> Self {
        self.config.with_request_response = with_rr;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.config.headers = Some(headers);
        self
    }

    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.script = path.into();
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

/// One fetch: target URL plus per-call options.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Target URL; must start with `http://` or `https://`.
    pub url: String,
    /// POST fields, in order; `None` means GET. Values may be empty.
    pub post_fields: Option<Vec<(String, String)>>,
    /// Where the rendering process should write a screenshot.
    pub capture_screen: Option<PathBuf>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            post_fields: None,
            capture_screen: None,
        }
    }

    pub fn post_fields(mut self, fields: Vec<(String, String)>) -> Self {
        self.post_fields = Some(fields);
        self
    }

    pub fn screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.capture_screen = Some(path.into());
        self
    }
}

/// Managed fetch session
///
/// Safe to share across tasks: the configuration is read-only and every
/// fetch owns its own process.
pub struct Session {
    config: SessionConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session running the real PhantomJS binary (resolved from
    /// `PHANTOMJS_BIN`, falling back to PATH lookup).
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_runner(config, Arc::new(PhantomRunner::from_env()))
    }

    /// Create a session with an explicit runner.
    pub fn with_runner(config: SessionConfig, runner: Arc<dyn ProcessRunner>) -> Result<Self> {
        if let Some(ref jar) = config.cookie_jar {
            if !is_writable(jar) {
                return Err(FetchError::Config(format!(
                    "Cannot write to cookie jar {:?}",
                    jar
                )));
            }
        }
        Ok(Self { config, runner })
    }

    /// Fetch a URL with GET and no screenshot.
    pub async fn fetch_url(&self, url: impl Into<String>) -> Result<Value> {
        self.fetch(FetchRequest::new(url)).await
    }

    /// Run one full fetch and return the parsed payload.
    ///
    /// Failures after the process ran carry its raw stdout/stderr for
    /// diagnosis.
    pub async fn fetch(&self, request: FetchRequest) -> Result<Value> {
        if !has_accepted_protocol(&request.url) {
            return Err(FetchError::UnsupportedProtocol(request.url));
        }

        info!(url = %request.url, "fetching");
        let invocation = build_invocation(&self.config, &request);
        debug!(args = ?invocation.to_args(), "rendering process invocation");

        let raw = self
            .runner
            .run(&invocation, self.supervisory_deadline())
            .await?;
        debug!(
            stdout_bytes = raw.stdout.len(),
            stderr_bytes = raw.stderr.len(),
            "captured rendering output"
        );

        let stdout = raw.stdout_lossy();
        if self.config.debug {
            debug!(stderr = %raw.stderr_lossy(), "stderr from rendering process");
        }

        let (payload, discarded) = strip_noise(&stdout, MARKER);
        if discarded > 0 {
            debug!(discarded, "discarded noise bytes before marker");
        }

        parse_payload(payload).map_err(|_| FetchError::InvalidOutput {
            stdout: stdout.clone(),
            stderr: raw.stderr_lossy(),
        })
    }

    /// Deadline for the supervisory kill: script timeout plus the fixed
    /// margin, or no deadline at all when no timeout is configured.
    fn supervisory_deadline(&self) -> Option<Duration> {
        self.config
            .timeout_secs
            .map(|secs| Duration::from_secs(secs) + SUPERVISORY_MARGIN)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

fn has_accepted_protocol(url: &str) -> bool {
    ACCEPTED_PROTOCOLS.iter().any(|p| url.starts_with(p))
}

/// Probe by opening for append, creating the file if missing; mirrors what
/// the rendering process itself will do with the jar.
fn is_writable(path: &std::path::Path) -> bool {
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .is_ok()
}
