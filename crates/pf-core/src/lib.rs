//! pf-core: PhantomJS-backed page fetching
//!
//! Drives a headless PhantomJS process running a companion capture script
//! to fetch a URL, optionally submit a form, capture a screenshot and
//! return the page as structured JSON.
//!
//! ## Features
//!
//! - GET/POST fetching with custom headers, user agent, proxy and cookies
//! - Screenshot capture to a caller-chosen path
//! - Optional recursive iframe content and request/response traces
//! - Supervisory timeout that kills a hung rendering process
//! - Marker-based recovery of the JSON payload from noisy stdout
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pf_core::{Session, SessionConfig};
//!
//! let config = SessionConfig::builder()
//!     .user_agent("Mozilla/5.0")
//!     .timeout_secs(30)
//!     .build();
//! let session = Session::new(config)?;
//! let page = session.fetch_url("https://example.com").await?;
//! println!("{}", page["content"]);
//! ```
//!
//! The PhantomJS binary is resolved from the `PHANTOMJS_BIN` environment
//! variable, falling back to `phantomjs` on the PATH.

pub mod args;
pub mod error;
pub mod parse;
pub mod protocol;
pub mod runner;
pub mod sanitize;
pub mod session;

pub use args::{build_invocation, Invocation};
pub use error::{FetchError, Result};
pub use protocol::{Flag, FlagScope, ENV_PHANTOMJS_BIN, MARKER};
pub use runner::{PhantomRunner, ProcessRunner, RawOutput, SUPERVISORY_MARGIN};
pub use sanitize::strip_noise;
pub use session::{FetchRequest, Session, SessionConfig, SessionConfigBuilder};
