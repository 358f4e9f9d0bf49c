//! Command-line construction for the rendering process
//!
//! Pure code: a `SessionConfig` + `FetchRequest` pair always yields the same
//! token sequence. Validation happens in the session facade before this
//! module is reached.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::protocol::{Flag, MARKER};
use crate::session::{FetchRequest, SessionConfig};

/// An ordered rendering-process command line, minus the binary itself.
///
/// Binary options must precede the script path and script options must
/// follow it; PhantomJS stops parsing its own switches at the first
/// non-switch argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub binary_options: Vec<String>,
    pub script: PathBuf,
    pub script_options: Vec<String>,
}

impl Invocation {
    /// Flatten into the argument list passed to the binary.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(
            self.binary_options.len() + 1 + self.script_options.len(),
        );
        args.extend(self.binary_options.iter().map(OsString::from));
        args.push(self.script.as_os_str().to_os_string());
        args.extend(self.script_options.iter().map(OsString::from));
        args
    }
}

/// Build the full invocation for one fetch.
pub fn build_invocation(config: &SessionConfig, request: &FetchRequest) -> Invocation {
    // The capture script walks the full DOM, including cross-origin frames
    // and local resources, so the PhantomJS sandbox has to be opened up.
    let mut binary_options = vec![
        Flag::IgnoreSslErrors.binary_token("true"),
        Flag::LocalToRemoteUrlAccess.binary_token("true"),
        Flag::WebSecurity.binary_token("false"),
    ];

    if let Some(ref jar) = config.cookie_jar {
        let path = normalize_path(jar);
        binary_options.push(Flag::CookiesFile.binary_token(&path.to_string_lossy()));
    }
    if let Some(ref proxy) = config.proxy {
        binary_options.push(Flag::Proxy.binary_token(proxy));
    }
    if config.debug {
        binary_options.push(Flag::Debug.binary_token("true"));
    }

    let mut script_options = vec![
        Flag::MagicString.script_token(),
        MARKER.to_string(),
        Flag::Url.script_token(),
        request.url.clone(),
    ];

    if let Some(ref ua) = config.user_agent {
        script_options.push(Flag::UserAgent.script_token());
        script_options.push(ua.clone());
    }
    if let Some(ref screen) = request.capture_screen {
        script_options.push(Flag::CaptureScreen.script_token());
        script_options.push(screen.to_string_lossy().into_owned());
    }
    if config.inspect_iframes {
        script_options.push(Flag::InspectIframes.script_token());
    }
    if let Some(timeout) = config.timeout_secs {
        script_options.push(Flag::TimeoutSec.script_token());
        script_options.push(timeout.to_string());
    }
    if let Some(delay) = config.delay_secs {
        script_options.push(Flag::DelaySec.script_token());
        script_options.push(delay.to_string());
    }
    if !config.with_content {
        script_options.push(Flag::NoContent.script_token());
    }
    if config.with_request_response {
        script_options.push(Flag::RequestResponse.script_token());
    }
    if let Some(ref fields) = request.post_fields {
        script_options.push(Flag::PostFull.script_token());
        script_options.push(encode_post_fields(fields));
    }
    if let Some(ref headers) = config.headers {
        script_options.push(Flag::CustomHeadersJson.script_token());
        // BTreeMap keys are ordered, so the blob is deterministic.
        script_options.push(
            serde_json::to_string(headers).unwrap_or_else(|_| "{}".to_string()),
        );
    }

    Invocation {
        binary_options,
        script: config.script.clone(),
        script_options,
    }
}

/// URL-encode POST fields into a single `k=v&k=v` payload token.
/// Values may be empty; field order is preserved.
pub fn encode_post_fields(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lexical path cleanup (drops `.` components, including a leading one);
/// no filesystem access.
fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DEFAULT_SCRIPT;

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    fn get_request(url: &str) -> FetchRequest {
        FetchRequest::new(url)
    }

    #[test]
    fn test_deterministic() {
        let config = SessionConfig::builder()
            .user_agent("agent")
            .proxy("127.0.0.1:8080")
            .timeout_secs(10)
            .header("X-A", "1")
            .header("X-B", "2")
            .build();
        let request = get_request("https://example.com");

        let a = build_invocation(&config, &request);
        let b = build_invocation(&config, &request);
        assert_eq!(a, b);
    }

    #[test]
    fn test_binary_options_before_script_options_after() {
        let config = SessionConfig::builder()
            .proxy("127.0.0.1:8080")
            .debug(true)
            .build();
        let inv = build_invocation(&config, &get_request("http://example.com"));
        let args = inv.to_args();

        let script_pos = args
            .iter()
            .position(|a| a == &OsString::from(DEFAULT_SCRIPT))
            .unwrap();
        assert!(args[..script_pos]
            .iter()
            .all(|a| a.to_string_lossy().contains('=')));
        assert_eq!(args[script_pos + 1], OsString::from("--magic-string"));
        assert_eq!(args[script_pos + 2], OsString::from(MARKER));
        assert_eq!(args[script_pos + 3], OsString::from("--url"));
        assert_eq!(args[script_pos + 4], OsString::from("http://example.com"));
    }

    #[test]
    fn test_hardening_flags_always_present() {
        let inv = build_invocation(&config(), &get_request("https://example.com"));
        assert_eq!(
            inv.binary_options,
            vec![
                "--ignore-ssl-errors=true",
                "--local-to-remote-url-access=true",
                "--web-security=false",
            ]
        );
    }

    #[test]
    fn test_conditional_flags_absent_by_default() {
        let inv = build_invocation(&config(), &get_request("https://example.com"));
        let joined = inv.script_options.join(" ");
        assert!(!joined.contains("--user-agent"));
        assert!(!joined.contains("--timeout-sec"));
        assert!(!joined.contains("--no-content"));
        assert!(!joined.contains("--post-full"));
        assert!(!joined.contains("--custom-headers-json"));
    }

    #[test]
    fn test_no_content_and_request_response_flags() {
        let config = SessionConfig::builder()
            .with_content(false)
            .with_request_response(true)
            .build();
        let inv = build_invocation(&config, &get_request("https://example.com"));
        assert!(inv.script_options.contains(&"--no-content".to_string()));
        assert!(inv
            .script_options
            .contains(&"--request-response".to_string()));
    }

    #[test]
    fn test_post_fields_encoding() {
        let fields = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), String::new()),
        ];
        assert_eq!(encode_post_fields(&fields), "a=1&b=");

        let fields = vec![("key with space".to_string(), "a&b".to_string())];
        assert_eq!(encode_post_fields(&fields), "key%20with%20space=a%26b");
    }

    #[test]
    fn test_post_payload_token() {
        let request = FetchRequest::new("https://example.com").post_fields(vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), String::new()),
        ]);
        let inv = build_invocation(&config(), &request);
        let pos = inv
            .script_options
            .iter()
            .position(|o| o == "--post-full")
            .unwrap();
        assert_eq!(inv.script_options[pos + 1], "a=1&b=");
    }

    #[test]
    fn test_headers_blob() {
        let config = SessionConfig::builder()
            .header("X-Token", "abc")
            .header("Accept", "text/html")
            .build();
        let inv = build_invocation(&config, &get_request("https://example.com"));
        let pos = inv
            .script_options
            .iter()
            .position(|o| o == "--custom-headers-json")
            .unwrap();
        assert_eq!(
            inv.script_options[pos + 1],
            r#"{"Accept":"text/html","X-Token":"abc"}"#
        );
    }

    #[test]
    fn test_cookie_jar_and_screenshot() {
        let config = SessionConfig::builder()
            .cookie_jar("./cookies.txt")
            .build();
        let request = get_request("https://example.com").screenshot("/tmp/shot.png");
        let inv = build_invocation(&config, &request);
        assert!(inv
            .binary_options
            .contains(&"--cookies-file=cookies.txt".to_string()));
        let pos = inv
            .script_options
            .iter()
            .position(|o| o == "--capture-screen")
            .unwrap();
        assert_eq!(inv.script_options[pos + 1], "/tmp/shot.png");
    }
}
