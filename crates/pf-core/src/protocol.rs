//! Invocation protocol shared with the capture script
//!
//! The flag names below, the marker string and the option ordering form a
//! versioned wire protocol between this crate and the PhantomJS capture
//! script. Renaming a flag on one side without the other breaks interop.

/// Marker printed by the capture script immediately before the JSON payload.
/// Not secret, just unlikely to collide with page output or PhantomJS
/// diagnostics.
pub const MARKER: &str = "MAGIC_8SD6ADEADBEEFD8AA8DS68F8_MAGIC";

/// Environment variable naming the PhantomJS binary.
pub const ENV_PHANTOMJS_BIN: &str = "PHANTOMJS_BIN";

/// Fallback binary name, resolved via PATH when the env var is unset.
pub const DEFAULT_PHANTOMJS_BIN: &str = "phantomjs";

/// Default capture script path, relative to the working directory.
pub const DEFAULT_SCRIPT: &str = "phantomfetch.js";

/// Which side of the script path a flag belongs to.
///
/// Binary flags configure the PhantomJS runtime itself and must precede the
/// script path on the command line; script flags are parsed by the capture
/// script and must follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagScope {
    Binary,
    Script,
}

/// The closed flag vocabulary of the invocation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    // Binary-level (PhantomJS runtime)
    IgnoreSslErrors,
    LocalToRemoteUrlAccess,
    WebSecurity,
    CookiesFile,
    Proxy,
    Debug,
    // Script-level (capture script)
    MagicString,
    Url,
    UserAgent,
    CaptureScreen,
    InspectIframes,
    TimeoutSec,
    DelaySec,
    NoContent,
    RequestResponse,
    PostFull,
    CustomHeadersJson,
}

impl Flag {
    /// Flag name without the leading dashes.
    pub const fn name(self) -> &'static str {
        match self {
            Flag::IgnoreSslErrors => "ignore-ssl-errors",
            Flag::LocalToRemoteUrlAccess => "local-to-remote-url-access",
            Flag::WebSecurity => "web-security",
            Flag::CookiesFile => "cookies-file",
            Flag::Proxy => "proxy",
            Flag::Debug => "debug",
            Flag::MagicString => "magic-string",
            Flag::Url => "url",
            Flag::UserAgent => "user-agent",
            Flag::CaptureScreen => "capture-screen",
            Flag::InspectIframes => "inspect-iframes",
            Flag::TimeoutSec => "timeout-sec",
            Flag::DelaySec => "delay-sec",
            Flag::NoContent => "no-content",
            Flag::RequestResponse => "request-response",
            Flag::PostFull => "post-full",
            Flag::CustomHeadersJson => "custom-headers-json",
        }
    }

    pub const fn scope(self) -> FlagScope {
        match self {
            Flag::IgnoreSslErrors
            | Flag::LocalToRemoteUrlAccess
            | Flag::WebSecurity
            | Flag::CookiesFile
            | Flag::Proxy
            | Flag::Debug => FlagScope::Binary,
            _ => FlagScope::Script,
        }
    }

    pub const fn expects_value(self) -> bool {
        !matches!(
            self,
            Flag::InspectIframes | Flag::NoContent | Flag::RequestResponse
        )
    }

    /// Render as a binary-level token (`--name=value` form).
    pub fn binary_token(self, value: &str) -> String {
        debug_assert!(matches!(self.scope(), FlagScope::Binary));
        format!("--{}={}", self.name(), value)
    }

    /// Render as a script-level flag token (`--name`); the value, if any,
    /// travels as a separate token.
    pub fn script_token(self) -> String {
        debug_assert!(matches!(self.scope(), FlagScope::Script));
        format!("--{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_flags_precede_script() {
        assert_eq!(Flag::CookiesFile.scope(), FlagScope::Binary);
        assert_eq!(Flag::Proxy.scope(), FlagScope::Binary);
        assert_eq!(Flag::Url.scope(), FlagScope::Script);
        assert_eq!(Flag::MagicString.scope(), FlagScope::Script);
    }

    #[test]
    fn test_valueless_flags() {
        assert!(!Flag::InspectIframes.expects_value());
        assert!(!Flag::NoContent.expects_value());
        assert!(!Flag::RequestResponse.expects_value());
        assert!(Flag::Url.expects_value());
        assert!(Flag::PostFull.expects_value());
    }

    #[test]
    fn test_token_rendering() {
        assert_eq!(
            Flag::IgnoreSslErrors.binary_token("true"),
            "--ignore-ssl-errors=true"
        );
        assert_eq!(Flag::Url.script_token(), "--url");
    }
}
