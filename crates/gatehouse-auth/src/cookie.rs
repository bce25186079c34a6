//! Session cookie helpers
//!
//! The token travels in an HttpOnly, SameSite=Lax cookie scoped to the
//! whole site; `Secure` is added when the deployment serves HTTPS.
//! Client code never reads the raw token.

use http::header::{HeaderMap, HeaderValue, InvalidHeaderValue, COOKIE};

/// Stable session cookie name
pub const SESSION_COOKIE_NAME: &str = "gatehouse_session";

/// Cookie attributes derived from configuration
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    /// Only mark cookies Secure when the site is served over HTTPS
    pub secure: bool,
    /// Matches the token's absolute expiration
    pub max_age_secs: i64,
}

/// Build the `Set-Cookie` value carrying a session token
pub fn session_cookie(
    token: &str,
    settings: CookieSettings,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = settings.max_age_secs;
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the `Set-Cookie` value that discards the session
pub fn clear_session_cookie(settings: CookieSettings) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if settings.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Pull the session token out of the request's `Cookie` header
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        if let Some(value) = pair.trim().strip_prefix(SESSION_COOKIE_NAME) {
            if let Some(value) = value.strip_prefix('=') {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: CookieSettings = CookieSettings {
        secure: false,
        max_age_secs: 86400,
    };

    #[test]
    fn test_session_cookie_attributes() {
        let value = session_cookie("abc.def.ghi", SETTINGS).unwrap();
        let value = value.to_str().unwrap();

        assert!(value.starts_with("gatehouse_session=abc.def.ghi"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("Max-Age=86400"));
        assert!(!value.contains("Secure"));
    }

    #[test]
    fn test_secure_flag_in_production() {
        let settings = CookieSettings {
            secure: true,
            max_age_secs: 86400,
        };
        let value = session_cookie("abc", settings).unwrap();
        assert!(value.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_clear_cookie_zeroes_max_age() {
        let value = clear_session_cookie(SETTINGS).unwrap();
        assert!(value.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn test_extract_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; gatehouse_session=tok123; other=1"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn test_extract_missing_or_empty() {
        let headers = HeaderMap::new();
        assert!(extract_session_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("gatehouse_session="));
        assert!(extract_session_token(&headers).is_none());
    }
}
