use crate::settings::Settings;
use axum::http::HeaderMap;

pub const SESSION_COOKIE_NAME: &str = "postern_session";

/// The session token as it travels in the cookie.
#[derive(Clone, Debug)]
pub struct SessionCookie {
    pub token: String,
}

impl SessionCookie {
    pub fn new(token: String) -> Self {
        Self { token }
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let cookie_header = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;

        // Parse cookie header for our session cookie
        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some(value) = cookie
                .strip_prefix(SESSION_COOKIE_NAME)
                .and_then(|s| s.strip_prefix('='))
            {
                return Some(Self {
                    token: value.to_string(),
                });
            }
        }
        None
    }

    /// Set-Cookie value: http-only, path "/", Max-Age equal to the
    /// token lifetime. Secure only when the public URL is https, so
    /// plain-http development setups keep working.
    pub fn to_cookie_header(&self, settings: &Settings) -> String {
        let secure = settings.public_url().starts_with("https://");
        let max_age = settings.auth.token_ttl_secs;

        format!(
            "{}={}; HttpOnly; {}SameSite=Lax; Path=/; Max-Age={}",
            SESSION_COOKIE_NAME,
            self.token,
            if secure { "Secure; " } else { "" },
            max_age
        )
    }

    pub fn delete_cookie_header() -> String {
        format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
            SESSION_COOKIE_NAME
        )
    }
}
