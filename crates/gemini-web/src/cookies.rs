//! Cookie helpers for the Gemini web session.
//!
//! The web app authenticates with three `__Secure-1PSID*` cookies. The
//! `__Secure-1PSIDCC` value is reissued by the server on most responses and has
//! to be carried forward by the caller.

use std::collections::HashMap;

use crate::GeminiError;

pub const PSID: &str = "__Secure-1PSID";
pub const PSIDTS: &str = "__Secure-1PSIDTS";
pub const PSIDCC: &str = "__Secure-1PSIDCC";

/// The cookie values needed to talk to the web app.
#[derive(Clone, PartialEq, Eq)]
pub struct GeminiCookies {
    pub psid: String,
    pub psidts: String,
    pub psidcc: String,
}

impl GeminiCookies {
    pub fn new(
        psid: impl Into<String>,
        psidts: impl Into<String>,
        psidcc: impl Into<String>,
    ) -> Self {
        Self {
            psid: psid.into(),
            psidts: psidts.into(),
            psidcc: psidcc.into(),
        }
    }

    /// Build the `Cookie` request header value.
    ///
    /// `__Secure-1PSID` is mandatory; the other two are sent only when set.
    pub fn header_value(&self) -> Result<String, GeminiError> {
        if self.psid.trim().is_empty() {
            return Err(GeminiError::MissingCookie(PSID));
        }

        let mut parts = vec![format!("{}={}", PSID, self.psid.trim())];
        if !self.psidts.trim().is_empty() {
            parts.push(format!("{}={}", PSIDTS, self.psidts.trim()));
        }
        if !self.psidcc.trim().is_empty() {
            parts.push(format!("{}={}", PSIDCC, self.psidcc.trim()));
        }
        Ok(parts.join("; "))
    }
}

impl std::fmt::Debug for GeminiCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiCookies")
            .field("psid", &mask(&self.psid))
            .field("psidts", &mask(&self.psidts))
            .field("psidcc", &mask(&self.psidcc))
            .finish()
    }
}

/// Parse `name=value` pairs out of `Set-Cookie` response headers.
pub fn parse_set_cookies(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Extract a reissued `__Secure-1PSIDCC` value, if the server sent one.
pub fn parse_rotation_token(headers: &reqwest::header::HeaderMap) -> Option<String> {
    parse_set_cookies(headers)
        .remove(PSIDCC)
        .filter(|value| !value.is_empty())
}

/// Mask a secret for logs and status output: first 4 and last 4 characters.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
