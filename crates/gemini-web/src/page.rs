//! Token extraction from the `/app` bootstrap page.

use std::sync::LazyLock;

use regex::Regex;

use crate::GeminiError;

static ACCESS_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""SNlM0e":"([^"]*)""#).expect("valid regex"));
static BUILD_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""cfb2h":"([^"]*)""#).expect("valid regex"));
static SESSION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""FdrFJe":"([^"]*)""#).expect("valid regex"));

/// Values scraped from the app page that every generate call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTokens {
    /// The `at` form field (`SNlM0e`).
    pub access_token: String,
    /// Server build label (`cfb2h`), sent as the `bl` query parameter.
    pub build_label: Option<String>,
    /// Frontend session id (`FdrFJe`), sent as `f.sid`.
    pub session_id: Option<String>,
}

fn capture(re: &Regex, html: &str) -> Option<String> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|v| !v.is_empty())
}

/// Extract [`PageTokens`] from the app page HTML.
///
/// A page without an access token is what the server returns for signed-out
/// cookies, so that case maps to [`GeminiError::AccessTokenMissing`].
pub fn extract_page_tokens(html: &str) -> Result<PageTokens, GeminiError> {
    let access_token = capture(&ACCESS_TOKEN_RE, html).ok_or(GeminiError::AccessTokenMissing)?;

    Ok(PageTokens {
        access_token,
        build_label: capture(&BUILD_LABEL_RE, html),
        session_id: capture(&SESSION_ID_RE, html),
    })
}
