use std::sync::OnceLock;
use std::time::Duration;

use rand::RngExt;
use reqwest::Client;
use reqwest::header::{COOKIE, ORIGIN, REFERER, USER_AGENT};
use tracing::debug;

use crate::cookies::{GeminiCookies, parse_rotation_token};
use crate::generate::{ChatMetadata, ModelOutput, decode_response, encode_request};
use crate::page::{PageTokens, extract_page_tokens};
use crate::GeminiError;

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const BASE_URL: &str = "https://gemini.google.com";
const APP_PATH: &str = "/app";
const GENERATE_PATH: &str =
    "/_/BardChatUi/data/assistant.lamda.BardFrontendService/StreamGenerate";

/// Install the aws-lc-rs rustls provider once per process.
///
/// reqwest is built without a default provider, so this must run before any
/// [`Client`] is built. [`build_http_client`] does it.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the HTTP client used against the web app.
pub fn build_http_client(timeout: Duration) -> Result<Client, GeminiError> {
    install_rustls_provider();

    let mut builder = Client::builder().user_agent(DEFAULT_UA);
    if timeout > Duration::ZERO {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Result of loading the app page.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub tokens: PageTokens,
    /// Reissued `__Secure-1PSIDCC`, if any.
    pub rotated_psidcc: Option<String>,
}

/// Result of one generate call.
#[derive(Debug, Clone)]
pub struct GenerateReply {
    pub output: ModelOutput,
    /// Reissued `__Secure-1PSIDCC`, if any.
    pub rotated_psidcc: Option<String>,
}

/// Thin client over the web app's internal endpoints.
///
/// Holds no session state; callers keep the cookies and [`PageTokens`].
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
}

impl GeminiClient {
    /// Wrap an existing HTTP client.
    ///
    /// `http` must have been built after [`install_rustls_provider`]; prefer
    /// [`build_http_client`].
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, BASE_URL)
    }

    /// Point the client at a different host (used by tests and proxies).
    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Load the app page with the given cookies and extract the page tokens.
    pub async fn handshake(&self, cookies: &GeminiCookies) -> Result<Handshake, GeminiError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, APP_PATH))
            .header(COOKIE, cookies.header_value()?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeminiError::Status {
                status: status.as_u16(),
                endpoint: "app",
            });
        }

        let rotated_psidcc = parse_rotation_token(response.headers());
        let html = response.text().await?;
        let tokens = extract_page_tokens(&html)?;
        debug!(
            has_build_label = tokens.build_label.is_some(),
            rotated = rotated_psidcc.is_some(),
            "Loaded app page tokens"
        );

        Ok(Handshake {
            tokens,
            rotated_psidcc,
        })
    }

    /// Send one prompt, continuing the conversation described by `metadata`.
    pub async fn generate(
        &self,
        cookies: &GeminiCookies,
        tokens: &PageTokens,
        prompt: &str,
        metadata: &ChatMetadata,
    ) -> Result<GenerateReply, GeminiError> {
        let f_req = encode_request(prompt, metadata)?;
        let req_id = rand::rng().random_range(100_000..1_000_000u32).to_string();

        let mut query: Vec<(&str, &str)> = vec![("_reqid", req_id.as_str()), ("rt", "c")];
        if let Some(bl) = tokens.build_label.as_deref() {
            query.push(("bl", bl));
        }
        if let Some(sid) = tokens.session_id.as_deref() {
            query.push(("f.sid", sid));
        }

        let response = self
            .http
            .post(format!("{}{}", self.base_url, GENERATE_PATH))
            .query(&query)
            .header(COOKIE, cookies.header_value()?)
            .header(ORIGIN, BASE_URL)
            .header(REFERER, format!("{BASE_URL}/"))
            .header("X-Same-Domain", "1")
            .header(USER_AGENT, DEFAULT_UA)
            .form(&[("at", tokens.access_token.as_str()), ("f.req", f_req.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeminiError::Status {
                status: status.as_u16(),
                endpoint: "generate",
            });
        }

        let rotated_psidcc = parse_rotation_token(response.headers());
        let body = response.text().await?;
        let output = decode_response(&body)?;

        Ok(GenerateReply {
            output,
            rotated_psidcc,
        })
    }
}
