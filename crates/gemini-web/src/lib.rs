//! Client for the Gemini web app's internal, cookie-authenticated endpoints.
//!
//! The web app has no public API. This crate covers the three exchanges a
//! bridge needs:
//!
//! 1. Load `/app` with the session cookies and scrape the page tokens
//!    ([`GeminiClient::handshake`]).
//! 2. Send a prompt to `StreamGenerate` and decode the reply
//!    ([`GeminiClient::generate`]).
//! 3. Pick up the reissued `__Secure-1PSIDCC` cookie from either response
//!    ([`cookies::parse_rotation_token`]).
//!
//! Session health, retries and scheduling are left to the caller.

pub mod client;
pub mod cookies;
pub mod error;
pub mod generate;
pub mod page;

pub use client::{
    DEFAULT_UA, GeminiClient, GenerateReply, Handshake, build_http_client,
    install_rustls_provider,
};
pub use cookies::GeminiCookies;
pub use error::GeminiError;
pub use generate::{ChatMetadata, ModelOutput};
pub use page::PageTokens;
