//! OAuth2 grant flows for the Zoho CRM accounts server.
//!
//! Everything the `zcrm-token-fetcher` binary needs to turn command-line
//! options into a persisted token payload:
//!
//! - [`options`] merges flags with an options file, validates and defaults
//! - [`callback`] runs the one-shot localhost listener that captures a
//!   grant token from the browser redirect
//! - [`exchange`] sends the single POST to the token endpoint, for either
//!   grant type
//! - [`output`] pretty-prints the token payload and writes it to disk

pub mod callback;
pub mod error;
pub mod exchange;
pub mod options;
pub mod output;

pub use callback::{
    CallbackListener, CallbackQuery, CapturePhase, authorize_url, capture_grant_token,
};
pub use error::{Error, Result};
pub use exchange::{TokenRequest, exchange, token_url};
pub use options::{RawOptions, ResolvedOptions, resolve};
pub use output::{format_token_payload, write_result};
