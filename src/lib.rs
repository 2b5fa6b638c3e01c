//! # Sheetdash (account service)
//!
//! `sheetdash` is the account backend of the Sheetdash spreadsheet dashboard.
//! It handles email/password registration, email verification and login.
//!
//! ## Account lifecycle
//!
//! An account is created unverified together with a single-use verification
//! token that expires after a fixed window. The raw token only travels inside
//! the emailed link; the database keeps its SHA-256 digest.
//!
//! - **Verification:** consuming a token is one conditional update (token
//!   matches and is unexpired), so two concurrent requests can never both
//!   verify with the same token.
//! - **Login gating:** only verified accounts receive a session token. A
//!   correct password against an unverified account re-issues the
//!   verification token and sends a fresh email.
//! - **No enumeration:** unknown emails and wrong passwords produce the same
//!   response, and both paths run a full password verification.
//!
//! ## Email delivery
//!
//! Verification emails are queued and delivered by a background worker with
//! exponential backoff, so a slow mail relay never stalls a request.

pub mod account;
pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
