//! Cross-site request forgery tokens.
//!
//! A token is minted once per session and must be echoed back on every
//! state-changing request. Storage of the token lives with the session layer;
//! this module only mints and compares.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use password_hash::rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;
use thiserror::Error;

const TOKEN_BYTES: usize = 32;

/// Form field carrying the token in urlencoded submissions.
pub const CSRF_FORM_FIELD: &str = "csrf_token";
/// Header carrying the token for script-initiated requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("The CSRF token is missing.")]
    Missing,
    #[error("The CSRF token is invalid.")]
    Invalid,
}

#[derive(Debug, Clone, Copy)]
pub struct CsrfGuard {
    enabled: bool,
}

impl CsrfGuard {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn generate_token(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Compare the session token with the one supplied by the client.
    ///
    /// A disabled guard accepts everything.
    pub fn verify(&self, expected: Option<&str>, provided: Option<&str>) -> Result<(), CsrfError> {
        if !self.enabled {
            return Ok(());
        }

        let provided = match provided.map(str::trim) {
            Some(value) if !value.is_empty() => value,
            _ => return Err(CsrfError::Missing),
        };
        let Some(expected) = expected else {
            return Err(CsrfError::Invalid);
        };

        if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            Ok(())
        } else {
            Err(CsrfError::Invalid)
        }
    }
}
