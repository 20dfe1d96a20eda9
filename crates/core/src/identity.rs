//! Peer identity validation
//!
//! Identities key the registry document and name profile artifacts on disk,
//! so the accepted alphabet is restricted to filename-safe characters.

use crate::error::{Error, Result};

const MAX_LEN: usize = 63;

/// Validate a caller-chosen peer identity
///
/// Returns the identity unchanged on success.
pub fn validate_identity(identity: &str) -> Result<String> {
    if identity.is_empty() {
        return Err(Error::Validation("identity must not be empty".to_string()));
    }
    if identity.len() > MAX_LEN {
        return Err(Error::Validation(format!(
            "identity must be at most {} characters (got {})",
            MAX_LEN,
            identity.len()
        )));
    }
    for (i, c) in identity.chars().enumerate() {
        if !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.') {
            return Err(Error::Validation(format!(
                "invalid character '{}' at position {}; allowed: letters, digits, '-', '_', '.'",
                c, i
            )));
        }
    }
    if identity.starts_with('-') || identity.starts_with('.') {
        return Err(Error::Validation(
            "identity must not start with '-' or '.'".to_string(),
        ));
    }
    Ok(identity.to_string())
}
