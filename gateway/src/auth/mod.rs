//! Credential issuance and verification
//!
//! - [`CredentialIssuer`]: HS256 credentials bound to an email and product
//! - [`normalize_email`]: the email acceptance rule
//! - [`email_fingerprint`]: stable, non-reversible id for usage records

pub mod credential;

pub use credential::{CredentialCheck, CredentialClaims, CredentialIssuer};

use sha2::{Digest, Sha256};

/// Trim and accept an email address, or reject it
///
/// Accepted: exactly one `@`, a non-empty local part and a domain with a
/// dot that neither starts nor ends the domain.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return None;
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return None;
    }
    Some(email.to_string())
}

/// SHA-256 of the lowercased email, hex encoded
pub fn email_fingerprint(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    hex::encode(digest)
}
