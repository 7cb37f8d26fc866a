//! Access credentials
//!
//! A credential is a self-contained HS256 JWT: nothing is stored server
//! side. Claims carry the email, an optional product binding and the
//! issue/expiry times. Verification takes an explicit `now` so expiry is
//! decided here rather than by the library clock.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::MIN_SECRET_LEN;
use crate::types::GatewayError;

/// Payload stored in a credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Email the credential was issued to
    pub sub: String,
    /// Product the credential is bound to
    #[serde(rename = "productId", default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of credential verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialCheck {
    pub valid: bool,
    pub claims: Option<CredentialClaims>,
    pub error: Option<String>,
}

impl CredentialCheck {
    pub fn valid(claims: CredentialClaims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// Issues and verifies credentials
#[derive(Clone)]
pub struct CredentialIssuer {
    secret: String,
    expiry_seconds: u64,
    bind_product: bool,
}

impl CredentialIssuer {
    /// Create an issuer
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(
        secret: String,
        expiry_seconds: u64,
        bind_product: bool,
    ) -> Result<Self, GatewayError> {
        if secret.is_empty() {
            return Err(GatewayError::Config(
                "TOKEN_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(GatewayError::Config(format!(
                "TOKEN_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            secret,
            expiry_seconds,
            bind_product,
        })
    }

    /// Issuer for dev mode with a fixed, public secret
    pub fn new_dev(expiry_seconds: u64, bind_product: bool) -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            expiry_seconds,
            bind_product,
        }
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    /// Issue a credential now
    pub fn mint(&self, email: &str, product_id: Option<&str>) -> Result<String, GatewayError> {
        self.mint_at(email, product_id, now_secs()?)
    }

    /// Issue a credential as of `now`
    pub fn mint_at(
        &self,
        email: &str,
        product_id: Option<&str>,
        now: u64,
    ) -> Result<String, GatewayError> {
        let claims = CredentialClaims {
            sub: email.to_string(),
            product_id: product_id
                .filter(|_| self.bind_product)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| GatewayError::Auth(format!("Failed to issue credential: {}", e)))
    }

    /// Verify a credential now
    pub fn verify(&self, token: &str, product_id: Option<&str>) -> CredentialCheck {
        match now_secs() {
            Ok(now) => self.verify_at(token, product_id, now),
            Err(e) => CredentialCheck::invalid(e.to_string()),
        }
    }

    /// Verify a credential as of `now`
    ///
    /// A product mismatch only fails when the credential carries a product
    /// and the caller names one.
    pub fn verify_at(&self, token: &str, product_id: Option<&str>, now: u64) -> CredentialCheck {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = match decode::<CredentialClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(data) => data.claims,
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::InvalidToken => "Invalid credential",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Credential validation failed",
                };
                return CredentialCheck::invalid(error_msg);
            }
        };

        if now >= claims.exp {
            return CredentialCheck::invalid("Credential expired");
        }

        if let (Some(bound), Some(requested)) = (claims.product_id.as_deref(), product_id) {
            if !requested.is_empty() && bound != requested {
                return CredentialCheck::invalid("Credential issued for another product");
            }
        }

        CredentialCheck::valid(claims)
    }
}

fn now_secs() -> Result<u64, GatewayError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| GatewayError::Auth(format!("System time error: {}", e)))
}
