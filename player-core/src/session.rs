//! Session state derived from the page's addressable state
//!
//! The page URL query is the only place a credential lives on the client.
//! A successful credential exchange produces a rewritten URL and a full
//! reload, so a `Session` is built once per page load and never patched in
//! place by anything other than the access gate.

use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameter carrying the credential
pub const CREDENTIAL_PARAM: &str = "credential";

/// Query parameter carrying the product identifier
pub const PRODUCT_PARAM: &str = "productId";

/// Older parameter names still printed on early tags
const CREDENTIAL_ALIASES: &[&str] = &[CREDENTIAL_PARAM, "tok"];
const PRODUCT_ALIASES: &[&str] = &[PRODUCT_PARAM, "sku"];

/// Product used when the tag carries no product identifier
pub const DEFAULT_PRODUCT_ID: &str = "HOODIE123";

/// Access state of the visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    Unverified,
    Verifying,
    Granted,
    Denied,
}

impl AccessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AccessState::Granted | AccessState::Denied)
    }
}

/// Per-page-load session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    access_state: AccessState,
    credential: Option<String>,
    product_id: String,
    page_url: Url,
}

impl Session {
    /// Build a session from the current page URL
    ///
    /// Empty parameters count as absent. A missing product falls back to
    /// `default_product`.
    pub fn from_page_url(page_url: Url, default_product: &str) -> Self {
        let credential = first_param(&page_url, CREDENTIAL_ALIASES);
        let product_id =
            first_param(&page_url, PRODUCT_ALIASES).unwrap_or_else(|| default_product.to_string());

        Self {
            access_state: AccessState::Unverified,
            credential,
            product_id,
            page_url,
        }
    }

    pub fn access_state(&self) -> AccessState {
        self.access_state
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    pub fn is_granted(&self) -> bool {
        self.access_state == AccessState::Granted
    }

    /// Only the access gate moves the session between states
    pub(crate) fn set_access_state(&mut self, state: AccessState) {
        self.access_state = state;
    }

    /// The page URL rewritten to carry `credential`
    ///
    /// Every other query parameter is kept in its original order. Aliased
    /// credential parameters are dropped so the reloaded page sees exactly
    /// one credential.
    pub fn url_with_credential(&self, credential: &str) -> Url {
        let mut url = self.page_url.clone();
        let kept: Vec<(String, String)> = self
            .page_url
            .query_pairs()
            .filter(|(k, _)| !CREDENTIAL_ALIASES.iter().any(|alias| k == alias))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
            pairs.append_pair(CREDENTIAL_PARAM, credential);
        }
        url
    }
}

fn first_param(url: &Url, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        url.query_pairs()
            .find(|(k, v)| k == name && !v.trim().is_empty())
            .map(|(_, v)| v.into_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_reads_credential_and_product() {
        let session = Session::from_page_url(
            url("https://ar.example.com/ar?productId=CAP9&credential=abc"),
            DEFAULT_PRODUCT_ID,
        );
        assert_eq!(session.credential(), Some("abc"));
        assert_eq!(session.product_id(), "CAP9");
        assert_eq!(session.access_state(), AccessState::Unverified);
    }

    #[test]
    fn test_reads_legacy_aliases() {
        let session = Session::from_page_url(
            url("https://ar.example.com/ar?sku=HOODIE123&tok=xyz"),
            DEFAULT_PRODUCT_ID,
        );
        assert_eq!(session.credential(), Some("xyz"));
        assert_eq!(session.product_id(), "HOODIE123");
    }

    #[test]
    fn test_missing_values_fall_back() {
        let session =
            Session::from_page_url(url("https://ar.example.com/ar?credential="), "DEFAULT");
        assert_eq!(session.credential(), None);
        assert_eq!(session.product_id(), "DEFAULT");
    }

    #[test]
    fn test_url_with_credential_preserves_other_params() {
        let session = Session::from_page_url(
            url("https://ar.example.com/ar?sku=CAP9&tok=old&ref=qr"),
            DEFAULT_PRODUCT_ID,
        );
        let rewritten = session.url_with_credential("new.token");
        let pairs: Vec<(String, String)> = rewritten
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("sku".to_string(), "CAP9".to_string()),
                ("ref".to_string(), "qr".to_string()),
                ("credential".to_string(), "new.token".to_string()),
            ]
        );
        assert_eq!(rewritten.path(), "/ar");
    }
}
