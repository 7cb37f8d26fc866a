//! Access gate
//!
//! Resolves whether the visitor may proceed. A credential in the page URL
//! is checked by the verification service; with no credential the gate
//! resolves to `Denied` without a remote call. While denied, an email can be
//! exchanged for a new credential, which is written back into the page URL
//! followed by a full reload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{PlayerError, Result};
use crate::session::{AccessState, Session};

/// Body of `POST /credential`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

/// Response of `POST /credential`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Response of `GET /credential/verify`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub ok: bool,
}

/// Credential issuance and verification service
#[async_trait(?Send)]
pub trait AccessService {
    /// `Ok(true)` only for an affirmative answer
    async fn verify(&self, credential: &str, product_id: &str) -> Result<bool>;

    /// `Ok(None)` when the service declines to issue
    async fn issue(&self, email: &str, product_id: &str) -> Result<Option<String>>;
}

/// Full page navigation
pub trait PageNavigator {
    /// Replace the current page with `url`, reinitializing every component
    fn reload(&self, url: &Url);
}

/// Access gate over a verification/issuance service
pub struct AccessGate<'a> {
    service: &'a dyn AccessService,
}

impl<'a> AccessGate<'a> {
    pub fn new(service: &'a dyn AccessService) -> Self {
        Self { service }
    }

    /// Resolve the session to `Granted` or `Denied`
    ///
    /// Remote errors and non-affirmative answers both resolve to `Denied`.
    pub async fn resolve(&self, session: &mut Session) -> AccessState {
        let credential = match session.credential() {
            Some(c) => c.to_string(),
            None => {
                debug!("No credential in page state, gating");
                session.set_access_state(AccessState::Denied);
                return AccessState::Denied;
            }
        };

        session.set_access_state(AccessState::Verifying);

        let state = match self.service.verify(&credential, session.product_id()).await {
            Ok(true) => AccessState::Granted,
            Ok(false) => {
                info!(product_id = %session.product_id(), "Credential rejected");
                AccessState::Denied
            }
            Err(e) => {
                warn!(error = %e, "Credential verification failed, gating");
                AccessState::Denied
            }
        };

        session.set_access_state(state);
        state
    }

    /// Exchange an email for a credential and reload with it
    ///
    /// Returns the URL the page was sent to. The session itself is left
    /// untouched; the reloaded page builds a new one.
    pub async fn request_credential(
        &self,
        session: &Session,
        email: &str,
        navigator: &dyn PageNavigator,
    ) -> Result<Url> {
        let email = email.trim();
        if email.is_empty() {
            return Err(PlayerError::EmptyEmail);
        }

        let credential = self
            .service
            .issue(email, session.product_id())
            .await?
            .filter(|c| !c.is_empty())
            .ok_or(PlayerError::CredentialRefused)?;

        let url = session.url_with_credential(&credential);
        info!(product_id = %session.product_id(), "Credential issued, reloading page");
        navigator.reload(&url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAccessService, RecordingNavigator};
    use crate::session::DEFAULT_PRODUCT_ID;

    fn session(query: &str) -> Session {
        let url = Url::parse(&format!("https://ar.example.com/ar{query}")).unwrap();
        Session::from_page_url(url, DEFAULT_PRODUCT_ID)
    }

    #[tokio::test]
    async fn test_no_credential_denies_without_remote_call() {
        let service = MockAccessService::accepting();
        let gate = AccessGate::new(&service);
        let mut s = session("?productId=HOODIE123");

        assert_eq!(gate.resolve(&mut s).await, AccessState::Denied);
        assert_eq!(service.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_valid_credential_grants() {
        let service = MockAccessService::accepting();
        let gate = AccessGate::new(&service);
        let mut s = session("?productId=HOODIE123&credential=good");

        assert_eq!(gate.resolve(&mut s).await, AccessState::Granted);
        assert!(s.is_granted());
        assert_eq!(service.verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_or_failing_verification_denies() {
        let rejecting = MockAccessService::rejecting();
        let mut s = session("?credential=bad");
        assert_eq!(AccessGate::new(&rejecting).resolve(&mut s).await, AccessState::Denied);

        let failing = MockAccessService::unreachable();
        let mut s = session("?credential=whatever");
        assert_eq!(AccessGate::new(&failing).resolve(&mut s).await, AccessState::Denied);
    }

    #[tokio::test]
    async fn test_request_credential_rewrites_url_and_reloads() {
        let service = MockAccessService::accepting().with_issued("minted.jwt");
        let navigator = RecordingNavigator::default();
        let gate = AccessGate::new(&service);
        let s = session("?productId=HOODIE123");

        let url = gate
            .request_credential(&s, "  a@b.com ", &navigator)
            .await
            .unwrap();

        assert_eq!(service.issued_emails(), vec!["a@b.com".to_string()]);
        assert_eq!(navigator.visits(), vec![url.clone()]);
        let reloaded = Session::from_page_url(url, DEFAULT_PRODUCT_ID);
        assert_eq!(reloaded.credential(), Some("minted.jwt"));
        assert_eq!(reloaded.product_id(), "HOODIE123");
    }

    #[tokio::test]
    async fn test_empty_email_is_rejected_locally() {
        let service = MockAccessService::accepting().with_issued("minted.jwt");
        let navigator = RecordingNavigator::default();
        let gate = AccessGate::new(&service);

        let err = gate
            .request_credential(&session(""), "   ", &navigator)
            .await
            .unwrap_err();
        assert_eq!(err, PlayerError::EmptyEmail);
        assert!(service.issued_emails().is_empty());
        assert!(navigator.visits().is_empty());
    }

    #[tokio::test]
    async fn test_refused_issue_does_not_navigate() {
        let service = MockAccessService::accepting();
        let navigator = RecordingNavigator::default();
        let gate = AccessGate::new(&service);

        let err = gate
            .request_credential(&session(""), "a@b.com", &navigator)
            .await
            .unwrap_err();
        assert_eq!(err, PlayerError::CredentialRefused);
        assert!(navigator.visits().is_empty());
    }
}
