//! Authentication providers.
//!
//! Credential and token verification belong to an external identity
//! service; only the guest path is implemented here.

use std::sync::Arc;

use async_trait::async_trait;
use nocturne_protocol::event::{AuthMethod, AuthRequest};
use nocturne_store::{Account, AccountService};
use uuid::Uuid;

pub struct AuthOutcome {
    pub account: Account,
    pub token: String,
}

pub struct AuthFailure {
    pub reason: String,
    pub message: String,
    pub can_retry: bool,
}

impl AuthFailure {
    fn unsupported(method: &str) -> Self {
        Self {
            reason: "unsupported_method".to_owned(),
            message: format!("{method} authentication is not available"),
            can_retry: true,
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthOutcome, AuthFailure>;
}

/// Issues throwaway guest accounts. An existing guest username logs back
/// into the same account.
pub struct GuestAuthProvider {
    accounts: Arc<dyn AccountService>,
}

impl GuestAuthProvider {
    pub fn new(accounts: Arc<dyn AccountService>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AuthProvider for GuestAuthProvider {
    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthOutcome, AuthFailure> {
        match request.method {
            AuthMethod::Guest => {}
            AuthMethod::Credentials => return Err(AuthFailure::unsupported("credential")),
            AuthMethod::Token => return Err(AuthFailure::unsupported("token")),
        }

        let username = match request.username.as_deref() {
            Some(name) if !name.trim().is_empty() => name.trim().to_owned(),
            _ => format!("wanderer-{}", &Uuid::new_v4().to_string()[..8]),
        };

        let existing = self
            .accounts
            .find_by_username(&username)
            .await
            .map_err(|e| AuthFailure {
                reason: "store_error".to_owned(),
                message: e.to_string(),
                can_retry: true,
            })?;

        let account = match existing {
            Some(account) if account.is_guest => account,
            Some(_) => {
                return Err(AuthFailure {
                    reason: "name_taken".to_owned(),
                    message: format!("{username} is a registered account"),
                    can_retry: true,
                });
            }
            None => self
                .accounts
                .create_guest(&username)
                .await
                .map_err(|e| AuthFailure {
                    reason: "store_error".to_owned(),
                    message: e.to_string(),
                    can_retry: true,
                })?,
        };

        Ok(AuthOutcome {
            account,
            token: Uuid::new_v4().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use nocturne_store::Services;

    use super::*;

    fn provider() -> GuestAuthProvider {
        GuestAuthProvider::new(Services::in_memory().accounts)
    }

    #[tokio::test]
    async fn guest_login_creates_and_reuses_account() {
        let provider = provider();

        let request = AuthRequest {
            method: AuthMethod::Guest,
            username: Some("Nyx".to_owned()),
            password: None,
            token: None,
        };

        let first = provider.authenticate(&request).await.ok().unwrap();
        let second = provider.authenticate(&request).await.ok().unwrap();

        assert_eq!(first.account.id, second.account.id);
        assert!(first.account.is_guest);
    }

    #[tokio::test]
    async fn credentials_are_rejected() {
        let provider = provider();

        let request = AuthRequest {
            method: AuthMethod::Credentials,
            username: Some("Nyx".to_owned()),
            password: Some("hunter2".to_owned()),
            token: None,
        };

        let failure = provider.authenticate(&request).await.err().unwrap();
        assert_eq!(failure.reason, "unsupported_method");
        assert!(failure.can_retry);
    }
}
