use crate::api::auth::{self, PkceChallenge};
use crate::api::models::TokenResponse;
use crate::api::TokenEndpoint;
use crate::clock::Clock;
use crate::error::{AppResult, AuthError};
use crate::store::{Credential, CredentialStore};
use std::sync::Arc;

pub const DEFAULT_EXPIRY_MARGIN_MS: i64 = 300_000;

pub fn is_expiring_soon(credential: &Credential, now_ms: i64, margin_ms: i64) -> bool {
    now_ms >= credential.expires_at_ms.saturating_sub(margin_ms)
}

/// Abbreviate a secret for log lines.
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    format!("{}...", prefix)
}

/// Owns the credential lifecycle: authorization URL, code exchange, refresh
/// and invalidation. Everything it learns is written through to the store.
pub struct TokenManager {
    client_id: String,
    redirect_uri: String,
    scope: String,
    endpoint: Arc<dyn TokenEndpoint>,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        transport_controls: bool,
        endpoint: Arc<dyn TokenEndpoint>,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: auth::scopes(transport_controls),
            endpoint,
            store,
            clock,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn current(&self) -> AppResult<Option<Credential>> {
        self.store.load_credential()
    }

    /// Start a login: remember a fresh verifier and hand back the URL the
    /// user agent has to navigate to.
    pub fn begin_authorization(&self) -> AppResult<String> {
        let pkce = PkceChallenge::generate();
        self.store.save_verifier(&pkce.verifier)?;
        let url = auth::build_auth_url(
            &self.client_id,
            &self.redirect_uri,
            &self.scope,
            &pkce.challenge,
        );
        log::info!("Auth URL: {}", url);
        Ok(url)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<Credential, AuthError> {
        let verifier = match self.store.load_verifier() {
            Ok(Some(verifier)) => verifier,
            Ok(None) => {
                log::error!("Code verifier missing, login flow was interrupted");
                self.purge();
                return Err(AuthError::MissingVerifier);
            }
            Err(e) => {
                log::error!("Failed to read code verifier: {}", e);
                self.purge();
                return Err(AuthError::MissingVerifier);
            }
        };

        log::info!("Exchanging code {} for token", redact(code));
        let reason = match self.endpoint.exchange_code(code, &verifier).await {
            Ok(response) => match self.credential_from(response, None) {
                Some(credential) => match self.store.save_credential(&credential) {
                    Ok(()) => {
                        if let Err(e) = self.store.clear_verifier() {
                            log::warn!("Failed to delete code verifier: {}", e);
                        }
                        log::info!("Access token obtained successfully");
                        return Ok(credential);
                    }
                    Err(e) => format!("could not store credential: {}", e),
                },
                None => "response carried no access token".to_string(),
            },
            Err(e) => e.to_string(),
        };

        log::error!("Token exchange failed: {}", reason);
        self.purge();
        Err(AuthError::ExchangeFailed { reason })
    }

    pub async fn refresh(&self) -> Result<Credential, AuthError> {
        let stored = match self.store.load_credential() {
            Ok(stored) => stored,
            Err(e) => {
                log::warn!("Failed to read stored credential: {}", e);
                None
            }
        };
        let Some((stored, refresh_token)) =
            stored.and_then(|c| c.refresh_token.clone().map(|rt| (c, rt)))
        else {
            return Err(AuthError::NoRefreshToken);
        };

        log::info!("Refreshing access token {}", redact(&stored.access_token));
        match self.endpoint.refresh(&refresh_token).await {
            Ok(response) => {
                if let Some(credential) = self.credential_from(response, Some(refresh_token)) {
                    match self.store.save_credential(&credential) {
                        Ok(()) => {
                            log::info!("Access token refreshed successfully");
                            return Ok(credential);
                        }
                        Err(e) => log::error!("Failed to save refreshed token: {}", e),
                    }
                } else {
                    log::error!("Refresh response carried no access token");
                }
            }
            Err(e) => log::warn!("Token refresh failed: {}", e),
        }

        if let Err(e) = self.store.clear_credential() {
            log::error!("Failed to clear credential: {}", e);
        }
        Err(AuthError::RefreshFailed)
    }

    /// Store a token delivered directly in the redirect fragment. There is no
    /// refresh token for these, so the session ends when it expires.
    pub fn accept_implicit_grant(
        &self,
        access_token: String,
        expires_in: Option<u64>,
    ) -> AppResult<Credential> {
        let response = TokenResponse {
            access_token: Some(access_token),
            expires_in,
            ..TokenResponse::default()
        };
        let credential = self
            .credential_from(response, None)
            .ok_or(AuthError::ExchangeFailed {
                reason: "empty access token".into(),
            })?;
        self.store.save_credential(&credential)?;
        Ok(credential)
    }

    pub fn sign_out(&self) {
        log::info!("Signing out, clearing stored session");
        self.purge();
    }

    fn purge(&self) {
        if let Err(e) = self.store.purge() {
            log::error!("Failed to purge session data: {}", e);
        }
    }

    /// `previous_refresh` is kept when the provider does not rotate it.
    fn credential_from(
        &self,
        response: TokenResponse,
        previous_refresh: Option<String>,
    ) -> Option<Credential> {
        let expires_in = response.expires_in_or_default();
        let access_token = response.access_token.filter(|t| !t.is_empty())?;
        Some(Credential {
            access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at_ms: self.clock.now_ms().saturating_add(
                i64::try_from(expires_in)
                    .unwrap_or(i64::MAX)
                    .saturating_mul(1000),
            ),
        })
    }
}
