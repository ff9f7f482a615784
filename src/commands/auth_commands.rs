use crate::error::AppResult;
use crate::session::SessionPhase;
use crate::AppState;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    pub phase: SessionPhase,
    /// RFC 3339 expiry of the stored access token.
    pub expires_at: Option<String>,
    pub can_refresh: bool,
}

pub async fn check_auth_status(state: &AppState) -> AppResult<AuthStatus> {
    let credential = state.session.stored_credential()?;
    let now_ms = state.session.now_ms();

    Ok(AuthStatus {
        authenticated: credential
            .as_ref()
            .is_some_and(|c| c.expires_at_ms > now_ms),
        phase: state.session.phase().await,
        expires_at: credential.as_ref().and_then(|c| {
            chrono::DateTime::from_timestamp_millis(c.expires_at_ms).map(|t| t.to_rfc3339())
        }),
        can_refresh: credential.is_some_and(|c| c.refresh_token.is_some()),
    })
}

/// PKCE flow step 1: remember a verifier and return the URL to open.
pub fn login(state: &AppState) -> AppResult<String> {
    let url = state.session.begin_login()?;
    log::info!("Authorization URL ready, redirect_uri={}", state.config.redirect_uri);
    Ok(url)
}

/// PKCE flow step 2: the redirect came back, exchange it and start polling.
pub async fn handle_auth_callback(state: &AppState, redirect_url: &str) -> AppResult<AuthStatus> {
    let phase = state.session.handle_callback(redirect_url).await?;
    log::info!("Callback handled, session is {:?}", phase);
    check_auth_status(state).await
}

/// Resume from the stored credential, refreshing it first when needed.
pub async fn restore_session(state: &AppState) -> AppResult<AuthStatus> {
    state.session.start().await;
    check_auth_status(state).await
}

pub async fn logout(state: &AppState) -> AppResult<()> {
    state.session.sign_out().await;
    Ok(())
}
