//! Session lifecycle: from stored credentials or an authorization callback to
//! a polling "now playing" view, and back to signed out when auth is lost.

use crate::api::auth::{parse_callback, AuthCallback};
use crate::api::{PlayerEndpoint, TransportCommand};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult, AuthError};
use crate::events::{EventSink, UiEvent};
use crate::playback::poller::{self, PlaybackView, PollSession};
use crate::playback::state::TrackState;
use crate::playback::transition::SkipDirection;
use crate::store::Credential;
use crate::token::{is_expiring_soon, TokenManager};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    SignedOut,
    /// Authorization code received, exchange in flight.
    Authenticating,
    Active,
    /// Refresh in flight.
    Reauthenticating,
}

pub(crate) struct SessionState {
    pub phase: SessionPhase,
    pub poll: PollSession,
    pub view: PlaybackView,
}

pub(crate) struct SessionCore {
    pub config: AppConfig,
    pub tokens: TokenManager,
    pub player: Arc<dyn PlayerEndpoint>,
    pub sink: Arc<dyn EventSink>,
    pub state: Mutex<SessionState>,
}

impl SessionCore {
    pub(crate) fn set_phase(&self, state: &mut SessionState, phase: SessionPhase) {
        if state.phase == phase {
            return;
        }
        log::info!("Session {:?} -> {:?}", state.phase, phase);
        state.phase = phase;
        self.sink.emit(UiEvent::PhaseChanged { phase });
    }

    fn activate(self: &Arc<Self>, state: &mut SessionState) {
        self.set_phase(state, SessionPhase::Active);
        poller::start(self, state);
    }

    /// Stop polling, drop every stored secret and show the signed-out view.
    pub(crate) fn force_sign_out(&self, state: &mut SessionState, notice: Option<String>) {
        poller::stop(&mut state.poll);
        state.view = PlaybackView::default();
        self.tokens.sign_out();
        if let Some(message) = notice {
            self.sink.emit(UiEvent::Notice { message });
        }
        self.set_phase(state, SessionPhase::SignedOut);
    }
}

/// Handle to one user's session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    core: Arc<SessionCore>,
}

impl Session {
    pub fn new(
        config: AppConfig,
        tokens: TokenManager,
        player: Arc<dyn PlayerEndpoint>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let state = SessionState {
            phase: SessionPhase::SignedOut,
            poll: PollSession::default(),
            view: PlaybackView::default(),
        };
        Self {
            core: Arc::new(SessionCore {
                config,
                tokens,
                player,
                sink,
                state: Mutex::new(state),
            }),
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        self.core.state.lock().await.phase
    }

    pub async fn current_track(&self) -> Option<TrackState> {
        self.core.state.lock().await.view.track.clone()
    }

    pub async fn consecutive_error_count(&self) -> u32 {
        self.core.state.lock().await.poll.consecutive_error_count
    }

    pub async fn is_polling(&self) -> bool {
        self.core.state.lock().await.poll.is_active
    }

    pub fn stored_credential(&self) -> AppResult<Option<Credential>> {
        self.core.tokens.current()
    }

    pub fn now_ms(&self) -> i64 {
        self.core.tokens.now_ms()
    }

    pub fn expiry_margin_ms(&self) -> i64 {
        self.core.config.expiry_margin_ms
    }

    /// Authorization URL for a fresh login. The caller navigates to it.
    pub fn begin_login(&self) -> AppResult<String> {
        self.core.tokens.begin_authorization()
    }

    /// Resume from whatever credential is stored.
    pub async fn start(&self) -> SessionPhase {
        let core = &self.core;
        let credential = match core.tokens.current() {
            Ok(credential) => credential,
            Err(e) => {
                log::warn!("Failed to load stored credential: {}", e);
                None
            }
        };

        let mut state = core.state.lock().await;
        let Some(credential) = credential else {
            log::info!("No token found, showing login");
            core.set_phase(&mut state, SessionPhase::SignedOut);
            return state.phase;
        };

        if !is_expiring_soon(&credential, core.tokens.now_ms(), core.config.expiry_margin_ms) {
            log::info!("Stored token found");
            core.activate(&mut state);
            return state.phase;
        }

        if credential.refresh_token.is_none() {
            log::info!("Stored token expired and cannot be renewed");
            core.force_sign_out(&mut state, None);
            return state.phase;
        }

        core.set_phase(&mut state, SessionPhase::Reauthenticating);
        drop(state);

        let refreshed = core.tokens.refresh().await;

        let mut state = core.state.lock().await;
        match refreshed {
            Ok(_) => core.activate(&mut state),
            Err(e) => {
                log::warn!("Startup refresh failed: {}", e);
                core.force_sign_out(&mut state, None);
            }
        }
        state.phase
    }

    /// Handle the page the identity provider redirected back to.
    pub async fn handle_callback(&self, redirect_url: &str) -> AppResult<SessionPhase> {
        let (callback, cleaned) = parse_callback(redirect_url)?;
        let core = &self.core;

        match callback {
            AuthCallback::None => Ok(self.start().await),
            AuthCallback::Error(error) => {
                log::error!("Spotify auth error: {}", error);
                core.sink.emit(UiEvent::LocationCleaned { url: cleaned });
                let mut state = core.state.lock().await;
                poller::stop(&mut state.poll);
                core.sink.emit(UiEvent::Notice {
                    message: format!("Spotify authorization failed: {}", error),
                });
                core.set_phase(&mut state, SessionPhase::SignedOut);
                Err(AuthError::ProviderDenied { error }.into())
            }
            AuthCallback::Token {
                access_token,
                expires_in,
            } => {
                core.sink.emit(UiEvent::LocationCleaned { url: cleaned });
                let mut state = core.state.lock().await;
                match core.tokens.accept_implicit_grant(access_token, expires_in) {
                    Ok(_) => {
                        core.activate(&mut state);
                        Ok(state.phase)
                    }
                    Err(e) => {
                        core.force_sign_out(&mut state, None);
                        Err(e)
                    }
                }
            }
            AuthCallback::Code(code) => {
                // The code is single use: the address must not keep it while
                // the exchange is running.
                core.sink.emit(UiEvent::LocationCleaned { url: cleaned });
                {
                    let mut state = core.state.lock().await;
                    poller::stop(&mut state.poll);
                    core.set_phase(&mut state, SessionPhase::Authenticating);
                }

                let exchanged = core.tokens.exchange_code(&code).await;

                let mut state = core.state.lock().await;
                match exchanged {
                    Ok(_) => {
                        core.activate(&mut state);
                        Ok(state.phase)
                    }
                    Err(e) => {
                        let notice = match &e {
                            AuthError::ExchangeFailed { reason } => {
                                Some(format!("Token exchange failed: {}", reason))
                            }
                            _ => None,
                        };
                        core.force_sign_out(&mut state, notice);
                        Err(e.into())
                    }
                }
            }
        }
    }

    pub async fn skip_next(&self) -> AppResult<()> {
        self.transport(TransportCommand::Next, Some(SkipDirection::Next))
            .await
    }

    pub async fn skip_previous(&self) -> AppResult<()> {
        self.transport(TransportCommand::Previous, Some(SkipDirection::Previous))
            .await
    }

    pub async fn toggle_play_pause(&self) -> AppResult<()> {
        let playing = {
            let state = self.core.state.lock().await;
            state.view.track.as_ref().is_some_and(|t| t.is_playing)
        };
        let command = if playing {
            TransportCommand::Pause
        } else {
            TransportCommand::Play
        };
        self.transport(command, None).await
    }

    /// Explicit logout.
    pub async fn sign_out(&self) {
        let mut state = self.core.state.lock().await;
        self.core.force_sign_out(&mut state, None);
    }

    /// Stop both periodic tasks without touching stored credentials. Meant
    /// for teardown: the phase stays as it was, but transport commands are
    /// refused until the session is started again.
    pub async fn stop_polling(&self) {
        let mut state = self.core.state.lock().await;
        poller::stop(&mut state.poll);
    }

    async fn transport(
        &self,
        command: TransportCommand,
        skip: Option<SkipDirection>,
    ) -> AppResult<()> {
        let core = &self.core;
        if !core.config.transport_controls {
            return Err(AppError::Config("Transport controls are disabled".into()));
        }
        let origin_id = {
            let state = core.state.lock().await;
            if state.phase != SessionPhase::Active || !state.poll.is_active {
                return Err(AppError::NotActive);
            }
            state.view.track.as_ref().map(|t| t.id.clone())
        };
        let credential = core.tokens.current()?.ok_or(AppError::NotActive)?;

        if let Err(e) = core
            .player
            .transport(&credential.access_token, command)
            .await
        {
            log::warn!("Playback command {} failed: {}", command.name(), e);
            return Err(e);
        }
        log::info!("Playback command {} accepted", command.name());

        let mut state = core.state.lock().await;
        if !state.poll.is_active {
            return Ok(());
        }
        if let (Some(direction), Some(origin_id)) = (skip, origin_id) {
            let ttl = poller::pending_skip_ttl(core.config.poll_interval());
            state
                .view
                .arm_skip(direction, &origin_id, tokio::time::Instant::now(), ttl);
        }
        poller::schedule_refetch(&state.poll, core.config.extra_fetch_delay());
        Ok(())
    }
}
