//! Scripted stand-ins for the token and player endpoints.

use crate::api::models::TokenResponse;
use crate::api::{PlaybackFetch, PlayerEndpoint, TokenEndpoint, TransportCommand};
use crate::error::{AppError, AppResult};
use crate::events::UiEvent;
use crate::playback::state::TrackState;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

pub fn token(access: &str, refresh: Option<&str>, expires_in: Option<u64>) -> TokenResponse {
    TokenResponse {
        access_token: Some(access.into()),
        refresh_token: refresh.map(Into::into),
        expires_in,
        ..TokenResponse::default()
    }
}

pub fn rejected() -> AppError {
    AppError::SpotifyApi {
        status: 400,
        message: "invalid_grant".into(),
    }
}

pub fn network_error() -> AppError {
    AppError::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        "operation timed out",
    ))
}

pub fn track(id: &str, duration_ms: i64, position_ms: i64, is_playing: bool) -> TrackState {
    TrackState::new(
        id.into(),
        format!("Track {}", id),
        vec!["Artist".into()],
        Some("Album".into()),
        Some(format!("https://img/{}", id)),
        duration_ms,
        position_ms,
        is_playing,
        0,
    )
}

pub fn channel_sink() -> (
    Arc<mpsc::UnboundedSender<UiEvent>>,
    mpsc::UnboundedReceiver<UiEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(tx), rx)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Each call pops the next queued reply; an empty queue rejects.
#[derive(Default)]
pub struct FakeTokenEndpoint {
    pub exchange_replies: Mutex<Vec<AppResult<TokenResponse>>>,
    pub refresh_replies: Mutex<Vec<AppResult<TokenResponse>>>,
    pub exchanges: Mutex<Vec<(String, String)>>,
    pub refreshes: Mutex<Vec<String>>,
}

impl FakeTokenEndpoint {
    pub fn on_exchange(&self, reply: AppResult<TokenResponse>) {
        self.exchange_replies.lock().unwrap().push(reply);
    }

    pub fn on_refresh(&self, reply: AppResult<TokenResponse>) {
        self.refresh_replies.lock().unwrap().push(reply);
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenResponse> {
        self.exchanges
            .lock()
            .unwrap()
            .push((code.into(), code_verifier.into()));
        let mut replies = self.exchange_replies.lock().unwrap();
        if replies.is_empty() {
            return Err(rejected());
        }
        replies.remove(0)
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        self.refreshes.lock().unwrap().push(refresh_token.into());
        let mut replies = self.refresh_replies.lock().unwrap();
        if replies.is_empty() {
            return Err(rejected());
        }
        replies.remove(0)
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Playing(TrackState),
    Nothing,
    Unauthorized,
    NetworkError,
}

impl Reply {
    fn into_result(self) -> AppResult<PlaybackFetch> {
        match self {
            Reply::Playing(track) => Ok(PlaybackFetch::Playing(track)),
            Reply::Nothing => Ok(PlaybackFetch::Nothing),
            Reply::Unauthorized => Ok(PlaybackFetch::Unauthorized),
            Reply::NetworkError => Err(network_error()),
        }
    }
}

/// Player endpoint fed from a reply queue; once drained it keeps answering
/// with `fallback`.
pub struct FakePlayer {
    replies: Mutex<Vec<Reply>>,
    fallback: Mutex<Reply>,
    /// Access token of every currently-playing call, in order.
    pub fetches: Mutex<Vec<String>>,
    pub commands: Mutex<Vec<TransportCommand>>,
    pub reject_commands: Mutex<bool>,
    /// Time a transport command takes to be answered.
    pub command_delay: Mutex<std::time::Duration>,
    /// When set, fetches park on this until notified.
    pub hold: Mutex<Option<Arc<Notify>>>,
}

impl FakePlayer {
    pub fn new(fallback: Reply) -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            fallback: Mutex::new(fallback),
            fetches: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            reject_commands: Mutex::new(false),
            command_delay: Mutex::new(std::time::Duration::ZERO),
            hold: Mutex::new(None),
        }
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push(reply);
    }

    pub fn set_fallback(&self, reply: Reply) {
        *self.fallback.lock().unwrap() = reply;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl PlayerEndpoint for FakePlayer {
    async fn currently_playing(&self, access_token: &str) -> AppResult<PlaybackFetch> {
        self.fetches.lock().unwrap().push(access_token.into());
        let hold = self.hold.lock().unwrap().clone();
        if let Some(hold) = hold {
            hold.notified().await;
        }
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                self.fallback.lock().unwrap().clone()
            } else {
                replies.remove(0)
            }
        };
        reply.into_result()
    }

    async fn transport(&self, _access_token: &str, command: TransportCommand) -> AppResult<()> {
        self.commands.lock().unwrap().push(command);
        let delay = *self.command_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.reject_commands.lock().unwrap() {
            return Err(AppError::SpotifyApi {
                status: 404,
                message: "NO_ACTIVE_DEVICE".into(),
            });
        }
        Ok(())
    }
}

pub struct TestApp {
    pub state: crate::AppState,
    pub store: Arc<crate::store::MemoryCredentialStore>,
    pub endpoint: Arc<FakeTokenEndpoint>,
    pub player: Arc<FakePlayer>,
    pub clock: Arc<crate::clock::FixedClock>,
    pub rx: mpsc::UnboundedReceiver<UiEvent>,
}

/// Fully wired app state on top of the fakes, clock fixed at `now_ms`.
pub fn test_app(
    stored: Option<crate::store::Credential>,
    fallback: Reply,
    now_ms: i64,
) -> TestApp {
    use crate::store::MemoryCredentialStore;

    let store = Arc::new(match stored {
        Some(credential) => MemoryCredentialStore::with_credential(credential),
        None => MemoryCredentialStore::new(),
    });
    let endpoint = Arc::new(FakeTokenEndpoint::default());
    let player = Arc::new(FakePlayer::new(fallback));
    let clock = Arc::new(crate::clock::FixedClock::new(now_ms));
    let config = crate::config::AppConfig {
        client_id: "client".into(),
        ..crate::config::AppConfig::default()
    };
    let tokens = crate::token::TokenManager::new(
        config.client_id.clone(),
        config.redirect_uri.clone(),
        config.transport_controls,
        endpoint.clone(),
        store.clone(),
        clock.clone(),
    );
    let (sink, rx) = channel_sink();
    let session = crate::session::Session::new(config.clone(), tokens, player.clone(), sink);
    TestApp {
        state: crate::AppState { config, session },
        store,
        endpoint,
        player,
        clock,
        rx,
    }
}
