use crate::api::auth;
use crate::api::models::{CurrentlyPlaying, TokenResponse};
use crate::api::{PlaybackFetch, PlayerEndpoint, TokenEndpoint, TransportCommand};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_LENGTH};
use reqwest::StatusCode;
use std::sync::Arc;

const BASE_URL: &str = "https://api.spotify.com/v1";

pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    redirect_uri: String,
    clock: Arc<dyn Clock>,
}

impl SpotifyClient {
    pub fn new(config: &AppConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        // Every call gets a deadline so a hung request surfaces as a network
        // error instead of stalling the fetch loop.
        let http = reqwest::Client::builder()
            .user_agent(concat!("nowplaying/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            clock,
        })
    }

    fn auth_headers(&self, access_token: &str) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let auth_value = format!("Bearer {}", access_token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AppError::Config(e.to_string()))?,
        );
        Ok(headers)
    }

    async fn check_response(&self, response: reqwest::Response) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(AppError::SpotifyApi {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl TokenEndpoint for SpotifyClient {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenResponse> {
        auth::exchange_code(
            &self.http,
            &self.client_id,
            &self.redirect_uri,
            code,
            code_verifier,
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        auth::refresh_user_token(&self.http, &self.client_id, refresh_token).await
    }
}

#[async_trait]
impl PlayerEndpoint for SpotifyClient {
    async fn currently_playing(&self, access_token: &str) -> AppResult<PlaybackFetch> {
        let url = format!("{}/me/player/currently-playing", BASE_URL);
        let headers = self.auth_headers(access_token)?;

        let response = self.http.get(&url).headers(headers).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(PlaybackFetch::Unauthorized);
        }
        if status == StatusCode::NO_CONTENT || !status.is_success() {
            if !status.is_success() {
                log::debug!("currently-playing returned {}", status);
            }
            return Ok(PlaybackFetch::Nothing);
        }

        let body: CurrentlyPlaying = response.json().await?;
        Ok(match body.into_track_state(self.clock.now_ms()) {
            Some(track) => PlaybackFetch::Playing(track),
            None => PlaybackFetch::Nothing,
        })
    }

    async fn transport(&self, access_token: &str, command: TransportCommand) -> AppResult<()> {
        let url = format!("{}/me/player/{}", BASE_URL, command.name());
        let mut headers = self.auth_headers(access_token)?;
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));

        let request = match command {
            TransportCommand::Next | TransportCommand::Previous => self.http.post(&url),
            TransportCommand::Play | TransportCommand::Pause => self.http.put(&url),
        };
        let response = request.headers(headers).send().await?;
        self.check_response(response).await?;
        Ok(())
    }
}
