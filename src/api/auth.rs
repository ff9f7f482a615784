use crate::api::models::TokenResponse;
use crate::error::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;

pub const AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

pub const READ_SCOPES: [&str; 2] = ["user-read-currently-playing", "user-read-playback-state"];
pub const MODIFY_SCOPE: &str = "user-modify-playback-state";

const VERIFIER_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Fresh verifier of 64 characters from `[A-Za-z0-9]`. `thread_rng` is a
    /// CSPRNG seeded from the OS.
    pub fn generate() -> Self {
        let verifier: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(VERIFIER_LEN)
            .map(char::from)
            .collect();
        Self::from_verifier(verifier)
    }

    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = s256_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// `BASE64URL(SHA256(verifier))` without padding.
pub fn s256_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

pub fn scopes(transport_controls: bool) -> String {
    let mut scopes = READ_SCOPES.to_vec();
    if transport_controls {
        scopes.push(MODIFY_SCOPE);
    }
    scopes.join(" ")
}

pub fn build_auth_url(
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    code_challenge: &str,
) -> String {
    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&code_challenge_method=S256&code_challenge={}",
        AUTH_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(scope),
        code_challenge
    )
}

pub async fn exchange_code(
    http: &reqwest::Client,
    client_id: &str,
    redirect_uri: &str,
    code: &str,
    code_verifier: &str,
) -> AppResult<TokenResponse> {
    let params = [
        ("client_id", client_id),
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("code_verifier", code_verifier),
    ];

    let response = http.post(TOKEN_URL).form(&params).send().await?;
    read_token_response(response, "Token exchange failed").await
}

/// Refresh an expired user token using the refresh_token grant.
pub async fn refresh_user_token(
    http: &reqwest::Client,
    client_id: &str,
    refresh_token: &str,
) -> AppResult<TokenResponse> {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];

    let response = http.post(TOKEN_URL).form(&params).send().await?;
    read_token_response(response, "Token refresh failed").await
}

async fn read_token_response(
    response: reqwest::Response,
    context: &str,
) -> AppResult<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .and_then(|t| t.failure_reason())
            .unwrap_or(body);
        return Err(AppError::SpotifyApi {
            status: status.as_u16(),
            message: format!("{}: {}", context, reason),
        });
    }

    let token: TokenResponse = response.json().await?;
    Ok(token)
}

/// What the identity provider sent back to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCallback {
    Code(String),
    Error(String),
    /// Implicit grant, token delivered in the URL fragment.
    Token {
        access_token: String,
        expires_in: Option<u64>,
    },
    None,
}

/// Parse a redirect URL. Returns the callback and the same URL with query
/// and fragment removed, which is what the address bar should show.
pub fn parse_callback(redirect: &str) -> AppResult<(AuthCallback, String)> {
    let url = Url::parse(redirect)?;

    let mut cleaned = url.clone();
    cleaned.set_query(None);
    cleaned.set_fragment(None);
    let cleaned = cleaned.to_string();

    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = query("error") {
        return Ok((AuthCallback::Error(error), cleaned));
    }
    if let Some(code) = query("code") {
        if code.is_empty() {
            return Err(AppError::Callback("empty authorization code".into()));
        }
        return Ok((AuthCallback::Code(code), cleaned));
    }

    if let Some(fragment) = url.fragment() {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect();
        let get = |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        if let Some(error) = get("error") {
            return Ok((AuthCallback::Error(error), cleaned));
        }
        if let Some(access_token) = get("access_token") {
            let expires_in = get("expires_in").and_then(|v| v.parse().ok());
            return Ok((
                AuthCallback::Token {
                    access_token,
                    expires_in,
                },
                cleaned,
            ));
        }
    }

    Ok((AuthCallback::None, cleaned))
}
