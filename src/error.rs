use serde::Serialize;

/// Failures of the OAuth flow. Every variant except `NoRefreshToken` leaves
/// the credential store purged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("PKCE verifier missing, the login flow was interrupted")]
    MissingVerifier,

    #[error("Token exchange failed: {reason}")]
    ExchangeFailed { reason: String },

    #[error("Token refresh failed")]
    RefreshFailed,

    #[error("No refresh token stored")]
    NoRefreshToken,

    #[error("Authorization denied by provider: {error}")]
    ProviderDenied { error: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Spotify API error: {status} - {message}")]
    SpotifyApi { status: u16, message: String },

    #[error("Session is not active")]
    NotActive,

    #[error("Callback error: {0}")]
    Callback(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl AppError {
    fn kind(&self) -> &str {
        match self {
            AppError::Http(_) => "http",
            AppError::Json(_) => "json",
            AppError::Url(_) => "url",
            AppError::Auth(_) => "auth",
            AppError::SpotifyApi { .. } => "spotify_api",
            AppError::NotActive => "not_active",
            AppError::Callback(_) => "callback",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_and_message() {
        let err = AppError::SpotifyApi {
            status: 502,
            message: "bad gateway".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "spotify_api");
        assert_eq!(json["message"], "Spotify API error: 502 - bad gateway");
    }

    #[test]
    fn auth_errors_keep_their_message() {
        let err: AppError = AuthError::ProviderDenied {
            error: "access_denied".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Authorization denied by provider: access_denied"
        );
        assert_eq!(serde_json::to_value(&err).unwrap()["kind"], "auth");
    }
}
