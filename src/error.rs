//! Error taxonomy shared by the network worker and the view.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Coarse failure class, used by the view to pick how an error is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Auth,
    Forbidden,
    Validation,
    Protocol,
    NotOpen,
    Storage,
    Config,
}

/// Every failure the client can surface.
///
/// Errors cross the worker/view channel inside events, so variants carry
/// rendered messages instead of the source error values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// Authenticated, but the server refused this particular request.
    #[error("not allowed: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection for {conversation} is not open ({state})")]
    NotOpen { conversation: String, state: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Network(_) => ErrorKind::Network,
            ClientError::Auth(_) => ErrorKind::Auth,
            ClientError::Forbidden(_) => ErrorKind::Forbidden,
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::Protocol(_) => ErrorKind::Protocol,
            ClientError::NotOpen { .. } => ErrorKind::NotOpen,
            ClientError::Storage(_) => ErrorKind::Storage,
            ClientError::Config(_) => ErrorKind::Config,
        }
    }

    /// Network faults and closed connections can be retried by the user.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::NotOpen)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Protocol(err.to_string())
        } else if err.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            ClientError::Auth(err.to_string())
        } else if err.status() == Some(reqwest::StatusCode::FORBIDDEN) {
            ClientError::Forbidden(err.to_string())
        } else if err.is_builder() {
            ClientError::Config(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

impl From<rusqlite::Error> for ClientError {
    fn from(err: rusqlite::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Http(response) if response.status().as_u16() == 401 => {
                ClientError::Auth("websocket handshake rejected".to_string())
            }
            WsError::Http(response) if response.status().as_u16() == 403 => {
                ClientError::Forbidden("websocket handshake refused".to_string())
            }
            WsError::Url(url_err) => ClientError::Config(url_err.to_string()),
            WsError::HttpFormat(err) => ClientError::Config(format!("invalid request: {err}")),
            other => ClientError::Network(other.to_string()),
        }
    }
}
