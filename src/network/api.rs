//! HTTP/JSON client for the auth, board and friend endpoints.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::common::{ChatMessage, Friend, Post, Registration, UserId};
use crate::error::{ClientError, Result};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    email: &'a str,
    username: &'a str,
    user_id: &'a str,
    password: &'a str,
    birthday: &'a str,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build HTTP client: {err}")))?;
        let base_url = Url::parse(base_url)
            .map_err(|err| ClientError::Config(format!("invalid API base URL {base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "API base URL {base_url} cannot carry a path"
            )));
        }
        Ok(Self { http, base_url })
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn login(&self, login_id: &str, password: &str) -> Result<String> {
        let request = self
            .http
            .post(self.url(&["auth", "login"]))
            .json(&json!({ "loginId": login_id, "password": password }));
        let body: TokenResponse = send_json(request).await?;
        Ok(body.token)
    }

    pub async fn register(&self, registration: &Registration) -> Result<()> {
        let body = RegisterBody {
            email: &registration.email,
            username: &registration.username,
            user_id: &registration.user_id,
            password: &registration.password,
            birthday: &registration.birthday,
        };
        let request = self.http.post(self.url(&["auth", "register"])).json(&body);
        send_empty(request).await
    }

    pub async fn profile(&self, token: &str) -> Result<UserId> {
        let request = self.http.get(self.url(&["user", "profile"])).bearer_auth(token);
        let body: ProfileResponse = send_json(request).await?;
        Ok(body.user_id)
    }

    pub async fn list_posts(&self, token: &str, server: &str) -> Result<Vec<Post>> {
        let request = self
            .http
            .get(self.url(&["posts"]))
            .query(&[("server", server)])
            .bearer_auth(token);
        send_json(request).await
    }

    pub async fn create_post(
        &self,
        token: &str,
        server: &str,
        title: &str,
        content: &str,
    ) -> Result<Post> {
        let request = self
            .http
            .post(self.url(&["posts"]))
            .bearer_auth(token)
            .json(&json!({ "server": server, "title": title, "content": content }));
        send_json(request).await
    }

    pub async fn delete_post(&self, token: &str, post_id: &str) -> Result<()> {
        let request = self
            .http
            .delete(self.url(&["posts", post_id]))
            .bearer_auth(token);
        send_empty(request).await
    }

    pub async fn add_comment(&self, token: &str, post_id: &str, comment: &str) -> Result<Post> {
        let request = self
            .http
            .post(self.url(&["posts", post_id, "comments"]))
            .bearer_auth(token)
            .json(&json!({ "comment": comment }));
        send_json(request).await
    }

    pub async fn upvote(&self, token: &str, post_id: &str) -> Result<Post> {
        let request = self
            .http
            .post(self.url(&["posts", post_id, "vote"]))
            .bearer_auth(token)
            .json(&json!({ "voteType": "upvote" }));
        send_json(request).await
    }

    pub async fn friends(&self, token: &str) -> Result<Vec<Friend>> {
        let request = self.http.get(self.url(&["friends"])).bearer_auth(token);
        send_json(request).await
    }

    pub async fn add_friend(&self, token: &str, friend_id: &str) -> Result<Friend> {
        let request = self
            .http
            .post(self.url(&["friends"]))
            .bearer_auth(token)
            .json(&json!({ "friendId": friend_id }));
        send_json(request).await
    }

    pub async fn friend_history(&self, token: &str, friend_id: &str) -> Result<Vec<ChatMessage>> {
        let request = self
            .http
            .get(self.url(&["friends", friend_id, "messages"]))
            .bearer_auth(token);
        let body: HistoryResponse = send_json(request).await?;
        Ok(body.messages)
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = check_status(request.send().await?).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn send_empty(request: RequestBuilder) -> Result<()> {
    check_status(request.send().await?).await?;
    Ok(())
}

/// Map non-success statuses onto the error taxonomy, keeping the server's
/// `{message}` when it sends one.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| status.to_string());

    log::warn!("Request rejected with {status}: {detail}");
    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::Auth(detail),
        StatusCode::FORBIDDEN => ClientError::Forbidden(detail),
        status if status.is_client_error() => ClientError::Validation(detail),
        _ => ClientError::Network(detail),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> ApiClient {
        ApiClient::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_login_then_profile_returns_same_identity() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/auth/login")
            .match_body(Matcher::Json(json!({"loginId": "alice", "password": "pw"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"tok-123"}"#)
            .expect(1)
            .create_async()
            .await;
        let profile = server
            .mock("GET", "/user/profile")
            .match_header("authorization", "Bearer tok-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"userId":"alice"}"#)
            .expect(1)
            .create_async()
            .await;

        let api = client(&server);
        let token = api.login("alice", "pw").await.unwrap();
        assert_eq!(token, "tok-123");
        let user = api.profile(&token).await.unwrap();
        assert_eq!(user, UserId::new("alice"));

        login.assert_async().await;
        profile.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_credentials_map_to_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"invalid credentials"}"#)
            .create_async()
            .await;

        let err = client(&server).login("alice", "nope").await.unwrap_err();
        assert_eq!(err, ClientError::Auth("invalid credentials".to_string()));
    }

    #[tokio::test]
    async fn test_rejected_registration_is_validation_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/register")
            .match_body(Matcher::PartialJson(json!({"userId": "alice"})))
            .with_status(409)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"user id taken"}"#)
            .create_async()
            .await;

        let registration = Registration {
            email: "a@example.com".into(),
            username: "Alice".into(),
            user_id: "alice".into(),
            password: "pw".into(),
            birthday: "2000-01-01".into(),
        };
        let err = client(&server).register(&registration).await.unwrap_err();
        assert_eq!(err, ClientError::Validation("user id taken".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_body_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/friends")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(&server).friends("tok").await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = api.login("alice", "pw").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_forbidden_is_not_an_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/posts/p1")
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"not allowed"}"#)
            .create_async()
            .await;

        let err = client(&server).delete_post("tok", "p1").await.unwrap_err();
        assert_eq!(err, ClientError::Forbidden("not allowed".to_string()));
        assert_ne!(err.kind(), crate::error::ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_path_segments_are_percent_encoded() {
        let mut server = mockito::Server::new_async().await;
        let history = server
            .mock("GET", "/friends/bob%20smith%2F2/messages")
            .with_status(200)
            .with_body(r#"{"messages":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let messages = client(&server)
            .friend_history("tok", "bob smith/2")
            .await
            .unwrap();
        assert!(messages.is_empty());
        history.assert_async().await;
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = ApiClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_friend_history_parses_messages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/friends/bob/messages")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(
                r#"{"messages":[{"sender":"bob","content":"hey","timestamp":"2024-05-01T10:00:00Z"}]}"#,
            )
            .create_async()
            .await;

        let history = client(&server).friend_history("tok", "bob").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hey");
    }
}
