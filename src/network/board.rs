//! Bulletin board operations.
//!
//! Nothing here touches local state optimistically: every mutation returns
//! the server's confirmed post, and callers only update their view from that.

use std::collections::HashSet;

use crate::common::{Post, UserId};
use crate::config::VotePolicy;
use crate::error::{ClientError, Result};

use super::api::ApiClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Counted(Post),
    /// Idempotent policy: this user already upvoted the post, no request sent.
    AlreadyVoted,
}

pub struct Board {
    policy: VotePolicy,
    voted: HashSet<String>,
}

impl Board {
    pub fn new(policy: VotePolicy) -> Self {
        Self {
            policy,
            voted: HashSet::new(),
        }
    }

    pub fn policy(&self) -> VotePolicy {
        self.policy
    }

    /// Forget per-user vote tracking (on logout).
    pub fn reset(&mut self) {
        self.voted.clear();
    }

    pub async fn list(&self, api: &ApiClient, token: &str, server: &str) -> Result<Vec<Post>> {
        api.list_posts(token, server).await
    }

    pub async fn create(
        &self,
        api: &ApiClient,
        token: &str,
        server: &str,
        title: &str,
        content: &str,
    ) -> Result<Post> {
        let (title, content) = (title.trim(), content.trim());
        if title.is_empty() || content.is_empty() {
            return Err(ClientError::validation("a post needs a title and content"));
        }
        api.create_post(token, server, title, content).await
    }

    /// Only the author may delete; anyone else is refused before any request.
    pub async fn delete(
        &self,
        api: &ApiClient,
        token: &str,
        user: &UserId,
        post: &Post,
    ) -> Result<()> {
        if post.username != user.as_str() {
            return Err(ClientError::validation("only the author can delete this post"));
        }
        api.delete_post(token, &post.id).await
    }

    pub async fn comment(
        &self,
        api: &ApiClient,
        token: &str,
        post_id: &str,
        comment: &str,
    ) -> Result<Post> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(ClientError::validation("comment is empty"));
        }
        api.add_comment(token, post_id, comment).await
    }

    pub async fn upvote(
        &mut self,
        api: &ApiClient,
        token: &str,
        post_id: &str,
    ) -> Result<VoteOutcome> {
        if self.policy == VotePolicy::Idempotent && self.voted.contains(post_id) {
            log::debug!("Ignoring repeated upvote on post {post_id}");
            return Ok(VoteOutcome::AlreadyVoted);
        }

        let post = api.upvote(token, post_id).await?;
        self.voted.insert(post_id.to_string());
        Ok(VoteOutcome::Counted(post))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn post_json(votes: i64) -> String {
        format!(
            r#"{{"id":"p1","title":"Rules","content":"Be nice","votes":{votes},"comments":[],"username":"alice"}}"#
        )
    }

    fn sample_post(username: &str) -> Post {
        Post {
            id: "p1".into(),
            title: "Rules".into(),
            content: "Be nice".into(),
            votes: 0,
            comments: Vec::new(),
            username: username.into(),
        }
    }

    #[tokio::test]
    async fn test_idempotent_policy_counts_double_upvote_once() {
        let mut server = mockito::Server::new_async().await;
        let vote = server
            .mock("POST", "/posts/p1/vote")
            .with_status(200)
            .with_body(post_json(1))
            .expect(1)
            .create_async()
            .await;
        let api = ApiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let mut board = Board::new(VotePolicy::Idempotent);

        let first = board.upvote(&api, "tok", "p1").await.unwrap();
        let second = board.upvote(&api, "tok", "p1").await.unwrap();

        match first {
            VoteOutcome::Counted(post) => assert_eq!(post.votes, 1),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(second, VoteOutcome::AlreadyVoted);
        vote.assert_async().await;
    }

    #[tokio::test]
    async fn test_cumulative_policy_forwards_every_upvote() {
        let mut server = mockito::Server::new_async().await;
        let first_vote = server
            .mock("POST", "/posts/p1/vote")
            .with_status(200)
            .with_body(post_json(1))
            .expect(1)
            .create_async()
            .await;
        let api = ApiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let mut board = Board::new(VotePolicy::Cumulative);

        let first = board.upvote(&api, "tok", "p1").await.unwrap();
        first_vote.assert_async().await;
        first_vote.remove_async().await;

        let second_vote = server
            .mock("POST", "/posts/p1/vote")
            .with_status(200)
            .with_body(post_json(2))
            .expect(1)
            .create_async()
            .await;
        let second = board.upvote(&api, "tok", "p1").await.unwrap();
        second_vote.assert_async().await;

        assert!(matches!(first, VoteOutcome::Counted(ref post) if post.votes == 1));
        assert!(matches!(second, VoteOutcome::Counted(ref post) if post.votes == 2));
    }

    #[tokio::test]
    async fn test_failed_vote_is_not_remembered() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/posts/p1/vote")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let api = ApiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let mut board = Board::new(VotePolicy::Idempotent);

        assert!(board.upvote(&api, "tok", "p1").await.is_err());
        failing.assert_async().await;
        failing.remove_async().await;

        server
            .mock("POST", "/posts/p1/vote")
            .with_status(200)
            .with_body(post_json(1))
            .create_async()
            .await;
        assert!(matches!(
            board.upvote(&api, "tok", "p1").await.unwrap(),
            VoteOutcome::Counted(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_by_non_author_sends_nothing() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/posts/p1")
            .with_status(204)
            .expect(0)
            .create_async()
            .await;
        let api = ApiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let board = Board::new(VotePolicy::Idempotent);

        let err = board
            .delete(&api, "tok", &UserId::new("mallory"), &sample_post("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_by_author() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/posts/p1")
            .match_header("authorization", "Bearer tok")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let api = ApiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let board = Board::new(VotePolicy::Idempotent);

        board
            .delete(&api, "tok", &UserId::new("alice"), &sample_post("alice"))
            .await
            .unwrap();
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_post_and_comment_are_rejected_locally() {
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let board = Board::new(VotePolicy::Idempotent);

        let err = board
            .create(&api, "tok", "Server1", "  ", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        let err = board.comment(&api, "tok", "p1", "\n").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }
}
