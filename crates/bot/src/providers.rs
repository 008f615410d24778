use async_trait::async_trait;
use mailseek_core::{ConversationRef, MailMessage, Turn};
use thiserror::Error;

use crate::cards::Reply;

/// Outcome of a delegated login attempt: a bearer token or nothing.
/// Never partially valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthResult {
    token: Option<String>,
}

impl AuthResult {
    pub fn token(token: impl Into<String>) -> Self {
        Self { token: Some(token.into()) }
    }

    pub fn failed() -> Self {
        Self { token: None }
    }

    pub fn bearer(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("login could not be initiated: {0}")]
    Begin(String),
    #[error("login completion failed: {0}")]
    Complete(String),
    #[error("sign-out failed: {0}")]
    SignOut(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MailError {
    #[error("mail search failed: {0}")]
    Search(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("reply delivery failed: {0}")]
    Send(String),
}

/// Delegated-login collaborator. The OAuth mechanics (consent screens,
/// token exchange, magic-code validation) live entirely behind this
/// contract; the dialog engine only sees prompt-out and token-or-not back.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Produces the login prompt reply for the conversation.
    async fn begin_login(&self, conversation: &ConversationRef) -> Result<Reply, AuthError>;

    /// Completes the login using whatever the current turn delivered
    /// (token event, passcode message, ...).
    async fn complete_login(&self, turn: &Turn) -> Result<AuthResult, AuthError>;

    async fn sign_out(&self, user_id: &str) -> Result<(), AuthError>;
}

#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Up to `page_size` most-recent inbox messages, most-recent-first.
    async fn search(&self, token: &str, page_size: u32) -> Result<Vec<MailMessage>, MailError>;
}

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn send(&self, conversation: &ConversationRef, reply: Reply) -> Result<(), TransportError>;
}

#[derive(Clone, Debug, Default)]
pub struct NoopAuthProvider;

#[async_trait]
impl AuthProvider for NoopAuthProvider {
    async fn begin_login(&self, _conversation: &ConversationRef) -> Result<Reply, AuthError> {
        Ok(Reply::text("Please sign in to continue."))
    }

    async fn complete_login(&self, _turn: &Turn) -> Result<AuthResult, AuthError> {
        Ok(AuthResult::failed())
    }

    async fn sign_out(&self, _user_id: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct NoopMailProvider;

#[async_trait]
impl MailProvider for NoopMailProvider {
    async fn search(&self, _token: &str, _page_size: u32) -> Result<Vec<MailMessage>, MailError> {
        Ok(Vec::new())
    }
}

#[derive(Clone, Debug, Default)]
pub struct NoopChannelTransport;

#[async_trait]
impl ChannelTransport for NoopChannelTransport {
    async fn send(
        &self,
        _conversation: &ConversationRef,
        _reply: Reply,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}
