use std::sync::Arc;

use mailseek_core::{ConversationRef, Turn, TurnKind};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cards::Reply;
use crate::providers::{ChannelTransport, TransportError};

/// Per-turn working context: the (mutable) turn, its conversation address,
/// a correlation id for logging, the cancellation signal, and the reply
/// path. Tracks whether anything was sent this turn, which the dispatcher
/// uses to decide whether to start a new dialog after a resume.
pub struct TurnContext {
    turn: Turn,
    conversation: ConversationRef,
    correlation_id: String,
    cancellation: CancellationToken,
    transport: Arc<dyn ChannelTransport>,
    responded: bool,
}

impl TurnContext {
    pub fn new(
        turn: Turn,
        transport: Arc<dyn ChannelTransport>,
        cancellation: CancellationToken,
    ) -> Self {
        let conversation = turn.conversation();
        Self {
            turn,
            conversation,
            correlation_id: Uuid::new_v4().to_string(),
            cancellation,
            transport,
            responded: false,
        }
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn conversation(&self) -> &ConversationRef {
        &self.conversation
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn responded(&self) -> bool {
        self.responded
    }

    /// Replaces the turn content with the buffered pre-login command,
    /// coercing the kind to Message so classification sees a regular
    /// utterance.
    pub fn substitute_message(&mut self, text: String) {
        self.turn.text = text;
        self.turn.kind = TurnKind::Message;
    }

    pub async fn send(&mut self, reply: Reply) -> Result<(), TransportError> {
        self.transport.send(&self.conversation, reply).await?;
        self.responded = true;
        Ok(())
    }
}
