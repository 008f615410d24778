use serde::{Deserialize, Serialize};

/// The kinds of inbound turns the dispatcher distinguishes. Anything the
/// channel sends outside these four is dropped at the edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Message,
    Event,
    Invoke,
    ConversationUpdate,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    pub name: String,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Stable address of a conversation: enough to scope persisted state and to
/// deliver proactive replies. `user_id` is the sender of the current turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationRef {
    pub channel_id: String,
    pub conversation_id: String,
    pub user_id: String,
}

/// One inbound activity, normalized from the channel wire format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub kind: TurnKind,
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub conversation_id: String,
    pub sender: ChannelAccount,
    pub recipient: ChannelAccount,
    #[serde(default)]
    pub members_added: Vec<ChannelAccount>,
}

impl Turn {
    pub fn conversation(&self) -> ConversationRef {
        ConversationRef {
            channel_id: self.channel_id.clone(),
            conversation_id: self.conversation_id.clone(),
            user_id: self.sender.id.clone(),
        }
    }

    /// Members added by this conversation-update turn, with the bot's own
    /// account filtered out.
    pub fn added_members_excluding_bot(&self) -> impl Iterator<Item = &ChannelAccount> {
        self.members_added.iter().filter(|member| member.id != self.recipient.id)
    }
}

/// Whether `text` is a delegated-login passcode: exactly six ascii digits
/// after trimming, nothing else. A command that merely contains six digits
/// ("find invoice 123456") is not a passcode.
pub fn is_login_passcode(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.len() == 6 && trimmed.chars().all(|ch| ch.is_ascii_digit())
}
