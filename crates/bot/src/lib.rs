//! Turn dispatch and dialog orchestration.
//!
//! A turn enters through [`TurnDispatcher::handle_turn`], which restores the
//! conversation's dialog snapshot, routes the turn by kind (built-in
//! commands, channel trust check for invoke-style turns, welcome on member
//! join, otherwise the login-then-search dialog), and flushes the snapshot
//! back unconditionally. Collaborators - identity provider, intent
//! classifier, mail backend and the reply transport - sit behind traits in
//! [`providers`] so the engine can be exercised with scripted fakes.

pub mod cards;
pub mod context;
pub mod dialog;
pub mod dispatcher;
pub mod http_mail;
pub mod messages;
pub mod providers;
pub mod router;

pub use cards::{mail_card, mail_carousel, CardAction, CardActionKind, CardImage, MailCard, Reply};
pub use context::TurnContext;
pub use dialog::{DialogFrame, DialogState, GraphDialog, GRAPH_DIALOG};
pub use dispatcher::{DispatcherSettings, TurnDispatcher};
pub use http_mail::HttpMailProvider;
pub use providers::{
    AuthError, AuthProvider, AuthResult, ChannelTransport, MailError, MailProvider,
    NoopAuthProvider, NoopChannelTransport, NoopMailProvider, TransportError,
};
pub use router::IntentRouter;
