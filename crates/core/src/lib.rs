pub mod config;
pub mod errors;
pub mod intent;
pub mod mail;
pub mod turn;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, StorageBackend};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use intent::{IntentResult, RoutingPolicy};
pub use mail::{apply_filter, MailAddress, MailFilter, MailMessage};
pub use turn::{is_login_passcode, ChannelAccount, ConversationRef, Turn, TurnKind};
