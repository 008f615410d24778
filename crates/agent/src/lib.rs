//! Intent classification for MailSeek.
//!
//! The dialog engine only depends on the [`IntentClassifier`] contract; the
//! hosted NLU backend is swappable. [`KeywordClassifier`] is the built-in
//! deterministic implementation used by tests and offline deployments.

pub mod classifier;

pub use classifier::{ClassifierError, IntentClassifier, KeywordClassifier};
