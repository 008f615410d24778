use async_trait::async_trait;
use thiserror::Error;

use mailseek_core::intent::{
    IntentResult, ENTITY_MAIL_COUNT, ENTITY_MAIL_FROM, ENTITY_MAIL_SUBJECT, INTENT_HELLO,
    INTENT_MAIL_GET, INTENT_NONE,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier backend failure: {0}")]
    Backend(String),
}

/// Black-box classifier contract: `(intent, confidence, entities)` or
/// nothing when the backend produced no result at all.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Option<IntentResult>, ClassifierError>;
}

/// Deterministic keyword classifier. Used in tests and in offline mode as a
/// stand-in for a hosted NLU service; recognizes greetings and mail-search
/// requests in English and Spanish phrasings and extracts the sender,
/// subject and count entities the router consumes.
#[derive(Clone, Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn extract(&self, text: &str) -> IntentResult {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return IntentResult::new(INTENT_NONE, 0.0);
        }

        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        if is_greeting(&tokens) {
            return IntentResult::new(INTENT_HELLO, 0.98);
        }

        let has_mail_noun = tokens.iter().any(|token| is_mail_noun(token));
        if !has_mail_noun {
            return IntentResult::new(INTENT_NONE, 0.0);
        }

        let has_search_verb = tokens.iter().any(|token| is_search_verb(token));
        let confidence = if has_search_verb { 0.97 } else { 0.90 };

        let mut result = IntentResult::new(INTENT_MAIL_GET, confidence);
        if let Some(from) = capture_after(&tokens, &["de", "from"]) {
            result = result.with_entity(ENTITY_MAIL_FROM, from);
        }
        if let Some(subject) = capture_after(&tokens, &["sobre", "about", "asunto", "subject"]) {
            result = result.with_entity(ENTITY_MAIL_SUBJECT, subject);
        }
        if let Some(count) = first_count(&tokens) {
            result = result.with_entity(ENTITY_MAIL_COUNT, count);
        }
        result
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Option<IntentResult>, ClassifierError> {
        Ok(Some(self.extract(text)))
    }
}

fn is_greeting(tokens: &[&str]) -> bool {
    tokens.len() <= 2
        && tokens
            .first()
            .is_some_and(|token| matches!(*token, "hola" | "hello" | "hi" | "hey" | "buenas"))
}

fn is_mail_noun(token: &str) -> bool {
    matches!(
        token.trim_matches(|ch: char| !ch.is_alphanumeric()),
        "mail" | "mails" | "email" | "emails" | "correo" | "correos" | "mensaje" | "mensajes"
    )
}

fn is_search_verb(token: &str) -> bool {
    matches!(
        token,
        "buscar" | "busca" | "encuentra" | "dame" | "muestra" | "find" | "search" | "show" | "get"
            | "list"
    )
}

/// Joins the tokens after the first matching marker word, stopping at the
/// next marker. "buscar correos de ana garcía sobre facturas" captures
/// "ana garcía" for the `de` marker and "facturas" for `sobre`.
fn capture_after(tokens: &[&str], markers: &[&str]) -> Option<String> {
    let start = tokens.iter().position(|token| markers.contains(token))? + 1;
    let captured: Vec<&str> =
        tokens[start..].iter().take_while(|token| !is_any_marker(token)).copied().collect();

    if captured.is_empty() {
        None
    } else {
        Some(captured.join(" "))
    }
}

fn is_any_marker(token: &str) -> bool {
    matches!(token, "de" | "from" | "sobre" | "about" | "asunto" | "subject")
}

fn first_count(tokens: &[&str]) -> Option<u64> {
    tokens.iter().find_map(|token| token.parse().ok()).filter(|count| *count > 0)
}
