use std::collections::HashMap;

use serde_json::Value;

use crate::mail::MailFilter;

pub const INTENT_NONE: &str = "None";
pub const INTENT_HELLO: &str = "General_Hello";
pub const INTENT_MAIL_GET: &str = "Mail_Get";

pub const ENTITY_MAIL_FROM: &str = "Mail_From";
pub const ENTITY_MAIL_SUBJECT: &str = "Mail_Subject";
pub const ENTITY_MAIL_COUNT: &str = "Mail_Count";

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.95;

/// Classifier output: the top-scoring intent, its confidence and whatever
/// entities the backend extracted, keyed by entity tag. Entity values keep
/// the backend's JSON shape; some backends return an array per tag, in
/// which case the last element wins.
#[derive(Clone, Debug, PartialEq)]
pub struct IntentResult {
    pub intent: String,
    pub confidence: f64,
    pub entities: HashMap<String, Value>,
}

impl IntentResult {
    pub fn new(intent: impl Into<String>, confidence: f64) -> Self {
        Self { intent: intent.into(), confidence, entities: HashMap::new() }
    }

    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entities.insert(key.into(), value.into());
        self
    }
}

/// Routing parameters the dispatcher consults when deciding what a turn
/// means. All of this is configuration so a deployment can retag intents
/// without touching code.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutingPolicy {
    pub confidence_threshold: f64,
    pub none_intent: String,
    pub hello_intent: String,
    pub mail_intent: String,
    pub from_entity: String,
    pub subject_entity: String,
    pub count_entity: String,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            none_intent: INTENT_NONE.to_owned(),
            hello_intent: INTENT_HELLO.to_owned(),
            mail_intent: INTENT_MAIL_GET.to_owned(),
            from_entity: ENTITY_MAIL_FROM.to_owned(),
            subject_entity: ENTITY_MAIL_SUBJECT.to_owned(),
            count_entity: ENTITY_MAIL_COUNT.to_owned(),
        }
    }
}

impl RoutingPolicy {
    /// A result is understood when it names a real intent and its
    /// confidence strictly exceeds the threshold. Exactly at the threshold
    /// is not enough.
    pub fn is_understood(&self, result: &IntentResult) -> bool {
        result.intent != self.none_intent && result.confidence > self.confidence_threshold
    }

    /// Builds the search filter from extracted entities, falling back to an
    /// unconstrained single-result filter when nothing was extracted.
    pub fn mail_filter(&self, entities: &HashMap<String, Value>) -> MailFilter {
        let from = entity_text(entities, &self.from_entity).unwrap_or_default();
        let subject = entity_text(entities, &self.subject_entity).unwrap_or_default();
        let count = entity_count(entities, &self.count_entity).unwrap_or(1);
        MailFilter::new(&from, &subject, count)
    }
}

/// Resolves the effective value for an entity tag. Array-valued tags keep
/// only the last element.
fn entity_value<'a>(entities: &'a HashMap<String, Value>, key: &str) -> Option<&'a Value> {
    match entities.get(key)? {
        Value::Array(values) => values.last(),
        value => Some(value),
    }
}

fn entity_text(entities: &HashMap<String, Value>, key: &str) -> Option<String> {
    match entity_value(entities, key)? {
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn entity_count(entities: &HashMap<String, Value>, key: &str) -> Option<usize> {
    match entity_value(entities, key)? {
        Value::Number(number) => number.as_u64().map(|count| count as usize),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{IntentResult, RoutingPolicy, INTENT_MAIL_GET, INTENT_NONE};

    #[test]
    fn confidence_at_the_threshold_is_not_understood() {
        let policy = RoutingPolicy::default();
        assert!(!policy.is_understood(&IntentResult::new(INTENT_MAIL_GET, 0.95)));
        assert!(policy.is_understood(&IntentResult::new(INTENT_MAIL_GET, 0.951)));
    }

    #[test]
    fn the_none_intent_is_never_understood() {
        let policy = RoutingPolicy::default();
        assert!(!policy.is_understood(&IntentResult::new(INTENT_NONE, 0.99)));
    }

    #[test]
    fn filter_defaults_when_no_entities_were_extracted() {
        let policy = RoutingPolicy::default();
        let filter = policy.mail_filter(&IntentResult::new(INTENT_MAIL_GET, 0.99).entities);
        assert_eq!(filter.from(), "");
        assert_eq!(filter.subject(), "");
        assert_eq!(filter.count(), 1);
    }

    #[test]
    fn array_valued_entities_keep_the_last_element() {
        let policy = RoutingPolicy::default();
        let result = IntentResult::new(INTENT_MAIL_GET, 0.99)
            .with_entity("Mail_From", json!(["bob", "ana"]))
            .with_entity("Mail_Count", json!(["2", "5"]));

        let filter = policy.mail_filter(&result.entities);
        assert_eq!(filter.from(), "ana");
        assert_eq!(filter.count(), 5);
    }

    #[test]
    fn count_accepts_numbers_and_numeric_strings() {
        let policy = RoutingPolicy::default();

        let numeric = IntentResult::new(INTENT_MAIL_GET, 0.99).with_entity("Mail_Count", json!(3));
        assert_eq!(policy.mail_filter(&numeric.entities).count(), 3);

        let textual =
            IntentResult::new(INTENT_MAIL_GET, 0.99).with_entity("Mail_Count", json!("4"));
        assert_eq!(policy.mail_filter(&textual.entities).count(), 4);

        let junk =
            IntentResult::new(INTENT_MAIL_GET, 0.99).with_entity("Mail_Count", json!("many"));
        assert_eq!(policy.mail_filter(&junk.entities).count(), 1);
    }
}
