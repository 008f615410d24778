use serde::{Deserialize, Serialize};

/// Normalized search criteria built from classifier entities. Sender and
/// subject are matched as case-insensitive substrings; `count` caps the
/// number of results and is never below 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailFilter {
    from: String,
    subject: String,
    count: usize,
}

impl Default for MailFilter {
    fn default() -> Self {
        Self { from: String::new(), subject: String::new(), count: 1 }
    }
}

impl MailFilter {
    pub fn new(from: &str, subject: &str, count: usize) -> Self {
        Self {
            from: from.trim().to_lowercase(),
            subject: subject.trim().to_lowercase(),
            count: count.max(1),
        }
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// An empty criterion matches everything; set criteria match as
    /// substrings of the sender display name and the subject.
    pub fn matches(&self, message: &MailMessage) -> bool {
        let from_ok =
            self.from.is_empty() || message.from.name.to_lowercase().contains(&self.from);
        let subject_ok =
            self.subject.is_empty() || message.subject.to_lowercase().contains(&self.subject);
        from_ok && subject_ok
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: MailAddress,
    #[serde(default)]
    pub body_preview: String,
    #[serde(default)]
    pub web_link: String,
}

/// Filters a provider page in arrival order and truncates to the filter's
/// count. The provider returns most-recent-first, so truncation keeps the
/// newest matches.
pub fn apply_filter(messages: Vec<MailMessage>, filter: &MailFilter) -> Vec<MailMessage> {
    messages.into_iter().filter(|message| filter.matches(message)).take(filter.count()).collect()
}
