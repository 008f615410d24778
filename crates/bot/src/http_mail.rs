use std::time::Duration;

use async_trait::async_trait;
use mailseek_core::{MailAddress, MailMessage};
use serde::Deserialize;

use crate::providers::{MailError, MailProvider};

/// Mail provider backed by a Graph-style REST inbox endpoint. Fetches one
/// page of the most recent messages with the caller's bearer token; all
/// filtering happens locally afterwards.
pub struct HttpMailProvider {
    client: reqwest::Client,
    endpoint: String,
    timezone: String,
}

impl HttpMailProvider {
    pub fn new(
        endpoint: impl Into<String>,
        timeout_secs: u64,
        timezone: impl Into<String>,
    ) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| MailError::Search(error.to_string()))?;

        Ok(Self { client, endpoint: endpoint.into(), timezone: timezone.into() })
    }
}

#[async_trait]
impl MailProvider for HttpMailProvider {
    async fn search(&self, token: &str, page_size: u32) -> Result<Vec<MailMessage>, MailError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("$top", page_size.to_string())])
            .bearer_auth(token)
            .header("Prefer", format!("outlook.timezone=\"{}\"", self.timezone))
            .send()
            .await
            .map_err(|error| MailError::Search(error.to_string()))?
            .error_for_status()
            .map_err(|error| MailError::Search(error.to_string()))?;

        let page: MessagePage =
            response.json().await.map_err(|error| MailError::Search(error.to_string()))?;

        Ok(page.value.into_iter().map(MailMessage::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    value: Vec<MessageDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDto {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    from: RecipientDto,
    #[serde(default)]
    body_preview: String,
    #[serde(default)]
    web_link: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipientDto {
    #[serde(default)]
    email_address: EmailAddressDto,
}

#[derive(Debug, Default, Deserialize)]
struct EmailAddressDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: String,
}

impl From<MessageDto> for MailMessage {
    fn from(dto: MessageDto) -> Self {
        Self {
            subject: dto.subject,
            from: MailAddress {
                name: dto.from.email_address.name,
                address: dto.from.email_address.address,
            },
            body_preview: dto.body_preview,
            web_link: dto.web_link,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MessagePage;
    use mailseek_core::MailMessage;

    #[test]
    fn provider_page_deserializes_the_wire_shape() {
        let raw = r#"{
            "value": [
                {
                    "subject": "Quarterly report",
                    "from": {
                        "emailAddress": { "name": "Ana García", "address": "ana@example.com" }
                    },
                    "bodyPreview": "Attached you will find...",
                    "webLink": "https://outlook.example.com/m/1"
                },
                {
                    "subject": "No sender at all"
                }
            ]
        }"#;

        let page: MessagePage = serde_json::from_str(raw).expect("parse");
        assert_eq!(page.value.len(), 2);

        let first = MailMessage::from(page.value.into_iter().next().expect("first"));
        assert_eq!(first.subject, "Quarterly report");
        assert_eq!(first.from.name, "Ana García");
        assert_eq!(first.from.address, "ana@example.com");
        assert_eq!(first.body_preview, "Attached you will find...");
        assert_eq!(first.web_link, "https://outlook.example.com/m/1");
    }

    #[test]
    fn missing_wire_fields_default_to_empty() {
        let raw = r#"{ "value": [ { "subject": "Bare" } ] }"#;
        let page: MessagePage = serde_json::from_str(raw).expect("parse");
        let message = MailMessage::from(page.value.into_iter().next().expect("one"));
        assert_eq!(message.subject, "Bare");
        assert_eq!(message.from.name, "");
        assert_eq!(message.web_link, "");
    }
}
