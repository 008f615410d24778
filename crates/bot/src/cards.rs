use mailseek_core::MailMessage;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardImage {
    pub url: String,
    pub alt: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardActionKind {
    OpenUrl,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardAction {
    pub kind: CardActionKind,
    pub title: String,
    pub value: String,
}

/// One rendered mail result: subject as the title, sender as the subtitle,
/// body preview as the text, the provider logo, and an open-mail action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MailCard {
    pub title: String,
    pub subtitle: String,
    pub text: String,
    pub images: Vec<CardImage>,
    pub actions: Vec<CardAction>,
}

/// What the bot hands to the channel transport for delivery. Layout and
/// wire encoding are the transport's concern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Text { text: String },
    Carousel { cards: Vec<MailCard> },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

pub fn mail_card(message: &MailMessage, logo_url: &str) -> MailCard {
    MailCard {
        title: message.subject.clone(),
        subtitle: format!("{} <{}>", message.from.name, message.from.address),
        text: message.body_preview.clone(),
        images: vec![CardImage { url: logo_url.to_owned(), alt: "Mail provider logo".to_owned() }],
        actions: vec![CardAction {
            kind: CardActionKind::OpenUrl,
            title: "Open mail".to_owned(),
            value: message.web_link.clone(),
        }],
    }
}

pub fn mail_carousel(messages: &[MailMessage], logo_url: &str) -> Reply {
    Reply::Carousel {
        cards: messages.iter().map(|message| mail_card(message, logo_url)).collect(),
    }
}
