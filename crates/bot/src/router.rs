use std::sync::Arc;

use mailseek_core::{apply_filter, ApplicationError, IntentResult, RoutingPolicy};
use tracing::{debug, warn};

use crate::cards::{mail_carousel, Reply};
use crate::context::TurnContext;
use crate::messages;
use crate::providers::MailProvider;

/// Routes an understood-or-not intent to a reply. The mail path fetches a
/// provider page with the user's token, filters it locally and renders the
/// matches as a carousel.
pub struct IntentRouter {
    policy: RoutingPolicy,
    mail: Arc<dyn MailProvider>,
    page_size: u32,
    logo_url: String,
}

impl IntentRouter {
    pub fn new(
        policy: RoutingPolicy,
        mail: Arc<dyn MailProvider>,
        page_size: u32,
        logo_url: impl Into<String>,
    ) -> Self {
        Self { policy, mail, page_size, logo_url: logo_url.into() }
    }

    pub async fn route(
        &self,
        ctx: &mut TurnContext,
        result: &IntentResult,
        token: &str,
    ) -> Result<(), ApplicationError> {
        if !self.policy.is_understood(result) {
            return self.reply(ctx, Reply::text(messages::NOT_UNDERSTOOD)).await;
        }

        if result.intent == self.policy.hello_intent {
            return self.reply(ctx, Reply::text(messages::GREETING)).await;
        }

        if result.intent == self.policy.mail_intent {
            return self.list_mail(ctx, result, token).await;
        }

        // Understood but unhandled: echo the classification so the gap is
        // visible in the conversation, not just the logs.
        self.reply(ctx, Reply::text(messages::diagnostic(&result.intent, result.confidence))).await
    }

    async fn list_mail(
        &self,
        ctx: &mut TurnContext,
        result: &IntentResult,
        token: &str,
    ) -> Result<(), ApplicationError> {
        self.reply(ctx, Reply::text(messages::SEARCHING)).await?;

        let filter = self.policy.mail_filter(&result.entities);
        debug!(
            event_name = "mail_search",
            correlation_id = ctx.correlation_id(),
            from = filter.from(),
            subject = filter.subject(),
            count = filter.count(),
            "searching inbox"
        );

        let page = match self.mail.search(token, self.page_size).await {
            Ok(page) => page,
            Err(error) => {
                warn!(
                    event_name = "mail_search_failed",
                    correlation_id = ctx.correlation_id(),
                    error = %error,
                    "mail collaborator failed"
                );
                return self.reply(ctx, Reply::text(messages::COLLABORATOR_APOLOGY)).await;
            }
        };

        let matches = apply_filter(page, &filter);
        if matches.is_empty() {
            return self.reply(ctx, Reply::text(messages::NOTHING_FOUND)).await;
        }

        self.reply(ctx, Reply::text(messages::found(matches.len()))).await?;
        self.reply(ctx, mail_carousel(&matches, &self.logo_url)).await
    }

    async fn reply(&self, ctx: &mut TurnContext, reply: Reply) -> Result<(), ApplicationError> {
        ctx.send(reply).await.map_err(|error| ApplicationError::Collaborator(error.to_string()))
    }
}
