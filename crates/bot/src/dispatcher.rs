use std::sync::Arc;

use mailseek_agent::IntentClassifier;
use mailseek_core::{
    AppConfig, ApplicationError, DomainError, InterfaceError, RoutingPolicy, Turn, TurnKind,
};
use mailseek_store::{CommandBufferAccessor, DialogStateAccessor, StateStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cards::Reply;
use crate::context::TurnContext;
use crate::dialog::{DialogState, GraphDialog};
use crate::messages;
use crate::providers::{AuthProvider, ChannelTransport, MailProvider};
use crate::router::IntentRouter;

/// Everything the dispatcher needs from configuration, extracted once at
/// startup so turn handling never touches the config tree.
#[derive(Clone, Debug)]
pub struct DispatcherSettings {
    pub trusted_channel_id: String,
    pub routing: RoutingPolicy,
    pub mail_page_size: u32,
    pub card_logo_url: String,
}

impl DispatcherSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            trusted_channel_id: config.channel.trusted_channel_id.clone(),
            routing: config.routing_policy(),
            mail_page_size: config.mail.page_size,
            card_logo_url: config.mail.logo_url.clone(),
        }
    }
}

/// The per-turn entry point. Loads the conversation's dialog snapshot,
/// routes the turn by kind, and flushes the snapshot back - also when the
/// turn failed, so a retry resumes from a consistent state.
pub struct TurnDispatcher {
    trusted_channel_id: String,
    transport: Arc<dyn ChannelTransport>,
    auth: Arc<dyn AuthProvider>,
    dialog_state: DialogStateAccessor,
    dialog: GraphDialog,
}

impl TurnDispatcher {
    pub fn new(
        store: Arc<dyn StateStore>,
        auth: Arc<dyn AuthProvider>,
        classifier: Arc<dyn IntentClassifier>,
        mail: Arc<dyn MailProvider>,
        transport: Arc<dyn ChannelTransport>,
        settings: DispatcherSettings,
    ) -> Self {
        let router = IntentRouter::new(
            settings.routing,
            mail,
            settings.mail_page_size,
            settings.card_logo_url,
        );
        let dialog = GraphDialog::new(
            auth.clone(),
            classifier,
            router,
            CommandBufferAccessor::new(store.clone()),
        );

        Self {
            trusted_channel_id: settings.trusted_channel_id,
            transport,
            auth,
            dialog_state: DialogStateAccessor::new(store),
            dialog,
        }
    }

    pub async fn handle_turn(
        &self,
        turn: Turn,
        cancellation: CancellationToken,
    ) -> Result<(), InterfaceError> {
        let mut ctx = TurnContext::new(turn, self.transport.clone(), cancellation);
        let correlation_id = ctx.correlation_id().to_owned();

        info!(
            event_name = "turn_received",
            correlation_id = correlation_id.as_str(),
            kind = ?ctx.turn().kind,
            channel_id = ctx.turn().channel_id.as_str(),
            "handling turn"
        );

        let mut state = self
            .dialog_state
            .load::<DialogState>(ctx.conversation())
            .await
            .map_err(|error| {
                ApplicationError::Persistence(error.to_string())
                    .into_interface(correlation_id.clone())
            })?
            .unwrap_or_default();

        let outcome = self.process(&mut ctx, &mut state).await;

        // Flush runs regardless of the turn outcome.
        let flush = self.dialog_state.save(ctx.conversation(), &state).await;

        match (outcome, flush) {
            (Err(error), _) => {
                warn!(
                    event_name = "turn_failed",
                    correlation_id = correlation_id.as_str(),
                    error = %error,
                    "turn ended in error"
                );
                Err(error.into_interface(correlation_id))
            }
            (Ok(()), Err(error)) => {
                Err(ApplicationError::Persistence(error.to_string()).into_interface(correlation_id))
            }
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn process(
        &self,
        ctx: &mut TurnContext,
        state: &mut DialogState,
    ) -> Result<(), ApplicationError> {
        if ctx.is_cancelled() {
            return Err(ApplicationError::Cancelled);
        }

        match ctx.turn().kind {
            TurnKind::Message => {
                let command = ctx.turn().text.trim().to_lowercase();
                match command.as_str() {
                    "logout" => self.logout(ctx).await,
                    "help" => self.send(ctx, Reply::text(messages::HELP)).await,
                    _ => self.resume_or_begin(ctx, state).await,
                }
            }
            TurnKind::Event => self.resume_or_begin(ctx, state).await,
            // Only invoke-style turns carry the channel-trust requirement;
            // events (token delivery among them) arrive on the
            // conversation's own channel.
            TurnKind::Invoke => {
                if ctx.turn().channel_id != self.trusted_channel_id {
                    return Err(DomainError::UntrustedChannel {
                        expected: self.trusted_channel_id.clone(),
                        actual: ctx.turn().channel_id.clone(),
                    }
                    .into());
                }
                self.resume_or_begin(ctx, state).await
            }
            TurnKind::ConversationUpdate => {
                // One welcome per update turn, naming the first non-bot
                // member that joined.
                let name = ctx
                    .turn()
                    .added_members_excluding_bot()
                    .map(|member| member.name.clone())
                    .next();
                if let Some(name) = name {
                    self.send(ctx, Reply::text(messages::welcome(&name))).await?;
                }
                Ok(())
            }
        }
    }

    /// Sign-out is idempotent: a logout with no active session still
    /// confirms. A suspended dialog stays suspended; the next non-command
    /// message resumes it.
    async fn logout(&self, ctx: &mut TurnContext) -> Result<(), ApplicationError> {
        match self.auth.sign_out(&ctx.conversation().user_id).await {
            Ok(()) => self.send(ctx, Reply::text(messages::LOGOUT_DONE)).await,
            Err(error) => {
                warn!(
                    event_name = "sign_out_failed",
                    correlation_id = ctx.correlation_id(),
                    error = %error,
                    "sign-out collaborator failed"
                );
                self.send(ctx, Reply::text(messages::COLLABORATOR_APOLOGY)).await
            }
        }
    }

    async fn resume_or_begin(
        &self,
        ctx: &mut TurnContext,
        state: &mut DialogState,
    ) -> Result<(), ApplicationError> {
        if state.active().is_none() {
            return self.dialog.begin(ctx, state).await;
        }

        self.dialog.resume(ctx, state).await?;

        // A resume that unwound without replying means the turn still needs
        // handling; start over with the current turn.
        if state.is_empty() && !ctx.responded() {
            return self.dialog.begin(ctx, state).await;
        }
        Ok(())
    }

    async fn send(&self, ctx: &mut TurnContext, reply: Reply) -> Result<(), ApplicationError> {
        ctx.send(reply).await.map_err(|error| ApplicationError::Collaborator(error.to_string()))
    }
}
