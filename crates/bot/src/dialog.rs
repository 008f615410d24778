use std::sync::Arc;

use mailseek_core::{is_login_passcode, ApplicationError, TurnKind};
use mailseek_agent::IntentClassifier;
use mailseek_store::CommandBufferAccessor;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cards::Reply;
use crate::context::TurnContext;
use crate::messages;
use crate::providers::AuthProvider;
use crate::router::IntentRouter;

pub const GRAPH_DIALOG: &str = "graph";

/// One suspended dialog: which dialog is active and which step it resumes
/// at. Serialized as part of the conversation snapshot, so changing step
/// numbering invalidates in-flight conversations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogFrame {
    pub dialog: String,
    pub step: usize,
}

/// The persisted dialog stack for one conversation. Empty means no dialog
/// is waiting on the user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogState {
    pub frames: Vec<DialogFrame>,
}

impl DialogState {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn active(&self) -> Option<&DialogFrame> {
        self.frames.last()
    }

    pub fn push(&mut self, dialog: impl Into<String>, step: usize) {
        self.frames.push(DialogFrame { dialog: dialog.into(), step });
    }

    pub fn pop(&mut self) -> Option<DialogFrame> {
        self.frames.pop()
    }
}

/// The login-then-search dialog. Step 0 buffers the user's command and
/// sends the login prompt; step 1 completes the login, restores the
/// buffered command and routes it by intent.
pub struct GraphDialog {
    auth: Arc<dyn AuthProvider>,
    classifier: Arc<dyn IntentClassifier>,
    router: IntentRouter,
    commands: CommandBufferAccessor,
}

impl GraphDialog {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        classifier: Arc<dyn IntentClassifier>,
        router: IntentRouter,
        commands: CommandBufferAccessor,
    ) -> Self {
        Self { auth, classifier, router, commands }
    }

    /// Starts the dialog: buffer the command, prompt for login, suspend at
    /// the process step.
    pub async fn begin(
        &self,
        ctx: &mut TurnContext,
        state: &mut DialogState,
    ) -> Result<(), ApplicationError> {
        if ctx.is_cancelled() {
            return Err(ApplicationError::Cancelled);
        }

        let text = ctx.turn().text.trim().to_owned();
        if ctx.turn().kind == TurnKind::Message && !text.is_empty() && !is_login_passcode(&text) {
            self.commands
                .set(ctx.conversation(), &text)
                .await
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
            debug!(
                event_name = "command_buffered",
                correlation_id = ctx.correlation_id(),
                "buffered pre-login command"
            );
        }

        let prompt = match self.auth.begin_login(ctx.conversation()).await {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(
                    event_name = "login_begin_failed",
                    correlation_id = ctx.correlation_id(),
                    error = %error,
                    "login collaborator failed"
                );
                ctx.send(Reply::text(messages::COLLABORATOR_APOLOGY))
                    .await
                    .map_err(|error| ApplicationError::Collaborator(error.to_string()))?;
                return Ok(());
            }
        };
        ctx.send(prompt)
            .await
            .map_err(|error| ApplicationError::Collaborator(error.to_string()))?;

        state.push(GRAPH_DIALOG, 1);
        Ok(())
    }

    /// Resumes the suspended dialog with the current turn. Always unwinds
    /// the frame: the dialog runs to completion or reports failure, it
    /// never re-suspends.
    pub async fn resume(
        &self,
        ctx: &mut TurnContext,
        state: &mut DialogState,
    ) -> Result<(), ApplicationError> {
        state.pop();

        let login = match self.auth.complete_login(ctx.turn()).await {
            Ok(login) => login,
            Err(error) => {
                warn!(
                    event_name = "login_completion_failed",
                    correlation_id = ctx.correlation_id(),
                    error = %error,
                    "login collaborator failed"
                );
                ctx.send(Reply::text(messages::COLLABORATOR_APOLOGY))
                    .await
                    .map_err(|error| ApplicationError::Collaborator(error.to_string()))?;
                return Ok(());
            }
        };

        let Some(token) = login.bearer().map(str::to_owned) else {
            ctx.send(Reply::text(messages::LOGIN_FAILED))
                .await
                .map_err(|error| ApplicationError::Collaborator(error.to_string()))?;
            return Ok(());
        };

        // A token-delivery turn carries no text. Greet the user and restore
        // whatever command they typed before logging in.
        if ctx.turn().text.trim().is_empty() {
            ctx.send(Reply::text(messages::LOGIN_SUCCEEDED))
                .await
                .map_err(|error| ApplicationError::Collaborator(error.to_string()))?;

            // An empty buffer still substitutes: the empty command runs
            // through classification and comes back "not understood".
            let buffered = self
                .commands
                .consume(ctx.conversation())
                .await
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
            ctx.substitute_message(buffered);
        }

        let classified = match self.classifier.classify(&ctx.turn().text).await {
            Ok(classified) => classified,
            Err(error) => {
                warn!(
                    event_name = "classification_failed",
                    correlation_id = ctx.correlation_id(),
                    error = %error,
                    "classifier collaborator failed"
                );
                ctx.send(Reply::text(messages::COLLABORATOR_APOLOGY))
                    .await
                    .map_err(|error| ApplicationError::Collaborator(error.to_string()))?;
                return Ok(());
            }
        };

        match classified {
            Some(result) => self.router.route(ctx, &result, &token).await,
            None => {
                ctx.send(Reply::text(messages::NOT_UNDERSTOOD))
                    .await
                    .map_err(|error| ApplicationError::Collaborator(error.to_string()))?;
                Ok(())
            }
        }
    }
}
