//! End-to-end dispatcher tests against scripted collaborators and an
//! in-memory state store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mailseek_agent::KeywordClassifier;
use mailseek_core::{
    ChannelAccount, ConversationRef, InterfaceError, MailAddress, MailMessage, RoutingPolicy, Turn,
    TurnKind,
};
use mailseek_bot::dialog::DialogState;
use mailseek_bot::providers::{
    AuthError, AuthProvider, AuthResult, ChannelTransport, MailError, MailProvider, TransportError,
};
use mailseek_bot::{messages, DispatcherSettings, Reply, TurnDispatcher};
use mailseek_store::{CommandBufferAccessor, DialogStateAccessor, MemoryStateStore};
use tokio_util::sync::CancellationToken;

const TRUSTED_CHANNEL: &str = "msteams";

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Reply>>,
}

impl RecordingTransport {
    fn replies(&self) -> Vec<Reply> {
        self.sent.lock().expect("transport lock").clone()
    }

    fn texts(&self) -> Vec<String> {
        self.replies()
            .into_iter()
            .filter_map(|reply| match reply {
                Reply::Text { text } => Some(text),
                Reply::Carousel { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChannelTransport for RecordingTransport {
    async fn send(
        &self,
        _conversation: &ConversationRef,
        reply: Reply,
    ) -> Result<(), TransportError> {
        self.sent.lock().expect("transport lock").push(reply);
        Ok(())
    }
}

/// Auth collaborator scripted per test: which token (if any) a completed
/// login yields, and a record of sign-out calls.
struct ScriptedAuth {
    token: Option<String>,
    sign_outs: Mutex<Vec<String>>,
}

impl ScriptedAuth {
    fn with_token(token: &str) -> Self {
        Self { token: Some(token.to_owned()), sign_outs: Mutex::new(Vec::new()) }
    }

    fn without_token() -> Self {
        Self { token: None, sign_outs: Mutex::new(Vec::new()) }
    }

    fn sign_outs(&self) -> Vec<String> {
        self.sign_outs.lock().expect("auth lock").clone()
    }
}

#[async_trait]
impl AuthProvider for ScriptedAuth {
    async fn begin_login(&self, _conversation: &ConversationRef) -> Result<Reply, AuthError> {
        Ok(Reply::text("Please sign in to continue."))
    }

    async fn complete_login(&self, _turn: &Turn) -> Result<AuthResult, AuthError> {
        Ok(match &self.token {
            Some(token) => AuthResult::token(token.clone()),
            None => AuthResult::failed(),
        })
    }

    async fn sign_out(&self, user_id: &str) -> Result<(), AuthError> {
        self.sign_outs.lock().expect("auth lock").push(user_id.to_owned());
        Ok(())
    }
}

struct ScriptedMail {
    inbox: Vec<MailMessage>,
    calls: Mutex<u32>,
}

impl ScriptedMail {
    fn new(inbox: Vec<MailMessage>) -> Self {
        Self { inbox, calls: Mutex::new(0) }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().expect("mail lock")
    }
}

#[async_trait]
impl MailProvider for ScriptedMail {
    async fn search(&self, _token: &str, _page_size: u32) -> Result<Vec<MailMessage>, MailError> {
        *self.calls.lock().expect("mail lock") += 1;
        Ok(self.inbox.clone())
    }
}

fn mail(subject: &str, from_name: &str) -> MailMessage {
    MailMessage {
        subject: subject.to_owned(),
        from: MailAddress {
            name: from_name.to_owned(),
            address: format!("{}@example.com", from_name.to_lowercase().replace(' ', ".")),
        },
        body_preview: format!("{subject} preview"),
        web_link: format!("https://mail.example.com/{subject}"),
    }
}

fn inbox() -> Vec<MailMessage> {
    vec![
        mail("Team offsite", "Bob Smith"),
        mail("Quarterly invoices", "Ana García"),
        mail("Lunch menu", "Cafeteria"),
    ]
}

fn message(text: &str) -> Turn {
    turn(TurnKind::Message, text, TRUSTED_CHANNEL)
}

fn turn(kind: TurnKind, text: &str, channel_id: &str) -> Turn {
    Turn {
        kind,
        text: text.to_owned(),
        channel_id: channel_id.to_owned(),
        conversation_id: "conv-1".to_owned(),
        sender: ChannelAccount::new("user-1", "Ana"),
        recipient: ChannelAccount::new("bot-1", "MailSeek"),
        members_added: Vec::new(),
    }
}

fn settings() -> DispatcherSettings {
    DispatcherSettings {
        trusted_channel_id: TRUSTED_CHANNEL.to_owned(),
        routing: RoutingPolicy::default(),
        mail_page_size: 100,
        card_logo_url: "https://cdn.example.com/logo.jpg".to_owned(),
    }
}

fn dispatcher(
    store: Arc<MemoryStateStore>,
    auth: Arc<ScriptedAuth>,
    mail: Arc<ScriptedMail>,
    transport: Arc<RecordingTransport>,
) -> TurnDispatcher {
    TurnDispatcher::new(
        store,
        auth,
        Arc::new(KeywordClassifier::new()),
        mail,
        transport,
        settings(),
    )
}

async fn handle(dispatcher: &TurnDispatcher, turn: Turn) {
    dispatcher.handle_turn(turn, CancellationToken::new()).await.expect("turn");
}

#[tokio::test]
async fn first_message_buffers_the_command_and_prompts_for_login() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = dispatcher(
        store.clone(),
        Arc::new(ScriptedAuth::with_token("token-1")),
        Arc::new(ScriptedMail::new(inbox())),
        transport.clone(),
    );

    handle(&bot, message("buscar correos de Ana")).await;

    assert_eq!(transport.texts(), vec!["Please sign in to continue.".to_owned()]);

    let conversation = message("").conversation();
    let buffered =
        CommandBufferAccessor::new(store.clone()).get(&conversation).await.expect("buffer");
    assert_eq!(buffered.as_deref(), Some("buscar correos de Ana"));

    let state = DialogStateAccessor::new(store)
        .load::<DialogState>(&conversation)
        .await
        .expect("load")
        .expect("state");
    assert_eq!(state.frames.len(), 1);
}

#[tokio::test]
async fn a_passcode_is_never_buffered_as_a_command() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = dispatcher(
        store.clone(),
        Arc::new(ScriptedAuth::with_token("token-1")),
        Arc::new(ScriptedMail::new(inbox())),
        transport.clone(),
    );

    handle(&bot, message("123456")).await;

    assert_eq!(transport.texts(), vec!["Please sign in to continue.".to_owned()]);
    let buffered = CommandBufferAccessor::new(store)
        .get(&message("").conversation())
        .await
        .expect("buffer");
    assert_eq!(buffered, None);
}

#[tokio::test]
async fn login_and_buffered_search_complete_end_to_end() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let mail_provider = Arc::new(ScriptedMail::new(inbox()));
    let bot = dispatcher(
        store.clone(),
        Arc::new(ScriptedAuth::with_token("token-1")),
        mail_provider.clone(),
        transport.clone(),
    );

    handle(&bot, message("buscar correos de Ana")).await;
    handle(&bot, turn(TurnKind::Event, "", TRUSTED_CHANNEL)).await;

    let texts = transport.texts();
    assert_eq!(
        texts,
        vec![
            "Please sign in to continue.".to_owned(),
            messages::LOGIN_SUCCEEDED.to_owned(),
            messages::SEARCHING.to_owned(),
            messages::found(1),
        ]
    );
    assert_eq!(mail_provider.calls(), 1);

    let carousels: Vec<Reply> = transport
        .replies()
        .into_iter()
        .filter(|reply| matches!(reply, Reply::Carousel { .. }))
        .collect();
    let [Reply::Carousel { cards }] = carousels.as_slice() else {
        panic!("expected exactly one carousel");
    };
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].subtitle, "Ana García <ana.garcía@example.com>");

    // Nothing left suspended and the buffer was consumed.
    let conversation = message("").conversation();
    let state = DialogStateAccessor::new(store.clone())
        .load::<DialogState>(&conversation)
        .await
        .expect("load")
        .expect("state");
    assert!(state.is_empty());
    let buffered = CommandBufferAccessor::new(store).get(&conversation).await.expect("buffer");
    assert_eq!(buffered, None);
}

#[tokio::test]
async fn misunderstood_command_gets_the_fixed_reply_and_skips_the_mailbox() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let mail_provider = Arc::new(ScriptedMail::new(inbox()));
    let bot = dispatcher(
        store,
        Arc::new(ScriptedAuth::with_token("token-1")),
        mail_provider.clone(),
        transport.clone(),
    );

    handle(&bot, message("what is the weather like")).await;
    handle(&bot, turn(TurnKind::Event, "", TRUSTED_CHANNEL)).await;

    let texts = transport.texts();
    assert_eq!(texts.last().map(String::as_str), Some(messages::NOT_UNDERSTOOD));
    assert_eq!(mail_provider.calls(), 0);
}

#[tokio::test]
async fn failed_login_reports_and_unwinds_the_dialog() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = dispatcher(
        store.clone(),
        Arc::new(ScriptedAuth::without_token()),
        Arc::new(ScriptedMail::new(inbox())),
        transport.clone(),
    );

    handle(&bot, message("buscar correos de Ana")).await;
    handle(&bot, turn(TurnKind::Event, "", TRUSTED_CHANNEL)).await;

    let texts = transport.texts();
    assert_eq!(texts.last().map(String::as_str), Some(messages::LOGIN_FAILED));

    let state = DialogStateAccessor::new(store)
        .load::<DialogState>(&message("").conversation())
        .await
        .expect("load")
        .expect("state");
    assert!(state.is_empty());
}

#[tokio::test]
async fn logout_is_idempotent_and_leaves_a_suspended_dialog_alone() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let auth = Arc::new(ScriptedAuth::with_token("token-1"));
    let bot = dispatcher(
        store.clone(),
        auth.clone(),
        Arc::new(ScriptedMail::new(inbox())),
        transport.clone(),
    );

    // Suspend a login dialog, then log out mid-flight, twice.
    handle(&bot, message("buscar correos de Ana")).await;
    handle(&bot, message("logout")).await;
    handle(&bot, message("logout")).await;

    let texts = transport.texts();
    assert_eq!(texts[1], messages::LOGOUT_DONE);
    assert_eq!(texts[2], messages::LOGOUT_DONE);
    assert_eq!(auth.sign_outs(), vec!["user-1".to_owned(), "user-1".to_owned()]);

    // Logout does not touch the dialog stack; the login dialog is still
    // waiting for its completion turn.
    let state = DialogStateAccessor::new(store)
        .load::<DialogState>(&message("").conversation())
        .await
        .expect("load")
        .expect("state");
    assert_eq!(state.frames.len(), 1);
}

#[tokio::test]
async fn suspended_dialog_survives_a_dispatcher_restart() {
    let store = Arc::new(MemoryStateStore::new());
    let auth = Arc::new(ScriptedAuth::with_token("token-1"));
    let mail_provider = Arc::new(ScriptedMail::new(inbox()));

    let first_transport = Arc::new(RecordingTransport::default());
    let first =
        dispatcher(store.clone(), auth.clone(), mail_provider.clone(), first_transport.clone());
    handle(&first, message("buscar correos de Ana")).await;
    drop(first);

    // A fresh dispatcher over the same store picks the dialog up where the
    // previous one suspended it.
    let second_transport = Arc::new(RecordingTransport::default());
    let second = dispatcher(store, auth, mail_provider, second_transport.clone());
    handle(&second, turn(TurnKind::Event, "", TRUSTED_CHANNEL)).await;

    let texts = second_transport.texts();
    assert_eq!(texts.first().map(String::as_str), Some(messages::LOGIN_SUCCEEDED));
    assert_eq!(texts.last().cloned(), Some(messages::found(1)));
}

#[tokio::test]
async fn invoke_from_an_untrusted_channel_is_rejected_but_state_is_flushed() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = dispatcher(
        store.clone(),
        Arc::new(ScriptedAuth::with_token("token-1")),
        Arc::new(ScriptedMail::new(inbox())),
        transport.clone(),
    );

    let result = bot
        .handle_turn(turn(TurnKind::Invoke, "", "emulator"), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(InterfaceError::Internal { .. })));
    assert!(transport.replies().is_empty());

    // The snapshot still landed in the store.
    let state = DialogStateAccessor::new(store)
        .load::<DialogState>(&turn(TurnKind::Invoke, "", "emulator").conversation())
        .await
        .expect("load");
    assert_eq!(state, Some(DialogState::default()));
}

#[tokio::test]
async fn only_the_first_new_member_is_welcomed() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = dispatcher(
        store,
        Arc::new(ScriptedAuth::with_token("token-1")),
        Arc::new(ScriptedMail::new(inbox())),
        transport.clone(),
    );

    let mut joined = turn(TurnKind::ConversationUpdate, "", TRUSTED_CHANNEL);
    joined.members_added = vec![
        ChannelAccount::new("bot-1", "MailSeek"),
        ChannelAccount::new("user-2", "Carlos"),
        ChannelAccount::new("user-3", "Dana"),
    ];
    handle(&bot, joined).await;

    // Only the first non-bot member is greeted.
    assert_eq!(transport.texts(), vec![messages::welcome("Carlos")]);
}

/// Auth collaborator that fails at a scripted stage of the login flow.
struct FlakyAuth {
    fail_begin: bool,
}

#[async_trait]
impl AuthProvider for FlakyAuth {
    async fn begin_login(&self, _conversation: &ConversationRef) -> Result<Reply, AuthError> {
        if self.fail_begin {
            Err(AuthError::Begin("identity provider unreachable".to_owned()))
        } else {
            Ok(Reply::text("Please sign in to continue."))
        }
    }

    async fn complete_login(&self, _turn: &Turn) -> Result<AuthResult, AuthError> {
        Err(AuthError::Complete("identity provider unreachable".to_owned()))
    }

    async fn sign_out(&self, _user_id: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

fn flaky_dispatcher(
    store: Arc<MemoryStateStore>,
    fail_begin: bool,
    transport: Arc<RecordingTransport>,
) -> TurnDispatcher {
    TurnDispatcher::new(
        store,
        Arc::new(FlakyAuth { fail_begin }),
        Arc::new(KeywordClassifier::new()),
        Arc::new(ScriptedMail::new(inbox())),
        transport,
        settings(),
    )
}

#[tokio::test]
async fn login_completes_on_a_conversation_channel_other_than_the_trusted_one() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = dispatcher(
        store,
        Arc::new(ScriptedAuth::with_token("token-1")),
        Arc::new(ScriptedMail::new(inbox())),
        transport.clone(),
    );

    // Only invoke turns require the trusted channel; the token-delivery
    // event arrives on the conversation's own channel.
    handle(&bot, turn(TurnKind::Message, "buscar correos de Ana", "emulator")).await;
    handle(&bot, turn(TurnKind::Event, "", "emulator")).await;

    let texts = transport.texts();
    assert_eq!(texts[1], messages::LOGIN_SUCCEEDED);
    assert_eq!(texts.last().cloned(), Some(messages::found(1)));
}

#[tokio::test]
async fn login_with_nothing_buffered_still_runs_classification() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = dispatcher(
        store,
        Arc::new(ScriptedAuth::with_token("token-1")),
        Arc::new(ScriptedMail::new(inbox())),
        transport.clone(),
    );

    // A passcode message suspends the dialog without buffering a command,
    // so the post-login substitution yields an empty text.
    handle(&bot, message("123456")).await;
    handle(&bot, turn(TurnKind::Event, "", TRUSTED_CHANNEL)).await;

    assert_eq!(
        transport.texts(),
        vec![
            "Please sign in to continue.".to_owned(),
            messages::LOGIN_SUCCEEDED.to_owned(),
            messages::NOT_UNDERSTOOD.to_owned(),
        ]
    );
}

#[tokio::test]
async fn failed_login_start_apologizes_and_leaves_no_dialog_behind() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = flaky_dispatcher(store.clone(), true, transport.clone());

    handle(&bot, message("buscar correos de Ana")).await;

    assert_eq!(transport.texts(), vec![messages::COLLABORATOR_APOLOGY.to_owned()]);
    let state = DialogStateAccessor::new(store)
        .load::<DialogState>(&message("").conversation())
        .await
        .expect("load")
        .expect("state");
    assert!(state.is_empty());
}

#[tokio::test]
async fn failed_login_completion_apologizes_and_unwinds_the_dialog() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = flaky_dispatcher(store.clone(), false, transport.clone());

    handle(&bot, message("buscar correos de Ana")).await;
    handle(&bot, turn(TurnKind::Event, "", TRUSTED_CHANNEL)).await;

    let texts = transport.texts();
    assert_eq!(texts.last().map(String::as_str), Some(messages::COLLABORATOR_APOLOGY));

    let state = DialogStateAccessor::new(store)
        .load::<DialogState>(&message("").conversation())
        .await
        .expect("load")
        .expect("state");
    assert!(state.is_empty());
}

#[tokio::test]
async fn cancelled_turn_never_buffers_the_command() {
    let store = Arc::new(MemoryStateStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let bot = dispatcher(
        store.clone(),
        Arc::new(ScriptedAuth::with_token("token-1")),
        Arc::new(ScriptedMail::new(inbox())),
        transport.clone(),
    );

    let token = CancellationToken::new();
    token.cancel();
    let result = bot.handle_turn(message("buscar correos de Ana"), token).await;

    assert!(result.is_err());
    assert!(transport.replies().is_empty());
    let buffered = CommandBufferAccessor::new(store)
        .get(&message("").conversation())
        .await
        .expect("buffer");
    assert_eq!(buffered, None);
}
