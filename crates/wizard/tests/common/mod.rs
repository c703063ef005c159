//! Scripted channel used by the integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use {
    async_trait::async_trait,
    parley_channels::{
        Attachment, AwaitChoiceOptions, AwaitReplyOptions, CANCEL_VALUE, CONFIRM_VALUE, ChannelIo,
        ChoiceOption, OutboundMessage, Result,
    },
    parley_common::{WizardContext, hooks::WizardNotification},
    parley_wizard::{StepDefinition, Wizard, WizardOptions},
    tokio::sync::{mpsc, watch},
};

pub const USER: &str = "user-1";
pub const CHANNEL: &str = "chan-1";

pub fn ctx() -> WizardContext {
    WizardContext::new(USER, CHANNEL)
}

#[derive(Debug, Clone)]
pub struct TestMessage {
    pub author: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct TestInteraction {
    pub author: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestComponent {
    ChoiceSet {
        id: String,
        values: Vec<String>,
        min: usize,
        max: usize,
    },
    Button {
        id: String,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub channel_id: String,
    pub content: String,
    pub components: Vec<TestComponent>,
}

/// Replies and interactions are queued up front or mid-run; awaits take them
/// in order. Nothing times out on its own, so the wizard's timer decides.
pub struct ScriptedChannel {
    replies_tx: mpsc::UnboundedSender<TestMessage>,
    replies: tokio::sync::Mutex<mpsc::UnboundedReceiver<TestMessage>>,
    choices_tx: mpsc::UnboundedSender<TestInteraction>,
    choices: tokio::sync::Mutex<mpsc::UnboundedReceiver<TestInteraction>>,
    sent: Mutex<Vec<Sent>>,
    sent_count: watch::Sender<usize>,
}

impl ScriptedChannel {
    pub fn new() -> Arc<Self> {
        let (replies_tx, replies) = mpsc::unbounded_channel();
        let (choices_tx, choices) = mpsc::unbounded_channel();
        let (sent_count, _) = watch::channel(0);
        Arc::new(Self {
            replies_tx,
            replies: tokio::sync::Mutex::new(replies),
            choices_tx,
            choices: tokio::sync::Mutex::new(choices),
            sent: Mutex::new(Vec::new()),
            sent_count,
        })
    }

    pub fn reply_from(&self, author: &str, content: &str) {
        self.replies_tx
            .send(TestMessage {
                author: author.into(),
                content: content.into(),
                attachments: Vec::new(),
            })
            .unwrap();
    }

    pub fn reply(&self, content: &str) {
        self.reply_from(USER, content);
    }

    pub fn replies(&self, contents: &[&str]) {
        for content in contents {
            self.reply(content);
        }
    }

    pub fn upload(&self, attachments: Vec<Attachment>) {
        self.replies_tx
            .send(TestMessage {
                author: USER.into(),
                content: String::new(),
                attachments,
            })
            .unwrap();
    }

    pub fn choose_from(&self, author: &str, values: &[&str]) {
        self.choices_tx
            .send(TestInteraction {
                author: author.into(),
                values: values.iter().map(|v| v.to_string()).collect(),
            })
            .unwrap();
    }

    pub fn choose(&self, values: &[&str]) {
        self.choose_from(USER, values);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.content).collect()
    }

    pub fn last_text(&self) -> String {
        self.texts().pop().unwrap_or_default()
    }

    /// Wait until at least `n` messages have been sent.
    pub async fn wait_for_sent(&self, n: usize) {
        let mut rx = self.sent_count.subscribe();
        rx.wait_for(|count| *count >= n).await.unwrap();
    }
}

#[async_trait]
impl ChannelIo for ScriptedChannel {
    type Component = TestComponent;
    type Interaction = TestInteraction;
    type Message = TestMessage;

    fn id(&self) -> &str {
        "scripted"
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: OutboundMessage<TestComponent>,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Sent {
            channel_id: channel_id.into(),
            content: message.content,
            components: message.components,
        });
        self.sent_count.send_modify(|count| *count += 1);
        Ok(())
    }

    async fn await_reply(
        &self,
        _channel_id: &str,
        options: AwaitReplyOptions<TestMessage>,
    ) -> Result<Vec<TestMessage>> {
        let mut replies = self.replies.lock().await;
        let mut collected = Vec::new();
        while collected.len() < options.max {
            let Some(message) = replies.recv().await else {
                break;
            };
            if (options.filter)(&message) {
                collected.push(message);
            }
        }
        Ok(collected)
    }

    async fn await_choice(
        &self,
        _channel_id: &str,
        options: AwaitChoiceOptions<TestInteraction>,
    ) -> Result<TestInteraction> {
        let mut choices = self.choices.lock().await;
        loop {
            match choices.recv().await {
                Some(interaction) if (options.filter)(&interaction) => return Ok(interaction),
                Some(_) => {},
                None => std::future::pending::<()>().await,
            }
        }
    }

    fn render_choice_set(
        &self,
        id: &str,
        options: &[ChoiceOption],
        _prompt: &str,
        min_choices: usize,
        max_choices: usize,
    ) -> TestComponent {
        TestComponent::ChoiceSet {
            id: id.into(),
            values: options.iter().map(|o| o.value.clone()).collect(),
            min: min_choices,
            max: max_choices,
        }
    }

    fn render_confirmation_controls(&self, id: &str) -> Vec<TestComponent> {
        [CONFIRM_VALUE, CANCEL_VALUE]
            .into_iter()
            .map(|value| TestComponent::Button {
                id: format!("{id}_{value}"),
                value: value.into(),
            })
            .collect()
    }

    fn content(&self, message: &TestMessage) -> String {
        message.content.clone()
    }

    fn attachments(&self, message: &TestMessage) -> Vec<Attachment> {
        message.attachments.clone()
    }

    fn author_id(&self, message: &TestMessage) -> String {
        message.author.clone()
    }

    fn interaction_author_id(&self, interaction: &TestInteraction) -> String {
        interaction.author.clone()
    }

    fn chosen_values(&self, interaction: &TestInteraction) -> Vec<String> {
        interaction.values.clone()
    }
}

pub fn wizard(
    channel: &Arc<ScriptedChannel>,
    steps: Vec<StepDefinition>,
    options: WizardOptions,
) -> Arc<Wizard<ScriptedChannel>> {
    Arc::new(Wizard::new(Arc::clone(channel), steps, options).unwrap())
}

/// Everything notified so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<WizardNotification>) -> Vec<WizardNotification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}
