use std::{fmt, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::Result;

/// Value carried by the confirm control of a confirmation step.
pub const CONFIRM_VALUE: &str = "confirm";

/// Value carried by the cancel control of a confirmation step.
pub const CANCEL_VALUE: &str = "cancel";

// ── Outbound ────────────────────────────────────────────────────────────────

/// A message sent to a channel: text plus optional rendered components.
#[derive(Debug, Clone)]
pub struct OutboundMessage<C> {
    pub content: String,
    pub components: Vec<C>,
}

impl<C> OutboundMessage<C> {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            components: Vec::new(),
        }
    }

    pub fn with_components(content: impl Into<String>, components: Vec<C>) -> Self {
        Self {
            content: content.into(),
            components,
        }
    }
}

impl<C> From<String> for OutboundMessage<C> {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

impl<C> From<&str> for OutboundMessage<C> {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

/// One entry of a choice set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl ChoiceOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
            emoji: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ── Inbound ─────────────────────────────────────────────────────────────────

/// A file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Predicate deciding whether an inbound object is for the waiting step.
pub type InputFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Options for [`ChannelIo::await_reply`].
pub struct AwaitReplyOptions<M> {
    pub filter: InputFilter<M>,
    /// Number of matching replies to collect before resolving.
    pub max: usize,
    pub timeout: Duration,
}

impl<M> fmt::Debug for AwaitReplyOptions<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitReplyOptions")
            .field("max", &self.max)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Which kind of interactive control an interaction must come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceKind {
    Selection,
    Confirmation,
}

/// Options for [`ChannelIo::await_choice`].
pub struct AwaitChoiceOptions<I> {
    pub filter: InputFilter<I>,
    pub timeout: Duration,
    pub kind: ChoiceKind,
}

impl<I> fmt::Debug for AwaitChoiceOptions<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitChoiceOptions")
            .field("timeout", &self.timeout)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

// ── Capability trait ────────────────────────────────────────────────────────

/// Transport a wizard run talks through. Each chat platform implements this.
///
/// `Message` and `Interaction` are the platform's own inbound objects; the
/// accessor methods are the only way the wizard looks inside them.
/// `Component` is whatever the platform uses for interactive widgets.
#[async_trait]
pub trait ChannelIo: Send + Sync + 'static {
    type Message: Send + Sync + 'static;
    type Interaction: Send + Sync + 'static;
    type Component: Send + Sync + 'static;

    /// Channel identifier (e.g. "discord", "terminal").
    fn id(&self) -> &str;

    async fn send_message(
        &self,
        channel_id: &str,
        message: OutboundMessage<Self::Component>,
    ) -> Result<()>;

    /// Wait for replies accepted by `options.filter`.
    ///
    /// Resolves with `options.max` messages, or fails with
    /// [`crate::Error::Timeout`] once `options.timeout` elapses.
    async fn await_reply(
        &self,
        channel_id: &str,
        options: AwaitReplyOptions<Self::Message>,
    ) -> Result<Vec<Self::Message>>;

    /// Wait for one selection or confirmation event accepted by the filter.
    async fn await_choice(
        &self,
        channel_id: &str,
        options: AwaitChoiceOptions<Self::Interaction>,
    ) -> Result<Self::Interaction>;

    fn render_choice_set(
        &self,
        id: &str,
        options: &[ChoiceOption],
        prompt: &str,
        min_choices: usize,
        max_choices: usize,
    ) -> Self::Component;

    /// Confirm and cancel controls carrying [`CONFIRM_VALUE`] and
    /// [`CANCEL_VALUE`].
    fn render_confirmation_controls(&self, id: &str) -> Vec<Self::Component>;

    fn content(&self, message: &Self::Message) -> String;

    fn attachments(&self, message: &Self::Message) -> Vec<Attachment>;

    fn author_id(&self, message: &Self::Message) -> String;

    fn interaction_author_id(&self, interaction: &Self::Interaction) -> String;

    fn chosen_values(&self, interaction: &Self::Interaction) -> Vec<String>;
}
