//! Channel I/O capability.
//!
//! The wizard never talks to a chat platform directly. Each platform adapter
//! implements [`ChannelIo`]: sending prompts, rendering choice sets and
//! confirmation controls, waiting for a reply or an interaction, and pulling
//! text, attachments, author ids and chosen values out of platform objects.

pub mod error;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::{
        AwaitChoiceOptions, AwaitReplyOptions, Attachment, CANCEL_VALUE, CONFIRM_VALUE, ChannelIo,
        ChoiceKind, ChoiceOption, InputFilter, OutboundMessage,
    },
};
