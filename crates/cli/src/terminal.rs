//! A [`ChannelIo`] over stdin and stdout, for running flows locally.
//!
//! Choice sets print as numbered lists and are answered by number, value or
//! label (comma or space separated for multi-select). Confirmations take
//! `y`/`yes`. A line starting with `@` attaches the named file.

use std::{path::Path, sync::Mutex as StdMutex};

use {
    async_trait::async_trait,
    parley_channels::{
        Attachment, AwaitChoiceOptions, AwaitReplyOptions, CANCEL_VALUE, CONFIRM_VALUE, ChannelIo,
        ChoiceKind, ChoiceOption, Error, OutboundMessage, Result,
    },
    tokio::{
        io::{
            AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin,
            Stdout,
        },
        sync::Mutex,
    },
};

#[derive(Debug, Clone)]
pub struct TerminalLine {
    pub content: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct TerminalChoice {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TerminalComponent {
    Choices {
        options: Vec<ChoiceOption>,
        max: usize,
    },
    Button {
        value: String,
    },
}

pub struct TerminalChannel<R, W> {
    user_id: String,
    input: Mutex<Lines<R>>,
    output: Mutex<W>,
    /// Options of the most recently printed choice set.
    menu: StdMutex<Vec<ChoiceOption>>,
}

impl TerminalChannel<BufReader<Stdin>, Stdout> {
    pub fn stdio(user_id: impl Into<String>) -> Self {
        Self::new(
            user_id,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }
}

impl<R, W> TerminalChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(user_id: impl Into<String>, reader: R, writer: W) -> Self {
        Self {
            user_id: user_id.into(),
            input: Mutex::new(reader.lines()),
            output: Mutex::new(writer),
            menu: StdMutex::new(Vec::new()),
        }
    }

    async fn read_line(&self) -> Result<String> {
        let mut input = self.input.lock().await;
        match input.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(Error::unavailable("input closed")),
            Err(e) => Err(Error::external("reading input", e)),
        }
    }

    async fn write(&self, text: &str) -> Result<()> {
        let mut output = self.output.lock().await;
        output
            .write_all(text.as_bytes())
            .await
            .map_err(|e| Error::external("writing output", e))?;
        output
            .flush()
            .await
            .map_err(|e| Error::external("writing output", e))
    }

    fn menu(&self) -> Vec<ChoiceOption> {
        self.menu.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Text form of rendered components.
fn render_components(components: &[TerminalComponent]) -> String {
    let mut out = String::new();
    let mut buttons = Vec::new();
    for component in components {
        match component {
            TerminalComponent::Choices { options, max } => {
                for (i, option) in options.iter().enumerate() {
                    out.push_str(&format!("  {}) {}", i + 1, option.label));
                    if let Some(description) = &option.description {
                        out.push_str(&format!(" ({description})"));
                    }
                    out.push('\n');
                }
                if *max > 1 {
                    out.push_str("  (several allowed, separate with commas)\n");
                }
            },
            TerminalComponent::Button { value } => buttons.push(value.as_str()),
        }
    }
    if !buttons.is_empty() {
        let labels: Vec<_> = buttons
            .iter()
            .map(|value| match *value {
                CONFIRM_VALUE => "[y] confirm",
                CANCEL_VALUE => "[n] cancel",
                other => other,
            })
            .collect();
        out.push_str(&format!("  {}\n", labels.join("   ")));
    }
    out
}

/// Map what the user typed onto option values.
fn parse_selection(line: &str, menu: &[ChoiceOption]) -> Vec<String> {
    line.split([',', ' '])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            if let Ok(n) = token.parse::<usize>()
                && let Some(option) = n.checked_sub(1).and_then(|i| menu.get(i))
            {
                return option.value.clone();
            }
            menu.iter()
                .find(|o| o.value == token || o.label.eq_ignore_ascii_case(token))
                .map_or_else(|| token.to_string(), |o| o.value.clone())
        })
        .collect()
}

fn parse_confirmation(line: &str) -> &'static str {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | CONFIRM_VALUE => CONFIRM_VALUE,
        _ => CANCEL_VALUE,
    }
}

async fn attachment_for(path: &Path) -> Option<Attachment> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    let absolute = tokio::fs::canonicalize(path).await.ok()?;
    let filename = absolute.file_name()?.to_string_lossy().into_owned();
    Some(Attachment {
        id: filename.clone(),
        url: format!("file://{}", absolute.display()),
        filename,
        content_type: None,
        size: Some(metadata.len()),
    })
}

#[async_trait]
impl<R, W> ChannelIo for TerminalChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Component = TerminalComponent;
    type Interaction = TerminalChoice;
    type Message = TerminalLine;

    fn id(&self) -> &str {
        "terminal"
    }

    async fn send_message(
        &self,
        _channel_id: &str,
        message: OutboundMessage<TerminalComponent>,
    ) -> Result<()> {
        for component in &message.components {
            if let TerminalComponent::Choices { options, .. } = component {
                *self.menu.lock().unwrap_or_else(|e| e.into_inner()) = options.clone();
            }
        }
        let mut text = message.content;
        text.push('\n');
        text.push_str(&render_components(&message.components));
        self.write(&text).await
    }

    async fn await_reply(
        &self,
        _channel_id: &str,
        options: AwaitReplyOptions<TerminalLine>,
    ) -> Result<Vec<TerminalLine>> {
        let mut collected = Vec::new();
        while collected.len() < options.max {
            self.write("> ").await?;
            let content = self.read_line().await?;
            let attachments = match content.trim().strip_prefix('@') {
                Some(path) => attachment_for(Path::new(path.trim()))
                    .await
                    .into_iter()
                    .collect(),
                None => Vec::new(),
            };
            let line = TerminalLine {
                content,
                attachments,
            };
            if (options.filter)(&line) {
                collected.push(line);
            }
        }
        Ok(collected)
    }

    async fn await_choice(
        &self,
        _channel_id: &str,
        options: AwaitChoiceOptions<TerminalChoice>,
    ) -> Result<TerminalChoice> {
        loop {
            self.write("> ").await?;
            let line = self.read_line().await?;
            let values = match options.kind {
                ChoiceKind::Confirmation => vec![parse_confirmation(&line).to_string()],
                ChoiceKind::Selection => parse_selection(&line, &self.menu()),
            };
            let choice = TerminalChoice { values };
            if (options.filter)(&choice) {
                return Ok(choice);
            }
        }
    }

    fn render_choice_set(
        &self,
        _id: &str,
        options: &[ChoiceOption],
        _prompt: &str,
        _min_choices: usize,
        max_choices: usize,
    ) -> TerminalComponent {
        TerminalComponent::Choices {
            options: options.to_vec(),
            max: max_choices,
        }
    }

    fn render_confirmation_controls(&self, _id: &str) -> Vec<TerminalComponent> {
        vec![
            TerminalComponent::Button {
                value: CONFIRM_VALUE.into(),
            },
            TerminalComponent::Button {
                value: CANCEL_VALUE.into(),
            },
        ]
    }

    fn content(&self, message: &TerminalLine) -> String {
        message.content.clone()
    }

    fn attachments(&self, message: &TerminalLine) -> Vec<Attachment> {
        message.attachments.clone()
    }

    fn author_id(&self, _message: &TerminalLine) -> String {
        self.user_id.clone()
    }

    fn interaction_author_id(&self, _interaction: &TerminalChoice) -> String {
        self.user_id.clone()
    }

    fn chosen_values(&self, interaction: &TerminalChoice) -> Vec<String> {
        interaction.values.clone()
    }
}
