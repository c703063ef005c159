use std::{sync::Arc, time::Duration};

use {
    parley_channels::{ChannelIo, OutboundMessage},
    tokio::task::JoinHandle,
    tracing::{debug, warn},
};

use crate::options::TimeoutWarning;

/// One-shot "time is running out" message for an outstanding await.
///
/// Dropping the timer cancels it, so it dies with the await it belongs to.
pub(crate) struct WarningTimer {
    handle: JoinHandle<()>,
}

impl WarningTimer {
    /// Schedule the warning, or `None` if the lead leaves no time before it.
    pub fn schedule<C: ChannelIo>(
        channel: Arc<C>,
        channel_id: String,
        timeout: Duration,
        warning: &TimeoutWarning,
    ) -> Option<Self> {
        let delay = warning.delay(timeout)?;
        let message = warning.message.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(channel_id, "sending timeout warning");
            if let Err(e) = channel
                .send_message(&channel_id, OutboundMessage::text(message))
                .await
            {
                warn!(channel_id, error = %e, "failed to send timeout warning");
            }
        });
        Some(Self { handle })
    }
}

impl Drop for WarningTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
