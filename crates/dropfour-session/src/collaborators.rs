//! The chat platform, as seen by the engine.
//!
//! The engine reacts to events it does not control the timing of. Moves and
//! decisions arrive through [`MoveSource`] and [`DecisionSource`]; everything
//! the players see goes out through [`Presenter`]. All three are
//! transport-agnostic: a Discord adapter, a test harness and a CLI all plug
//! in the same way.

use std::time::Duration;

use async_trait::async_trait;
use dropfour_types::{
    ChallengeView, DecisionEvent, MoveEvent, PlayerId, Result, SessionView, StopReason,
};
use tokio::{
    sync::{Mutex, mpsc},
    time::{Instant, timeout_at},
};

/// Outbound side of the chat platform.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Publish a new state of the session. Returns once the platform
    /// acknowledged the update.
    async fn present(&self, view: &SessionView) -> Result<()>;

    /// Informational message visible to `recipient` only.
    async fn notice(&self, recipient: PlayerId, text: &str) -> Result<()>;

    /// Error message visible to `recipient` only.
    async fn error(&self, recipient: PlayerId, text: &str) -> Result<()>;

    /// Show the accept/decline choice to the challenged player.
    async fn challenge(&self, challenge: &ChallengeView) -> Result<()>;
}

/// Stream of column picks for one session.
#[async_trait]
pub trait MoveSource: Send {
    /// Next move, or `None` once the stream is closed.
    async fn next(&mut self) -> Option<MoveEvent>;

    /// Stop delivering events. Called once when the session terminates.
    async fn stop(&mut self, reason: StopReason);
}

/// Stream of accept/decline presses for one challenge.
#[async_trait]
pub trait DecisionSource: Send {
    async fn next(&mut self) -> Option<DecisionEvent>;
}

/// Send a notice, logging instead of failing if the platform refuses it.
pub(crate) async fn deliver_notice(presenter: &dyn Presenter, recipient: PlayerId, text: &str) {
    if let Err(err) = presenter.notice(recipient, text).await {
        tracing::warn!(recipient = %recipient, error = %err, "Notice not delivered");
    }
}

/// Send an error message, logging instead of failing if the platform
/// refuses it.
pub(crate) async fn deliver_error(presenter: &dyn Presenter, recipient: PlayerId, text: &str) {
    if let Err(err) = presenter.error(recipient, text).await {
        tracing::warn!(recipient = %recipient, error = %err, "Error message not delivered");
    }
}

/// [`deliver_notice`] bounded by `deadline`. False if the deadline passed
/// before the platform answered.
pub(crate) async fn deliver_notice_until(
    presenter: &dyn Presenter,
    recipient: PlayerId,
    text: &str,
    deadline: Instant,
) -> bool {
    let delivered = timeout_at(deadline, deliver_notice(presenter, recipient, text))
        .await
        .is_ok();
    if !delivered {
        tracing::debug!(recipient = %recipient, "Notice abandoned at deadline");
    }
    delivered
}

// ---- Channel-backed sources ----

/// [`MoveSource`] fed through a tokio mpsc channel.
#[derive(Debug)]
pub struct ChannelMoveSource {
    rx: mpsc::Receiver<MoveEvent>,
    stopped: Option<StopReason>,
}

impl ChannelMoveSource {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<MoveEvent>) -> Self {
        Self { rx, stopped: None }
    }

    /// A bounded channel and the source reading from it.
    #[must_use]
    pub fn channel(buffer: usize) -> (mpsc::Sender<MoveEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }

    /// The reason the source was stopped with, if it was.
    #[must_use]
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }
}

#[async_trait]
impl MoveSource for ChannelMoveSource {
    async fn next(&mut self) -> Option<MoveEvent> {
        if self.stopped.is_some() {
            return None;
        }
        self.rx.recv().await
    }

    async fn stop(&mut self, reason: StopReason) {
        self.stopped = Some(reason);
        self.rx.close();
    }
}

/// [`DecisionSource`] fed through a tokio mpsc channel.
#[derive(Debug)]
pub struct ChannelDecisionSource {
    rx: mpsc::Receiver<DecisionEvent>,
}

impl ChannelDecisionSource {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<DecisionEvent>) -> Self {
        Self { rx }
    }

    #[must_use]
    pub fn channel(buffer: usize) -> (mpsc::Sender<DecisionEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl DecisionSource for ChannelDecisionSource {
    async fn next(&mut self) -> Option<DecisionEvent> {
        self.rx.recv().await
    }
}

// ---- In-memory presenter ----

/// One delivery recorded by [`MemoryPresenter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    View(SessionView),
    Notice { recipient: PlayerId, text: String },
    Error { recipient: PlayerId, text: String },
    Challenge(ChallengeView),
}

/// [`Presenter`] that keeps every delivery in memory.
///
/// Optionally waits `ack_delay` before acknowledging a view, or
/// `message_delay` before acknowledging a notice or error, to stand in for
/// a slow platform.
#[derive(Debug, Default)]
pub struct MemoryPresenter {
    deliveries: Mutex<Vec<Delivery>>,
    ack_delay: Option<Duration>,
    message_delay: Option<Duration>,
}

impl MemoryPresenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ack_delay(delay: Duration) -> Self {
        Self {
            ack_delay: Some(delay),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_message_delay(delay: Duration) -> Self {
        Self {
            message_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Everything delivered so far, oldest first.
    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().await.clone()
    }

    /// Views presented so far.
    pub async fn views(&self) -> Vec<SessionView> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::View(view) => Some(view.clone()),
                _ => None,
            })
            .collect()
    }

    /// Notice and error texts addressed to `recipient`.
    pub async fn messages_for(&self, recipient: PlayerId) -> Vec<String> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::Notice { recipient: r, text } | Delivery::Error { recipient: r, text }
                    if *r == recipient =>
                {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Notice texts addressed to `recipient`.
    pub async fn notices_for(&self, recipient: PlayerId) -> Vec<String> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::Notice { recipient: r, text } if *r == recipient => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Error texts addressed to `recipient`.
    pub async fn errors_for(&self, recipient: PlayerId) -> Vec<String> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::Error { recipient: r, text } if *r == recipient => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Challenges shown so far.
    pub async fn challenges(&self) -> Vec<ChallengeView> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::Challenge(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Presenter for MemoryPresenter {
    async fn present(&self, view: &SessionView) -> Result<()> {
        self.deliveries.lock().await.push(Delivery::View(view.clone()));
        if let Some(delay) = self.ack_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn notice(&self, recipient: PlayerId, text: &str) -> Result<()> {
        self.deliveries.lock().await.push(Delivery::Notice {
            recipient,
            text: text.to_string(),
        });
        if let Some(delay) = self.message_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn error(&self, recipient: PlayerId, text: &str) -> Result<()> {
        self.deliveries.lock().await.push(Delivery::Error {
            recipient,
            text: text.to_string(),
        });
        if let Some(delay) = self.message_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn challenge(&self, challenge: &ChallengeView) -> Result<()> {
        self.deliveries
            .lock()
            .await
            .push(Delivery::Challenge(challenge.clone()));
        Ok(())
    }
}
