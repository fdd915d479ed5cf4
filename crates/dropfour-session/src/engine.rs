//! The game engine, from a start request to a settled session.
//!
//! One call to [`GameEngine::start`] drives one session to completion:
//!
//! ```text
//! validate ─▶ negotiate (wager > 0) ─▶ play ─▶ stop moves ─▶ settle ─▶ final view
//! ```
//!
//! Events are handled one at a time. The driver awaits a single move,
//! applies it, waits for the presentation ack (or the rejection notice) and
//! only then asks for the next move. The inactivity deadline races every
//! one of those waits, so a stuck platform cannot keep a session alive.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use dropfour_escrow::{EscrowAdapter, Ledger, ReconcileReport, SettlementReceipt};
use dropfour_types::{
    DropfourError, EngineConfig, EscrowState, Outcome, Player, Result, SessionId, SessionView,
    constants,
};
use tokio::time::{Instant, sleep_until};

use crate::{
    collaborators::{DecisionSource, MoveSource, Presenter, deliver_error, deliver_notice_until},
    negotiation::{ChallengeOutcome, Negotiator},
    session::{Applied, Session},
    settlement::{SettlementFailure, Settler},
    stats::StatsRecorder,
};

/// A request to start a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    /// Moves first.
    pub proposer: Player,
    pub opponent: Player,
    /// Per-player stake, 0 for a friendly game.
    pub wager: u64,
}

impl StartRequest {
    #[must_use]
    pub fn new(proposer: Player, opponent: Player, wager: u64) -> Self {
        Self {
            proposer,
            opponent,
            wager,
        }
    }

    /// Reject games against bots and against oneself.
    pub fn validate(&self) -> Result<()> {
        if self.opponent.automated {
            return Err(DropfourError::AutomatedOpponent);
        }
        if self.opponent.id == self.proposer.id {
            return Err(DropfourError::SelfChallenge);
        }
        Ok(())
    }
}

/// Everything known about a session once it is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSummary {
    pub session_id: SessionId,
    pub first: Player,
    pub second: Player,
    pub outcome: Outcome,
    pub wager: u64,
    pub moves: usize,
    /// Final view, as presented.
    pub view: SessionView,
    pub escrow: EscrowState,
    /// Amount credited back by settlement.
    pub credited: u64,
    pub receipt: Option<SettlementReceipt>,
    /// Empty when settlement went through cleanly.
    pub failures: Vec<SettlementFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// How a start request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEnd {
    /// The game was played to a terminal outcome.
    Finished(Box<TerminalSummary>),
    /// The opponent declined the challenge.
    Declined,
    /// The opponent did not answer the challenge in time.
    TimedOut,
}

impl GameEnd {
    #[must_use]
    pub fn summary(&self) -> Option<&TerminalSummary> {
        match self {
            Self::Finished(summary) => Some(summary.as_ref()),
            Self::Declined | Self::TimedOut => None,
        }
    }
}

enum Tick<T> {
    Event(Option<T>),
    Deadline,
}

/// Removes a session from the live set when dropped, including when the
/// driving future is cancelled.
struct LiveGuard<'a> {
    live: &'a Mutex<HashSet<SessionId>>,
    id: SessionId,
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Runs sessions against shared collaborators.
///
/// Cheap to share behind an `Arc`; each session runs in whichever task
/// calls [`GameEngine::start`].
pub struct GameEngine {
    config: EngineConfig,
    escrow: EscrowAdapter,
    stats: Arc<dyn StatsRecorder>,
    presenter: Arc<dyn Presenter>,
    live: Mutex<HashSet<SessionId>>,
}

impl GameEngine {
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn Ledger>,
        stats: Arc<dyn StatsRecorder>,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            decision_timeout_secs = config.decision_timeout_secs,
            inactivity_timeout_secs = config.inactivity_timeout_secs,
            refund_on_expiry = config.refund_on_expiry,
            "Engine ready"
        );
        Ok(Self {
            escrow: EscrowAdapter::new(ledger, config.journal_archive_size),
            config,
            stats,
            presenter,
            live: Mutex::new(HashSet::new()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn escrow(&self) -> &EscrowAdapter {
        &self.escrow
    }

    /// Sessions currently negotiating or in play.
    #[must_use]
    pub fn live_sessions(&self) -> HashSet<SessionId> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return every stake still held by a session that is no longer live.
    pub async fn reconcile(&self) -> ReconcileReport {
        let live = self.live_sessions();
        self.escrow.reconcile(&live).await
    }

    /// Run one game from request to settlement.
    ///
    /// # Errors
    /// - `AutomatedOpponent` / `SelfChallenge` for invalid requests
    /// - `InsufficientFunds` or a reservation error from negotiation
    /// - the presenter's error if the challenge could not be shown
    ///
    /// Each of these is also reported to the players concerned. Failures
    /// after the game started never surface here; they are in
    /// [`TerminalSummary::failures`].
    pub async fn start<D, M>(
        &self,
        request: StartRequest,
        decisions: &mut D,
        moves: &mut M,
    ) -> Result<GameEnd>
    where
        D: DecisionSource + ?Sized,
        M: MoveSource + ?Sized,
    {
        if let Err(err) = request.validate() {
            tracing::warn!(
                proposer = %request.proposer.id,
                opponent = %request.opponent.id,
                error = %err,
                "Start request rejected"
            );
            deliver_error(self.presenter.as_ref(), request.proposer.id, &err.to_string()).await;
            return Err(err);
        }

        let id = SessionId::new();
        let _live = self.track(id);

        let escrow = if request.wager == 0 {
            EscrowState::NotApplicable
        } else {
            let negotiator = Negotiator::new(
                &self.escrow,
                self.presenter.as_ref(),
                self.config.decision_timeout(),
            );
            match negotiator
                .negotiate(id, &request.proposer, &request.opponent, request.wager, decisions)
                .await?
            {
                ChallengeOutcome::Accepted(reservation) => reservation.state(),
                ChallengeOutcome::Declined => return Ok(GameEnd::Declined),
                ChallengeOutcome::TimedOut => return Ok(GameEnd::TimedOut),
            }
        };

        let StartRequest {
            proposer,
            opponent,
            wager,
        } = request;
        let mut session = Session::new(id, proposer, opponent, wager, escrow);
        tracing::info!(
            session = %id,
            first = %session.first().id,
            second = %session.second().id,
            wager,
            pot = escrow.pot(),
            "Session started"
        );

        let outcome = self.play(&mut session, moves).await;
        moves.stop(outcome.stop_reason()).await;

        let report = Settler::new(
            self.stats.as_ref(),
            &self.escrow,
            self.presenter.as_ref(),
            &self.config.game_tag,
            self.config.refund_on_expiry,
        )
        .settle(&mut session)
        .await?;

        let view = session.view();
        if let Err(err) = self.presenter.present(&view).await {
            tracing::warn!(session = %id, error = %err, "Final view not presented");
        }

        Ok(GameEnd::Finished(Box::new(TerminalSummary {
            session_id: id,
            first: session.first().clone(),
            second: session.second().clone(),
            outcome,
            wager,
            moves: session.moves(),
            view,
            escrow: session.escrow(),
            credited: report.credited,
            receipt: report.receipt,
            failures: report.failures,
            started_at: session.started_at(),
            finished_at: Utc::now(),
        })))
    }

    fn track(&self, id: SessionId) -> LiveGuard<'_> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        LiveGuard {
            live: &self.live,
            id,
        }
    }

    /// Consume moves until the session terminates or goes quiet.
    async fn play<M>(&self, session: &mut Session, moves: &mut M) -> Outcome
    where
        M: MoveSource + ?Sized,
    {
        let inactivity = self.config.inactivity_timeout();
        let mut deadline = Instant::now() + inactivity;
        if !self.present_until(session, deadline).await {
            return expire(session);
        }

        loop {
            let tick = tokio::select! {
                event = moves.next() => Tick::Event(event),
                () = sleep_until(deadline) => Tick::Deadline,
            };
            let event = match tick {
                Tick::Event(Some(event)) => event,
                Tick::Event(None) => {
                    tracing::info!(session = %session.id(), "Move stream closed");
                    return expire(session);
                }
                Tick::Deadline => return expire(session),
            };

            match session.apply(&event) {
                Ok(Applied::Placed { row, column, next }) => {
                    tracing::debug!(
                        session = %session.id(),
                        player = %event.actor,
                        row,
                        column,
                        next = %next,
                        "Move applied"
                    );
                    deadline = Instant::now() + inactivity;
                    if !self.present_until(session, deadline).await {
                        return expire(session);
                    }
                }
                Ok(Applied::Finished(outcome)) => {
                    tracing::info!(
                        session = %session.id(),
                        outcome = %outcome,
                        moves = session.moves(),
                        "Session terminated"
                    );
                    return outcome;
                }
                Err(err) => {
                    if err.is_user_error() {
                        tracing::debug!(
                            session = %session.id(),
                            player = %event.actor,
                            column = event.column,
                            error = %err,
                            "Move rejected"
                        );
                    } else {
                        tracing::warn!(session = %session.id(), error = %err, "Move failed");
                    }
                    let text = err.to_string();
                    let delivered =
                        deliver_notice_until(self.presenter.as_ref(), event.actor, &text, deadline)
                            .await;
                    if !delivered {
                        return expire(session);
                    }
                }
            }
        }
    }

    /// Present the current view. False if the deadline passed first.
    async fn present_until(&self, session: &Session, deadline: Instant) -> bool {
        let view = session.view();
        tokio::select! {
            result = self.presenter.present(&view) => {
                if let Err(err) = result {
                    tracing::warn!(session = %session.id(), error = %err, "View not presented");
                }
                true
            }
            () = sleep_until(deadline) => false,
        }
    }
}

fn expire(session: &mut Session) -> Outcome {
    tracing::info!(
        session = %session.id(),
        moves = session.moves(),
        "Session expired"
    );
    session.expire()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dropfour_escrow::MemoryLedger;
    use dropfour_types::{MoveEvent, PlayerId, StopReason};

    use super::*;
    use crate::{
        collaborators::{ChannelDecisionSource, ChannelMoveSource, MemoryPresenter},
        stats::StatsBook,
    };

    struct Fixture {
        engine: GameEngine,
        ledger: Arc<MemoryLedger>,
        presenter: Arc<MemoryPresenter>,
    }

    fn fixture_with(presenter: MemoryPresenter) -> Fixture {
        let ledger = Arc::new(MemoryLedger::new(100));
        let presenter = Arc::new(presenter);
        let engine = GameEngine::new(
            EngineConfig::default(),
            ledger.clone(),
            Arc::new(StatsBook::new()),
            presenter.clone(),
        )
        .unwrap();
        Fixture {
            engine,
            ledger,
            presenter,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryPresenter::new())
    }

    #[tokio::test]
    async fn bot_opponent_rejected() {
        let f = fixture();
        let alice = Player::dummy("Alice");
        let robot = Player::automated(PlayerId::new(), "Robot");
        let (_dtx, mut decisions) = ChannelDecisionSource::channel(1);
        let (_mtx, mut moves) = ChannelMoveSource::channel(1);

        let err = f
            .engine
            .start(StartRequest::new(alice.clone(), robot, 0), &mut decisions, &mut moves)
            .await
            .unwrap_err();

        assert!(matches!(err, DropfourError::AutomatedOpponent));
        assert_eq!(f.presenter.errors_for(alice.id).await.len(), 1);
        assert!(f.presenter.views().await.is_empty());
    }

    #[tokio::test]
    async fn self_challenge_rejected() {
        let f = fixture();
        let alice = Player::dummy("Alice");
        let (_dtx, mut decisions) = ChannelDecisionSource::channel(1);
        let (_mtx, mut moves) = ChannelMoveSource::channel(1);

        let err = f
            .engine
            .start(StartRequest::new(alice.clone(), alice, 10), &mut decisions, &mut moves)
            .await
            .unwrap_err();

        assert!(matches!(err, DropfourError::SelfChallenge));
        assert!(f.presenter.challenges().await.is_empty());
    }

    #[tokio::test]
    async fn unwagered_game_skips_negotiation() {
        let f = fixture();
        let alice = Player::dummy("Alice");
        let bob = Player::dummy("Bob");
        let (_dtx, mut decisions) = ChannelDecisionSource::channel(1);
        let (tx, mut moves) = ChannelMoveSource::channel(16);
        for (actor, column) in [(&alice, 0), (&bob, 1), (&alice, 0), (&bob, 1), (&alice, 0), (&bob, 1), (&alice, 0)] {
            tx.send(MoveEvent::new(actor.id, column)).await.unwrap();
        }

        let end = f
            .engine
            .start(StartRequest::new(alice.clone(), bob.clone(), 0), &mut decisions, &mut moves)
            .await
            .unwrap();

        let summary = end.summary().unwrap();
        assert_eq!(
            summary.outcome,
            Outcome::Win {
                winner: alice.id,
                loser: bob.id
            }
        );
        assert_eq!(summary.moves, 7);
        assert_eq!(summary.escrow, EscrowState::NotApplicable);
        assert!(!summary.view.selector_enabled);
        assert!(f.presenter.challenges().await.is_empty());
        assert_eq!(moves.stop_reason(), Some(StopReason::Win));
        assert!(f.engine.live_sessions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_presentation_cannot_outlive_the_deadline() {
        let f = fixture_with(MemoryPresenter::with_ack_delay(Duration::from_secs(3600)));
        let alice = Player::dummy("Alice");
        let bob = Player::dummy("Bob");
        let (_dtx, mut decisions) = ChannelDecisionSource::channel(1);
        let (_tx, mut moves) = ChannelMoveSource::channel(1);

        let started = Instant::now();
        let end = f
            .engine
            .start(StartRequest::new(alice, bob, 0), &mut decisions, &mut moves)
            .await
            .unwrap();

        assert_eq!(end.summary().unwrap().outcome, Outcome::Expired);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(600));
        assert!(waited < Duration::from_secs(3600 + 600 + 1));
        assert_eq!(moves.stop_reason(), Some(StopReason::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_rejection_notice_cannot_outlive_the_deadline() {
        let f = fixture_with(MemoryPresenter::with_message_delay(Duration::from_secs(3600)));
        let alice = Player::dummy("Alice");
        let bob = Player::dummy("Bob");
        let (_dtx, mut decisions) = ChannelDecisionSource::channel(1);
        let (tx, mut moves) = ChannelMoveSource::channel(4);
        tx.send(MoveEvent::new(bob.id, 3)).await.unwrap();

        let started = Instant::now();
        let end = f
            .engine
            .start(StartRequest::new(alice, bob.clone(), 0), &mut decisions, &mut moves)
            .await
            .unwrap();

        assert_eq!(end.summary().unwrap().outcome, Outcome::Expired);
        assert!(started.elapsed() < Duration::from_secs(601));
        let to_bob = f.presenter.notices_for(bob.id).await;
        assert!(to_bob[0].starts_with("DF_ERR_101"));
        assert!(f.presenter.errors_for(bob.id).await.is_empty());
    }

    #[tokio::test]
    async fn closed_move_stream_expires_and_refunds() {
        let f = fixture();
        let alice = Player::dummy("Alice");
        let bob = Player::dummy("Bob");
        let (dtx, mut decisions) = ChannelDecisionSource::channel(1);
        dtx.send(dropfour_types::DecisionEvent::accept(bob.id)).await.unwrap();
        let (tx, mut moves) = ChannelMoveSource::channel(1);
        drop(tx);

        let end = f
            .engine
            .start(StartRequest::new(alice.clone(), bob.clone(), 40), &mut decisions, &mut moves)
            .await
            .unwrap();

        let summary = end.summary().unwrap();
        assert_eq!(summary.outcome, Outcome::Expired);
        assert_eq!(summary.credited, 80);
        assert_eq!(summary.escrow, EscrowState::Settled);
        assert_eq!(f.ledger.balance(alice.id).await.unwrap(), 100);
        assert_eq!(f.ledger.balance(bob.id).await.unwrap(), 100);
        assert!(f.engine.reconcile().await.sessions.is_empty());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = EngineConfig {
            decision_timeout_secs: 0,
            ..EngineConfig::default()
        };
        let result = GameEngine::new(
            config,
            Arc::new(MemoryLedger::default()),
            Arc::new(StatsBook::new()),
            Arc::new(MemoryPresenter::new()),
        );
        assert!(matches!(result, Err(DropfourError::Configuration(_))));
    }
}
