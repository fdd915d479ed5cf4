//! Challenge negotiation for wagered games.
//!
//! ```text
//! Proposed ──accept──▶ Accepted (stakes reserved)
//!    │ └────decline──▶ Declined
//!    └──no answer────▶ TimedOut
//! ```
//!
//! No funds move unless the challenged player accepts.

use std::time::Duration;

use dropfour_escrow::{EscrowAdapter, Reservation};
use dropfour_types::{ChallengeView, Decision, DropfourError, Player, Result, SessionId};
use tokio::time::{Instant, timeout_at};

use crate::collaborators::{
    DecisionSource, Presenter, deliver_error, deliver_notice, deliver_notice_until,
};

/// How a challenge ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// The opponent accepted and both stakes are held.
    Accepted(Reservation),
    /// The opponent declined.
    Declined,
    /// No decision arrived before the deadline.
    TimedOut,
}

/// Runs the accept/decline handshake.
pub struct Negotiator<'a> {
    escrow: &'a EscrowAdapter,
    presenter: &'a dyn Presenter,
    timeout: Duration,
}

impl<'a> Negotiator<'a> {
    #[must_use]
    pub fn new(escrow: &'a EscrowAdapter, presenter: &'a dyn Presenter, timeout: Duration) -> Self {
        Self {
            escrow,
            presenter,
            timeout,
        }
    }

    /// Propose a `wager` game from `proposer` to `opponent`.
    ///
    /// Both balances are checked before the opponent sees anything, the
    /// proposer's first. Decisions from anyone but the opponent are answered
    /// with a notice and ignored; the deadline does not move and also bounds
    /// those notices.
    ///
    /// # Errors
    /// - `InsufficientFunds` if either player cannot cover the wager
    /// - any reservation error after acceptance (both players are told)
    /// - the presenter's error if the challenge could not be shown (the
    ///   proposer is told)
    pub async fn negotiate<D>(
        &self,
        session: SessionId,
        proposer: &Player,
        opponent: &Player,
        wager: u64,
        decisions: &mut D,
    ) -> Result<ChallengeOutcome>
    where
        D: DecisionSource + ?Sized,
    {
        debug_assert!(wager > 0, "negotiation entered for an unwagered game");

        for player in [proposer, opponent] {
            if let Err(err) = self.escrow.check_funds(player.id, wager).await {
                let text = if let DropfourError::InsufficientFunds { available, .. } = &err {
                    if player.id == proposer.id {
                        format!("You cannot cover a wager of {wager} (balance: {available}).")
                    } else {
                        format!("{player} cannot cover a wager of {wager}.")
                    }
                } else {
                    "Balances are unavailable right now, try again later.".to_string()
                };
                tracing::info!(
                    session = %session,
                    player = %player.id,
                    wager,
                    error = %err,
                    "Challenge refused before proposal"
                );
                deliver_error(self.presenter, proposer.id, &text).await;
                return Err(err);
            }
        }

        let shown = self
            .presenter
            .challenge(&ChallengeView {
                proposer: proposer.clone(),
                opponent: opponent.clone(),
                wager,
                expires_in_secs: self.timeout.as_secs(),
            })
            .await;
        if let Err(err) = shown {
            tracing::warn!(session = %session, error = %err, "Challenge not shown");
            deliver_error(
                self.presenter,
                proposer.id,
                &format!("The challenge to {opponent} could not be shown, try again later."),
            )
            .await;
            return Err(err);
        }
        tracing::info!(
            session = %session,
            proposer = %proposer.id,
            opponent = %opponent.id,
            wager,
            "Challenge proposed"
        );

        let deadline = Instant::now() + self.timeout;
        let decision = loop {
            match timeout_at(deadline, decisions.next()).await {
                Ok(Some(event)) if event.actor != opponent.id => {
                    tracing::debug!(session = %session, actor = %event.actor, "Decision from outsider ignored");
                    let text = DropfourError::NotChallenged(event.actor).to_string();
                    if !deliver_notice_until(self.presenter, event.actor, &text, deadline).await {
                        break None;
                    }
                }
                Ok(Some(event)) => break Some(event.decision),
                Ok(None) | Err(_) => break None,
            }
        };

        match decision {
            None => {
                tracing::info!(session = %session, "Challenge timed out");
                deliver_notice(
                    self.presenter,
                    proposer.id,
                    &format!("{opponent} did not answer in time. The challenge is cancelled."),
                )
                .await;
                Ok(ChallengeOutcome::TimedOut)
            }
            Some(Decision::Decline) => {
                tracing::info!(session = %session, "Challenge declined");
                let text = format!("{opponent} declined the challenge.");
                deliver_notice(self.presenter, proposer.id, &text).await;
                deliver_notice(self.presenter, opponent.id, &text).await;
                Ok(ChallengeOutcome::Declined)
            }
            Some(Decision::Accept) => {
                match self
                    .escrow
                    .reserve(session, proposer.id, opponent.id, wager)
                    .await
                {
                    Ok(reservation) => {
                        tracing::info!(session = %session, wager, "Challenge accepted");
                        Ok(ChallengeOutcome::Accepted(reservation))
                    }
                    Err(err) => {
                        tracing::warn!(
                            session = %session,
                            wager,
                            error = %err,
                            "Reservation failed after acceptance"
                        );
                        let text = format!("The game could not start: {err}");
                        deliver_error(self.presenter, proposer.id, &text).await;
                        deliver_error(self.presenter, opponent.id, &text).await;
                        Err(err)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dropfour_escrow::{Ledger, MemoryLedger};
    use dropfour_types::{DecisionEvent, PlayerId};

    use super::*;
    use crate::collaborators::{ChannelDecisionSource, Delivery, MemoryPresenter};

    const TIMEOUT: Duration = Duration::from_secs(120);

    /// Records everything but cannot show challenges.
    struct Unreachable(MemoryPresenter);

    #[async_trait::async_trait]
    impl Presenter for Unreachable {
        async fn present(&self, view: &dropfour_types::SessionView) -> Result<()> {
            self.0.present(view).await
        }

        async fn notice(&self, recipient: PlayerId, text: &str) -> Result<()> {
            self.0.notice(recipient, text).await
        }

        async fn error(&self, recipient: PlayerId, text: &str) -> Result<()> {
            self.0.error(recipient, text).await
        }

        async fn challenge(&self, _challenge: &ChallengeView) -> Result<()> {
            Err(DropfourError::PresentationFailed {
                reason: "channel gone".into(),
            })
        }
    }

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        escrow: EscrowAdapter,
        presenter: MemoryPresenter,
        alice: Player,
        bob: Player,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(MemoryLedger::new(100));
        Fixture {
            escrow: EscrowAdapter::new(ledger.clone(), 16),
            ledger,
            presenter: MemoryPresenter::new(),
            alice: Player::dummy("Alice"),
            bob: Player::dummy("Bob"),
        }
    }

    #[tokio::test]
    async fn accept_reserves_both_stakes() {
        let f = fixture();
        let (tx, mut decisions) = ChannelDecisionSource::channel(4);
        tx.send(DecisionEvent::accept(f.bob.id)).await.unwrap();

        let negotiator = Negotiator::new(&f.escrow, &f.presenter, TIMEOUT);
        let outcome = negotiator
            .negotiate(SessionId::new(), &f.alice, &f.bob, 50, &mut decisions)
            .await
            .unwrap();

        assert!(matches!(outcome, ChallengeOutcome::Accepted(r) if r.per_player == 50));
        assert_eq!(f.ledger.balance(f.alice.id).await.unwrap(), 50);
        assert_eq!(f.ledger.balance(f.bob.id).await.unwrap(), 50);
        let challenges = f.presenter.challenges().await;
        assert_eq!(challenges.len(), 1);
        assert_eq!(challenges[0].opponent, f.bob);
        assert_eq!(challenges[0].expires_in_secs, 120);
    }

    #[tokio::test]
    async fn decline_moves_no_funds() {
        let f = fixture();
        let (tx, mut decisions) = ChannelDecisionSource::channel(4);
        tx.send(DecisionEvent::decline(f.bob.id)).await.unwrap();

        let outcome = Negotiator::new(&f.escrow, &f.presenter, TIMEOUT)
            .negotiate(SessionId::new(), &f.alice, &f.bob, 50, &mut decisions)
            .await
            .unwrap();

        assert_eq!(outcome, ChallengeOutcome::Declined);
        assert_eq!(f.ledger.balance(f.alice.id).await.unwrap(), 100);
        assert_eq!(f.ledger.balance(f.bob.id).await.unwrap(), 100);
        assert_eq!(f.presenter.messages_for(f.alice.id).await.len(), 1);
        assert_eq!(f.presenter.messages_for(f.bob.id).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out() {
        let f = fixture();
        let (_tx, mut decisions) = ChannelDecisionSource::channel(4);

        let started = Instant::now();
        let outcome = Negotiator::new(&f.escrow, &f.presenter, TIMEOUT)
            .negotiate(SessionId::new(), &f.alice, &f.bob, 50, &mut decisions)
            .await
            .unwrap();

        assert_eq!(outcome, ChallengeOutcome::TimedOut);
        assert!(started.elapsed() >= TIMEOUT);
        assert_eq!(f.ledger.balance(f.alice.id).await.unwrap(), 100);
        let to_alice = f.presenter.messages_for(f.alice.id).await;
        assert!(to_alice[0].contains("did not answer"));
    }

    #[tokio::test]
    async fn closed_decision_stream_times_out() {
        let f = fixture();
        let (tx, mut decisions) = ChannelDecisionSource::channel(1);
        drop(tx);
        let outcome = Negotiator::new(&f.escrow, &f.presenter, TIMEOUT)
            .negotiate(SessionId::new(), &f.alice, &f.bob, 10, &mut decisions)
            .await
            .unwrap();
        assert_eq!(outcome, ChallengeOutcome::TimedOut);
    }

    #[tokio::test]
    async fn outsiders_are_told_and_ignored() {
        let f = fixture();
        let outsider = PlayerId::new();
        let (tx, mut decisions) = ChannelDecisionSource::channel(4);
        tx.send(DecisionEvent::accept(outsider)).await.unwrap();
        tx.send(DecisionEvent::accept(f.alice.id)).await.unwrap();
        tx.send(DecisionEvent::decline(f.bob.id)).await.unwrap();

        let outcome = Negotiator::new(&f.escrow, &f.presenter, TIMEOUT)
            .negotiate(SessionId::new(), &f.alice, &f.bob, 50, &mut decisions)
            .await
            .unwrap();

        assert_eq!(outcome, ChallengeOutcome::Declined);
        assert_eq!(f.presenter.messages_for(outsider).await.len(), 1);
        assert!(f.presenter.messages_for(outsider).await[0].starts_with("DF_ERR_402"));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_outsider_notice_cannot_outlive_the_deadline() {
        let ledger = Arc::new(MemoryLedger::new(100));
        let escrow = EscrowAdapter::new(ledger.clone(), 16);
        let presenter = MemoryPresenter::with_message_delay(Duration::from_secs(3600));
        let (alice, bob) = (Player::dummy("Alice"), Player::dummy("Bob"));
        let outsider = PlayerId::new();
        let (tx, mut decisions) = ChannelDecisionSource::channel(4);
        tx.send(DecisionEvent::accept(outsider)).await.unwrap();
        tx.send(DecisionEvent::accept(bob.id)).await.unwrap();

        let started = Instant::now();
        let outcome = Negotiator::new(&escrow, &presenter, TIMEOUT)
            .negotiate(SessionId::new(), &alice, &bob, 50, &mut decisions)
            .await
            .unwrap();

        assert_eq!(outcome, ChallengeOutcome::TimedOut);
        assert!(started.elapsed() >= TIMEOUT);
        assert_eq!(ledger.balance(bob.id).await.unwrap(), 100);
        assert_eq!(escrow.open_books().await, 0);
    }

    #[tokio::test]
    async fn unshown_challenge_is_reported_to_proposer() {
        let f = fixture();
        let presenter = Unreachable(MemoryPresenter::new());
        let (_tx, mut decisions) = ChannelDecisionSource::channel(1);

        let err = Negotiator::new(&f.escrow, &presenter, TIMEOUT)
            .negotiate(SessionId::new(), &f.alice, &f.bob, 50, &mut decisions)
            .await
            .unwrap_err();

        assert!(matches!(err, DropfourError::PresentationFailed { .. }));
        let to_alice = presenter.0.errors_for(f.alice.id).await;
        assert_eq!(to_alice, vec!["The challenge to Bob could not be shown, try again later."]);
        assert!(presenter.0.messages_for(f.bob.id).await.is_empty());
        assert_eq!(f.ledger.balance(f.alice.id).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn proposer_funds_checked_before_anything_is_shown() {
        let f = fixture();
        f.ledger.set_balance(f.alice.id, 10).await;
        f.ledger.set_balance(f.bob.id, 10).await;
        let (_tx, mut decisions) = ChannelDecisionSource::channel(1);

        let err = Negotiator::new(&f.escrow, &f.presenter, TIMEOUT)
            .negotiate(SessionId::new(), &f.alice, &f.bob, 50, &mut decisions)
            .await
            .unwrap_err();

        assert!(matches!(err, DropfourError::InsufficientFunds { player, .. } if player == f.alice.id));
        let deliveries = f.presenter.deliveries().await;
        assert_eq!(deliveries.len(), 1);
        assert!(matches!(&deliveries[0], Delivery::Error { recipient, .. } if *recipient == f.alice.id));
    }

    #[tokio::test]
    async fn poor_opponent_reported_to_proposer_only() {
        let f = fixture();
        f.ledger.set_balance(f.bob.id, 20).await;
        let (_tx, mut decisions) = ChannelDecisionSource::channel(1);

        let err = Negotiator::new(&f.escrow, &f.presenter, TIMEOUT)
            .negotiate(SessionId::new(), &f.alice, &f.bob, 50, &mut decisions)
            .await
            .unwrap_err();

        assert!(matches!(err, DropfourError::InsufficientFunds { player, .. } if player == f.bob.id));
        assert!(f.presenter.challenges().await.is_empty());
        assert!(f.presenter.messages_for(f.bob.id).await.is_empty());
        assert_eq!(f.presenter.errors_for(f.alice.id).await, vec!["Bob cannot cover a wager of 50."]);
    }

    #[tokio::test]
    async fn reservation_failure_reaches_both_players() {
        let f = fixture();
        f.ledger.fail_adjustments_for(f.bob.id).await;
        let (tx, mut decisions) = ChannelDecisionSource::channel(4);
        tx.send(DecisionEvent::accept(f.bob.id)).await.unwrap();

        let err = Negotiator::new(&f.escrow, &f.presenter, TIMEOUT)
            .negotiate(SessionId::new(), &f.alice, &f.bob, 50, &mut decisions)
            .await
            .unwrap_err();

        assert!(matches!(err, DropfourError::LedgerUnavailable { .. }));
        assert_eq!(f.presenter.errors_for(f.alice.id).await.len(), 1);
        assert_eq!(f.presenter.errors_for(f.bob.id).await.len(), 1);
        assert_eq!(f.ledger.balance(f.alice.id).await.unwrap(), 100);
    }
}
