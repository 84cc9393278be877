use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Forum,
    comment::{AccountStatus, Cid, Pid},
    error::{Error, Result},
    notify::Audience,
    store::VoteOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn from_positive(positive: bool) -> Self {
        if positive {
            VoteDirection::Up
        } else {
            VoteDirection::Down
        }
    }

    pub fn is_positive(self) -> bool {
        self == VoteDirection::Up
    }

    pub fn value(self) -> i32 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum VoteTarget {
    Post(Pid),
    Comment(Cid),
}

impl VoteTarget {
    fn noun(&self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "Post",
            VoteTarget::Comment(_) => "Comment",
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteTarget::Post(pid) => write!(f, "post/{pid}"),
            VoteTarget::Comment(cid) => write!(f, "comment/{cid}"),
        }
    }
}

/// What a vote request does given the voter's current vote on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// No previous vote: record one.
    Cast(VoteDirection),
    /// Same direction again: remove the vote.
    Retract(VoteDirection),
    /// Opposite direction: switch the recorded vote.
    Flip {
        from: VoteDirection,
        to: VoteDirection,
    },
}

impl VoteTransition {
    pub fn resolve(existing: Option<VoteDirection>, requested: VoteDirection) -> Self {
        match existing {
            None => VoteTransition::Cast(requested),
            Some(previous) if previous == requested => VoteTransition::Retract(previous),
            Some(previous) => VoteTransition::Flip {
                from: previous,
                to: requested,
            },
        }
    }

    /// Change to the target's score, the voter's given tally and the author's
    /// lifetime score.
    pub fn score_delta(self) -> i32 {
        match self {
            VoteTransition::Cast(d) => d.value(),
            VoteTransition::Retract(d) => -d.value(),
            VoteTransition::Flip { from, to } => to.value() - from.value(),
        }
    }

    pub fn upvote_delta(self) -> i32 {
        match self {
            VoteTransition::Cast(VoteDirection::Up) => 1,
            VoteTransition::Retract(VoteDirection::Up) => -1,
            VoteTransition::Flip { to, .. } => to.value(),
            _ => 0,
        }
    }

    pub fn downvote_delta(self) -> i32 {
        match self {
            VoteTransition::Cast(VoteDirection::Down) => 1,
            VoteTransition::Retract(VoteDirection::Down) => -1,
            VoteTransition::Flip { to, .. } => -to.value(),
            _ => 0,
        }
    }

    pub fn resulting(self) -> Option<VoteDirection> {
        match self {
            VoteTransition::Cast(d) => Some(d),
            VoteTransition::Retract(_) => None,
            VoteTransition::Flip { to, .. } => Some(to),
        }
    }
}

impl Forum {
    /// Casts, retracts or flips `voter`'s vote on `target`.
    ///
    /// Every precondition is checked before anything is written, and the vote
    /// row plus all counters change in one storage transaction. Identical
    /// requests arriving within the de-duplication window are rejected with
    /// [`Error::Conflict`].
    #[tracing::instrument(skip(self))]
    pub async fn cast_vote(
        &self,
        voter: &str,
        target: &VoteTarget,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let request_key = format!("{voter}:{target}:{direction:?}");
        if !self.dedup.claim(request_key.clone()).await {
            tracing::debug!(%request_key, "duplicate vote request collapsed");
            return Err(Error::Conflict(
                "This vote is already being processed".into(),
            ));
        }

        let result = self.cast_vote_unchecked(voter, target, direction).await;
        if result.is_err() {
            self.dedup.release(&request_key).await;
        }
        result
    }

    async fn cast_vote_unchecked(
        &self,
        voter: &str,
        target: &VoteTarget,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let info = self
            .timed(self.store.load_vote_target(target))
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} not found", target.noun())))?;

        if info.deleted {
            return Err(Error::Forbidden(format!(
                "{} was deleted",
                target.noun()
            )));
        }

        if self.timed(self.store.is_banned(voter, &info.sid)).await? {
            return Err(Error::Forbidden("You are banned on this sub".into()));
        }

        if Utc::now().naive_utc() - info.posted_at > self.config.archive_post_after {
            return Err(Error::Forbidden("Post is archived".into()));
        }

        if !self.config.allow_self_vote && info.author_id == voter {
            return Err(Error::Forbidden(
                "You can't vote on your own content".into(),
            ));
        }

        let user = self
            .timed(self.store.fetch_user(voter))
            .await?
            .ok_or_else(|| Error::NotFound("User not found".into()))?;

        if user.status != AccountStatus::Active {
            return Err(Error::Forbidden("Your account can't vote".into()));
        }

        if direction == VoteDirection::Down && user.given < 0 {
            let existing = self.timed(self.store.get_vote(voter, target)).await?;
            if existing != Some(VoteDirection::Down) {
                return Err(Error::Forbidden(
                    "Score balance is negative".into(),
                ));
            }
        }

        let outcome = self
            .timed(
                self.store
                    .commit_vote(voter, target, &info.author_id, direction),
            )
            .await?;

        tracing::debug!(
            vote_target = %target,
            previous = ?outcome.previous,
            current = ?outcome.current,
            score = outcome.score,
            "vote committed"
        );

        self.notifier.notify(
            "score",
            json!({
                "target": target,
                "score": outcome.score,
                "author_score": outcome.author_score,
            }),
            Audience::Users(vec![info.author_id.clone(), voter.to_string()]),
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use VoteDirection::{Down, Up};

    #[test]
    fn test_transitions() {
        assert_eq!(VoteTransition::resolve(None, Up), VoteTransition::Cast(Up));
        assert_eq!(VoteTransition::resolve(Some(Up), Up), VoteTransition::Retract(Up));
        assert_eq!(
            VoteTransition::resolve(Some(Up), Down),
            VoteTransition::Flip { from: Up, to: Down }
        );
    }

    #[test]
    fn test_deltas_keep_score_equal_to_up_minus_down() {
        let transitions = [
            VoteTransition::Cast(Up),
            VoteTransition::Cast(Down),
            VoteTransition::Retract(Up),
            VoteTransition::Retract(Down),
            VoteTransition::Flip { from: Up, to: Down },
            VoteTransition::Flip { from: Down, to: Up },
        ];
        for t in transitions {
            assert_eq!(
                t.score_delta(),
                t.upvote_delta() - t.downvote_delta(),
                "{t:?}"
            );
        }
        assert_eq!(VoteTransition::Flip { from: Up, to: Down }.score_delta(), -2);
        assert_eq!(VoteTransition::Flip { from: Down, to: Up }.score_delta(), 2);
    }

    #[test]
    fn test_toggle_is_idempotent() {
        let first = VoteTransition::resolve(None, Up);
        let second = VoteTransition::resolve(first.resulting(), Up);
        assert_eq!(second.resulting(), None);
        assert_eq!(first.score_delta() + second.score_delta(), 0);
    }

    #[test]
    fn test_target_display() {
        assert_eq!(VoteTarget::Post(3).to_string(), "post/3");
        assert_eq!(VoteTarget::Comment("abc".into()).to_string(), "comment/abc");
    }
}
