use serde::Serialize;

use crate::{Forum, error::Result, ranking::vote::VoteTarget};

/// A target whose denormalized counters disagree with its vote rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreDrift {
    pub target: VoteTarget,
    pub stored: (i32, i32, i32),
    /// `(score, upvotes, downvotes)` recounted from the vote rows.
    pub counted: (i32, i32, i32),
}

impl Forum {
    /// Recounts every post and comment score from the vote tables. With
    /// `repair`, drifted counters are overwritten with the recount.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_scores(&self, repair: bool) -> Result<Vec<ScoreDrift>> {
        let tallies = self.timed(self.store.vote_tallies()).await?;
        let checked = tallies.len();

        let drifts: Vec<ScoreDrift> = tallies
            .into_iter()
            .filter_map(|t| {
                let stored = (t.score, t.upvotes, t.downvotes);
                let counted = (t.counted_up - t.counted_down, t.counted_up, t.counted_down);
                (stored != counted).then_some(ScoreDrift {
                    target: t.target,
                    stored,
                    counted,
                })
            })
            .collect();

        for drift in &drifts {
            tracing::warn!(
                vote_target = %drift.target,
                stored = ?drift.stored,
                counted = ?drift.counted,
                "score drift"
            );
            if repair {
                // Recounted again under the target's lock; votes may have
                // landed since the tally was read.
                let repaired = self.timed(self.store.apply_score_repair(&drift.target)).await?;
                tracing::debug!(vote_target = %drift.target, ?repaired, "score repaired");
            }
        }

        tracing::info!(checked, drifted = drifts.len(), repair, "score reconciliation done");
        Ok(drifts)
    }
}
