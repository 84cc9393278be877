use serde_json::json;

use crate::{
    Forum,
    error::{Error, Result},
    notify::Audience,
    store::StoredComment,
};

use super::{CommentStatus, ModPower, ModeratorTier};

impl Forum {
    async fn comment_with_actor_power(
        &self,
        actor: &str,
        cid: &str,
    ) -> Result<(StoredComment, ModPower)> {
        let comment = self
            .timed(self.store.fetch_comment(cid))
            .await?
            .ok_or_else(|| Error::NotFound("Comment not found".into()))?;
        let post = self
            .timed(self.store.fetch_post(comment.pid))
            .await?
            .ok_or_else(|| Error::NotFound("Post not found".into()))?;

        let viewer = self.resolve_viewer(Some(actor), &post.sid).await?;
        Ok((comment, viewer.power))
    }

    /// Deletes a comment. Authors delete their own comments without a reason;
    /// moderators and admins remove other people's comments and must say why.
    #[tracing::instrument(skip(self))]
    pub async fn delete_comment(
        &self,
        actor: &str,
        cid: &str,
        reason: Option<&str>,
    ) -> Result<StoredComment> {
        let (mut comment, power) = self.comment_with_actor_power(actor, cid).await?;

        if comment.status != CommentStatus::Visible {
            return Err(Error::Forbidden("Comment is already deleted".into()));
        }

        let (status, deleted_by, reason) = if comment.author_id == actor {
            (CommentStatus::SelfDeleted, None, None)
        } else {
            let tier = match power {
                ModPower::Admin => ModeratorTier::Admin,
                ModPower::Mod(_) => ModeratorTier::Mod,
                ModPower::None => {
                    return Err(Error::Forbidden(
                        "You are not the owner of this comment".into(),
                    ));
                }
            };
            let reason = reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| Error::Invalid("A reason is required".into()))?;
            (CommentStatus::ModDeleted, Some(tier), Some(reason))
        };

        self.timed(
            self.store
                .set_comment_status(cid, status, deleted_by, reason),
        )
        .await?;

        tracing::debug!(?status, ?deleted_by, "comment deleted");

        comment.status = status;
        comment.deleted_by = deleted_by;
        comment.delete_reason = reason.map(Into::into);

        self.notifier.notify(
            "comment_deleted",
            json!({ "pid": comment.pid, "cid": comment.cid, "status": status }),
            Audience::User(comment.author_id.clone()),
        );

        Ok(comment)
    }

    /// Restores a deleted comment. Self-deleted comments can only be restored
    /// by admins; a comment removed by a moderator can be restored by any
    /// moderator, one removed by an admin only by an admin.
    #[tracing::instrument(skip(self))]
    pub async fn undelete_comment(&self, actor: &str, cid: &str) -> Result<StoredComment> {
        let (mut comment, power) = self.comment_with_actor_power(actor, cid).await?;

        let allowed = match (comment.status, comment.deleted_by) {
            (CommentStatus::Visible, _) => {
                return Err(Error::Forbidden("Comment is not deleted".into()));
            }
            (CommentStatus::SelfDeleted, _) | (_, Some(ModeratorTier::Admin)) => power.is_admin(),
            (CommentStatus::ModDeleted, _) => power.is_privileged(),
        };

        if !allowed {
            return Err(Error::Forbidden(
                "You can't restore this comment".into(),
            ));
        }

        self.timed(
            self.store
                .set_comment_status(cid, CommentStatus::Visible, None, None),
        )
        .await?;

        comment.status = CommentStatus::Visible;
        comment.deleted_by = None;
        comment.delete_reason = None;

        self.notifier.notify(
            "comment_undeleted",
            json!({ "pid": comment.pid, "cid": comment.cid }),
            Audience::User(comment.author_id.clone()),
        );

        Ok(comment)
    }
}
