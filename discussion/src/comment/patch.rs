use chrono::Utc;

use crate::{
    Forum,
    error::{Error, Result},
    store::StoredComment,
};

use super::{CommentStatus, create::checked_content};

impl Forum {
    /// Replaces the content of `actor`'s own comment. The previous content is
    /// kept as an edit history snapshot.
    #[tracing::instrument(skip(self, content))]
    pub async fn edit_comment(
        &self,
        actor: &str,
        cid: &str,
        content: &str,
    ) -> Result<StoredComment> {
        let content =
            checked_content(content, self.config.max_comment_length).map_err(Error::Invalid)?;

        let mut comment = self
            .timed(self.store.fetch_comment(cid))
            .await?
            .ok_or_else(|| Error::NotFound("Comment not found".into()))?;

        if comment.author_id != actor {
            return Err(Error::Forbidden(
                "You are not the owner of this comment".into(),
            ));
        }

        if comment.status != CommentStatus::Visible {
            return Err(Error::Forbidden("You can't edit a deleted comment".into()));
        }

        let post = self
            .timed(self.store.fetch_post(comment.pid))
            .await?
            .ok_or_else(|| Error::NotFound("Post not found".into()))?;

        let now = Utc::now().naive_utc();
        if now - post.posted_at > self.config.archive_post_after {
            return Err(Error::Forbidden("Post is archived".into()));
        }

        self.timed(self.store.update_comment_content(cid, &content, now))
            .await?;

        comment.content = content;
        comment.last_edited_at = Some(now);
        Ok(comment)
    }
}
