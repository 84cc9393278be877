use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    Forum,
    error::{Error, Result},
    notify::Audience,
    store::{LOCK_COMMENTS_KEY, StoredComment},
};

use super::{Cid, CommentStatus, Pid};

#[derive(Debug, Clone, Deserialize)]
pub struct CommentSubmission {
    pub pid: Pid,
    pub parent_cid: Option<Cid>,
    pub content: String,
}

impl CommentSubmission {
    fn validate(&mut self, max_length: usize) -> std::result::Result<(), String> {
        self.content = checked_content(&self.content, max_length)?;
        Ok(())
    }
}

/// Trims `content` and checks it is neither empty nor longer than
/// `max_length` bytes.
pub(super) fn checked_content(
    content: &str,
    max_length: usize,
) -> std::result::Result<String, String> {
    let content = content.trim();
    if content.is_empty() {
        return Err("No content provided".into());
    }

    if content.len() > max_length {
        return Err(format!("Content too long (max {max_length} characters)"));
    }

    Ok(content.to_string())
}

impl Forum {
    /// Posts a new comment, or a reply when `parent_cid` is set.
    #[tracing::instrument(skip(self, submission), fields(pid = submission.pid))]
    pub async fn submit_comment(
        &self,
        author: &str,
        mut submission: CommentSubmission,
    ) -> Result<StoredComment> {
        submission
            .validate(self.config.max_comment_length)
            .map_err(Error::Invalid)?;

        let post = self
            .timed(self.store.fetch_post(submission.pid))
            .await?
            .filter(|p| !p.deleted)
            .ok_or_else(|| Error::NotFound("Post not found".into()))?;

        let now = Utc::now().naive_utc();
        if now - post.posted_at > self.config.archive_post_after {
            return Err(Error::Forbidden("Post is archived".into()));
        }

        let locked = self
            .timed(self.store.fetch_post_metadata(post.pid, LOCK_COMMENTS_KEY))
            .await?;
        if locked.as_deref() == Some("1") {
            return Err(Error::Forbidden("Comments are locked on this post".into()));
        }

        if self.timed(self.store.is_banned(author, &post.sid)).await? {
            return Err(Error::Forbidden("You are banned on this sub".into()));
        }

        if let Some(parent_cid) = &submission.parent_cid {
            let parent = self
                .timed(self.store.fetch_comment(parent_cid))
                .await?
                .ok_or_else(|| Error::NotFound("Parent comment not found".into()))?;

            if parent.pid != post.pid {
                return Err(Error::Invalid(
                    "You're replying to a comment that does not belong to this post".into(),
                ));
            }

            if parent.status != CommentStatus::Visible {
                return Err(Error::Forbidden(
                    "You can't reply to a deleted comment".into(),
                ));
            }
        }

        let comment = StoredComment::new(
            uuid::Uuid::new_v4().to_string(),
            post.pid,
            submission.parent_cid.as_deref(),
            author,
            submission.content,
            now,
        );
        self.timed(self.store.insert_comment(&comment)).await?;
        self.cache.invalidate_post(post.pid).await;

        tracing::debug!(cid = %comment.cid, "comment created");

        self.notifier.notify(
            "comment_new",
            json!({
                "pid": post.pid,
                "cid": comment.cid,
                "parent_cid": comment.parent_cid,
            }),
            Audience::User(post.author_id.clone()),
        );

        Ok(comment)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_content_is_trimmed() {
        assert_eq!(checked_content("  hello \n", 10).unwrap(), "hello");
    }

    #[test]
    fn test_content_limits() {
        assert_eq!(checked_content(" \n\t", 10).unwrap_err(), "No content provided");
        assert!(checked_content("0123456789", 10).is_ok());
        assert!(checked_content("0123456789a", 10).is_err());
    }

    #[test]
    fn test_validate_rewrites_content() {
        let mut submission = CommentSubmission {
            pid: 1,
            parent_cid: None,
            content: "  text  ".into(),
        };
        submission.validate(100).unwrap();
        assert_eq!(submission.content, "text");
    }
}
