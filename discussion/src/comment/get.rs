use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::{
    Forum,
    error::{Error, Result},
    store::STICKY_COMMENT_KEY,
};

use super::{
    Cid, CommentEdge, CommentSort, Pid, RenderedEntry, Viewer,
    redact::redact,
    render::render_tree,
    tree::{self, TreeRequest},
    trim::{collect_cids, trim_tree},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentTreeQuery {
    pub pid: Pid,
    /// Show only the thread below this comment.
    pub root: Option<Cid>,
    /// With `root`, also show the comment it replies to.
    #[serde(default)]
    pub provide_context: bool,
    /// "Load more" after this sibling.
    pub continue_after: Option<Cid>,
    #[serde(default)]
    pub sort: CommentSort,
    #[serde(default)]
    pub include_history: bool,
}

impl CommentTreeQuery {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            ..Default::default()
        }
    }
}

impl Forum {
    /// Builds one page of a post's discussion as `viewer` is allowed to see
    /// it: nested, trimmed to the configured depth and breadth, redacted and
    /// rendered.
    ///
    /// A `root` that does not exist yields an empty page rather than an error.
    #[tracing::instrument(skip(self, viewer), fields(viewer = viewer.uid.as_deref()))]
    pub async fn get_comment_tree(
        &self,
        query: &CommentTreeQuery,
        viewer: &Viewer,
    ) -> Result<Vec<RenderedEntry>> {
        let post = self
            .timed(self.store.fetch_post(query.pid))
            .await?
            .ok_or_else(|| Error::NotFound("Post not found".into()))?;

        let edges = self.comment_edges(query.pid, query.sort).await?;
        let sticky = self
            .timed(self.store.fetch_post_metadata(query.pid, STICKY_COMMENT_KEY))
            .await?;

        let tree = tree::assemble(
            &edges,
            &TreeRequest {
                root: query.root.as_deref(),
                provide_context: query.provide_context,
                sticky: sticky.as_deref(),
                continuing: query.continue_after.is_some(),
            },
        );
        let skeleton = trim_tree(tree, &self.config.trim, query.continue_after.as_deref());

        let ids: HashSet<Cid> = collect_cids(&skeleton).into_iter().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let with_history = query.include_history && self.config.edit_history_enabled;
        let records = self.store.fetch_comment_records(&post.sid, &ids, viewer.uid.as_deref());
        let (records, mut history) = if with_history {
            let history = self.store.fetch_comment_history(&ids);
            self.timed(futures::future::try_join(records, history)).await?
        } else {
            (self.timed(records).await?, HashMap::new())
        };

        let mut redacted: HashMap<Cid, _> = records
            .into_iter()
            .map(|record| {
                let snapshots = history.remove(&record.cid).unwrap_or_default();
                let comment = redact(record, viewer, sticky.as_deref(), snapshots);
                (comment.cid.clone(), comment)
            })
            .collect();

        tracing::debug!(
            pid = query.pid,
            edges = edges.len(),
            shown = redacted.len(),
            "comment tree built"
        );

        Ok(render_tree(skeleton, &mut redacted))
    }

    async fn comment_edges(&self, pid: Pid, sort: CommentSort) -> Result<Vec<CommentEdge>> {
        if let Some(edges) = self.cache.get_edges(pid, sort).await {
            return Ok(edges);
        }

        tracing::debug!(pid, ?sort, "comment edge cache miss");
        let edges = self.timed(self.store.fetch_comment_edges(pid, sort)).await?;
        self.cache
            .put_edges(pid, sort, edges.clone(), self.config.comment_cache_ttl)
            .await;
        Ok(edges)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::{
        cache::RetainerCache,
        comment::{AccountStatus, CommentStatus, ModPower, Visibility},
        config::EngineConfig,
        notify::NullNotifier,
        store::{Post, Store, StoredComment, UserRecord, memory::MemoryStore},
    };

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, minute, 0)
            .unwrap()
    }

    async fn setup() -> (Arc<MemoryStore>, Forum) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_post(Post {
                pid: 1,
                sid: "rust".into(),
                author_id: "op".into(),
                title: "Borrow checker".into(),
                score: 0,
                upvotes: 0,
                downvotes: 0,
                deleted: false,
                posted_at: at(0),
                comments_count: 0,
            })
            .await;
        for uid in ["op", "alice", "bob"] {
            store
                .insert_user(UserRecord {
                    uid: uid.into(),
                    name: uid.to_uppercase(),
                    status: AccountStatus::Active,
                    score: 0,
                    given: 0,
                    is_admin: false,
                })
                .await;
        }
        let forum = Forum::new(
            store.clone(),
            Arc::new(RetainerCache::new()),
            Arc::new(NullNotifier),
            EngineConfig::default(),
        );
        (store, forum)
    }

    fn cids(entries: &[RenderedEntry]) -> Vec<&str> {
        entries
            .iter()
            .filter_map(|e| e.as_comment())
            .map(|c| c.cid.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_missing_post() {
        let (_, forum) = setup().await;
        let err = forum
            .get_comment_tree(&CommentTreeQuery::new(9), &Viewer::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sticky_and_rendering() {
        let (store, forum) = setup().await;
        store
            .seed_comment(StoredComment::new("a", 1, None, "alice", "*hi*", at(1)))
            .await;
        store
            .seed_comment(StoredComment::new("b", 1, None, "bob", "pinned", at(2)))
            .await;
        store
            .seed_comment(StoredComment::new("c", 1, Some("a"), "bob", "reply", at(3)))
            .await;
        store.set_post_metadata(1, STICKY_COMMENT_KEY, "b").await;

        let page = forum
            .get_comment_tree(&CommentTreeQuery::new(1), &Viewer::anonymous())
            .await
            .unwrap();

        assert_eq!(cids(&page), vec!["b", "a"]);
        let pinned = page[0].as_comment().unwrap();
        assert!(pinned.sticky);
        let a = page[1].as_comment().unwrap();
        assert!(!a.sticky);
        assert!(a.content_html.contains("<em>hi</em>"));
        assert_eq!(a.author_display, "ALICE");
        assert_eq!(cids(&a.children), vec!["c"]);
    }

    #[tokio::test]
    async fn test_deleted_comment_redacted_per_viewer() {
        let (store, forum) = setup().await;
        let mut gone = StoredComment::new("gone", 1, None, "alice", "secret", at(1));
        gone.status = CommentStatus::SelfDeleted;
        store.seed_comment(gone).await;

        let query = CommentTreeQuery::new(1);
        let anon = forum
            .get_comment_tree(&query, &Viewer::anonymous())
            .await
            .unwrap();
        let anon = anon[0].as_comment().unwrap();
        assert_eq!(anon.visibility, Visibility::Deleted);
        assert_eq!(anon.content_html, "");
        assert_eq!(anon.author_id, None);

        let admin = Viewer::user("root").with_power(ModPower::Admin);
        let admin = forum.get_comment_tree(&query, &admin).await.unwrap();
        let admin = admin[0].as_comment().unwrap();
        assert_eq!(admin.visibility, Visibility::AdminSelfDel);
        assert!(admin.content_html.contains("secret"));
    }

    #[tokio::test]
    async fn test_unknown_root_is_empty() {
        let (store, forum) = setup().await;
        store
            .seed_comment(StoredComment::new("a", 1, None, "alice", "x", at(1)))
            .await;

        let query = CommentTreeQuery {
            root: Some("nope".into()),
            ..CommentTreeQuery::new(1)
        };
        let page = forum
            .get_comment_tree(&query, &Viewer::anonymous())
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_history_only_when_requested() {
        let (store, forum) = setup().await;
        store
            .seed_comment(StoredComment::new("a", 1, None, "alice", "v1", at(1)))
            .await;
        store.update_comment_content("a", "v2", at(5)).await.unwrap();

        let plain = forum
            .get_comment_tree(&CommentTreeQuery::new(1), &Viewer::anonymous())
            .await
            .unwrap();
        assert!(plain[0].as_comment().unwrap().history.is_empty());

        let query = CommentTreeQuery {
            include_history: true,
            ..CommentTreeQuery::new(1)
        };
        let with_history = forum
            .get_comment_tree(&query, &Viewer::anonymous())
            .await
            .unwrap();
        let history = &with_history[0].as_comment().unwrap().history;
        assert_eq!(history.len(), 1);
        assert!(history[0].content_html.contains("v1"));
    }
}
