#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use chrono::{NaiveDateTime, Utc};
use discussion::{
    Forum,
    cache::RetainerCache,
    comment::AccountStatus,
    config::EngineConfig,
    notify::BroadcastNotifier,
    store::{Post, StoredComment, UserRecord, memory::MemoryStore},
};

pub const SUB: &str = "rust";
pub const POST: i32 = 1;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<BroadcastNotifier>,
    pub forum: Forum,
}

pub async fn fixture() -> Fixture {
    fixture_with(EngineConfig::default()).await
}

pub async fn fixture_with(config: EngineConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store.insert_post(post(POST, minutes_ago(10))).await;
    for uid in ["op", "alice", "bob", "carol", "janitor", "root"] {
        store.insert_user(user(uid)).await;
    }
    store
        .insert_user(UserRecord {
            is_admin: true,
            ..user("root")
        })
        .await;
    store.set_moderator("janitor", SUB, 1).await;

    let notifier = Arc::new(BroadcastNotifier::new(64));
    let forum = Forum::new(
        store.clone(),
        Arc::new(RetainerCache::new()),
        notifier.clone(),
        config,
    );

    Fixture {
        store,
        notifier,
        forum,
    }
}

pub fn post(pid: i32, posted_at: NaiveDateTime) -> Post {
    Post {
        pid,
        sid: SUB.into(),
        author_id: "op".into(),
        title: format!("Post {pid}"),
        score: 0,
        upvotes: 0,
        downvotes: 0,
        deleted: false,
        posted_at,
        comments_count: 0,
    }
}

pub fn user(uid: &str) -> UserRecord {
    UserRecord {
        uid: uid.into(),
        name: uid.into(),
        status: AccountStatus::Active,
        score: 0,
        given: 0,
        is_admin: false,
    }
}

pub fn minutes_ago(minutes: i64) -> NaiveDateTime {
    Utc::now().naive_utc() - chrono::TimeDelta::minutes(minutes)
}

impl Fixture {
    /// Seeds `cid` under `parent`, each one a second newer than the last so
    /// sibling order is stable.
    pub async fn comment(&self, cid: &str, parent: Option<&str>, author: &str, seq: i64) {
        let created_at = minutes_ago(5) + chrono::TimeDelta::seconds(seq);
        self.store
            .seed_comment(StoredComment::new(
                cid,
                POST,
                parent,
                author,
                format!("comment {cid}"),
                created_at,
            ))
            .await;
    }
}

pub fn quiet_dedup() -> EngineConfig {
    EngineConfig {
        vote_dedup_window: Duration::ZERO,
        ..Default::default()
    }
}
