use std::{future::Future, sync::Arc};

pub mod cache;
pub mod comment;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod ranking;
pub mod reconcile;
pub mod schema;
pub mod store;

use cache::CommentCache;
use comment::{ModPower, Viewer};
use config::EngineConfig;
use error::{Error, Result};
use notify::NotifySink;
use ranking::{
    dedup::DedupWindow,
    sorting::{self, PostSort},
};
use store::{Post, Store};

/// Shared context of the discussion engine. Cheap to clone; every clone
/// talks to the same store, cache, notifier and de-duplication window.
#[derive(Clone)]
pub struct Forum {
    store: Arc<dyn Store>,
    cache: Arc<dyn CommentCache>,
    notifier: Arc<dyn NotifySink>,
    dedup: Arc<DedupWindow>,
    config: Arc<EngineConfig>,
}

impl Forum {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn CommentCache>,
        notifier: Arc<dyn NotifySink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            notifier,
            dedup: Arc::new(DedupWindow::new(config.vote_dedup_window)),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a storage call under the configured timeout. An elapsed timeout
    /// is reported as [`Error::Unavailable`]; whether the call committed is
    /// unknown to the caller.
    async fn timed<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.storage_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.storage_timeout.as_millis() as u64,
                    "storage call timed out"
                );
                Err(Error::Unavailable(
                    "Storage did not respond in time, try again".into(),
                ))
            }
        }
    }

    /// Resolves what `uid` may do in `sid`. Anonymous viewers get no power.
    pub async fn resolve_viewer(&self, uid: Option<&str>, sid: &str) -> Result<Viewer> {
        let Some(uid) = uid else {
            return Ok(Viewer::anonymous());
        };

        let user = self.timed(self.store.fetch_user(uid)).await?;
        let power = if user.is_some_and(|u| u.is_admin) {
            ModPower::Admin
        } else {
            match self.timed(self.store.mod_power(uid, sid)).await? {
                Some(level) => ModPower::Mod(level),
                None => ModPower::None,
            }
        };

        Ok(Viewer::user(uid).with_power(power))
    }

    /// One page of a sub's posts in the requested order.
    #[tracing::instrument(skip(self))]
    pub async fn list_posts(&self, sid: &str, sort: PostSort, page: usize) -> Result<Vec<Post>> {
        let mut posts = self.timed(self.store.fetch_sub_posts(sid)).await?;
        sorting::sort_posts(&mut posts, sort);
        Ok(sorting::page(&posts, page, self.config.posts_per_page).to_vec())
    }
}
