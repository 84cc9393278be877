use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::store::Post;

/// Fixed zero point of the hot ranking. Changing it reorders every post on
/// the site relative to the others.
const HOT_EPOCH: f64 = 1134028003.0;

/// Seconds of age that cost as much rank as a tenfold score.
const HOT_DECAY: f64 = 45000.0;

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    #[default]
    Hot,
    Top,
    New,
}

pub fn epoch_seconds(at: NaiveDateTime) -> f64 {
    let at = at.and_utc();
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1_000_000.0
}

/// Time-decayed popularity; higher sorts first.
pub fn hot_score(score: i32, posted_at: NaiveDateTime) -> f64 {
    let order = f64::from(score.unsigned_abs().max(1)).log10();
    let sign = f64::from(score.signum());
    let seconds = epoch_seconds(posted_at) - HOT_EPOCH;

    round_to(sign * order + seconds / HOT_DECAY, 7)
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

pub fn sort_posts(posts: &mut [Post], sort: PostSort) {
    match sort {
        PostSort::Hot => posts.sort_by(|a, b| {
            hot_score(b.score, b.posted_at)
                .total_cmp(&hot_score(a.score, a.posted_at))
                .then_with(|| b.pid.cmp(&a.pid))
        }),
        PostSort::Top => posts.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.posted_at.cmp(&a.posted_at))
        }),
        PostSort::New => posts.sort_by(|a, b| match b.posted_at.cmp(&a.posted_at) {
            Ordering::Equal => b.pid.cmp(&a.pid),
            o => o,
        }),
    }
}

/// 1-based page of `items`; page 0 is treated as the first page.
pub fn page<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(per_page);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}
