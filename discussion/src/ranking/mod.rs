pub mod dedup;
pub mod sorting;
pub mod vote;

pub use sorting::{PostSort, hot_score};
pub use vote::{VoteDirection, VoteTarget};
