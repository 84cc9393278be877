pub mod comment;
pub mod history;
pub mod post;
pub mod user;
pub mod vote;
