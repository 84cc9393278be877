use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::store::Post as PostRecord;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub pid: i32,
    pub sid: String,
    pub uid: String,
    pub title: String,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub deleted: bool,
    pub posted_at: NaiveDateTime,
    pub comments_count: i32,
}

impl From<Post> for PostRecord {
    fn from(row: Post) -> Self {
        PostRecord {
            pid: row.pid,
            sid: row.sid,
            author_id: row.uid,
            title: row.title,
            score: row.score,
            upvotes: row.upvotes,
            downvotes: row.downvotes,
            deleted: row.deleted,
            posted_at: row.posted_at,
            comments_count: row.comments_count,
        }
    }
}
