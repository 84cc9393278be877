use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::{
    comment::{CommentStatus, Distinguish, ModeratorTier},
    store::StoredComment,
};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub cid: String,
    pub pid: i32,
    pub parent_cid: Option<String>,
    pub uid: String,
    pub content: String,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub status: i16,
    pub distinguish: i16,
    pub deleted_by: Option<i16>,
    pub delete_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_edited_at: Option<NaiveDateTime>,
}

impl From<Comment> for StoredComment {
    fn from(row: Comment) -> Self {
        StoredComment {
            cid: row.cid,
            pid: row.pid,
            parent_cid: row.parent_cid,
            author_id: row.uid,
            content: row.content,
            score: row.score,
            upvotes: row.upvotes,
            downvotes: row.downvotes,
            status: CommentStatus::from_code(row.status),
            distinguish: Distinguish::from_code(row.distinguish),
            deleted_by: row.deleted_by.map(ModeratorTier::from_code),
            delete_reason: row.delete_reason,
            created_at: row.created_at,
            last_edited_at: row.last_edited_at,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::comments)]
pub struct NewComment<'a> {
    pub cid: &'a str,
    pub pid: i32,
    pub parent_cid: Option<&'a str>,
    pub uid: &'a str,
    pub content: &'a str,
    pub status: i16,
    pub distinguish: i16,
    pub created_at: NaiveDateTime,
}

impl<'a> From<&'a StoredComment> for NewComment<'a> {
    fn from(comment: &'a StoredComment) -> Self {
        NewComment {
            cid: &comment.cid,
            pid: comment.pid,
            parent_cid: comment.parent_cid.as_deref(),
            uid: &comment.author_id,
            content: &comment.content,
            status: comment.status.code(),
            distinguish: comment.distinguish.code(),
            created_at: comment.created_at,
        }
    }
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(treat_none_as_null = true)]
pub struct UpdateCommentStatus<'a> {
    pub status: i16,
    pub deleted_by: Option<i16>,
    pub delete_reason: Option<&'a str>,
}
