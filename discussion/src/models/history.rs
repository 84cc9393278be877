use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::comment_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CommentHistory {
    pub id: i32,
    pub cid: String,
    pub content: String,
    pub edited_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::comment_history)]
pub struct NewCommentHistory<'a> {
    pub cid: &'a str,
    pub content: &'a str,
    pub edited_at: NaiveDateTime,
}
