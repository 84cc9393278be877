use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::comment_votes)]
pub struct NewCommentVote<'a> {
    pub uid: &'a str,
    pub cid: &'a str,
    pub positive: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::post_votes)]
pub struct NewPostVote<'a> {
    pub uid: &'a str,
    pub pid: i32,
    pub positive: bool,
    pub created_at: NaiveDateTime,
}
