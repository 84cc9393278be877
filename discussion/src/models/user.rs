use diesel::prelude::*;

use crate::{comment::AccountStatus, store::UserRecord};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub uid: String,
    pub name: String,
    pub status: i16,
    pub score: i32,
    pub given: i32,
    pub is_admin: bool,
}

impl From<User> for UserRecord {
    fn from(row: User) -> Self {
        UserRecord {
            uid: row.uid,
            name: row.name,
            status: AccountStatus::from_code(row.status),
            score: row.score,
            given: row.given,
            is_admin: row.is_admin,
        }
    }
}
