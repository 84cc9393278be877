pub mod create;
pub mod delete;
pub mod get;
pub mod patch;
pub mod redact;
pub mod render;
pub mod tree;
pub mod trim;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ranking::vote::VoteDirection;

pub use redact::{ModPower, Viewer, Visibility};
pub use render::{RenderedComment, RenderedEntry};
pub use trim::MoreMarker;

pub type Cid = String;
pub type Pid = i32;
pub type Uid = String;
pub type Sid = String;

/// The structural part of a comment: who it replies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEdge {
    pub cid: Cid,
    pub parent_cid: Option<Cid>,
}

impl CommentEdge {
    pub fn new(cid: impl Into<Cid>, parent_cid: Option<&str>) -> Self {
        CommentEdge {
            cid: cid.into(),
            parent_cid: parent_cid.map(Into::into),
        }
    }
}

/// Order in which sibling comments are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSort {
    /// Highest score first, oldest first among equals.
    #[default]
    Best,
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Visible,
    SelfDeleted,
    ModDeleted,
}

impl CommentStatus {
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => CommentStatus::Visible,
            1 => CommentStatus::SelfDeleted,
            _ => CommentStatus::ModDeleted,
        }
    }

    pub fn code(self) -> i16 {
        match self {
            CommentStatus::Visible => 0,
            CommentStatus::SelfDeleted => 1,
            CommentStatus::ModDeleted => 2,
        }
    }
}

/// Who removed a mod-deleted comment; decides who may restore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeratorTier {
    Mod,
    Admin,
}

impl ModeratorTier {
    pub fn from_code(code: i16) -> Self {
        match code {
            2 => ModeratorTier::Admin,
            _ => ModeratorTier::Mod,
        }
    }

    pub fn code(self) -> i16 {
        match self {
            ModeratorTier::Mod => 1,
            ModeratorTier::Admin => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distinguish {
    #[default]
    None,
    Mod,
    Admin,
}

impl Distinguish {
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Distinguish::Mod,
            2 => Distinguish::Admin,
            _ => Distinguish::None,
        }
    }

    pub fn code(self) -> i16 {
        match self {
            Distinguish::None => 0,
            Distinguish::Mod => 1,
            Distinguish::Admin => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Deleted,
}

impl AccountStatus {
    pub fn from_code(code: i16) -> Self {
        match code {
            10 => AccountStatus::Deleted,
            5 => AccountStatus::Suspended,
            _ => AccountStatus::Active,
        }
    }

    pub fn code(self) -> i16 {
        match self {
            AccountStatus::Active => 0,
            AccountStatus::Suspended => 5,
            AccountStatus::Deleted => 10,
        }
    }
}

/// How a viewer asked to have a blocked author's content shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockMethod {
    Hide,
    Blur,
}

impl BlockMethod {
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => BlockMethod::Blur,
            _ => BlockMethod::Hide,
        }
    }

    pub fn code(self) -> i16 {
        match self {
            BlockMethod::Hide => 0,
            BlockMethod::Blur => 1,
        }
    }
}

/// Everything the redaction step needs to know about one comment, as seen by
/// one particular viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub cid: Cid,
    pub pid: Pid,
    pub parent_cid: Option<Cid>,
    pub author_id: Uid,
    pub author_name: String,
    pub author_status: AccountStatus,
    /// Whether the author currently moderates the post's sub.
    pub author_is_mod: bool,
    /// Raw markdown source.
    pub content: String,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub status: CommentStatus,
    pub distinguish: Distinguish,
    pub created_at: NaiveDateTime,
    pub last_edited_at: Option<NaiveDateTime>,
    pub viewer_vote: Option<VoteDirection>,
    /// Set when the viewer has content-blocked the author.
    pub blocked: Option<BlockMethod>,
}
