use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{ranking::vote::VoteDirection, store::HistorySnapshot};

use super::{
    AccountStatus, BlockMethod, Cid, CommentRecord, CommentStatus, Distinguish, Pid, Uid,
};

pub const DELETED_AUTHOR: &str = "[Deleted]";
pub const BLOCKED_AUTHOR: &str = "[Blocked]";

/// The viewer's moderation power over the sub a post belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModPower {
    #[default]
    None,
    /// Sub moderator; 0 is the owner, higher levels carry less power.
    Mod(u8),
    Admin,
}

impl ModPower {
    pub fn is_privileged(self) -> bool {
        !matches!(self, ModPower::None)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, ModPower::Admin)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    pub uid: Option<Uid>,
    pub power: ModPower,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Viewer::default()
    }

    pub fn user(uid: impl Into<Uid>) -> Self {
        Viewer {
            uid: Some(uid.into()),
            power: ModPower::None,
        }
    }

    pub fn with_power(mut self, power: ModPower) -> Self {
        self.power = power;
        self
    }
}

/// Tag telling the renderer how a comment was treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Normal,
    HideBlock,
    BlurBlock,
    AdminSelfDel,
    ModSelfDel,
    ModDel,
    Deleted,
}

/// A comment after the viewer-specific rules ran. Content is still raw
/// markdown; `None` means the viewer may not see it.
#[derive(Debug, Clone, PartialEq)]
pub struct RedactedComment {
    pub cid: Cid,
    pub pid: Pid,
    pub parent_cid: Option<Cid>,
    pub author_id: Option<Uid>,
    pub author_display: String,
    pub content: Option<String>,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub status: CommentStatus,
    pub distinguish: Distinguish,
    pub visibility: Visibility,
    pub sticky: bool,
    pub created_at: NaiveDateTime,
    pub last_edited_at: Option<NaiveDateTime>,
    pub viewer_vote: Option<VoteDirection>,
    /// Newest first.
    pub history: Vec<HistorySnapshot>,
}

enum Treatment {
    Show,
    Block(BlockMethod),
    Retain(Visibility),
    Clear,
}

fn classify(record: &CommentRecord, viewer: &Viewer) -> Treatment {
    let author_exempt = record.author_is_mod || viewer.power.is_privileged();

    match (record.blocked, record.status, viewer.power) {
        (Some(BlockMethod::Hide), _, _) if !author_exempt => Treatment::Block(BlockMethod::Hide),
        (Some(BlockMethod::Blur), CommentStatus::Visible, _) if !author_exempt => {
            Treatment::Block(BlockMethod::Blur)
        }
        (_, CommentStatus::Visible, _) => Treatment::Show,
        (_, CommentStatus::SelfDeleted, ModPower::Admin) => Treatment::Retain(Visibility::AdminSelfDel),
        (_, CommentStatus::SelfDeleted, ModPower::Mod(_)) => Treatment::Retain(Visibility::ModSelfDel),
        (_, CommentStatus::ModDeleted, ModPower::Admin | ModPower::Mod(_)) => {
            Treatment::Retain(Visibility::ModDel)
        }
        (_, CommentStatus::SelfDeleted | CommentStatus::ModDeleted, ModPower::None) => {
            Treatment::Clear
        }
    }
}

/// Applies block, account-deletion and comment-deletion rules to one record.
/// Precedence: hidden by block > account deleted > comment deleted > normal.
/// A blur block only applies to visible comments; deleted ones follow the
/// deletion rules.
pub fn redact(
    record: CommentRecord,
    viewer: &Viewer,
    sticky: Option<&str>,
    history: Vec<HistorySnapshot>,
) -> RedactedComment {
    let treatment = classify(&record, viewer);

    let distinguish = match record.distinguish {
        Distinguish::Mod if !record.author_is_mod => Distinguish::None,
        d => d,
    };

    let mut comment = RedactedComment {
        sticky: sticky == Some(record.cid.as_str()),
        cid: record.cid,
        pid: record.pid,
        parent_cid: record.parent_cid,
        author_id: Some(record.author_id),
        author_display: record.author_name,
        content: Some(record.content),
        score: record.score,
        upvotes: record.upvotes,
        downvotes: record.downvotes,
        status: record.status,
        distinguish,
        visibility: Visibility::Normal,
        created_at: record.created_at,
        last_edited_at: record.last_edited_at,
        viewer_vote: record.viewer_vote,
        history,
    };

    match treatment {
        Treatment::Show => {}
        Treatment::Block(BlockMethod::Hide) => {
            comment.clear(BLOCKED_AUTHOR);
            comment.visibility = Visibility::HideBlock;
        }
        Treatment::Block(BlockMethod::Blur) => comment.visibility = Visibility::BlurBlock,
        Treatment::Retain(visibility) => comment.visibility = visibility,
        Treatment::Clear => {
            comment.clear(DELETED_AUTHOR);
            comment.visibility = Visibility::Deleted;
        }
    }

    let hidden_by_block = matches!(treatment, Treatment::Block(BlockMethod::Hide));
    if record.author_status == AccountStatus::Deleted && !hidden_by_block {
        comment.author_id = None;
        if !viewer.power.is_admin() {
            comment.author_display = DELETED_AUTHOR.into();
        }
        // Account deletion wins over the retention admins otherwise get
        if comment.status == CommentStatus::SelfDeleted {
            comment.content = None;
            comment.last_edited_at = None;
            comment.history.clear();
        }
    }

    comment
}

impl RedactedComment {
    fn clear(&mut self, author_display: &str) {
        self.author_id = None;
        self.author_display = author_display.into();
        self.content = None;
        self.last_edited_at = None;
        self.history.clear();
    }
}
