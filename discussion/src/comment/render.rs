use std::collections::HashMap;

use chrono::NaiveDateTime;
use pulldown_cmark::{Options, Parser, html};
use serde::Serialize;

use crate::ranking::vote::VoteDirection;

use super::{
    Cid, CommentStatus, Distinguish, Pid, Uid,
    redact::{RedactedComment, Visibility},
    trim::{MoreMarker, Skeleton},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSnapshot {
    pub content_html: String,
    pub edited_at: NaiveDateTime,
}

// The model that will be returned to the render layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedComment {
    pub cid: Cid,
    pub pid: Pid,
    pub parent_cid: Option<Cid>,
    pub author_id: Option<Uid>,
    pub author_display: String,
    pub content_html: String,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub status: CommentStatus,
    pub distinguish: Distinguish,
    pub visibility: Visibility,
    pub sticky: bool,
    pub created_at: NaiveDateTime,
    pub last_edited_at: Option<NaiveDateTime>,
    pub voter_direction: Option<VoteDirection>,
    pub history: Vec<RenderedSnapshot>,
    pub children: Vec<RenderedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RenderedEntry {
    Comment(Box<RenderedComment>),
    More(MoreMarker),
}

impl RenderedEntry {
    pub fn as_comment(&self) -> Option<&RenderedComment> {
        match self {
            RenderedEntry::Comment(c) => Some(c),
            RenderedEntry::More(_) => None,
        }
    }
}

pub fn render_markdown(raw: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let mut unsafe_html = String::with_capacity(raw.len() * 3 / 2);
    html::push_html(&mut unsafe_html, Parser::new_ext(raw, options));

    ammonia::clean(&unsafe_html)
}

/// Puts redacted comments back into the trimmed shape, rendering their
/// markdown. A node whose record is missing is dropped with its replies.
/// Recursion follows the trimmed shape, so it never goes deeper than the
/// trim depth plus the marker level.
pub fn render_tree(
    skeleton: Vec<Skeleton>,
    records: &mut HashMap<Cid, RedactedComment>,
) -> Vec<RenderedEntry> {
    skeleton
        .into_iter()
        .filter_map(|entry| match entry {
            Skeleton::More(marker) => Some(RenderedEntry::More(marker)),
            Skeleton::Node { cid, children } => {
                let Some(comment) = records.remove(&cid) else {
                    tracing::debug!(cid, "comment vanished between tree fetch and record fetch");
                    return None;
                };
                let children = render_tree(children, records);
                Some(RenderedEntry::Comment(Box::new(render_comment(comment, children))))
            }
        })
        .collect()
}

fn render_comment(comment: RedactedComment, children: Vec<RenderedEntry>) -> RenderedComment {
    RenderedComment {
        content_html: comment
            .content
            .as_deref()
            .map(render_markdown)
            .unwrap_or_default(),
        history: comment
            .history
            .into_iter()
            .map(|h| RenderedSnapshot {
                content_html: render_markdown(&h.content),
                edited_at: h.edited_at,
            })
            .collect(),
        cid: comment.cid,
        pid: comment.pid,
        parent_cid: comment.parent_cid,
        author_id: comment.author_id,
        author_display: comment.author_display,
        score: comment.score,
        upvotes: comment.upvotes,
        downvotes: comment.downvotes,
        status: comment.status,
        distinguish: comment.distinguish,
        visibility: comment.visibility,
        sticky: comment.sticky,
        created_at: comment.created_at,
        last_edited_at: comment.last_edited_at,
        voter_direction: comment.viewer_vote,
        children,
    }
}
