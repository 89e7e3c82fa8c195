use std::fmt;

use crate::api::{Comment, CommentId, ProjectId};

/// Identity of one cached result set
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum CacheKey {
    /// Unresolved root comments pinned on one page
    PageComments { project: ProjectId, page_url: String },

    /// Root comments of a project with the given resolution
    Comments { project: ProjectId, resolved: bool },

    /// Replies to one root comment
    Thread(CommentId),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::PageComments { project, page_url } => {
                write!(f, "(\"comments\", {project}, page={page_url:?})")
            }
            CacheKey::Comments { project, resolved } => {
                write!(f, "(\"comments\", {project}, {resolved})")
            }
            CacheKey::Thread(id) => write!(f, "(\"thread\", {id})"),
        }
    }
}

impl CacheKey {
    /// Whether a row belongs in the result set of this key
    pub fn admits(&self, c: &Comment) -> bool {
        match self {
            CacheKey::PageComments { project, page_url } => {
                c.is_root() && !c.resolved && c.project_id == *project && c.page_url == *page_url
            }
            CacheKey::Comments { project, resolved } => {
                c.is_root() && c.resolved == *resolved && c.project_id == *project
            }
            CacheKey::Thread(id) => c.parent_id == Some(*id),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteKind {
    Create,
    UpdateBody,
    SetResolved,
    Delete,
}

/// Every key whose result set a write on `c` can change
pub fn affected_keys(c: &Comment, kind: WriteKind) -> Vec<CacheKey> {
    let project = c.project_id;
    let page = CacheKey::PageComments {
        project,
        page_url: c.page_url.clone(),
    };
    let unresolved = CacheKey::Comments {
        project,
        resolved: false,
    };
    let resolved = CacheKey::Comments {
        project,
        resolved: true,
    };
    let thread = CacheKey::Thread(c.thread_id());
    match (kind, c.is_root()) {
        (WriteKind::Create, true) => vec![page, unresolved],
        (WriteKind::Create | WriteKind::UpdateBody, false) => vec![thread],
        (WriteKind::UpdateBody, true) => vec![page, resolved, unresolved],
        (WriteKind::SetResolved | WriteKind::Delete, _) => {
            vec![page, resolved, unresolved, thread]
        }
    }
}
