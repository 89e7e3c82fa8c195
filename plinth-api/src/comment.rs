use std::{fmt, str::FromStr};

use anyhow::{anyhow, Context};

use crate::{Error, ProjectId, SessionUser, Time, UserId, Uuid, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }

    pub fn new() -> CommentId {
        CommentId(Uuid::new_v4())
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CommentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<CommentId, uuid::Error> {
        Uuid::try_parse(s).map(CommentId)
    }
}

/// Anchor point of a comment, stored by the backend as a `(x,y)` point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

impl FromStr for Coordinates {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Coordinates> {
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| anyhow!("point {s:?} is not parenthesized"))?;
        let (x, y) = inner
            .split_once(',')
            .ok_or_else(|| anyhow!("point {s:?} does not have two components"))?;
        Ok(Coordinates {
            x: x.trim().parse().with_context(|| format!("parsing x of {s:?}"))?,
            y: y.trim().parse().with_context(|| format!("parsing y of {s:?}"))?,
        })
    }
}

impl serde::Serialize for Coordinates {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Coordinates {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Coordinates, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub project_id: ProjectId,
    pub author_id: UserId,
    pub body: String,

    /// Path and query of the page this comment is anchored on
    pub page_url: String,
    pub element_xpath: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,

    /// Set for replies, which always point to a root comment
    pub parent_id: Option<CommentId>,
    pub resolved: bool,
    pub created_at: Time,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Id of the thread this comment belongs to
    pub fn thread_id(&self) -> CommentId {
        self.parent_id.unwrap_or(self.id)
    }

    /// Whether this comment is `target` or one of its replies
    pub fn in_thread_of(&self, target: CommentId) -> bool {
        self.id == target || self.parent_id == Some(target)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_avatar_url: Option<String>,
}

impl CommentWithAuthor {
    /// Row shown locally while the insertion of `new` is in flight
    pub fn provisional(new: &NewComment, author: &SessionUser, now: Time) -> CommentWithAuthor {
        CommentWithAuthor {
            comment: Comment {
                id: new.id,
                project_id: new.project_id,
                author_id: new.author_id,
                body: new.body.clone(),
                page_url: new.page_url.clone(),
                element_xpath: new.element_xpath.clone(),
                coordinates: new.coordinates,
                parent_id: new.parent_id,
                resolved: false,
                created_at: now,
            },
            author_first_name: author.first_name.clone().unwrap_or_default(),
            author_last_name: author.last_name.clone().unwrap_or_default(),
            author_avatar_url: author.avatar_url.clone(),
        }
    }

    pub fn author_name(&self) -> String {
        format!("{} {}", self.author_first_name, self.author_last_name)
            .trim()
            .to_string()
    }

    pub fn author_initials(&self) -> String {
        self.author_first_name
            .chars()
            .take(1)
            .chain(self.author_last_name.chars().take(1))
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub id: CommentId,
    pub project_id: ProjectId,
    pub author_id: UserId,
    pub body: String,
    pub page_url: String,
    pub element_xpath: String,
    pub coordinates: Option<Coordinates>,
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    pub fn root(
        project_id: ProjectId,
        author_id: UserId,
        body: String,
        page_url: String,
        element_xpath: String,
        coordinates: Coordinates,
    ) -> NewComment {
        NewComment {
            id: CommentId::new(),
            project_id,
            author_id,
            body,
            page_url,
            element_xpath,
            coordinates: Some(coordinates),
            parent_id: None,
        }
    }

    /// Replies inherit the anchor of their parent, which must be a root comment
    pub fn reply(
        parent: &Comment,
        author_id: UserId,
        body: String,
        page_url: String,
    ) -> Result<NewComment, Error> {
        if !parent.is_root() {
            return Err(Error::InvalidParent(parent.id));
        }
        Ok(NewComment {
            id: CommentId::new(),
            project_id: parent.project_id,
            author_id,
            body,
            page_url,
            element_xpath: parent.element_xpath.clone(),
            coordinates: parent.coordinates,
            parent_id: Some(parent.id),
        })
    }
}

/// The mutable part of a comment; anchoring fields are write-once
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
}

impl CommentUpdate {
    pub fn body(body: String) -> CommentUpdate {
        CommentUpdate {
            body: Some(body),
            resolved: None,
        }
    }

    pub fn resolved(resolved: bool) -> CommentUpdate {
        CommentUpdate {
            body: None,
            resolved: Some(resolved),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.resolved.is_none()
    }

    pub fn apply_to(&self, c: &mut Comment) {
        if let Some(body) = &self.body {
            c.body = body.clone();
        }
        if let Some(resolved) = self.resolved {
            c.resolved = resolved;
        }
    }
}
