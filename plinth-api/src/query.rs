use crate::{CommentId, CommentWithAuthor, ProjectId, UserId, Uuid};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Column {
    Id,
    ProjectId,
    AuthorId,
    PageUrl,
    ParentId,
    Resolved,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::ProjectId => "project_id",
            Column::AuthorId => "author_id",
            Column::PageUrl => "page_url",
            Column::ParentId => "parent_id",
            Column::Resolved => "resolved",
        }
    }

    fn of(&self, c: &CommentWithAuthor) -> Option<Value> {
        let c = &c.comment;
        match self {
            Column::Id => Some(c.id.into()),
            Column::ProjectId => Some(c.project_id.into()),
            Column::AuthorId => Some(c.author_id.into()),
            Column::PageUrl => Some(c.page_url.clone().into()),
            Column::ParentId => c.parent_id.map(Value::from),
            Column::Resolved => Some(c.resolved.into()),
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Value {
    Uuid(Uuid),
    Text(String),
    Bool(bool),
}

impl Value {
    fn render(&self) -> String {
        match self {
            Value::Uuid(u) => u.to_string(),
            Value::Text(t) => t.clone(),
            Value::Bool(b) => b.to_string(),
        }
    }

    /// Inside `or=(...)` lists, reserved characters must be double-quoted
    fn render_nested(&self) -> String {
        match self {
            Value::Text(t) => format!("\"{}\"", t.replace('\\', "\\\\").replace('"', "\\\"")),
            v => v.render(),
        }
    }
}

impl From<CommentId> for Value {
    fn from(id: CommentId) -> Value {
        Value::Uuid(id.0)
    }
}

impl From<ProjectId> for Value {
    fn from(id: ProjectId) -> Value {
        Value::Uuid(id.0)
    }
}

impl From<UserId> for Value {
    fn from(id: UserId) -> Value {
        Value::Uuid(id.0)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

/// Row predicate understood by the remote store
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Filter {
    All(Vec<Filter>),
    Any(Vec<Filter>),
    Eq(Column, Value),
    IsNull(Column),
}

impl Filter {
    pub fn eq(col: Column, v: impl Into<Value>) -> Filter {
        Filter::Eq(col, v.into())
    }

    pub fn is_null(col: Column) -> Filter {
        Filter::IsNull(col)
    }

    /// Matches `target` and all of its replies
    pub fn thread_of(target: CommentId) -> Filter {
        Filter::Any(vec![
            Filter::eq(Column::Id, target),
            Filter::eq(Column::ParentId, target),
        ])
    }

    pub fn matches(&self, c: &CommentWithAuthor) -> bool {
        match self {
            Filter::All(filters) => filters.iter().all(|f| f.matches(c)),
            Filter::Any(filters) => filters.iter().any(|f| f.matches(c)),
            Filter::Eq(col, v) => col.of(c).as_ref() == Some(v),
            Filter::IsNull(col) => col.of(c).is_none(),
        }
    }

    /// Render as PostgREST query-string pairs, top-level conjunctions being
    /// split into one pair per condition
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        match self {
            Filter::All(filters) => filters.iter().flat_map(|f| f.to_query_pairs()).collect(),
            Filter::Any(filters) => vec![(
                String::from("or"),
                format!("({})", Self::render_list(filters)),
            )],
            Filter::Eq(col, v) => vec![(col.name().to_string(), format!("eq.{}", v.render()))],
            Filter::IsNull(col) => vec![(col.name().to_string(), String::from("is.null"))],
        }
    }

    fn render_list(filters: &[Filter]) -> String {
        filters
            .iter()
            .map(|f| f.render_nested())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn render_nested(&self) -> String {
        match self {
            Filter::All(filters) => format!("and({})", Self::render_list(filters)),
            Filter::Any(filters) => format!("or({})", Self::render_list(filters)),
            Filter::Eq(col, v) => format!("{}.eq.{}", col.name(), v.render_nested()),
            Filter::IsNull(col) => format!("{}.is.null", col.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Comment, STUB_UUID};

    fn comment(parent: Option<CommentId>, resolved: bool) -> CommentWithAuthor {
        CommentWithAuthor {
            comment: Comment {
                id: CommentId::new(),
                project_id: ProjectId::stub(),
                author_id: UserId::stub(),
                body: String::from("body"),
                page_url: String::from("/"),
                element_xpath: String::from("/html/body"),
                coordinates: None,
                parent_id: parent,
                resolved,
                created_at: chrono::Utc::now(),
            },
            author_first_name: String::new(),
            author_last_name: String::new(),
            author_avatar_url: None,
        }
    }

    #[test]
    fn matching() {
        let root = comment(None, false);
        let reply = comment(Some(root.comment.id), true);
        let other = comment(None, false);

        let thread = Filter::thread_of(root.comment.id);
        assert!(thread.matches(&root));
        assert!(thread.matches(&reply));
        assert!(!thread.matches(&other));

        let unresolved_roots = Filter::All(vec![
            Filter::is_null(Column::ParentId),
            Filter::eq(Column::Resolved, false),
            Filter::eq(Column::ProjectId, ProjectId::stub()),
        ]);
        assert!(unresolved_roots.matches(&root));
        assert!(!unresolved_roots.matches(&reply));
        assert!(unresolved_roots.matches(&other));

        assert!(Filter::All(vec![]).matches(&root));
        assert!(!Filter::Any(vec![]).matches(&root));
    }

    #[test]
    fn postgrest_rendering() {
        let f = Filter::All(vec![
            Filter::is_null(Column::ParentId),
            Filter::eq(Column::ProjectId, ProjectId::stub()),
            Filter::eq(Column::PageUrl, "/a?b=c"),
            Filter::eq(Column::Resolved, false),
        ]);
        assert_eq!(
            f.to_query_pairs(),
            vec![
                (String::from("parent_id"), String::from("is.null")),
                (String::from("project_id"), format!("eq.{STUB_UUID}")),
                (String::from("page_url"), String::from("eq./a?b=c")),
                (String::from("resolved"), String::from("eq.false")),
            ],
        );

        let id = CommentId::stub();
        assert_eq!(
            Filter::thread_of(id).to_query_pairs(),
            vec![(
                String::from("or"),
                format!("(id.eq.{STUB_UUID},parent_id.eq.{STUB_UUID})")
            )],
        );

        let nested = Filter::Any(vec![
            Filter::eq(Column::PageUrl, r#"/x,"y""#),
            Filter::All(vec![Filter::is_null(Column::ParentId)]),
        ]);
        assert_eq!(
            nested.to_query_pairs(),
            vec![(
                String::from("or"),
                String::from(r#"(page_url.eq."/x,\"y\"",and(parent_id.is.null))"#),
            )],
        );
    }
}
