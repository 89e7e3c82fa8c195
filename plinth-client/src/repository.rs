use std::{future::Future, rc::Rc};

use chrono::Utc;

use crate::{
    api::{
        Column, Comment, CommentId, CommentUpdate, CommentWithAuthor, Error, Filter, NewComment,
        ProjectId, RemoteStore, Subscription,
    },
    affected_keys, CacheKey, FetchCache, QueryState, SessionContext, WriteKind,
};

pub type Rows = Vec<CommentWithAuthor>;

/// Optimistic counterpart of a remote write, applied to each affected view
#[derive(Clone, Debug)]
enum Change {
    Upsert(CommentWithAuthor),
    Edit { id: CommentId, body: String },
    Resolve { target: CommentWithAuthor, resolved: bool },
    RemoveThread(CommentId),
}

fn sorted(mut rows: Rows) -> Rows {
    rows.sort_by_key(|r| r.comment.created_at);
    rows
}

impl Change {
    fn apply(&self, key: &CacheKey, rows: &[CommentWithAuthor]) -> Rows {
        match self {
            Change::Upsert(row) => {
                let mut rows = rows
                    .iter()
                    .filter(|r| r.comment.id != row.comment.id)
                    .cloned()
                    .collect::<Vec<_>>();
                if key.admits(&row.comment) {
                    rows.push(row.clone());
                }
                sorted(rows)
            }
            Change::Edit { id, body } => rows
                .iter()
                .cloned()
                .map(|mut r| {
                    if r.comment.id == *id {
                        r.comment.body = body.clone();
                    }
                    r
                })
                .collect(),
            Change::Resolve { target, resolved } => {
                let id = target.comment.id;
                let mut rows = rows
                    .iter()
                    .cloned()
                    .map(|mut r| {
                        if r.comment.in_thread_of(id) {
                            r.comment.resolved = *resolved;
                        }
                        r
                    })
                    .filter(|r| key.admits(&r.comment))
                    .collect::<Vec<_>>();
                let mut target = target.clone();
                target.comment.resolved = *resolved;
                if key.admits(&target.comment) && rows.iter().all(|r| r.comment.id != id) {
                    rows.push(target);
                }
                sorted(rows)
            }
            Change::RemoveThread(id) => rows
                .iter()
                .filter(|r| !r.comment.in_thread_of(*id))
                .cloned()
                .collect(),
        }
    }
}

/// Cached access to the comments of the store
///
/// Reads go through the fetch cache. Writes follow the same three steps:
/// optimistically mutate every affected key, write to the store, then
/// revalidate those keys whatever the outcome of the write. Write failures
/// are logged and never returned, revalidation brings the views back to the
/// state of the store.
#[derive(Clone)]
pub struct Repository {
    session: SessionContext,
    store: Rc<dyn RemoteStore>,
    cache: FetchCache<CacheKey, Rows>,
}

impl Repository {
    pub fn new(session: SessionContext) -> Repository {
        Repository {
            store: session.store(),
            session,
            cache: FetchCache::new(),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn project(&self) -> ProjectId {
        self.session.project()
    }

    /// Unresolved root comments pinned on `page_url`
    pub async fn list_for_page(&self, project: ProjectId, page_url: &str) -> Result<Rows, Error> {
        let key = CacheKey::PageComments {
            project,
            page_url: page_url.to_string(),
        };
        let filter = Filter::All(vec![
            Filter::is_null(Column::ParentId),
            Filter::eq(Column::ProjectId, project),
            Filter::eq(Column::PageUrl, page_url),
            Filter::eq(Column::Resolved, false),
        ]);
        self.fetch(key, filter).await
    }

    /// Root comments of `project` with the given resolution
    pub async fn list_by_resolution(&self, project: ProjectId, resolved: bool) -> Result<Rows, Error> {
        let filter = Filter::All(vec![
            Filter::is_null(Column::ParentId),
            Filter::eq(Column::ProjectId, project),
            Filter::eq(Column::Resolved, resolved),
        ]);
        self.fetch(CacheKey::Comments { project, resolved }, filter)
            .await
    }

    /// Replies to `parent`, whatever their resolution
    pub async fn list_thread(&self, parent: CommentId) -> Result<Rows, Error> {
        self.fetch(CacheKey::Thread(parent), Filter::eq(Column::ParentId, parent))
            .await
    }

    /// Read the result set identified by `key`
    pub async fn read(&self, key: &CacheKey) -> Result<Rows, Error> {
        match key {
            CacheKey::PageComments { project, page_url } => {
                self.list_for_page(*project, page_url).await
            }
            CacheKey::Comments { project, resolved } => {
                self.list_by_resolution(*project, *resolved).await
            }
            CacheKey::Thread(parent) => self.list_thread(*parent).await,
        }
    }

    pub fn ptr_eq(&self, other: &Repository) -> bool {
        self.cache.ptr_eq(&other.cache)
    }

    /// Uncached lookup of a single comment
    pub async fn find(&self, id: CommentId) -> Result<Option<CommentWithAuthor>, Error> {
        let rows = self
            .store
            .select_comments(&Filter::eq(Column::Id, id))
            .await
            .map_err(Error::remote_read)?;
        Ok(rows.into_iter().next())
    }

    pub fn state(&self, key: &CacheKey) -> QueryState<Rows> {
        self.cache.state(key)
    }

    pub fn is_fresh(&self, key: &CacheKey) -> bool {
        self.cache.is_fresh(key)
    }

    pub fn subscribe(
        &self,
        key: CacheKey,
        listener: impl Fn(&QueryState<Rows>) + 'static,
    ) -> Subscription {
        self.cache.subscribe(key, listener)
    }

    /// Returns the stored comment, or `None` if the store rejected it
    ///
    /// The comment is always authored by the signed-in user, whatever
    /// `new.author_id` says.
    pub async fn create_comment(&self, mut new: NewComment) -> Result<Option<Comment>, Error> {
        let user = self.session.require_user()?;
        if new.author_id != user.id {
            tracing::warn!(requested = %new.author_id, user = %user.id, "commenting as the signed-in user");
            new.author_id = user.id;
        }
        let row = CommentWithAuthor::provisional(&new, &user, Utc::now());
        let keys = affected_keys(&row.comment, WriteKind::Create);
        let created = self
            .write("create", keys, Change::Upsert(row), self.store.insert_comment(&new))
            .await;
        Ok(created)
    }

    /// Edit the body and/or the resolution of `comment`
    ///
    /// Resolution changes cascade to the replies, like `mark_resolved`.
    pub async fn update_comment(
        &self,
        comment: &CommentWithAuthor,
        update: CommentUpdate,
    ) -> Result<(), Error> {
        self.session.require_user()?;
        if let Some(body) = update.body {
            let c = &comment.comment;
            let change = Change::Edit {
                id: c.id,
                body: body.clone(),
            };
            let filter = Filter::eq(Column::Id, c.id);
            let update = CommentUpdate::body(body);
            self.write(
                "update",
                affected_keys(c, WriteKind::UpdateBody),
                change,
                self.store.update_comments(&filter, &update),
            )
            .await;
        }
        if let Some(resolved) = update.resolved {
            self.mark_resolved(comment, resolved).await?;
        }
        Ok(())
    }

    /// Set the resolution of `comment` and all its replies
    pub async fn mark_resolved(
        &self,
        comment: &CommentWithAuthor,
        resolved: bool,
    ) -> Result<(), Error> {
        self.session.require_user()?;
        let c = &comment.comment;
        let change = Change::Resolve {
            target: comment.clone(),
            resolved,
        };
        let filter = Filter::thread_of(c.id);
        let update = CommentUpdate::resolved(resolved);
        self.write(
            "resolve",
            affected_keys(c, WriteKind::SetResolved),
            change,
            self.store.update_comments(&filter, &update),
        )
        .await;
        Ok(())
    }

    /// Delete `comment` and all its replies
    pub async fn delete_comment(&self, comment: &CommentWithAuthor) -> Result<(), Error> {
        self.session.require_user()?;
        let c = &comment.comment;
        let filter = Filter::thread_of(c.id);
        self.write(
            "delete",
            affected_keys(c, WriteKind::Delete),
            Change::RemoveThread(c.id),
            self.store.delete_comments(&filter),
        )
        .await;
        Ok(())
    }

    async fn fetch(&self, key: CacheKey, filter: Filter) -> Result<Rows, Error> {
        let store = self.store.clone();
        let filter = Rc::new(filter);
        self.cache
            .fetch(key, move || {
                let store = store.clone();
                let filter = filter.clone();
                async move {
                    store
                        .select_comments(&filter)
                        .await
                        .map_err(Error::remote_read)
                }
            })
            .await
    }

    async fn write<T>(
        &self,
        op: &'static str,
        keys: Vec<CacheKey>,
        change: Change,
        remote: impl Future<Output = anyhow::Result<T>>,
    ) -> Option<T> {
        for key in &keys {
            self.cache.mutate(key, |rows| change.apply(key, rows));
        }
        let res = match remote.await {
            Ok(res) => Some(res),
            Err(err) => {
                let err = Error::remote_write(err);
                tracing::error!(op, %err, "remote write failed, reverting to the store's state");
                None
            }
        };
        let revalidations = keys.iter().map(|k| self.cache.revalidate(k));
        let results = futures::future::join_all(revalidations).await;
        for (key, res) in keys.iter().zip(results) {
            if let Err(err) = res {
                tracing::warn!(op, %key, %err, "failed revalidating after write");
            }
        }
        res
    }
}
