use std::{cell::RefCell, collections::BTreeMap};

use anyhow::{anyhow, ensure};
use async_trait::async_trait;
use plinth_api::{
    AuthCallback, AuthEvent, AuthListeners, Comment, CommentUpdate, CommentWithAuthor, Filter,
    NewComment, RemoteStore, Session, SessionUser, Subscription, Time, UserId, Uuid,
};

/// In-memory stand-in for the backend, with call accounting and failure injection
pub struct MockStore {
    db: RefCell<MockDb>,
    listeners: AuthListeners,
}

/// Number of remote calls the store has served, per kind
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Calls {
    pub selects: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub session_fetches: usize,
}

impl Calls {
    pub fn writes(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }

    pub fn total(&self) -> usize {
        self.selects + self.writes() + self.session_fetches
    }
}

struct MockDb {
    users: BTreeMap<UserId, DbUser>,
    comments: Vec<Comment>,
    session: Option<Session>,
    clock: Time,
    calls: Calls,
    fail_reads: bool,
    fail_writes: bool,
    writes_paused: bool,
}

#[derive(Debug)]
struct DbUser {
    user: SessionUser,
    password: String,
}

impl MockDb {
    fn tick(&mut self) -> Time {
        self.clock = self.clock + chrono::Duration::seconds(1);
        self.clock
    }

    fn with_author(&self, c: &Comment) -> CommentWithAuthor {
        let author = self.users.get(&c.author_id).map(|u| &u.user);
        CommentWithAuthor {
            comment: c.clone(),
            author_first_name: author
                .and_then(|a| a.first_name.clone())
                .unwrap_or_default(),
            author_last_name: author
                .and_then(|a| a.last_name.clone())
                .unwrap_or_default(),
            author_avatar_url: author.and_then(|a| a.avatar_url.clone()),
        }
    }

    fn current_user(&self) -> anyhow::Result<UserId> {
        self.session
            .as_ref()
            .map(|s| s.user.id)
            .ok_or_else(|| anyhow!("permission denied: no session"))
    }

    fn check_writable(&self) -> anyhow::Result<UserId> {
        ensure!(!self.fail_writes, "injected write failure");
        self.current_user()
    }

    fn insert(&mut self, new: &NewComment) -> anyhow::Result<Comment> {
        ensure!(
            self.comments.iter().all(|c| c.id != new.id),
            "comment id {} already used",
            new.id
        );
        if let Some(parent_id) = new.parent_id {
            let parent = self
                .comments
                .iter()
                .find(|c| c.id == parent_id)
                .ok_or_else(|| anyhow!("parent comment {parent_id} does not exist"))?;
            ensure!(parent.is_root(), "parent comment {parent_id} is a reply");
            ensure!(
                parent.project_id == new.project_id,
                "parent comment {parent_id} belongs to another project"
            );
        }
        let c = Comment {
            id: new.id,
            project_id: new.project_id,
            author_id: new.author_id,
            body: new.body.clone(),
            page_url: new.page_url.clone(),
            element_xpath: new.element_xpath.clone(),
            coordinates: new.coordinates,
            parent_id: new.parent_id,
            resolved: false,
            created_at: self.tick(),
        };
        self.comments.push(c.clone());
        Ok(c)
    }
}

impl MockStore {
    pub fn new() -> MockStore {
        MockStore {
            db: RefCell::new(MockDb {
                users: BTreeMap::new(),
                comments: Vec::new(),
                session: None,
                clock: chrono::Utc::now(),
                calls: Calls::default(),
                fail_reads: false,
                fail_writes: false,
                writes_paused: false,
            }),
            listeners: AuthListeners::new(),
        }
    }

    pub fn add_user(&self, email: &str, first: &str, last: &str, password: &str) -> SessionUser {
        let user = SessionUser {
            id: UserId(Uuid::new_v4()),
            email: Some(email.to_string()),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            avatar_url: None,
        };
        self.db.borrow_mut().users.insert(
            user.id,
            DbUser {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Open a session for `user` without checking credentials
    pub fn sign_in_as(&self, user: &SessionUser) -> Session {
        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: None,
            user: user.clone(),
        };
        self.db.borrow_mut().session = Some(session.clone());
        self.listeners
            .emit(AuthEvent::SignedIn, Some(session.clone()));
        session
    }

    /// Insert a comment bypassing authorization and call accounting
    pub fn seed(&self, new: NewComment) -> anyhow::Result<Comment> {
        self.db.borrow_mut().insert(&new)
    }

    /// Rows as currently stored, oldest first
    pub fn comments(&self) -> Vec<Comment> {
        self.db.borrow().comments.clone()
    }

    pub fn calls(&self) -> Calls {
        self.db.borrow().calls
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.db.borrow_mut().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.db.borrow_mut().fail_writes = fail;
    }

    pub fn auth_listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Hold every write request before it reaches the rows, until `resume_writes`
    pub fn pause_writes(&self) {
        self.db.borrow_mut().writes_paused = true;
    }

    pub fn resume_writes(&self) {
        self.db.borrow_mut().writes_paused = false;
    }

    async fn write_gate(&self) {
        while self.db.borrow().writes_paused {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for MockStore {
    fn default() -> MockStore {
        MockStore::new()
    }
}

#[async_trait(?Send)]
impl RemoteStore for MockStore {
    async fn select_comments(&self, filter: &Filter) -> anyhow::Result<Vec<CommentWithAuthor>> {
        {
            let mut db = self.db.borrow_mut();
            db.calls.selects += 1;
            ensure!(!db.fail_reads, "injected read failure");
        }
        // let concurrent callers interleave like a real network round-trip
        tokio::task::yield_now().await;
        let db = self.db.borrow();
        let rows = db
            .comments
            .iter()
            .map(|c| db.with_author(c))
            .filter(|c| filter.matches(c))
            .collect::<Vec<_>>();
        Ok(rows)
    }

    async fn insert_comment(&self, comment: &NewComment) -> anyhow::Result<Comment> {
        self.write_gate().await;
        let mut db = self.db.borrow_mut();
        db.calls.inserts += 1;
        let user = db.check_writable()?;
        ensure!(
            user == comment.author_id,
            "permission denied: cannot comment as {}",
            comment.author_id
        );
        let c = db.insert(comment)?;
        tracing::debug!(id = %c.id, "mock store inserted comment");
        Ok(c)
    }

    async fn update_comments(
        &self,
        filter: &Filter,
        update: &CommentUpdate,
    ) -> anyhow::Result<()> {
        self.write_gate().await;
        let mut db = self.db.borrow_mut();
        db.calls.updates += 1;
        db.check_writable()?;
        let matching = db
            .comments
            .iter()
            .enumerate()
            .filter(|(_, c)| filter.matches(&db.with_author(c)))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        for i in matching {
            update.apply_to(&mut db.comments[i]);
        }
        Ok(())
    }

    async fn delete_comments(&self, filter: &Filter) -> anyhow::Result<()> {
        self.write_gate().await;
        let mut db = self.db.borrow_mut();
        db.calls.deletes += 1;
        db.check_writable()?;
        let kept = db
            .comments
            .iter()
            .filter(|c| !filter.matches(&db.with_author(c)))
            .cloned()
            .collect::<Vec<_>>();
        db.comments = kept;
        Ok(())
    }

    async fn get_session(&self) -> anyhow::Result<Option<Session>> {
        let mut db = self.db.borrow_mut();
        db.calls.session_fetches += 1;
        Ok(db.session.clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        let user = self
            .db
            .borrow()
            .users
            .values()
            .find(|u| u.user.email.as_deref() == Some(email) && u.password == password)
            .map(|u| u.user.clone())
            .ok_or_else(|| anyhow!("invalid login credentials"))?;
        Ok(self.sign_in_as(&user))
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        self.db.borrow_mut().session = None;
        self.listeners.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    fn on_auth_state_change(&self, callback: AuthCallback) -> Subscription {
        self.listeners.subscribe(callback)
    }
}
