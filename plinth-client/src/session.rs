use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use crate::{
    api::{BackendConfig, Error, ProjectId, RemoteStore, Session, SessionUser, Subscription},
    PostgrestStore,
};

type Watcher = Rc<dyn Fn(Option<&Session>)>;
type Connector = Box<dyn Fn(&BackendConfig) -> anyhow::Result<Rc<dyn RemoteStore>>>;

/// One store handle per backend endpoint, connected on first use
pub struct ClientRegistry {
    connect: Connector,
    clients: RefCell<HashMap<String, Rc<dyn RemoteStore>>>,
}

impl ClientRegistry {
    pub fn new(
        connect: impl Fn(&BackendConfig) -> anyhow::Result<Rc<dyn RemoteStore>> + 'static,
    ) -> ClientRegistry {
        ClientRegistry {
            connect: Box::new(connect),
            clients: RefCell::new(HashMap::new()),
        }
    }

    pub fn postgrest() -> ClientRegistry {
        ClientRegistry::new(|config| {
            let store: Rc<dyn RemoteStore> = Rc::new(PostgrestStore::new(config.clone())?);
            Ok(store)
        })
    }

    pub fn get_or_connect(&self, config: &BackendConfig) -> Result<Rc<dyn RemoteStore>, Error> {
        config.validate()?;
        if let Some(client) = self.clients.borrow().get(config.endpoint()) {
            return Ok(client.clone());
        }
        tracing::info!(endpoint = config.endpoint(), "connecting to backend");
        let client = (self.connect)(config).map_err(|e| Error::InvalidConfig(format!("{e:#}")))?;
        self.clients
            .borrow_mut()
            .insert(config.endpoint().to_string(), client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct SessionState {
    project: ProjectId,
    session: RefCell<Option<Session>>,
    saw_event: Cell<bool>,
    next_watcher: Cell<u64>,
    watchers: RefCell<Vec<(u64, Watcher)>>,
}

impl SessionState {
    fn set(&self, session: Option<Session>) {
        *self.session.borrow_mut() = session;
        let watchers = self
            .watchers
            .borrow()
            .iter()
            .map(|(_, w)| w.clone())
            .collect::<Vec<_>>();
        let session = self.session.borrow().clone();
        for w in watchers {
            w(session.as_ref());
        }
    }
}

/// Current session and active project, kept in sync with the store's auth events
///
/// Clones share the same state. The auth subscription is released when the
/// last clone is dropped.
#[derive(Clone)]
pub struct SessionContext {
    store: Rc<dyn RemoteStore>,
    state: Rc<SessionState>,
    _subscription: Rc<Subscription>,
}

impl SessionContext {
    pub async fn init(store: Rc<dyn RemoteStore>, project: ProjectId) -> SessionContext {
        let state = Rc::new(SessionState {
            project,
            session: RefCell::new(None),
            saw_event: Cell::new(false),
            next_watcher: Cell::new(0),
            watchers: RefCell::new(Vec::new()),
        });

        // subscribe first so no event can fall between the fetch and the subscription
        let subscription = {
            let state = Rc::downgrade(&state);
            store.on_auth_state_change(Box::new(move |event, session| {
                if let Some(state) = state.upgrade() {
                    tracing::debug!(?event, "auth state changed");
                    state.saw_event.set(true);
                    state.set(session);
                }
            }))
        };

        match store.get_session().await {
            Ok(session) if !state.saw_event.get() => state.set(session),
            Ok(_) => tracing::debug!("ignoring initial session, superseded by an auth event"),
            Err(err) => tracing::error!(err = %format!("{err:#}"), "failed fetching the current session"),
        }

        SessionContext {
            store,
            state,
            _subscription: Rc::new(subscription),
        }
    }

    pub fn store(&self) -> Rc<dyn RemoteStore> {
        self.store.clone()
    }

    pub fn project(&self) -> ProjectId {
        self.state.project
    }

    pub fn session(&self) -> Option<Session> {
        self.state.session.borrow().clone()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.state.session.borrow().as_ref().map(|s| s.user.clone())
    }

    pub fn require_user(&self) -> Result<SessionUser, Error> {
        self.user().ok_or(Error::NotAuthenticated)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser, Error> {
        let session = self
            .store
            .sign_in_with_password(email, password)
            .await
            .map_err(|err| {
                tracing::warn!(email, err = %format!("{err:#}"), "sign in failed");
                Error::NotAuthenticated
            })?;
        Ok(session.user)
    }

    pub async fn sign_out(&self) -> Result<(), Error> {
        self.store.sign_out().await.map_err(|err| Error::Unknown(format!("{err:#}")))
    }

    /// Call `watcher` with the new session every time it changes
    pub fn watch(&self, watcher: impl Fn(Option<&Session>) + 'static) -> Subscription {
        let id = self.state.next_watcher.get();
        self.state.next_watcher.set(id + 1);
        self.state
            .watchers
            .borrow_mut()
            .push((id, Rc::new(watcher)));
        let state = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.watchers.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use plinth_mock_server::MockStore;

    use super::*;

    fn config(url: &str) -> BackendConfig {
        BackendConfig {
            url: url.to_string(),
            anon_key: String::from("anon"),
            project_id: ProjectId::stub(),
        }
    }

    #[test]
    fn registry_reuses_clients_per_endpoint() {
        let connections = Rc::new(Cell::new(0));
        let registry = {
            let connections = connections.clone();
            ClientRegistry::new(move |_| {
                connections.set(connections.get() + 1);
                let store: Rc<dyn RemoteStore> = Rc::new(MockStore::new());
                Ok(store)
            })
        };

        let a = registry.get_or_connect(&config("https://a.example.org")).unwrap();
        let b = registry.get_or_connect(&config("https://a.example.org/")).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        registry.get_or_connect(&config("https://b.example.org")).unwrap();
        assert_eq!(connections.get(), 2);
        assert_eq!(registry.len(), 2);

        assert!(matches!(
            registry.get_or_connect(&config("ftp://c.example.org")),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(connections.get(), 2);
    }

    #[tokio::test]
    async fn follows_auth_events() {
        let store = Rc::new(MockStore::new());
        let ada = store.add_user("ada@example.org", "Ada", "Lovelace", "pass");
        let ctx = SessionContext::init(store.clone(), ProjectId::stub()).await;
        assert_eq!(ctx.project(), ProjectId::stub());
        assert_eq!(ctx.require_user(), Err(Error::NotAuthenticated));
        assert_eq!(store.calls().session_fetches, 1);

        let seen = Rc::new(Cell::new(0));
        let _watch = {
            let seen = seen.clone();
            ctx.watch(move |_| seen.set(seen.get() + 1))
        };
        assert_eq!(ctx.sign_in("ada@example.org", "pass").await, Ok(ada.clone()));
        assert_eq!(ctx.require_user(), Ok(ada));
        ctx.sign_out().await.unwrap();
        assert_eq!(ctx.session(), None);
        assert_eq!(seen.get(), 2);

        assert_eq!(
            ctx.sign_in("ada@example.org", "wrong").await,
            Err(Error::NotAuthenticated)
        );
    }

    #[tokio::test]
    async fn picks_up_existing_session() {
        let store = Rc::new(MockStore::new());
        let ada = store.add_user("ada@example.org", "Ada", "Lovelace", "pass");
        store.sign_in_as(&ada);
        let ctx = SessionContext::init(store.clone(), ProjectId::stub()).await;
        assert_eq!(ctx.user(), Some(ada));
    }

    #[tokio::test]
    async fn dropping_the_context_unsubscribes() {
        let store = Rc::new(MockStore::new());
        let ctx = SessionContext::init(store.clone(), ProjectId::stub()).await;
        let clone = ctx.clone();
        assert_eq!(store.auth_listener_count(), 1);
        drop(ctx);
        assert_eq!(store.auth_listener_count(), 1);
        drop(clone);
        assert_eq!(store.auth_listener_count(), 0);
    }
}
