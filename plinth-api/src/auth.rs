use std::{cell::RefCell, rc::Rc};

use crate::SessionUser;

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: SessionUser,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

pub type AuthCallback = Box<dyn Fn(AuthEvent, Option<Session>)>;

/// Keeps a listener registered until dropped or explicitly unsubscribed
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Subscription {
        Subscription {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f()
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f()
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

type Listener = Rc<dyn Fn(AuthEvent, Option<Session>)>;

/// Fan-out of auth-state-change events, shared by the store implementations
#[derive(Clone, Default)]
pub struct AuthListeners {
    inner: Rc<RefCell<ListenersInner>>,
}

#[derive(Default)]
struct ListenersInner {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

impl AuthListeners {
    pub fn new() -> AuthListeners {
        AuthListeners::default()
    }

    pub fn subscribe(&self, callback: AuthCallback) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Rc::from(callback)));
            id
        };
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().listeners.retain(|(i, _)| *i != id);
            }
        })
    }

    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        // listeners may (un)subscribe while being called
        let listeners = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect::<Vec<_>>();
        tracing::debug!(?event, num_listeners = listeners.len(), "emitting auth event");
        for l in listeners {
            l(event, session.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn dropping_subscription_unsubscribes() {
        let listeners = AuthListeners::new();
        let seen = Rc::new(Cell::new(0));
        let sub = {
            let seen = seen.clone();
            listeners.subscribe(Box::new(move |_, _| seen.set(seen.get() + 1)))
        };
        listeners.emit(AuthEvent::SignedOut, None);
        assert_eq!(seen.get(), 1);
        assert_eq!(listeners.len(), 1);

        drop(sub);
        listeners.emit(AuthEvent::SignedOut, None);
        assert_eq!(seen.get(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn explicit_unsubscribe() {
        let listeners = AuthListeners::new();
        let sub = listeners.subscribe(Box::new(|_, _| ()));
        let other = listeners.subscribe(Box::new(|_, _| ()));
        sub.unsubscribe();
        assert_eq!(listeners.len(), 1);
        drop(other);
        assert!(listeners.is_empty());
    }
}
