use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::Debug,
    future::Future,
    hash::Hash,
    rc::Rc,
};

use futures::{
    future::{LocalBoxFuture, Shared},
    FutureExt,
};

use crate::api::{Error, Subscription};

pub type Fetcher<V> = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<V, Error>>>;
type InFlight<V> = Shared<LocalBoxFuture<'static, Result<V, Error>>>;
type Listener<V> = Rc<dyn Fn(&QueryState<V>)>;

/// What a consumer of one cache key gets to see
#[derive(Clone, Debug, PartialEq)]
pub struct QueryState<V> {
    pub data: Option<V>,
    pub error: Option<Error>,

    /// No data yet, and a fetch is in flight
    pub is_loading: bool,

    /// A fetch is in flight, whether or not there is data
    pub is_validating: bool,
}

impl<V> Default for QueryState<V> {
    fn default() -> QueryState<V> {
        QueryState {
            data: None,
            error: None,
            is_loading: false,
            is_validating: false,
        }
    }
}

struct Entry<V> {
    data: Option<V>,
    error: Option<Error>,

    /// Set when `data` is the result of the latest fetch, cleared by revalidation
    fresh: bool,

    fetcher: Option<Fetcher<V>>,
    in_flight: Option<InFlight<V>>,

    /// Sequence number of the last fetch started for this key
    started: u64,

    /// Sequence number of the last fetch whose result was stored
    applied: u64,

    listeners: Vec<(u64, Listener<V>)>,
}

impl<V: Clone> Entry<V> {
    fn new() -> Entry<V> {
        Entry {
            data: None,
            error: None,
            fresh: false,
            fetcher: None,
            in_flight: None,
            started: 0,
            applied: 0,
            listeners: Vec::new(),
        }
    }

    fn state(&self) -> QueryState<V> {
        QueryState {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.in_flight.is_some() && self.data.is_none(),
            is_validating: self.in_flight.is_some(),
        }
    }
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    next_listener: u64,
}

/// Keyed, revalidating cache of fetch results
///
/// Entries live as long as the cache itself. All clones share the same
/// entries, and the cache is meant to be driven from a single event loop: no
/// `RefCell` borrow is ever held across an `.await`.
///
/// An optimistic `mutate` landing while a revalidation is in flight is
/// overwritten once that revalidation resolves. Writers are expected to
/// revalidate after their remote write, which reconciles that case.
pub struct FetchCache<K, V> {
    inner: Rc<RefCell<Inner<K, V>>>,
}

impl<K, V> Clone for FetchCache<K, V> {
    fn clone(&self) -> FetchCache<K, V> {
        FetchCache {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> FetchCache<K, V>
where
    K: Clone + Debug + Eq + Hash + 'static,
    V: Clone + 'static,
{
    pub fn new() -> FetchCache<K, V> {
        FetchCache {
            inner: Rc::new(RefCell::new(Inner {
                entries: HashMap::new(),
                next_listener: 0,
            })),
        }
    }

    /// Read-through fetch
    ///
    /// Returns the cached value if it is fresh, joins the in-flight fetch if
    /// there is one, and otherwise runs `fetcher`. The fetcher is remembered
    /// for later revalidations of `key`.
    pub async fn fetch<F, Fut>(&self, key: K, fetcher: F) -> Result<V, Error>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<V, Error>> + 'static,
    {
        let fetcher: Fetcher<V> = Rc::new(move || fetcher().boxed_local());
        let (in_flight, started) = {
            let mut inner = self.inner.borrow_mut();
            let entry = inner.entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.fetcher = Some(fetcher.clone());
            if let (true, Some(data)) = (entry.fresh, &entry.data) {
                return Ok(data.clone());
            }
            match &entry.in_flight {
                Some(f) => (f.clone(), false),
                None => (self.start(&key, entry, fetcher), true),
            }
        };
        if started {
            self.notify(&key);
        }
        let res = in_flight.await?;
        // a newer fetch may have landed in the meantime
        Ok(self.state(&key).data.unwrap_or(res))
    }

    /// Optimistically replace the cached value of `key`
    ///
    /// Does not touch the remote store nor the freshness of the entry. Keys
    /// without a value are left alone, and `false` is returned.
    pub fn mutate(&self, key: &K, transform: impl FnOnce(&V) -> V) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            let data = match inner.entries.get_mut(key).and_then(|e| e.data.as_mut()) {
                Some(data) => data,
                None => return false,
            };
            *data = transform(data);
        }
        self.notify(key);
        true
    }

    /// Mark `key` as stale and re-run its fetcher
    ///
    /// Keys that were never fetched have no fetcher, and only get marked stale.
    pub async fn revalidate(&self, key: &K) -> Result<(), Error> {
        let in_flight = {
            let mut inner = self.inner.borrow_mut();
            let entry = match inner.entries.get_mut(key) {
                Some(entry) => entry,
                None => return Ok(()),
            };
            entry.fresh = false;
            let fetcher = match entry.fetcher.clone() {
                Some(fetcher) => fetcher,
                None => return Ok(()),
            };
            self.start(key, entry, fetcher)
        };
        self.notify(key);
        in_flight.await.map(|_| ())
    }

    pub fn state(&self, key: &K) -> QueryState<V> {
        self.inner
            .borrow()
            .entries
            .get(key)
            .map(|e| e.state())
            .unwrap_or_default()
    }

    pub fn is_fresh(&self, key: &K) -> bool {
        self.inner
            .borrow()
            .entries
            .get(key)
            .map(|e| e.fresh)
            .unwrap_or(false)
    }

    /// Whether both handles share the same entries
    pub fn ptr_eq(&self, other: &FetchCache<K, V>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.borrow().entries.keys().cloned().collect()
    }

    /// Call `listener` with the new state of `key` every time it changes
    pub fn subscribe(&self, key: K, listener: impl Fn(&QueryState<V>) + 'static) -> Subscription {
        let listener: Listener<V> = Rc::new(listener);
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_listener;
            inner.next_listener += 1;
            inner
                .entries
                .entry(key.clone())
                .or_insert_with(Entry::new)
                .listeners
                .push((id, listener));
            id
        };
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Some(entry) = inner.borrow_mut().entries.get_mut(&key) {
                    entry.listeners.retain(|(i, _)| *i != id);
                }
            }
        })
    }

    fn start(&self, key: &K, entry: &mut Entry<V>, fetcher: Fetcher<V>) -> InFlight<V> {
        entry.started += 1;
        let seq = entry.started;
        let weak = Rc::downgrade(&self.inner);
        let key = key.clone();
        let fut = async move {
            let res = fetcher().await;
            if let Some(inner) = weak.upgrade() {
                FetchCache { inner }.settle(&key, seq, &res);
            }
            res
        }
        .boxed_local()
        .shared();
        entry.in_flight = Some(fut.clone());
        fut
    }

    fn settle(&self, key: &K, seq: u64, res: &Result<V, Error>) {
        {
            let mut inner = self.inner.borrow_mut();
            let entry = match inner.entries.get_mut(key) {
                Some(entry) => entry,
                None => return,
            };
            let latest = seq == entry.started;
            if latest {
                entry.in_flight = None;
            }
            if seq <= entry.applied {
                tracing::debug!(?key, seq, applied = entry.applied, "discarding outdated fetch result");
                return;
            }
            entry.applied = seq;
            match res {
                Ok(v) => {
                    entry.data = Some(v.clone());
                    entry.error = None;
                    entry.fresh = latest;
                }
                Err(err) => {
                    tracing::warn!(?key, %err, "fetch failed");
                    entry.error = Some(err.clone());
                }
            }
        }
        self.notify(key);
    }

    fn notify(&self, key: &K) {
        let (state, listeners) = {
            let inner = self.inner.borrow();
            let entry = match inner.entries.get(key) {
                Some(entry) => entry,
                None => return,
            };
            let listeners = entry
                .listeners
                .iter()
                .map(|(_, l)| l.clone())
                .collect::<Vec<_>>();
            (entry.state(), listeners)
        };
        for l in listeners {
            l(&state);
        }
    }
}

impl<K, V> Default for FetchCache<K, V>
where
    K: Clone + Debug + Eq + Hash + 'static,
    V: Clone + 'static,
{
    fn default() -> FetchCache<K, V> {
        FetchCache::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        panic::AssertUnwindSafe,
        rc::Rc,
    };

    use super::*;

    type Cache = FetchCache<&'static str, u32>;

    /// Fake remote: a value and a counter of reads
    #[derive(Clone, Default)]
    struct Remote {
        value: Rc<Cell<u32>>,
        reads: Rc<Cell<usize>>,
        failing: Rc<Cell<bool>>,
    }

    impl Remote {
        fn fetcher(&self) -> impl Fn() -> LocalBoxFuture<'static, Result<u32, Error>> + 'static {
            let remote = self.clone();
            move || {
                let remote = remote.clone();
                async move {
                    remote.reads.set(remote.reads.get() + 1);
                    tokio::task::yield_now().await;
                    match remote.failing.get() {
                        true => Err(Error::RemoteRead(String::from("offline"))),
                        false => Ok(remote.value.get()),
                    }
                }
                .boxed_local()
            }
        }
    }

    #[tokio::test]
    async fn read_through_then_cached() {
        let cache = Cache::new();
        let remote = Remote::default();
        remote.value.set(4);

        assert_eq!(cache.fetch("k", remote.fetcher()).await, Ok(4));
        remote.value.set(5);
        assert_eq!(cache.fetch("k", remote.fetcher()).await, Ok(4));
        assert_eq!(remote.reads.get(), 1);
        assert!(cache.is_fresh(&"k"));
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_request() {
        let cache = Cache::new();
        let remote = Remote::default();
        remote.value.set(7);

        let (a, b, c) = futures::join!(
            cache.fetch("k", remote.fetcher()),
            cache.fetch("k", remote.fetcher()),
            cache.fetch("k", remote.fetcher()),
        );
        assert_eq!((a, b, c), (Ok(7), Ok(7), Ok(7)));
        assert_eq!(remote.reads.get(), 1);
    }

    #[tokio::test]
    async fn mutate_is_local_and_keeps_freshness() {
        let cache = Cache::new();
        let remote = Remote::default();
        remote.value.set(1);

        // nothing cached yet: nothing to mutate
        assert!(!cache.mutate(&"k", |v| v + 10));
        assert_eq!(cache.state(&"k").data, None);

        cache.fetch("k", remote.fetcher()).await.unwrap();
        assert!(cache.mutate(&"k", |v| v + 10));
        assert_eq!(cache.state(&"k").data, Some(11));
        assert!(cache.is_fresh(&"k"));
        assert_eq!(remote.reads.get(), 1);
    }

    #[tokio::test]
    async fn revalidate_reconciles_with_remote() {
        let cache = Cache::new();
        let remote = Remote::default();
        remote.value.set(1);
        cache.fetch("k", remote.fetcher()).await.unwrap();

        cache.mutate(&"k", |_| 99);
        remote.value.set(2);
        cache.revalidate(&"k").await.unwrap();
        assert_eq!(cache.state(&"k").data, Some(2));
        assert!(cache.is_fresh(&"k"));
        assert_eq!(remote.reads.get(), 2);
    }

    #[tokio::test]
    async fn revalidate_unknown_key_is_noop() {
        let cache = Cache::new();
        cache.revalidate(&"nope").await.unwrap();
        assert!(cache.keys().is_empty());
    }

    #[tokio::test]
    async fn read_errors_are_reported_and_keep_data() {
        let cache = Cache::new();
        let remote = Remote::default();
        remote.value.set(3);
        cache.fetch("k", remote.fetcher()).await.unwrap();

        remote.failing.set(true);
        assert!(matches!(
            cache.revalidate(&"k").await,
            Err(Error::RemoteRead(_))
        ));
        let state = cache.state(&"k");
        assert_eq!(state.data, Some(3));
        assert!(matches!(state.error, Some(Error::RemoteRead(_))));
        assert!(!cache.is_fresh(&"k"));

        // stale entries are refetched on the next read
        remote.failing.set(false);
        remote.value.set(8);
        assert_eq!(cache.fetch("k", remote.fetcher()).await, Ok(8));
        assert_eq!(cache.state(&"k").error, None);
    }

    #[tokio::test]
    async fn latest_revalidation_wins() {
        let cache = Cache::new();
        let remote = Remote::default();
        remote.value.set(1);
        cache.fetch("k", remote.fetcher()).await.unwrap();

        // start a revalidation, then another one after a remote write;
        // whatever the completion order, the later one is what sticks
        let first = cache.revalidate(&"k");
        let second = async {
            remote.value.set(2);
            cache.revalidate(&"k").await
        };
        let (a, b) = futures::join!(first, second);
        assert_eq!((a, b), (Ok(()), Ok(())));
        assert_eq!(cache.state(&"k").data, Some(2));
        assert!(!cache.state(&"k").is_validating);
    }

    #[tokio::test]
    async fn subscribers_see_every_change() {
        let cache = Cache::new();
        let remote = Remote::default();
        remote.value.set(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sub = {
            let seen = seen.clone();
            cache.subscribe("k", move |s| seen.borrow_mut().push((s.data.clone(), s.is_loading)))
        };

        cache.fetch("k", remote.fetcher()).await.unwrap();
        cache.mutate(&"k", |v| v + 1);
        assert_eq!(
            *seen.borrow(),
            vec![(None, true), (Some(1), false), (Some(2), false)],
        );

        drop(sub);
        cache.mutate(&"k", |v| v + 1);
        assert_eq!(seen.borrow().len(), 3);
    }

    #[derive(Clone, Debug, bolero::generator::TypeGenerator)]
    enum Op {
        Mutate(u32),
        RemoteWrite(u32),
        Revalidate,
    }

    #[test]
    fn revalidation_always_lands_on_remote_truth() {
        let runtime = AssertUnwindSafe(
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed initializing tokio runtime"),
        );
        bolero::check!()
            .with_type::<Vec<Op>>()
            .cloned()
            .for_each(move |ops: Vec<Op>| {
                runtime.block_on(async {
                    let cache = Cache::new();
                    let remote = Remote::default();
                    cache.fetch("k", remote.fetcher()).await.unwrap();
                    for op in &ops {
                        match op {
                            Op::Mutate(v) => {
                                let v = *v;
                                cache.mutate(&"k", move |_| v);
                            }
                            Op::RemoteWrite(v) => remote.value.set(*v),
                            Op::Revalidate => cache.revalidate(&"k").await.unwrap(),
                        }
                    }
                    cache.revalidate(&"k").await.unwrap();
                    assert_eq!(cache.state(&"k").data, Some(remote.value.get()));
                    assert!(cache.is_fresh(&"k"));
                })
            });
    }
}
