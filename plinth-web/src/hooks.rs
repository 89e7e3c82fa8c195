use plinth_client::{
    api::{CommentId, ProjectId},
    CacheKey, QueryState, Repository, Rows,
};
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

/// Repository shared with the whole component tree
#[derive(Clone)]
pub struct RepoContext(pub Repository);

impl PartialEq for RepoContext {
    fn eq(&self, other: &RepoContext) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

#[hook]
fn use_cached(key: CacheKey) -> QueryState<Rows> {
    let repo = use_context::<RepoContext>();
    let state = use_state(QueryState::default);
    {
        let state = state.clone();
        use_effect_with_deps(
            move |(repo, key)| {
                let subscription = repo.as_ref().map(|RepoContext(repo)| {
                    let subscription = {
                        let state = state.clone();
                        repo.subscribe(key.clone(), move |s| state.set(s.clone()))
                    };
                    state.set(repo.state(key));
                    let repo = repo.clone();
                    let key = key.clone();
                    spawn_local(async move {
                        if let Err(err) = repo.read(&key).await {
                            tracing::warn!(%key, %err, "failed loading comments");
                        }
                    });
                    subscription
                });
                if subscription.is_none() {
                    tracing::error!("comment hooks used outside of a repository context");
                }
                move || drop(subscription)
            },
            (repo, key),
        );
    }
    (*state).clone()
}

/// Unresolved pins of one page
#[hook]
pub fn use_page_comments(project: ProjectId, page_url: String) -> QueryState<Rows> {
    use_cached(CacheKey::PageComments { project, page_url })
}

#[hook]
pub fn use_comments(project: ProjectId, resolved: bool) -> QueryState<Rows> {
    use_cached(CacheKey::Comments { project, resolved })
}

#[hook]
pub fn use_thread(parent: CommentId) -> QueryState<Rows> {
    use_cached(CacheKey::Thread(parent))
}
