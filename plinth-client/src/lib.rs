mod cache;
pub use cache::{FetchCache, Fetcher, QueryState};

mod key;
pub use key::{affected_keys, CacheKey, WriteKind};

mod locator;
pub use locator::{locate, page_url, DomNode, LocateOptions, NodeKind};

mod postgrest;
pub use postgrest::PostgrestStore;

mod repository;
pub use repository::{Repository, Rows};

mod session;
pub use session::{ClientRegistry, SessionContext};

mod time;
pub use time::time_ago;

pub mod api {
    pub use plinth_api::*;
}
