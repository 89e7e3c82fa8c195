use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod auth;
pub use auth::{AuthCallback, AuthEvent, AuthListeners, Session, Subscription};

mod comment;
pub use comment::{Comment, CommentId, CommentUpdate, CommentWithAuthor, Coordinates, NewComment};

mod config;
pub use config::BackendConfig;

mod db;
pub use db::RemoteStore;

mod error;
pub use error::Error;

mod project;
pub use project::ProjectId;

mod query;
pub use query::{Column, Filter, Value};

mod user;
pub use user::{SessionUser, UserId};
