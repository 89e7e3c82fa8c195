use std::future::Future;

use plinth_client::api::Error;
use wasm_bindgen_futures::spawn_local;

mod app;
pub use app::{App, AppProps, Mode, StoreHandle};

mod comment_pin;
pub use comment_pin::CommentPin;

mod inbox;
pub use inbox::Inbox;

mod login;
pub use login::{Login, LoginInfo};

mod new_comment;
pub use new_comment::{Draft, NewCommentPopover};

mod toolbar;
pub use toolbar::Toolbar;

/// Run a repository write in the background, logging refusals
pub fn spawn_write<T>(op: &'static str, write: impl Future<Output = Result<T, Error>> + 'static) {
    spawn_local(async move {
        if let Err(err) = write.await {
            tracing::warn!(op, %err, "comment write refused");
        }
    })
}
