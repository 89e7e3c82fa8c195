use async_trait::async_trait;

use crate::{
    AuthCallback, Comment, CommentUpdate, CommentWithAuthor, Filter, NewComment, Session,
    Subscription,
};

/// Row store holding the comments, plus the auth service guarding it
///
/// Everything runs on a single event loop, hence the non-`Send` futures.
#[async_trait(?Send)]
pub trait RemoteStore {
    /// Rows of the comments-with-author view matching `filter`, oldest first
    async fn select_comments(&self, filter: &Filter) -> anyhow::Result<Vec<CommentWithAuthor>>;
    async fn insert_comment(&self, comment: &NewComment) -> anyhow::Result<Comment>;
    async fn update_comments(&self, filter: &Filter, update: &CommentUpdate)
        -> anyhow::Result<()>;
    async fn delete_comments(&self, filter: &Filter) -> anyhow::Result<()>;

    async fn get_session(&self) -> anyhow::Result<Option<Session>>;
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> anyhow::Result<Session>;
    async fn sign_out(&self) -> anyhow::Result<()>;
    fn on_auth_state_change(&self, callback: AuthCallback) -> Subscription;
}
