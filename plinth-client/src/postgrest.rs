use std::cell::RefCell;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Method;

use crate::api::{
    AuthCallback, AuthEvent, AuthListeners, BackendConfig, Comment, CommentUpdate,
    CommentWithAuthor, Filter, NewComment, RemoteStore, Session, SessionUser, Subscription, UserId,
};

const COMMENTS: &str = "/rest/v1/comments";
const COMMENTS_WITH_AUTHOR: &str = "/rest/v1/comments_with_author";

/// `RemoteStore` backed by a PostgREST api and its GoTrue auth service
pub struct PostgrestStore {
    config: BackendConfig,
    client: reqwest::Client,
    session: RefCell<Option<Session>>,
    listeners: AuthListeners,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    user: AuthUser,
}

#[derive(serde::Deserialize)]
struct AuthUser {
    id: UserId,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Default, serde::Deserialize)]
struct UserMetadata {
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<TokenResponse> for Session {
    fn from(t: TokenResponse) -> Session {
        Session {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            user: SessionUser {
                id: t.user.id,
                email: t.user.email,
                first_name: t.user.user_metadata.first_name,
                last_name: t.user.user_metadata.last_name,
                avatar_url: t.user.user_metadata.avatar_url,
            },
        }
    }
}

impl PostgrestStore {
    pub fn new(config: BackendConfig) -> anyhow::Result<PostgrestStore> {
        PostgrestStore::with_session(config, None)
    }

    /// Resume a session saved by a previous run
    pub fn with_session(
        config: BackendConfig,
        session: Option<Session>,
    ) -> anyhow::Result<PostgrestStore> {
        config.validate()?;
        Ok(PostgrestStore {
            config,
            client: reqwest::Client::new(),
            session: RefCell::new(session),
            listeners: AuthListeners::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let token = self
            .session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.config.anon_key.clone());
        self.client
            .request(method, format!("{}{path}", self.config.endpoint()))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }

    fn set_session(&self, event: AuthEvent, session: Option<Session>) {
        *self.session.borrow_mut() = session.clone();
        self.listeners.emit(event, session);
    }
}

#[async_trait(?Send)]
impl RemoteStore for PostgrestStore {
    async fn select_comments(&self, filter: &Filter) -> anyhow::Result<Vec<CommentWithAuthor>> {
        let resp = self
            .request(Method::GET, COMMENTS_WITH_AUTHOR)
            .query(&[("select", "*"), ("order", "created_at.asc")])
            .query(&filter.to_query_pairs())
            .send()
            .await
            .context("sending select request")?
            .error_for_status()
            .with_context(|| format!("selecting comments matching {filter:?}"))?;
        resp.json().await.context("parsing selected comments")
    }

    async fn insert_comment(&self, comment: &NewComment) -> anyhow::Result<Comment> {
        let rows: Vec<Comment> = self
            .request(Method::POST, COMMENTS)
            .header("Prefer", "return=representation")
            .json(comment)
            .send()
            .await
            .context("sending insert request")?
            .error_for_status()
            .with_context(|| format!("inserting comment {}", comment.id))?
            .json()
            .await
            .context("parsing inserted comment")?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("insertion of comment {} returned no row", comment.id))
    }

    async fn update_comments(
        &self,
        filter: &Filter,
        update: &CommentUpdate,
    ) -> anyhow::Result<()> {
        self.request(Method::PATCH, COMMENTS)
            .query(&filter.to_query_pairs())
            .json(update)
            .send()
            .await
            .context("sending update request")?
            .error_for_status()
            .with_context(|| format!("updating comments matching {filter:?}"))?;
        Ok(())
    }

    async fn delete_comments(&self, filter: &Filter) -> anyhow::Result<()> {
        self.request(Method::DELETE, COMMENTS)
            .query(&filter.to_query_pairs())
            .send()
            .await
            .context("sending delete request")?
            .error_for_status()
            .with_context(|| format!("deleting comments matching {filter:?}"))?;
        Ok(())
    }

    async fn get_session(&self) -> anyhow::Result<Option<Session>> {
        Ok(self.session.borrow().clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        let token: TokenResponse = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("sending sign-in request")?
            .error_for_status()
            .context("signing in")?
            .json()
            .await
            .context("parsing sign-in response")?;
        let session = Session::from(token);
        tracing::info!(user = %session.user.id, "signed in");
        self.set_session(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        let signed_in = self.session.borrow().is_some();
        if signed_in {
            let res = self
                .request(Method::POST, "/auth/v1/logout")
                .send()
                .await
                .and_then(|r| r.error_for_status());
            if let Err(err) = res {
                // the local session is dropped anyway
                tracing::warn!(%err, "failed revoking the session");
            }
        }
        self.set_session(AuthEvent::SignedOut, None);
        Ok(())
    }

    fn on_auth_state_change(&self, callback: AuthCallback) -> Subscription {
        self.listeners.subscribe(callback)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::ProjectId;

    use super::*;

    fn store(session: Option<Session>) -> PostgrestStore {
        PostgrestStore::with_session(
            BackendConfig {
                url: String::from("https://db.example.org/"),
                anon_key: String::from("anon"),
                project_id: ProjectId::stub(),
            },
            session,
        )
        .unwrap()
    }

    #[test]
    fn requests_carry_the_api_key() {
        let req = store(None)
            .request(Method::GET, COMMENTS_WITH_AUTHOR)
            .build()
            .unwrap();
        assert_eq!(
            req.url().as_str(),
            "https://db.example.org/rest/v1/comments_with_author"
        );
        assert_eq!(req.headers()["apikey"], "anon");
        assert_eq!(req.headers()["authorization"], "Bearer anon");

        let session = Session {
            access_token: String::from("tok"),
            refresh_token: None,
            user: SessionUser::stub(),
        };
        let req = store(Some(session))
            .request(Method::DELETE, COMMENTS)
            .build()
            .unwrap();
        assert_eq!(req.headers()["authorization"], "Bearer tok");
    }

    #[test]
    fn token_response_parsing() {
        let token: TokenResponse = serde_json::from_str(
            r#"{
                "access_token": "tok",
                "token_type": "bearer",
                "refresh_token": "ref",
                "user": {
                    "id": "ffffffff-ffff-ffff-ffff-ffffffffffff",
                    "email": "ada@example.org",
                    "user_metadata": { "first_name": "Ada", "last_name": "Lovelace" }
                }
            }"#,
        )
        .unwrap();
        let session = Session::from(token);
        assert_eq!(session.user.id, UserId::stub());
        assert_eq!(session.user.first_name.as_deref(), Some("Ada"));
        assert_eq!(session.user.avatar_url, None);
        assert_eq!(session.refresh_token.as_deref(), Some("ref"));
    }

    #[test]
    fn rejects_invalid_config() {
        let res = PostgrestStore::new(BackendConfig {
            url: String::from("db.example.org"),
            anon_key: String::from("anon"),
            project_id: ProjectId::stub(),
        });
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn sign_out_without_session_stays_local() {
        let store = store(None);
        let events = std::rc::Rc::new(RefCell::new(Vec::new()));
        let _sub = {
            let events = events.clone();
            store.on_auth_state_change(Box::new(move |e, _| events.borrow_mut().push(e)))
        };
        store.sign_out().await.unwrap();
        assert_eq!(*events.borrow(), vec![AuthEvent::SignedOut]);
        assert_eq!(store.get_session().await.unwrap(), None);
    }
}
