use std::rc::Rc;

use gloo_storage::{LocalStorage, Storage};
use plinth_client::{
    api::{CommentWithAuthor, NewComment, ProjectId, RemoteStore, SessionUser, Subscription},
    Repository, SessionContext,
};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::{
    dom::{self, Listener},
    hooks::{use_page_comments, RepoContext},
    ui::{self, spawn_write, Draft},
};

/// Store handle, compared by identity
#[derive(Clone)]
pub struct StoreHandle(pub Rc<dyn RemoteStore>);

impl PartialEq for StoreHandle {
    fn eq(&self, other: &StoreHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, PartialEq, Properties)]
pub struct AppProps {
    pub store: StoreHandle,
    pub project: ProjectId,
    pub page_url: String,

    /// LocalStorage key the session is saved under
    pub session_key: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Browse,
    Comment,
    Inbox,
}

pub enum AppMsg {
    Ready(Repository),
    SessionChanged(Option<SessionUser>),
    SetMode(Mode),
    Picked(Draft),
    SubmitDraft(String),
    CloseDraft,
    Login(ui::LoginInfo),
    Logout,
}

pub struct App {
    repo: Option<Repository>,
    user: Option<SessionUser>,
    mode: Mode,
    draft: Option<Draft>,
    session_watch: Option<Subscription>,
    picker: Option<Listener>,
    _keydown: Option<Listener>,
}

impl Component for App {
    type Message = AppMsg;
    type Properties = AppProps;

    fn create(ctx: &Context<Self>) -> Self {
        let store = ctx.props().store.0.clone();
        let project = ctx.props().project;
        ctx.link().send_future(async move {
            let session = SessionContext::init(store, project).await;
            AppMsg::Ready(Repository::new(session))
        });

        let link = ctx.link().clone();
        let keydown = dom::document().map(|d| {
            Listener::new(&d, "keydown", false, move |e| {
                let escape = e
                    .dyn_ref::<web_sys::KeyboardEvent>()
                    .map(|e| e.key() == "Escape")
                    .unwrap_or(false);
                if escape {
                    link.send_message(AppMsg::SetMode(Mode::Browse));
                    link.send_message(AppMsg::CloseDraft);
                }
            })
        });

        Self {
            repo: None,
            user: None,
            mode: Mode::Browse,
            draft: None,
            session_watch: None,
            picker: None,
            _keydown: keydown,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            AppMsg::Ready(repo) => {
                let link = ctx.link().clone();
                let key = ctx.props().session_key.clone();
                self.session_watch = Some(repo.session().watch(move |session| {
                    let res = match session {
                        Some(s) => LocalStorage::set(&key, s),
                        None => {
                            LocalStorage::delete(&key);
                            Ok(())
                        }
                    };
                    if let Err(err) = res {
                        tracing::warn!(%err, "failed saving session to LocalStorage");
                    }
                    link.send_message(AppMsg::SessionChanged(session.map(|s| s.user.clone())));
                }));
                self.user = repo.session().user();
                self.repo = Some(repo);
            }
            AppMsg::SessionChanged(user) => self.user = user,
            AppMsg::SetMode(mode) => {
                self.mode = mode;
                self.picker = match mode {
                    Mode::Comment => start_picking(ctx),
                    Mode::Browse | Mode::Inbox => None,
                };
            }
            AppMsg::Picked(draft) => {
                tracing::debug!(xpath = %draft.element_xpath, "picked element");
                self.draft = Some(draft);
                self.mode = Mode::Browse;
                self.picker = None;
            }
            AppMsg::SubmitDraft(body) => {
                let (repo, draft) = match (&self.repo, self.draft.take()) {
                    (Some(repo), Some(draft)) => (repo.clone(), draft),
                    _ => return false,
                };
                let user = match &self.user {
                    Some(user) => user.id,
                    None => {
                        tracing::warn!("tried commenting while signed out");
                        return true;
                    }
                };
                let new = NewComment::root(
                    ctx.props().project,
                    user,
                    body,
                    ctx.props().page_url.clone(),
                    draft.element_xpath,
                    draft.coordinates,
                );
                spawn_write("comment", async move { repo.create_comment(new).await });
            }
            AppMsg::CloseDraft => self.draft = None,
            AppMsg::Login(info) => {
                if let Some(repo) = &self.repo {
                    let session = repo.session().clone();
                    spawn_write("sign in", async move {
                        session.sign_in(&info.email, &info.password).await
                    });
                }
                return false;
            }
            AppMsg::Logout => {
                if let Some(repo) = &self.repo {
                    let session = repo.session().clone();
                    spawn_local(async move {
                        if let Err(err) = session.sign_out().await {
                            tracing::error!(%err, "failed signing out");
                        }
                    });
                }
                return false;
            }
        }
        true
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let repo = match &self.repo {
            Some(repo) => repo.clone(),
            None => return html! {},
        };
        let link = ctx.link();
        let signed_in = self.user.is_some();
        let login = (!signed_in && self.mode != Mode::Browse).then(|| {
            html! { <ui::Login on_submit={ link.callback(AppMsg::Login) } /> }
        });
        let inbox = (signed_in && self.mode == Mode::Inbox).then(|| {
            html! {
                <ui::Inbox
                    project={ ctx.props().project }
                    on_close={ link.callback(|_| AppMsg::SetMode(Mode::Browse)) }
                />
            }
        });
        let draft = match (&self.draft, signed_in) {
            (Some(draft), true) => html! {
                <ui::NewCommentPopover
                    draft={ draft.clone() }
                    on_submit={ link.callback(AppMsg::SubmitDraft) }
                    on_close={ link.callback(|_| AppMsg::CloseDraft) }
                />
            },
            _ => html! {},
        };
        html! {
            <ContextProvider<RepoContext> context={ RepoContext(repo) }>
                <div class={ classes!("plinth-widget", (self.mode == Mode::Comment).then(|| "picking")) }>
                    <ui::Toolbar
                        mode={ self.mode }
                        { signed_in }
                        on_mode={ link.callback(AppMsg::SetMode) }
                        on_logout={ link.callback(|_| AppMsg::Logout) }
                    />
                    { for login }
                    { for inbox }
                    { draft }
                    if signed_in {
                        <PagePins project={ ctx.props().project } page_url={ ctx.props().page_url.clone() } />
                    }
                </div>
            </ContextProvider<RepoContext>>
        }
    }
}

/// Capture the next click on the page, outside of the widget
fn start_picking(ctx: &Context<App>) -> Option<Listener> {
    let link = ctx.link().clone();
    let document = dom::document()?;
    Some(Listener::new(&document, "click", true, move |e| {
        let target = match e.target().and_then(|t| t.dyn_into::<web_sys::Element>().ok()) {
            Some(t) => t,
            None => return,
        };
        if let Ok(Some(_)) = target.closest(".plinth-widget") {
            return;
        }
        e.prevent_default();
        e.stop_propagation();
        let (left, top) = match e.dyn_ref::<web_sys::MouseEvent>() {
            Some(e) => (e.client_x(), e.client_y()),
            None => return,
        };
        let rect = target.get_bounding_client_rect();
        link.send_message(AppMsg::Picked(Draft {
            element_xpath: dom::locate_element(&target),
            coordinates: plinth_client::api::Coordinates {
                x: f64::from(left) - rect.left(),
                y: f64::from(top) - rect.top(),
            },
            left,
            top,
        }));
    }))
}

#[derive(Clone, PartialEq, Properties)]
struct PagePinsProps {
    project: ProjectId,
    page_url: String,
}

#[function_component(PagePins)]
fn page_pins(p: &PagePinsProps) -> Html {
    let comments = use_page_comments(p.project, p.page_url.clone());
    if let Some(err) = &comments.error {
        tracing::warn!(%err, "failed loading page comments");
    }
    let pins = comments.data.unwrap_or_default();
    html! {
        <div class="plinth-pins">
            { for pins.into_iter().map(|c: CommentWithAuthor| html! {
                <ui::CommentPin
                    key={ c.comment.id.to_string() }
                    comment={ c.clone() }
                    page_url={ p.page_url.clone() }
                />
            }) }
        </div>
    }
}
