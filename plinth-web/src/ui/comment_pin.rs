use chrono::Utc;
use plinth_client::{
    api::{Comment, CommentUpdate, CommentWithAuthor, Error, NewComment},
    time_ago, Repository,
};
use yew::prelude::*;

use crate::{
    dom::{self, Listener},
    hooks::{use_thread, RepoContext},
    ui::spawn_write,
};

#[derive(Clone, PartialEq, Properties)]
pub struct CommentPinProps {
    pub comment: CommentWithAuthor,

    /// Page replies are written on
    pub page_url: String,
}

async fn reply(
    repo: Repository,
    parent: CommentWithAuthor,
    page_url: String,
    body: String,
) -> Result<Option<Comment>, Error> {
    let user = repo.session().require_user()?;
    let new = NewComment::reply(&parent.comment, user.id, body, page_url)?;
    repo.create_comment(new).await
}

#[function_component(CommentPin)]
pub fn comment_pin(p: &CommentPinProps) -> Html {
    let repo = use_context::<RepoContext>();
    let thread = use_thread(p.comment.comment.id);
    let open = use_state(|| false);
    let editing = use_state(|| None::<String>);
    let reply_body = use_state(String::new);
    let force_update = use_force_update();
    use_effect_with_deps(
        move |_| {
            let listener = web_sys::window()
                .map(|w| Listener::new(&w, "resize", false, move |_| force_update.force_update()));
            move || drop(listener)
        },
        (),
    );

    let repo = match repo {
        Some(RepoContext(repo)) => repo,
        None => return html! {},
    };
    let el = match dom::element_for(&p.comment.comment.element_xpath) {
        Ok(el) => el,
        Err(err) => {
            tracing::debug!(id = %p.comment.comment.id, %err, "not rendering pin");
            return html! {};
        }
    };
    let rect = el.get_bounding_client_rect();
    let style = format!("left: {}px; top: {}px", rect.right(), rect.top());

    let c = p.comment.clone();
    let on_toggle = {
        let open = open.clone();
        Callback::from(move |_: MouseEvent| open.set(!*open))
    };
    let on_resolve = {
        let (repo, c) = (repo.clone(), c.clone());
        Callback::from(move |_: MouseEvent| {
            let (repo, c) = (repo.clone(), c.clone());
            spawn_write("resolve", async move { repo.mark_resolved(&c, true).await })
        })
    };
    let on_delete = {
        let (repo, c) = (repo.clone(), c.clone());
        Callback::from(move |_: MouseEvent| {
            let (repo, c) = (repo.clone(), c.clone());
            spawn_write("delete", async move { repo.delete_comment(&c).await })
        })
    };
    let on_edit = {
        let editing = editing.clone();
        let body = c.comment.body.clone();
        Callback::from(move |_: MouseEvent| match *editing {
            Some(_) => editing.set(None),
            None => editing.set(Some(body.clone())),
        })
    };
    let on_edit_input = {
        let editing = editing.clone();
        Callback::from(move |e: InputEvent| {
            let input: web_sys::HtmlTextAreaElement = e.target_unchecked_into();
            editing.set(Some(input.value()))
        })
    };
    let on_edit_save = {
        let (repo, c, editing) = (repo.clone(), c.clone(), editing.clone());
        Callback::from(move |_: MouseEvent| {
            if let Some(body) = (*editing).clone() {
                let (repo, c) = (repo.clone(), c.clone());
                spawn_write("edit", async move {
                    repo.update_comment(&c, CommentUpdate::body(body)).await
                });
            }
            editing.set(None);
        })
    };
    let on_reply_input = {
        let reply_body = reply_body.clone();
        Callback::from(move |e: InputEvent| {
            let input: web_sys::HtmlTextAreaElement = e.target_unchecked_into();
            reply_body.set(input.value())
        })
    };
    let on_reply = {
        let (repo, c, reply_body) = (repo.clone(), c.clone(), reply_body.clone());
        let page_url = p.page_url.clone();
        Callback::from(move |_: MouseEvent| {
            if reply_body.trim().is_empty() {
                return;
            }
            let write = reply(repo.clone(), c.clone(), page_url.clone(), (*reply_body).clone());
            spawn_write("reply", write);
            reply_body.set(String::new());
        })
    };

    let now = Utc::now();
    let body = match &*editing {
        None => html! { <p class="plinth-body">{ &c.comment.body }</p> },
        Some(text) => html! {
            <div class="plinth-edit">
                <textarea value={ text.clone() } oninput={ on_edit_input } />
                <button type="button" onclick={ on_edit_save }>{ "Save" }</button>
            </div>
        },
    };
    let replies = match (&thread.data, &thread.error) {
        (Some(replies), _) => replies
            .iter()
            .map(|r| html! {
                <li class="plinth-reply" key={ r.comment.id.to_string() }>
                    { author_line(r, now) }
                    <p class="plinth-body">{ &r.comment.body }</p>
                </li>
            })
            .collect::<Html>(),
        (None, Some(err)) => {
            tracing::warn!(id = %c.comment.id, %err, "failed loading thread");
            html! {}
        }
        (None, None) => html! { <li class="plinth-loading">{ "Loading..." }</li> },
    };

    html! {
        <div class="plinth-pin-anchor" style={ style }>
            <button
                type="button"
                class="plinth-pin"
                aria-label={ format!("Comment by {}", c.author_name()) }
                onclick={ on_toggle }
            >
                <span class="plinth-pin-dot"></span>
            </button>
            if *open {
                <div class="plinth-popover plinth-thread">
                    <div class="plinth-header">
                        { author_line(&c, now) }
                        <button type="button" aria-label="Resolve" onclick={ on_resolve }>
                            { "Resolve" }
                        </button>
                        <button type="button" onclick={ on_edit }>{ "Edit" }</button>
                        <button type="button" onclick={ on_delete }>{ "Delete" }</button>
                    </div>
                    { body }
                    <ul class="plinth-replies">{ replies }</ul>
                    <div class="plinth-add-reply">
                        <textarea
                            placeholder="Reply"
                            value={ (*reply_body).clone() }
                            oninput={ on_reply_input }
                        />
                        <button type="button" onclick={ on_reply }>{ "Reply" }</button>
                    </div>
                </div>
            }
        </div>
    }
}

pub fn author_line(c: &CommentWithAuthor, now: chrono::DateTime<Utc>) -> Html {
    let avatar = match &c.author_avatar_url {
        Some(url) => html! { <img class="plinth-avatar" src={ url.clone() } alt="" /> },
        None => html! { <span class="plinth-avatar">{ c.author_initials() }</span> },
    };
    html! {
        <div class="plinth-author">
            { avatar }
            <span class="plinth-author-name">{ c.author_name() }</span>
            <span class="plinth-time">{ time_ago(c.comment.created_at, now) }</span>
        </div>
    }
}
