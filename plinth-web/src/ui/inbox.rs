use chrono::Utc;
use plinth_client::api::ProjectId;
use yew::prelude::*;

use crate::{
    hooks::{use_comments, RepoContext},
    ui::{comment_pin::author_line, spawn_write},
};

#[derive(Clone, PartialEq, Properties)]
pub struct InboxProps {
    pub project: ProjectId,
    pub on_close: Callback<()>,
}

#[function_component(Inbox)]
pub fn inbox(p: &InboxProps) -> Html {
    let repo = use_context::<RepoContext>();
    let show_resolved = use_state(|| false);
    let comments = use_comments(p.project, *show_resolved);

    let tab = |resolved: bool, label: &'static str| {
        let show_resolved = show_resolved.clone();
        html! {
            <button
                type="button"
                role="tab"
                class={ classes!("plinth-tab", (*show_resolved == resolved).then(|| "active")) }
                aria-selected={ (*show_resolved == resolved).to_string() }
                onclick={ Callback::from(move |_| show_resolved.set(resolved)) }
            >
                { label }
            </button>
        }
    };

    let now = Utc::now();
    let list = match (&comments.data, &comments.error) {
        (_, Some(err)) => {
            tracing::warn!(%err, "failed loading inbox");
            html! { <p class="plinth-error">{ "Could not load comments" }</p> }
        }
        (None, None) => html! { <p class="plinth-loading">{ "Loading..." }</p> },
        (Some(rows), None) if rows.is_empty() => html! {
            <p class="plinth-empty">{ "Nothing here" }</p>
        },
        (Some(rows), None) => rows
            .iter()
            .map(|c| {
                let toggle = repo.clone().map(|RepoContext(repo)| {
                    let c = c.clone();
                    Callback::from(move |_: MouseEvent| {
                        let (repo, c) = (repo.clone(), c.clone());
                        let resolved = !c.comment.resolved;
                        spawn_write("resolve", async move { repo.mark_resolved(&c, resolved).await })
                    })
                });
                let label = match c.comment.resolved {
                    true => "Reopen",
                    false => "Resolve",
                };
                html! {
                    <li class="plinth-inbox-item" key={ c.comment.id.to_string() }>
                        { author_line(c, now) }
                        <p class="plinth-body">{ &c.comment.body }</p>
                        <span class="plinth-page">{ &c.comment.page_url }</span>
                        <button type="button" onclick={ toggle }>{ label }</button>
                    </li>
                }
            })
            .collect::<Html>(),
    };

    html! {
        <div class="plinth-inbox">
            <div class="plinth-header">
                <h2>{ "Inbox" }</h2>
                <button type="button" aria-label="Close" onclick={ p.on_close.reform(|_| ()) }>
                    { "×" }
                </button>
            </div>
            <div role="tablist">
                { tab(false, "Unresolved") }
                { tab(true, "Resolved") }
            </div>
            <ul class="plinth-inbox-list">{ list }</ul>
        </div>
    }
}
