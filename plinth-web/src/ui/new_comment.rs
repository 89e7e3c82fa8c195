use plinth_client::api::Coordinates;
use yew::prelude::*;

/// Element picked for a new comment, and where the click happened
#[derive(Clone, Debug, PartialEq)]
pub struct Draft {
    pub element_xpath: String,

    /// Click position relative to the element
    pub coordinates: Coordinates,

    /// Click position in the viewport, where the popover opens
    pub left: i32,
    pub top: i32,
}

#[derive(Clone, PartialEq, Properties)]
pub struct NewCommentPopoverProps {
    pub draft: Draft,
    pub on_submit: Callback<String>,
    pub on_close: Callback<()>,
}

#[function_component(NewCommentPopover)]
pub fn new_comment_popover(p: &NewCommentPopoverProps) -> Html {
    let body = use_state(String::new);

    let oninput = {
        let body = body.clone();
        Callback::from(move |e: InputEvent| {
            let input: web_sys::HtmlTextAreaElement = e.target_unchecked_into();
            body.set(input.value())
        })
    };
    let onsubmit = {
        let body = body.clone();
        let on_submit = p.on_submit.clone();
        Callback::from(move |_: MouseEvent| {
            if !body.trim().is_empty() {
                on_submit.emit((*body).clone());
                body.set(String::new());
            }
        })
    };

    html! {
        <div
            class="plinth-popover plinth-new-comment"
            style={ format!("left: {}px; top: {}px", p.draft.left, p.draft.top) }
        >
            <textarea
                placeholder="Type your message here..."
                value={ (*body).clone() }
                { oninput }
            />
            <div class="plinth-actions">
                <button type="button" onclick={ p.on_close.reform(|_| ()) }>
                    { "Cancel" }
                </button>
                <button type="button" class="primary" onclick={ onsubmit }>
                    { "Comment" }
                </button>
            </div>
        </div>
    }
}
