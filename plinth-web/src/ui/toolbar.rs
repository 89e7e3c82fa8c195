use yew::prelude::*;

use crate::ui::Mode;

#[derive(Clone, PartialEq, Properties)]
pub struct ToolbarProps {
    pub mode: Mode,
    pub signed_in: bool,
    pub on_mode: Callback<Mode>,
    pub on_logout: Callback<()>,
}

#[function_component(Toolbar)]
pub fn toolbar(p: &ToolbarProps) -> Html {
    // clicking the active mode again goes back to browsing
    let toggle = |mode: Mode| {
        let next = match p.mode == mode {
            true => Mode::Browse,
            false => mode,
        };
        p.on_mode.reform(move |_: MouseEvent| next)
    };
    html! {
        <div class="plinth-toolbar">
            <button
                type="button"
                class={ classes!("plinth-toggle", (p.mode == Mode::Comment).then(|| "active")) }
                aria-label="Add comment"
                aria-pressed={ (p.mode == Mode::Comment).to_string() }
                onclick={ toggle(Mode::Comment) }
            >
                { "Comment" }
            </button>
            <button
                type="button"
                class={ classes!("plinth-toggle", (p.mode == Mode::Inbox).then(|| "active")) }
                aria-label="Inbox"
                aria-pressed={ (p.mode == Mode::Inbox).to_string() }
                onclick={ toggle(Mode::Inbox) }
            >
                { "Inbox" }
            </button>
            if p.signed_in {
                <button
                    type="button"
                    class="plinth-logout"
                    onclick={ p.on_logout.reform(|_| ()) }
                >
                    { "Sign out" }
                </button>
            }
        </div>
    }
}
