use yew::prelude::*;

#[derive(Clone, Debug, PartialEq)]
pub struct LoginInfo {
    pub email: String,
    pub password: String,
}

#[derive(Clone, PartialEq, Properties)]
pub struct LoginProps {
    pub on_submit: Callback<LoginInfo>,
}

pub struct Login {
    email: String,
    password: String,
}

pub enum LoginMsg {
    EmailChanged(String),
    PasswordChanged(String),
    SubmitClicked,
}

impl Component for Login {
    type Message = LoginMsg;
    type Properties = LoginProps;

    fn create(_ctx: &Context<Self>) -> Self {
        Self {
            email: String::new(),
            password: String::new(),
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            LoginMsg::EmailChanged(e) => self.email = e,
            LoginMsg::PasswordChanged(p) => self.password = p,
            LoginMsg::SubmitClicked => {
                ctx.props().on_submit.emit(LoginInfo {
                    email: self.email.clone(),
                    password: std::mem::take(&mut self.password),
                });
            }
        }
        true
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        macro_rules! callback_for {
            ($msg:ident) => {
                ctx.link().callback(|e: web_sys::Event| {
                    let input: web_sys::HtmlInputElement = e.target_unchecked_into();
                    LoginMsg::$msg(input.value())
                })
            };
        }
        html! {
            <div class="plinth-login">
                <h2>{ "Sign in to comment" }</h2>
                <input
                    type="email"
                    placeholder="you@example.org"
                    value={self.email.clone()}
                    onchange={callback_for!(EmailChanged)}
                />
                <input
                    type="password"
                    placeholder="password"
                    value={self.password.clone()}
                    onchange={callback_for!(PasswordChanged)}
                />
                <button
                    type="button"
                    onclick={ctx.link().callback(|_| LoginMsg::SubmitClicked)}
                >
                    { "Sign in" }
                </button>
            </div>
        }
    }
}
