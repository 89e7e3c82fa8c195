use std::rc::Rc;

use gloo_storage::{LocalStorage, Storage};
use plinth_client::{
    api::{BackendConfig, ProjectId, RemoteStore, Session},
    ClientRegistry, PostgrestStore,
};
use wasm_bindgen::prelude::*;

mod dom;
mod hooks;
pub use hooks::{use_comments, use_page_comments, use_thread, RepoContext};
mod ui;

fn session_key(endpoint: &str) -> String {
    format!("plinth-session:{endpoint}")
}

fn connect(config: &BackendConfig) -> anyhow::Result<Rc<dyn RemoteStore>> {
    let saved: Option<Session> = LocalStorage::get(session_key(config.endpoint())).ok();
    Ok(Rc::new(PostgrestStore::with_session(config.clone(), saved)?))
}

#[wasm_bindgen(start)]
pub fn start() {
    tracing_wasm::set_as_global_default();
}

/// Entry point for the host page, holding one backend client per endpoint
#[wasm_bindgen]
pub struct Plinth {
    registry: ClientRegistry,
}

#[wasm_bindgen]
impl Plinth {
    #[wasm_bindgen(constructor)]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Plinth {
        Plinth {
            registry: ClientRegistry::new(connect),
        }
    }

    /// Render the commenting widget inside `root`
    pub fn mount(
        &self,
        root: web_sys::Element,
        url: String,
        anon_key: String,
        project_id: String,
    ) -> Result<(), JsValue> {
        let project: ProjectId = project_id
            .parse()
            .map_err(|e| JsValue::from_str(&format!("invalid project id {project_id:?}: {e}")))?;
        let config = BackendConfig {
            url,
            anon_key,
            project_id: project,
        };
        let store = self
            .registry
            .get_or_connect(&config)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let page_url = dom::current_page();
        tracing::info!(%project, %page_url, "mounting comment widget");
        yew::Renderer::<ui::App>::with_root_and_props(
            root,
            ui::AppProps {
                store: ui::StoreHandle(store),
                project,
                page_url,
                session_key: session_key(config.endpoint()),
            },
        )
        .render();
        Ok(())
    }
}
