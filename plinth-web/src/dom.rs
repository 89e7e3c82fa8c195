use plinth_client::{api::Error, locate, page_url, DomNode, LocateOptions, NodeKind};
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Element, Event, EventTarget, Node};

pub struct WebNode(pub Node);

impl DomNode for WebNode {
    fn kind(&self) -> NodeKind {
        match self.0.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::DOCUMENT_TYPE_NODE => NodeKind::DocumentType,
            _ => NodeKind::Other,
        }
    }

    fn node_name(&self) -> String {
        self.0.node_name()
    }

    fn local_name(&self) -> Option<String> {
        self.0.dyn_ref::<Element>().map(|e| e.local_name())
    }

    fn prefix(&self) -> Option<String> {
        self.0.dyn_ref::<Element>().and_then(|e| e.prefix())
    }

    fn id(&self) -> Option<String> {
        self.0.dyn_ref::<Element>().map(|e| e.id())
    }

    fn previous_sibling(&self) -> Option<WebNode> {
        self.0.previous_sibling().map(WebNode)
    }

    fn next_sibling(&self) -> Option<WebNode> {
        self.0.next_sibling().map(WebNode)
    }

    fn parent_element(&self) -> Option<WebNode> {
        self.0.parent_element().map(|e| WebNode(e.into()))
    }
}

pub fn document() -> Option<web_sys::Document> {
    web_sys::window().and_then(|w| w.document())
}

/// Path and query of the current page
pub fn current_page() -> String {
    let location = match web_sys::window() {
        Some(w) => w.location(),
        None => return page_url("", ""),
    };
    page_url(
        &location.pathname().unwrap_or_default(),
        &location.search().unwrap_or_default(),
    )
}

pub fn locate_element(el: &Element) -> String {
    locate(&WebNode(el.clone().into()), &LocateOptions::default())
}

/// Find back the element a comment was anchored on
pub fn element_for(locator: &str) -> Result<Element, Error> {
    let not_found = || Error::LocatorNotFound(locator.to_string());
    let document = document().ok_or_else(not_found)?;
    let result = document
        .evaluate(locator, &document)
        .map_err(|_| not_found())?;
    result
        .iterate_next()
        .ok()
        .flatten()
        .and_then(|n| n.dyn_into::<Element>().ok())
        .ok_or_else(not_found)
}

/// DOM event listener, removed when dropped
pub struct Listener {
    target: EventTarget,
    kind: &'static str,
    capture: bool,
    closure: Closure<dyn Fn(Event)>,
}

impl Listener {
    pub fn new(
        target: &EventTarget,
        kind: &'static str,
        capture: bool,
        f: impl Fn(Event) + 'static,
    ) -> Listener {
        let closure = Closure::wrap(Box::new(f) as Box<dyn Fn(Event)>);
        let res = target.add_event_listener_with_callback_and_bool(
            kind,
            closure.as_ref().unchecked_ref(),
            capture,
        );
        if let Err(err) = res {
            tracing::error!(?err, kind, "failed registering event listener");
        }
        Listener {
            target: target.clone(),
            kind,
            capture,
            closure,
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self.target.remove_event_listener_with_callback_and_bool(
            self.kind,
            self.closure.as_ref().unchecked_ref(),
            self.capture,
        );
    }
}
