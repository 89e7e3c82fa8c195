#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Element,
    DocumentType,
    Other,
}

/// Read-only view of a DOM node, as needed to compute its locator
pub trait DomNode: Sized {
    fn kind(&self) -> NodeKind;

    /// Name used to compare siblings (upper-cased tag name for HTML elements)
    fn node_name(&self) -> String;

    fn local_name(&self) -> Option<String>;
    fn prefix(&self) -> Option<String>;
    fn id(&self) -> Option<String>;

    fn previous_sibling(&self) -> Option<Self>;
    fn next_sibling(&self) -> Option<Self>;
    fn parent_element(&self) -> Option<Self>;
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LocateOptions {
    /// Always produce the full path, even for elements with an id
    pub ignore_id: bool,
}

/// XPath anchoring `node` in its document
///
/// Elements with an id get `//*[@id="<id>"]`. Others get the path from the
/// root, with a 1-based position on every step that has same-name siblings.
/// Returns an empty string for non-element nodes.
pub fn locate<N: DomNode>(node: &N, opts: &LocateOptions) -> String {
    if !opts.ignore_id {
        if let Some(id) = node.id().filter(|id| !id.is_empty()) {
            return format!("//*[@id=\"{id}\"]");
        }
    }

    let mut parts = Vec::new();
    let mut current = (node.kind() == NodeKind::Element).then(|| step(node));
    let mut cursor = node.parent_element();
    while let Some(part) = current.take() {
        parts.push(part);
        if let Some(parent) = cursor.take().filter(|p| p.kind() == NodeKind::Element) {
            current = Some(step(&parent));
            cursor = parent.parent_element();
        }
    }

    if parts.is_empty() {
        return String::new();
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}

/// Page a comment is pinned on: the path plus the query string of its url
///
/// `search` is the query as `window.location.search` reports it, with its
/// leading `?`, or empty.
pub fn page_url(pathname: &str, search: &str) -> String {
    let path = match pathname {
        "" => "/",
        p => p,
    };
    match search {
        "" | "?" => path.to_string(),
        q if q.starts_with('?') => format!("{path}{q}"),
        q => format!("{path}?{q}"),
    }
}

fn step<N: DomNode>(node: &N) -> String {
    let name = node.node_name();

    let mut previous = 0;
    let mut sibling = node.previous_sibling();
    while let Some(s) = sibling {
        // the doctype of an html document is named "html" too
        if s.kind() != NodeKind::DocumentType && s.node_name() == name {
            previous += 1;
        }
        sibling = s.previous_sibling();
    }

    let mut has_next = false;
    let mut sibling = node.next_sibling();
    while let Some(s) = sibling {
        if s.node_name() == name {
            has_next = true;
            break;
        }
        sibling = s.next_sibling();
    }

    let mut res = String::new();
    if let Some(prefix) = node.prefix() {
        res.push_str(&prefix);
        res.push(':');
    }
    res.push_str(&node.local_name().unwrap_or_default());
    if previous > 0 || has_next {
        res.push_str(&format!("[{}]", previous + 1));
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NodeData {
        kind: NodeKind,
        name: String,
        prefix: Option<String>,
        id: Option<String>,
        parent: Option<usize>,
        children: Vec<usize>,
    }

    #[derive(Default)]
    struct Doc {
        nodes: Vec<NodeData>,
    }

    #[derive(Clone, Copy)]
    struct Node<'a> {
        doc: &'a Doc,
        idx: usize,
    }

    impl Doc {
        fn new() -> Doc {
            let mut doc = Doc::default();
            doc.push(None, NodeKind::Other, "#document", None);
            doc
        }

        fn push(&mut self, parent: Option<usize>, kind: NodeKind, name: &str, id: Option<&str>) -> usize {
            let idx = self.nodes.len();
            let (prefix, name) = match name.split_once(':') {
                Some((p, n)) => (Some(p.to_string()), n.to_string()),
                None => (None, name.to_string()),
            };
            self.nodes.push(NodeData {
                kind,
                name,
                prefix,
                id: id.map(String::from),
                parent,
                children: Vec::new(),
            });
            if let Some(p) = parent {
                self.nodes[p].children.push(idx);
            }
            idx
        }

        fn el(&mut self, parent: usize, name: &str) -> usize {
            self.push(Some(parent), NodeKind::Element, name, None)
        }

        fn node(&self, idx: usize) -> Node<'_> {
            Node { doc: self, idx }
        }

        fn sibling(&self, idx: usize, offset: isize) -> Option<Node<'_>> {
            let parent = self.nodes[idx].parent?;
            let siblings = &self.nodes[parent].children;
            let pos = siblings.iter().position(|c| *c == idx)? as isize + offset;
            let sibling = *siblings.get(usize::try_from(pos).ok()?)?;
            Some(self.node(sibling))
        }
    }

    impl<'a> DomNode for Node<'a> {
        fn kind(&self) -> NodeKind {
            self.doc.nodes[self.idx].kind
        }

        fn node_name(&self) -> String {
            let n = &self.doc.nodes[self.idx];
            match (n.kind, &n.prefix) {
                (NodeKind::Element, Some(p)) => format!("{p}:{}", n.name),
                (NodeKind::Element, None) => n.name.to_uppercase(),
                _ => n.name.clone(),
            }
        }

        fn local_name(&self) -> Option<String> {
            let n = &self.doc.nodes[self.idx];
            (n.kind == NodeKind::Element).then(|| n.name.clone())
        }

        fn prefix(&self) -> Option<String> {
            self.doc.nodes[self.idx].prefix.clone()
        }

        fn id(&self) -> Option<String> {
            self.doc.nodes[self.idx].id.clone()
        }

        fn previous_sibling(&self) -> Option<Self> {
            self.doc.sibling(self.idx, -1)
        }

        fn next_sibling(&self) -> Option<Self> {
            self.doc.sibling(self.idx, 1)
        }

        fn parent_element(&self) -> Option<Self> {
            let parent = self.doc.nodes[self.idx].parent?;
            (self.doc.nodes[parent].kind == NodeKind::Element).then(|| self.doc.node(parent))
        }
    }

    struct Page {
        doc: Doc,
        html: usize,
        main: usize,
        first_p: usize,
        second_p: usize,
        span: usize,
        rect: usize,
        text: usize,
    }

    fn page() -> Page {
        let mut doc = Doc::new();
        doc.push(Some(0), NodeKind::DocumentType, "html", None);
        let html = doc.el(0, "html");
        doc.el(html, "head");
        let body = doc.el(html, "body");
        let main = doc.push(Some(body), NodeKind::Element, "div", Some("main"));
        let text = doc.push(Some(body), NodeKind::Other, "#text", None);
        let first_p = doc.el(body, "p");
        doc.push(Some(body), NodeKind::Other, "#text", None);
        let second_p = doc.el(body, "p");
        let span = doc.el(body, "span");
        let svg = doc.el(body, "svg:svg");
        doc.el(svg, "svg:rect");
        let rect = doc.el(svg, "svg:rect");
        Page {
            doc,
            html,
            main,
            first_p,
            second_p,
            span,
            rect,
            text,
        }
    }

    #[test]
    fn id_shortcut() {
        let p = page();
        let main = p.doc.node(p.main);
        assert_eq!(locate(&main, &LocateOptions::default()), "//*[@id=\"main\"]");
        assert_eq!(
            locate(&main, &LocateOptions { ignore_id: true }),
            "/html/body/div"
        );
    }

    #[test]
    fn positions_only_where_ambiguous() {
        let p = page();
        let opts = LocateOptions::default();
        assert_eq!(locate(&p.doc.node(p.html), &opts), "/html");
        assert_eq!(locate(&p.doc.node(p.first_p), &opts), "/html/body/p[1]");
        assert_eq!(locate(&p.doc.node(p.second_p), &opts), "/html/body/p[2]");
        assert_eq!(locate(&p.doc.node(p.span), &opts), "/html/body/span");
        assert_eq!(
            locate(&p.doc.node(p.rect), &opts),
            "/html/body/svg:svg/svg:rect[2]"
        );
    }

    #[test]
    fn non_elements_have_no_locator() {
        let p = page();
        assert_eq!(locate(&p.doc.node(p.text), &LocateOptions::default()), "");
        assert_eq!(locate(&p.doc.node(0), &LocateOptions::default()), "");
    }

    #[test]
    fn page_url_keeps_the_query() {
        assert_eq!(page_url("/pricing", "?plan=pro"), "/pricing?plan=pro");
        assert_eq!(page_url("/pricing", "plan=pro"), "/pricing?plan=pro");
        assert_eq!(page_url("/pricing", ""), "/pricing");
        assert_eq!(page_url("/pricing", "?"), "/pricing");
        assert_eq!(page_url("", "?a=1"), "/?a=1");
        assert_ne!(page_url("/pricing", "?plan=pro"), page_url("/pricing", "?plan=team"));
    }

    #[test]
    fn deterministic() {
        let p = page();
        for idx in [p.html, p.main, p.first_p, p.second_p, p.span, p.rect] {
            let opts = LocateOptions { ignore_id: true };
            assert_eq!(locate(&p.doc.node(idx), &opts), locate(&p.doc.node(idx), &opts));
        }
    }
}
