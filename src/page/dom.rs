//! A minimal structural DOM for the page context.
//!
//! An arena of elements with stable identities. Structural insertions
//! under the body emit [`MutationRecord`]s to subscribed observers,
//! mirroring the host's mutation interface: only element insertion is
//! reported, since the removal strategy never needs attribute or text
//! mutations.

use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub type NodeId = u64;

#[derive(Debug, Clone)]
pub struct Element {
    pub id: NodeId,
    /// Lowercased tag name.
    pub tag: String,
    pub attrs: FxHashMap<String, String>,
    pub text: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// One structural mutation batch: element nodes added to the tree.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub added: Vec<NodeId>,
}

pub struct Document {
    nodes: FxHashMap<NodeId, Element>,
    body: NodeId,
    next_id: NodeId,
    observers: Vec<mpsc::UnboundedSender<MutationRecord>>,
}

impl Document {
    pub fn new() -> Self {
        let body = 1;
        let mut nodes = FxHashMap::default();
        nodes.insert(
            body,
            Element {
                id: body,
                tag: "body".to_string(),
                attrs: FxHashMap::default(),
                text: String::new(),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            body,
            next_id: body + 1,
            observers: Vec::new(),
        }
    }

    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Creates a detached element. Identity is the arena id; a
    /// re-created element is a new node even with an identical shape.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Element {
                id,
                tag: tag.to_lowercase(),
                attrs: FxHashMap::default(),
                text: String::new(),
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(element) = self.nodes.get_mut(&id) {
            element.attrs.insert(name.to_lowercase(), value.to_string());
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(element) = self.nodes.get_mut(&id) {
            element.text = text.to_string();
        }
    }

    /// Attaches `child` under `parent`. Observers are notified only
    /// when the insertion lands inside the observed (body) subtree.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.nodes.contains_key(&parent) || !self.nodes.contains_key(&child) || child == parent
        {
            return;
        }
        if let Some(element) = self.nodes.get_mut(&child) {
            element.parent = Some(parent);
        }
        if let Some(element) = self.nodes.get_mut(&parent) {
            element.children.push(child);
        }
        if self.is_attached(child) {
            self.notify(MutationRecord { added: vec![child] });
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.body {
                return true;
            }
            current = self.nodes.get(&node).and_then(|element| element.parent);
        }
        false
    }

    /// Detaches the subtree rooted at `id`. The arena entry stays
    /// alive: node identity outlives removal, the way a DOM node still
    /// referenced by page code does.
    pub fn detach(&mut self, id: NodeId) {
        if id == self.body {
            return;
        }
        if let Some(parent) = self.nodes.get(&id).and_then(|element| element.parent) {
            if let Some(element) = self.nodes.get_mut(&parent) {
                element.children.retain(|&child| child != id);
            }
        }
        if let Some(element) = self.nodes.get_mut(&id) {
            element.parent = None;
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(&id)
    }

    /// Every node below `id`, depth-first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&id)
            .map(|element| element.children.clone())
            .unwrap_or_default();
        while let Some(node) = stack.pop() {
            out.push(node);
            if let Some(element) = self.nodes.get(&node) {
                stack.extend(element.children.iter().copied());
            }
        }
        out
    }

    /// Own text plus all descendant text.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(element) = self.nodes.get(&id) {
            out.push_str(&element.text);
            for &child in &element.children {
                self.collect_text(child, out);
            }
        }
    }

    /// Subscribes to structural mutations. Dropping the receiver
    /// disconnects the subscription.
    pub fn observe(&mut self) -> mpsc::UnboundedReceiver<MutationRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    fn notify(&mut self, record: MutationRecord) {
        self.observers.retain(|tx| tx.send(record.clone()).is_ok());
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attached_insertions_notify_observers() {
        let mut doc = Document::new();
        let mut mutations = doc.observe();

        let shelf = doc.create_element("ytd-reel-shelf-renderer");
        let inner = doc.create_element("a");
        // Building a detached subtree is silent.
        doc.append_child(shelf, inner);
        assert!(mutations.try_recv().is_err());

        let body = doc.body();
        doc.append_child(body, shelf);
        let record = mutations.try_recv().unwrap();
        assert_eq!(record.added, vec![shelf]);
    }

    #[test]
    fn detach_keeps_identity_but_leaves_tree() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let body = doc.body();
        doc.append_child(body, div);
        assert!(doc.is_attached(div));

        doc.detach(div);
        assert!(!doc.is_attached(div));
        assert!(doc.get(div).is_some());
        assert!(doc.descendants(body).is_empty());
    }

    #[test]
    fn descendants_cover_nested_levels() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let c = doc.create_element("a");
        doc.append_child(a, b);
        doc.append_child(b, c);
        let body = doc.body();
        doc.append_child(body, a);

        let found = doc.descendants(a);
        assert!(found.contains(&b));
        assert!(found.contains(&c));
    }

    #[test]
    fn text_content_concatenates_subtree() {
        let mut doc = Document::new();
        let chip = doc.create_element("yt-chip-cloud-chip-renderer");
        let span = doc.create_element("span");
        doc.set_text(span, "Shorts");
        doc.append_child(chip, span);
        assert_eq!(doc.text_content(chip), "Shorts");
    }
}
