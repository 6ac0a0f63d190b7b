//! Arena-based DOM for HTML parsing and in-place rewriting.
//!
//! html5ever parses into this arena; the section pipeline then restructures
//! it (wrapping, detaching, cloning chrome) before serializing it back out.
//! Nodes are never freed: detached nodes simply become unreachable from the
//! document root, and every query below only considers attached nodes.

use html5ever::{LocalName, Namespace, QualName, ns};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaNodeId(pub u32);

impl ArenaNodeId {
    /// Sentinel value for no node.
    pub const NONE: ArenaNodeId = ArenaNodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the arena DOM.
#[derive(Debug, Clone)]
pub enum ArenaNodeData {
    /// Document root.
    Document,
    /// Element with name and attributes.
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Pre-extracted id, kept in sync with `attrs`.
        id: Option<String>,
        /// Pre-extracted classes, kept in sync with `attrs`.
        classes: Vec<String>,
    },
    /// Text content.
    Text(String),
    Comment(String),
    /// Document type declaration.
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
}

/// HTML attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

impl Attribute {
    /// Create an attribute in the null namespace.
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: attr_qname(name),
            value: value.into(),
        }
    }
}

/// A node in the arena DOM.
#[derive(Debug)]
pub struct ArenaNode {
    pub data: ArenaNodeData,
    pub parent: ArenaNodeId,
    pub first_child: ArenaNodeId,
    pub last_child: ArenaNodeId,
    pub prev_sibling: ArenaNodeId,
    pub next_sibling: ArenaNodeId,
}

impl ArenaNode {
    fn new(data: ArenaNodeData) -> Self {
        Self {
            data,
            parent: ArenaNodeId::NONE,
            first_child: ArenaNodeId::NONE,
            last_child: ArenaNodeId::NONE,
            prev_sibling: ArenaNodeId::NONE,
            next_sibling: ArenaNodeId::NONE,
        }
    }
}

/// Arena-based DOM tree.
///
/// All nodes are stored in a contiguous vector. Parent/child/sibling links
/// use indices into this vector.
pub struct ArenaDom {
    nodes: Vec<ArenaNode>,
    document: ArenaNodeId,
}

fn attr_qname(name: &str) -> QualName {
    QualName::new(None, ns!(), LocalName::from(name))
}

fn html_qname(local: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(local))
}

/// Split a class attribute into its class names.
fn split_classes(value: &str) -> Vec<String> {
    value.split_whitespace().map(|s| s.to_string()).collect()
}

impl ArenaDom {
    /// Create a new empty DOM with a document root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: ArenaNodeId::NONE,
        };
        dom.document = dom.alloc(ArenaNode::new(ArenaNodeData::Document));
        dom
    }

    fn alloc(&mut self, node: ArenaNode) -> ArenaNodeId {
        let id = ArenaNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the document root ID.
    pub fn document(&self) -> ArenaNodeId {
        self.document
    }

    /// Get a node by ID.
    pub fn get(&self, id: ArenaNodeId) -> Option<&ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID.
    pub fn get_mut(&mut self, id: ArenaNodeId) -> Option<&mut ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a new (detached) element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> ArenaNodeId {
        let mut id = None;
        let mut classes = Vec::new();

        for attr in &attrs {
            if attr.name.local.as_ref() == "id" {
                id = Some(attr.value.clone());
            } else if attr.name.local.as_ref() == "class" {
                classes = split_classes(&attr.value);
            }
        }

        self.alloc(ArenaNode::new(ArenaNodeData::Element {
            name,
            attrs,
            id,
            classes,
        }))
    }

    /// Create a detached element in the XHTML namespace.
    pub fn create_html_element(&mut self, local: &str) -> ArenaNodeId {
        self.create_element(html_qname(local), Vec::new())
    }

    /// Create a new text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Text(text.into())))
    }

    /// Create a new comment node.
    pub fn create_comment(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Comment(text)))
    }

    /// Create a doctype node.
    pub fn create_doctype(
        &mut self,
        name: String,
        public_id: String,
        system_id: String,
    ) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Doctype {
            name,
            public_id,
            system_id,
        }))
    }

    /// Append a child to a parent node, detaching it from any previous parent.
    pub fn append(&mut self, parent: ArenaNodeId, child: ArenaNodeId) {
        self.detach(child);

        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
        }

        if last_child.is_some()
            && let Some(last_node) = self.get_mut(last_child)
        {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a child as the first child of a parent node.
    pub fn prepend(&mut self, parent: ArenaNodeId, child: ArenaNodeId) {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(ArenaNodeId::NONE);
        if first.is_some() {
            self.insert_before(first, child);
        } else {
            self.append(parent, child);
        }
    }

    /// Insert a node before a sibling, detaching it from any previous parent.
    pub fn insert_before(&mut self, sibling: ArenaNodeId, new_node: ArenaNodeId) {
        self.detach(new_node);

        let parent = self
            .get(sibling)
            .map(|n| n.parent)
            .unwrap_or(ArenaNodeId::NONE);
        let prev = self
            .get(sibling)
            .map(|n| n.prev_sibling)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Replace `old` with `new_node` in `old`'s parent. `old` ends up detached.
    pub fn replace(&mut self, old: ArenaNodeId, new_node: ArenaNodeId) {
        self.insert_before(old, new_node);
        self.detach(old);
    }

    /// Unlink a node from its parent and siblings. Its subtree stays intact.
    pub fn detach(&mut self, target: ArenaNodeId) {
        let (parent, prev, next) = match self.get(target) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent)
            && p.first_child == target
        {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent)
            && p.last_child == target
        {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(target) {
            node.parent = ArenaNodeId::NONE;
            node.prev_sibling = ArenaNodeId::NONE;
            node.next_sibling = ArenaNodeId::NONE;
        }
    }

    /// Move every child of `from` to the end of `to`, preserving order.
    pub fn reparent_children(&mut self, from: ArenaNodeId, to: ArenaNodeId) {
        let children: Vec<_> = self.children(from).collect();
        for child in children {
            self.append(to, child);
        }
    }

    /// Append text to an existing text node, or create new if last child isn't text.
    pub fn append_text(&mut self, parent: ArenaNodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let ArenaNodeData::Text(ref mut existing) = last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text);
        self.append(parent, text_node);
    }

    /// Concatenated text of all descendant text nodes.
    pub fn collect_text(&self, id: ArenaNodeId) -> String {
        let mut text = String::new();
        for node in self.descendants(id) {
            if let Some(t) = self.text_content(node) {
                text.push_str(t);
            }
        }
        text
    }

    /// Deep-copy a subtree. The copy is detached.
    pub fn deep_clone(&mut self, id: ArenaNodeId) -> ArenaNodeId {
        let data = match self.get(id) {
            Some(node) => node.data.clone(),
            None => return ArenaNodeId::NONE,
        };
        let copy = self.alloc(ArenaNode::new(data));
        let children: Vec<_> = self.children(id).collect();
        for child in children {
            let child_copy = self.deep_clone(child);
            self.append(copy, child_copy);
        }
        copy
    }

    /// Get the number of nodes, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the DOM is empty (only has document root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: ArenaNodeId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(ArenaNodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// Iterate over element children of a node.
    pub fn element_children(&self, parent: ArenaNodeId) -> impl Iterator<Item = ArenaNodeId> + '_ {
        self.children(parent).filter(|&c| self.is_element(c))
    }

    /// All nodes in the subtree rooted at `root`, in document order (root included).
    pub fn descendants(&self, root: ArenaNodeId) -> Vec<ArenaNodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.get(id).is_none() {
                continue;
            }
            out.push(id);
            let mut children: Vec<_> = self.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// All elements attached to the document, in document order.
    pub fn elements(&self) -> Vec<ArenaNodeId> {
        self.descendants(self.document)
            .into_iter()
            .filter(|&id| self.is_element(id))
            .collect()
    }

    /// Find the first attached node matching a predicate (document order).
    pub fn find<F>(&self, predicate: F) -> Option<ArenaNodeId>
    where
        F: Fn(&ArenaNode) -> bool,
    {
        self.descendants(self.document)
            .into_iter()
            .find(|&id| self.get(id).is_some_and(&predicate))
    }

    /// Find element by tag name (first match).
    pub fn find_by_tag(&self, tag: &str) -> Option<ArenaNodeId> {
        self.find(|node| {
            if let ArenaNodeData::Element { name, .. } = &node.data {
                name.local.as_ref() == tag
            } else {
                false
            }
        })
    }

    /// All attached elements with the given tag name.
    pub fn find_all_by_tag(&self, tag: &str) -> Vec<ArenaNodeId> {
        self.elements()
            .into_iter()
            .filter(|&id| self.element_name(id).is_some_and(|n| n.as_ref() == tag))
            .collect()
    }

    /// Get an attached element by id attribute.
    pub fn get_by_id(&self, id: &str) -> Option<ArenaNodeId> {
        self.elements()
            .into_iter()
            .find(|&el| self.element_id(el) == Some(id))
    }

    /// Number of attached elements carrying `class_name` in their class list.
    pub fn count_elements_with_class(&self, class_name: &str) -> usize {
        self.elements()
            .into_iter()
            .filter(|&el| self.has_class(el, class_name))
            .count()
    }

    /// The root element (`<html>`).
    pub fn document_element(&self) -> Option<ArenaNodeId> {
        self.element_children(self.document).next()
    }

    /// The `<head>` element.
    pub fn head(&self) -> Option<ArenaNodeId> {
        let root = self.document_element()?;
        self.element_children(root)
            .find(|&c| self.element_name(c).is_some_and(|n| n.as_ref() == "head"))
    }

    /// The `<body>` element.
    pub fn body(&self) -> Option<ArenaNodeId> {
        let root = self.document_element()?;
        self.element_children(root)
            .find(|&c| self.element_name(c).is_some_and(|n| n.as_ref() == "body"))
    }
}

impl Default for ArenaDom {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a ArenaDom,
    current: ArenaNodeId,
}

impl<'a> Iterator for ChildrenIter<'a> {
    type Item = ArenaNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(ArenaNodeId::NONE);
        Some(id)
    }
}

/// Convenience methods for element nodes.
impl ArenaDom {
    /// Get element's local name (tag).
    pub fn element_name(&self, id: ArenaNodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    /// Get element's namespace.
    pub fn element_namespace(&self, id: ArenaNodeId) -> Option<&Namespace> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { name, .. } => Some(&name.ns),
            _ => None,
        })
    }

    /// Get an attribute value.
    pub fn get_attr(&self, id: ArenaNodeId, attr_name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.local.as_ref() == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Check whether an element carries an attribute.
    pub fn has_attr(&self, id: ArenaNodeId, attr_name: &str) -> bool {
        self.get_attr(id, attr_name).is_some()
    }

    /// Set (or overwrite) an attribute in the null namespace.
    pub fn set_attr(&mut self, id: ArenaNodeId, attr_name: &str, value: &str) {
        if let Some(node) = self.get_mut(id)
            && let ArenaNodeData::Element {
                attrs, id, classes, ..
            } = &mut node.data
        {
            match attrs.iter_mut().find(|a| a.name.local.as_ref() == attr_name) {
                Some(attr) => attr.value = value.to_string(),
                None => attrs.push(Attribute::new(attr_name, value)),
            }
            match attr_name {
                "id" => *id = Some(value.to_string()),
                "class" => *classes = split_classes(value),
                _ => {}
            }
        }
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attr(&mut self, id: ArenaNodeId, attr_name: &str) -> Option<String> {
        let node = self.get_mut(id)?;
        let ArenaNodeData::Element {
            attrs, id, classes, ..
        } = &mut node.data
        else {
            return None;
        };
        let pos = attrs
            .iter()
            .position(|a| a.name.local.as_ref() == attr_name)?;
        let removed = attrs.remove(pos);
        match attr_name {
            "id" => *id = None,
            "class" => classes.clear(),
            _ => {}
        }
        Some(removed.value)
    }

    /// Get element's id attribute.
    pub fn element_id(&self, id: ArenaNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    /// Get element's classes.
    pub fn element_classes(&self, id: ArenaNodeId) -> &[String] {
        static EMPTY: &[String] = &[];
        self.get(id)
            .and_then(|n| match &n.data {
                ArenaNodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(EMPTY)
    }

    /// Check whether an element's class list contains `class_name`.
    pub fn has_class(&self, id: ArenaNodeId, class_name: &str) -> bool {
        self.element_classes(id).iter().any(|c| c == class_name)
    }

    /// Add a class to an element's class list (no-op if already present).
    pub fn add_class(&mut self, id: ArenaNodeId, class_name: &str) {
        if !self.is_element(id) || self.has_class(id, class_name) {
            return;
        }
        let mut classes = self.element_classes(id).to_vec();
        classes.push(class_name.to_string());
        self.set_attr(id, "class", &classes.join(" "));
    }

    /// Check if node is an element.
    pub fn is_element(&self, id: ArenaNodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, ArenaNodeData::Element { .. }))
    }

    /// Get text content of a text node.
    pub fn text_content(&self, id: ArenaNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_elements() {
        let mut dom = ArenaDom::new();

        let div = dom.create_element(html_qname("div"), vec![Attribute::new("id", "main")]);
        dom.append(dom.document(), div);

        assert_eq!(dom.element_name(div).unwrap().as_ref(), "div");
        assert_eq!(dom.element_id(div), Some("main"));
        assert_eq!(dom.get_by_id("main"), Some(div));
    }

    #[test]
    fn test_append_children() {
        let mut dom = ArenaDom::new();

        let parent = dom.create_html_element("div");
        let child1 = dom.create_html_element("p");
        let child2 = dom.create_html_element("p");

        dom.append(dom.document(), parent);
        dom.append(parent, child1);
        dom.append(parent, child2);

        let children: Vec<_> = dom.children(parent).collect();
        assert_eq!(children, vec![child1, child2]);
    }

    #[test]
    fn test_append_moves_node() {
        let mut dom = ArenaDom::new();
        let a = dom.create_html_element("div");
        let b = dom.create_html_element("div");
        let p = dom.create_html_element("p");
        dom.append(dom.document(), a);
        dom.append(a, b);
        dom.append(a, p);

        dom.append(b, p);

        assert_eq!(dom.children(a).collect::<Vec<_>>(), vec![b]);
        assert_eq!(dom.children(b).collect::<Vec<_>>(), vec![p]);
    }

    #[test]
    fn test_prepend_and_replace() {
        let mut dom = ArenaDom::new();
        let parent = dom.create_html_element("div");
        let first = dom.create_html_element("p");
        let second = dom.create_html_element("span");
        dom.append(dom.document(), parent);
        dom.append(parent, first);
        dom.prepend(parent, second);
        assert_eq!(dom.children(parent).collect::<Vec<_>>(), vec![second, first]);

        let third = dom.create_html_element("em");
        dom.replace(second, third);
        assert_eq!(dom.children(parent).collect::<Vec<_>>(), vec![third, first]);
        assert!(dom.get(second).unwrap().parent.is_none());
    }

    #[test]
    fn test_text_merging() {
        let mut dom = ArenaDom::new();

        let p = dom.create_html_element("p");
        dom.append(dom.document(), p);

        dom.append_text(p, "Hello, ");
        dom.append_text(p, "World!");

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(dom.text_content(children[0]), Some("Hello, World!"));
    }

    #[test]
    fn test_attribute_hooks_stay_in_sync() {
        let mut dom = ArenaDom::new();
        let div = dom.create_html_element("div");
        dom.append(dom.document(), div);

        dom.set_attr(div, "class", "a b");
        dom.add_class(div, "c");
        assert_eq!(dom.element_classes(div), ["a", "b", "c"]);
        assert_eq!(dom.get_attr(div, "class"), Some("a b c"));

        dom.set_attr(div, "id", "x");
        assert_eq!(dom.get_by_id("x"), Some(div));
        assert_eq!(dom.remove_attr(div, "id"), Some("x".to_string()));
        assert_eq!(dom.get_by_id("x"), None);
    }

    #[test]
    fn test_detached_nodes_are_invisible_to_queries() {
        let mut dom = ArenaDom::new();
        let div = dom.create_element(html_qname("div"), vec![Attribute::new("class", "k")]);
        dom.append(dom.document(), div);
        assert_eq!(dom.count_elements_with_class("k"), 1);

        dom.detach(div);
        assert_eq!(dom.count_elements_with_class("k"), 0);
    }

    #[test]
    fn test_deep_clone() {
        let mut dom = ArenaDom::new();
        let div = dom.create_html_element("div");
        dom.append(dom.document(), div);
        dom.append_text(div, "text");

        let copy = dom.deep_clone(div);
        assert_ne!(copy, div);
        assert!(dom.get(copy).unwrap().parent.is_none());
        assert_eq!(dom.collect_text(copy), "text");
    }
}
