//! Syntax tree - the read-only input of an analysis
//!
//! Trees are produced by an external parser and handed over as JSON
//! documents:
//!
//! ```json
//! { "tag": "procedure_body", "line": 1, "children": [
//!     { "tag": "identifier", "children": [ { "tag": "id_expression", "text": "P" } ] } ] }
//! ```
//!
//! Nodes are navigated through [`Node`], a cheap handle. A missing node is
//! the empty handle, so navigation chains never need `Option` checks.

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
struct RawNode {
    tag: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
    #[serde(default)]
    children: Vec<RawNode>,
}

#[derive(Debug)]
struct NodeData {
    tag: String,
    text: Option<String>,
    line: Option<u32>,
    column: Option<u32>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Arena holding every node of one parsed source unit.
#[derive(Debug)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
}

impl SyntaxTree {
    pub fn from_json(contents: &str) -> Result<Self> {
        let raw: RawNode = serde_json::from_str(contents)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawNode = serde_json::from_value(value)?;
        Ok(Self::from_raw(raw))
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
            .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
    }

    fn from_raw(raw: RawNode) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.insert(raw, None);
        tree
    }

    fn insert(&mut self, raw: RawNode, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(NodeData {
            tag: raw.tag,
            text: raw.text,
            line: raw.line,
            column: raw.column,
            parent,
            children: Vec::with_capacity(raw.children.len()),
        });
        for child in raw.children {
            let child_index = self.insert(child, Some(index));
            self.nodes[index].children.push(child_index);
        }
        index
    }

    pub fn root(&self) -> Node<'_> {
        Node::at(self, (!self.nodes.is_empty()).then_some(0))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Where a node sits in the source, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub tag: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Location {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.tag.is_empty() && self.line.is_none()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "<unknown>");
        }
        write!(f, "<{}>", self.tag)?;
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, " at {}:{}", line, column),
            (Some(line), None) => write!(f, " at line {}", line),
            _ => Ok(()),
        }
    }
}

/// Handle to a node, or the empty node.
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    index: Option<usize>,
}

impl<'t> Node<'t> {
    fn at(tree: &'t SyntaxTree, index: Option<usize>) -> Self {
        Self { tree, index }
    }

    fn empty(&self) -> Self {
        Self::at(self.tree, None)
    }

    fn data(&self) -> Option<&'t NodeData> {
        self.index.map(|i| &self.tree.nodes[i])
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none()
    }

    pub fn is_present(&self) -> bool {
        self.index.is_some()
    }

    /// Arena position; preorder, so it also gives document order.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Tag of the node; empty string for the empty node.
    pub fn tag(&self) -> &'t str {
        self.data().map(|d| d.tag.as_str()).unwrap_or("")
    }

    pub fn is(&self, tag: &str) -> bool {
        self.is_present() && self.tag() == tag
    }

    /// Own text followed by the text of all descendants, trimmed and
    /// lower-cased.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_lowercase()
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(data) = self.data() {
            if let Some(text) = &data.text {
                out.push_str(text);
            }
            for child in self.children() {
                child.collect_text(out);
            }
        }
    }

    pub fn location(&self) -> Location {
        match self.data() {
            Some(d) => Location {
                tag: d.tag.clone(),
                line: d.line,
                column: d.column,
            },
            None => Location::unknown(),
        }
    }

    pub fn children(&self) -> Vec<Node<'t>> {
        self.data()
            .map(|d| d.children.iter().map(|&i| Self::at(self.tree, Some(i))).collect())
            .unwrap_or_default()
    }

    pub fn children_tagged(&self, tag: &str) -> Vec<Node<'t>> {
        self.children().into_iter().filter(|c| c.is(tag)).collect()
    }

    /// First child with `tag`.
    pub fn child(&self, tag: &str) -> Node<'t> {
        self.children()
            .into_iter()
            .find(|c| c.is(tag))
            .unwrap_or_else(|| self.empty())
    }

    /// Last child with `tag`.
    pub fn last_child(&self, tag: &str) -> Node<'t> {
        self.children()
            .into_iter()
            .rev()
            .find(|c| c.is(tag))
            .unwrap_or_else(|| self.empty())
    }

    pub fn nth_child(&self, n: usize) -> Node<'t> {
        self.children()
            .get(n)
            .copied()
            .unwrap_or_else(|| self.empty())
    }

    /// Follow a chain of child tags, taking the first match at each step.
    pub fn path(&self, tags: &[&str]) -> Node<'t> {
        tags.iter().fold(*self, |node, tag| node.child(tag))
    }

    /// All descendants with `tag`, in document order.
    pub fn find(&self, tag: &str) -> Vec<Node<'t>> {
        let mut found = Vec::new();
        for child in self.children() {
            child.find_into(tag, &mut found);
        }
        found
    }

    fn find_into(&self, tag: &str, found: &mut Vec<Node<'t>>) {
        if self.is(tag) {
            found.push(*self);
        }
        for child in self.children() {
            child.find_into(tag, found);
        }
    }

    /// First descendant with `tag`.
    pub fn find_first(&self, tag: &str) -> Node<'t> {
        self.find(tag)
            .first()
            .copied()
            .unwrap_or_else(|| self.empty())
    }

    /// Last descendant with `tag`.
    pub fn find_last(&self, tag: &str) -> Node<'t> {
        self.find(tag)
            .last()
            .copied()
            .unwrap_or_else(|| self.empty())
    }

    pub fn parent(&self) -> Node<'t> {
        Self::at(self.tree, self.data().and_then(|d| d.parent))
    }

    /// The parent, if it carries `tag`.
    pub fn parent_tagged(&self, tag: &str) -> Node<'t> {
        let parent = self.parent();
        if parent.is(tag) { parent } else { self.empty() }
    }

    /// Nearest ancestor with `tag`.
    pub fn ancestor(&self, tag: &str) -> Node<'t> {
        let mut current = self.parent();
        while current.is_present() {
            if current.is(tag) {
                return current;
            }
            current = current.parent();
        }
        self.empty()
    }

    fn siblings_split(&self) -> (Vec<Node<'t>>, Vec<Node<'t>>) {
        let siblings = self.parent().children();
        match siblings.iter().position(|s| s.index == self.index) {
            Some(pos) => (siblings[..pos].to_vec(), siblings[pos + 1..].to_vec()),
            None => (Vec::new(), Vec::new()),
        }
    }

    /// Immediately preceding sibling.
    pub fn prev(&self) -> Node<'t> {
        self.siblings_split()
            .0
            .last()
            .copied()
            .unwrap_or_else(|| self.empty())
    }

    /// Immediately following sibling.
    pub fn next(&self) -> Node<'t> {
        self.siblings_split()
            .1
            .first()
            .copied()
            .unwrap_or_else(|| self.empty())
    }

    /// Immediately following sibling, if it carries `tag`.
    pub fn next_tagged(&self, tag: &str) -> Node<'t> {
        let next = self.next();
        if next.is(tag) { next } else { self.empty() }
    }

    /// Immediately preceding sibling, if it carries `tag`.
    pub fn prev_tagged(&self, tag: &str) -> Node<'t> {
        let prev = self.prev();
        if prev.is(tag) { prev } else { self.empty() }
    }

    /// All preceding siblings, nearest last.
    pub fn prev_all(&self) -> Vec<Node<'t>> {
        self.siblings_split().0
    }

    /// All following siblings, nearest first.
    pub fn next_all(&self) -> Vec<Node<'t>> {
        self.siblings_split().1
    }

    pub fn prev_all_tagged(&self, tag: &str) -> Vec<Node<'t>> {
        self.prev_all().into_iter().filter(|s| s.is(tag)).collect()
    }

    /// Every other child of the parent, in order.
    pub fn siblings(&self) -> Vec<Node<'t>> {
        let (mut before, after) = self.siblings_split();
        before.extend(after);
        before
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "Node({} #{})", self.tag(), i),
            None => write!(f, "Node(empty)"),
        }
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.index == other.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SyntaxTree {
        SyntaxTree::from_value(json!({
            "tag": "root", "line": 1,
            "children": [
                { "tag": "a", "text": " Hello " },
                { "tag": "b", "children": [
                    { "tag": "id", "text": "X" },
                    { "tag": "dot", "text": "." },
                    { "tag": "id", "text": "Y", "line": 3, "column": 7 }
                ]},
                { "tag": "a", "text": "World" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_text_concatenates_and_folds() {
        let tree = sample();
        assert_eq!(tree.root().child("b").text(), "x.y");
        assert_eq!(tree.root().child("a").text(), "hello");
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn test_child_navigation() {
        let tree = sample();
        let root = tree.root();
        assert_eq!(root.children().len(), 3);
        assert_eq!(root.children_tagged("a").len(), 2);
        assert_eq!(root.last_child("a").text(), "world");
        assert_eq!(root.nth_child(1).tag(), "b");
        assert!(root.nth_child(9).is_empty());
        assert!(root.child("zzz").is_empty());
        assert_eq!(root.path(&["b", "dot"]).text(), ".");
        assert!(root.path(&["b", "nope", "id"]).is_empty());
    }

    #[test]
    fn test_descendant_search() {
        let tree = sample();
        let root = tree.root();
        let ids = root.find("id");
        assert_eq!(ids.len(), 2);
        assert_eq!(root.find_first("id").text(), "x");
        assert_eq!(root.find_last("id").text(), "y");
        assert_eq!(ids[1].ancestor("root"), root);
        assert!(ids[1].ancestor("a").is_empty());
    }

    #[test]
    fn test_sibling_navigation() {
        let tree = sample();
        let ids = tree.root().find("id");
        let (x, y) = (ids[0], ids[1]);

        assert_eq!(x.next().tag(), "dot");
        assert!(x.next_tagged("id").is_empty());
        assert_eq!(y.prev_all_tagged("id"), vec![x]);
        assert_eq!(y.prev_tagged("dot").text(), ".");
        assert!(x.prev().is_empty());
        assert_eq!(x.next_all().len(), 2);
        assert_eq!(y.siblings().len(), 2);
        assert_eq!(x.parent_tagged("b").tag(), "b");
        assert!(x.parent_tagged("root").is_empty());
    }

    #[test]
    fn test_empty_node_is_inert() {
        let tree = sample();
        let empty = tree.root().child("missing");
        assert!(empty.is_empty());
        assert_eq!(empty.tag(), "");
        assert_eq!(empty.text(), "");
        assert!(empty.children().is_empty());
        assert!(empty.next().is_empty());
        assert!(empty.parent().is_empty());
        assert!(empty.location().is_unknown());
    }

    #[test]
    fn test_location_display() {
        let tree = sample();
        let y = tree.root().find_last("id");
        assert_eq!(y.location().to_string(), "<id> at 3:7");
        assert_eq!(tree.root().location().to_string(), "<root> at line 1");
    }

    #[test]
    fn test_rejects_malformed_document() {
        assert!(SyntaxTree::from_json("{ \"children\": [] }").is_err());
    }
}
