//! Binding model - the symbols of a lineage graph
//!
//! Every declared or referenced name becomes a [`Binding`]. Bindings carry two
//! independent relation kinds:
//! - `children`: structural membership (column of a table, parameter of a routine)
//! - `outputs`: lineage, "the value of this binding flows into that one"
//!
//! Bindings live in a [`BindingGraph`] arena owned by a single traversal and
//! reference each other through [`BindingId`] handles.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stable handle of a binding inside its [`BindingGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingId(pub u32);

impl BindingId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a binding stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingKind {
    /// Table or view known from the external schema
    Relation,
    /// Column of a relation
    Column,
    /// Record-like placeholder: unknown table, loop record, named subquery
    Structure,
    Package,
    /// Procedure or function
    Routine,
    Variable,
    Parameter,
    Cursor,
    /// Member reached through a dotted name
    Field,
    /// Select-list alias
    Alias,
    /// Actual argument of one call site
    Argument,
    /// Value leaving a routine or a cursor
    Return,
    /// A call statement
    Call,
}

impl BindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::Relation => "relation",
            BindingKind::Column => "column",
            BindingKind::Structure => "structure",
            BindingKind::Package => "package",
            BindingKind::Routine => "routine",
            BindingKind::Variable => "variable",
            BindingKind::Parameter => "parameter",
            BindingKind::Cursor => "cursor",
            BindingKind::Field => "field",
            BindingKind::Alias => "alias",
            BindingKind::Argument => "argument",
            BindingKind::Return => "return",
            BindingKind::Call => "call",
        }
    }

    pub fn all() -> &'static [BindingKind] {
        &[
            BindingKind::Relation,
            BindingKind::Column,
            BindingKind::Structure,
            BindingKind::Package,
            BindingKind::Routine,
            BindingKind::Variable,
            BindingKind::Parameter,
            BindingKind::Cursor,
            BindingKind::Field,
            BindingKind::Alias,
            BindingKind::Argument,
            BindingKind::Return,
            BindingKind::Call,
        ]
    }

    /// Kinds that are only ever declared at the root frame.
    pub fn is_global(&self) -> bool {
        matches!(self, BindingKind::Relation | BindingKind::Package)
    }

    /// Kinds that can qualify another name (`prefix.name`).
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            BindingKind::Relation | BindingKind::Structure | BindingKind::Package | BindingKind::Cursor
        )
    }

    /// Kinds a lexical scope attaches to its owner as structural members.
    pub fn is_member(&self) -> bool {
        matches!(
            self,
            BindingKind::Routine | BindingKind::Parameter | BindingKind::Cursor | BindingKind::Variable
        )
    }

    /// Synthetic kinds that report themselves to the enclosing frame once
    /// the frame that collected them closes.
    pub fn is_signal(&self) -> bool {
        matches!(self, BindingKind::Return | BindingKind::Argument)
    }
}

impl FromStr for BindingKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BindingKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Parse(format!("Unknown binding kind: {}", s)))
    }
}

impl std::fmt::Display for BindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Case-fold a name the way every lookup compares names.
pub fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A declared or referenced symbol.
#[derive(Debug, Clone, Serialize)]
pub struct Binding {
    /// Case-folded name
    pub name: String,
    pub kind: BindingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Ordinal of a parameter or argument
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// Free-form classification, e.g. the relation type
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    pub children: Vec<BindingId>,
    pub outputs: Vec<BindingId>,
}

impl Binding {
    pub fn new(name: impl AsRef<str>, kind: BindingKind) -> Self {
        Self {
            name: fold(name.as_ref()),
            kind,
            comment: None,
            position: None,
            types: Vec::new(),
            children: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.types.push(tag.into());
        self
    }

    /// Name comparison with the case folding of lookups.
    pub fn is_named(&self, name: &str) -> bool {
        self.name == fold(name)
    }
}

/// Arena of all bindings created by one traversal.
#[derive(Debug, Default)]
pub struct BindingGraph {
    bindings: Vec<Binding>,
}

impl BindingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a binding into the arena and hand out its id.
    pub fn add(&mut self, binding: Binding) -> BindingId {
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(binding);
        id
    }

    pub fn get(&self, id: BindingId) -> &Binding {
        &self.bindings[id.index()]
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(i, b)| (BindingId(i as u32), b))
    }

    /// Append `child` to the structural members of `parent`. Attaching the
    /// same child twice is a no-op.
    pub fn add_child(&mut self, parent: BindingId, child: BindingId) -> BindingId {
        if !self.bindings[parent.index()].children.contains(&child) {
            self.bindings[parent.index()].children.push(child);
        }
        child
    }

    /// Record that the value of `source` flows into `target`. Returns false
    /// when the edge already existed.
    pub fn add_output(&mut self, source: BindingId, target: BindingId) -> bool {
        let outputs = &mut self.bindings[source.index()].outputs;
        if outputs.contains(&target) {
            return false;
        }
        outputs.push(target);
        true
    }

    pub fn set_comment(&mut self, id: BindingId, comment: impl Into<String>) {
        self.bindings[id.index()].comment = Some(comment.into());
    }

    /// Find a structural child of `parent` by case-insensitive name, newest
    /// first, optionally restricted to one kind.
    pub fn child_named(
        &self,
        parent: BindingId,
        name: &str,
        kind: Option<BindingKind>,
    ) -> Option<BindingId> {
        let name = fold(name);
        self.get(parent)
            .children
            .iter()
            .rev()
            .copied()
            .find(|&c| {
                let child = self.get(c);
                child.name == name && kind.is_none_or(|k| child.kind == k)
            })
    }

    /// Existing child of `parent` named `name`, or a new one of `kind`.
    pub fn child_or_insert(&mut self, parent: BindingId, name: &str, kind: BindingKind) -> BindingId {
        match self.child_named(parent, name, None) {
            Some(existing) => existing,
            None => {
                let child = self.add(Binding::new(name, kind));
                self.add_child(parent, child)
            }
        }
    }

    /// Bindings whose outputs contain `target`.
    pub fn sources_of(&self, target: BindingId) -> Vec<BindingId> {
        self.iter()
            .filter(|(_, b)| b.outputs.contains(&target))
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_kind_roundtrip() {
        for kind in BindingKind::all() {
            let parsed: BindingKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
        assert!("table".parse::<BindingKind>().is_err());
    }

    #[test]
    fn test_names_are_case_folded() {
        let binding = Binding::new("  My_Table ", BindingKind::Relation);
        assert_eq!(binding.name, "my_table");
        assert!(binding.is_named("MY_TABLE"));
    }

    #[test]
    fn test_children_and_outputs_stay_apart() {
        let mut graph = BindingGraph::new();
        let table = graph.add(Binding::new("t", BindingKind::Relation));
        let column = graph.add(Binding::new("c", BindingKind::Column));
        let var = graph.add(Binding::new("v", BindingKind::Variable));

        graph.add_child(table, column);
        assert!(graph.add_output(column, var));
        assert!(!graph.add_output(column, var));

        assert_eq!(graph.get(table).children, vec![column]);
        assert!(graph.get(table).outputs.is_empty());
        assert_eq!(graph.get(column).outputs, vec![var]);
        assert!(graph.get(column).children.is_empty());
        assert_eq!(graph.sources_of(var), vec![column]);
    }

    #[test]
    fn test_child_lookup_filters_kind() {
        let mut graph = BindingGraph::new();
        let pkg = graph.add(Binding::new("p", BindingKind::Package));
        let var = graph.add(Binding::new("f", BindingKind::Variable));
        let routine = graph.add(Binding::new("F", BindingKind::Routine));
        graph.add_child(pkg, var);
        graph.add_child(pkg, routine);

        assert_eq!(graph.child_named(pkg, "F", None), Some(routine));
        assert_eq!(graph.child_named(pkg, "f", Some(BindingKind::Variable)), Some(var));
        assert_eq!(graph.child_named(pkg, "g", None), None);

        let again = graph.child_or_insert(pkg, "f", BindingKind::Field);
        assert_eq!(again, routine);
        let fresh = graph.child_or_insert(pkg, "g", BindingKind::Field);
        assert_eq!(graph.get(fresh).kind, BindingKind::Field);
        assert_eq!(graph.get(pkg).children.len(), 3);
    }

    #[test]
    fn test_builders() {
        let param = Binding::new("p_id", BindingKind::Parameter)
            .with_position(2)
            .with_comment("primary key")
            .with_type("IN");
        assert_eq!(param.position, Some(2));
        assert_eq!(param.comment.as_deref(), Some("primary key"));
        assert_eq!(param.types, vec!["IN".to_string()]);
    }
}
