//! Binding catalog - the declarations of one lexical level
//!
//! An append-only, case-insensitive multimap from name to bindings. A name
//! may be declared several times in one scope (overloads, shadowing
//! re-declarations); lookups prefer the most recent declaration.

use crate::binding::{BindingGraph, BindingId, BindingKind};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    /// Folded name -> bindings in declaration order
    by_name: HashMap<String, Vec<BindingId>>,
    /// Every binding in declaration order
    order: Vec<BindingId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `id` under its own name. Declaring the same binding twice
    /// keeps a single entry.
    pub fn add(&mut self, graph: &BindingGraph, id: BindingId) -> BindingId {
        if self.contains(id) {
            return id;
        }
        self.by_name
            .entry(graph.get(id).name.clone())
            .or_default()
            .push(id);
        self.order.push(id);
        id
    }

    pub fn contains(&self, id: BindingId) -> bool {
        self.order.contains(&id)
    }

    /// Most recent binding named `name` whose kind passes `filter`.
    pub fn lookup(
        &self,
        graph: &BindingGraph,
        name: &str,
        filter: impl Fn(BindingKind) -> bool,
    ) -> Option<BindingId> {
        self.by_name
            .get(name)?
            .iter()
            .rev()
            .copied()
            .find(|&id| filter(graph.get(id).kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = BindingId> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;

    #[test]
    fn test_most_recent_declaration_wins() {
        let mut graph = BindingGraph::new();
        let first = graph.add(Binding::new("x", BindingKind::Variable));
        let second = graph.add(Binding::new("X", BindingKind::Variable));
        let mut catalog = Catalog::new();
        catalog.add(&graph, first);
        catalog.add(&graph, second);

        assert_eq!(catalog.lookup(&graph, "x", |_| true), Some(second));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_kind_filter_skips_overloads() {
        let mut graph = BindingGraph::new();
        let routine = graph.add(Binding::new("f", BindingKind::Routine));
        let var = graph.add(Binding::new("f", BindingKind::Variable));
        let mut catalog = Catalog::new();
        catalog.add(&graph, routine);
        catalog.add(&graph, var);

        assert_eq!(catalog.lookup(&graph, "f", |k| k == BindingKind::Routine), Some(routine));
        assert_eq!(catalog.lookup(&graph, "f", |_| true), Some(var));
        assert_eq!(catalog.lookup(&graph, "g", |_| true), None);
    }

    #[test]
    fn test_add_is_idempotent_per_binding() {
        let mut graph = BindingGraph::new();
        let t = graph.add(Binding::new("t", BindingKind::Relation));
        let mut catalog = Catalog::new();
        catalog.add(&graph, t);
        catalog.add(&graph, t);
        assert_eq!(catalog.iter().collect::<Vec<_>>(), vec![t]);
    }
}
