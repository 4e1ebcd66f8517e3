//! Analysis result - the finished binding graph and queries over it

use crate::binding::{Binding, BindingGraph, BindingId, BindingKind};
use crate::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// One lineage edge: the value of `source` flows into `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: BindingId,
    pub target: BindingId,
}

/// Immutable graph of one traversal, rooted at its global declarations.
#[derive(Debug)]
pub struct Analysis {
    graph: BindingGraph,
    roots: Vec<BindingId>,
    /// Child -> first structural parent, derived from the children lists
    owners: HashMap<BindingId, BindingId>,
}

impl Analysis {
    pub fn new(graph: BindingGraph, roots: Vec<BindingId>) -> Self {
        let mut owners = HashMap::new();
        for (parent, binding) in graph.iter() {
            for &child in &binding.children {
                owners.entry(child).or_insert(parent);
            }
        }
        Self { graph, roots, owners }
    }

    /// Bindings declared at the root frame, in declaration order.
    pub fn roots(&self) -> &[BindingId] {
        &self.roots
    }

    pub fn graph(&self) -> &BindingGraph {
        &self.graph
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        self.graph.get(id)
    }

    /// Follow a dotted path from the roots through structural children,
    /// e.g. `pkg.proc.cursor`. The most recent match wins at every step.
    pub fn find(&self, path: &str) -> Option<BindingId> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self
            .roots
            .iter()
            .rev()
            .copied()
            .find(|&id| self.graph.get(id).is_named(first))?;
        for part in parts {
            current = self.graph.child_named(current, part, None)?;
        }
        Some(current)
    }

    /// Structural parent of `id`; the lowest-id parent when it has several.
    pub fn owner_of(&self, id: BindingId) -> Option<BindingId> {
        self.owners.get(&id).copied()
    }

    /// Dotted path of `id` through its owners.
    pub fn path_of(&self, id: BindingId) -> String {
        let mut names = vec![self.graph.get(id).name.clone()];
        let mut seen = HashSet::from([id]);
        let mut current = self.owner_of(id);
        while let Some(owner) = current {
            if !seen.insert(owner) {
                break;
            }
            names.push(self.graph.get(owner).name.clone());
            current = self.owner_of(owner);
        }
        names.reverse();
        names.join(".")
    }

    /// Every lineage edge, in arena order.
    pub fn edges(&self) -> Vec<Edge> {
        self.graph
            .iter()
            .flat_map(|(source, binding)| {
                binding
                    .outputs
                    .iter()
                    .map(move |&target| Edge { source, target })
            })
            .collect()
    }

    /// Everything whose value reaches `id`, nearest first.
    pub fn upstream(&self, id: BindingId) -> Vec<BindingId> {
        let mut incoming: HashMap<BindingId, Vec<BindingId>> = HashMap::new();
        for edge in self.edges() {
            incoming.entry(edge.target).or_default().push(edge.source);
        }
        walk(id, |current| incoming.get(&current).cloned().unwrap_or_default())
    }

    /// Everything the value of `id` reaches, nearest first.
    pub fn downstream(&self, id: BindingId) -> Vec<BindingId> {
        walk(id, |current| self.graph.get(current).outputs.clone())
    }

    /// Roots and their structural descendants.
    pub fn bindings(&self) -> Vec<BindingId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<BindingId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            stack.extend(self.graph.get(id).children.iter().rev().copied());
        }
        order
    }

    /// Number of reachable bindings per kind, for kinds that occur.
    pub fn count_by_kind(&self) -> Vec<(BindingKind, usize)> {
        let reachable = self.bindings();
        BindingKind::all()
            .iter()
            .map(|kind| {
                let count = reachable
                    .iter()
                    .filter(|&&id| self.graph.get(id).kind == *kind)
                    .count();
                (*kind, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        let document = Document {
            roots: &self.roots,
            bindings: self
                .graph
                .iter()
                .map(|(id, binding)| Entry {
                    id,
                    path: self.path_of(id),
                    binding,
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

/// Breadth-first closure over `next`, excluding the start.
fn walk(start: BindingId, next: impl Fn(BindingId) -> Vec<BindingId>) -> Vec<BindingId> {
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    let mut order = Vec::new();
    while let Some(current) = queue.pop_front() {
        for neighbour in next(current) {
            if seen.insert(neighbour) {
                order.push(neighbour);
                queue.push_back(neighbour);
            }
        }
    }
    order
}

#[derive(Serialize)]
struct Document<'a> {
    roots: &'a [BindingId],
    bindings: Vec<Entry<'a>>,
}

#[derive(Serialize)]
struct Entry<'a> {
    id: BindingId,
    path: String,
    #[serde(flatten)]
    binding: &'a Binding,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// t(col1) -> x -> y, with x and y declared in procedure p
    fn sample() -> Analysis {
        let mut graph = BindingGraph::new();
        let t = graph.add(Binding::new("t", BindingKind::Relation));
        let col1 = graph.add(Binding::new("col1", BindingKind::Column));
        graph.add_child(t, col1);
        let p = graph.add(Binding::new("p", BindingKind::Routine));
        let x = graph.add(Binding::new("x", BindingKind::Variable));
        let y = graph.add(Binding::new("y", BindingKind::Variable));
        graph.add_child(p, x);
        graph.add_child(p, y);
        graph.add_output(col1, x);
        graph.add_output(x, y);
        Analysis::new(graph, vec![t, p])
    }

    #[test]
    fn test_find_follows_children() {
        let analysis = sample();
        let x = analysis.find("P.X").unwrap();
        assert_eq!(analysis.binding(x).kind, BindingKind::Variable);
        assert_eq!(analysis.path_of(x), "p.x");
        assert_eq!(analysis.owner_of(x), analysis.find("p"));
        assert_eq!(analysis.owner_of(analysis.find("p").unwrap()), None);
        assert!(analysis.find("p.col1").is_none());
        assert!(analysis.find("nope").is_none());
    }

    #[test]
    fn test_upstream_and_downstream_are_transitive() {
        let analysis = sample();
        let col1 = analysis.find("t.col1").unwrap();
        let x = analysis.find("p.x").unwrap();
        let y = analysis.find("p.y").unwrap();
        assert_eq!(analysis.downstream(col1), vec![x, y]);
        assert_eq!(analysis.upstream(y), vec![x, col1]);
        assert!(analysis.upstream(col1).is_empty());
        assert_eq!(analysis.edges().len(), 2);
    }

    #[test]
    fn test_bindings_and_counts() {
        let analysis = sample();
        assert_eq!(analysis.bindings().len(), 5);
        let counts = analysis.count_by_kind();
        assert!(counts.contains(&(BindingKind::Variable, 2)));
        assert!(!counts.iter().any(|(kind, _)| *kind == BindingKind::Cursor));
    }

    #[test]
    fn test_json_export() {
        let analysis = sample();
        let value: serde_json::Value = serde_json::from_str(&analysis.to_json().unwrap()).unwrap();
        assert_eq!(value["roots"], serde_json::json!([0, 2]));
        assert_eq!(value["bindings"][1]["path"], "t.col1");
        assert_eq!(value["bindings"][1]["kind"], "COLUMN");
        assert_eq!(value["bindings"][1]["outputs"], serde_json::json!([3]));
    }
}
