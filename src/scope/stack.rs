//! The scope stack
//!
//! Frames are pushed and popped in lock step with the recursive tree walk.
//! Resolution, declaration and produced bindings all start at the top frame
//! and move outward until some frame handles them; the root frame handles
//! everything that reaches it.

use super::frame::{Flow, Frame, SelectScope};
use crate::binding::{fold, Binding, BindingGraph, BindingId, BindingKind};
use crate::name::QualifiedName;
use crate::schema::Schema;
use crate::{Error, Result};
use std::collections::HashMap;

#[derive(Debug)]
pub struct Stack {
    frames: Vec<Frame>,
}

impl Stack {
    /// A stack holding only the root frame. Every relation of `schema` is
    /// copied into `graph` so lookups can hand out ids without mutating.
    pub fn new(graph: &mut BindingGraph, schema: &Schema) -> Self {
        let mut relations: Vec<_> = schema.relations().collect();
        relations.sort_by(|a, b| a.name.cmp(&b.name));
        let external = relations
            .into_iter()
            .map(|relation| (relation.name.clone(), relation.instantiate(graph)))
            .collect::<HashMap<_, _>>();
        Self {
            frames: vec![Frame::root(external)],
        }
    }

    pub fn height(&self) -> usize {
        self.frames.len()
    }

    /// Push `frame`; returns the height to unwind back to.
    pub fn push(&mut self, frame: Frame) -> usize {
        let height = self.frames.len();
        tracing::trace!(role = frame.role(), height, "push frame");
        self.frames.push(frame);
        height
    }

    /// Pop and close the top frame, handing what it reports to the new top.
    pub fn pop(&mut self, graph: &mut BindingGraph) -> Result<()> {
        if self.frames.len() <= 1 {
            return Err(Error::structure("cannot pop the root frame"));
        }
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        tracing::trace!(role = frame.role(), height = self.frames.len(), "pop frame");
        for produced in frame.finish(graph)? {
            self.receive(graph, produced)?;
        }
        Ok(())
    }

    /// Pop every frame above `height`. Frames are closed only when `finish`
    /// is set; after a failure they are dropped as they are.
    pub fn unwind(&mut self, graph: &mut BindingGraph, height: usize, finish: bool) -> Result<()> {
        let height = height.max(1);
        while self.frames.len() > height {
            if !finish {
                self.frames.truncate(height);
                break;
            }
            if let Err(e) = self.pop(graph) {
                self.frames.truncate(height);
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn top(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Ids declared at the root frame, in declaration order.
    pub fn globals(&self) -> Vec<BindingId> {
        match &self.frames[0] {
            Frame::Root { catalog, .. } => catalog.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Relation seeded from the external schema, registered or not.
    pub fn external(&self, name: &str) -> Option<BindingId> {
        match &self.frames[0] {
            Frame::Root { external, .. } => external.get(&fold(name)).copied(),
            _ => None,
        }
    }

    /// Resolve `name` through the scope chain. Never mutates.
    pub fn resolve(&self, graph: &BindingGraph, name: &QualifiedName) -> Option<BindingId> {
        let accepts = |kind: BindingKind| name.accepts(kind);
        self.lookup(
            graph,
            name.prefix.as_deref(),
            &name.name,
            name.local_only,
            &accepts,
        )
    }

    fn lookup(
        &self,
        graph: &BindingGraph,
        prefix: Option<&str>,
        name: &str,
        local_only: bool,
        filter: &dyn Fn(BindingKind) -> bool,
    ) -> Option<BindingId> {
        if let Some(prefix) = prefix {
            let (outer, last) = match prefix.rsplit_once('.') {
                Some((outer, last)) => (Some(outer), last),
                None => (None, prefix),
            };
            let container = |kind: BindingKind| kind.is_container();
            let owner = self.lookup(graph, outer, last, local_only, &container)?;
            return graph
                .get(owner)
                .children
                .iter()
                .rev()
                .copied()
                .find(|&c| graph.get(c).name == name && filter(graph.get(c).kind));
        }

        let found = self
            .frames
            .iter()
            .rev()
            .find_map(|frame| frame.resolve_local(graph, name, filter));
        if found.is_some() || local_only {
            return found;
        }
        self.external(name)
            .filter(|&id| filter(graph.get(id).kind))
    }

    /// Declare `id` at the innermost frame that accepts it.
    pub fn declare(&mut self, graph: &mut BindingGraph, id: BindingId) -> BindingId {
        for frame in self.frames.iter_mut().rev() {
            if let Some(declared) = frame.declare(graph, id) {
                return declared;
            }
        }
        id
    }

    /// Declare `id` directly at the root frame.
    pub fn declare_global(&mut self, graph: &mut BindingGraph, id: BindingId) -> BindingId {
        self.frames[0].declare(graph, id).unwrap_or(id)
    }

    /// Offer a produced binding to the top frame.
    pub fn receive(&mut self, graph: &mut BindingGraph, id: BindingId) -> Result<()> {
        let top = self.frames.len() - 1;
        self.receive_from(graph, top, id)
    }

    fn receive_from(&mut self, graph: &mut BindingGraph, start: usize, id: BindingId) -> Result<()> {
        let mut current = id;
        for index in (0..=start).rev() {
            match self.frames[index].receive(graph, current)? {
                Flow::Consumed => return Ok(()),
                Flow::Forward(next) => current = next,
            }
        }
        Ok(())
    }

    /// Close one select-list element: the top frame must be the select
    /// list. The element contributes exactly one binding to the frames
    /// below; zero or several values are folded into a synthetic alias.
    pub fn flush_select_element(&mut self, graph: &mut BindingGraph, position: usize) -> Result<()> {
        let top = self.frames.len() - 1;
        let Frame::SelectList { pending } = &mut self.frames[top] else {
            return Err(Error::structure("select-list element outside a select list"));
        };
        let values = std::mem::take(pending);
        let produced = match values.as_slice() {
            [single] => *single,
            _ => {
                let alias = graph.add(
                    Binding::new(format!("[{}]", position), BindingKind::Alias).with_position(position),
                );
                for &value in &values {
                    graph.add_output(value, alias);
                }
                alias
            }
        };
        self.receive_from(graph, top - 1, produced)
    }

    /// The multiple assignment right below the top `skip` frames, provided
    /// those are all selects.
    pub fn pending_assignment_mut(&mut self, skip: usize) -> Option<&mut Frame> {
        let index = self.frames.len().checked_sub(skip + 1)?;
        if !self.frames[index + 1..].iter().all(|f| matches!(f, Frame::Select(_))) {
            return None;
        }
        let frame = &mut self.frames[index];
        matches!(frame, Frame::MultipleAssignment { .. }).then_some(frame)
    }

    /// Innermost select scope.
    pub fn nearest_select(&self) -> Option<&SelectScope> {
        self.frames.iter().rev().find_map(|frame| match frame {
            Frame::Select(scope) => Some(scope),
            _ => None,
        })
    }

    pub fn nearest_select_mut(&mut self) -> Option<&mut SelectScope> {
        self.frames.iter_mut().rev().find_map(|frame| match frame {
            Frame::Select(scope) => Some(scope),
            _ => None,
        })
    }

    pub fn roles(&self) -> Vec<&'static str> {
        self.frames.iter().map(Frame::role).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{ "tables": [ { "name": "t", "columns": [ { "name": "col1" }, { "name": "col2" } ] } ] }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_shadowing_prefers_inner_scope() {
        let mut graph = BindingGraph::new();
        let mut stack = Stack::new(&mut graph, &Schema::empty());
        let outer = graph.add(Binding::new("x", BindingKind::Variable));
        stack.push(Frame::lexical(None));
        stack.declare(&mut graph, outer);
        let height = stack.push(Frame::lexical(None));
        let inner = graph.add(Binding::new("x", BindingKind::Cursor));
        stack.declare(&mut graph, inner);

        assert_eq!(stack.resolve(&graph, &QualifiedName::new("X")), Some(inner));
        assert_eq!(
            stack.resolve(&graph, &QualifiedName::new("x").of_kind(BindingKind::Variable)),
            Some(outer)
        );
        stack.unwind(&mut graph, height, true).unwrap();
        assert_eq!(stack.resolve(&graph, &QualifiedName::new("x")), Some(outer));
    }

    #[test]
    fn test_global_kinds_reach_the_root() {
        let mut graph = BindingGraph::new();
        let mut stack = Stack::new(&mut graph, &Schema::empty());
        let pkg = graph.add(Binding::new("p", BindingKind::Package));
        stack.push(Frame::lexical(None));
        stack.push(Frame::select());
        stack.declare(&mut graph, pkg);
        assert_eq!(stack.globals(), vec![pkg]);
    }

    #[test]
    fn test_schema_fallback_respects_local_only() {
        let mut graph = BindingGraph::new();
        let stack = Stack::new(&mut graph, &schema());
        let t = stack.resolve(&graph, &QualifiedName::new("T")).unwrap();
        assert_eq!(graph.get(t).kind, BindingKind::Relation);
        assert!(stack.resolve(&graph, &QualifiedName::local("t")).is_none());
        assert!(stack.globals().is_empty());
    }

    #[test]
    fn test_qualified_resolution_uses_children_only() {
        let mut graph = BindingGraph::new();
        let mut stack = Stack::new(&mut graph, &schema());
        stack.push(Frame::lexical(None));
        let col3 = graph.add(Binding::new("col3", BindingKind::Variable));
        stack.declare(&mut graph, col3);

        let col1 = stack.resolve(&graph, &QualifiedName::parse("t.col1")).unwrap();
        assert_eq!(graph.get(col1).kind, BindingKind::Column);
        // An unqualified col3 resolves, t.col3 does not
        assert!(stack.resolve(&graph, &QualifiedName::new("col3")).is_some());
        assert!(stack.resolve(&graph, &QualifiedName::parse("t.col3")).is_none());
        // Unknown prefix fails instead of falling back to a flat name
        assert!(stack.resolve(&graph, &QualifiedName::parse("nope.col3")).is_none());
    }

    #[test]
    fn test_receive_falls_through_to_root() {
        let mut graph = BindingGraph::new();
        let mut stack = Stack::new(&mut graph, &Schema::empty());
        let x = graph.add(Binding::new("x", BindingKind::Variable));
        let y = graph.add(Binding::new("y", BindingKind::Variable));
        stack.push(Frame::lexical(None));
        stack.receive(&mut graph, y).unwrap();
        stack.push(Frame::assignment(Some(x)));
        stack.push(Frame::lexical(None));
        stack.receive(&mut graph, y).unwrap();
        assert_eq!(graph.get(y).outputs, vec![x]);
    }

    #[test]
    fn test_pop_reports_signals_to_new_top() {
        let mut graph = BindingGraph::new();
        let mut stack = Stack::new(&mut graph, &Schema::empty());
        let routine = graph.add(Binding::new("f", BindingKind::Routine));
        let ret = graph.add(Binding::new("[return]", BindingKind::Return));
        let value = graph.add(Binding::new("v", BindingKind::Variable));
        stack.push(Frame::lexical(Some(routine)));
        stack.push(Frame::wrapper(ret));
        stack.receive(&mut graph, value).unwrap();
        stack.pop(&mut graph).unwrap();

        assert_eq!(graph.get(value).outputs, vec![ret]);
        assert_eq!(graph.get(ret).outputs, vec![routine]);
        assert!(stack.pop(&mut graph).is_ok());
        assert!(stack.pop(&mut graph).is_err());
    }

    #[test]
    fn test_unwind_drops_frames_after_failure() {
        let mut graph = BindingGraph::new();
        let mut stack = Stack::new(&mut graph, &Schema::empty());
        let a = graph.add(Binding::new("a", BindingKind::Variable));
        let height = stack.push(Frame::multiple_assignment(vec![a]));
        stack.push(Frame::lexical(None));
        assert!(stack.unwind(&mut graph, height, true).is_err());
        assert_eq!(stack.height(), height);

        let height = stack.push(Frame::multiple_assignment(vec![a]));
        stack.unwind(&mut graph, height, false).unwrap();
        assert_eq!(stack.roles(), vec!["root"]);
    }

    #[test]
    fn test_select_element_folding() {
        let mut graph = BindingGraph::new();
        let mut stack = Stack::new(&mut graph, &Schema::empty());
        let x = graph.add(Binding::new("x", BindingKind::Variable));
        let y = graph.add(Binding::new("y", BindingKind::Variable));
        let a = graph.add(Binding::new("a", BindingKind::Column));
        let b = graph.add(Binding::new("b", BindingKind::Column));
        stack.push(Frame::multiple_assignment(vec![x, y]));
        stack.push(Frame::select_list());
        stack.receive(&mut graph, a).unwrap();
        stack.flush_select_element(&mut graph, 0).unwrap();
        stack.receive(&mut graph, a).unwrap();
        stack.receive(&mut graph, b).unwrap();
        stack.flush_select_element(&mut graph, 1).unwrap();

        assert_eq!(graph.get(a).outputs.len(), 2);
        assert_eq!(graph.get(a).outputs[0], x);
        let folded = graph.get(b).outputs[0];
        assert_eq!(graph.get(folded).kind, BindingKind::Alias);
        assert_eq!(graph.get(folded).outputs, vec![y]);
    }

    #[test]
    fn test_pending_assignment_only_through_selects() {
        let mut graph = BindingGraph::new();
        let mut stack = Stack::new(&mut graph, &Schema::empty());
        let x = graph.add(Binding::new("x", BindingKind::Variable));
        stack.push(Frame::multiple_assignment(vec![x]));
        assert!(stack.pending_assignment_mut(0).is_some());

        stack.push(Frame::select());
        assert!(stack.pending_assignment_mut(0).is_none());
        assert!(stack.pending_assignment_mut(1).is_some());

        stack.push(Frame::EffectClause);
        stack.push(Frame::select());
        assert!(stack.pending_assignment_mut(1).is_none());
        assert!(stack.pending_assignment_mut(9).is_none());
    }
}
