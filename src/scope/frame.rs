//! Frames - one level of the active scope stack
//!
//! Every frame answers three questions:
//! - resolve: does this level know a name?
//! - declare: does a new binding belong to this level?
//! - receive: what does a binding produced below this level mean here?
//!
//! A frame that has no answer lets the stack ask the enclosing frame.

use crate::binding::{Binding, BindingGraph, BindingId, BindingKind};
use crate::catalog::Catalog;
use crate::{Error, Result};
use std::collections::HashMap;

/// Outcome of offering a produced binding to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Consumed,
    Forward(BindingId),
}

/// A relation read by a select, with its alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub relation: BindingId,
    pub alias: Option<String>,
}

/// Name space of one query block: its FROM sources and the named
/// subqueries of its WITH clause.
#[derive(Debug, Default)]
pub struct SelectScope {
    pub catalog: Catalog,
    pub sources: Vec<Source>,
}

impl SelectScope {
    fn resolve_local(
        &self,
        graph: &BindingGraph,
        name: &str,
        filter: &dyn Fn(BindingKind) -> bool,
    ) -> Option<BindingId> {
        if let Some(id) = self.catalog.lookup(graph, name, filter) {
            return Some(id);
        }
        // Source relations by alias or by name
        let by_alias = self.sources.iter().find(|s| match &s.alias {
            Some(alias) => alias == name,
            None => graph.get(s.relation).name == name,
        });
        if let Some(source) = by_alias {
            if filter(graph.get(source.relation).kind) {
                return Some(source.relation);
            }
        }
        // Columns of the sources
        self.sources.iter().find_map(|s| {
            graph
                .get(s.relation)
                .children
                .iter()
                .copied()
                .find(|&c| graph.get(c).name == name && filter(graph.get(c).kind))
        })
    }

    /// The only source of this select, if there is exactly one.
    pub fn single_source(&self) -> Option<BindingId> {
        match self.sources.as_slice() {
            [only] => Some(only.relation),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum Frame {
    /// Bottom of the stack: global declarations plus the relations seeded
    /// from the external schema for this traversal.
    Root {
        catalog: Catalog,
        external: HashMap<String, BindingId>,
    },
    /// Fresh declaration namespace, optionally owned by a package, routine,
    /// cursor or loop.
    Lexical {
        catalog: Catalog,
        owner: Option<BindingId>,
    },
    /// Everything received flows into `target`. Without a target the first
    /// binding received becomes the target.
    Assignment { target: Option<BindingId> },
    /// The k-th binding received flows into the k-th target.
    MultipleAssignment {
        targets: Vec<BindingId>,
        received: usize,
    },
    /// Captures everything received into `binding`, as lineage or as
    /// structural members.
    Wrapper { binding: BindingId, structural: bool },
    /// Groups received bindings under `owner`. Without an owner the frame
    /// builds a chain: each binding becomes a member of the previous one.
    Children {
        owner: Option<BindingId>,
        structural: bool,
        chained: bool,
    },
    IgnoreReturn,
    RoutineCall { routine: Option<BindingId> },
    Select(SelectScope),
    /// Buffers the values of the select-list element being processed.
    SelectList { pending: Vec<BindingId> },
    /// JOIN, WHERE, GROUP BY and ORDER BY: sources pass, values stop here.
    EffectClause,
}

impl Frame {
    pub fn root(external: HashMap<String, BindingId>) -> Self {
        Frame::Root {
            catalog: Catalog::new(),
            external,
        }
    }

    pub fn lexical(owner: Option<BindingId>) -> Self {
        Frame::Lexical {
            catalog: Catalog::new(),
            owner,
        }
    }

    pub fn assignment(target: Option<BindingId>) -> Self {
        Frame::Assignment { target }
    }

    pub fn multiple_assignment(targets: Vec<BindingId>) -> Self {
        Frame::MultipleAssignment {
            targets,
            received: 0,
        }
    }

    pub fn wrapper(binding: BindingId) -> Self {
        Frame::Wrapper {
            binding,
            structural: false,
        }
    }

    pub fn structural_wrapper(binding: BindingId) -> Self {
        Frame::Wrapper {
            binding,
            structural: true,
        }
    }

    pub fn children(owner: BindingId, structural: bool) -> Self {
        Frame::Children {
            owner: Some(owner),
            structural,
            chained: false,
        }
    }

    pub fn chain() -> Self {
        Frame::Children {
            owner: None,
            structural: true,
            chained: true,
        }
    }

    pub fn select() -> Self {
        Frame::Select(SelectScope::default())
    }

    pub fn select_list() -> Self {
        Frame::SelectList {
            pending: Vec::new(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Frame::Root { .. } => "root",
            Frame::Lexical { .. } => "lexical",
            Frame::Assignment { .. } => "assignment",
            Frame::MultipleAssignment { .. } => "multiple-assignment",
            Frame::Wrapper { .. } => "wrapper",
            Frame::Children { .. } => "children",
            Frame::IgnoreReturn => "ignore-return",
            Frame::RoutineCall { .. } => "routine-call",
            Frame::Select(_) => "select",
            Frame::SelectList { .. } => "select-list",
            Frame::EffectClause => "effect-clause",
        }
    }

    /// Look `name` up at this level only.
    pub fn resolve_local(
        &self,
        graph: &BindingGraph,
        name: &str,
        filter: &dyn Fn(BindingKind) -> bool,
    ) -> Option<BindingId> {
        match self {
            Frame::Root { catalog, .. } | Frame::Lexical { catalog, .. } => {
                catalog.lookup(graph, name, filter)
            }
            Frame::Select(scope) => scope.resolve_local(graph, name, filter),
            _ => None,
        }
    }

    /// Place `id` at this level, or `None` to hand it to the enclosing frame.
    pub fn declare(&mut self, graph: &mut BindingGraph, id: BindingId) -> Option<BindingId> {
        let kind = graph.get(id).kind;
        match self {
            Frame::Root { catalog, .. } => Some(catalog.add(graph, id)),
            Frame::Lexical { .. } | Frame::Select(_) if kind.is_global() => None,
            Frame::Lexical { catalog, owner } => {
                catalog.add(graph, id);
                if let Some(owner) = *owner {
                    if kind.is_member() {
                        graph.add_child(owner, id);
                    }
                }
                Some(id)
            }
            Frame::Select(scope) => Some(scope.catalog.add(graph, id)),
            _ => None,
        }
    }

    /// Interpret a binding produced by the subtree this frame encloses.
    pub fn receive(&mut self, graph: &mut BindingGraph, id: BindingId) -> Result<Flow> {
        let kind = graph.get(id).kind;
        match self {
            Frame::Root { .. } => Ok(Flow::Consumed),
            Frame::Lexical { owner, .. } => match kind {
                // `coll.delete` is a collection method, not data
                BindingKind::Field if graph.get(id).name == "delete" => Ok(Flow::Consumed),
                BindingKind::Call => Ok(Flow::Consumed),
                BindingKind::Return => match owner {
                    Some(owner) => {
                        graph.add_output(id, *owner);
                        Ok(Flow::Consumed)
                    }
                    None => Ok(Flow::Forward(id)),
                },
                _ => Ok(Flow::Forward(id)),
            },
            Frame::Assignment { target } => {
                match *target {
                    None => *target = Some(id),
                    Some(t) if t != id => {
                        graph.add_output(id, t);
                    }
                    Some(_) => {}
                }
                Ok(Flow::Consumed)
            }
            Frame::MultipleAssignment { targets, received } => {
                let Some(&target) = targets.get(*received) else {
                    return Err(Error::pairing(format!(
                        "more values than the {} INTO targets",
                        targets.len()
                    )));
                };
                graph.add_output(id, target);
                *received += 1;
                Ok(Flow::Consumed)
            }
            Frame::Wrapper { binding, structural } => {
                if *structural {
                    graph.add_child(*binding, id);
                } else {
                    graph.add_output(id, *binding);
                }
                Ok(Flow::Consumed)
            }
            Frame::Children {
                owner,
                structural,
                chained,
            } => {
                match *owner {
                    None => *owner = Some(id),
                    Some(current) if *chained => {
                        if current != id {
                            graph.add_child(current, id);
                        }
                        *owner = Some(id);
                    }
                    Some(current) if *structural => {
                        graph.add_child(current, id);
                    }
                    Some(current) => {
                        let name = graph.get(id).name.clone();
                        let member = graph.child_or_insert(current, &name, BindingKind::Field);
                        graph.add_output(id, member);
                    }
                }
                Ok(Flow::Consumed)
            }
            Frame::IgnoreReturn => Ok(Flow::Consumed),
            Frame::RoutineCall { routine } => match (kind, *routine) {
                (BindingKind::Argument, Some(routine)) => {
                    let target = matching_parameter(graph, routine, id).unwrap_or(routine);
                    graph.add_output(id, target);
                    // The argument's values feed the parameter too
                    let values = graph.get(id).children.clone();
                    for value in values {
                        graph.add_output(value, target);
                    }
                    Ok(Flow::Consumed)
                }
                (BindingKind::Argument, None) => Ok(Flow::Consumed),
                _ => Ok(Flow::Forward(id)),
            },
            Frame::Select(scope) => match kind {
                BindingKind::Relation | BindingKind::Structure => {
                    if !scope.sources.iter().any(|s| s.relation == id) {
                        scope.sources.push(Source {
                            relation: id,
                            alias: None,
                        });
                    }
                    Ok(Flow::Consumed)
                }
                _ => Ok(Flow::Forward(id)),
            },
            Frame::SelectList { pending } => {
                pending.push(id);
                Ok(Flow::Consumed)
            }
            Frame::EffectClause => match kind {
                BindingKind::Relation | BindingKind::Structure => Ok(Flow::Forward(id)),
                _ => Ok(Flow::Consumed),
            },
        }
    }

    /// Close the frame. Returns the bindings it reports to the enclosing
    /// frame.
    pub fn finish(self, graph: &BindingGraph) -> Result<Vec<BindingId>> {
        match self {
            Frame::MultipleAssignment { targets, received } if received != targets.len() => {
                Err(Error::pairing(format!(
                    "{} values for {} INTO targets",
                    received,
                    targets.len()
                )))
            }
            Frame::Wrapper { binding, .. } if graph.get(binding).kind.is_signal() => {
                Ok(vec![binding])
            }
            Frame::Children {
                owner: Some(head),
                chained: true,
                ..
            } => Ok(vec![head]),
            Frame::SelectList { pending } => Ok(pending),
            _ => Ok(Vec::new()),
        }
    }
}

/// Parameter of `routine` an argument binds to: by name for named
/// arguments, by position otherwise.
fn matching_parameter(
    graph: &BindingGraph,
    routine: BindingId,
    argument: BindingId,
) -> Option<BindingId> {
    let argument: &Binding = graph.get(argument);
    let mut parameters = graph
        .get(routine)
        .children
        .iter()
        .copied()
        .filter(|&c| graph.get(c).kind == BindingKind::Parameter);
    match argument.position {
        Some(position) => parameters.find(|&p| graph.get(p).position == Some(position)),
        None => parameters.find(|&p| graph.get(p).name == argument.name),
    }
}
