//! Semantic dispatcher - the tree walk that builds the binding graph
//!
//! One [`Analyzer`] runs one traversal: it owns the binding arena and the
//! scope stack, looks up the rule of every node in the dialect table and
//! applies it. Tags without a rule are descended into, so the walk covers
//! the whole tree whatever the grammar produces.

mod rules;


use crate::analysis::Analysis;
use crate::binding::{Binding, BindingGraph, BindingId};
use crate::dialect::{Dialect, Vocabulary};
use crate::name::QualifiedName;
use crate::schema::Schema;
use crate::scope::{Frame, Stack};
use crate::tree::{Node, SyntaxTree};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Analyze one source unit.
pub fn analyze(tree: &SyntaxTree, dialect: &Dialect, schema: &Schema) -> Result<Analysis> {
    Analyzer::new(dialect, schema).analyze(tree.root())
}

pub struct Analyzer<'d> {
    dialect: &'d Dialect,
    graph: BindingGraph,
    stack: Stack,
    /// Routines declared ahead of their body, keyed by node index
    hoisted: HashMap<usize, BindingId>,
    /// INTO clauses already paired by an enclosing select
    claimed_into: HashSet<usize>,
}

impl<'d> Analyzer<'d> {
    pub fn new(dialect: &'d Dialect, schema: &Schema) -> Self {
        let mut graph = BindingGraph::new();
        let stack = Stack::new(&mut graph, schema);
        Self {
            dialect,
            graph,
            stack,
            hoisted: HashMap::new(),
            claimed_into: HashSet::new(),
        }
    }

    /// Walk the tree below `root` and hand over the finished graph.
    pub fn analyze(mut self, root: Node<'_>) -> Result<Analysis> {
        let start = Instant::now();
        self.process(root)?;
        let roots = self.stack.globals();
        tracing::debug!(
            dialect = %self.dialect.kind,
            bindings = self.graph.len(),
            roots = roots.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "analysis complete"
        );
        Ok(Analysis::new(self.graph, roots))
    }

    /// Apply the rule registered for `node`'s tag. The empty node is a no-op.
    pub fn process(&mut self, node: Node<'_>) -> Result<()> {
        if node.is_empty() {
            return Ok(());
        }
        let result = match self.dialect.rule(node.tag()) {
            Some(rule) => {
                tracing::trace!(tag = node.tag(), ?rule, depth = self.stack.height(), "apply");
                self.apply(rule, node)
            }
            None => self.process_children(node),
        };
        result.map_err(|e| e.at(node.location()))
    }

    fn process_children(&mut self, node: Node<'_>) -> Result<()> {
        self.process_all(&node.children())
    }

    fn process_all(&mut self, nodes: &[Node<'_>]) -> Result<()> {
        for node in nodes {
            self.process(*node)?;
        }
        Ok(())
    }

    /// Run `body` with `frame` pushed. The frame is popped whatever `body`
    /// returns; a failing body leaves the frames it pushed unfinished.
    fn execute(&mut self, frame: Frame, body: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let height = self.stack.push(frame);
        let result = body(self);
        let unwound = self.stack.unwind(&mut self.graph, height, result.is_ok());
        result.and(unwound)
    }

    fn vocab(&self) -> &'d Vocabulary {
        &self.dialect.vocabulary
    }

    /// Route a produced binding to the top frame.
    fn produce(&mut self, id: BindingId) -> Result<()> {
        self.stack.receive(&mut self.graph, id)
    }

    /// Allocate `binding` and declare it at the innermost accepting frame.
    fn declare(&mut self, binding: Binding) -> BindingId {
        let id = self.graph.add(binding);
        self.stack.declare(&mut self.graph, id)
    }

    /// Name declared by a declaration node.
    fn declared_name(&self, node: Node<'_>) -> Result<String> {
        let vocab = self.vocab();
        let part = match vocab.name {
            Some(holder) => node.find_first(holder).find_last(vocab.name_part),
            None => node.find_first(vocab.name_part),
        };
        if part.is_empty() {
            return Err(Error::structure(format!("<{}> declares no name", node.tag())));
        }
        Ok(part.text())
    }

    /// Dotted name spelled by the name segments below `node`.
    fn name_of(&self, node: Node<'_>) -> String {
        let part = self.vocab().name_part;
        if node.is(part) {
            return node.text();
        }
        let parts = node.find(part);
        if parts.is_empty() {
            return node.text();
        }
        parts.iter().map(Node::text).collect::<Vec<_>>().join(".")
    }

    /// Resolve a name that must already be declared in the scope chain.
    fn resolve_existing(&self, node: Node<'_>) -> Result<BindingId> {
        if node.is_empty() {
            return Err(Error::structure("missing name reference"));
        }
        let name = QualifiedName::parse(&self.name_of(node)).local_only();
        self.stack
            .resolve(&self.graph, &name)
            .ok_or_else(|| Error::unresolved(&name).at(node.location()))
    }
}

/// Last segment of a dotted name.
fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
