//! Rule implementations
//!
//! Rules only talk to the tree through the dialect vocabulary, so one
//! implementation serves both grammars.

use super::{last_segment, Analyzer};
use crate::binding::{Binding, BindingId, BindingKind};
use crate::dialect::Rule;
use crate::name::QualifiedName;
use crate::scope::{Frame, SelectScope};
use crate::tree::Node;
use crate::{Error, Result};

impl<'d> Analyzer<'d> {
    pub(super) fn apply(&mut self, rule: Rule, node: Node<'_>) -> Result<()> {
        match rule {
            Rule::Skip => Ok(()),
            Rule::Package => self.package(node),
            Rule::Routine => self.routine(node),
            Rule::Variable => self.variable(node),
            Rule::Cursor => self.cursor(node),
            Rule::CallStatement => self.call(node, true),
            Rule::FunctionCall => self.call(node, false),
            Rule::Identifier => self.identifier(node),
            Rule::Reference => {
                let id = self.resolve_existing(node)?;
                self.produce(id)
            }
            Rule::FieldChain => self.execute(Frame::chain(), |a| a.process_children(node)),
            Rule::FieldSuffix => self.field_suffix(node),
            Rule::Return => {
                let ret = self.graph.add(Binding::new("[return]", BindingKind::Return));
                self.execute(Frame::wrapper(ret), |a| a.process_children(node))
            }
            Rule::Assignment => self.execute(Frame::assignment(None), |a| a.process_children(node)),
            Rule::Fetch => self.fetch(node),
            Rule::Conditional => self.conditional(node),
            Rule::Loop => self.loop_statement(node),
            Rule::Select => self.select(node),
            Rule::With => self.with_clause(node),
            Rule::SelectList => self.select_list(node),
            Rule::Insert => self.insert(node),
            Rule::TableName => self.table_name(node),
            Rule::Effect => self.execute(Frame::EffectClause, |a| a.process_children(node)),
            Rule::SetOperation => self.set_operation(node),
        }
    }

    // Declarations

    fn package(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        let name = self.declared_name(node)?;
        tracing::debug!(package = %name, "package body");
        let package = self.declare(Binding::new(&name, BindingKind::Package));
        self.execute(Frame::lexical(Some(package)), |a| {
            a.hoist_routines(node)?;
            let header = node.child(vocab.package_name);
            let body = if header.is_present() {
                header.next_all()
            } else {
                node.children()
            };
            for child in body.into_iter().filter(|c| !c.is(vocab.package_name)) {
                a.process(child)?;
            }
            Ok(())
        })
    }

    /// Declare the routines of a package body before any body runs, so
    /// calls may precede the callee's definition.
    fn hoist_routines(&mut self, package: Node<'_>) -> Result<()> {
        let tags = self.dialect.tags_for(Rule::Routine);
        let mut routines: Vec<Node<'_>> = tags.iter().flat_map(|tag| package.find(tag)).collect();
        routines.retain(|routine| !nested_in_routine(*routine, package, &tags));
        routines.sort_by_key(|routine| routine.index());
        for routine in routines {
            let name = self.declared_name(routine)?;
            let id = self.declare(Binding::new(&name, BindingKind::Routine));
            self.parameters(id, routine, self.vocab().parameter)?;
            if let Some(index) = routine.index() {
                self.hoisted.insert(index, id);
            }
        }
        Ok(())
    }

    fn routine(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        let routine = match node.index().and_then(|index| self.hoisted.remove(&index)) {
            Some(id) => id,
            None => {
                let name = self.declared_name(node)?;
                self.declare(Binding::new(&name, BindingKind::Routine))
            }
        };
        let parameters = self.parameters(routine, node, vocab.parameter)?;
        self.execute(Frame::lexical(Some(routine)), |a| {
            for parameter in parameters {
                a.stack.declare(&mut a.graph, parameter);
            }
            for child in node.children() {
                if !vocab.routine_header.iter().any(|tag| child.is(tag)) {
                    a.process(child)?;
                }
            }
            Ok(())
        })
    }

    /// Formal parameters of `owner`, created with their positions the
    /// first time the declaration is seen.
    fn parameters(&mut self, owner: BindingId, node: Node<'_>, tag: &str) -> Result<Vec<BindingId>> {
        let existing: Vec<BindingId> = self
            .graph
            .get(owner)
            .children
            .iter()
            .copied()
            .filter(|&c| self.graph.get(c).kind == BindingKind::Parameter)
            .collect();
        if !existing.is_empty() {
            return Ok(existing);
        }

        let declared = match self.vocab().parameter_list {
            Some(list) => {
                let direct = node.child(list);
                let holder = if direct.is_present() {
                    direct
                } else {
                    node.children()
                        .into_iter()
                        .map(|child| child.child(list))
                        .find(Node::is_present)
                        .unwrap_or(direct)
                };
                holder.children_tagged(tag)
            }
            None => node.children_tagged(tag),
        };
        let mut parameters = Vec::with_capacity(declared.len());
        for (position, parameter) in declared.into_iter().enumerate() {
            let name = self.declared_name(parameter)?;
            let id = self
                .graph
                .add(Binding::new(&name, BindingKind::Parameter).with_position(position));
            parameters.push(self.graph.add_child(owner, id));
        }
        Ok(parameters)
    }

    fn variable(&mut self, node: Node<'_>) -> Result<()> {
        let name = self.declared_name(node)?;
        let variable = self.declare(Binding::new(&name, BindingKind::Variable));
        let default = node.child(self.vocab().default_value);
        if default.is_empty() {
            return Ok(());
        }
        self.execute(Frame::assignment(Some(variable)), |a| a.process_children(default))
    }

    fn cursor(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        let name = self.declared_name(node)?;
        let cursor = self.declare(Binding::new(&name, BindingKind::Cursor));
        let parameters = self.parameters(cursor, node, vocab.cursor_parameter)?;
        let query = node.child(vocab.cursor_query);
        self.execute(Frame::lexical(Some(cursor)), |a| {
            for parameter in parameters {
                a.stack.declare(&mut a.graph, parameter);
            }
            a.execute(Frame::wrapper(cursor), |a| a.process(query))
        })
    }

    // Calls

    fn call(&mut self, node: Node<'_>, statement: bool) -> Result<()> {
        let vocab = self.vocab();
        let parts: Vec<String> = node
            .child(vocab.call_name)
            .find(vocab.name_part)
            .iter()
            .map(Node::text)
            .collect();
        let name = match parts.as_slice() {
            [] => return Err(Error::structure("call without a routine name")),
            [name] => QualifiedName::new(name),
            [.., prefix, name] => QualifiedName::new(name).with_prefix(prefix),
        }
        .of_kind(BindingKind::Routine);

        let routine = self.stack.resolve(&self.graph, &name);
        let routine = match (routine, statement) {
            (Some(routine), _) => routine,
            (None, true) => return Err(Error::unresolved(&name)),
            (None, false) => {
                // Built-in or unknown function: arguments pass through
                tracing::debug!(function = %name, "unresolved function call");
                return self.process_all(&self.arguments_of(node));
            }
        };

        self.execute(Frame::RoutineCall { routine: Some(routine) }, |a| {
            let call = statement
                .then(|| a.graph.add(Binding::new(name.to_string(), BindingKind::Call)));
            a.produce(call.unwrap_or(routine))?;
            a.arguments(node, call)
        })
    }

    fn arguments_of<'t>(&self, call: Node<'t>) -> Vec<Node<'t>> {
        let vocab = self.vocab();
        call.path(vocab.arguments).children_tagged(vocab.argument)
    }

    /// Each argument is collected into its own ARGUMENT binding, keyed by
    /// the parameter name when passed by name and by position otherwise.
    fn arguments(&mut self, node: Node<'_>, call: Option<BindingId>) -> Result<()> {
        let vocab = self.vocab();
        for (position, argument) in self.arguments_of(node).into_iter().enumerate() {
            let named = argument.child(vocab.argument_name);
            let binding = if named.is_present() {
                Binding::new(self.name_of(named), BindingKind::Argument)
            } else {
                Binding::new(format!("[{}]", position), BindingKind::Argument).with_position(position)
            };
            let id = self.graph.add(binding);
            if let Some(call) = call {
                self.graph.add_child(call, id);
            }
            self.execute(Frame::structural_wrapper(id), |a| {
                for child in argument.children() {
                    if child != named {
                        a.process(child)?;
                    }
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    // Expressions

    fn identifier(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        let qualifies = |n: Node<'_>| vocab.qualifiers.iter().any(|q| n.is(q));
        // Only the last segment of a dotted name acts
        if qualifies(node.next()) {
            return Ok(());
        }
        let mut prefix = Vec::new();
        let mut previous = node.prev();
        while qualifies(previous) {
            prefix.push(self.name_of(previous));
            previous = previous.prev();
        }
        prefix.reverse();
        let name = node.text();

        let id = match prefix.split_first() {
            None => self.resolve_or_synthesize(&name),
            Some((head, rest)) => {
                let mut current = match self.stack.resolve(&self.graph, &QualifiedName::new(head)) {
                    Some(id) => id,
                    None => {
                        let placeholder = self.graph.add(Binding::new(head, BindingKind::Structure));
                        self.stack.declare_global(&mut self.graph, placeholder)
                    }
                };
                for part in rest.iter().chain(std::iter::once(&name)) {
                    current = self.graph.child_or_insert(current, part, BindingKind::Field);
                }
                current
            }
        };
        self.produce(id)
    }

    /// Resolve an unqualified name; unknown names become fields of the
    /// only source of the enclosing select, or fields of the current scope.
    fn resolve_or_synthesize(&mut self, name: &str) -> BindingId {
        if let Some(id) = self.stack.resolve(&self.graph, &QualifiedName::new(name)) {
            return id;
        }
        if let Some(source) = self.stack.nearest_select().and_then(SelectScope::single_source) {
            return self.graph.child_or_insert(source, name, BindingKind::Field);
        }
        self.declare(Binding::new(name, BindingKind::Field))
    }

    fn field_suffix(&mut self, node: Node<'_>) -> Result<()> {
        let member = node.child(self.vocab().suffix_member);
        if member.is_empty() {
            return self.process_children(node);
        }
        let name = self.name_of(member);
        let head = match self.stack.top() {
            Frame::Children {
                owner: Some(head),
                chained: true,
                ..
            } => Some(*head),
            _ => None,
        };
        let id = match head {
            Some(head) => self.graph.child_or_insert(head, &name, BindingKind::Field),
            None => self.graph.add(Binding::new(&name, BindingKind::Field)),
        };
        self.produce(id)
    }

    // Statements

    fn fetch(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        let cursor = self.resolve_existing(node.child(vocab.fetch_cursor))?;
        for target in node.find(vocab.fetch_target) {
            let target = self.resolve_existing(target)?;
            self.graph.add_output(cursor, target);
        }
        Ok(())
    }

    fn conditional(&mut self, node: Node<'_>) -> Result<()> {
        let condition = node.nth_child(0);
        self.execute(Frame::IgnoreReturn, |a| a.process(condition))?;
        self.process_all(&condition.next_all())
    }

    fn loop_statement(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        self.execute(Frame::lexical(None), |a| {
            let (record, sources, body) = match vocab.loop_header {
                Some(tag) => {
                    let header = node.child(tag);
                    if header.is_empty() {
                        return a.process_children(node);
                    }
                    let record = header.nth_child(0);
                    (record, record.next_all(), header.next_all())
                }
                None => {
                    let source = node.nth_child(1);
                    (node.nth_child(0), vec![source], source.next_all())
                }
            };
            if record.is_empty() {
                return Err(Error::structure("loop without a record variable"));
            }
            let name = a.name_of(record);
            let record = a.declare(Binding::new(&name, BindingKind::Structure));
            a.execute(Frame::assignment(Some(record)), |a| a.process_all(&sources))?;
            a.process_all(&body)
        })
    }

    // Queries

    fn select(&mut self, node: Node<'_>) -> Result<()> {
        let Some(into) = self.claim_into(node) else {
            return self.execute(Frame::select(), |a| a.select_body(node));
        };
        let targets = into
            .children_tagged(self.vocab().into_variable)
            .into_iter()
            .map(|variable| self.resolve_existing(variable))
            .collect::<Result<Vec<_>>>()?;
        self.execute(Frame::multiple_assignment(targets), |a| {
            a.execute(Frame::select(), |a| a.select_body(node))
        })
    }

    /// INTO clause paired at `node`. The outermost select claims the INTO of
    /// its first query block, so every arm of a set operation below it pairs
    /// with the same targets.
    fn claim_into<'t>(&mut self, node: Node<'t>) -> Option<Node<'t>> {
        let tag = self.vocab().into_clause;
        let direct = node.child(tag);
        let into = if direct.is_present() {
            direct
        } else {
            node.find_first(tag)
        };
        let index = into.index()?;
        self.claimed_into.insert(index).then_some(into)
    }

    /// Named subqueries first, then the FROM clause, so that columns in
    /// the select list resolve against known sources.
    fn select_body(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        self.process(node.child(vocab.with_clause))?;
        self.process(node.child(vocab.from_clause))?;
        for child in node.children() {
            if child.is(vocab.with_clause) || child.is(vocab.from_clause) || child.is(vocab.into_clause) {
                continue;
            }
            self.process(child)?;
        }
        Ok(())
    }

    fn with_clause(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        let entries: Vec<(Node<'_>, Vec<Node<'_>>)> = match vocab.with_entry {
            Some(tag) => node
                .children_tagged(tag)
                .into_iter()
                .map(|entry| {
                    let name = entry.child(vocab.with_name);
                    let body = entry.children().into_iter().filter(|c| *c != name).collect();
                    (name, body)
                })
                .collect(),
            None => node
                .children_tagged(vocab.with_name)
                .into_iter()
                .map(|name| (name, vec![name.next()]))
                .collect(),
        };
        for (name, body) in entries {
            if name.is_empty() {
                return Err(Error::structure("named subquery without a name"));
            }
            let name = self.name_of(name);
            let structure = self.graph.add(Binding::new(&name, BindingKind::Structure));
            self.execute(Frame::children(structure, false), |a| a.process_all(&body))?;
            self.stack.declare(&mut self.graph, structure);
        }
        Ok(())
    }

    fn select_list(&mut self, node: Node<'_>) -> Result<()> {
        let elements = self.select_elements(node);
        self.execute(Frame::select_list(), |a| {
            for (position, (expression, alias)) in elements.into_iter().enumerate() {
                if alias.is_present() {
                    let name = a.name_of(alias);
                    let alias = a.declare(Binding::new(&name, BindingKind::Alias));
                    a.produce(alias)?;
                    a.execute(Frame::assignment(Some(alias)), |a| a.process_all(&expression))?;
                } else {
                    a.process_all(&expression)?;
                }
                a.stack.flush_select_element(&mut a.graph, position)?;
            }
            Ok(())
        })
    }

    /// Expression nodes and alias of every element of a select list.
    fn select_elements<'t>(&self, list: Node<'t>) -> Vec<(Vec<Node<'t>>, Node<'t>)> {
        let vocab = self.vocab();
        match vocab.select_element {
            Some(tag) => list
                .children_tagged(tag)
                .into_iter()
                .map(|element| {
                    let alias = element.child(vocab.column_alias);
                    let expression = element
                        .children()
                        .into_iter()
                        .filter(|c| !c.is(vocab.column_alias))
                        .collect();
                    (expression, alias)
                })
                .collect(),
            None => list
                .children()
                .into_iter()
                .filter(|c| !c.is(vocab.column_alias))
                .map(|expression| (vec![expression], expression.next_tagged(vocab.column_alias)))
                .collect(),
        }
    }

    /// Number of values the first select list below `query` produces.
    fn select_arity(&self, query: Node<'_>) -> usize {
        self.dialect
            .tags_for(Rule::SelectList)
            .iter()
            .map(|tag| query.find_first(tag))
            .filter(|list| list.is_present())
            .min_by_key(|list| list.index())
            .map_or(0, |list| self.select_elements(list).len())
    }

    fn table_name(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        if !node.parent().is(vocab.table_reference) {
            return Ok(());
        }
        let full = self.name_of(node);
        let relation = self.table(last_segment(&full));
        self.produce(relation)?;

        let alias = node.ancestor(vocab.alias_scope).child(vocab.table_alias);
        if alias.is_present() {
            let alias = self.name_of(alias);
            if let Some(scope) = self.stack.nearest_select_mut() {
                if let Some(source) = scope.sources.iter_mut().rev().find(|s| s.relation == relation) {
                    source.alias = Some(alias);
                }
            }
        }
        Ok(())
    }

    /// Binding a table reference stands for: a named subquery or earlier
    /// placeholder, then the schema, then a new global placeholder.
    fn table(&mut self, name: &str) -> BindingId {
        let structure = QualifiedName::local(name).of_kind(BindingKind::Structure);
        if let Some(id) = self.stack.resolve(&self.graph, &structure) {
            return id;
        }
        if let Some(id) = self.stack.external(name) {
            return self.stack.declare_global(&mut self.graph, id);
        }
        let relation = QualifiedName::local(name).of_kind(BindingKind::Relation);
        if let Some(id) = self.stack.resolve(&self.graph, &relation) {
            return id;
        }
        tracing::debug!(table = name, "unknown table, placeholder structure");
        let placeholder = self.graph.add(Binding::new(name, BindingKind::Structure));
        self.stack.declare_global(&mut self.graph, placeholder)
    }

    fn set_operation(&mut self, node: Node<'_>) -> Result<()> {
        let parent = node.parent();
        let between_arms = self
            .dialect
            .tags_for(Rule::Select)
            .iter()
            .any(|tag| parent.is(tag));
        // An operator between the arms of one select closes the select of
        // the first arm at its first occurrence. An operator that wraps its
        // own arm sits under the statement's select.
        let enclosing = if between_arms {
            if node.prev_all_tagged(node.tag()).is_empty() {
                if !matches!(self.stack.top(), Frame::Select(_)) {
                    return Err(Error::structure("set operation outside a select"));
                }
                self.stack.pop(&mut self.graph)?;
            }
            0
        } else {
            1
        };
        // Every arm pairs with the INTO targets from the first one
        if let Some(Frame::MultipleAssignment { targets, received }) =
            self.stack.pending_assignment_mut(enclosing)
        {
            if *received != targets.len() {
                return Err(Error::pairing(format!(
                    "{} values for {} INTO targets",
                    received,
                    targets.len()
                )));
            }
            *received = 0;
        }
        self.process_children(node)
    }

    // Inserts

    fn insert(&mut self, node: Node<'_>) -> Result<()> {
        let vocab = self.vocab();
        let into = node.child(vocab.insert_into);
        let table_node = into.find_first(vocab.insert_table);
        if table_node.is_empty() {
            return Err(Error::structure("insert without a target table"));
        }
        let full = self.name_of(table_node);
        let table = self.insert_target(last_segment(&full));

        let values = node.child(vocab.values);
        let query = node.child(vocab.insert_query);
        let expressions = values
            .is_present()
            .then(|| values.path(vocab.values_path).children_tagged(vocab.value));

        let listed = into.find(vocab.insert_column);
        let mut columns: Vec<BindingId> = if listed.is_empty() {
            // No column list: every known column, in declaration order
            self.graph
                .get(table)
                .children
                .iter()
                .copied()
                .filter(|&c| self.graph.get(c).kind == BindingKind::Column)
                .collect()
        } else {
            let mut columns = Vec::with_capacity(listed.len());
            for column in listed.iter() {
                let full = self.name_of(*column);
                columns.push(self.graph.child_or_insert(table, last_segment(&full), BindingKind::Column));
            }
            columns
        };
        if listed.is_empty() && columns.is_empty() {
            // Nothing known about the target: one positional column per value
            let arity = match &expressions {
                Some(expressions) => expressions.len(),
                None => self.select_arity(query),
            };
            tracing::debug!(table = %full, arity, "insert into unknown columns");
            columns = (0..arity)
                .map(|position| {
                    self.graph
                        .child_or_insert(table, &format!("[{}]", position), BindingKind::Column)
                })
                .collect();
        }

        if let Some(expressions) = expressions {
            if expressions.len() != columns.len() {
                return Err(Error::pairing(format!(
                    "{} values for {} columns of {}",
                    expressions.len(),
                    columns.len(),
                    full
                )));
            }
            for (expression, column) in expressions.into_iter().zip(columns) {
                self.execute(Frame::assignment(Some(column)), |a| a.process(expression))?;
            }
            return Ok(());
        }

        if query.is_empty() {
            return Err(Error::structure("insert without values or query"));
        }
        self.execute(Frame::multiple_assignment(columns), |a| a.process(query))
    }

    fn insert_target(&mut self, name: &str) -> BindingId {
        if let Some(id) = self.stack.external(name) {
            return self.stack.declare_global(&mut self.graph, id);
        }
        for kind in [BindingKind::Relation, BindingKind::Structure] {
            let known = QualifiedName::local(name).of_kind(kind);
            if let Some(id) = self.stack.resolve(&self.graph, &known) {
                return id;
            }
        }
        let relation = self.graph.add(Binding::new(name, BindingKind::Relation));
        self.stack.declare_global(&mut self.graph, relation)
    }
}

/// Whether `node` sits inside another routine below `package`.
fn nested_in_routine(node: Node<'_>, package: Node<'_>, routine_tags: &[&str]) -> bool {
    let mut current = node.parent();
    while current.is_present() && current != package {
        if routine_tags.iter().any(|tag| current.is(tag)) {
            return true;
        }
        current = current.parent();
    }
    false
}
