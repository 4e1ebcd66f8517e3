//! Dialects - tag vocabularies over one semantic model
//!
//! Both supported grammars describe the same PL/SQL constructs with
//! different node tags. A [`Dialect`] maps tags to the shared [`Rule`]s and
//! names the sub-tags those rules navigate with ([`Vocabulary`]). The
//! analyzer itself never mentions a tag.

pub mod plsql;
pub mod pmd;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Semantic rule a node tag is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Do not descend (package specifications, forward declarations)
    Skip,
    Package,
    Routine,
    Variable,
    Cursor,
    /// Procedure call statement, produces a CALL binding
    CallStatement,
    /// Function call expression, produces the routine
    FunctionCall,
    /// Possibly dotted name in an expression
    Identifier,
    /// Name that must already be declared (cursor names)
    Reference,
    /// Primary expression with member-access suffixes
    FieldChain,
    /// One `.member` suffix of a field chain
    FieldSuffix,
    Return,
    /// Assignment-like statement with structural target (assignment, OPEN)
    Assignment,
    Fetch,
    /// Condition plus branches
    Conditional,
    /// Loop, with or without a record variable
    Loop,
    Select,
    With,
    SelectList,
    Insert,
    TableName,
    /// Clauses whose values filter or order rows (JOIN, WHERE, GROUP BY,
    /// HAVING, ORDER BY) and are never selected
    Effect,
    /// Set operator, between two arms or wrapping the arm it introduces
    SetOperation,
}

/// Sub-tags the rules navigate with.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Holder of a declared name (`None`: the name part is searched directly)
    pub name: Option<&'static str>,
    /// Single name segment
    pub name_part: &'static str,
    pub package_name: &'static str,
    /// Routine children that are not part of the routine body
    pub routine_header: &'static [&'static str],
    /// Container of formal parameters, searched below the declaration
    pub parameter_list: Option<&'static str>,
    pub parameter: &'static str,
    pub cursor_parameter: &'static str,
    pub default_value: &'static str,
    pub cursor_query: &'static str,
    pub call_name: &'static str,
    /// Child path from a call to its argument list
    pub arguments: &'static [&'static str],
    pub argument: &'static str,
    /// Name of a named argument (`p => value`)
    pub argument_name: &'static str,
    pub fetch_cursor: &'static str,
    pub fetch_target: &'static str,
    /// Loop child holding record and source (`None`: the loop node itself)
    pub loop_header: Option<&'static str>,
    pub with_entry: Option<&'static str>,
    pub with_name: &'static str,
    pub from_clause: &'static str,
    pub with_clause: &'static str,
    pub into_clause: &'static str,
    pub into_variable: &'static str,
    /// Wrapper of one select-list element (`None`: alias follows its expression)
    pub select_element: Option<&'static str>,
    pub column_alias: &'static str,
    /// Parent a table name must have to be a FROM source
    pub table_reference: &'static str,
    pub table_alias: &'static str,
    /// Ancestor of a table name holding its alias
    pub alias_scope: &'static str,
    pub insert_into: &'static str,
    pub insert_table: &'static str,
    pub insert_column: &'static str,
    pub values: &'static str,
    pub values_path: &'static [&'static str],
    pub value: &'static str,
    pub insert_query: &'static str,
    /// Member name inside a field-chain suffix
    pub suffix_member: &'static str,
    /// Siblings that qualify an identifier (`schema.table.column`)
    pub qualifiers: &'static [&'static str],
}

/// A grammar dialect: rule table plus vocabulary.
#[derive(Debug, Clone)]
pub struct Dialect {
    pub kind: DialectKind,
    rules: HashMap<&'static str, Rule>,
    pub vocabulary: Vocabulary,
}

impl Dialect {
    pub fn new(kind: DialectKind, rules: &[(&'static str, Rule)], vocabulary: Vocabulary) -> Self {
        Self {
            kind,
            rules: rules.iter().copied().collect(),
            vocabulary,
        }
    }

    pub fn of(kind: DialectKind) -> Self {
        match kind {
            DialectKind::Plsql => plsql::dialect(),
            DialectKind::Pmd => pmd::dialect(),
        }
    }

    /// Rule bound to `tag`; `None` means "descend into the children".
    pub fn rule(&self, tag: &str) -> Option<Rule> {
        self.rules.get(tag).copied()
    }

    /// Tags bound to `rule`, sorted.
    pub fn tags_for(&self, rule: Rule) -> Vec<&'static str> {
        let mut tags: Vec<_> = self
            .rules
            .iter()
            .filter(|(_, r)| **r == rule)
            .map(|(tag, _)| *tag)
            .collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// snake_case tags of the ANTLR PL/SQL grammar
    #[default]
    Plsql,
    /// CamelCase tags of the PMD PL/SQL grammar
    Pmd,
}

impl DialectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Plsql => "plsql",
            DialectKind::Pmd => "pmd",
        }
    }
}

impl FromStr for DialectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plsql" | "antlr" => Ok(DialectKind::Plsql),
            "pmd" => Ok(DialectKind::Pmd),
            _ => Err(Error::UnknownDialect(s.to_string())),
        }
    }
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE_RULES: &[Rule] = &[
        Rule::Package,
        Rule::Routine,
        Rule::Variable,
        Rule::Cursor,
        Rule::Identifier,
        Rule::Return,
        Rule::Assignment,
        Rule::Fetch,
        Rule::Conditional,
        Rule::Loop,
        Rule::Select,
        Rule::With,
        Rule::SelectList,
        Rule::Insert,
        Rule::TableName,
        Rule::Effect,
    ];

    #[test]
    fn test_dialect_kind_parse() {
        assert_eq!("PMD".parse::<DialectKind>().unwrap(), DialectKind::Pmd);
        assert_eq!("antlr".parse::<DialectKind>().unwrap(), DialectKind::Plsql);
        assert!(matches!("tsql".parse::<DialectKind>(), Err(Error::UnknownDialect(_))));
    }

    #[test]
    fn test_both_dialects_cover_core_rules() {
        for kind in [DialectKind::Plsql, DialectKind::Pmd] {
            let dialect = Dialect::of(kind);
            assert_eq!(dialect.kind, kind);
            for rule in CORE_RULES {
                assert!(!dialect.tags_for(*rule).is_empty(), "{kind} lacks {rule:?}");
            }
        }
    }

    #[test]
    fn test_unknown_tag_has_no_rule() {
        let dialect = Dialect::of(DialectKind::Plsql);
        assert_eq!(dialect.rule("seq_of_statements"), None);
        assert_eq!(dialect.rule("procedure_body"), Some(Rule::Routine));
    }
}
