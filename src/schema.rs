//! External schema adapter
//!
//! Read-only relation metadata loaded once before any traversal. Each
//! traversal copies the relations it may need into its own binding arena, so
//! one `Schema` can be shared by analyses running in parallel.
//!
//! Document format:
//!
//! ```json
//! { "tables": [ { "name": "orders", "type": "table",
//!                 "columns": [ { "name": "id" }, { "name": "total" } ] } ] }
//! ```

use crate::binding::{fold, Binding, BindingGraph, BindingId, BindingKind};
use crate::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    #[default]
    Table,
    View,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Table => "TABLE",
            RelationType::View => "VIEW",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Relation {
    pub name: String,
    #[serde(default, rename = "type")]
    pub relation_type: RelationType,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Relation {
    /// Copy this relation and its columns into `graph`.
    pub fn instantiate(&self, graph: &mut BindingGraph) -> BindingId {
        let mut binding =
            Binding::new(&self.name, BindingKind::Relation).with_type(self.relation_type.as_str());
        if let Some(comment) = &self.comment {
            binding = binding.with_comment(comment.clone());
        }
        let relation = graph.add(binding);
        for column in &self.columns {
            let mut child = Binding::new(&column.name, BindingKind::Column);
            if let Some(comment) = &column.comment {
                child = child.with_comment(comment.clone());
            }
            let child = graph.add(child);
            graph.add_child(relation, child);
        }
        relation
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    tables: Vec<Relation>,
}

/// Name -> relation lookup, case-insensitive.
#[derive(Debug, Default, Clone)]
pub struct Schema {
    relations: HashMap<String, Relation>,
}

impl Schema {
    /// A schema that resolves nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_relations(relations: impl IntoIterator<Item = Relation>) -> Self {
        let relations = relations
            .into_iter()
            .map(|mut r| {
                r.name = fold(&r.name);
                for column in &mut r.columns {
                    column.name = fold(&column.name);
                }
                (r.name.clone(), r)
            })
            .collect();
        Self { relations }
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(contents)?;
        Ok(Self::from_relations(document.tables))
    }

    /// Load a schema document. A missing file is not an error: `None` tells
    /// the caller to continue without metadata.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(Some(Self::from_json(&contents)?))
    }

    pub fn resolve(&self, name: &str) -> Option<&Relation> {
        self.relations.get(&fold(name))
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOCUMENT: &str = r#"{
        "tables": [
            { "name": "ORDERS", "comment": "sales orders",
              "columns": [ { "name": "Id" }, { "name": "TOTAL", "comment": "gross" } ] },
            { "name": "v_open", "type": "view", "columns": [] }
        ]
    }"#;

    #[test]
    fn test_resolve_is_case_insensitive() {
        let schema = Schema::from_json(DOCUMENT).unwrap();
        let orders = schema.resolve("Orders").unwrap();
        assert_eq!(orders.name, "orders");
        assert_eq!(orders.columns[1].name, "total");
        assert_eq!(schema.resolve("V_OPEN").unwrap().relation_type, RelationType::View);
        assert!(schema.resolve("missing").is_none());
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn test_instantiate_builds_relation_with_columns() {
        let schema = Schema::from_json(DOCUMENT).unwrap();
        let mut graph = BindingGraph::new();
        let id = schema.resolve("orders").unwrap().instantiate(&mut graph);

        let relation = graph.get(id);
        assert_eq!(relation.kind, BindingKind::Relation);
        assert_eq!(relation.types, vec!["TABLE".to_string()]);
        assert_eq!(relation.comment.as_deref(), Some("sales orders"));
        assert_eq!(relation.children.len(), 2);
        let total = graph.child_named(id, "TOTAL", Some(BindingKind::Column)).unwrap();
        assert_eq!(graph.get(total).comment.as_deref(), Some("gross"));
    }

    #[test]
    fn test_load_missing_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Schema::load(&dir.path().join("schema.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();
        let schema = Schema::load(file.path()).unwrap().unwrap();
        assert!(schema.resolve("orders").is_some());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(Schema::from_json("{ \"tables\": 3 }").is_err());
    }
}
