use crate::analysis::Analysis;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Count")]
    pub count: String,
}

#[derive(Tabled)]
struct EdgeRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Target")]
    target: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, kind: &str, count: usize) {
        self.rows.push(TableRow {
            kind: kind.to_string(),
            count: count.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

/// Reachable bindings per kind, plus the lineage edge total.
pub fn kind_table(analysis: &Analysis) -> String {
    let mut builder = TableBuilder::new();
    for (kind, count) in analysis.count_by_kind() {
        builder.add_row(kind.as_str(), count);
    }
    builder.add_row("edges", analysis.edges().len());
    builder.build()
}

/// Every lineage edge as dotted paths; empty when there are none.
pub fn edge_table(analysis: &Analysis) -> String {
    let rows: Vec<EdgeRow> = analysis
        .edges()
        .into_iter()
        .map(|edge| EdgeRow {
            source: analysis.path_of(edge.source),
            target: analysis.path_of(edge.target),
        })
        .collect();
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, BindingGraph, BindingKind};

    fn sample() -> Analysis {
        let mut graph = BindingGraph::new();
        let t = graph.add(Binding::new("t", BindingKind::Relation));
        let col = graph.add(Binding::new("col", BindingKind::Column));
        graph.add_child(t, col);
        let x = graph.add(Binding::new("x", BindingKind::Variable));
        graph.add_output(col, x);
        Analysis::new(graph, vec![t, x])
    }

    #[test]
    fn test_kind_table_lists_counts() {
        let table = kind_table(&sample());
        assert!(table.contains("Kind"));
        assert!(table.contains("relation"));
        assert!(table.contains("variable"));
        assert!(table.contains("edges"));
    }

    #[test]
    fn test_edge_table_uses_paths() {
        let table = edge_table(&sample());
        assert!(table.contains("t.col"));
        assert!(table.contains("Target"));
        assert!(edge_table(&Analysis::new(BindingGraph::new(), vec![])).is_empty());
    }

    #[test]
    fn test_empty_builder() {
        assert!(TableBuilder::new().build().is_empty());
    }
}
