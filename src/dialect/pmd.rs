//! Tags of the PMD PL/SQL grammar (CamelCase node classes)

use super::{Dialect, DialectKind, Rule, Vocabulary};

const RULES: &[(&str, Rule)] = &[
    ("PackageSpecification", Rule::Skip),
    ("PackageBody", Rule::Package),
    ("ProgramUnit", Rule::Routine),
    ("VariableOrConstantDeclarator", Rule::Variable),
    ("CursorUnit", Rule::Cursor),
    ("FunctionCall", Rule::FunctionCall),
    ("Column", Rule::Identifier),
    ("QualifiedName", Rule::Reference),
    ("PrimaryExpression", Rule::FieldChain),
    ("PrimarySuffix", Rule::FieldSuffix),
    ("ReturnStatement", Rule::Return),
    ("Assignment", Rule::Assignment),
    ("OpenStatement", Rule::Assignment),
    ("FetchStatement", Rule::Fetch),
    ("IfStatement", Rule::Conditional),
    ("ElsifClause", Rule::Conditional),
    ("CaseWhenClause", Rule::Conditional),
    ("ForStatement", Rule::Loop),
    ("CursorForLoopStatement", Rule::Loop),
    ("SelectStatement", Rule::Select),
    ("SelectIntoStatement", Rule::Select),
    ("QueryBlock", Rule::Select),
    ("Subquery", Rule::Select),
    ("WithClause", Rule::With),
    ("SelectList", Rule::SelectList),
    ("SingleTableInsert", Rule::Insert),
    ("TableName", Rule::TableName),
    ("JoinClause", Rule::Effect),
    ("WhereClause", Rule::Effect),
    ("GroupByClause", Rule::Effect),
    ("OrderByClause", Rule::Effect),
    ("SubqueryOperation", Rule::SetOperation),
];

pub fn dialect() -> Dialect {
    Dialect::new(
        DialectKind::Pmd,
        RULES,
        Vocabulary {
            name: None,
            name_part: "ID",
            package_name: "ObjectNameDeclaration",
            routine_header: &["MethodDeclarator"],
            parameter_list: Some("FormalParameters"),
            parameter: "FormalParameter",
            cursor_parameter: "FormalParameter",
            default_value: "VariableOrConstantInitializer",
            cursor_query: "SelectStatement",
            call_name: "FunctionName",
            arguments: &["Arguments", "ArgumentList"],
            argument: "Argument",
            argument_name: "UnqualifiedID",
            fetch_cursor: "QualifiedName",
            fetch_target: "Column",
            loop_header: None,
            with_entry: None,
            with_name: "Name",
            from_clause: "FromClause",
            with_clause: "WithClause",
            into_clause: "IntoClause",
            into_variable: "VariableName",
            select_element: None,
            column_alias: "ColumnAlias",
            table_reference: "TableReference",
            table_alias: "TableAlias",
            alias_scope: "TableReference",
            insert_into: "InsertIntoClause",
            insert_table: "TableName",
            insert_column: "Column",
            values: "ValuesClause",
            values_path: &[],
            value: "Expression",
            insert_query: "SelectStatement",
            suffix_member: "QualifiedID",
            qualifiers: &["TableName"],
        },
    )
}
