//! Tags of the ANTLR PL/SQL grammar (snake_case productions)

use super::{Dialect, DialectKind, Rule, Vocabulary};

const RULES: &[(&str, Rule)] = &[
    ("create_package", Rule::Skip),
    ("create_package_body", Rule::Package),
    ("procedure_body", Rule::Routine),
    ("function_body", Rule::Routine),
    ("create_procedure_body", Rule::Routine),
    ("create_function_body", Rule::Routine),
    ("procedure_spec", Rule::Skip),
    ("function_spec", Rule::Skip),
    ("variable_declaration", Rule::Variable),
    ("cursor_declaration", Rule::Cursor),
    ("call_statement", Rule::CallStatement),
    ("function_call", Rule::FunctionCall),
    ("id_expression", Rule::Identifier),
    ("cursor_name", Rule::Reference),
    ("return_statement", Rule::Return),
    ("assignment_statement", Rule::Assignment),
    ("open_statement", Rule::Assignment),
    ("fetch_statement", Rule::Fetch),
    ("if_statement", Rule::Conditional),
    ("elsif_part", Rule::Conditional),
    ("case_when_part", Rule::Conditional),
    ("loop_statement", Rule::Loop),
    ("select_statement", Rule::Select),
    ("query_block", Rule::Select),
    ("subquery_factoring_clause", Rule::With),
    ("selected_list", Rule::SelectList),
    ("single_table_insert", Rule::Insert),
    ("tableview_name", Rule::TableName),
    ("join_clause", Rule::Effect),
    ("where_clause", Rule::Effect),
    ("group_by_clause", Rule::Effect),
    ("having_clause", Rule::Effect),
    ("order_by_clause", Rule::Effect),
    ("subquery_operation_part", Rule::SetOperation),
];

pub fn dialect() -> Dialect {
    Dialect::new(
        DialectKind::Plsql,
        RULES,
        Vocabulary {
            name: Some("identifier"),
            name_part: "id_expression",
            package_name: "package_name",
            routine_header: &[
                "identifier",
                "procedure_name",
                "function_name",
                "parameter",
                "type_spec",
            ],
            parameter_list: None,
            parameter: "parameter",
            cursor_parameter: "parameter_spec",
            default_value: "default_value_part",
            cursor_query: "select_statement",
            call_name: "routine_name",
            arguments: &["function_argument"],
            argument: "argument",
            argument_name: "identifier",
            fetch_cursor: "cursor_name",
            fetch_target: "variable_name",
            loop_header: Some("cursor_loop_param"),
            with_entry: Some("factoring_element"),
            with_name: "query_name",
            from_clause: "from_clause",
            with_clause: "subquery_factoring_clause",
            into_clause: "into_clause",
            into_variable: "variable_name",
            select_element: Some("select_list_elements"),
            column_alias: "column_alias",
            table_reference: "dml_table_expression_clause",
            table_alias: "table_alias",
            alias_scope: "table_ref_aux",
            insert_into: "insert_into_clause",
            insert_table: "tableview_name",
            insert_column: "column_name",
            values: "values_clause",
            values_path: &["expressions"],
            value: "expression",
            insert_query: "select_statement",
            suffix_member: "id_expression",
            qualifiers: &["id_expression"],
        },
    )
}
