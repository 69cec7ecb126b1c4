use pretty_assertions::assert_eq;
use relsql::generate::Dialect;
use relsql::prelude::*;
use relsql::query::{Expr, MethodSig};

const CUSTOMER_COLUMNS: &str = "[t0].[ID], [t0].[Name], [t0].[City], [t0].[Age], [t0].[IsActive]";

fn schema() -> MappingSchema {
    MappingSchema::load(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/schema.toml"))
        .expect("fixture schema")
}

fn compiler() -> QueryCompiler {
    QueryCompiler::new(SchemaResolver::new(schema()))
}

fn customer() -> Expr {
    source("c", entity("Customer"))
}

fn compile(model: &QueryModel) -> SqlCommand {
    compiler().compile(model).expect("query compiles")
}

#[test]
fn test_plain_source_select() {
    let command = compile(&from_entity("c", "Customer"));
    assert_eq!(
        command.command_text,
        format!("SELECT {} FROM [Customers] AS [t0]", CUSTOMER_COLUMNS)
    );
    assert!(command.parameters.is_empty());
}

#[test]
fn test_where_equals_null() {
    let model = from_entity("c", "Customer").filter(customer().member("Name", ValueType::String).equal(null()));
    let command = compile(&model);
    assert_eq!(
        command.command_text,
        format!("SELECT {} FROM [Customers] AS [t0] WHERE [t0].[Name] IS NULL", CUSTOMER_COLUMNS)
    );
    assert!(command.parameters.is_empty());
}

#[test]
fn test_nullable_column_equality_is_guarded() {
    let name = customer().member("Name", ValueType::String);
    let city = customer().member("City", ValueType::String);
    let command = compile(&from_entity("c", "Customer").filter(name.equal(city)));
    assert!(command.command_text.ends_with(
        "WHERE (([t0].[Name] IS NULL AND [t0].[City] IS NULL) OR ([t0].[Name] = [t0].[City]))"
    ));

    let name = customer().member("Name", ValueType::String);
    let city = customer().member("City", ValueType::String);
    let command = compile(&from_entity("c", "Customer").filter(name.not_equal(city)));
    assert!(command.command_text.ends_with(
        "WHERE (([t0].[Name] IS NULL AND [t0].[City] IS NOT NULL) OR ([t0].[Name] IS NOT NULL AND [t0].[City] IS NULL) OR ([t0].[Name] <> [t0].[City]))"
    ));
}

#[test]
fn test_string_concat_converts_non_strings() {
    let concat = call_static(
        MethodSig::static_method("String", "Concat", [ValueType::Object, ValueType::Object, ValueType::Object]),
        vec![
            string("x"),
            customer().member("Age", ValueType::Int32.nullable()),
            customer().member("Name", ValueType::String),
        ],
        ValueType::String,
    );
    let command = compile(&from_entity("c", "Customer").select(concat));
    assert_eq!(
        command.command_text,
        "SELECT ((@1 + CONVERT(NVARCHAR(MAX), [t0].[Age])) + [t0].[Name]) AS [value] FROM [Customers] AS [t0]"
    );
    assert_eq!(command.parameters[0].value, Value::String("x".to_string()));
}

#[test]
fn test_take_and_first() {
    let command = compile(&from_entity("c", "Customer").with(ResultOperator::Take(int(3))));
    assert_eq!(
        command.command_text,
        format!("SELECT TOP (@1) {} FROM [Customers] AS [t0]", CUSTOMER_COLUMNS)
    );
    assert_eq!(command.parameters[0].value, Value::Int(3));

    let first = compile(&from_entity("c", "Customer").with(ResultOperator::First { or_default: false }));
    let first_or_default =
        compile(&from_entity("c", "Customer").with(ResultOperator::First { or_default: true }));
    assert!(first.command_text.starts_with("SELECT TOP (1) "));
    assert_eq!(first.command_text, first_or_default.command_text);
}

#[test]
fn test_unregistered_method_is_unsupported() {
    let call = customer().call(MethodSig::instance("Customer", "Frobnicate", []), vec![], ValueType::Bool);
    let err = compiler().compile(&from_entity("c", "Customer").filter(call)).unwrap_err();
    match err {
        CompileError::Unsupported { message, .. } => {
            assert!(message.contains("Frobnicate"), "{}", message);
            assert!(message.contains("not supported"), "{}", message);
        }
        other => panic!("expected Unsupported, got {:?}", other),
    }
}

#[test]
fn test_like_escaping_matches_literally() {
    let contains = customer().member("Name", ValueType::String).call(
        MethodSig::instance("String", "Contains", [ValueType::String]),
        vec![string("50%_[a]\\")],
        ValueType::Bool,
    );
    let command = compile(&from_entity("c", "Customer").filter(contains));
    assert!(
        command.command_text.ends_with("WHERE [t0].[Name] LIKE @1 ESCAPE '\\'"),
        "{}",
        command.command_text
    );
    assert_eq!(
        command.parameters[0].value,
        Value::String("%50\\%\\_\\[a]\\\\%".to_string())
    );
}

#[test]
fn test_like_on_entity_is_rejected() {
    let contains = customer().call(
        MethodSig::instance("String", "Contains", [ValueType::String]),
        vec![string("a")],
        ValueType::Bool,
    );
    let err = compiler().compile(&from_entity("c", "Customer").filter(contains)).unwrap_err();
    assert!(matches!(err, CompileError::InvalidStatement(_)), "{:?}", err);
}

#[test]
fn test_contains_on_empty_collection_is_contradiction() {
    let contains = call_static(
        MethodSig::static_method(
            "Enumerable",
            "Contains",
            [ValueType::sequence_of(ValueType::Int32), ValueType::Int32],
        ),
        vec![
            constant(Value::Array(vec![]), ValueType::sequence_of(ValueType::Int32)),
            customer().member("ID", ValueType::Int32),
        ],
        ValueType::Bool,
    );
    let command = compile(&from_entity("c", "Customer").filter(contains));
    assert!(command.command_text.ends_with("WHERE (0=1)"), "{}", command.command_text);
    assert!(!command.command_text.contains("IN ()"));
}

#[test]
fn test_bool_column_in_where() {
    let active = customer().member("IsActive", ValueType::Bool);
    let command = compile(&from_entity("c", "Customer").filter(active));
    assert!(command.command_text.ends_with("WHERE ([t0].[IsActive] = 1)"), "{}", command.command_text);
}

#[test]
fn test_navigation_adds_one_left_join() {
    let order = source("o", entity("Order"));
    let customer = order.member("Customer", entity("Customer"));
    let city = customer.clone().member("City", ValueType::String);
    let name = customer.member("Name", ValueType::String);
    let model = from_entity("o", "Order").select(record("CityName", vec![("City", city), ("Name", name)]));
    let command = compile(&model);
    assert_eq!(
        command.command_text,
        "SELECT [t1].[City] AS [City], [t1].[Name] AS [Name] FROM [Orders] AS [t0] \
         LEFT OUTER JOIN [Customers] AS [t1] ON [t0].[CustomerID] = [t1].[ID]"
    );
}

#[test]
fn test_collection_source_becomes_cross_join_with_key_condition() {
    let orders = customer().member("Orders", ValueType::sequence_of(entity("Order")));
    let total = source("o", entity("Order")).member("Total", ValueType::Decimal);
    let model = from_entity("c", "Customer")
        .from_also("o", entity("Order"), orders)
        .select(total);
    let command = compile(&model);
    assert!(command.command_text.contains("CROSS JOIN [Orders] AS [t1]"), "{}", command.command_text);
    assert!(command.command_text.ends_with("WHERE [t0].[ID] = [t1].[CustomerID]"), "{}", command.command_text);
}

#[test]
fn test_distinct_after_take_wraps_statement() {
    let model = from_entity("c", "Customer")
        .with(ResultOperator::Take(int(5)))
        .with(ResultOperator::Distinct);
    let command = compile(&model);
    assert_eq!(
        command.command_text,
        format!(
            "SELECT DISTINCT [q0].[ID], [q0].[Name], [q0].[City], [q0].[Age], [q0].[IsActive] \
             FROM (SELECT TOP (@1) {} FROM [Customers] AS [t0]) AS [q0]",
            CUSTOMER_COLUMNS
        )
    );
}

#[test]
fn test_count_and_any() {
    let count = compile(&from_entity("c", "Customer").with(ResultOperator::Count));
    assert_eq!(count.command_text, "SELECT COUNT(*) AS [value] FROM [Customers] AS [t0]");

    let any = compile(&from_entity("c", "Customer").with(ResultOperator::Any));
    assert!(any.command_text.starts_with("SELECT CASE WHEN EXISTS(SELECT "), "{}", any.command_text);
    assert!(any.command_text.ends_with("THEN 1 ELSE 0 END AS [value]"), "{}", any.command_text);
}

#[test]
fn test_skip_uses_row_number() {
    let name = customer().member("Name", ValueType::String);
    let model = from_entity("c", "Customer")
        .order_by(name, OrderDirection::Asc)
        .with(ResultOperator::Skip(int(10)));
    let command = compile(&model);
    assert!(
        command.command_text.contains("ROW_NUMBER() OVER (ORDER BY [t0].[Name] ASC) AS [Value]"),
        "{}",
        command.command_text
    );
    assert!(command.command_text.contains("WHERE [q0].[Value] > @1"), "{}", command.command_text);
    assert!(command.command_text.ends_with("ORDER BY [q0].[Value] ASC"), "{}", command.command_text);
}

#[test]
fn test_group_by_key() {
    let city = customer().member("City", ValueType::String);
    let model = from_entity("c", "Customer").with(ResultOperator::GroupBy {
        key: city,
        element: customer(),
    });
    let command = compile(&model);
    assert_eq!(
        command.command_text,
        "SELECT [t0].[City] AS [key] FROM [Customers] AS [t0] GROUP BY [t0].[City]"
    );
}

#[test]
fn test_unmapped_member_suggests_name() {
    let typo = customer().member("Nmae", ValueType::String);
    let err = compiler().compile(&from_entity("c", "Customer").filter(typo.equal(null()))).unwrap_err();
    assert!(matches!(err, CompileError::UnmappedItem(_)));
    assert!(err.to_string().contains("Did you mean 'Name'?"), "{}", err);
}

#[test]
fn test_unsupported_result_operator() {
    let err = compiler()
        .compile(&from_entity("c", "Customer").with(ResultOperator::Reverse))
        .unwrap_err();
    assert!(matches!(err, CompileError::Unsupported { .. }));
}

#[test]
fn test_postgres_dialect_and_alias_prefix() {
    let config = CompilerConfig::builder()
        .dialect(Dialect::Postgres)
        .table_alias_prefix("x")
        .build()
        .unwrap();
    let compiler = QueryCompiler::with_config(SchemaResolver::new(schema()), config);
    let model = from_entity("c", "Customer")
        .filter(customer().member("Name", ValueType::String).equal(string("Bob")))
        .with(ResultOperator::Take(int(2)));
    let command = compiler.compile(&model).unwrap();
    assert_eq!(
        command.command_text,
        "SELECT \"x0\".\"ID\", \"x0\".\"Name\", \"x0\".\"City\", \"x0\".\"Age\", \"x0\".\"IsActive\" \
         FROM \"Customers\" AS \"x0\" WHERE \"x0\".\"Name\" = $1 LIMIT $2"
    );
    assert_eq!(command.parameters.len(), 2);
}

#[test]
fn test_equal_constants_get_separate_parameters() {
    let age = || customer().member("Age", ValueType::Int32.nullable());
    let model = from_entity("c", "Customer")
        .filter(age().greater_than(int(18)).and(age().less_than(int(18))));
    let command = compile(&model);
    assert_eq!(command.parameters.len(), 2);
    assert_eq!(command.parameters[0].name, "@1");
    assert_eq!(command.parameters[1].name, "@2");
}

#[test]
fn test_nan_constant_reaches_fixed_point() {
    let age = customer()
        .member("Age", ValueType::Int32.nullable())
        .convert(ValueType::Double.nullable());
    let model = from_entity("c", "Customer").filter(age.equal(constant(f64::NAN, ValueType::Double.nullable())));
    let command = compile(&model);
    assert!(command.command_text.contains("CONVERT(FLOAT, [t0].[Age])"), "{}", command.command_text);
    assert_eq!(command.parameters.len(), 1);
    assert_eq!(command.parameters[0].value, Value::Float(f64::NAN));
}

#[test]
fn test_query_model_from_json() {
    let model = from_entity("c", "Customer").filter(customer().member("Name", ValueType::String).equal(null()));
    let json = serde_json::to_string(&model).unwrap();
    let parsed: QueryModel = serde_json::from_str(&json).unwrap();
    assert_eq!(compile(&parsed), compile(&model));

    let command_json = serde_json::to_value(compile(&model)).unwrap();
    assert!(command_json["command_text"].as_str().unwrap().ends_with("IS NULL"));
}
