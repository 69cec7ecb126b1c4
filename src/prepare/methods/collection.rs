use super::{MethodCall, MethodCallTransformer};
use crate::error::CompileResult;
use crate::query::Value;
use crate::sql::SqlExpr;

/// `list.Contains(item)` / `Enumerable.Contains(list, item)`: an `IN` test
/// against a constant collection or a sub-statement.
#[derive(Debug, Clone, Copy)]
pub struct CollectionContainsTransformer;

impl MethodCallTransformer for CollectionContainsTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        let (collection, item) = match call.object.take() {
            Some(object) => {
                call.check_argument_count(1)?;
                (object, call.take_argument(0)?)
            }
            None => {
                call.check_argument_count(2)?;
                (call.take_argument(0)?, call.take_argument(1)?)
            }
        };

        let collection = match collection {
            c @ (SqlExpr::Collection { .. } | SqlExpr::SubStatement(_)) => c,
            SqlExpr::Constant {
                value: Value::Array(values),
                ty,
            } => {
                let item_type = ty.element_type().cloned().unwrap_or_else(|| item.ty());
                SqlExpr::Collection {
                    items: values
                        .into_iter()
                        .map(|v| SqlExpr::constant(v, item_type.clone()))
                        .collect(),
                    ty,
                }
            }
            _ => return Err(call.unsupported("a constant collection or a sub-query")),
        };

        Ok(SqlExpr::In {
            item: Box::new(item),
            collection: Box::new(collection),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{MethodSig, ValueType};
    use crate::sql::SqlColumn;

    #[test]
    fn test_constant_array_becomes_collection() {
        let id = SqlExpr::Column(SqlColumn::definition(ValueType::Int32, "t0", "ID", true));
        let ids = SqlExpr::constant(
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
            ValueType::sequence_of(ValueType::Int32),
        );
        let result = CollectionContainsTransformer
            .transform(MethodCall {
                method: MethodSig::static_method("Enumerable", "Contains", [ValueType::Int32]),
                object: None,
                arguments: vec![ids, id],
                ty: ValueType::Bool,
                expression: "Enumerable.Contains(ids, [x].ID)".to_string(),
            })
            .unwrap();
        let SqlExpr::In { collection, .. } = result else {
            panic!("expected IN");
        };
        assert!(matches!(*collection, SqlExpr::Collection { ref items, .. } if items.len() == 2));
    }

    #[test]
    fn test_string_receiver_is_rejected() {
        let name = SqlExpr::Column(SqlColumn::definition(ValueType::String, "t0", "Name", false));
        let result = CollectionContainsTransformer.transform(MethodCall {
            method: MethodSig::instance("String", "Contains", [ValueType::Char]),
            object: Some(name),
            arguments: vec![SqlExpr::constant('a', ValueType::Char)],
            ty: ValueType::Bool,
            expression: "[x].Name.Contains('a')".to_string(),
        });
        assert!(result.is_err());
    }
}
