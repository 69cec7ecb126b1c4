//! String method transformers.

use super::{MethodCall, MethodCallTransformer};
use crate::error::CompileResult;
use crate::query::{Value, ValueType};
use crate::sql::{SqlBinaryOp, SqlExpr};

const LIKE_ESCAPE: char = '\\';

/// Escapes the LIKE wildcards `%`, `_` and `[` (and the escape character
/// itself) so the text matches only literally.
pub fn escape_like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_' | '[') {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// The same escaping as [`escape_like_pattern`], done in SQL with nested
/// `REPLACE` calls for values only known at execution time.
fn escape_like_expression(value: SqlExpr) -> SqlExpr {
    // The escape character goes first so later escapes are not doubled.
    ["\\", "%", "_", "["].into_iter().fold(value, |inner, wildcard| {
        SqlExpr::function(
            "REPLACE",
            vec![
                inner,
                SqlExpr::string_literal(wildcard),
                SqlExpr::string_literal(&format!("{}{}", LIKE_ESCAPE, wildcard)),
            ],
            ValueType::String,
        )
    })
}

fn len(e: SqlExpr) -> SqlExpr {
    SqlExpr::function("LEN", vec![e], ValueType::Int32)
}

fn plus_one(e: SqlExpr) -> SqlExpr {
    SqlExpr::add(e, SqlExpr::int_literal(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    Contains,
    StartsWith,
    EndsWith,
}

impl LikeKind {
    fn leading_wildcard(&self) -> bool {
        matches!(self, LikeKind::Contains | LikeKind::EndsWith)
    }

    fn trailing_wildcard(&self) -> bool {
        matches!(self, LikeKind::Contains | LikeKind::StartsWith)
    }
}

/// `Contains`, `StartsWith`, `EndsWith` on strings.
#[derive(Debug, Clone, Copy)]
pub struct LikeTransformer {
    kind: LikeKind,
}

impl LikeTransformer {
    pub fn new(kind: LikeKind) -> Self {
        Self { kind }
    }

    fn pattern(&self, argument: SqlExpr) -> Option<SqlExpr> {
        match argument.constant_value() {
            Some(Value::Null) => None,
            Some(Value::String(text)) => {
                let mut pattern = String::new();
                if self.kind.leading_wildcard() {
                    pattern.push('%');
                }
                pattern.push_str(&escape_like_pattern(text));
                if self.kind.trailing_wildcard() {
                    pattern.push('%');
                }
                Some(SqlExpr::constant(pattern, ValueType::String))
            }
            Some(Value::Char(c)) => self.pattern(SqlExpr::constant(c.to_string(), ValueType::String)),
            _ => {
                let mut pattern = escape_like_expression(argument);
                if self.kind.leading_wildcard() {
                    pattern = SqlExpr::concat(SqlExpr::string_literal("%"), pattern);
                }
                if self.kind.trailing_wildcard() {
                    pattern = SqlExpr::concat(pattern, SqlExpr::string_literal("%"));
                }
                Some(pattern)
            }
        }
    }
}

impl MethodCallTransformer for LikeTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_argument_count(1)?;
        let object = call.take_object()?;
        let argument = call.take_argument(0)?;

        Ok(match self.pattern(argument) {
            None => SqlExpr::bool_literal(false),
            Some(pattern) => SqlExpr::Like {
                operand: Box::new(object),
                pattern: Box::new(pattern),
                escape: Some(LIKE_ESCAPE),
            },
        })
    }
}

/// `String.Concat` in all its overloads: a left fold of concatenations.
#[derive(Debug, Clone, Copy)]
pub struct ConcatTransformer;

impl MethodCallTransformer for ConcatTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_static()?;

        let arguments = if call.arguments.len() == 1 && call.arguments[0].ty().is_sequence() {
            match call.take_argument(0)? {
                SqlExpr::Collection { items, .. } => items,
                SqlExpr::Constant {
                    value: Value::Array(values),
                    ty,
                } => {
                    let item_type = ty.element_type().cloned().unwrap_or(ValueType::Object);
                    values
                        .into_iter()
                        .map(|v| SqlExpr::constant(v, item_type.clone()))
                        .collect()
                }
                _ => {
                    return Err(call.unsupported(
                        "a constant collection or a new array as the only argument",
                    ));
                }
            }
        } else {
            std::mem::take(&mut call.arguments)
        };

        let mut parts = arguments.into_iter().map(|arg| {
            if arg.ty().is_string() {
                arg
            } else {
                SqlExpr::convert(arg, ValueType::String)
            }
        });

        let Some(first) = parts.next() else {
            return Ok(SqlExpr::string_literal(""));
        };
        Ok(parts.fold(first, SqlExpr::concat))
    }
}

/// `String.IsNullOrEmpty(x)`: `x IS NULL OR LEN(x) = 0`.
#[derive(Debug, Clone, Copy)]
pub struct IsNullOrEmptyTransformer;

impl MethodCallTransformer for IsNullOrEmptyTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_static()?;
        call.check_argument_count(1)?;
        let value = call.take_argument(0)?;
        Ok(SqlExpr::or(
            SqlExpr::is_null(value.clone()),
            SqlExpr::equal(len(value), SqlExpr::int_literal(0)),
        ))
    }
}

/// `x.Insert(index, value)`
#[derive(Debug, Clone, Copy)]
pub struct InsertTransformer;

impl MethodCallTransformer for InsertTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_argument_count(2)?;
        let object = call.take_object()?;
        let index = call.take_argument(0)?;
        let value = call.take_argument(1)?;

        let at_end = SqlExpr::equal(plus_one(len(object.clone())), plus_one(index.clone()));
        let appended = SqlExpr::concat(object.clone(), value.clone());
        let stuffed = SqlExpr::function(
            "STUFF",
            vec![object, plus_one(index), SqlExpr::int_literal(0), value],
            ValueType::String,
        );
        Ok(SqlExpr::case(at_end, appended, stuffed))
    }
}

/// `x.IndexOf(value[, start[, count]])`, zero-based with -1 for "not found".
#[derive(Debug, Clone, Copy)]
pub struct IndexOfTransformer;

impl MethodCallTransformer for IndexOfTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_argument_range(1, 3)?;
        let object = call.take_object()?;
        let arity = call.arguments.len();
        let value = call.take_argument(0)?;
        let empty_value = SqlExpr::equal(len(value.clone()), SqlExpr::int_literal(0));

        let minus_one = |e: SqlExpr| SqlExpr::subtract(e, SqlExpr::int_literal(1));
        let char_index = |args: Vec<SqlExpr>| SqlExpr::function("CHARINDEX", args, ValueType::Int32);

        if arity == 1 {
            return Ok(SqlExpr::case(
                empty_value,
                SqlExpr::int_literal(0),
                minus_one(char_index(vec![value, object])),
            ));
        }

        let start = call.take_argument(1)?;
        let start_in_range = SqlExpr::binary(
            SqlBinaryOp::LessThanOrEqual,
            plus_one(start.clone()),
            len(object.clone()),
        );
        let test = SqlExpr::and(empty_value, start_in_range);

        let haystack = if arity == 3 {
            let count = call.take_argument(2)?;
            SqlExpr::function(
                "SUBSTRING",
                vec![object, SqlExpr::int_literal(1), SqlExpr::add(start.clone(), count)],
                ValueType::String,
            )
        } else {
            object
        };

        Ok(SqlExpr::case(
            test,
            start.clone(),
            minus_one(char_index(vec![value, haystack, plus_one(start)])),
        ))
    }
}

/// Instance methods without arguments that map to one SQL function.
#[derive(Debug, Clone)]
pub struct SimpleFunctionTransformer {
    functions: Vec<&'static str>,
}

impl SimpleFunctionTransformer {
    pub fn new(function: &'static str) -> Self {
        Self {
            functions: vec![function],
        }
    }

    /// `LTRIM(RTRIM(x))`
    pub fn trim() -> Self {
        Self {
            functions: vec!["RTRIM", "LTRIM"],
        }
    }
}

impl MethodCallTransformer for SimpleFunctionTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_argument_count(0)?;
        let object = call.take_object()?;
        let ty = call.ty.clone();
        Ok(self
            .functions
            .iter()
            .fold(object, |inner, name| SqlExpr::function(name, vec![inner], ty.clone())))
    }
}

/// `x.Substring(start[, length])`
#[derive(Debug, Clone, Copy)]
pub struct SubstringTransformer;

impl MethodCallTransformer for SubstringTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_argument_range(1, 2)?;
        let object = call.take_object()?;
        let start = call.take_argument(0)?;
        let length = if call.arguments.len() == 2 {
            call.take_argument(1)?
        } else {
            len(object.clone())
        };
        Ok(SqlExpr::function(
            "SUBSTRING",
            vec![object, plus_one(start), length],
            ValueType::String,
        ))
    }
}

/// `x.Replace(old, new)`
#[derive(Debug, Clone, Copy)]
pub struct ReplaceTransformer;

impl MethodCallTransformer for ReplaceTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_argument_count(2)?;
        let object = call.take_object()?;
        let old = call.take_argument(0)?;
        let new = call.take_argument(1)?;
        Ok(SqlExpr::function("REPLACE", vec![object, old, new], ValueType::String))
    }
}

/// `x.Remove(start[, count])`
#[derive(Debug, Clone, Copy)]
pub struct RemoveTransformer;

impl MethodCallTransformer for RemoveTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_argument_range(1, 2)?;
        let object = call.take_object()?;
        let start = call.take_argument(0)?;
        if call.arguments.len() == 1 {
            return Ok(SqlExpr::function(
                "SUBSTRING",
                vec![object, SqlExpr::int_literal(1), start],
                ValueType::String,
            ));
        }
        let count = call.take_argument(1)?;
        Ok(SqlExpr::function(
            "STUFF",
            vec![object, plus_one(start), count, SqlExpr::string_literal("")],
            ValueType::String,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MethodSig;
    use crate::sql::SqlColumn;
    use pretty_assertions::assert_eq;

    fn name() -> SqlExpr {
        SqlExpr::Column(SqlColumn::definition(ValueType::String, "t0", "Name", false))
    }

    fn call(name: &str, object: Option<SqlExpr>, arguments: Vec<SqlExpr>) -> MethodCall {
        let params: Vec<ValueType> = arguments.iter().map(SqlExpr::ty).collect();
        MethodCall {
            method: if object.is_some() {
                MethodSig::instance("String", name, params)
            } else {
                MethodSig::static_method("String", name, params)
            },
            object,
            arguments,
            ty: ValueType::String,
            expression: format!("{}(..)", name),
        }
    }

    #[test]
    fn test_escape_like_pattern() {
        assert_eq!(escape_like_pattern(r"50%_off[\]"), r"50\%\_off\[\\]");
        assert_eq!(escape_like_pattern("plain"), "plain");
    }

    #[test]
    fn test_contains_with_constant() {
        let result = LikeTransformer::new(LikeKind::Contains)
            .transform(call("Contains", Some(name()), vec![SqlExpr::constant("a%b", ValueType::String)]))
            .unwrap();
        assert_eq!(
            result,
            SqlExpr::Like {
                operand: Box::new(name()),
                pattern: Box::new(SqlExpr::constant(r"%a\%b%", ValueType::String)),
                escape: Some('\\'),
            }
        );
    }

    #[test]
    fn test_starts_with_null_is_false() {
        let result = LikeTransformer::new(LikeKind::StartsWith)
            .transform(call("StartsWith", Some(name()), vec![SqlExpr::constant(Value::Null, ValueType::String)]))
            .unwrap();
        assert_eq!(result, SqlExpr::bool_literal(false));
    }

    #[test]
    fn test_ends_with_column_uses_replace_chain() {
        let result = LikeTransformer::new(LikeKind::EndsWith)
            .transform(call("EndsWith", Some(name()), vec![name()]))
            .unwrap();
        let SqlExpr::Like { pattern, .. } = result else {
            panic!("expected LIKE");
        };
        let SqlExpr::Binary { op, left, right, .. } = *pattern else {
            panic!("expected concatenation");
        };
        assert_eq!(op, SqlBinaryOp::Concat);
        assert_eq!(*left, SqlExpr::string_literal("%"));
        assert!(matches!(*right, SqlExpr::Function { ref name, .. } if name == "REPLACE"));
    }

    #[test]
    fn test_concat_converts_non_strings() {
        let result = ConcatTransformer
            .transform(call(
                "Concat",
                None,
                vec![name(), SqlExpr::constant(1, ValueType::Int32), name()],
            ))
            .unwrap();
        assert_eq!(
            result,
            SqlExpr::concat(
                SqlExpr::concat(
                    name(),
                    SqlExpr::convert(SqlExpr::constant(1, ValueType::Int32), ValueType::String)
                ),
                name()
            )
        );
    }

    #[test]
    fn test_concat_unfolds_constant_array() {
        let array = SqlExpr::constant(
            Value::Array(vec![Value::from("a"), Value::from("b")]),
            ValueType::sequence_of(ValueType::String),
        );
        let result = ConcatTransformer.transform(call("Concat", None, vec![array])).unwrap();
        assert_eq!(
            result,
            SqlExpr::concat(
                SqlExpr::constant("a", ValueType::String),
                SqlExpr::constant("b", ValueType::String)
            )
        );
    }

    #[test]
    fn test_concat_rejects_opaque_collection() {
        let column = SqlExpr::Column(SqlColumn::definition(
            ValueType::sequence_of(ValueType::String),
            "t0",
            "Tags",
            false,
        ));
        let err = ConcatTransformer.transform(call("Concat", None, vec![column])).unwrap_err();
        assert!(err.to_string().starts_with("String.Concat is not supported"));
    }

    #[test]
    fn test_insert_shape() {
        let result = InsertTransformer
            .transform(call(
                "Insert",
                Some(name()),
                vec![SqlExpr::constant(2, ValueType::Int32), SqlExpr::constant("x", ValueType::String)],
            ))
            .unwrap();
        let SqlExpr::Case { cases, else_value, .. } = result else {
            panic!("expected CASE");
        };
        assert_eq!(cases.len(), 1);
        assert!(matches!(else_value.as_deref(), Some(SqlExpr::Function { name, .. }) if name == "STUFF"));
    }

    #[test]
    fn test_insert_requires_two_arguments() {
        let err = InsertTransformer
            .transform(call("Insert", Some(name()), vec![SqlExpr::constant(2, ValueType::Int32)]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "String.Insert is not supported: expected 2 arguments. Expression: 'Insert(..)'"
        );
    }

    #[test]
    fn test_index_of_with_start() {
        let result = IndexOfTransformer
            .transform(call(
                "IndexOf",
                Some(name()),
                vec![SqlExpr::constant("a", ValueType::String), SqlExpr::constant(2, ValueType::Int32)],
            ))
            .unwrap();
        let SqlExpr::Case { cases, else_value, .. } = result else {
            panic!("expected CASE");
        };
        assert!(matches!(
            &cases[0].when,
            SqlExpr::Binary { op: SqlBinaryOp::And, .. }
        ));
        assert_eq!(cases[0].then, SqlExpr::constant(2, ValueType::Int32));
        let Some(SqlExpr::Binary { left, .. }) = else_value.as_deref() else {
            panic!("expected subtraction");
        };
        assert!(matches!(&**left, SqlExpr::Function { name, args, .. } if name == "CHARINDEX" && args.len() == 3));
    }
}
