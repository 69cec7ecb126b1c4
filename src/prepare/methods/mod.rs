//! Method-call transformers: turn source method calls into SQL expression
//! shapes.
//!
//! Lookup is two-level: the exact signature (`String.Contains(String)`) wins
//! over a transformer registered for the bare method name (`Equals`).

mod collection;
mod convert;
mod datetime;
mod equals;
mod math;
mod string;

pub use collection::CollectionContainsTransformer;
pub use convert::{ConvertTransformer, ToStringTransformer};
pub use datetime::{DateAddTransformer, DateTimeUnit};
pub use equals::EqualsTransformer;
pub use math::MathTransformer;
pub use string::{
    ConcatTransformer, IndexOfTransformer, InsertTransformer, IsNullOrEmptyTransformer, LikeKind,
    LikeTransformer, RemoveTransformer, ReplaceTransformer, SimpleFunctionTransformer,
    SubstringTransformer, escape_like_pattern,
};

use crate::error::{CompileError, CompileResult};
use crate::query::{MethodSig, ValueType};
use crate::sql::SqlExpr;
use std::collections::HashMap;
use std::sync::Arc;

/// A method call with its object and arguments already lowered.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: MethodSig,
    pub object: Option<SqlExpr>,
    pub arguments: Vec<SqlExpr>,
    pub ty: ValueType,
    /// Source text of the call, for error messages.
    pub expression: String,
}

impl MethodCall {
    /// The error every transformer reports for a call of the wrong shape.
    pub fn unsupported(&self, expected: &str) -> CompileError {
        CompileError::unsupported_method(&self.method.qualified_name(), expected, &self.expression)
    }

    pub fn check_argument_count(&self, count: usize) -> CompileResult<()> {
        if self.arguments.len() == count {
            Ok(())
        } else {
            Err(self.unsupported(&plural(count, "argument")))
        }
    }

    pub fn check_argument_range(&self, min: usize, max: usize) -> CompileResult<()> {
        if (min..=max).contains(&self.arguments.len()) {
            Ok(())
        } else {
            Err(self.unsupported(&format!("{} to {} arguments", min, max)))
        }
    }

    pub fn check_static(&self) -> CompileResult<()> {
        if self.object.is_none() {
            Ok(())
        } else {
            Err(self.unsupported("a static method"))
        }
    }

    /// Takes the object of an instance call.
    pub fn take_object(&mut self) -> CompileResult<SqlExpr> {
        match self.object.take() {
            Some(object) => Ok(object),
            None => Err(self.unsupported("an instance method")),
        }
    }

    /// Takes the argument at `index`, leaving a null literal in its place.
    pub fn take_argument(&mut self, index: usize) -> CompileResult<SqlExpr> {
        match self.arguments.get_mut(index) {
            Some(arg) => Ok(std::mem::replace(arg, SqlExpr::literal(crate::query::Value::Null, ValueType::Object))),
            None => Err(self.unsupported(&plural(index + 1, "argument"))),
        }
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("1 {}", word)
    } else {
        format!("{} {}s", count, word)
    }
}

pub trait MethodCallTransformer: Send + Sync {
    fn transform(&self, call: MethodCall) -> CompileResult<SqlExpr>;
}

#[derive(Default, Clone)]
pub struct MethodCallTransformerRegistry {
    by_signature: HashMap<String, Arc<dyn MethodCallTransformer>>,
    by_name: HashMap<String, Arc<dyn MethodCallTransformer>>,
}

impl std::fmt::Debug for MethodCallTransformerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut signatures: Vec<&String> = self.by_signature.keys().collect();
        signatures.sort();
        let mut names: Vec<&String> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("MethodCallTransformerRegistry")
            .field("signatures", &signatures)
            .field("names", &names)
            .finish()
    }
}

impl MethodCallTransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transformer for exactly these signatures.
    pub fn register(&mut self, methods: &[MethodSig], transformer: Arc<dyn MethodCallTransformer>) {
        for method in methods {
            self.by_signature.insert(method.signature(), Arc::clone(&transformer));
        }
    }

    /// Registers a fallback transformer for every method with one of these
    /// names.
    pub fn register_names(&mut self, names: &[&str], transformer: Arc<dyn MethodCallTransformer>) {
        for name in names {
            self.by_name.insert(name.to_string(), Arc::clone(&transformer));
        }
    }

    pub fn get(&self, method: &MethodSig) -> Option<&Arc<dyn MethodCallTransformer>> {
        self.by_signature
            .get(&method.signature())
            .or_else(|| self.by_name.get(&method.name))
    }

    pub fn transform(&self, call: MethodCall) -> CompileResult<SqlExpr> {
        match self.get(&call.method) {
            Some(transformer) => transformer.transform(call),
            None => Err(CompileError::unregistered_method(
                &call.method.qualified_name(),
                &call.expression,
            )),
        }
    }

    /// Registry with every built-in transformer.
    pub fn build_default_registry() -> Self {
        use ValueType as T;
        let s = |name: &str, params: Vec<T>| MethodSig::instance("String", name, params);
        let string_static = |name: &str, params: Vec<T>| MethodSig::static_method("String", name, params);
        let date = |name: &str, param: T| MethodSig::instance("DateTime", name, [param]);

        let mut registry = Self::new();

        registry.register(&[s("Contains", vec![T::String])], Arc::new(LikeTransformer::new(LikeKind::Contains)));
        registry.register(&[s("StartsWith", vec![T::String])], Arc::new(LikeTransformer::new(LikeKind::StartsWith)));
        registry.register(&[s("EndsWith", vec![T::String])], Arc::new(LikeTransformer::new(LikeKind::EndsWith)));

        let object_seq = T::sequence_of(T::Object);
        let string_seq = T::sequence_of(T::String);
        registry.register(
            &[
                string_static("Concat", vec![T::String, T::String]),
                string_static("Concat", vec![T::String, T::String, T::String]),
                string_static("Concat", vec![T::String, T::String, T::String, T::String]),
                string_static("Concat", vec![T::Object]),
                string_static("Concat", vec![T::Object, T::Object]),
                string_static("Concat", vec![T::Object, T::Object, T::Object]),
                string_static("Concat", vec![T::Object, T::Object, T::Object, T::Object]),
                string_static("Concat", vec![object_seq]),
                string_static("Concat", vec![string_seq]),
            ],
            Arc::new(ConcatTransformer),
        );
        registry.register(
            &[string_static("IsNullOrEmpty", vec![T::String])],
            Arc::new(IsNullOrEmptyTransformer),
        );
        registry.register(&[s("Insert", vec![T::Int32, T::String])], Arc::new(InsertTransformer));
        registry.register(
            &[
                s("IndexOf", vec![T::String]),
                s("IndexOf", vec![T::Char]),
                s("IndexOf", vec![T::String, T::Int32]),
                s("IndexOf", vec![T::Char, T::Int32]),
                s("IndexOf", vec![T::String, T::Int32, T::Int32]),
                s("IndexOf", vec![T::Char, T::Int32, T::Int32]),
            ],
            Arc::new(IndexOfTransformer),
        );
        registry.register(&[s("ToUpper", vec![])], Arc::new(SimpleFunctionTransformer::new("UPPER")));
        registry.register(&[s("ToLower", vec![])], Arc::new(SimpleFunctionTransformer::new("LOWER")));
        registry.register(&[s("TrimStart", vec![])], Arc::new(SimpleFunctionTransformer::new("LTRIM")));
        registry.register(&[s("TrimEnd", vec![])], Arc::new(SimpleFunctionTransformer::new("RTRIM")));
        registry.register(&[s("Trim", vec![])], Arc::new(SimpleFunctionTransformer::trim()));
        registry.register(
            &[s("Substring", vec![T::Int32]), s("Substring", vec![T::Int32, T::Int32])],
            Arc::new(SubstringTransformer),
        );
        registry.register(
            &[s("Replace", vec![T::String, T::String]), s("Replace", vec![T::Char, T::Char])],
            Arc::new(ReplaceTransformer),
        );
        registry.register(
            &[s("Remove", vec![T::Int32]), s("Remove", vec![T::Int32, T::Int32])],
            Arc::new(RemoveTransformer),
        );

        for unit in DateTimeUnit::ALL {
            registry.register(
                &[date(unit.method_name(), unit.parameter_type())],
                Arc::new(DateAddTransformer::new(unit)),
            );
        }
        registry.register(&[date("Add", T::TimeSpan)], Arc::new(DateAddTransformer::time_span()));

        registry.register_names(
            &["ToInt32", "ToInt64", "ToDouble", "ToDecimal", "ToBoolean", "ToDateTime", "ToChar"],
            Arc::new(ConvertTransformer),
        );
        registry.register_names(&["ToString"], Arc::new(ToStringTransformer));
        registry.register_names(&["Equals"], Arc::new(EqualsTransformer));
        registry.register_names(&["Contains"], Arc::new(CollectionContainsTransformer));
        registry.register_names(
            &["Abs", "Floor", "Ceiling", "Round"],
            Arc::new(MathTransformer),
        );

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Value;
    use crate::sql::SqlColumn;

    fn name_column() -> SqlExpr {
        SqlExpr::Column(SqlColumn::definition(ValueType::String, "t0", "Name", false))
    }

    fn call(method: MethodSig, object: Option<SqlExpr>, arguments: Vec<SqlExpr>, ty: ValueType) -> MethodCall {
        MethodCall {
            expression: format!("[x].Name.{}(..)", method.name),
            method,
            object,
            arguments,
            ty,
        }
    }

    #[test]
    fn test_signature_wins_over_name() {
        let registry = MethodCallTransformerRegistry::build_default_registry();
        let string_contains = MethodSig::instance("String", "Contains", [ValueType::String]);
        let result = registry
            .transform(call(
                string_contains,
                Some(name_column()),
                vec![SqlExpr::constant("a", ValueType::String)],
                ValueType::Bool,
            ))
            .unwrap();
        assert!(matches!(result, SqlExpr::Like { .. }));

        let list_contains = MethodSig::instance("List", "Contains", [ValueType::Int32]);
        let result = registry
            .transform(call(
                list_contains,
                Some(SqlExpr::Collection {
                    items: vec![SqlExpr::constant(1, ValueType::Int32)],
                    ty: ValueType::sequence_of(ValueType::Int32),
                }),
                vec![SqlExpr::constant(2, ValueType::Int32)],
                ValueType::Bool,
            ))
            .unwrap();
        assert!(matches!(result, SqlExpr::In { .. }));
    }

    #[test]
    fn test_unregistered_method_names_call() {
        let registry = MethodCallTransformerRegistry::build_default_registry();
        let method = MethodSig::instance("Customer", "Frobnicate", []);
        let err = registry
            .transform(MethodCall {
                method,
                object: Some(name_column()),
                arguments: vec![],
                ty: ValueType::Bool,
                expression: "[x].Frobnicate()".to_string(),
            })
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The method 'Customer.Frobnicate' is not supported by this code generator, and no custom transformer has been registered. Expression: '[x].Frobnicate()'"
        );
    }

    #[test]
    fn test_take_argument_checks_bounds() {
        let mut c = call(
            MethodSig::instance("String", "Insert", [ValueType::Int32, ValueType::String]),
            Some(name_column()),
            vec![SqlExpr::constant(1, ValueType::Int32)],
            ValueType::String,
        );
        assert_eq!(c.take_argument(0).unwrap().constant_value(), Some(&Value::Int(1)));
        assert!(c.take_argument(1).is_err());
    }
}
