use super::methods::MethodCallTransformerRegistry;
use super::operators::ResultOperatorHandlerRegistry;
use crate::resolve::UniqueIdentifierGenerator;
use crate::sql::{SqlExpr, TableArena};
use std::collections::HashMap;

/// State of one preparation run.
///
/// Query sources are visible through a stack of scopes: a sub-query sees the
/// names of the queries it is nested in.
pub struct PreparationContext<'a> {
    pub tables: &'a mut TableArena,
    pub generator: &'a mut UniqueIdentifierGenerator,
    pub methods: &'a MethodCallTransformerRegistry,
    pub operators: &'a ResultOperatorHandlerRegistry,
    scopes: Vec<HashMap<String, SqlExpr>>,
}

impl<'a> PreparationContext<'a> {
    pub fn new(
        tables: &'a mut TableArena,
        generator: &'a mut UniqueIdentifierGenerator,
        methods: &'a MethodCallTransformerRegistry,
        operators: &'a ResultOperatorHandlerRegistry,
    ) -> Self {
        Self {
            tables,
            generator,
            methods,
            operators,
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn add_mapping(&mut self, name: &str, expr: SqlExpr) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), expr);
        }
    }

    /// Innermost mapping of a source name.
    pub fn lookup(&self, name: &str) -> Option<&SqlExpr> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Points every name of the innermost scope that maps to `old` at `new`.
    ///
    /// Used when the statement built so far is moved into a sub-statement:
    /// later clauses then read the item through the sub-statement.
    pub fn replace_mapping(&mut self, old: &SqlExpr, new: &SqlExpr) {
        if let Some(scope) = self.scopes.last_mut() {
            for mapped in scope.values_mut() {
                if mapped == old {
                    *mapped = new.clone();
                }
            }
        }
    }
}
