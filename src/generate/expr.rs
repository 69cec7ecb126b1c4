use super::SqlTextGenerator;
use crate::error::{CompileError, CompileResult};
use crate::query::{OrderDirection, Value, ValueType};
use crate::sql::{AggregationKind, SqlBinaryOp, SqlColumn, SqlExpr, SqlOrdering, TextPart};

fn operator_text(op: SqlBinaryOp) -> &'static str {
    match op {
        SqlBinaryOp::Equal => "=",
        SqlBinaryOp::NotEqual => "<>",
        SqlBinaryOp::LessThan => "<",
        SqlBinaryOp::LessThanOrEqual => "<=",
        SqlBinaryOp::GreaterThan => ">",
        SqlBinaryOp::GreaterThanOrEqual => ">=",
        SqlBinaryOp::And => "AND",
        SqlBinaryOp::Or => "OR",
        SqlBinaryOp::Add => "+",
        SqlBinaryOp::Subtract => "-",
        SqlBinaryOp::Multiply => "*",
        SqlBinaryOp::Divide => "/",
        SqlBinaryOp::Modulo => "%",
        SqlBinaryOp::Concat => "+",
        SqlBinaryOp::Coalesce => ",",
    }
}

/// A column, possibly behind a conversion.
fn is_column_like(expr: &SqlExpr) -> bool {
    match expr {
        SqlExpr::Column(_) => true,
        SqlExpr::BooleanConversion(operand) | SqlExpr::Convert { operand, .. } => {
            is_column_like(operand)
        }
        _ => false,
    }
}

/// Whether `expr` can evaluate to NULL at runtime.
fn may_be_null(expr: &SqlExpr) -> bool {
    match expr {
        SqlExpr::Constant { value, .. } | SqlExpr::Literal { value, .. } => value.is_null(),
        SqlExpr::Column(column) => column.ty.is_nullable(),
        SqlExpr::BooleanConversion(operand) | SqlExpr::Convert { operand, .. } => {
            may_be_null(operand)
        }
        SqlExpr::Aggregation {
            kind: AggregationKind::Count | AggregationKind::LongCount,
            ..
        } => false,
        SqlExpr::SubStatement(_) => true,
        other => other.ty().is_nullable(),
    }
}

fn unresolved(expr: &SqlExpr) -> CompileError {
    CompileError::InvalidStatement(format!(
        "Unresolved expression reached SQL generation: {:?}",
        expr
    ))
}

impl SqlTextGenerator<'_> {
    /// Renders `expr` where SQL expects a value.
    pub(super) fn value(&mut self, expr: &SqlExpr) -> CompileResult<()> {
        match expr {
            SqlExpr::Constant { value, .. } => self.constant(value),
            SqlExpr::Literal { value, .. } => self.literal(value),
            SqlExpr::Column(column) => {
                self.column(column);
                Ok(())
            }
            // Identity comparisons were rewritten to key comparisons during
            // resolution; any entity left here has no scalar meaning.
            SqlExpr::Entity(_) | SqlExpr::EntityConstant { .. } => Err(CompileError::InvalidStatement(format!(
                "An entity of type '{}' cannot be used as a SQL value",
                expr.ty()
            ))),
            SqlExpr::Binary { op, left, right, .. } if !op.is_predicate() => {
                self.binary_value(*op, left, right)
            }
            SqlExpr::Negate(operand) => {
                self.command.append("-");
                self.value(operand)
            }
            SqlExpr::Function { name, args, .. } => {
                let dialect = self.dialect;
                let name = dialect.function_name(name);
                self.command.append(name);
                self.command.append("(");
                self.value_list(args)?;
                self.command.append(")");
                Ok(())
            }
            SqlExpr::Convert { operand, ty } => self.convert(operand, ty),
            SqlExpr::Case {
                cases, else_value, ..
            } => {
                self.command.append("CASE");
                for case in cases {
                    self.command.append(" WHEN ");
                    self.predicate(&case.when)?;
                    self.command.append(" THEN ");
                    self.value(&case.then)?;
                }
                if let Some(else_value) = else_value {
                    self.command.append(" ELSE ");
                    self.value(else_value)?;
                }
                self.command.append(" END");
                Ok(())
            }
            SqlExpr::CompositeText { parts, .. } => {
                for part in parts {
                    match part {
                        TextPart::Text(text) => self.command.append(text),
                        TextPart::Expr(e) => self.value(e)?,
                    }
                }
                Ok(())
            }
            SqlExpr::BooleanConversion(operand) => self.value(operand),
            SqlExpr::PredicateAsValue(predicate) => self.predicate_as_value(predicate),
            SqlExpr::Collection { items, .. } => {
                if items.is_empty() {
                    return Err(CompileError::InvalidStatement(
                        "An empty collection cannot be used as a value".to_string(),
                    ));
                }
                self.command.append("(");
                self.value_list(items)?;
                self.command.append(")");
                Ok(())
            }
            SqlExpr::SubStatement(statement) => {
                self.command.append("(");
                self.statement(statement)?;
                self.command.append(")");
                Ok(())
            }
            SqlExpr::Aggregation { kind, operand, ty } => {
                self.aggregation(*kind, operand.as_deref(), ty)
            }
            SqlExpr::RowNumber { orderings } => {
                self.command.append("ROW_NUMBER() OVER (ORDER BY ");
                self.orderings(orderings)?;
                self.command.append(")");
                Ok(())
            }
            SqlExpr::New { .. } | SqlExpr::GroupingSelect { .. } => {
                Err(CompileError::InvalidStatement(format!(
                    "A record of type {} can only be used as a projection",
                    expr.ty()
                )))
            }
            other if other.is_unresolved() => Err(unresolved(other)),
            other if other.is_predicate() => self.predicate_as_value(other),
            other => Err(CompileError::InvalidStatement(format!(
                "Cannot render {:?} as a value",
                other
            ))),
        }
    }

    /// Renders `expr` where SQL expects a search condition.
    pub(super) fn predicate(&mut self, expr: &SqlExpr) -> CompileResult<()> {
        match expr {
            SqlExpr::Literal {
                value: Value::Bool(b),
                ..
            } => {
                self.command.append(if *b { "(1=1)" } else { "(1<>1)" });
                Ok(())
            }
            SqlExpr::BooleanConversion(operand) => self.bool_test(operand),
            SqlExpr::Binary { op, left, right, .. } if op.is_logical() => {
                self.command.append("(");
                self.predicate(left)?;
                self.command.append(" ");
                self.command.append(operator_text(*op));
                self.command.append(" ");
                self.predicate(right)?;
                self.command.append(")");
                Ok(())
            }
            SqlExpr::Binary { op, left, right, .. } if op.is_comparison() => {
                self.comparison(*op, left, right)
            }
            SqlExpr::Not(operand) => {
                self.command.append("NOT (");
                self.predicate(operand)?;
                self.command.append(")");
                Ok(())
            }
            SqlExpr::IsNull(operand) => {
                self.value(operand)?;
                self.command.append(" IS NULL");
                Ok(())
            }
            SqlExpr::IsNotNull(operand) => {
                self.value(operand)?;
                self.command.append(" IS NOT NULL");
                Ok(())
            }
            SqlExpr::Like {
                operand,
                pattern,
                escape,
            } => {
                self.value(operand)?;
                self.command.append(" LIKE ");
                self.value(pattern)?;
                if let Some(escape) = escape {
                    let literal = self.dialect.string_literal(&escape.to_string());
                    self.command.append(" ESCAPE ");
                    self.command.append(&literal);
                }
                Ok(())
            }
            SqlExpr::Exists(statement) => {
                self.command.append("EXISTS(");
                self.statement(statement)?;
                self.command.append(")");
                Ok(())
            }
            SqlExpr::In { item, collection } => self.in_predicate(item, collection),
            SqlExpr::PredicateAsValue(predicate) => self.predicate(predicate),
            other if other.is_unresolved() => Err(unresolved(other)),
            other if other.ty().is_bool() => self.bool_test(other),
            other => Err(CompileError::InvalidStatement(format!(
                "Expression of type {} cannot be used as a condition: {:?}",
                other.ty(),
                other
            ))),
        }
    }

    /// Orderings of an ORDER BY or OVER clause. Constant sort keys are
    /// wrapped in a sub-select, which SQL accepts where a bare constant is
    /// rejected.
    pub(super) fn orderings(&mut self, orderings: &[SqlOrdering]) -> CompileResult<()> {
        for (i, ordering) in orderings.iter().enumerate() {
            if i > 0 {
                self.command.append(", ");
            }
            let constant = matches!(
                ordering.expr,
                SqlExpr::Constant { .. } | SqlExpr::Literal { .. }
            );
            if constant {
                self.command.append("(SELECT ");
                self.value(&ordering.expr)?;
                self.command.append(")");
            } else {
                self.value(&ordering.expr)?;
            }
            self.command.append(match ordering.direction {
                OrderDirection::Asc => " ASC",
                OrderDirection::Desc => " DESC",
            });
        }
        Ok(())
    }

    pub(super) fn column(&mut self, column: &SqlColumn) {
        self.command.append_identifier(&column.owner_alias);
        self.command.append(".");
        self.command.append_identifier(&column.name);
    }

    fn value_list(&mut self, items: &[SqlExpr]) -> CompileResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.command.append(", ");
            }
            self.value(item)?;
        }
        Ok(())
    }

    fn constant(&mut self, value: &Value) -> CompileResult<()> {
        match value {
            Value::Null => self.command.append("NULL"),
            Value::Array(_) | Value::Entity { .. } => {
                return Err(CompileError::InvalidStatement(format!(
                    "Constant {} cannot be bound as a parameter",
                    value
                )));
            }
            other => self.command.append_parameter(other.clone()),
        }
        Ok(())
    }

    fn literal(&mut self, value: &Value) -> CompileResult<()> {
        match value {
            Value::Null => self.command.append("NULL"),
            Value::Bool(b) => {
                let text = self.dialect.bool_literal(*b);
                self.command.append(&text);
            }
            Value::Int(n) => self.command.append(&n.to_string()),
            Value::Float(n) => self.command.append(&n.to_string()),
            Value::Decimal(d) => self.command.append(&d.to_string()),
            Value::Char(c) => {
                let text = self.dialect.string_literal(&c.to_string());
                self.command.append(&text);
            }
            Value::String(s) => {
                let text = self.dialect.string_literal(s);
                self.command.append(&text);
            }
            other => return self.constant(other),
        }
        Ok(())
    }

    fn binary_value(&mut self, op: SqlBinaryOp, left: &SqlExpr, right: &SqlExpr) -> CompileResult<()> {
        if op == SqlBinaryOp::Coalesce {
            self.command.append("COALESCE(");
            self.value(left)?;
            self.command.append(", ");
            self.value(right)?;
            self.command.append(")");
            return Ok(());
        }

        let dialect = self.dialect;
        let operator = if op == SqlBinaryOp::Concat {
            dialect.concat_operator()
        } else {
            operator_text(op)
        };
        self.command.append("(");
        self.value(left)?;
        self.command.append(" ");
        self.command.append(operator);
        self.command.append(" ");
        self.value(right)?;
        self.command.append(")");
        Ok(())
    }

    fn convert(&mut self, operand: &SqlExpr, ty: &ValueType) -> CompileResult<()> {
        let prefix = self.dialect.convert_prefix(ty);
        let suffix = self.dialect.convert_suffix(ty);
        self.command.append(&prefix);
        self.value(operand)?;
        self.command.append(&suffix);
        Ok(())
    }

    fn aggregation(
        &mut self,
        kind: AggregationKind,
        operand: Option<&SqlExpr>,
        ty: &ValueType,
    ) -> CompileResult<()> {
        let dialect = self.dialect;
        let name = match kind {
            AggregationKind::Count => "COUNT",
            AggregationKind::LongCount => dialect.long_count_function(),
            AggregationKind::Sum => "SUM",
            AggregationKind::Min => "MIN",
            AggregationKind::Max => "MAX",
            AggregationKind::Average => "AVG",
        };
        self.command.append(name);
        self.command.append("(");
        match (kind, operand) {
            (AggregationKind::Count | AggregationKind::LongCount, None) => self.command.append("*"),
            (_, None) => {
                return Err(CompileError::InvalidStatement(format!(
                    "{} requires an operand",
                    name
                )));
            }
            // AVG over integers truncates unless the operand is widened first.
            (AggregationKind::Average, Some(operand))
                if ty.underlying() == &ValueType::Double
                    && operand.ty().underlying() != &ValueType::Double =>
            {
                self.convert(operand, &ValueType::Double)?
            }
            (_, Some(operand)) => self.value(operand)?,
        }
        self.command.append(")");
        Ok(())
    }

    fn predicate_as_value(&mut self, predicate: &SqlExpr) -> CompileResult<()> {
        let yes = self.dialect.bool_literal(true);
        let no = self.dialect.bool_literal(false);
        self.command.append("CASE WHEN ");
        self.predicate(predicate)?;
        self.command.append(" THEN ");
        self.command.append(&yes);
        self.command.append(" ELSE ");
        self.command.append(&no);
        self.command.append(" END");
        Ok(())
    }

    fn bool_test(&mut self, operand: &SqlExpr) -> CompileResult<()> {
        let yes = self.dialect.bool_literal(true);
        self.command.append("(");
        self.value(operand)?;
        self.command.append(" = ");
        self.command.append(&yes);
        self.command.append(")");
        Ok(())
    }

    fn in_predicate(&mut self, item: &SqlExpr, collection: &SqlExpr) -> CompileResult<()> {
        match collection {
            SqlExpr::Collection { items, .. } if items.is_empty() => {
                self.command.append("(0=1)");
                Ok(())
            }
            SqlExpr::Collection { items, .. } => {
                self.value(item)?;
                self.command.append(" IN (");
                self.value_list(items)?;
                self.command.append(")");
                Ok(())
            }
            SqlExpr::SubStatement(statement) => {
                self.value(item)?;
                self.command.append(" IN (");
                self.statement(statement)?;
                self.command.append(")");
                Ok(())
            }
            other => Err(CompileError::InvalidStatement(format!(
                "IN requires a collection or a sub-statement, got {:?}",
                other
            ))),
        }
    }

    /// Comparison with NULL semantics of the query model: `x == null` is an
    /// IS NULL test, and two nullable operands are equal when both are NULL.
    fn comparison(&mut self, op: SqlBinaryOp, left: &SqlExpr, right: &SqlExpr) -> CompileResult<()> {
        let null_test = matches!(op, SqlBinaryOp::Equal | SqlBinaryOp::NotEqual);
        if null_test && (left.is_null_constant() || right.is_null_constant()) {
            let operand = if right.is_null_constant() { left } else { right };
            self.value(operand)?;
            self.command.append(if op == SqlBinaryOp::Equal {
                " IS NULL"
            } else {
                " IS NOT NULL"
            });
            return Ok(());
        }

        let guarded = matches!(
            op,
            SqlBinaryOp::Equal
                | SqlBinaryOp::NotEqual
                | SqlBinaryOp::LessThanOrEqual
                | SqlBinaryOp::GreaterThanOrEqual
        ) && (is_column_like(left) || is_column_like(right))
            && may_be_null(left)
            && may_be_null(right);

        if !guarded {
            return self.plain_comparison(op, left, right);
        }

        if op == SqlBinaryOp::NotEqual {
            self.command.append("((");
            self.value(left)?;
            self.command.append(" IS NULL AND ");
            self.value(right)?;
            self.command.append(" IS NOT NULL) OR (");
            self.value(left)?;
            self.command.append(" IS NOT NULL AND ");
            self.value(right)?;
            self.command.append(" IS NULL) OR (");
        } else {
            self.command.append("((");
            self.value(left)?;
            self.command.append(" IS NULL AND ");
            self.value(right)?;
            self.command.append(" IS NULL) OR (");
        }
        self.plain_comparison(op, left, right)?;
        self.command.append("))");
        Ok(())
    }

    fn plain_comparison(&mut self, op: SqlBinaryOp, left: &SqlExpr, right: &SqlExpr) -> CompileResult<()> {
        self.value(left)?;
        self.command.append(" ");
        self.command.append(operator_text(op));
        self.command.append(" ");
        self.value(right)
    }
}
