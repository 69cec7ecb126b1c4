//! Expression nodes of the SQL statement model.
//!
//! The node set is closed. Passes match on [`SqlExpr`] exhaustively where
//! they need to and use [`SqlExpr::map_children`] to rebuild everything they
//! leave alone.

use super::statement::{SqlOrdering, SqlStatement};
use super::table::TableId;
use crate::error::CompileResult;
use crate::query::{BinaryOp, Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlBinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// String concatenation.
    Concat,
    Coalesce,
}

impl SqlBinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            SqlBinaryOp::Equal
                | SqlBinaryOp::NotEqual
                | SqlBinaryOp::LessThan
                | SqlBinaryOp::LessThanOrEqual
                | SqlBinaryOp::GreaterThan
                | SqlBinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, SqlBinaryOp::And | SqlBinaryOp::Or)
    }

    /// Operators whose result is a predicate.
    pub fn is_predicate(&self) -> bool {
        self.is_comparison() || self.is_logical()
    }
}

impl From<BinaryOp> for SqlBinaryOp {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Equal => SqlBinaryOp::Equal,
            BinaryOp::NotEqual => SqlBinaryOp::NotEqual,
            BinaryOp::LessThan => SqlBinaryOp::LessThan,
            BinaryOp::LessThanOrEqual => SqlBinaryOp::LessThanOrEqual,
            BinaryOp::GreaterThan => SqlBinaryOp::GreaterThan,
            BinaryOp::GreaterThanOrEqual => SqlBinaryOp::GreaterThanOrEqual,
            BinaryOp::AndAlso => SqlBinaryOp::And,
            BinaryOp::OrElse => SqlBinaryOp::Or,
            BinaryOp::Add => SqlBinaryOp::Add,
            BinaryOp::Subtract => SqlBinaryOp::Subtract,
            BinaryOp::Multiply => SqlBinaryOp::Multiply,
            BinaryOp::Divide => SqlBinaryOp::Divide,
            BinaryOp::Modulo => SqlBinaryOp::Modulo,
            BinaryOp::Coalesce => SqlBinaryOp::Coalesce,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationKind {
    Count,
    LongCount,
    Sum,
    Min,
    Max,
    Average,
}

/// A column of a table or sub-statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlColumn {
    pub ty: ValueType,
    pub owner_alias: String,
    pub name: String,
    pub is_primary_key: bool,
    /// Set on columns read through a sub-statement: the name of the defining
    /// column, which may differ from the projected name.
    pub referenced_name: Option<String>,
}

impl SqlColumn {
    pub fn definition(ty: ValueType, owner_alias: &str, name: &str, is_primary_key: bool) -> Self {
        Self {
            ty,
            owner_alias: owner_alias.to_string(),
            name: name.to_string(),
            is_primary_key,
            referenced_name: None,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.referenced_name.is_some()
    }

    /// Name of the column in its defining table.
    pub fn logical_name(&self) -> &str {
        self.referenced_name.as_deref().unwrap_or(&self.name)
    }

    fn reference_from(&self, alias: &str, projected_name: String) -> Self {
        Self {
            ty: self.ty.clone(),
            owner_alias: alias.to_string(),
            name: projected_name,
            is_primary_key: self.is_primary_key,
            referenced_name: Some(self.logical_name().to_string()),
        }
    }
}

/// An entity: all columns of one mapped row.
///
/// A definition owns its columns; a reference (an entity read through a
/// sub-statement) re-addresses them via the sub-statement alias and points
/// back at the definition in `referenced`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlEntity {
    pub ty: ValueType,
    pub table_alias: String,
    /// Prefix of the projected column names when nested in a record.
    pub name: Option<String>,
    pub primary_key: SqlColumn,
    pub columns: Vec<SqlColumn>,
    pub referenced: Option<Box<SqlEntity>>,
}

impl SqlEntity {
    pub fn definition(
        ty: ValueType,
        table_alias: &str,
        primary_key: SqlColumn,
        columns: Vec<SqlColumn>,
    ) -> Self {
        Self {
            ty,
            table_alias: table_alias.to_string(),
            name: None,
            primary_key,
            columns,
            referenced: None,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.referenced.is_some()
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_type(mut self, ty: ValueType) -> Self {
        self.ty = ty;
        self
    }

    /// Finds a column by its name in the defining table.
    pub fn column(&self, name: &str) -> Option<&SqlColumn> {
        self.columns
            .iter()
            .find(|c| c.logical_name() == name)
            .or_else(|| (self.primary_key.logical_name() == name).then_some(&self.primary_key))
    }

    /// This entity as seen from outside a sub-statement aliased `alias`,
    /// where it was projected under the column prefix `name`.
    pub fn reference_from(&self, alias: &str, name: Option<String>) -> SqlEntity {
        let projected = |column: &SqlColumn| projected_name(name.as_deref(), &column.name);
        SqlEntity {
            ty: self.ty.clone(),
            table_alias: alias.to_string(),
            primary_key: self
                .primary_key
                .reference_from(alias, projected(&self.primary_key)),
            columns: self
                .columns
                .iter()
                .map(|c| c.reference_from(alias, projected(c)))
                .collect(),
            referenced: Some(Box::new(self.clone())),
            name,
        }
    }
}

/// Column name of `column` when projected under `prefix`.
pub fn projected_name(prefix: Option<&str>, column: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}_{}", prefix, column),
        None => column.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlCaseWhen {
    pub when: SqlExpr,
    pub then: SqlExpr,
}

/// Piece of a [`SqlExpr::CompositeText`] node.
#[derive(Debug, Clone, PartialEq)]
pub enum TextPart {
    Text(String),
    Expr(SqlExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    /// A value bound as a command parameter.
    Constant { value: Value, ty: ValueType },
    /// A value rendered inline.
    Literal { value: Value, ty: ValueType },
    Column(SqlColumn),
    Entity(SqlEntity),
    /// Entity-typed constant, compared through its primary key.
    EntityConstant {
        ty: ValueType,
        value: Value,
        primary_key: Box<SqlExpr>,
    },
    /// The item of a table; resolved to the table's entity or projection.
    TableRef { table: TableId, ty: ValueType },
    /// Unresolved member access.
    Member {
        object: Box<SqlExpr>,
        member: String,
        ty: ValueType,
    },
    /// Navigation from an entity over a to-one relation; resolved to the
    /// entity of the joined table.
    EntityRefMember {
        entity: Box<SqlEntity>,
        member: String,
        ty: ValueType,
    },
    /// Unresolved `is` check.
    TypeCheck {
        operand: Box<SqlExpr>,
        target: ValueType,
    },
    Binary {
        op: SqlBinaryOp,
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
        ty: ValueType,
    },
    Not(Box<SqlExpr>),
    Negate(Box<SqlExpr>),
    IsNull(Box<SqlExpr>),
    IsNotNull(Box<SqlExpr>),
    Function {
        name: String,
        args: Vec<SqlExpr>,
        ty: ValueType,
    },
    Convert {
        operand: Box<SqlExpr>,
        ty: ValueType,
    },
    Like {
        operand: Box<SqlExpr>,
        pattern: Box<SqlExpr>,
        escape: Option<char>,
    },
    Case {
        cases: Vec<SqlCaseWhen>,
        else_value: Option<Box<SqlExpr>>,
        ty: ValueType,
    },
    /// Text pieces interleaved with expressions, e.g. `DATEADD(day, <e>, <e>)`.
    CompositeText { parts: Vec<TextPart>, ty: ValueType },
    /// A predicate used where a value is expected.
    PredicateAsValue(Box<SqlExpr>),
    /// A boolean value (e.g. a bit column) used where a predicate is expected.
    BooleanConversion(Box<SqlExpr>),
    /// A constant collection, rendered as an `IN` list.
    Collection { items: Vec<SqlExpr>, ty: ValueType },
    SubStatement(Box<SqlStatement>),
    Exists(Box<SqlStatement>),
    In {
        item: Box<SqlExpr>,
        collection: Box<SqlExpr>,
    },
    /// `COUNT(*)` when `operand` is `None`.
    Aggregation {
        kind: AggregationKind,
        operand: Option<Box<SqlExpr>>,
        ty: ValueType,
    },
    RowNumber { orderings: Vec<SqlOrdering> },
    /// Record projection.
    New {
        members: Vec<(String, SqlExpr)>,
        ty: ValueType,
    },
    /// Projection of a grouped statement: the grouping key plus the element
    /// shape that group references re-select.
    GroupingSelect {
        key: Box<SqlExpr>,
        element: Box<SqlExpr>,
        ty: ValueType,
    },
}

impl SqlExpr {
    pub fn ty(&self) -> ValueType {
        match self {
            SqlExpr::Constant { ty, .. }
            | SqlExpr::Literal { ty, .. }
            | SqlExpr::EntityConstant { ty, .. }
            | SqlExpr::TableRef { ty, .. }
            | SqlExpr::Member { ty, .. }
            | SqlExpr::EntityRefMember { ty, .. }
            | SqlExpr::Binary { ty, .. }
            | SqlExpr::Function { ty, .. }
            | SqlExpr::Convert { ty, .. }
            | SqlExpr::Case { ty, .. }
            | SqlExpr::CompositeText { ty, .. }
            | SqlExpr::Collection { ty, .. }
            | SqlExpr::Aggregation { ty, .. }
            | SqlExpr::New { ty, .. }
            | SqlExpr::GroupingSelect { ty, .. } => ty.clone(),
            SqlExpr::Column(column) => column.ty.clone(),
            SqlExpr::Entity(entity) => entity.ty.clone(),
            SqlExpr::Not(operand) | SqlExpr::Negate(operand) => operand.ty(),
            SqlExpr::BooleanConversion(operand) => {
                if operand.ty().is_nullable() {
                    ValueType::Bool.nullable()
                } else {
                    ValueType::Bool
                }
            }
            SqlExpr::TypeCheck { .. }
            | SqlExpr::IsNull(_)
            | SqlExpr::IsNotNull(_)
            | SqlExpr::Like { .. }
            | SqlExpr::PredicateAsValue(_)
            | SqlExpr::Exists(_)
            | SqlExpr::In { .. } => ValueType::Bool,
            SqlExpr::SubStatement(statement) => statement.data_info.data_type(),
            SqlExpr::RowNumber { .. } => ValueType::Int64,
        }
    }

    pub fn constant(value: impl Into<Value>, ty: ValueType) -> Self {
        SqlExpr::Constant {
            value: value.into(),
            ty,
        }
    }

    pub fn literal(value: impl Into<Value>, ty: ValueType) -> Self {
        SqlExpr::Literal {
            value: value.into(),
            ty,
        }
    }

    pub fn int_literal(n: i32) -> Self {
        Self::literal(n, ValueType::Int32)
    }

    pub fn string_literal(s: &str) -> Self {
        Self::literal(s, ValueType::String)
    }

    pub fn bool_literal(b: bool) -> Self {
        Self::literal(b, ValueType::Bool)
    }

    /// Binary node; predicates are typed `Bool`, everything else takes the
    /// left operand's type.
    pub fn binary(op: SqlBinaryOp, left: SqlExpr, right: SqlExpr) -> Self {
        let ty = if op.is_predicate() {
            ValueType::Bool
        } else {
            left.ty()
        };
        SqlExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        }
    }

    pub fn equal(left: SqlExpr, right: SqlExpr) -> Self {
        Self::binary(SqlBinaryOp::Equal, left, right)
    }

    pub fn and(left: SqlExpr, right: SqlExpr) -> Self {
        Self::binary(SqlBinaryOp::And, left, right)
    }

    pub fn or(left: SqlExpr, right: SqlExpr) -> Self {
        Self::binary(SqlBinaryOp::Or, left, right)
    }

    pub fn add(left: SqlExpr, right: SqlExpr) -> Self {
        Self::binary(SqlBinaryOp::Add, left, right)
    }

    pub fn subtract(left: SqlExpr, right: SqlExpr) -> Self {
        Self::binary(SqlBinaryOp::Subtract, left, right)
    }

    /// String concatenation, typed `String`.
    pub fn concat(left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::Binary {
            op: SqlBinaryOp::Concat,
            left: Box::new(left),
            right: Box::new(right),
            ty: ValueType::String,
        }
    }

    pub fn function(name: &str, args: Vec<SqlExpr>, ty: ValueType) -> Self {
        SqlExpr::Function {
            name: name.to_string(),
            args,
            ty,
        }
    }

    pub fn convert(operand: SqlExpr, ty: ValueType) -> Self {
        SqlExpr::Convert {
            operand: Box::new(operand),
            ty,
        }
    }

    pub fn is_null(operand: SqlExpr) -> Self {
        SqlExpr::IsNull(Box::new(operand))
    }

    pub fn case(when: SqlExpr, then: SqlExpr, else_value: SqlExpr) -> Self {
        let ty = then.ty();
        SqlExpr::Case {
            cases: vec![SqlCaseWhen { when, then }],
            else_value: Some(Box::new(else_value)),
            ty,
        }
    }

    /// Constant or literal `null`.
    pub fn is_null_constant(&self) -> bool {
        matches!(
            self,
            SqlExpr::Constant { value: Value::Null, .. } | SqlExpr::Literal { value: Value::Null, .. }
        )
    }

    /// Value of a constant or literal node.
    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            SqlExpr::Constant { value, .. } | SqlExpr::Literal { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Whether this node yields a predicate (rather than a value) in SQL.
    pub fn is_predicate(&self) -> bool {
        match self {
            SqlExpr::Binary { op, .. } => op.is_predicate(),
            SqlExpr::Not(operand) => operand.is_predicate() || operand.ty().is_bool(),
            SqlExpr::IsNull(_)
            | SqlExpr::IsNotNull(_)
            | SqlExpr::Like { .. }
            | SqlExpr::Exists(_)
            | SqlExpr::In { .. }
            | SqlExpr::TypeCheck { .. }
            | SqlExpr::BooleanConversion(_) => true,
            _ => false,
        }
    }

    /// Whether the node still has to pass through mapping resolution.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            SqlExpr::TableRef { .. }
                | SqlExpr::Member { .. }
                | SqlExpr::EntityRefMember { .. }
                | SqlExpr::TypeCheck { .. }
        )
    }

    /// Rebuilds this node with every direct child replaced by `on_expr` and
    /// every nested statement replaced by `on_statement`.
    pub fn map_children(
        self,
        on_expr: &mut dyn FnMut(SqlExpr) -> CompileResult<SqlExpr>,
        on_statement: &mut dyn FnMut(SqlStatement) -> CompileResult<SqlStatement>,
    ) -> CompileResult<SqlExpr> {
        fn boxed(
            e: Box<SqlExpr>,
            f: &mut dyn FnMut(SqlExpr) -> CompileResult<SqlExpr>,
        ) -> CompileResult<Box<SqlExpr>> {
            f(*e).map(Box::new)
        }

        let expr = match self {
            SqlExpr::EntityConstant {
                ty,
                value,
                primary_key,
            } => SqlExpr::EntityConstant {
                ty,
                value,
                primary_key: boxed(primary_key, on_expr)?,
            },
            SqlExpr::Member { object, member, ty } => SqlExpr::Member {
                object: boxed(object, on_expr)?,
                member,
                ty,
            },
            SqlExpr::TypeCheck { operand, target } => SqlExpr::TypeCheck {
                operand: boxed(operand, on_expr)?,
                target,
            },
            SqlExpr::Binary { op, left, right, ty } => SqlExpr::Binary {
                op,
                left: boxed(left, on_expr)?,
                right: boxed(right, on_expr)?,
                ty,
            },
            SqlExpr::Not(operand) => SqlExpr::Not(boxed(operand, on_expr)?),
            SqlExpr::Negate(operand) => SqlExpr::Negate(boxed(operand, on_expr)?),
            SqlExpr::IsNull(operand) => SqlExpr::IsNull(boxed(operand, on_expr)?),
            SqlExpr::IsNotNull(operand) => SqlExpr::IsNotNull(boxed(operand, on_expr)?),
            SqlExpr::Function { name, args, ty } => SqlExpr::Function {
                name,
                args: args.into_iter().map(&mut *on_expr).collect::<CompileResult<_>>()?,
                ty,
            },
            SqlExpr::Convert { operand, ty } => SqlExpr::Convert {
                operand: boxed(operand, on_expr)?,
                ty,
            },
            SqlExpr::Like {
                operand,
                pattern,
                escape,
            } => SqlExpr::Like {
                operand: boxed(operand, on_expr)?,
                pattern: boxed(pattern, on_expr)?,
                escape,
            },
            SqlExpr::Case {
                cases,
                else_value,
                ty,
            } => SqlExpr::Case {
                cases: cases
                    .into_iter()
                    .map(|c| {
                        Ok(SqlCaseWhen {
                            when: on_expr(c.when)?,
                            then: on_expr(c.then)?,
                        })
                    })
                    .collect::<CompileResult<_>>()?,
                else_value: else_value.map(|e| boxed(e, on_expr)).transpose()?,
                ty,
            },
            SqlExpr::CompositeText { parts, ty } => SqlExpr::CompositeText {
                parts: parts
                    .into_iter()
                    .map(|p| match p {
                        TextPart::Expr(e) => on_expr(e).map(TextPart::Expr),
                        text => Ok(text),
                    })
                    .collect::<CompileResult<_>>()?,
                ty,
            },
            SqlExpr::PredicateAsValue(operand) => SqlExpr::PredicateAsValue(boxed(operand, on_expr)?),
            SqlExpr::BooleanConversion(operand) => {
                SqlExpr::BooleanConversion(boxed(operand, on_expr)?)
            }
            SqlExpr::Collection { items, ty } => SqlExpr::Collection {
                items: items.into_iter().map(&mut *on_expr).collect::<CompileResult<_>>()?,
                ty,
            },
            SqlExpr::SubStatement(statement) => {
                SqlExpr::SubStatement(Box::new(on_statement(*statement)?))
            }
            SqlExpr::Exists(statement) => SqlExpr::Exists(Box::new(on_statement(*statement)?)),
            SqlExpr::In { item, collection } => SqlExpr::In {
                item: boxed(item, on_expr)?,
                collection: boxed(collection, on_expr)?,
            },
            SqlExpr::Aggregation { kind, operand, ty } => SqlExpr::Aggregation {
                kind,
                operand: operand.map(|e| boxed(e, on_expr)).transpose()?,
                ty,
            },
            SqlExpr::RowNumber { orderings } => SqlExpr::RowNumber {
                orderings: orderings
                    .into_iter()
                    .map(|o| {
                        Ok(SqlOrdering {
                            expr: on_expr(o.expr)?,
                            direction: o.direction,
                        })
                    })
                    .collect::<CompileResult<_>>()?,
            },
            SqlExpr::New { members, ty } => SqlExpr::New {
                members: members
                    .into_iter()
                    .map(|(name, e)| Ok((name, on_expr(e)?)))
                    .collect::<CompileResult<_>>()?,
                ty,
            },
            SqlExpr::GroupingSelect { key, element, ty } => SqlExpr::GroupingSelect {
                key: boxed(key, on_expr)?,
                element: boxed(element, on_expr)?,
                ty,
            },
            leaf @ (SqlExpr::Constant { .. }
            | SqlExpr::Literal { .. }
            | SqlExpr::Column(_)
            | SqlExpr::Entity(_)
            | SqlExpr::TableRef { .. }
            | SqlExpr::EntityRefMember { .. }) => leaf,
        };
        Ok(expr)
    }

    /// Direct child expressions; nested statements are not entered.
    pub fn children(&self) -> Vec<&SqlExpr> {
        match self {
            SqlExpr::EntityConstant { primary_key, .. } => vec![primary_key],
            SqlExpr::Member { object, .. } => vec![object],
            SqlExpr::TypeCheck { operand, .. }
            | SqlExpr::Not(operand)
            | SqlExpr::Negate(operand)
            | SqlExpr::IsNull(operand)
            | SqlExpr::IsNotNull(operand)
            | SqlExpr::Convert { operand, .. }
            | SqlExpr::PredicateAsValue(operand)
            | SqlExpr::BooleanConversion(operand) => vec![operand],
            SqlExpr::Binary { left, right, .. } => vec![left, right],
            SqlExpr::Function { args, .. } => args.iter().collect(),
            SqlExpr::Like { operand, pattern, .. } => vec![operand, pattern],
            SqlExpr::Case {
                cases, else_value, ..
            } => cases
                .iter()
                .flat_map(|c| [&c.when, &c.then])
                .chain(else_value.as_deref())
                .collect(),
            SqlExpr::CompositeText { parts, .. } => parts
                .iter()
                .filter_map(|p| match p {
                    TextPart::Expr(e) => Some(e),
                    TextPart::Text(_) => None,
                })
                .collect(),
            SqlExpr::Collection { items, .. } => items.iter().collect(),
            SqlExpr::In { item, collection } => vec![item, collection],
            SqlExpr::Aggregation { operand, .. } => operand.as_deref().into_iter().collect(),
            SqlExpr::RowNumber { orderings } => orderings.iter().map(|o| &o.expr).collect(),
            SqlExpr::New { members, .. } => members.iter().map(|(_, e)| e).collect(),
            SqlExpr::GroupingSelect { key, element, .. } => vec![key, element],
            SqlExpr::Constant { .. }
            | SqlExpr::Literal { .. }
            | SqlExpr::Column(_)
            | SqlExpr::Entity(_)
            | SqlExpr::TableRef { .. }
            | SqlExpr::EntityRefMember { .. }
            | SqlExpr::SubStatement(_)
            | SqlExpr::Exists(_) => Vec::new(),
        }
    }

    /// Whether this node or any node below it (outside nested statements)
    /// matches `predicate`.
    pub fn any(&self, predicate: &dyn Fn(&SqlExpr) -> bool) -> bool {
        predicate(self) || self.children().into_iter().any(|c| c.any(predicate))
    }
}

/// The expression that reads `projection` from outside a sub-statement
/// aliased `alias`.
///
/// Mirrors the column naming of projection rendering: scalars are projected
/// as `value`, record members by member name, nested names joined with `_`.
pub fn reference_of(projection: &SqlExpr, alias: &str, name: Option<&str>) -> SqlExpr {
    let nested = |member: &str| projected_name(name, member);

    match projection {
        SqlExpr::Entity(entity) => SqlExpr::Entity(entity.reference_from(alias, name.map(String::from))),
        SqlExpr::New { members, ty } => SqlExpr::New {
            members: members
                .iter()
                .map(|(member, e)| (member.clone(), reference_of(e, alias, Some(&nested(member)))))
                .collect(),
            ty: ty.clone(),
        },
        SqlExpr::GroupingSelect { key, element, ty } => SqlExpr::GroupingSelect {
            key: Box::new(reference_of(key, alias, Some(&nested("key")))),
            element: element.clone(),
            ty: ty.clone(),
        },
        other => {
            let ty = other.ty();
            SqlExpr::Column(SqlColumn {
                ty,
                owner_alias: alias.to_string(),
                name: name.unwrap_or("value").to_string(),
                is_primary_key: false,
                referenced_name: Some(name.unwrap_or("value").to_string()),
            })
        }
    }
}
