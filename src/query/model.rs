use super::expr::Expr;
use super::types::ValueType;
use serde::{Deserialize, Serialize};

/// Generic query model: the opaque output of the upstream query parser.
///
/// Clauses are kept in source order; result operators apply after the
/// select clause, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryModel {
    pub main_from: FromClause,
    #[serde(default)]
    pub body: Vec<BodyClause>,
    pub select: Expr,
    #[serde(default)]
    pub result_operators: Vec<ResultOperator>,
}

/// `from <name> in <source>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromClause {
    pub name: String,
    pub item_type: ValueType,
    pub source: Expr,
}

/// `join <name> in <source> on <outer_key> equals <inner_key>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    pub name: String,
    pub item_type: ValueType,
    pub source: Expr,
    pub outer_key: Expr,
    pub inner_key: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl std::fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub expr: Expr,
    #[serde(default)]
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyClause {
    From(FromClause),
    Join(JoinClause),
    Where(Expr),
    /// One `orderby` clause; its orderings are primary over earlier clauses.
    OrderBy(Vec<Ordering>),
}

/// Query-level modifiers applied after select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultOperator {
    Take(Expr),
    Skip(Expr),
    First {
        #[serde(default)]
        or_default: bool,
    },
    Single {
        #[serde(default)]
        or_default: bool,
    },
    Last {
        #[serde(default)]
        or_default: bool,
    },
    Count,
    LongCount,
    Distinct,
    Cast(ValueType),
    OfType(ValueType),
    Any,
    All(Expr),
    Contains(Expr),
    Min,
    Max,
    Sum,
    Average,
    Union(Box<QueryModel>),
    Concat(Box<QueryModel>),
    DefaultIfEmpty,
    GroupBy { key: Expr, element: Expr },
    Reverse,
}

/// Registry key of a result operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultOperatorKind {
    Take,
    Skip,
    First,
    Single,
    Last,
    Count,
    LongCount,
    Distinct,
    Cast,
    OfType,
    Any,
    All,
    Contains,
    Min,
    Max,
    Sum,
    Average,
    Union,
    Concat,
    DefaultIfEmpty,
    GroupBy,
    Reverse,
}

impl ResultOperator {
    pub fn kind(&self) -> ResultOperatorKind {
        match self {
            ResultOperator::Take(_) => ResultOperatorKind::Take,
            ResultOperator::Skip(_) => ResultOperatorKind::Skip,
            ResultOperator::First { .. } => ResultOperatorKind::First,
            ResultOperator::Single { .. } => ResultOperatorKind::Single,
            ResultOperator::Last { .. } => ResultOperatorKind::Last,
            ResultOperator::Count => ResultOperatorKind::Count,
            ResultOperator::LongCount => ResultOperatorKind::LongCount,
            ResultOperator::Distinct => ResultOperatorKind::Distinct,
            ResultOperator::Cast(_) => ResultOperatorKind::Cast,
            ResultOperator::OfType(_) => ResultOperatorKind::OfType,
            ResultOperator::Any => ResultOperatorKind::Any,
            ResultOperator::All(_) => ResultOperatorKind::All,
            ResultOperator::Contains(_) => ResultOperatorKind::Contains,
            ResultOperator::Min => ResultOperatorKind::Min,
            ResultOperator::Max => ResultOperatorKind::Max,
            ResultOperator::Sum => ResultOperatorKind::Sum,
            ResultOperator::Average => ResultOperatorKind::Average,
            ResultOperator::Union(_) => ResultOperatorKind::Union,
            ResultOperator::Concat(_) => ResultOperatorKind::Concat,
            ResultOperator::DefaultIfEmpty => ResultOperatorKind::DefaultIfEmpty,
            ResultOperator::GroupBy { .. } => ResultOperatorKind::GroupBy,
            ResultOperator::Reverse => ResultOperatorKind::Reverse,
        }
    }
}

impl std::fmt::Display for ResultOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::fmt::Display for ResultOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultOperator::Take(count) => write!(f, "Take({})", count),
            ResultOperator::Skip(count) => write!(f, "Skip({})", count),
            ResultOperator::First { or_default: true } => write!(f, "FirstOrDefault()"),
            ResultOperator::Single { or_default: true } => write!(f, "SingleOrDefault()"),
            ResultOperator::Last { or_default: true } => write!(f, "LastOrDefault()"),
            ResultOperator::Cast(ty) => write!(f, "Cast<{}>()", ty),
            ResultOperator::OfType(ty) => write!(f, "OfType<{}>()", ty),
            ResultOperator::All(predicate) => write!(f, "All({})", predicate),
            ResultOperator::Contains(item) => write!(f, "Contains({})", item),
            ResultOperator::Union(other) => write!(f, "Union({})", other),
            ResultOperator::Concat(other) => write!(f, "Concat({})", other),
            ResultOperator::GroupBy { key, element } => write!(f, "GroupBy({}, {})", key, element),
            other => write!(f, "{}()", other.kind()),
        }
    }
}

impl std::fmt::Display for QueryModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "from {} in {}",
            self.main_from.name, self.main_from.source
        )?;
        for clause in &self.body {
            match clause {
                BodyClause::From(from) => write!(f, " from {} in {}", from.name, from.source)?,
                BodyClause::Join(join) => write!(
                    f,
                    " join {} in {} on {} equals {}",
                    join.name, join.source, join.outer_key, join.inner_key
                )?,
                BodyClause::Where(predicate) => write!(f, " where {}", predicate)?,
                BodyClause::OrderBy(orderings) => {
                    write!(f, " orderby ")?;
                    for (i, o) in orderings.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{} {}", o.expr, o.direction)?;
                    }
                }
            }
        }
        write!(f, " select {}", self.select)?;
        for op in &self.result_operators {
            write!(f, " => {}", op)?;
        }
        Ok(())
    }
}
