use super::model::QueryModel;
use super::types::ValueType;
use super::values::Value;
use serde::{Deserialize, Serialize};

/// Binary operators of the source expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    AndAlso,
    OrElse,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Coalesce => "??",
        };
        write!(f, "{}", symbol)
    }
}

/// Identifies a callable method: declaring type, name, parameter types and
/// whether it is static.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSig {
    pub declaring_type: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ValueType>,
    #[serde(default)]
    pub is_static: bool,
}

impl MethodSig {
    pub fn instance(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        parameters: impl IntoIterator<Item = ValueType>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameters: parameters.into_iter().collect(),
            is_static: false,
        }
    }

    pub fn static_method(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        parameters: impl IntoIterator<Item = ValueType>,
    ) -> Self {
        Self {
            is_static: true,
            ..Self::instance(declaring_type, name, parameters)
        }
    }

    /// `Type.Name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }

    /// Exact signature key: `Type.Name(Param1, Param2)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
        format!("{}({})", self.qualified_name(), params.join(", "))
    }
}

impl std::fmt::Display for MethodSig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// Expression of the generic query model consumed by the preparation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Constant {
        value: Value,
        ty: ValueType,
    },
    /// Root set of all instances of an entity (a table).
    EntitySet { item_type: ValueType },
    /// Reference to the item of a from/join clause, by clause name.
    Source { name: String, ty: ValueType },
    Member {
        object: Box<Expr>,
        member: String,
        ty: ValueType,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        ty: ValueType,
    },
    Not(Box<Expr>),
    Negate(Box<Expr>),
    Convert {
        operand: Box<Expr>,
        ty: ValueType,
    },
    Call {
        method: MethodSig,
        object: Option<Box<Expr>>,
        #[serde(default)]
        arguments: Vec<Expr>,
        ty: ValueType,
    },
    NewArray {
        elements: Vec<Expr>,
        ty: ValueType,
    },
    /// Record construction: `new { A = .., B = .. }`.
    New {
        members: Vec<(String, Expr)>,
        ty: ValueType,
    },
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
        ty: ValueType,
    },
    TypeIs {
        operand: Box<Expr>,
        target: ValueType,
    },
    SubQuery {
        query: Box<QueryModel>,
        ty: ValueType,
    },
}

impl Expr {
    pub fn ty(&self) -> ValueType {
        match self {
            Expr::Constant { ty, .. }
            | Expr::Source { ty, .. }
            | Expr::Member { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Convert { ty, .. }
            | Expr::Call { ty, .. }
            | Expr::NewArray { ty, .. }
            | Expr::New { ty, .. }
            | Expr::Conditional { ty, .. }
            | Expr::SubQuery { ty, .. } => ty.clone(),
            Expr::EntitySet { item_type } => ValueType::sequence_of(item_type.clone()),
            Expr::Not(operand) | Expr::Negate(operand) => operand.ty(),
            Expr::TypeIs { .. } => ValueType::Bool,
        }
    }

    /// Value of a constant node, if this is one.
    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Expr::Constant { value, .. } => Some(value),
            _ => None,
        }
    }
}

fn write_list(f: &mut std::fmt::Formatter<'_>, items: &[Expr]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Constant { value, .. } => write!(f, "{}", value),
            Expr::EntitySet { item_type } => write!(f, "Table<{}>", item_type),
            Expr::Source { name, .. } => write!(f, "[{}]", name),
            Expr::Member { object, member, .. } => write!(f, "{}.{}", object, member),
            Expr::Binary { op, left, right, .. } => write!(f, "({} {} {})", left, op, right),
            Expr::Not(operand) => write!(f, "!{}", operand),
            Expr::Negate(operand) => write!(f, "-{}", operand),
            Expr::Convert { operand, ty } => write!(f, "Convert({}, {})", operand, ty),
            Expr::Call {
                method,
                object,
                arguments,
                ..
            } => {
                match object {
                    Some(obj) => write!(f, "{}.{}(", obj, method.name)?,
                    None => write!(f, "{}(", method.qualified_name())?,
                }
                write_list(f, arguments)?;
                write!(f, ")")
            }
            Expr::NewArray { elements, .. } => {
                write!(f, "new [] {{")?;
                write_list(f, elements)?;
                write!(f, "}}")
            }
            Expr::New { members, .. } => {
                write!(f, "new {{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {} = {}", name, value)?;
                }
                write!(f, " }}")
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => write!(f, "IIF({}, {}, {})", test, if_true, if_false),
            Expr::TypeIs { operand, target } => write!(f, "({} is {})", operand, target),
            Expr::SubQuery { query, .. } => write!(f, "{{{}}}", query),
        }
    }
}
