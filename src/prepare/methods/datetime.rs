//! `DateTime.Add*` transformers.

use super::{MethodCall, MethodCallTransformer};
use crate::error::CompileResult;
use crate::query::{Value, ValueType};
use crate::sql::{SqlBinaryOp, SqlExpr, TextPart};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeUnit {
    Years,
    Months,
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Ticks,
}

impl DateTimeUnit {
    pub const ALL: [DateTimeUnit; 8] = [
        DateTimeUnit::Years,
        DateTimeUnit::Months,
        DateTimeUnit::Days,
        DateTimeUnit::Hours,
        DateTimeUnit::Minutes,
        DateTimeUnit::Seconds,
        DateTimeUnit::Milliseconds,
        DateTimeUnit::Ticks,
    ];

    pub fn method_name(&self) -> &'static str {
        match self {
            DateTimeUnit::Years => "AddYears",
            DateTimeUnit::Months => "AddMonths",
            DateTimeUnit::Days => "AddDays",
            DateTimeUnit::Hours => "AddHours",
            DateTimeUnit::Minutes => "AddMinutes",
            DateTimeUnit::Seconds => "AddSeconds",
            DateTimeUnit::Milliseconds => "AddMilliseconds",
            DateTimeUnit::Ticks => "AddTicks",
        }
    }

    pub fn parameter_type(&self) -> ValueType {
        match self {
            DateTimeUnit::Years | DateTimeUnit::Months => ValueType::Int32,
            DateTimeUnit::Ticks => ValueType::Int64,
            _ => ValueType::Double,
        }
    }

    /// Milliseconds per unit; `None` for calendar units.
    fn milliseconds(&self) -> Option<i64> {
        match self {
            DateTimeUnit::Years | DateTimeUnit::Months => None,
            DateTimeUnit::Days => Some(86_400_000),
            DateTimeUnit::Hours => Some(3_600_000),
            DateTimeUnit::Minutes => Some(60_000),
            DateTimeUnit::Seconds => Some(1_000),
            DateTimeUnit::Milliseconds | DateTimeUnit::Ticks => Some(1),
        }
    }
}

/// `DATEADD(<part>, <amount>, <date>)`
pub(crate) fn date_add(part: &str, amount: SqlExpr, date: SqlExpr) -> SqlExpr {
    SqlExpr::CompositeText {
        parts: vec![
            TextPart::Text(format!("DATEADD({}, ", part)),
            TextPart::Expr(amount),
            TextPart::Text(", ".to_string()),
            TextPart::Expr(date),
            TextPart::Text(")".to_string()),
        ],
        ty: ValueType::DateTime,
    }
}

/// Every `Add*` overload becomes one `DATEADD`; sub-month units are converted
/// to milliseconds when the expression is built.
#[derive(Debug, Clone, Copy)]
pub struct DateAddTransformer {
    /// `None` for `Add(TimeSpan)`.
    unit: Option<DateTimeUnit>,
}

impl DateAddTransformer {
    pub fn new(unit: DateTimeUnit) -> Self {
        Self { unit: Some(unit) }
    }

    pub fn time_span() -> Self {
        Self { unit: None }
    }
}

impl MethodCallTransformer for DateAddTransformer {
    fn transform(&self, mut call: MethodCall) -> CompileResult<SqlExpr> {
        call.check_argument_count(1)?;
        let date = call.take_object()?;
        let amount = call.take_argument(0)?;

        let Some(unit) = self.unit else {
            return match amount.constant_value() {
                Some(Value::TimeSpan(ms)) => Ok(date_add(
                    "millisecond",
                    SqlExpr::literal(*ms, ValueType::Int64),
                    date,
                )),
                _ => Err(call.unsupported("a constant TimeSpan argument")),
            };
        };

        let expr = match unit {
            DateTimeUnit::Years => date_add("year", amount, date),
            DateTimeUnit::Months => date_add("month", amount, date),
            DateTimeUnit::Ticks => date_add(
                "millisecond",
                SqlExpr::binary(
                    SqlBinaryOp::Divide,
                    amount,
                    SqlExpr::literal(10_000i64, ValueType::Int64),
                ),
                date,
            ),
            DateTimeUnit::Milliseconds => date_add("millisecond", amount, date),
            other => {
                let factor = other.milliseconds().unwrap_or(1);
                date_add(
                    "millisecond",
                    SqlExpr::binary(
                        SqlBinaryOp::Multiply,
                        amount,
                        SqlExpr::literal(factor, ValueType::Int64),
                    ),
                    date,
                )
            }
        };
        Ok(expr)
    }
}
