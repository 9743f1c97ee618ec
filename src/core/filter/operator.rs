use std::str::FromStr;

use strum_macros::Display;

use crate::core::registry::ScalarKind;

/// Comparison operators accepted in a filter leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Operator {
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "!=")]
    Neq,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">=")]
    Gte,
    #[strum(serialize = "<=")]
    Lte,
    #[strum(serialize = "LIKE")]
    Like,
    #[strum(serialize = "IN")]
    In,
    #[strum(serialize = "NOT IN")]
    NotIn,
    #[strum(serialize = "INCLUDES")]
    Includes,
    #[strum(serialize = "EXCLUDES")]
    Excludes,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Eq,
        Operator::Neq,
        Operator::Like,
        Operator::In,
        Operator::NotIn,
        Operator::Includes,
        Operator::Excludes,
    ];

    /// Name of the operator in the filter input.
    pub fn input_name(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Like => "like",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Includes => "includes",
            Operator::Excludes => "excludes",
        }
    }

    pub fn is_available_for(&self, kind: ScalarKind) -> bool {
        match self {
            Operator::Eq | Operator::Neq | Operator::In | Operator::NotIn => true,
            Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte => {
                kind.is_numeric() || kind.is_temporal() || kind.is_string_like()
            }
            Operator::Like => kind.is_string_like(),
            Operator::Includes | Operator::Excludes => kind.is_multi_value(),
        }
    }

    /// Operators a field of the given kind can be filtered with.
    pub fn available_for(kind: ScalarKind) -> Vec<Operator> {
        Operator::ALL
            .into_iter()
            .filter(|op| op.is_available_for(kind))
            .collect()
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.input_name() == s)
            .ok_or_else(|| format!("unknown operator `{}`", s))
    }
}

/// Boolean connectives of the expression tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum BoolOp {
    And,
    Or,
    Not,
}
