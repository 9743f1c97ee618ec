use std::fmt::{Display, Formatter};

use serde_json::Value;

use super::{render_literal, BoolOp, Operator};
use crate::core::registry::ScalarKind;
use crate::core::tree::BinaryTree;

/// `field OP literal`, with the literal already rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub literal: String,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: Operator, literal: impl Into<String>) -> Self {
        Self { field: field.into(), operator, literal: literal.into() }
    }

    /// Builds a predicate from a JSON value. `None` when the value is `null`.
    pub fn from_value(
        field: &str,
        operator: Operator,
        value: &Value,
        kind: Option<ScalarKind>,
    ) -> Result<Option<Self>, String> {
        Ok(render_literal(value, kind)?.map(|literal| Self::new(field, operator, literal)))
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.literal)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Op(BoolOp),
    Predicate(Predicate),
    /// A caller supplied WHERE fragment, emitted verbatim.
    Raw(String),
}

/// Boolean expression over predicates, rendered as WHERE clause text.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression(BinaryTree<Token>);

impl Expression {
    pub fn predicate(predicate: Predicate) -> Self {
        Expression(BinaryTree::leaf(Token::Predicate(predicate)))
    }

    pub fn raw(raw: impl Into<String>) -> Self {
        Expression(BinaryTree::leaf(Token::Raw(raw.into())))
    }

    pub fn and(self, other: Expression) -> Self {
        Expression(self.0.merge(Token::Op(BoolOp::And), other.0))
    }

    pub fn or(self, other: Expression) -> Self {
        Expression(self.0.merge(Token::Op(BoolOp::Or), other.0))
    }

    /// The operand goes to the left slot; the right slot stays empty.
    pub fn not(self) -> Self {
        Expression(BinaryTree::node(
            Token::Op(BoolOp::Not),
            self.0,
            BinaryTree::empty(),
        ))
    }

    pub fn tree(&self) -> &BinaryTree<Token> {
        &self.0
    }

    pub fn predicates(&self) -> Vec<&Predicate> {
        self.0
            .traverse()
            .into_iter()
            .filter_map(|token| match token {
                Token::Predicate(predicate) => Some(predicate),
                _ => None,
            })
            .collect()
    }

    pub fn to_soql(&self) -> String {
        render(&self.0, false)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_soql())
    }
}

fn render(tree: &BinaryTree<Token>, nested: bool) -> String {
    match tree {
        BinaryTree::Empty => String::new(),
        BinaryTree::Node { value, left, right } => match value {
            Token::Predicate(predicate) => format!("( {} )", predicate),
            Token::Raw(raw) if nested => format!("( {} )", raw),
            Token::Raw(raw) => raw.clone(),
            Token::Op(op) => {
                let parts = [render(right, true), op.to_string(), render(left, true)]
                    .into_iter()
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>();
                format!("( {} )", parts.join(" "))
            }
        },
    }
}
