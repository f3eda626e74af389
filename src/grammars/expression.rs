use std::sync::Arc;

use super::{ValueGrammar, rule_id};
use crate::{Grammar, GrammarBuilder, GrammarError, RuleId, Token};

/// Four-function arithmetic over integers, evaluated in `f64`.
///
/// ```text
/// Sum     := Product (AddOp Product)*
/// Product := Factor (MulOp Factor)*
/// Factor  := Number | '(' Sum ')'
/// Number  := '-'? digit{1,20}
/// ```
#[derive(Debug, Clone)]
pub struct ExpressionGrammar {
    grammar: Arc<Grammar>,
    number: RuleId,
    sum: RuleId,
    product: RuleId,
}

impl ExpressionGrammar {
    pub fn new() -> Result<Self, GrammarError> {
        let b = GrammarBuilder::new("expression");

        b.define("Number", b.glue([b.optional(b.ch(b'-')), b.repeat(1..=20, b.range(b'0', b'9'))]));
        b.define(
            "Factor",
            b.choice([
                b.reference("Number"),
                b.glue([b.ch(b'('), b.reference("Sum"), b.expect("missing closing parenthesis", b.ch(b')'))]),
            ]),
        );
        b.define("MulOp", b.range_of(b"*/"));
        b.define("AddOp", b.range_of(b"+-"));
        let products = b.repeat(.., b.glue([b.reference("MulOp"), b.reference("Factor")]));
        b.define("Product", b.glue([b.reference("Factor"), products]));
        let sums = b.repeat(.., b.glue([b.reference("AddOp"), b.reference("Product")]));
        b.define("Sum", b.glue([b.reference("Product"), sums]));
        b.entry("Sum");

        let grammar = Arc::new(b.link()?);
        Ok(Self {
            number: rule_id(&grammar, "Number")?,
            sum: rule_id(&grammar, "Sum")?,
            product: rule_id(&grammar, "Product")?,
            grammar,
        })
    }

    fn eval(&self, text: &[u8], token: Token<'_>) -> Option<f64> {
        let rule = token.rule();
        if rule == self.number {
            return std::str::from_utf8(token.text(text)).ok()?.parse::<i64>().ok().map(|n| n as f64);
        }
        if rule != self.sum && rule != self.product {
            // Factor: a single Number or parenthesised Sum.
            return self.eval(text, token.first_child()?);
        }

        // Operands and operators alternate.
        let mut children = token.children();
        let mut acc = self.eval(text, children.next()?)?;
        while let Some(op) = children.next() {
            let rhs = self.eval(text, children.next()?)?;
            acc = match op.text(text) {
                b"+" => acc + rhs,
                b"-" => acc - rhs,
                b"*" => acc * rhs,
                b"/" => acc / rhs,
                _ => return None,
            };
        }
        Some(acc)
    }
}

impl ValueGrammar for ExpressionGrammar {
    type Value = f64;

    fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    fn read(&self, text: &[u8], token: Token<'_>) -> Option<f64> {
        if token.grammar() != self.grammar.id() {
            return None;
        }
        self.eval(text, token)
    }
}
