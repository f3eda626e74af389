//! Built-in grammars.
//!
//! Each grammar is an ordinary client of [`GrammarBuilder`](crate::GrammarBuilder):
//! it is built explicitly by its constructor and can be imported into other
//! grammars through [`ValueGrammar::grammar`].
//!
//! - [`IntegerGrammar`]: optional sign, binary (`0b`), octal (leading `0`),
//!   hexadecimal (`0x`) or decimal digits.
//! - [`FloatGrammar`]: sign, integer part, fraction, exponent, `nan` and `inf`.
//! - [`ExpressionGrammar`]: integer arithmetic with `+ - * /` and parentheses.

use std::fmt;
use std::sync::Arc;

use crate::{Grammar, GrammarError, RuleId, Token};

#[path = "grammars/expression.rs"]
mod expression;
#[path = "grammars/float.rs"]
mod float;
#[path = "grammars/integer.rs"]
mod integer;

#[cfg(test)]
#[path = "grammars/tests.rs"]
mod tests;

pub use expression::ExpressionGrammar;
pub use float::FloatGrammar;
pub use integer::IntegerGrammar;

/// A grammar whose matches denote a value.
pub trait ValueGrammar {
    type Value: fmt::Display;

    fn grammar(&self) -> &Arc<Grammar>;

    /// Reads the value of a token produced by this grammar's entry rule.
    ///
    /// `None` if the token does not denote a representable value.
    fn read(&self, text: &[u8], token: Token<'_>) -> Option<Self::Value>;

    /// Matches all of `text` and reads its value.
    fn parse(&self, text: &[u8]) -> Option<Self::Value> {
        let tree = self.grammar().match_all(text).ok()?;
        self.read(text, tree.root())
    }
}

/// Id of a rule a constructor just defined.
fn rule_id(grammar: &Grammar, name: &str) -> Result<RuleId, GrammarError> {
    grammar
        .rule_by_name(name)
        .map(|r| r.id())
        .ok_or_else(|| GrammarError::UndefinedRule { name: name.to_owned(), by: "value reader" })
}
