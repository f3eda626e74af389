use std::sync::Arc;

use super::{ValueGrammar, rule_id};
use crate::{Grammar, GrammarBuilder, GrammarError, RuleId, Token};

/// Integer literals.
///
/// ```text
/// Literal := Sign? (Binary | Octal | Hexadecimal | Decimal) !('.' | 'e' | 'E' | digit)
/// ```
///
/// The radix rules are inlined, so an unsigned literal is a single token.
#[derive(Debug, Clone)]
pub struct IntegerGrammar {
    grammar: Arc<Grammar>,
    sign: RuleId,
}

impl IntegerGrammar {
    pub fn new() -> Result<Self, GrammarError> {
        let b = GrammarBuilder::new("integer");
        let digit = || b.range(b'0', b'9');

        b.define("Sign", b.range_of(b"+-"));
        b.define("Binary", b.glue([b.string("0b"), b.repeat(1..=64, b.range_of(b"01"))]));
        b.define("Octal", b.glue([b.ch(b'0'), b.repeat(1..=22, b.range(b'0', b'7'))]));
        b.define(
            "Hexadecimal",
            b.glue([
                b.string("0x"),
                b.repeat(1..=16, b.choice([digit(), b.range(b'a', b'f'), b.range(b'A', b'F')])),
            ]),
        );
        b.define("Decimal", b.choice([b.glue([b.range(b'1', b'9'), b.repeat(0..=19, digit())]), b.ch(b'0')]));
        b.define(
            "Literal",
            b.glue([
                b.optional(b.reference("Sign")),
                b.choice([b.inline("Binary"), b.inline("Octal"), b.inline("Hexadecimal"), b.inline("Decimal")]),
                b.not(b.choice([b.range_of(b".eE"), digit()])),
            ]),
        );
        b.entry("Literal");

        let grammar = Arc::new(b.link()?);
        let sign = rule_id(&grammar, "Sign")?;
        Ok(Self { grammar, sign })
    }
}

impl ValueGrammar for IntegerGrammar {
    type Value = i64;

    fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// `None` on overflow of `i64`.
    fn read(&self, text: &[u8], token: Token<'_>) -> Option<i64> {
        let mut digits = token.text(text);
        let mut negative = false;
        let sign = token.first_child().filter(|c| c.grammar() == self.grammar.id() && c.rule() == self.sign);
        if let Some(sign) = sign {
            negative = sign.text(text) == b"-";
            digits = text.get(sign.end()..token.end())?;
        }

        let (radix, body) = if let Some(rest) = digits.strip_prefix(b"0b") {
            (2, rest)
        } else if let Some(rest) = digits.strip_prefix(b"0x") {
            (16, rest)
        } else if digits.len() > 1 && digits[0] == b'0' {
            (8, &digits[1..])
        } else {
            (10, digits)
        };
        let magnitude = u64::from_str_radix(std::str::from_utf8(body).ok()?, radix).ok()?;
        let value = if negative { -i128::from(magnitude) } else { i128::from(magnitude) };
        i64::try_from(value).ok()
    }
}
