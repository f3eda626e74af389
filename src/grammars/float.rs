use std::sync::Arc;

use super::{ValueGrammar, rule_id};
use crate::{Grammar, GrammarBuilder, GrammarError, RuleId, Token};

/// Floating point literals, plus `nan` and `inf`/`infinite` in any case.
///
/// ```text
/// Literal := Sign? (IntegerPart ('.' FractionPart?)? | '.' FractionPart)
///            ([eE] ExponentSign? Exponent)? !('.' | 'e' | 'E')
///          | (NaN | Infinite) !letter
/// ```
#[derive(Debug, Clone)]
pub struct FloatGrammar {
    grammar: Arc<Grammar>,
    rules: Rules,
}

#[derive(Debug, Clone, Copy)]
struct Rules {
    sign: RuleId,
    integer: RuleId,
    fraction: RuleId,
    exponent_sign: RuleId,
    exponent: RuleId,
    nan: RuleId,
    infinite: RuleId,
}

impl FloatGrammar {
    pub fn new() -> Result<Self, GrammarError> {
        let b = GrammarBuilder::new("float");
        let digit = || b.range(b'0', b'9');

        b.define("Sign", b.range_of(b"+-"));
        b.define("IntegerPart", b.repeat(1..=20, digit()));
        b.define("FractionPart", b.repeat(1..=20, digit()));
        b.define("ExponentSign", b.range_of(b"+-"));
        b.define("Exponent", b.repeat(1..=3, digit()));

        b.case_sensitive(false);
        b.define("NaN", b.string("nan"));
        b.define("Infinite", b.glue([b.optional(b.ch(b'-')), b.string("inf"), b.optional(b.string("inite"))]));
        b.case_sensitive(true);

        let mantissa = b.choice([
            b.glue([
                b.reference("IntegerPart"),
                b.optional(b.glue([b.ch(b'.'), b.optional(b.reference("FractionPart"))])),
            ]),
            b.glue([b.ch(b'.'), b.reference("FractionPart")]),
        ]);
        let exponent = b.glue([b.range_of(b"eE"), b.optional(b.reference("ExponentSign")), b.reference("Exponent")]);
        b.define(
            "Literal",
            b.choice([
                b.glue([b.optional(b.reference("Sign")), mantissa, b.optional(exponent), b.not(b.range_of(b".eE"))]),
                b.glue([
                    b.choice([b.reference("NaN"), b.reference("Infinite")]),
                    b.not(b.choice([b.range(b'a', b'z'), b.range(b'A', b'Z')])),
                ]),
            ]),
        );
        b.entry("Literal");

        let grammar = Arc::new(b.link()?);
        let rules = Rules {
            sign: rule_id(&grammar, "Sign")?,
            integer: rule_id(&grammar, "IntegerPart")?,
            fraction: rule_id(&grammar, "FractionPart")?,
            exponent_sign: rule_id(&grammar, "ExponentSign")?,
            exponent: rule_id(&grammar, "Exponent")?,
            nan: rule_id(&grammar, "NaN")?,
            infinite: rule_id(&grammar, "Infinite")?,
        };
        Ok(Self { grammar, rules })
    }
}

impl ValueGrammar for FloatGrammar {
    type Value = f64;

    fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    fn read(&self, text: &[u8], token: Token<'_>) -> Option<f64> {
        let r = &self.rules;
        let mut sign: &[u8] = b"";
        let mut integer: &[u8] = b"0";
        let mut fraction: &[u8] = b"0";
        let mut exponent_sign: &[u8] = b"";
        let mut exponent: &[u8] = b"0";

        for child in token.children().filter(|c| c.grammar() == self.grammar.id()) {
            let part = child.text(text);
            match child.rule() {
                id if id == r.nan => return Some(f64::NAN),
                id if id == r.infinite => {
                    return Some(if part.starts_with(b"-") { f64::NEG_INFINITY } else { f64::INFINITY });
                }
                id if id == r.sign => sign = part,
                id if id == r.integer => integer = part,
                id if id == r.fraction => fraction = part,
                id if id == r.exponent_sign => exponent_sign = part,
                id if id == r.exponent => exponent = part,
                _ => {}
            }
        }

        let mut normalized = Vec::with_capacity(token.len() + 8);
        for piece in [sign, integer, b".".as_slice(), fraction, b"e".as_slice(), exponent_sign, exponent] {
            normalized.extend_from_slice(piece);
        }
        std::str::from_utf8(&normalized).ok()?.parse().ok()
    }
}
