use once_cell::sync::Lazy;
use proptest::prelude::*;

use super::*;
use crate::{GrammarBuilder, SyntaxError};

static INTEGER: Lazy<IntegerGrammar> = Lazy::new(|| IntegerGrammar::new().unwrap());
static FLOAT: Lazy<FloatGrammar> = Lazy::new(|| FloatGrammar::new().unwrap());
static EXPRESSION: Lazy<ExpressionGrammar> = Lazy::new(|| ExpressionGrammar::new().unwrap());

#[test]
fn unsigned_integer_is_a_single_token() {
    let tree = INTEGER.grammar().match_all("12345").unwrap();
    assert_eq!(tree.root().range(), 0..5);
    assert_eq!(tree.root().children().count(), 0);
    assert_eq!(INTEGER.read(b"12345", tree.root()), Some(12345));
}

#[test]
fn integer_radixes_and_signs() {
    let cases: &[(&str, i64)] = &[
        ("0", 0),
        ("-42", -42),
        ("+7", 7),
        ("0x1F", 31),
        ("-0xff", -255),
        ("017", 15),
        ("0b101", 5),
        ("-9223372036854775808", i64::MIN),
        ("9223372036854775807", i64::MAX),
    ];
    for (text, value) in cases {
        assert_eq!(INTEGER.parse(text.as_bytes()), Some(*value), "{text}");
    }
}

#[test]
fn integer_rejects_malformed_and_overflowing_input() {
    for text in ["12.5", "1e3", "09", "0x", "", "-", "9223372036854775808", "0b2"] {
        assert_eq!(INTEGER.parse(text.as_bytes()), None, "{text}");
    }
    assert!(INTEGER.grammar().match_at("12.5", 0).is_err());
}

#[test]
fn float_values() {
    let cases: &[(&str, f64)] = &[
        ("1.5", 1.5),
        ("-2.5e3", -2500.0),
        (".5", 0.5),
        ("1.", 1.0),
        ("+1E+2", 100.0),
        ("3e-2", 0.03),
        ("42", 42.0),
    ];
    for (text, value) in cases {
        assert_eq!(FLOAT.parse(text.as_bytes()), Some(*value), "{text}");
    }
}

#[test]
fn float_special_values() {
    assert!(FLOAT.parse(b"NaN").is_some_and(f64::is_nan));
    assert_eq!(FLOAT.parse(b"INF"), Some(f64::INFINITY));
    assert_eq!(FLOAT.parse(b"-infinite"), Some(f64::NEG_INFINITY));
    for text in ["nanx", "infinity", "1e", "1.2.3", "."] {
        assert_eq!(FLOAT.parse(text.as_bytes()), None, "{text}");
    }
}

#[test]
fn calculator_evaluates_with_precedence() {
    assert_eq!(EXPRESSION.parse(b"(-12+34)*(56-78)"), Some(-484.0));
    assert_eq!(EXPRESSION.parse(b"1+2*3"), Some(7.0));
    assert_eq!(EXPRESSION.parse(b"8/2/2"), Some(2.0));
    assert_eq!(EXPRESSION.parse(b"((7))"), Some(7.0));
}

#[test]
fn calculator_reports_missing_parenthesis() {
    let err = EXPRESSION.grammar().match_all("(1+2").unwrap_err();
    assert_eq!(err, SyntaxError::Expected { message: "missing closing parenthesis".into(), offset: 4 });

    let err = EXPRESSION.grammar().match_all("2*((3)").unwrap_err();
    assert_eq!(err.offset(), 6);
    assert_eq!(err.hint(), Some("missing closing parenthesis"));
}

#[test]
fn integer_grammar_can_be_imported() {
    let b = GrammarBuilder::new("list");
    b.import(INTEGER.grammar().clone());
    b.define(
        "List",
        b.glue([
            b.reference("integer::Literal"),
            b.repeat(.., b.glue([b.ch(b','), b.reference("integer::Literal")])),
        ]),
    );
    b.entry("List");
    let list = b.link().unwrap();

    let text = b"1,-2,0x10";
    let tree = list.match_all(text).unwrap();
    let values: Vec<_> = tree.root().children().map(|t| INTEGER.read(text, t)).collect();
    assert_eq!(values, [Some(1), Some(-2), Some(16)]);
    assert!(tree.root().children().all(|t| t.grammar() == INTEGER.grammar().id()));
    assert!(tree.dump(&list, text).contains("  Literal 2..4 \"-2\""));
}

proptest! {
    #[test]
    fn integer_decimal_round_trip(n in any::<i64>()) {
        prop_assert_eq!(INTEGER.parse(n.to_string().as_bytes()), Some(n));
    }

    #[test]
    fn integer_hexadecimal_round_trip(n in any::<u32>()) {
        prop_assert_eq!(INTEGER.parse(format!("0x{n:x}").as_bytes()), Some(i64::from(n)));
    }
}
