use std::ops::Range;
use std::sync::Arc;

use once_cell::sync::Lazy;
use proptest::prelude::*;
use regex::Regex;

use crate::{Grammar, GrammarBuilder, SyntaxError, Token};

fn build(name: &str, entry: &str, define: impl FnOnce(&GrammarBuilder)) -> Grammar {
    let b = GrammarBuilder::new(name);
    define(&b);
    b.entry(entry);
    b.link().unwrap()
}

fn rule_names<'t>(g: &Grammar, tokens: impl Iterator<Item = Token<'t>>) -> Vec<String> {
    tokens.map(|t| g.rule_name(t.grammar(), t.rule()).unwrap_or("?").to_owned()).collect()
}

fn assert_well_formed(token: Token<'_>) {
    let mut last_end = token.start();
    for child in token.children() {
        assert!(child.start() >= last_end, "siblings overlap: {:?} after {}", child.range(), last_end);
        assert!(child.end() <= token.end(), "child {:?} escapes parent {:?}", child.range(), token.range());
        assert_eq!(child.parent().map(|p| p.id()), Some(token.id()));
        last_end = child.end();
        assert_well_formed(child);
    }
}

// --- Quantifiers -----------------------------------------------------------------

#[test]
fn bounded_repeat() {
    let g = build("rep", "A", |b| b.define("A", b.repeat(2..=4, b.ch(b'a'))));
    assert_eq!(g.match_at("aaa", 0).unwrap().end(), 3);
    assert!(g.match_at("", 0).is_err());
    assert!(g.match_at("a", 0).is_err());
    assert_eq!(g.match_at("aaaaa", 0).unwrap().end(), 4);

    let terminated = build("rep", "A", |b| b.define("A", b.glue([b.repeat(2..=4, b.ch(b'a')), b.eoi()])));
    assert!(terminated.match_at("aaaaa", 0).is_err());
    assert!(terminated.match_at("aaaa", 0).is_ok());
}

#[test]
fn greedy_repeat_gives_back_for_what_follows() {
    let g = build("greedy", "A", |b| {
        b.define("A", b.glue([b.greedy_repeat(.., b.range(b'a', b'z')), b.string("z")]));
    });
    assert_eq!(g.match_at("abcz", 0).unwrap().end(), 4);
    assert_eq!(g.match_at("zzz", 0).unwrap().end(), 3);

    let plain = build("plain", "A", |b| b.define("A", b.glue([b.repeat(.., b.range(b'a', b'z')), b.string("z")])));
    assert!(plain.match_at("abcz", 0).is_err());
}

#[test]
fn greedy_repeat_falls_back_to_minimum() {
    let g = build("greedy", "A", |b| {
        b.define("A", b.glue([b.greedy_repeat(1.., b.ch(b'a')), b.expect("need b", b.ch(b'b'))]));
    });
    assert_eq!(g.match_at("aaa", 0).unwrap_err(), SyntaxError::Expected { message: "need b".into(), offset: 1 });
    assert_eq!(g.match_at("aab", 0).unwrap().end(), 3);
}

#[test]
fn lazy_repeat_stops_at_first_successor_match() {
    let g = build("lazy", "Tag", |b| {
        b.define("Tag", b.glue([b.ch(b'<'), b.lazy_repeat(.., b.any()), b.ch(b'>')]));
    });
    assert_eq!(g.match_at("<a><b>", 0).unwrap().end(), 3);
    assert_eq!(g.match_at("<>", 0).unwrap().end(), 2);
    assert!(g.match_at("<abc", 0).is_err());

    let alone = build("lazy", "A", |b| b.define("A", b.lazy_repeat(2..=5, b.any())));
    assert_eq!(alone.match_at("abcdef", 0).unwrap().end(), 2);
}

#[test]
fn lazy_repeat_fails_when_successor_never_matches() {
    let g = build("lazy", "A", |b| {
        b.define("A", b.glue([b.choice([b.lazy_repeat(.., b.ch(b'a')), b.ch(b'x')]), b.ch(b'y')]));
    });
    assert_eq!(g.match_at("xy", 0).unwrap().end(), 2);
    assert_eq!(g.match_at("aay", 0).unwrap().end(), 3);

    let bounded = build("lazy", "A", |b| {
        b.define("A", b.glue([b.lazy_repeat(..=1, b.ch(b'a')), b.ch(b'b')]));
    });
    assert_eq!(bounded.match_at("ab", 0).unwrap().end(), 2);
    assert_eq!(bounded.match_at("aab", 0).unwrap_err(), SyntaxError::NoMatch { offset: 0 });
}

#[test]
fn successor_chain_continues_through_capture_and_choice() {
    let g = build("chain", "A", |b| {
        let tail = b.choice([b.string("x"), b.string("yz")]);
        b.define("A", b.glue([b.capture("head", b.greedy_repeat(1.., b.any())), b.expect("tail", tail)]));
    });
    assert_eq!(g.match_at("abyz", 0).unwrap().end(), 4);
    assert_eq!(g.match_at("abxyz", 0).unwrap().end(), 5);
}

#[test]
#[should_panic(expected = "matched zero bytes")]
fn zero_width_repeat_body_panics() {
    let g = build("zero", "A", |b| b.define("A", b.repeat(.., b.pass())));
    let _ = g.match_at("abc", 0);
}

#[test]
fn length_bounds_the_consumed_width() {
    let g = build("len", "A", |b| b.define("A", b.length(2..=3, b.repeat(1.., b.range(b'0', b'9')))));
    assert_eq!(g.match_at("12", 0).unwrap().end(), 2);
    assert!(g.match_at("1", 0).is_err());
    assert!(g.match_at("1234", 0).is_err());
}

// --- Anchors and lookaround ------------------------------------------------------------

#[test]
fn lookaround_consumes_nothing() {
    let g = build("look", "Num", |b| {
        b.define(
            "Num",
            b.glue([b.not_behind(b.ch(b'-')), b.repeat(1.., b.range(b'0', b'9')), b.not(b.ch(b'%'))]),
        );
    });
    assert_eq!(g.match_at("+5", 1).unwrap().root().range(), 1..2);
    assert!(g.match_at("-5", 1).is_err());
    assert_eq!(g.match_at("5", 0).unwrap().end(), 1);
    assert!(g.match_at("50%", 0).is_err());

    let ahead = build("ahead", "A", |b| b.define("A", b.glue([b.ahead(b.string("ab")), b.any()])));
    assert_eq!(ahead.match_at("abc", 0).unwrap().end(), 1);
    assert!(ahead.match_at("acb", 0).is_err());
}

#[test]
fn anchors_and_find() {
    let g = build("find", "A", |b| b.define("A", b.glue([b.boi(), b.find(b.string("end")), b.eoi()])));
    assert_eq!(g.match_at("xx end", 0).unwrap().end(), 6);
    assert!(g.match_at("xx end", 1).is_err());
    assert!(g.match_at("xx end.", 0).is_err());
}

// --- Composition -------------------------------------------------------------------------

#[test]
fn failed_alternatives_leave_no_tokens() {
    let g = build("choice", "Top", |b| {
        b.define("Word", b.repeat(1.., b.range(b'a', b'z')));
        b.define(
            "Top",
            b.choice([
                b.glue([b.reference("Word"), b.ch(b'!')]),
                b.glue([b.reference("Word"), b.ch(b'?')]),
                b.reference("Word"),
            ]),
        );
    });
    let tree = g.match_at("ab?", 0).unwrap();
    assert_eq!(rule_names(&g, tree.root().children()), ["Word"]);
    let tree = g.match_at("ab.", 0).unwrap();
    assert_eq!(tree.root().children().count(), 1);
    assert_eq!(tree.end(), 2);
    assert!(tree.tree().recycled() > 0);
}

#[test]
fn longest_choice_prefers_furthest_then_earliest() {
    let g = build("longest", "Top", |b| {
        b.define("Short", b.string("ab"));
        b.define("Other", b.glue([b.any(), b.any()]));
        b.define("Long", b.string("abc"));
        b.define("Top", b.longest_choice([b.reference("Short"), b.reference("Other"), b.reference("Long")]));
    });
    let tree = g.match_at("abc", 0).unwrap();
    assert_eq!(rule_names(&g, tree.root().children()), ["Long"]);
    let tree = g.match_at("abx", 0).unwrap();
    assert_eq!(rule_names(&g, tree.root().children()), ["Short"]);
}

#[test]
fn expect_inside_choice_reports_its_hint() {
    let g = build("block", "Block", |b| {
        b.define(
            "Block",
            b.choice([
                b.glue([
                    b.ch(b'{'),
                    b.repeat(.., b.range(b'a', b'z')),
                    b.expect("missing closing brace", b.ch(b'}')),
                ]),
                b.glue([b.ch(b'{'), b.repeat(.., b.any())]),
            ]),
        );
    });
    assert_eq!(g.match_at("{abc}", 0).unwrap().end(), 5);
    let err = g.match_at("{abc", 0).unwrap_err();
    assert_eq!(err, SyntaxError::Expected { message: "missing closing brace".into(), offset: 4 });
    assert_eq!(err.hint(), Some("missing closing brace"));
    assert_eq!(err.offset(), 4);
}

#[test]
fn first_hint_wins_and_fails_the_match() {
    let g = build("pairs", "Pairs", |b| {
        b.define(
            "Pairs",
            b.repeat(.., b.glue([b.ch(b'a'), b.expect("b after a", b.ch(b'b')), b.expect("never", b.fail())])),
        );
    });
    assert_eq!(g.match_at("abac", 0).unwrap_err(), SyntaxError::Expected { message: "never".into(), offset: 2 });

    let g = build("pairs", "Pairs", |b| {
        b.define("Pairs", b.repeat(.., b.glue([b.ch(b'a'), b.expect("b", b.ch(b'b'))])));
    });
    assert_eq!(g.match_at("abab", 0).unwrap().end(), 4);
    assert_eq!(g.match_at("abac", 0).unwrap_err(), SyntaxError::Expected { message: "b".into(), offset: 3 });
}

// --- Match state ---------------------------------------------------------------------------

#[test]
fn back_reference_matches_the_same_quote() {
    let g = build("quote", "Quoted", |b| {
        b.define(
            "Quoted",
            b.glue([b.capture("q", b.range_of(b"'\"")), b.lazy_repeat(.., b.any()), b.replay("q")]),
        );
    });
    assert_eq!(g.match_at("'abc'", 0).unwrap().end(), 5);
    assert_eq!(g.match_at("\"abc\"", 0).unwrap().end(), 5);
    assert!(g.match_at("'abc\"", 0).is_err());
}

#[test]
fn replay_of_unset_capture_fails() {
    let g = build("replay", "A", |b| b.define("A", b.choice([b.replay("never"), b.string("x")])));
    assert_eq!(g.match_at("x", 0).unwrap().end(), 1);
}

#[test]
fn flags_are_scoped_per_grammar() {
    let a = build("A", "Check", |b| {
        b.define("Check", b.if_flag("x", b.pass(), b.fail()));
    });
    let a = Arc::new(a);

    let local = build("B", "Main", |b| {
        b.import(a.clone());
        b.define("Main", b.glue([b.set("x", true), b.reference("A::Check")]));
    });
    assert!(local.match_at("", 0).is_err());

    let qualified = build("B", "Main", |b| {
        b.import(a.clone());
        b.define("Main", b.glue([b.set("A::x", true), b.reference("A::Check")]));
    });
    assert!(qualified.match_at("", 0).is_ok());

    let mut state = local.new_state();
    state.set_flag("A::x", true).unwrap();
    assert!(local.match_with("", 0, &mut state).is_ok());
    assert!(state.flag("x").unwrap());
}

#[test]
fn callbacks_see_text_and_state() {
    let g = build("call", "Run", |b| {
        b.set("seen", false);
        b.define(
            "Run",
            b.call(|text, pos, state| {
                let first = *text.get(pos)?;
                state.set_flag("seen", true).ok()?;
                Some(pos + text[pos..].iter().take_while(|&&c| c == first).count())
            }),
        );
    });
    assert_eq!(g.match_at("aaab", 0).unwrap().end(), 3);
    let mut state = g.new_state();
    g.match_with("bb", 0, &mut state).unwrap();
    assert!(state.flag("seen").unwrap());
}

// --- Linkage ---------------------------------------------------------------------------------

#[test]
fn void_rules_splice_their_children() {
    let g = build("void", "Top", |b| {
        b.define("A", b.ch(b'a'));
        b.define("B", b.ch(b'b'));
        b.define_void("Pair", b.glue([b.reference("A"), b.reference("B")]));
        b.define("Top", b.repeat(1.., b.reference("Pair")));
    });
    let tree = g.match_at("abab", 0).unwrap();
    assert_eq!(rule_names(&g, tree.root().children()), ["A", "B", "A", "B"]);

    let top = build("void", "Pair", |b| {
        b.define("A", b.ch(b'a'));
        b.define_void("Pair", b.glue([b.reference("A"), b.reference("A")]));
    });
    let tree = top.match_at("aa", 0).unwrap();
    assert_eq!(top.rule_name(tree.root().grammar(), tree.root().rule()), Some("Pair"));
    assert_eq!(tree.root().children().count(), 2);
}

#[test]
fn inline_produces_no_token() {
    let g = build("inline", "Top", |b| {
        b.define("Digits", b.repeat(1.., b.range(b'0', b'9')));
        b.define("Sign", b.range_of(b"+-"));
        b.define("Top", b.glue([b.reference("Sign"), b.inline("Digits")]));
    });
    let tree = g.match_at("-42", 0).unwrap();
    assert_eq!(rule_names(&g, tree.root().children()), ["Sign"]);
    assert_eq!(tree.end(), 3);
}

#[test]
fn keywords_tag_tokens_and_previous_checks_them() {
    let g = build("stmt", "Stmt", |b| {
        b.define("Let", b.keyword("let var"));
        b.define("Name", b.glue([b.previous("Let", Some("let")), b.repeat(1.., b.range(b'a', b'z'))]));
        b.define("Stmt", b.glue([b.reference("Let"), b.reference("Name")]));
    });
    let tree = g.match_at("letx", 0).unwrap();
    let let_token = tree.root().first_child().unwrap();
    assert_eq!(let_token.keyword(), g.keyword_id("let"));
    assert_eq!(g.keyword(let_token.keyword().unwrap()), Some("let"));
    assert!(g.match_at("varx", 0).is_err());

    let any = build("stmt", "Stmt", |b| {
        b.define("Let", b.keyword("let var"));
        b.define("Name", b.glue([b.previous("Let", None), b.repeat(1.., b.range(b'a', b'z'))]));
        b.define("Stmt", b.glue([b.reference("Let"), b.reference("Name")]));
    });
    assert!(any.match_at("varx", 0).is_ok());
}

#[test]
fn failed_alternative_drops_its_keyword_tag() {
    let g = build("head", "Stmt", |b| {
        b.define("Head", b.choice([b.glue([b.keyword("let"), b.ch(b'!')]), b.repeat(1.., b.range(b'a', b'z'))]));
        b.define("Tail", b.glue([b.previous("Head", Some("let")), b.ch(b'=')]));
        b.define("Stmt", b.glue([b.reference("Head"), b.optional(b.reference("Tail"))]));
    });
    let tree = g.match_at("lets=", 0).unwrap();
    let head = tree.root().first_child().unwrap();
    assert_eq!(head.range(), 0..4);
    assert_eq!(head.keyword(), None);
    assert_eq!(tree.end(), 4);

    let tagged = g.match_at("let!=", 0).unwrap();
    assert_eq!(tagged.root().first_child().unwrap().keyword(), g.keyword_id("let"));
    assert_eq!(tagged.end(), 5);
}

#[test]
fn context_depends_on_enclosing_rule() {
    let g = build("ctx", "Top", |b| {
        b.define("List", b.glue([b.ch(b'['), b.reference("Item"), b.ch(b']')]));
        b.define("Item", b.context("List", b.range(b'0', b'9'), b.range(b'a', b'z')));
        b.define("Top", b.choice([b.reference("List"), b.reference("Item")]));
    });
    assert!(g.match_at("[1]", 0).is_ok());
    assert!(g.match_at("[a]", 0).is_err());
    assert!(g.match_at("a", 0).is_ok());
    assert!(g.match_at("1", 0).is_err());

    let top = build("ctx", "Item", |b| b.define("Item", b.context("Item", b.pass(), b.pass())));
    assert!(top.match_at("", 0).is_err());
}

#[test]
fn invoke_limits_the_other_grammar_to_the_coverage() {
    let digits = Arc::new(build("digits", "Number", |b| {
        b.define("Number", b.glue([b.repeat(1.., b.range(b'0', b'9')), b.eoi()]));
    }));

    let g = build("cells", "Cell", |b| {
        let coverage = b.repeat(1.., b.except_of(b";"));
        b.define("Cell", b.glue([b.invoke(digits.clone(), Some(coverage)), b.ch(b';')]));
    });
    let tree = g.match_at("12;", 0).unwrap();
    let number = tree.root().first_child().unwrap();
    assert_eq!(number.grammar(), digits.id());
    assert_eq!(number.range(), 0..2);
    assert_eq!(g.rule_name(number.grammar(), number.rule()), Some("Number"));
    assert!(g.match_at("1a;", 0).is_err());

    let unbounded = build("cells", "Cell", |b| {
        b.import(digits.clone());
        b.define("Cell", b.glue([b.invoke_alias("digits", None), b.ch(b';')]));
    });
    assert!(unbounded.match_at("12;", 0).is_err());
    assert!(unbounded.match_at("12", 0).is_err());
}

#[test]
fn case_insensitive_strings_and_keywords() {
    let g = build("sql", "Select", |b| {
        b.case_sensitive(false);
        b.define("Kw", b.keyword("from where"));
        b.define("Select", b.glue([b.string("select"), b.ch(b' '), b.reference("Kw")]));
    });
    let tree = g.match_at("SeLeCt FROM", 0).unwrap();
    assert_eq!(tree.root().first_child().unwrap().keyword(), g.keyword_id("from"));
    assert!(g.match_at("selectfrom", 0).is_err());
}

// --- Properties ------------------------------------------------------------------------------

fn document() -> Grammar {
    build("doc", "Doc", |b| {
        b.define("Word", b.repeat(1.., b.range(b'a', b'z')));
        b.define("Space", b.repeat(1.., b.ch(b' ')));
        b.define("Bang", b.glue([b.reference("Word"), b.ch(b'!')]));
        b.define("Other", b.any());
        let item = b.choice([b.reference("Bang"), b.reference("Word"), b.reference("Space"), b.reference("Other")]);
        b.define("Doc", b.repeat(.., item));
    })
}

fn ranges(tree: &crate::SyntaxTree) -> Vec<Range<usize>> {
    tree.tokens().map(|t| t.range()).collect()
}

static SHARED: Lazy<Grammar> = Lazy::new(document);

#[test]
fn linked_grammars_are_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Grammar>();

    let inputs = ["ab cd!", "x y z", "!!", "hello world!"];
    let expected: Vec<_> = inputs.iter().map(|s| ranges(&SHARED.match_at(s, 0).unwrap())).collect();
    std::thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|s| scope.spawn(move || ranges(&SHARED.match_at(s, 0).unwrap())))
            .collect();
        for (handle, expected) in handles.into_iter().zip(&expected) {
            assert_eq!(&handle.join().unwrap(), expected);
        }
    });
}

proptest! {
    #[test]
    fn token_ranges_nest(input in "[a-z !?]{0,40}") {
        let tree = document().match_at(&input, 0).unwrap();
        prop_assert_eq!(tree.root().range(), 0..input.len());
        assert_well_formed(tree.root());
    }

    #[test]
    fn failed_alternatives_do_not_change_the_tree(input in "[a-z ]{0,40}") {
        // Without '!' the Bang alternative always fails after producing a Word token.
        let plain = build("doc", "Doc", |b| {
            b.define("Word", b.repeat(1.., b.range(b'a', b'z')));
            b.define("Space", b.repeat(1.., b.ch(b' ')));
            b.define("Doc", b.repeat(.., b.choice([b.reference("Word"), b.reference("Space")])));
        });
        let with_bang = ranges(&document().match_at(&input, 0).unwrap());
        prop_assert_eq!(with_bang, ranges(&plain.match_at(&input, 0).unwrap()));
    }

    #[test]
    fn repeat_agrees_with_regex(input in "[ab]{0,8}") {
        let g = build("oracle", "A", |b| {
            b.define("A", b.glue([b.repeat(2..=4, b.ch(b'a')), b.repeat(.., b.ch(b'b')), b.eoi()]));
        });
        let re = Regex::new("^a{2,4}b*$").unwrap();
        prop_assert_eq!(g.match_at(&input, 0).is_ok(), re.is_match(&input));
    }
}
