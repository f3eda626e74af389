//! Human-readable renderings: a grammar as DSL text, a syntax tree as an
//! indented outline.

use std::fmt::{self, Write as _};

use crate::node::{MatchOptions, Node, RepeatMode};
use crate::{Grammar, NodeId, SyntaxTree, Token};

const EXCERPT: usize = 32;

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => writeln!(f, "SYNTAX({})", quoted(name.as_bytes()))?,
            None => writeln!(f, "SYNTAX(<anonymous>)")?,
        }
        for (alias, _) in self.imports() {
            writeln!(f, "IMPORT({})", quoted(alias.as_bytes()))?;
        }
        for rule in self.rules() {
            let verb = if rule.is_void() { "DEFINE_VOID" } else { "DEFINE" };
            write!(f, "{verb}({}, ", quoted(rule.name().as_bytes()))?;
            self.write_node(f, rule.entry)?;
            writeln!(f, ")")?;
        }
        write!(f, "ENTRY({})", quoted(self.entry().name().as_bytes()))
    }
}

impl Grammar {
    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId) -> fmt::Result {
        let node = self.node(id);
        let kind = node.kind();
        match node {
            Node::Char { ch, .. } | Node::Greater { ch, .. } => write!(f, "{kind}({})", byte(*ch)),
            Node::Any | Node::Boi | Node::Eoi | Node::Pass | Node::Fail => f.write_str(kind),
            Node::Range { min, max, .. } => write!(f, "{kind}({}, {})", byte(*min), byte(*max)),
            Node::OneOf { bytes, .. } => write!(f, "{kind}({})", quoted(bytes)),
            Node::Literal { bytes, options } if options.contains(MatchOptions::CASELESS) => {
                write!(f, "{kind}({}, caseless)", quoted(bytes))
            }
            Node::Literal { bytes, .. } => write!(f, "{kind}({})", quoted(bytes)),
            Node::Keyword { trie } => {
                let words: Vec<String> =
                    trie.words().into_iter().map(|(w, _)| String::from_utf8_lossy(&w).into_owned()).collect();
                let suffix = if trie.is_caseless() { ", caseless" } else { "" };
                write!(f, "{kind}({}{suffix})", quoted(words.join(" ").as_bytes()))
            }
            Node::Repeat { min, max, body, mode } => {
                match (mode, *min, *max) {
                    (RepeatMode::Plain, 0, 1) => f.write_str("OPTIONAL(")?,
                    (_, min, usize::MAX) => write!(f, "{kind}({min}, .., ")?,
                    (_, min, max) => write!(f, "{kind}({min}, {max}, ")?,
                }
                self.write_node(f, *body)?;
                f.write_str(")")
            }
            Node::Length { min, max, body } => {
                match *max {
                    usize::MAX => write!(f, "{kind}({min}, .., ")?,
                    max => write!(f, "{kind}({min}, {max}, ")?,
                }
                self.write_node(f, *body)?;
                f.write_str(")")
            }
            Node::Find { body } | Node::Ahead { body, .. } | Node::Behind { body, .. } => {
                write!(f, "{kind}(")?;
                self.write_node(f, *body)?;
                f.write_str(")")
            }
            Node::Choice { alternatives: list }
            | Node::LongestChoice { alternatives: list }
            | Node::Glue { elements: list } => {
                write!(f, "{kind}(")?;
                self.write_list(f, list)?;
                f.write_str(")")
            }
            Node::Expect { message, body } => {
                write!(f, "{kind}({}, ", quoted(message.as_bytes()))?;
                self.write_node(f, *body)?;
                f.write_str(")")
            }
            Node::Call { .. } => write!(f, "{kind}(<function>)"),
            Node::Set { flag, value } => write!(f, "{kind}({}, {value})", quoted(flag.name.as_bytes())),
            Node::If { flag, then, otherwise } => {
                write!(f, "{kind}({}, ", quoted(flag.name.as_bytes()))?;
                self.write_list(f, &[*then, *otherwise])?;
                f.write_str(")")
            }
            Node::Capture { capture, body } => {
                write!(f, "{kind}({}, ", quoted(capture.name.as_bytes()))?;
                self.write_node(f, *body)?;
                f.write_str(")")
            }
            Node::Replay { capture } => write!(f, "{kind}({})", quoted(capture.name.as_bytes())),
            Node::Ref { target } | Node::Inline { target } => write!(f, "{kind}({})", quoted(target.name.as_bytes())),
            Node::Previous { target, keyword } => {
                write!(f, "{kind}({}", quoted(target.name.as_bytes()))?;
                if let Some((word, _)) = keyword {
                    write!(f, ", {}", quoted(word.as_bytes()))?;
                }
                f.write_str(")")
            }
            Node::Context { target, inside, outside } => {
                write!(f, "{kind}({}, ", quoted(target.name.as_bytes()))?;
                self.write_list(f, &[*inside, *outside])?;
                f.write_str(")")
            }
            Node::Invoke { alias, coverage, .. } => {
                write!(f, "{kind}({}", quoted(alias.as_bytes()))?;
                if let Some(coverage) = coverage {
                    f.write_str(", ")?;
                    self.write_node(f, *coverage)?;
                }
                f.write_str(")")
            }
        }
    }

    fn write_list(&self, f: &mut fmt::Formatter<'_>, nodes: &[NodeId]) -> fmt::Result {
        for (k, node) in nodes.iter().enumerate() {
            if k > 0 {
                f.write_str(", ")?;
            }
            self.write_node(f, *node)?;
        }
        Ok(())
    }
}

impl SyntaxTree {
    /// Renders the tree one token per line, indented by depth:
    ///
    /// ```text
    /// Pair 0..9 "key=value"
    ///   Word 0..3 "key"
    ///   Word 4..9 "value"
    /// ```
    ///
    /// `grammar` names the rules (tokens of imported or invoked grammars
    /// included); `text` must be the matched input.
    pub fn dump(&self, grammar: &Grammar, text: &[u8]) -> String {
        let mut out = String::new();
        dump_token(&mut out, grammar, text, self.root(), 0);
        out
    }
}

fn dump_token(out: &mut String, grammar: &Grammar, text: &[u8], token: Token<'_>, depth: usize) {
    let name = grammar.rule_name(token.grammar(), token.rule()).unwrap_or("?");
    let _ = write!(out, "{:indent$}{name} {}..{}", "", token.start(), token.end(), indent = depth * 2);
    if let Some(word) = token.keyword().and_then(|k| grammar.scope_of(token.grammar())?.keyword(k)) {
        let _ = write!(out, " [{word}]");
    }
    let _ = writeln!(out, " {}", excerpt(token.text(text)));
    for child in token.children() {
        dump_token(out, grammar, text, child, depth + 1);
    }
}

/// Quoted, escaped, shortened to `EXCERPT` bytes.
pub(crate) fn excerpt(bytes: &[u8]) -> String {
    if bytes.len() <= EXCERPT {
        quoted(bytes)
    } else {
        format!("{}...", quoted(&bytes[..EXCERPT]))
    }
}

fn quoted(bytes: &[u8]) -> String {
    format!("\"{}\"", bytes.escape_ascii())
}

fn byte(b: u8) -> String {
    format!("'{}'", [b].escape_ascii())
}

#[cfg(test)]
mod tests {
    use crate::GrammarBuilder;

    #[test]
    fn renders_rules_in_dsl_form() {
        let b = GrammarBuilder::new("pair");
        b.define("Word", b.repeat(1.., b.range(b'a', b'z')));
        b.define_void("Sep", b.optional(b.range_of(b"=:")));
        b.define("Pair", b.glue([b.reference("Word"), b.inline("Sep"), b.expect("value", b.reference("Word"))]));
        b.entry("Pair");
        let g = b.link().unwrap();

        let text = g.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "SYNTAX(\"pair\")",
                "DEFINE(\"Word\", REPEAT(1, .., RANGE('a', 'z')))",
                "DEFINE_VOID(\"Sep\", OPTIONAL(RANGE(\"=:\")))",
                "DEFINE(\"Pair\", GLUE(REF(\"Word\"), INLINE(\"Sep\"), EXPECT(\"value\", REF(\"Word\"))))",
                "ENTRY(\"Pair\")",
            ]
        );
    }

    #[test]
    fn escapes_non_printable_bytes() {
        let b = GrammarBuilder::new("esc");
        b.define("Nl", b.glue([b.ch(b'\n'), b.string("a\"b"), b.other(b'\'')]));
        b.entry("Nl");
        let g = b.link().unwrap();
        assert!(g.to_string().contains(r#"GLUE(CHAR('\n'), STRING("a\"b"), OTHER('\''))"#));
    }

    #[test]
    fn dumps_token_outline() {
        let b = GrammarBuilder::new("pair");
        b.define("Key", b.keyword("key id"));
        b.define("Word", b.repeat(1.., b.range(b'a', b'z')));
        b.define("Pair", b.glue([b.reference("Key"), b.ch(b'='), b.reference("Word")]));
        b.entry("Pair");
        let g = b.link().unwrap();
        let tree = g.match_at("key=value", 0).unwrap();
        assert_eq!(
            tree.dump(&g, b"key=value"),
            "Pair 0..9 \"key=value\"\n  Key 0..3 [key] \"key\"\n  Word 4..9 \"value\"\n"
        );
    }
}
