use syntagma::{Grammar, MatchRun, SyntaxError};

/// Colors keyed by what they mark in the report.
mod style {
    const RESET: &str = "\x1b[0m";
    const DIM: &str = "\x1b[2m";
    const HEADER: &str = "\x1b[1;36m";
    const SECTION: &str = "\x1b[90m";
    const RULE: &str = "\x1b[34m";
    const SPAN: &str = "\x1b[33m";
    const VALUE: &str = "\x1b[1;32m";
    const ERROR: &str = "\x1b[1;31m";
    const COUNT: &str = "\x1b[36m";

    pub struct Style {
        color: bool,
    }

    impl Style {
        pub fn new(color: bool) -> Self {
            Self { color }
        }

        pub fn header(&self, s: &str) -> String {
            self.wrap(s, HEADER)
        }

        pub fn section(&self, title: &str) -> String {
            self.wrap(&format!("━━━ {title} ━━━"), SECTION)
        }

        pub fn rule(&self, s: &str) -> String {
            self.wrap(s, RULE)
        }

        pub fn span(&self, s: &str) -> String {
            self.wrap(s, SPAN)
        }

        pub fn value(&self, s: &str) -> String {
            self.wrap(s, VALUE)
        }

        pub fn error(&self, s: &str) -> String {
            self.wrap(s, ERROR)
        }

        pub fn count(&self, n: impl std::fmt::Display) -> String {
            self.wrap(&n.to_string(), COUNT)
        }

        pub fn muted(&self, s: &str) -> String {
            self.wrap(s, DIM)
        }

        fn wrap(&self, s: &str, code: &str) -> String {
            if self.color { format!("{code}{s}{RESET}") } else { s.to_owned() }
        }
    }
}

pub struct Report<'a> {
    pub input: &'a str,
    pub grammar: &'a Grammar,
    pub run: &'a MatchRun,
    pub value: Option<&'a str>,
    pub explain: bool,
}

pub fn print_run(report: &Report<'_>, color: bool) {
    let style = style::Style::new(color);
    let name = report.grammar.name().unwrap_or("<anonymous>");
    println!("\n{}", style.header(&format!("⚙  Matching: \"{}\" with {name}", report.input)));

    if report.explain {
        println!("\n{}", style.section("Grammar"));
        for line in report.grammar.to_string().lines() {
            println!("  {}", style.muted(line));
        }
    }

    println!("\n{}", style.section("Token tree"));
    match &report.run.result {
        Ok(tree) => print_tree(&tree.dump(report.grammar, report.input.as_bytes()), &style),
        Err(_) => println!("  {}", style.muted("No tokens produced")),
    }

    println!("\n{}", style.section("Result"));
    match &report.run.result {
        Ok(tree) => println!(
            "  {} {} {}",
            style.value(report.value.unwrap_or("<no value>")),
            style.muted("│"),
            style.span(&format!("span {}..{}", tree.root().start(), tree.end())),
        ),
        Err(err) => print_error(report.input, err, &style),
    }

    let m = &report.run.metrics;
    println!("\n{}", style.section("Timing"));
    println!(
        "  Total: {}  │  Nodes: {}  │  Rules: {}  │  Rollbacks: {}",
        style.value(&format!("{:?}", m.total)),
        style.count(m.node_visits),
        style.count(m.rule_attempts),
        style.count(m.rollbacks),
    );
    println!(
        "  Tokens: {} {}  │  Probes: {}  │  Find attempts: {}",
        style.count(m.tokens_produced),
        style.muted(&format!("({} recycled)", m.tokens_recycled)),
        style.count(m.successor_probes),
        style.count(m.find_attempts),
    );
    println!();
}

fn print_tree(dump: &str, style: &style::Style) {
    for line in dump.lines() {
        let body = line.trim_start();
        let indent = &line[..line.len() - body.len()];
        let (name, rest) = body.split_once(' ').unwrap_or((body, ""));
        let (span, excerpt) = rest.split_once(' ').unwrap_or((rest, ""));
        println!("  {indent}{} {} {}", style.rule(name), style.span(span), style.muted(excerpt));
    }
}

fn print_error(input: &str, err: &SyntaxError, style: &style::Style) {
    let (line, column, source) = locate(input, err.offset());
    let message = match err {
        SyntaxError::Expected { message, .. } => format!("expected: {message}"),
        SyntaxError::NoMatch { .. } => "no match".to_owned(),
    };
    println!(
        "  {} {}",
        style.error(&message),
        style.muted(&format!("at {line}:{column} (offset {})", err.offset())),
    );
    println!("    {source}");
    println!("    {:width$}{}", "", style.error("^"), width = column - 1);
}

/// 1-based line and column of `offset`, plus the text of that line.
fn locate(input: &str, offset: usize) -> (usize, usize, &str) {
    let offset = offset.min(input.len());
    let before = &input.as_bytes()[..offset];
    let line_start = before.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_end = input[line_start..].find('\n').map_or(input.len(), |i| line_start + i);
    let source = input.get(line_start..line_end).unwrap_or("");
    (line, offset - line_start + 1, source)
}
