// Error reporting for the Zinc compiler.
//
// The first line of every rendered diagnostic is machine-readable and
// stable ("Parse error at line N: …" / "Semantic error at line N: …"),
// as are the end-of-phase count lines; everything after the first line
// is human-oriented context.

use colored::Colorize;
use std::fmt;

/// Source location. Zinc diagnostics are line-oriented: the parser
/// attaches line numbers to AST nodes and columns are not tracked
/// through analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub file: String,
    pub line: u32,
}

impl Span {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Which compiler phase produced a diagnostic. Determines the stable
/// prefix wording and the end-of-phase count line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Semantic,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Parse => "Parse error",
            Phase::Semantic => "Semantic error",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Phase::Parse => "parse",
            Phase::Semantic => "semantic",
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,
    Warning,
    Note,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorLevel::Error => write!(f, "{}", "error".red().bold()),
            ErrorLevel::Warning => write!(f, "{}", "warning".yellow().bold()),
            ErrorLevel::Note => write!(f, "{}", "note".cyan().bold()),
        }
    }
}

/// Structured diagnostic message
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub phase: Phase,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(phase: Phase, message: String, span: Span) -> Self {
        Self {
            level: ErrorLevel::Error,
            phase,
            message,
            span,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    /// The stable first line: `Semantic error at line 7: message`.
    pub fn to_line(&self) -> String {
        format!(
            "{} at line {}: {}",
            self.phase.label(),
            self.span.line,
            self.message
        )
    }

    /// Full rendering: the stable line, then an optional source snippet
    /// and any notes.
    pub fn render(&self, source: Option<&str>) -> String {
        let mut output = String::new();
        output.push_str(&self.to_line());
        output.push('\n');

        if let Some(snippet) = source.and_then(|src| self.source_snippet(src)) {
            output.push_str(&snippet);
        }

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        output
    }

    /// Extract the offending source line with a gutter, Rust-style.
    fn source_snippet(&self, source: &str) -> Option<String> {
        if self.span.line == 0 {
            return None;
        }
        let line = source.lines().nth(self.span.line as usize - 1)?;

        let line_num_width = self.span.line.to_string().len().max(2);
        let mut snippet = String::new();
        snippet.push_str(&format!(
            " {} {}\n",
            " ".repeat(line_num_width).cyan(),
            "|".cyan().bold()
        ));
        snippet.push_str(&format!(
            " {} {} {}\n",
            format!("{:>width$}", self.span.line, width = line_num_width)
                .cyan()
                .bold(),
            "|".cyan().bold(),
            line
        ));
        snippet.push_str(&format!(
            " {} {}\n",
            " ".repeat(line_num_width).cyan(),
            "|".cyan().bold()
        ));
        Some(snippet)
    }
}

/// Collects diagnostics for one phase and renders the end-of-phase
/// count line the way downstream tooling expects it.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == ErrorLevel::Error)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// `N parse error(s)` / `N semantic error(s) encountered.`
    pub fn summary_line(&self, phase: Phase) -> String {
        match phase {
            Phase::Parse => format!("{} parse error(s)", self.error_count()),
            Phase::Semantic => {
                format!("{} semantic error(s) encountered.", self.error_count())
            }
        }
    }
}

/// Suggest the closest existing name for an unknown identifier, or
/// `None` when nothing is plausibly close. Used for "did you mean"
/// notes on undefined-variable and undefined-function errors.
pub fn suggest_name<'a, I>(unknown: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, &str)> = None;
    for cand in candidates {
        let dist = strsim::levenshtein(unknown, cand);
        if best.map_or(true, |(d, _)| dist < d) {
            best = Some((dist, cand));
        }
    }
    match best {
        // A suggestion further away than a third of the name is noise;
        // the +2 keeps transpositions (distance 2) in range for short names.
        Some((dist, cand)) if dist > 0 && dist <= (unknown.len() + 2) / 3 => {
            Some(cand.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_line_format() {
        let d = Diagnostic::error(
            Phase::Semantic,
            "undefined variable 'x'".to_string(),
            Span::new("main.zn", 7),
        );
        assert_eq!(d.to_line(), "Semantic error at line 7: undefined variable 'x'");
    }

    #[test]
    fn test_summary_lines() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::error(
            Phase::Parse,
            "x".to_string(),
            Span::unknown(),
        ));
        sink.push(Diagnostic::error(
            Phase::Parse,
            "y".to_string(),
            Span::unknown(),
        ));
        assert_eq!(sink.summary_line(Phase::Parse), "2 parse error(s)");
        assert_eq!(
            sink.summary_line(Phase::Semantic),
            "2 semantic error(s) encountered."
        );
    }

    #[test]
    fn test_suggest_name() {
        let names = ["count", "counter", "total"];
        assert_eq!(
            suggest_name("coutn", names.iter().copied()),
            Some("count".to_string())
        );
        assert_eq!(suggest_name("zzz", names.iter().copied()), None);
        // Identical names are not suggestions.
        assert_eq!(suggest_name("count", names.iter().copied()), None);
    }

    #[test]
    fn test_render_includes_snippet() {
        colored::control::set_override(false);
        let d = Diagnostic::error(
            Phase::Parse,
            "expected '}'".to_string(),
            Span::new("t.zn", 2),
        );
        let out = d.render(Some("func main() {\nlet x = (\n}"));
        assert!(out.starts_with("Parse error at line 2: expected '}'"));
        assert!(out.contains("let x = ("));
    }
}
