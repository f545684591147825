use crate::span::Span;
use std::fmt;

/// Severity of a reported diagnostic. The scanner and compiler only ever
/// emit `Error`; `Warning` exists for symmetry with the teacher's handler
/// and is unused by the current front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Warning => write!(f, "Warning"),
            Level::Error => write!(f, "Error"),
        }
    }
}

/// Where in the offending token the message should point.
#[derive(Debug, Clone)]
pub enum Location {
    /// Points at a specific lexeme, e.g. `at 'foo'`.
    Token(String),
    /// Points at end-of-file.
    End,
    /// No location annotation (used for scanner error tokens, whose lexeme
    /// already *is* the message).
    None,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub span: Span,
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] {}", self.span.line, self.level)?;
        match &self.location {
            Location::Token(lexeme) => write!(f, " at '{lexeme}'")?,
            Location::End => write!(f, " at end")?,
            Location::None => {}
        }
        write!(f, ": {}", self.message)
    }
}

pub struct DiagnosticBuilder {
    level: Level,
    span: Span,
    location: Location,
    message: String,
}

impl DiagnosticBuilder {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        DiagnosticBuilder { level: Level::Error, span, location: Location::None, message: message.into() }
    }

    pub fn at_token(mut self, lexeme: impl Into<String>) -> Self {
        self.location = Location::Token(lexeme.into());
        self
    }

    pub fn at_end(mut self) -> Self {
        self.location = Location::End;
        self
    }

    pub fn build(self) -> Diagnostic {
        Diagnostic { level: self.level, span: self.span, location: self.location, message: self.message }
    }

    pub fn emit(self, handler: &mut Handler) {
        handler.report(self.build());
    }
}

/// Collects diagnostics for a single compile and tracks panic-mode recovery.
///
/// This mirrors clox's single global `Parser` (`hadError`/`panicMode`
/// fields), generalized into an explicit, per-compile value so nothing here
/// depends on process-wide state.
#[derive(Debug, Default)]
pub struct Handler {
    diagnostics: Vec<Diagnostic>,
    panic_mode: bool,
}

impl Handler {
    pub fn new() -> Self {
        Handler::default()
    }

    /// Record a diagnostic. While in panic mode, all but the first error in
    /// a syncable region are suppressed, exactly like clox's `errorAt`.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.diagnostics.push(diagnostic);
    }

    pub fn resynchronize(&mut self) {
        self.panic_mode = false;
    }

    pub fn in_panic_mode(&self) -> bool {
        self.panic_mode
    }

    pub fn had_error(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn print_to_stderr(&self) {
        for diag in &self.diagnostics {
            eprintln!("{diag}");
        }
    }
}
