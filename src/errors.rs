//! Checkflow Error Handling - Unified Encapsulated API
//!
//! Every stage of the pipeline (lexical rewrite, parse, collection, expansion,
//! fixed point) reports failures through the single [`CheckflowError`] type.
//! Errors are always created through an [`ErrorReporting`] context so that the
//! source text, phase name and error code are filled in consistently.

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;

use crate::rewrite::OffsetMap;
use crate::syntax::Span;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Source text and display name of one input file.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real file content
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a fallback when real source is unavailable
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: format!("// {}", context),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("default context")
    }
}

/// The single error type for the whole pipeline.
#[derive(Debug)]
pub struct CheckflowError {
    /// What went wrong
    pub kind: ErrorKind,
    /// Where it happened, in original-source coordinates
    pub source_info: SourceInfo,
    /// How to help
    pub diagnostic_info: DiagnosticInfo,
}

/// All failure modes, grouped by pipeline phase.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    // Lex errors - raised by the scanner and the lexical rewriter
    #[error("mismatched delimiters")]
    MismatchedDelimiters,
    #[error("unexpected end of input in the middle of {construct}")]
    UnexpectedEof { construct: String },
    #[error("{keyword} is not allowed inside a handler")]
    NestedInHandler { keyword: String },
    #[error("expected {expected} after 'handle'")]
    MalformedHandle { expected: String },
    #[error("check is not followed by an expression")]
    EmptyCheck,
    #[error("identifier '{name}' uses the reserved prefix '{prefix}'")]
    ReservedIdentifier { name: String, prefix: String },
    #[error("unterminated {literal}")]
    UnterminatedLiteral { literal: String },
    #[error("illegal character {found:?}")]
    IllegalCharacter { found: char },

    // Parse errors - raised by the host grammar
    #[error("syntax error: {message}")]
    Syntax { message: String },
    #[error("invalid {literal_type} '{value}'")]
    InvalidLiteral { literal_type: String, value: String },

    // Shape errors - marker positions that no longer line up with the tree
    #[error("{marker} marker does not land on {expected} (found {found})")]
    MarkerMisaligned {
        marker: String,
        expected: String,
        found: String,
    },
    #[error("{marker} marker at offset {offset} matched no syntax node")]
    MarkerUnclaimed { marker: String, offset: usize },

    // Semantic errors - raised while expanding markers
    #[error("check expression evaluates to no values")]
    NoResults,
    #[error("last value of check expression must be error, found {found}")]
    LastNotError { found: String },
    #[error("check expression's parent must be call or assignment to have multiple values")]
    MultiValueContext,
    #[error("more than one multi-value check in the same {context}")]
    MultipleMultiValue { context: String },
    #[error("check is not supported in {context}")]
    UnsupportedPosition { context: String },
    #[error("type {found} cannot be the type of a check expression")]
    UnsupportedType { found: String },

    // Convergence errors - the fixed point made no progress
    #[error("undefined type: {remaining} check expression(s) could not be resolved")]
    UndefinedType { remaining: usize },

    // Unit assembly errors - discovery and file I/O
    #[error("cannot read '{path}': {message}")]
    Io { path: String, message: String },
    #[error("no source files found in '{path}'")]
    NoSources { path: String },
    #[error("file has no package clause")]
    MissingPackage,
    #[error("mismatched package declarations: '{expected}' and '{found}'")]
    MismatchedPackage { expected: String, found: String },
    #[error("invalid stub file: {message}")]
    InvalidStubs { message: String },
}

/// Context-specific source information
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

/// Diagnostic enhancement data
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

/// Context-aware error creation - each context knows how to create appropriate errors
pub trait ErrorReporting {
    /// Create an error with context-appropriate enhancements
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> CheckflowError;

    /// Translate a span in rewritten-text coordinates to an original-source span.
    fn source_span(&self, span: Span) -> SourceSpan {
        to_source_span(span)
    }

    /// Report an error located by a syntax-tree span.
    fn report_at(&self, kind: ErrorKind, span: Span) -> CheckflowError {
        self.report(kind, self.source_span(span))
    }

    fn syntax_error(&self, message: &str, span: Span) -> CheckflowError {
        self.report_at(
            ErrorKind::Syntax {
                message: message.into(),
            },
            span,
        )
    }

    fn unsupported_position(&self, context: &str, span: Span) -> CheckflowError {
        self.report_at(
            ErrorKind::UnsupportedPosition {
                context: context.into(),
            },
            span,
        )
    }

    /// Creates an internal error - these indicate a broken invariant between
    /// pipeline stages, not a problem with the user's program.
    fn internal_error(&self, kind: ErrorKind, span: Span) -> CheckflowError {
        let mut error = self.report_at(kind, span);
        error.diagnostic_info.help =
            Some("This is an internal compiler error. Please report this as a bug.".into());
        error
    }
}

impl ErrorKind {
    /// Get the error category for test assertions
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MismatchedDelimiters
            | Self::UnexpectedEof { .. }
            | Self::NestedInHandler { .. }
            | Self::MalformedHandle { .. }
            | Self::EmptyCheck
            | Self::ReservedIdentifier { .. }
            | Self::UnterminatedLiteral { .. }
            | Self::IllegalCharacter { .. } => ErrorCategory::Lex,

            Self::Syntax { .. } | Self::InvalidLiteral { .. } | Self::MissingPackage => {
                ErrorCategory::Parse
            }

            Self::MarkerMisaligned { .. } | Self::MarkerUnclaimed { .. } => ErrorCategory::Shape,

            Self::NoResults
            | Self::LastNotError { .. }
            | Self::MultiValueContext
            | Self::MultipleMultiValue { .. }
            | Self::UnsupportedPosition { .. }
            | Self::UnsupportedType { .. } => ErrorCategory::Semantic,

            Self::UndefinedType { .. } => ErrorCategory::Convergence,

            Self::Io { .. }
            | Self::NoSources { .. }
            | Self::MismatchedPackage { .. }
            | Self::InvalidStubs { .. } => ErrorCategory::Io,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::MismatchedDelimiters => "mismatched_delimiters",
            Self::UnexpectedEof { .. } => "unexpected_eof",
            Self::NestedInHandler { .. } => "nested_in_handler",
            Self::MalformedHandle { .. } => "malformed_handle",
            Self::EmptyCheck => "empty_check",
            Self::ReservedIdentifier { .. } => "reserved_identifier",
            Self::UnterminatedLiteral { .. } => "unterminated_literal",
            Self::IllegalCharacter { .. } => "illegal_character",
            Self::Syntax { .. } => "syntax",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::MarkerMisaligned { .. } => "marker_misaligned",
            Self::MarkerUnclaimed { .. } => "marker_unclaimed",
            Self::NoResults => "no_results",
            Self::LastNotError { .. } => "last_not_error",
            Self::MultiValueContext => "multi_value_context",
            Self::MultipleMultiValue { .. } => "multiple_multi_value",
            Self::UnsupportedPosition { .. } => "unsupported_position",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::UndefinedType { .. } => "undefined_type",
            Self::Io { .. } => "io",
            Self::NoSources { .. } => "no_sources",
            Self::MissingPackage => "missing_package",
            Self::MismatchedPackage { .. } => "mismatched_package",
            Self::InvalidStubs { .. } => "invalid_stubs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lex,
    Parse,
    Shape,
    Semantic,
    Convergence,
    Io,
}

impl std::error::Error for CheckflowError {}

impl fmt::Display for CheckflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind.category() {
            ErrorCategory::Lex => "Lex error",
            ErrorCategory::Parse => "Parse error",
            ErrorCategory::Shape => "Internal error",
            ErrorCategory::Semantic => "Check error",
            ErrorCategory::Convergence => "Type error",
            ErrorCategory::Io => "Input error",
        };
        write!(f, "{}: {}", prefix, self.kind)
    }
}

impl Diagnostic for CheckflowError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

impl CheckflowError {
    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::MismatchedDelimiters => "unbalanced delimiter".into(),
            ErrorKind::UnexpectedEof { .. } => "input ends here".into(),
            ErrorKind::NestedInHandler { .. } => "not allowed here".into(),
            ErrorKind::MalformedHandle { .. } => "malformed handle".into(),
            ErrorKind::EmptyCheck => "empty check".into(),
            ErrorKind::ReservedIdentifier { .. } => "reserved identifier".into(),
            ErrorKind::UnterminatedLiteral { .. } => "literal starts here".into(),
            ErrorKind::IllegalCharacter { .. } => "illegal character".into(),
            ErrorKind::Syntax { .. } => "syntax error".into(),
            ErrorKind::InvalidLiteral { .. } => "invalid literal".into(),
            ErrorKind::MissingPackage => "expected `package <name>` first".into(),
            ErrorKind::MarkerMisaligned { .. } | ErrorKind::MarkerUnclaimed { .. } => {
                "marker position".into()
            }
            ErrorKind::NoResults
            | ErrorKind::LastNotError { .. }
            | ErrorKind::UnsupportedType { .. } => "checked expression".into(),
            ErrorKind::MultiValueContext | ErrorKind::MultipleMultiValue { .. } => {
                "multi-value check".into()
            }
            ErrorKind::UnsupportedPosition { .. } => "unsupported check".into(),
            ErrorKind::UndefinedType { .. } => "unresolved check".into(),
            ErrorKind::Io { .. }
            | ErrorKind::NoSources { .. }
            | ErrorKind::MismatchedPackage { .. }
            | ErrorKind::InvalidStubs { .. } => "here".into(),
        }
    }

    /// Attach (or replace) the help text of this error.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }

    /// The error category of this error's kind.
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

/// Creates a placeholder span for errors not tied to a specific source code
/// location, such as I/O errors.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Converts a syntax Span to a miette SourceSpan.
pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::from(span.start..span.end)
}

/// General-purpose error creation context: one source file in one phase.
///
/// When `offsets` is set, spans are interpreted in rewritten-text coordinates
/// and translated back to the original file before reporting.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub source: SourceContext,
    pub phase: String,
    pub offsets: Option<OffsetMap>,
}

impl PhaseContext {
    pub fn new(source: SourceContext, phase: impl Into<String>) -> Self {
        Self {
            source,
            phase: phase.into(),
            offsets: None,
        }
    }

    /// A context whose spans refer to the rewritten text described by `offsets`.
    pub fn rewritten(source: SourceContext, phase: impl Into<String>, offsets: OffsetMap) -> Self {
        Self {
            source,
            phase: phase.into(),
            offsets: Some(offsets),
        }
    }

    /// Same source and offsets, different phase name.
    pub fn for_phase(&self, phase: impl Into<String>) -> Self {
        Self {
            source: self.source.clone(),
            phase: phase.into(),
            offsets: self.offsets.clone(),
        }
    }
}

impl ErrorReporting for PhaseContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> CheckflowError {
        let error_code = format!("checkflow::{}::{}", self.phase, kind.code_suffix());

        CheckflowError {
            kind,
            source_info: SourceInfo {
                source: self.source.to_named_source(),
                primary_span: span,
                phase: self.phase.clone(),
            },
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
            },
        }
    }

    fn source_span(&self, span: Span) -> SourceSpan {
        match &self.offsets {
            Some(offsets) => {
                let start = offsets.to_source(span.start);
                let end = offsets.to_source(span.end).max(start);
                SourceSpan::from(start..end)
            }
            None => to_source_span(span),
        }
    }
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints a CheckflowError with full miette diagnostics
pub fn print_error(error: CheckflowError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_carry_phase_and_kind() {
        let ctx = PhaseContext::new(SourceContext::from_file("a.go2", "check"), "rewrite");
        let err = ctx.report(ErrorKind::EmptyCheck, unspanned());
        assert_eq!(err.diagnostic_info.error_code, "checkflow::rewrite::empty_check");
        assert_eq!(err.category(), ErrorCategory::Lex);
    }

    #[test]
    fn internal_errors_ask_for_a_bug_report() {
        let ctx = PhaseContext::new(SourceContext::default(), "collect");
        let err = ctx.internal_error(
            ErrorKind::MarkerUnclaimed {
                marker: "check".into(),
                offset: 3,
            },
            Span::default(),
        );
        assert!(err.diagnostic_info.help.unwrap().contains("internal"));
    }
}
