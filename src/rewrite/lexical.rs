//! Token-level rewriter.
//!
//! ```text
//! check <expr>               =>  _go2check(<expr>)
//! handle <err> { <body> }    =>  if _go2handle { <body, err renamed to _go2handleErr> }
//! ```
//!
//! The rewriter never parses: a checked expression ends at the first
//! expression-ending token found at zero delimiter depth.

use tracing::trace;

use super::markers::{Edit, MarkerMap, OffsetMap};
use crate::errors::{CheckflowError, ErrorKind, ErrorReporting};
use crate::names::{
    is_reserved, CHECK_FUNC, CHECK_KEYWORD, HANDLE_BOOL, HANDLE_ERR, HANDLE_KEYWORD,
    RESERVED_PREFIX,
};
use crate::syntax::scanner::{DelimCounter, Scanner, Token, TokenKind};
use crate::syntax::Span;

/// Result of a lexical rewrite.
#[derive(Debug, Clone)]
pub struct Rewritten {
    pub text: String,
    pub markers: MarkerMap,
    pub offsets: OffsetMap,
    pub edits: Vec<Edit>,
}

/// Rewrites `source`. Errors are reported through `ctx` in source coordinates.
pub fn rewrite(source: &str, ctx: &dyn ErrorReporting) -> Result<Rewritten, CheckflowError> {
    let tokens = Scanner::for_markers(source)
        .scan_all()
        .map_err(|e| e.report(ctx))?;

    let mut rw = Rewriter {
        tokens,
        pos: 0,
        edits: Vec::new(),
        ctx,
    };
    rw.run()?;

    let Rewriter { edits, .. } = rw;
    let mut ordered: Vec<(usize, PendingEdit)> = edits.into_iter().enumerate().collect();
    // Stable on start, so an inner check's `)` stays ahead of the outer one.
    ordered.sort_by_key(|(i, e)| (e.edit.start, *i));
    let (plain, kinds): (Vec<Edit>, Vec<Option<Marker>>) =
        ordered.into_iter().map(|(_, e)| (e.edit, e.marker)).unzip();

    let (text, offsets, starts) = OffsetMap::apply(source, &plain);

    let mut markers = MarkerMap::default();
    for (marker, at) in kinds.into_iter().zip(starts) {
        match marker {
            Some(Marker::Check) => {
                markers.checks.insert(at);
            }
            Some(Marker::Handle(name)) => {
                markers.handles.insert(at, name);
            }
            None => {}
        }
    }
    trace!(
        checks = markers.checks.len(),
        handles = markers.handles.len(),
        "lexical rewrite done"
    );

    Ok(Rewritten {
        text,
        markers,
        offsets,
        edits: plain,
    })
}

#[derive(Debug, Clone)]
enum Marker {
    Check,
    Handle(String),
}

#[derive(Debug, Clone)]
struct PendingEdit {
    edit: Edit,
    marker: Option<Marker>,
}

struct Rewriter<'a, 'c> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    edits: Vec<PendingEdit>,
    ctx: &'c dyn ErrorReporting,
}

impl<'a, 'c> Rewriter<'a, 'c> {
    fn run(&mut self) -> Result<(), CheckflowError> {
        let mut depth = DelimCounter::default();
        // Depths at which an `if`, `for` or `switch` header is still open.
        let mut headers: Vec<DelimCounter> = Vec::new();
        loop {
            let tok = self.advance()?;
            match tok.kind {
                TokenKind::Eof => return Ok(()),
                _ if self.is_marker(&tok, CHECK_KEYWORD) => {
                    let in_header = headers.last() == Some(&depth);
                    self.check(tok, in_header)?;
                }
                _ if self.is_marker(&tok, HANDLE_KEYWORD) => self.handle(tok)?,
                TokenKind::Keyword if matches!(tok.text, "if" | "for" | "switch") => {
                    headers.push(depth);
                }
                _ => {
                    if tok.is_op("{") && headers.last() == Some(&depth) {
                        headers.pop();
                    }
                    depth.count(&tok);
                }
            }
        }
    }

    /// `check` up to the end of its expression, recursing into nested checks.
    /// In a statement header the expression also ends at the block's `{`.
    fn check(&mut self, keyword: Token<'a>, in_header: bool) -> Result<(), CheckflowError> {
        let first = self.peek();
        if first.is_expr_end() {
            return Err(self.ctx.report_at(ErrorKind::EmptyCheck, keyword.span));
        }
        self.push(
            Edit::replace(keyword.span.start, first.span.start, format!("{}(", CHECK_FUNC)),
            Some(Marker::Check),
        );

        let mut depth = DelimCounter::default();
        let mut last_end = keyword.span.end;
        loop {
            let tok = self.peek();
            if tok.kind == TokenKind::Eof {
                return Err(self.eof("check", tok.span));
            }
            if depth.is_zero() && (tok.is_expr_end() || (in_header && tok.is_op("{"))) {
                self.push(Edit::insert(last_end, ")"), None);
                return Ok(());
            }
            let tok = self.advance()?;
            if self.is_marker(&tok, CHECK_KEYWORD) {
                self.check(tok, in_header && depth.is_zero())?;
                last_end = self.tokens[self.pos - 1].span.end;
                continue;
            }
            depth.count(&tok);
            if depth.is_negative() {
                return Err(self.ctx.report_at(ErrorKind::MismatchedDelimiters, tok.span));
            }
            last_end = tok.span.end;
        }
    }

    /// `handle <ident> { ... }`, renaming the identifier inside the body.
    fn handle(&mut self, keyword: Token<'a>) -> Result<(), CheckflowError> {
        let name = self.advance()?;
        if name.kind != TokenKind::Ident {
            return Err(self.malformed("an identifier", name.span));
        }
        let brace = self.advance()?;
        if !brace.is_op("{") {
            return Err(self.malformed("'{' after the error identifier", brace.span));
        }
        self.push(
            Edit::replace(keyword.span.start, name.span.end, format!("if {}", HANDLE_BOOL)),
            Some(Marker::Handle(name.text.to_string())),
        );

        let mut depth = DelimCounter::default();
        depth.count(&brace);
        let mut after_dot = false;
        loop {
            let tok = self.advance()?;
            match tok.kind {
                TokenKind::Eof => return Err(self.eof("handle", tok.span)),
                TokenKind::Ident if tok.text == CHECK_KEYWORD || tok.text == HANDLE_KEYWORD => {
                    if !after_dot {
                        return Err(self.ctx.report_at(
                            ErrorKind::NestedInHandler {
                                keyword: tok.text.to_string(),
                            },
                            tok.span,
                        ));
                    }
                }
                TokenKind::Ident if tok.text == name.text && !after_dot => {
                    self.push(Edit::replace(tok.span.start, tok.span.end, HANDLE_ERR), None);
                }
                _ => {}
            }
            depth.count(&tok);
            if depth.is_negative() {
                return Err(self.ctx.report_at(ErrorKind::MismatchedDelimiters, tok.span));
            }
            if depth.is_zero() {
                return Ok(());
            }
            after_dot = tok.is_op(".");
        }
    }

    /// `check`/`handle` are markers unless used as a selector name.
    fn is_marker(&self, tok: &Token<'_>, keyword: &str) -> bool {
        if !tok.is_ident(keyword) {
            return false;
        }
        let prev = self.pos.checked_sub(2).map(|i| &self.tokens[i]);
        !prev.map_or(false, |p| p.is_op("."))
    }

    fn peek(&self) -> Token<'a> {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    /// Consumes one token, rejecting reserved identifiers.
    fn advance(&mut self) -> Result<Token<'a>, CheckflowError> {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        if tok.kind == TokenKind::Ident && is_reserved(tok.text) {
            return Err(self.ctx.report_at(
                ErrorKind::ReservedIdentifier {
                    name: tok.text.to_string(),
                    prefix: RESERVED_PREFIX.to_string(),
                },
                tok.span,
            ));
        }
        Ok(tok)
    }

    fn push(&mut self, edit: Edit, marker: Option<Marker>) {
        self.edits.push(PendingEdit { edit, marker });
    }

    fn eof(&self, construct: &str, span: Span) -> CheckflowError {
        self.ctx.report_at(
            ErrorKind::UnexpectedEof {
                construct: construct.to_string(),
            },
            span,
        )
    }

    fn malformed(&self, expected: &str, span: Span) -> CheckflowError {
        self.ctx.report_at(
            ErrorKind::MalformedHandle {
                expected: expected.to_string(),
            },
            span,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PhaseContext, SourceContext};

    fn run(src: &str) -> Result<Rewritten, CheckflowError> {
        let ctx = PhaseContext::new(SourceContext::from_file("test.go2", src), "rewrite");
        rewrite(src, &ctx)
    }

    fn text(src: &str) -> String {
        run(src).unwrap().text
    }

    #[test]
    fn wraps_checked_expressions() {
        assert_eq!(text("check nil"), "_go2check(nil)");
        assert_eq!(text("check add(1, 2)"), "_go2check(add(1, 2))");
        assert_eq!(
            text("check add(check add(1, 1), check add(1, 1))"),
            "_go2check(add(_go2check(add(1, 1)), _go2check(add(1, 1))))"
        );
    }

    #[test]
    fn records_check_offsets() {
        let out = run("check atoi(a) + check atoi(b)").unwrap();
        assert_eq!(out.text, "_go2check(atoi(a) + _go2check(atoi(b)))");
        let checks: Vec<usize> = out.markers.checks.iter().copied().collect();
        assert_eq!(checks, vec![0, 20]);
        assert_eq!(&out.text[20..29], "_go2check");
    }

    #[test]
    fn closes_before_trailing_comment() {
        assert_eq!(
            text("x := check f() // note\ny := 1"),
            "x := _go2check(f()) // note\ny := 1"
        );
    }

    #[test]
    fn closes_at_block_in_statement_headers() {
        assert_eq!(text("if check ok() {\n}"), "if _go2check(ok()) {\n}");
        assert_eq!(text("switch check k() {\n}"), "switch _go2check(k()) {\n}");
        assert_eq!(
            text("for _, v := range check s() {\n\t_ = v\n}"),
            "for _, v := range _go2check(s()) {\n\t_ = v\n}"
        );
        assert_eq!(
            text("if f(func() { check g() }) {\n}"),
            "if f(func() { _go2check(g()) }) {\n}"
        );
        assert_eq!(text("x := check T{1}"), "x := _go2check(T{1})");
    }

    #[test]
    fn rewrites_handle_blocks() {
        let out = run("handle err { print(err) \n\t os.Exit(1) \n }").unwrap();
        assert_eq!(
            out.text,
            "if _go2handle { print(_go2handleErr) \n\t os.Exit(1) \n }"
        );
        assert_eq!(out.markers.handles.get(&0).map(String::as_str), Some("err"));
    }

    #[test]
    fn handle_keeps_selector_names() {
        assert_eq!(
            text("handle e { log(e.e) }"),
            "if _go2handle { log(_go2handleErr.e) }"
        );
    }

    #[test]
    fn plain_text_is_untouched() {
        let src = "package main\n\nfunc f() {\n\tx.check()\n}\n";
        let out = run(src).unwrap();
        assert_eq!(out.text, src);
        assert!(out.markers.is_empty());
    }

    #[test]
    fn rejects_bad_input() {
        let kind = |src: &str| run(src).unwrap_err().kind;
        assert_eq!(kind("check )"), ErrorKind::EmptyCheck);
        assert_eq!(kind("f(check g(]))"), ErrorKind::MismatchedDelimiters);
        assert_eq!(kind("x := _go2check"), ErrorKind::ReservedIdentifier {
            name: "_go2check".into(),
            prefix: "_go2".into(),
        });
        assert!(matches!(kind("handle { }"), ErrorKind::MalformedHandle { .. }));
        assert!(matches!(kind("handle err ("), ErrorKind::MalformedHandle { .. }));
        assert!(matches!(kind("handle err { f("), ErrorKind::UnexpectedEof { .. }));
        assert!(matches!(
            kind("handle err { check f() }"),
            ErrorKind::NestedInHandler { .. }
        ));
    }
}
