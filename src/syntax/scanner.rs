//! Token scanner for the host dialect.
//!
//! The scanner is deliberately shallow: it knows about identifiers, literals,
//! comments, operators and Go's automatic semicolon rule, and nothing about
//! expressions or statements. Both the lexical rewriter and the parser's
//! normalization step are built on it, so they agree on where every token and
//! every implicit semicolon sits.

use crate::errors::{CheckflowError, ErrorKind, ErrorReporting};
use crate::syntax::Span;

/// Keywords of the host grammar. `check` and `handle` are not among them:
/// they are ordinary identifiers to the host and only special to the rewriter.
pub const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

// Longest operators first so that prefix matching picks the right one.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "*", "/", "%",
    "&", "|", "^", "<", ">", "=", "!", "(", ")", "[", "]", "{", "}", ",", ";", ".", ":", "~",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Int,
    Float,
    Imag,
    Char,
    String,
    Operator,
    /// A semicolon; `auto` is set when it was inserted at a line end.
    Semicolon {
        auto: bool,
    },
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    pub fn is_semicolon(&self) -> bool {
        matches!(self.kind, TokenKind::Semicolon { .. })
    }

    /// Tokens that end an expression when met at zero delimiter depth.
    pub fn is_expr_end(&self) -> bool {
        match self.kind {
            TokenKind::Semicolon { .. } | TokenKind::Eof => true,
            TokenKind::Operator => matches!(self.text, "," | ":" | ")" | "]" | "}"),
            _ => false,
        }
    }
}

/// Failure raised by the scanner, located in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    Unterminated { literal: &'static str, span: Span },
    Illegal { found: char, span: Span },
}

impl ScanError {
    pub fn span(&self) -> Span {
        match self {
            ScanError::Unterminated { span, .. } | ScanError::Illegal { span, .. } => *span,
        }
    }

    /// Turn the failure into a pipeline error through `ctx`.
    pub fn report(self, ctx: &dyn ErrorReporting) -> CheckflowError {
        let span = self.span();
        let kind = match self {
            ScanError::Unterminated { literal, .. } => ErrorKind::UnterminatedLiteral {
                literal: literal.to_string(),
            },
            ScanError::Illegal { found, .. } => ErrorKind::IllegalCharacter { found },
        };
        ctx.report_at(kind, span)
    }
}

/// Parens, brackets and braces are counted independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelimCounter([i32; 3]);

impl DelimCounter {
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 3]
    }

    pub fn is_negative(&self) -> bool {
        self.0.iter().any(|n| *n < 0)
    }

    pub fn count(&mut self, token: &Token<'_>) {
        if token.kind != TokenKind::Operator {
            return;
        }
        match token.text {
            "(" => self.0[0] += 1,
            "[" => self.0[1] += 1,
            "{" => self.0[2] += 1,
            ")" => self.0[0] -= 1,
            "]" => self.0[1] -= 1,
            "}" => self.0[2] -= 1,
            _ => {}
        }
    }
}

pub struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    idx: usize,
    insert_semi: bool,
    /// Identifiers that never trigger semicolon insertion.
    quiet_idents: &'static [&'static str],
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            idx: 0,
            insert_semi: false,
            quiet_idents: &[],
        }
    }

    /// A scanner for marked sources, where `check` and `handle` behave like
    /// keywords that can never end a line.
    pub fn for_markers(src: &'a str) -> Self {
        Self {
            quiet_idents: &["check", "handle"],
            ..Self::new(src)
        }
    }

    /// Scan the whole input, including the final EOF token.
    pub fn scan_all(mut self) -> Result<Vec<Token<'a>>, ScanError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token<'a>, ScanError> {
        if let Some(semi) = self.skip_whitespace_and_comments()? {
            return Ok(semi);
        }

        let start = self.idx;
        if start >= self.bytes.len() {
            if self.insert_semi {
                self.insert_semi = false;
                return Ok(self.auto_semicolon(start));
            }
            return Ok(self.token(TokenKind::Eof, start));
        }

        let ch = self.peek_char();
        let kind = if is_ident_start(ch) {
            self.read_while(is_ident_continue);
            let text = &self.src[start..self.idx];
            if KEYWORDS.contains(&text) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            }
        } else if ch.is_ascii_digit()
            || (ch == '.' && self.peek_byte(1).map_or(false, |b| b.is_ascii_digit()))
        {
            self.read_number()
        } else {
            match ch {
                '"' => {
                    self.read_quoted(b'"', "string literal", start)?;
                    TokenKind::String
                }
                '\'' => {
                    self.read_quoted(b'\'', "rune literal", start)?;
                    TokenKind::Char
                }
                '`' => {
                    self.idx += 1;
                    match self.src[self.idx..].find('`') {
                        Some(end) => self.idx += end + 1,
                        None => {
                            return Err(ScanError::Unterminated {
                                literal: "raw string literal",
                                span: Span::new(start, self.bytes.len()),
                            })
                        }
                    }
                    TokenKind::String
                }
                _ => {
                    let rest = &self.src[self.idx..];
                    match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                        Some(op) => {
                            self.idx += op.len();
                            if *op == ";" {
                                TokenKind::Semicolon { auto: false }
                            } else {
                                TokenKind::Operator
                            }
                        }
                        None => {
                            return Err(ScanError::Illegal {
                                found: ch,
                                span: Span::new(start, start + ch.len_utf8()),
                            })
                        }
                    }
                }
            }
        };

        let tok = self.token(kind, start);
        self.insert_semi = self.can_insert_semi_after(&tok);
        Ok(tok)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token {
            kind,
            text: &self.src[start..self.idx],
            span: Span::new(start, self.idx),
        }
    }

    fn auto_semicolon(&self, at: usize) -> Token<'a> {
        Token {
            kind: TokenKind::Semicolon { auto: true },
            text: "",
            span: Span::new(at, at),
        }
    }

    /// Skips blanks and comments. Returns an automatic semicolon when a line
    /// end is crossed right after a token that allows one.
    fn skip_whitespace_and_comments(&mut self) -> Result<Option<Token<'a>>, ScanError> {
        loop {
            if self.idx >= self.bytes.len() {
                return Ok(None);
            }
            match self.bytes[self.idx] {
                b' ' | b'\t' | b'\r' => self.idx += 1,
                b'\n' => {
                    if self.insert_semi {
                        self.insert_semi = false;
                        let semi = self.auto_semicolon(self.idx);
                        self.idx += 1;
                        return Ok(Some(semi));
                    }
                    self.idx += 1;
                }
                b'/' if self.peek_byte(1) == Some(b'/') => {
                    let start = self.idx;
                    while self.idx < self.bytes.len() && self.bytes[self.idx] != b'\n' {
                        self.idx += 1;
                    }
                    if self.insert_semi {
                        self.insert_semi = false;
                        return Ok(Some(self.auto_semicolon(start)));
                    }
                }
                b'/' if self.peek_byte(1) == Some(b'*') => {
                    let start = self.idx;
                    let Some(end) = self.src[start + 2..].find("*/") else {
                        return Err(ScanError::Unterminated {
                            literal: "block comment",
                            span: Span::new(start, self.bytes.len()),
                        });
                    };
                    self.idx = start + 2 + end + 2;
                    let spans_lines = self.src[start..self.idx].contains('\n');
                    if spans_lines && self.insert_semi {
                        self.insert_semi = false;
                        return Ok(Some(self.auto_semicolon(start)));
                    }
                }
                _ => return Ok(None),
            }
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let mut kind = TokenKind::Int;
        let hex = self.bytes[self.idx] == b'0'
            && matches!(self.peek_byte(1), Some(b'x') | Some(b'X'));
        if hex {
            self.idx += 2;
            self.read_while(|c| c.is_ascii_hexdigit() || c == '_');
            return kind;
        }
        while self.idx < self.bytes.len() {
            let b = self.bytes[self.idx];
            match b {
                b'0'..=b'9' | b'_' => self.idx += 1,
                b'.' => {
                    kind = TokenKind::Float;
                    self.idx += 1;
                }
                b'e' | b'E' => {
                    kind = TokenKind::Float;
                    self.idx += 1;
                    if matches!(self.peek_byte(0), Some(b'+') | Some(b'-')) {
                        self.idx += 1;
                    }
                }
                _ => break,
            }
        }
        if self.peek_byte(0) == Some(b'i') {
            self.idx += 1;
            kind = TokenKind::Imag;
        }
        kind
    }

    fn read_quoted(&mut self, quote: u8, literal: &'static str, start: usize) -> Result<(), ScanError> {
        self.idx += 1;
        while self.idx < self.bytes.len() {
            match self.bytes[self.idx] {
                b'\\' => self.idx += 2,
                b'\n' => break,
                b if b == quote => {
                    self.idx += 1;
                    return Ok(());
                }
                _ => self.idx += 1,
            }
        }
        Err(ScanError::Unterminated {
            literal,
            span: Span::new(start, self.idx.min(self.bytes.len())),
        })
    }

    fn read_while<F>(&mut self, f: F)
    where
        F: Fn(char) -> bool,
    {
        while self.idx < self.bytes.len() {
            let ch = self.peek_char();
            if !f(ch) {
                break;
            }
            self.idx += ch.len_utf8();
        }
    }

    fn peek_char(&self) -> char {
        self.src[self.idx..].chars().next().unwrap_or('\0')
    }

    fn peek_byte(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.idx + ahead).copied()
    }

    fn can_insert_semi_after(&self, tok: &Token<'_>) -> bool {
        match tok.kind {
            TokenKind::Ident => !self.quiet_idents.contains(&tok.text),
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Imag
            | TokenKind::Char
            | TokenKind::String => true,
            TokenKind::Keyword => {
                matches!(tok.text, "break" | "continue" | "fallthrough" | "return")
            }
            TokenKind::Operator => matches!(tok.text, "++" | "--" | ")" | "]" | "}"),
            TokenKind::Semicolon { .. } | TokenKind::Eof => false,
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Produces a same-length copy of `src` in which comments are blanked and
/// every automatic semicolon is written out as `;`.
///
/// Byte offsets are preserved exactly, which keeps parser spans in the same
/// coordinate space as the marker map built by the lexical rewriter.
pub fn normalize(src: &str) -> Result<String, ScanError> {
    let mut out = src.as_bytes().to_vec();
    blank_comments(src, &mut out)?;

    let mut scanner = Scanner::new(src);
    loop {
        let tok = scanner.next_token()?;
        match tok.kind {
            TokenKind::Eof => break,
            TokenKind::Semicolon { auto: true } if tok.span.start < out.len() => {
                out[tok.span.start] = b';';
            }
            _ => {}
        }
    }
    // Only ASCII bytes were written over comment bytes or newlines.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn blank_comments(src: &str, out: &mut [u8]) -> Result<(), ScanError> {
    let mut scanner = Scanner::new(src);
    let mut prev_end = 0;
    loop {
        let tok = scanner.next_token()?;
        // Everything between two tokens is whitespace or comment.
        let gap_end = tok.span.start.max(prev_end);
        for b in &mut out[prev_end..gap_end] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
        if tok.kind == TokenKind::Eof {
            for b in &mut out[gap_end..] {
                if *b != b'\n' {
                    *b = b' ';
                }
            }
            break;
        }
        prev_end = tok.span.end.max(prev_end);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        Scanner::new(src)
            .scan_all()
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text.to_string()))
            .collect()
    }

    #[test]
    fn inserts_semicolon_at_line_end() {
        let toks = kinds("x := f()\ny");
        assert_eq!(toks[5].0, TokenKind::Semicolon { auto: true });
        assert_eq!(toks[6], (TokenKind::Ident, "y".to_string()));
    }

    #[test]
    fn inserts_semicolon_at_eof() {
        let toks = Scanner::new("return").scan_all().unwrap();
        assert_eq!(toks[1].kind, TokenKind::Semicolon { auto: true });
        assert_eq!(toks[1].span, Span::new(6, 6));
    }

    #[test]
    fn no_semicolon_after_open_brace() {
        let toks = kinds("if x {\n}");
        assert!(!toks[..4].iter().any(|(k, _)| matches!(k, TokenKind::Semicolon { .. })));
    }

    #[test]
    fn marker_keywords_never_end_a_line() {
        let toks = Scanner::for_markers("check\nf()").scan_all().unwrap();
        assert_eq!(toks[1].text, "f");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Scanner::new("\"abc").scan_all().unwrap_err();
        assert!(matches!(err, ScanError::Unterminated { .. }));
    }

    #[test]
    fn normalize_preserves_length() {
        let src = "x := 1 // one\ny := 2\n";
        let norm = normalize(src).unwrap();
        assert_eq!(norm.len(), src.len());
        assert_eq!(norm, "x := 1 ;     \ny := 2;");
    }
}
