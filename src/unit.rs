//! Compilation units: the files of one package, parsed into a shared id space.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{CheckflowError, ErrorKind, ErrorReporting, PhaseContext, SourceContext};
use crate::rewrite::{rewrite, Rewritten};
use crate::syntax::parser::parse_file;
use crate::syntax::printer::print_file;
use crate::syntax::{File, NodeIds};

/// One input file, before parsing.
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub path: PathBuf,
    pub text: String,
    /// Marked files may contain `check` and `handle` and are rewritten.
    pub marked: bool,
}

impl SourceInput {
    pub fn marked(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            marked: true,
        }
    }

    pub fn plain(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            marked: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: SourceContext,
    /// Lexical rewrite of a marked file; `None` for plain files.
    pub rewritten: Option<Rewritten>,
    pub ast: File,
}

impl SourceFile {
    pub fn is_marked(&self) -> bool {
        self.rewritten.is_some()
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    /// Error context whose spans are in the coordinates of the parsed text.
    pub fn context(&self, phase: &str) -> PhaseContext {
        match &self.rewritten {
            Some(rw) => PhaseContext::rewritten(self.source.clone(), phase, rw.offsets.clone()),
            None => PhaseContext::new(self.source.clone(), phase),
        }
    }

    pub fn render(&self) -> String {
        print_file(&self.ast)
    }

    /// Path of the generated output: `x.go2` becomes `x.go`.
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.path.with_extension(extension)
    }
}

/// All files of one package.
#[derive(Debug, Clone)]
pub struct Unit {
    pub package: String,
    pub files: Vec<SourceFile>,
    pub ids: NodeIds,
}

impl Unit {
    /// Rewrites and parses every input. All files must declare the same package.
    pub fn assemble(inputs: Vec<SourceInput>) -> Result<Unit, CheckflowError> {
        let mut ids = NodeIds::new();
        let mut files: Vec<SourceFile> = Vec::with_capacity(inputs.len());
        let mut package: Option<String> = None;

        for input in inputs {
            let source = SourceContext::from_file(display_name(&input.path), input.text.clone());
            let (rewritten, ctx) = if input.marked {
                let lex_ctx = PhaseContext::new(source.clone(), "rewrite");
                let rw = rewrite(&input.text, &lex_ctx)?;
                let ctx = PhaseContext::rewritten(source.clone(), "parse", rw.offsets.clone());
                (Some(rw), ctx)
            } else {
                (None, PhaseContext::new(source.clone(), "parse"))
            };
            let text = rewritten.as_ref().map_or(input.text.as_str(), |rw| rw.text.as_str());
            let ast = parse_file(text, &mut ids, &ctx)?;

            match &package {
                None => package = Some(ast.package.name.clone()),
                Some(expected) if *expected != ast.package.name => {
                    return Err(ctx.report_at(
                        ErrorKind::MismatchedPackage {
                            expected: expected.clone(),
                            found: ast.package.name.clone(),
                        },
                        ast.package.span,
                    ));
                }
                Some(_) => {}
            }
            debug!(file = %source.name, marked = input.marked, "parsed");

            files.push(SourceFile {
                path: input.path,
                source,
                rewritten,
                ast,
            });
        }

        let package = match package {
            Some(package) => package,
            None => {
                let ctx = PhaseContext::new(SourceContext::fallback("no sources"), "discover");
                return Err(ctx.report(
                    ErrorKind::NoSources {
                        path: String::new(),
                    },
                    crate::errors::unspanned(),
                ));
            }
        };

        Ok(Unit {
            package,
            files,
            ids,
        })
    }

    /// A unit made of a single marked source.
    pub fn from_source(name: &str, text: &str) -> Result<Unit, CheckflowError> {
        Unit::assemble(vec![SourceInput::marked(name, text)])
    }

    pub fn marked_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(|f| f.is_marked())
    }
}

fn display_name(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mixed_packages() {
        let err = Unit::assemble(vec![
            SourceInput::marked("a.go2", "package a\n"),
            SourceInput::plain("b.go", "package b\n"),
        ])
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MismatchedPackage { .. }));
    }

    #[test]
    fn node_ids_are_shared_across_files() {
        let unit = Unit::assemble(vec![
            SourceInput::marked("a.go2", "package p\n"),
            SourceInput::plain("b.go", "package p\n"),
        ])
        .unwrap();
        assert_ne!(unit.files[0].ast.package.id, unit.files[1].ast.package.id);
        assert_eq!(unit.package, "p");
        assert_eq!(unit.marked_files().count(), 1);
    }
}
