//! Run configuration, built from command-line arguments.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::errors::{unspanned, CheckflowError, ErrorKind, ErrorReporting, PhaseContext, SourceContext};
use crate::types::StubSet;

/// Where expanded files go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// `<stem>.<output_extension>` beside each marked source.
    #[default]
    Write,
    Stdout,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Extension of marked sources.
    pub source_extension: String,
    /// Extension of plain host sources and of generated output.
    pub output_extension: String,
    /// Extra stub files, merged over the builtin stubs in order.
    pub stub_files: Vec<PathBuf>,
    pub output: OutputMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_extension: "go2".into(),
            output_extension: "go".into(),
            stub_files: Vec::new(),
            output: OutputMode::Write,
        }
    }
}

impl Config {
    pub fn with_stubs(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.stub_files.extend(files);
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// The builtin stubs with every configured stub file merged on top.
    pub fn load_stubs(&self) -> Result<StubSet, CheckflowError> {
        let mut stubs = StubSet::builtin()?;
        for path in &self.stub_files {
            let name = path.display().to_string();
            let text = fs::read_to_string(path).map_err(|e| io_error(&name, &e))?;
            stubs.merge(StubSet::from_json(&text, &name)?);
            debug!(file = %name, "loaded stubs");
        }
        Ok(stubs)
    }
}

pub(crate) fn io_error(path: &str, error: &std::io::Error) -> CheckflowError {
    PhaseContext::new(SourceContext::fallback(path), "io").report(
        ErrorKind::Io {
            path: path.to_string(),
            message: error.to_string(),
        },
        unspanned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pair_go2_with_go() {
        let config = Config::default();
        assert_eq!(config.source_extension, "go2");
        assert_eq!(config.output_extension, "go");
        assert_eq!(config.output, OutputMode::Write);
    }

    #[test]
    fn missing_stub_file_is_an_io_error() {
        let config = Config::default().with_stubs([PathBuf::from("/nonexistent/stubs.json")]);
        let err = config.load_stubs().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Io { .. }));
    }

    #[test]
    fn stub_files_extend_builtin_packages() {
        let dir = std::env::temp_dir().join(format!("checkflow-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stubs.json");
        fs::write(&path, r#"{ "example.com/db": { "funcs": { "Open": "func(dsn string) error" } } }"#).unwrap();

        let stubs = Config::default().with_stubs([path]).load_stubs().unwrap();
        assert!(stubs.package("example.com/db").is_some());
        assert!(stubs.package("os").is_some());
        let _ = fs::remove_dir_all(&dir);
    }
}
