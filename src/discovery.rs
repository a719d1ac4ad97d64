//! Finding the source files of one compilation unit.
//!
//! A directory is one package. Marked sources (`.go2`) are rewritten; plain
//! host files (`.go`) only take part in type checking. A `.go` file whose stem
//! matches a marked source is a previous output and is skipped.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::{io_error, Config};
use crate::errors::{unspanned, CheckflowError, ErrorKind, ErrorReporting, PhaseContext, SourceContext};
use crate::unit::SourceInput;

/// A file that belongs to the unit, before reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub path: PathBuf,
    pub marked: bool,
}

/// Lists the unit files directly inside `dir`, sorted by name.
pub fn discover_files(dir: &Path, config: &Config) -> Result<Vec<Discovered>, CheckflowError> {
    let dir_name = dir.display().to_string();
    let mut marked = Vec::new();
    let mut plain = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let error = e.into_io_error().unwrap_or_else(|| std::io::Error::other("directory loop"));
            io_error(&dir_name, &error)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if has_extension(&path, &config.source_extension) {
            marked.push(path);
        } else if has_extension(&path, &config.output_extension) {
            plain.push(path);
        }
    }

    let generated: HashSet<PathBuf> = marked
        .iter()
        .map(|p| p.with_extension(&config.output_extension))
        .collect();
    let mut files: Vec<Discovered> = marked
        .into_iter()
        .map(|path| Discovered { path, marked: true })
        .chain(
            plain
                .into_iter()
                .filter(|p| !generated.contains(p))
                .map(|path| Discovered { path, marked: false }),
        )
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    if files.iter().all(|f| !f.marked) {
        return Err(no_sources(&dir_name));
    }
    debug!(dir = %dir_name, files = files.len(), "discovered unit");
    Ok(files)
}

/// Reads every unit file of `dir`.
pub fn discover_unit(dir: &Path, config: &Config) -> Result<Vec<SourceInput>, CheckflowError> {
    discover_files(dir, config)?
        .into_iter()
        .map(|file| read_input(&file.path, file.marked))
        .collect()
}

pub fn read_input(path: &Path, marked: bool) -> Result<SourceInput, CheckflowError> {
    let text = fs::read_to_string(path).map_err(|e| io_error(&path.display().to_string(), &e))?;
    Ok(SourceInput {
        path: path.to_path_buf(),
        text,
        marked,
    })
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

fn no_sources(path: &str) -> CheckflowError {
    PhaseContext::new(SourceContext::fallback(path), "discover").report(
        ErrorKind::NoSources {
            path: path.to_string(),
        },
        unspanned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("checkflow-discovery-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn skips_generated_outputs() {
        let dir = scratch("generated");
        for name in ["b.go2", "b.go", "a.go", "notes.txt"] {
            fs::write(dir.join(name), "package main\n").unwrap();
        }
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/c.go2"), "package sub\n").unwrap();

        let files = discover_files(&dir, &Config::default()).unwrap();
        let names: Vec<(String, bool)> = files
            .iter()
            .map(|f| (f.path.file_name().unwrap().to_string_lossy().into_owned(), f.marked))
            .collect();
        assert_eq!(names, vec![("a.go".into(), false), ("b.go2".into(), true)]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn directory_without_marked_sources_is_an_error() {
        let dir = scratch("empty");
        fs::write(dir.join("a.go"), "package main\n").unwrap();
        let err = discover_files(&dir, &Config::default()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NoSources { .. }));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let err = discover_files(Path::new("/nonexistent/checkflow"), &Config::default()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Io { .. }));
    }
}
