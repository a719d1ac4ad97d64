//! User-facing output of the CLI: expanded files, iteration traces and
//! rewriter dumps.

use std::io::Write;

use difference::{Changeset, Difference};
use serde_json::json;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::expand::{Snapshot, Summary};
use crate::rewrite::Rewritten;

/// Prints one expanded file under a coloured header.
pub fn print_expanded(name: &str, text: &str) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    print_header(&mut stdout, &format!("// {name}"));
    let _ = write!(stdout, "{text}");
}

/// Prints every iteration: the first in full, later ones as a diff against
/// the previous rendering of the same file.
pub fn print_trace(original: &[(String, String)], snapshots: &[Snapshot]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    for (name, text) in original {
        print_header(&mut stdout, &format!("--- Iteration 0: {name} ---"));
        let _ = writeln!(stdout, "{text}");
    }

    let mut last: Vec<(String, String)> = original.to_vec();
    for snapshot in snapshots {
        for (name, text) in &snapshot.files {
            print_header(
                &mut stdout,
                &format!(
                    "--- Iteration {}: {} ({} expanded, {} pending) ---",
                    snapshot.iteration, name, snapshot.expanded, snapshot.pending
                ),
            );
            let previous = last
                .iter()
                .find(|(n, _)| n == name)
                .map_or("", |(_, t)| t.as_str());
            let changeset = Changeset::new(previous, text, "\n");
            print_diff(&mut stdout, &changeset.diffs);
            let _ = writeln!(stdout);
        }
        last.clone_from(&snapshot.files);
    }
}

pub fn print_summary(summary: &Summary) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = writeln!(
        stderr,
        "expanded {} check(s), {} handler(s) in {} iteration(s)",
        summary.checks, summary.handlers, summary.iterations
    );
    let _ = stderr.reset();
}

/// Text or JSON dump of a lexical rewrite.
pub fn print_rewritten(rewritten: &Rewritten, as_json: bool) {
    if as_json {
        let value = json!({
            "text": rewritten.text,
            "markers": rewritten.markers,
            "edits": rewritten.edits,
        });
        match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("cannot encode rewrite: {e}"),
        }
        return;
    }

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = write!(stdout, "{}", rewritten.text);
    if !rewritten.text.ends_with('\n') {
        let _ = writeln!(stdout);
    }
    print_header(&mut stdout, "--- Markers ---");
    for offset in &rewritten.markers.checks {
        let _ = writeln!(stdout, "check  @{offset}");
    }
    for (offset, name) in &rewritten.markers.handles {
        let _ = writeln!(stdout, "handle @{offset} ({name})");
    }
}

fn print_header(stdout: &mut StandardStream, text: &str) {
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
    let _ = writeln!(stdout, "{text}");
    let _ = stdout.reset();
}

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(x) => {
                let _ = stdout.reset();
                for line in x.lines() {
                    let _ = writeln!(stdout, " {line}");
                }
            }
            Difference::Add(x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "+{line}");
                }
            }
            Difference::Rem(x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "-{line}");
                }
            }
        }
    }
    let _ = stdout.reset();
}
