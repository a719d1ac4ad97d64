//! The `checkflow` binary.

fn main() {
    checkflow::cli::run();
}
