//! CLI command implementations.

mod clear;
mod serve;
mod table;

pub use clear::{run_clear, ClearArgs};
pub use serve::{run_serve, ServeArgs};
pub use table::{run_table, TableArgs};

/// ANSI color codes for terminal output.
pub(crate) mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const YELLOW: &str = "\x1b[33m";
}

/// Check if terminal supports colors. Honors the NO_COLOR convention.
pub(crate) fn supports_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    atty::is(atty::Stream::Stdout)
}
