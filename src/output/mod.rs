//! Output formatting module
//!
//! Renders job results and unit listings for the terminal.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
