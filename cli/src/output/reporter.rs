//! `TerminalReporter`: prints stage progress and keeps every warning raised
//! during a run so the summary can repeat them.

use std::cell::RefCell;

use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Progress lines on stdout, indented under the stage banner.
///
/// Warnings are recorded even when `ctx.quiet` suppresses printing, so a
/// `--json` run still reports them.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    warnings: RefCell<Vec<String>>,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            warnings: RefCell::default(),
        }
    }

    /// Warnings in the order they were raised.
    #[must_use]
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings.into_inner()
    }

    fn line(&self, marker: &str, style: owo_colors::Style, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", marker.style(style));
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.line("→", self.ctx.styles.step, message);
    }

    fn success(&self, message: &str) {
        self.line("✓", self.ctx.styles.success, message);
    }

    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
        self.line("!", self.ctx.styles.warning, message);
    }
}
