//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;

/// Stylesheet for progress lines and the run summary. Every style is plain
/// until [`Styles::colorize`] runs.
#[derive(Default, Clone)]
pub struct Styles {
    /// Completed steps and stages (green)
    pub success: Style,
    /// Conditions flagged for review (yellow)
    pub warning: Style,
    /// Neutral notes such as the version line (blue)
    pub info: Style,
    /// Config keys
    pub dim: Style,
    /// Summary and config section titles (bold cyan)
    pub header: Style,
    /// Step arrows while a stage runs (cyan)
    pub step: Style,
    /// Stages that were skipped or disabled (dimmed)
    pub skipped: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.header = Style::new().bold().cyan();
        self.step = Style::new().cyan();
        self.skipped = Style::new().dimmed().italic();
    }
}
