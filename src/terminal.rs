// Tagged operator output

use console::{style, Style};
use parking_lot::Mutex;
use std::sync::Arc;

/// Label every operator-facing line starts with
pub const TAG: &str = "[sitepack]";

/// Destination for operator-facing lines
///
/// The adapter never prints directly, so hosts and tests can capture output.
pub trait Console: Send + Sync {
    fn print(&self, line: &str);
}

/// Writes lines to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

impl Console for Stdout {
    fn print(&self, line: &str) {
        println!("{line}");
    }
}

/// Keeps lines in memory
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines printed so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Lines containing `needle`
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.contains(needle))
            .cloned()
            .collect()
    }
}

impl Console for Recorder {
    fn print(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Whether the terminal on stdout supports colour
pub fn supports_color() -> bool {
    console::colors_enabled()
}

/// The tag, magenta when colours are on
pub fn tag(colors: bool) -> String {
    paint(TAG, &Style::new().magenta(), colors)
}

/// Apply `style` when `colors` is set, regardless of terminal detection
pub fn paint(text: &str, style: &Style, colors: bool) -> String {
    if colors {
        style.clone().force_styling(true).apply_to(text).to_string()
    } else {
        text.to_string()
    }
}

/// Start banner printed once per invocation
pub fn banner(colors: bool) -> String {
    format!("\n{} starting", tag(colors))
}

/// Line reporting one persisted file
pub fn writing(name: &str, colors: bool) -> String {
    let name = if colors {
        style(name).cyan().force_styling(true).to_string()
    } else {
        name.to_string()
    };
    format!("{} writing {}", tag(colors), name)
}

/// Prefix every line of `report` with the tag
pub fn prefix_lines(report: &str, colors: bool) -> String {
    let prefix = format!("\n{} ", tag(colors));
    let body = report.split('\n').collect::<Vec<_>>().join(&prefix);
    format!("{prefix}{body}")
}
