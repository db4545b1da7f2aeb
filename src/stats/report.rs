// Human-readable stats report

use super::{Stats, StatsOptions};
use crate::terminal::paint;
use console::Style;

/// Format a byte count the way bundler reports do (`812 bytes`, `1.21 kB`)
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["bytes", "kB", "MB", "GB"];

    if size < 1000 {
        return format!("{size} bytes");
    }

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    // three significant digits
    let decimals = if value >= 100.0 {
        0
    } else if value >= 10.0 {
        1
    } else {
        2
    };
    format!("{:.*} {}", decimals, value, UNITS[unit])
}

/// Render the multi-line report, without the tag prefix
pub fn render(stats: &Stats, options: &StatsOptions) -> String {
    let colors = options.colors;
    let bold = Style::new().bold();
    let green = Style::new().green().bold();
    let yellow = Style::new().yellow().bold();
    let red = Style::new().red().bold();

    let (view, hidden) = stats.filtered(options);
    let mut lines = Vec::new();

    lines.push(format!("Hash: {}", paint(&view.hash, &bold, colors)));
    lines.push(format!("Time: {}ms", paint(&view.time_ms.to_string(), &bold, colors)));

    if !view.assets.is_empty() {
        let rows: Vec<[String; 4]> = view
            .assets
            .iter()
            .map(|asset| {
                [
                    asset.name.clone(),
                    format_size(asset.size),
                    asset.chunk_names.join(", "),
                    if asset.emitted { "[emitted]".to_string() } else { String::new() },
                ]
            })
            .collect();

        let name_width = rows.iter().map(|r| r[0].len()).max().unwrap_or(0).max(5);
        let size_width = rows.iter().map(|r| r[1].len()).max().unwrap_or(0).max(4);
        let chunk_width = rows.iter().map(|r| r[2].len()).max().unwrap_or(0).max(11);

        lines.push(format!(
            "{:>name_width$}  {:>size_width$}  {:<chunk_width$}",
            "Asset", "Size", "Chunk Names"
        ));
        for [name, size, chunks, emitted] in rows {
            let name = format!("{name:>name_width$}");
            let line = format!(
                "{}  {size:>size_width$}  {chunks:<chunk_width$}  {}",
                paint(&name, &green, colors),
                paint(&emitted, &green, colors),
            );
            lines.push(line.trim_end().to_string());
        }
    }

    if options.chunks {
        for chunk in &view.chunks {
            let mut line = format!(
                "chunk {{{}}} {} {}",
                paint(&chunk.name, &yellow, colors),
                paint(&chunk.files.join(", "), &green, colors),
                format_size(chunk.size),
            );
            if chunk.entry {
                line.push_str(&format!(" {}", paint("[entry]", &yellow, colors)));
            }
            lines.push(line);

            for name in &chunk.modules {
                if let Some(module) = view.module(name) {
                    push_module(&mut lines, module, "    ", options);
                }
            }
        }
    }

    // Chunk listings already show every module
    if options.modules && !(options.chunks && options.chunk_modules) {
        for module in &view.modules {
            push_module(&mut lines, module, "", options);
        }
    }

    if hidden > 0 && (options.modules || options.chunk_modules) {
        lines.push(format!("    + {hidden} hidden modules"));
    }

    for warning in &view.warnings {
        lines.push(String::new());
        lines.push(paint(&format!("WARNING in {warning}"), &yellow, colors));
    }
    for error in &view.errors {
        lines.push(String::new());
        lines.push(paint(&format!("ERROR in {error}"), &red, colors));
    }

    lines.join("\n")
}

fn push_module(lines: &mut Vec<String>, module: &super::ModuleStats, indent: &str, options: &StatsOptions) {
    let colors = options.colors;
    let state = if module.cached { "" } else { " [built]" };
    lines.push(format!(
        "{indent}[{}] {} {{{}}}{}",
        paint(&module.name, &Style::new().bold(), colors),
        format_size(module.size),
        module.chunks.join(", "),
        paint(state, &Style::new().green().bold(), colors),
    ));

    if options.reasons {
        for reason in &module.reasons {
            lines.push(format!(
                "{indent}        {} {}",
                reason.kind,
                paint(&reason.module, &Style::new().cyan(), colors)
            ));
        }
    }
}
