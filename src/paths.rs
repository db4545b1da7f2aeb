// Path helpers for file-set keys and asset names

use std::path::Path;
use sugar_path::SugarPath;

/// Key of `path` in a file set rooted at `root`, `/`-separated.
///
/// Returns an empty string when both name the same directory, and climbs with
/// `..` when `path` is outside `root`.
pub fn file_key(root: &Path, path: &Path) -> String {
    path.relative(root)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Extension of a file name including the leading dot, or `""` when there is none.
///
/// Dotfiles such as `.env` have no extension.
pub fn extname(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &base[idx..],
    }
}
