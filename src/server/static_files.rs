//! URL to filesystem path resolution for static directories.

use std::path::{Path, PathBuf};

/// Resolve a request path under `root`, handling `index.html` for directories.
pub fn resolve(url_path: &str, root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url_path);

    // Reject suspicious patterns early
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    // Canonicalize to resolve symlinks and verify the path stays under root
    let canonical = root.join(&clean).canonicalize().ok()?;
    let root_canonical = root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    if canonical.is_dir() {
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }

    None
}

/// Decode, strip the query string, trim slashes.
fn normalize_url(url: &str) -> String {
    use percent_encoding::percent_decode_str;

    let path = url.split('?').next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}
