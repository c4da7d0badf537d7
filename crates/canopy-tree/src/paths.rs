//! `/`-separated tree paths.

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// Segments of `path`. The empty path has none.
pub fn split(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split(SEPARATOR).collect()
    }
}

/// Path of `name` inside `parent`.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

/// Everything before the last segment; empty for a top-level path.
pub fn parent_path(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(i) => &path[..i],
        None => "",
    }
}

/// The last segment of `path`.
pub fn node_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// `true` if `path` names an entry directly inside `parent`.
pub fn is_direct_child(parent: &str, path: &str) -> bool {
    !path.is_empty() && parent_path(path) == parent && !node_name(path).is_empty()
}
