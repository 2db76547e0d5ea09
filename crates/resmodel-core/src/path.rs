//! # Canonical Field Paths
//!
//! A canonical path is the dot-joined sequence of named (non-embedded) field
//! names from a type's root to one of its fields, e.g.
//! `Properties.Version.ChannelGroup`.

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '.';

/// Join a parent path and a field name.
///
/// An empty parent yields the field name unchanged.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        let mut out = String::with_capacity(parent.len() + 1 + name.len());
        out.push_str(parent);
        out.push(PATH_SEPARATOR);
        out.push_str(name);
        out
    }
}

/// Iterate over the segments of a path. The empty path has no segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATOR).filter(|s| !s.is_empty())
}

/// Every proper ancestor of `path`, nearest first.
///
/// `ancestors("A.B.C")` yields `"A.B"` then `"A"`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.char_indices()
        .rev()
        .filter(|(_, c)| *c == PATH_SEPARATOR)
        .map(move |(i, _)| &path[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_empty_parent() {
        assert_eq!(join("", "Properties"), "Properties");
    }

    #[test]
    fn test_join_nested() {
        assert_eq!(join("Properties", "Version"), "Properties.Version");
        assert_eq!(
            join(&join("Properties", "Version"), "ChannelGroup"),
            "Properties.Version.ChannelGroup"
        );
    }

    #[test]
    fn test_segments() {
        let segs: Vec<&str> = segments("Properties.Version.ID").collect();
        assert_eq!(segs, vec!["Properties", "Version", "ID"]);
        assert_eq!(segments("").count(), 0);
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let anc: Vec<&str> = ancestors("A.B.C").collect();
        assert_eq!(anc, vec!["A.B", "A"]);
        assert_eq!(ancestors("A").count(), 0);
    }
}
