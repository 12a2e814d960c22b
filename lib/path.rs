//! Normalized paths inside a remote document library.
//!
//! A [`RemotePath`] is an ordered list of non-empty segments. Leading, trailing and repeated
//! delimiters are insignificant, so `""`, `"/"` and `"///"` all parse to the library root.

use std::fmt;
use std::str::FromStr;

/// Segment delimiter used for parsing and rendering.
pub const DELIMITER: char = '/';

/// The bare "current directory" token some callers send for the root.
const CURRENT_DIR: &str = ".";

/// An immutable, normalized location in the remote library.
///
/// Segments never contain [`DELIMITER`] and are never empty. Structural composition
/// ([`child`](Self::child), [`child_path`](Self::child_path), [`parent`](Self::parent)) always
/// yields another normalized path, so callers never concatenate strings by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    /// The library root (zero segments).
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a single raw path string.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self::parse([raw])
    }

    /// Parse one or more raw strings, treating them as consecutive pieces of one path.
    ///
    /// Every input is split on [`DELIMITER`] and empty pieces are dropped. Never fails.
    #[must_use]
    pub fn parse<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segments = Vec::new();
        for piece in raw {
            push_normalized(&mut segments, piece.as_ref());
        }
        Self { segments }
    }

    /// Parse a command argument, mapping the bare `"."` token to the root.
    #[must_use]
    pub fn from_arg(raw: &str) -> Self {
        if raw == CURRENT_DIR {
            Self::root()
        } else {
            Self::new(raw)
        }
    }

    /// Number of segments.
    #[must_use]
    pub fn size(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Alias for [`is_empty`](Self::is_empty).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_empty()
    }

    /// The path without its last segment. The root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        match self.segments.split_last() {
            Some((_, init)) => Self {
                segments: init.to_vec(),
            },
            None => self.clone(),
        }
    }

    /// Append a segment.
    ///
    /// The argument is normalized like any other input: `child("a/b")` appends two segments and
    /// `child("")` returns an unchanged copy.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        push_normalized(&mut segments, segment);
        Self { segments }
    }

    /// Append every segment of `other`.
    #[must_use]
    pub fn child_path(&self, other: &Self) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + other.segments.len());
        segments.extend_from_slice(&self.segments);
        segments.extend_from_slice(&other.segments);
        Self { segments }
    }

    /// The last segment, or `""` for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Iterate over the segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// Render as segments joined by [`DELIMITER`], with no leading or trailing delimiter.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

fn push_normalized(segments: &mut Vec<String>, raw: &str) {
    segments.extend(
        raw.split(DELIMITER)
            .filter(|piece| !piece.is_empty())
            .map(str::to_owned),
    );
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "{DELIMITER}")?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for RemotePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for RemotePath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_path() {
        let path = RemotePath::new("a/b/c");
        assert_eq!(path.size(), 3);
        assert_eq!(path.parent().render(), "a/b");
        assert_eq!(path.name(), "c");
    }

    #[test]
    fn leading_and_trailing_delimiters_are_insignificant() {
        for raw in ["a", "/a", "a/", "/a/", "//a//"] {
            let path = RemotePath::new(raw);
            assert_eq!(path.size(), 1, "{raw:?}");
            assert_eq!(path.render(), "a", "{raw:?}");
        }
        assert_eq!(RemotePath::new("/a/b/c/").parent().render(), "a/b");
    }

    #[test]
    fn empty_inputs_are_root() {
        for raw in ["", "/", "///"] {
            let path = RemotePath::new(raw);
            assert_eq!(path.size(), 0);
            assert!(path.is_empty());
            assert_eq!(path.render(), "");
            assert_eq!(path.name(), "");
            assert_eq!(path.parent(), path, "root must be its own parent");
        }
    }

    #[test]
    fn round_trips_through_render() {
        let segments = ["docs", "reports", "2024", "q1.txt"];
        let joined = segments.join("/");
        let path = RemotePath::new(&joined);
        assert_eq!(path.render(), joined);
        assert_eq!(RemotePath::new(&path.render()), path);
        assert_eq!(path.segments().collect::<Vec<_>>(), segments);
    }

    #[test]
    fn parse_concatenates_pieces() {
        let path = RemotePath::parse(["docs/", "/sub", "", "file.txt"]);
        assert_eq!(path.render(), "docs/sub/file.txt");
    }

    #[test]
    fn child_composes_structurally() {
        let root = RemotePath::root();
        assert_eq!(root.child("a").render(), "a");
        assert_eq!(root.child("a").size(), 1);

        let docs = RemotePath::new("docs");
        assert_eq!(docs.child("a/b").size(), 3);
        assert_eq!(docs.child(""), docs);
        assert_eq!(
            docs.child_path(&RemotePath::new("/x/y/")).render(),
            "docs/x/y"
        );
    }

    #[test]
    fn single_segment_parent_is_root() {
        let path = RemotePath::new("report.txt");
        let parent = path.parent();
        assert!(parent.is_root());
        assert_eq!(parent.child("report.1.txt").render(), "report.1.txt");
    }

    #[test]
    fn current_dir_token_maps_to_root() {
        assert!(RemotePath::from_arg(".").is_root());
        assert_eq!(RemotePath::from_arg("./a").render(), "./a");
    }
}
