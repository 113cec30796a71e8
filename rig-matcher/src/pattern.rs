//! Compiled glob patterns.

use std::fmt;
use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use smallvec::SmallVec;

use crate::Error;

/// How deep below the root a [`Pattern`] can possibly match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Matches at most this many path segments deep.
    Bounded(usize),
    /// Contains a `**`, anything below the root may match.
    Unbounded,
}

impl Depth {
    fn max(self, other: Depth) -> Depth {
        match (self, other) {
            (Depth::Bounded(a), Depth::Bounded(b)) => Depth::Bounded(a.max(b)),
            _ => Depth::Unbounded,
        }
    }
}

/// One or more glob patterns, matched against paths relative to a root directory.
///
/// Grammar: `*` matches any run of characters within one path segment, `**` matches zero or
/// more whole segments, `?`, `[...]` and `{a,b}` work as usual, everything else is literal.
#[derive(Clone)]
pub struct Pattern {
    raw: SmallVec<[String; 1]>,
    set: GlobSet,
    depth: Depth,
}

impl Pattern {
    /// Compile a single glob pattern.
    ///
    /// # Errors
    ///
    /// * If `pattern` is empty, absolute, or escapes the root with `..`.
    /// * If `pattern` is malformed, e.g. `a**` or an unclosed `[`.
    pub fn new(pattern: &str) -> Result<Self, Error> {
        Pattern::any_of([pattern])
    }

    /// Compile a set of patterns, a path matches if any one of them does.
    ///
    /// # Errors
    ///
    /// * If no patterns are provided.
    /// * If any single pattern is invalid, see [`Pattern::new`].
    pub fn any_of<I, S>(patterns: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut raw = SmallVec::new();
        let mut depth = Depth::Bounded(0);

        for pattern in patterns {
            let pattern = pattern.as_ref();
            validate(pattern)?;

            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map_err(|err| Error::InvalidGlobPattern {
                    pattern: pattern.to_string(),
                    reason: err.kind().to_string(),
                })?;
            builder.add(glob);

            depth = depth.max(pattern_depth(pattern));
            raw.push(pattern.to_string());
        }

        if raw.is_empty() {
            return Err(Error::InvalidGlobPattern {
                pattern: String::new(),
                reason: "no patterns provided".to_string(),
            });
        }

        let set = builder.build().map_err(|err| Error::InvalidGlobPattern {
            pattern: raw.join(", "),
            reason: err.kind().to_string(),
        })?;

        Ok(Pattern { raw, set, depth })
    }

    /// Returns if `relative` (a path relative to the match root) matches this pattern.
    pub fn is_match<P: AsRef<Path>>(&self, relative: P) -> bool {
        self.set.is_match(relative.as_ref())
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("patterns", &self.raw)
            .field("depth", &self.depth)
            .finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw.join(", "))
    }
}

/// Checks `globset` doesn't do for us.
fn validate(pattern: &str) -> Result<(), Error> {
    let invalid = |reason: &str| Error::InvalidGlobPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if pattern.is_empty() {
        return Err(invalid("pattern is empty"));
    }
    if pattern.starts_with('/') || Path::new(pattern).is_absolute() {
        return Err(invalid("pattern must be relative to the root"));
    }
    if pattern.split('/').any(|segment| segment == "..") {
        return Err(invalid("pattern must not escape the root with '..'"));
    }
    if pattern.split('/').any(str::is_empty) {
        return Err(invalid("pattern contains an empty path segment"));
    }

    Ok(())
}

fn pattern_depth(pattern: &str) -> Depth {
    let segments = pattern.split('/');
    let mut count = 0;
    for segment in segments {
        if segment == "**" {
            return Depth::Unbounded;
        }
        count += 1;
    }
    Depth::Bounded(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_stays_within_a_segment() {
        let pattern = Pattern::new("*.cpp").unwrap();
        assert!(pattern.is_match("a.cpp"));
        assert!(!pattern.is_match("sub/b.cpp"));
        assert_eq!(pattern.depth(), Depth::Bounded(1));
    }

    #[test]
    fn double_star_matches_zero_or_more_segments() {
        let pattern = Pattern::new("**/*.cpp").unwrap();
        assert!(pattern.is_match("a.cpp"));
        assert!(pattern.is_match("sub/b.cpp"));
        assert!(pattern.is_match("sub/deep/c.cpp"));
        assert!(!pattern.is_match("sub/deep/c.h"));
        assert_eq!(pattern.depth(), Depth::Unbounded);
    }

    #[test]
    fn literal_segments_match_exactly() {
        let pattern = Pattern::new("src/*/main.cc").unwrap();
        assert!(pattern.is_match("src/app/main.cc"));
        assert!(!pattern.is_match("src/main.cc"));
        assert!(!pattern.is_match("lib/app/main.cc"));
        assert_eq!(pattern.depth(), Depth::Bounded(3));
    }

    #[test]
    fn any_of_unions_patterns() {
        let pattern = Pattern::any_of(["*.c", "include/**/*.h"]).unwrap();
        assert!(pattern.is_match("main.c"));
        assert!(pattern.is_match("include/a/b.h"));
        assert!(!pattern.is_match("src/main.c"));
        assert_eq!(pattern.depth(), Depth::Unbounded);
        assert_eq!(pattern.to_string(), "*.c, include/**/*.h");
    }

    #[test]
    fn alternation() {
        let pattern = Pattern::new("*.{c,cc,cpp,cxx}").unwrap();
        assert!(pattern.is_match("a.cc"));
        assert!(pattern.is_match("a.cxx"));
        assert!(!pattern.is_match("a.h"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for bad in [
            "", "/abs/*.cpp", "a**/b", "src/[ab", "{a,b", "../*.cpp", "src//*.c",
        ] {
            let err = Pattern::new(bad).unwrap_err();
            assert!(
                matches!(err, Error::InvalidGlobPattern { .. }),
                "{bad:?} => {err:?}"
            );
        }

        let empty: [&str; 0] = [];
        assert!(Pattern::any_of(empty).is_err());
    }
}
