//! Utilities for `assert!`s.

/// Asserts that the provided expression, that returns an `Option`, is `None`.
///
/// Used after inserting into a map whose keys we already checked for uniqueness.
///
/// ```
/// use rig_ore::assert_none;
///
/// let mut names = std::collections::BTreeMap::new();
/// let prev = names.insert("app", 0);
/// assert_none!(prev, "'app' inserted twice");
/// ```
#[macro_export]
macro_rules! assert_none {
    ($val:expr, $($msg:tt)+) => {{
        if let Some(prev) = &$val {
            panic!("assertion failed: expected None, found Some({prev:?}): {}", format!($($msg)+));
        }
    }};
    ($val:expr) => {{
        if let Some(prev) = &$val {
            panic!("assertion failed: expected None, found Some({prev:?})");
        }
    }}
}

#[cfg(test)]
mod tests {
    #[test]
    fn none_passes() {
        let val: Option<u32> = None;
        assert_none!(val, "should not fire for {}", "None");
    }

    #[test]
    #[should_panic(expected = "found Some(7): lookup")]
    fn some_panics() {
        let val = Some(7);
        assert_none!(val, "lookup");
    }
}
