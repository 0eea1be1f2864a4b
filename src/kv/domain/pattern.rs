//! Segment-wise key patterns used to enumerate records in a flat namespace.

use std::fmt;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = ':';

/// Rendering of [`PatternSegment::Any`] in diagnostics.
const WILDCARD_DISPLAY: &str = "*";

/// One position in a [`KeyPattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
    /// Matches exactly this segment value.
    Exact(String),
    /// Matches any single segment value, including the empty one.
    Any,
}

impl PatternSegment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == segment,
            Self::Any => true,
        }
    }
}

/// Pattern over separator-delimited keys.
///
/// A key matches when it has exactly as many segments as the pattern and
/// every exact segment is equal. Wildcards never span a separator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPattern {
    segments: Vec<PatternSegment>,
}

impl KeyPattern {
    /// Creates an empty pattern.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Appends an exact segment.
    #[must_use]
    pub fn exact(mut self, value: impl Into<String>) -> Self {
        self.segments.push(PatternSegment::Exact(value.into()));
        self
    }

    /// Appends a wildcard segment.
    #[must_use]
    pub fn any(mut self) -> Self {
        self.segments.push(PatternSegment::Any);
        self
    }

    /// Appends an exact segment when `value` is present, a wildcard otherwise.
    #[must_use]
    pub fn exact_or_any(self, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(segment) => self.exact(segment),
            None => self.any(),
        }
    }

    /// Returns the pattern segments in order.
    #[must_use]
    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// Returns whether `key` matches this pattern.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        if key.split(KEY_SEPARATOR).count() != self.segments.len() {
            return false;
        }
        key.split(KEY_SEPARATOR)
            .zip(&self.segments)
            .all(|(segment, pattern)| pattern.matches(segment))
    }

    /// Returns the literal text every matching key starts with.
    ///
    /// Backends use this to narrow a scan before applying [`Self::matches`].
    #[must_use]
    pub fn literal_prefix(&self) -> String {
        let mut prefix = String::new();
        for segment in &self.segments {
            match segment {
                PatternSegment::Exact(value) => {
                    prefix.push_str(value);
                    prefix.push(KEY_SEPARATOR);
                }
                PatternSegment::Any => return prefix,
            }
        }
        prefix.pop();
        prefix
    }

    /// Returns true when the pattern contains no wildcard.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, PatternSegment::Exact(_)))
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<&str> = self
            .segments
            .iter()
            .map(|segment| match segment {
                PatternSegment::Exact(value) => value.as_str(),
                PatternSegment::Any => WILDCARD_DISPLAY,
            })
            .collect();
        write!(formatter, "{}", rendered.join(":"))
    }
}
