use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Marker positions in rewritten-text coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerMap {
    /// Offsets of `_go2check` identifiers.
    pub checks: BTreeSet<usize>,
    /// Offset of each emitted `if` keyword, mapped to the handler's error name.
    pub handles: BTreeMap<usize, String>,
}

impl MarkerMap {
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.handles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.checks.len() + self.handles.len()
    }
}

/// One substitution of the original text: `start..end` becomes `replacement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl Edit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            replacement: text.into(),
        }
    }

    pub fn replace(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placed {
    source_start: usize,
    source_end: usize,
    rewritten_start: usize,
    rewritten_end: usize,
}

/// Maps offsets in rewritten text back to the original source.
///
/// Offsets inside a replacement map into the replaced source range, clamped
/// to its end; everything else is shifted by the edits that precede it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetMap {
    placed: Vec<Placed>,
}

impl OffsetMap {
    /// Applies `edits` (sorted by start, non-overlapping) to `source`.
    /// Returns the rewritten text, the map and the rewritten start offset of
    /// every edit, in edit order.
    pub fn apply(source: &str, edits: &[Edit]) -> (String, OffsetMap, Vec<usize>) {
        let mut out = String::with_capacity(source.len() + edits.len() * 8);
        let mut placed = Vec::with_capacity(edits.len());
        let mut starts = Vec::with_capacity(edits.len());
        let mut cursor = 0;

        for edit in edits {
            out.push_str(&source[cursor..edit.start]);
            let rewritten_start = out.len();
            out.push_str(&edit.replacement);
            placed.push(Placed {
                source_start: edit.start,
                source_end: edit.end,
                rewritten_start,
                rewritten_end: out.len(),
            });
            starts.push(rewritten_start);
            cursor = edit.end;
        }
        out.push_str(&source[cursor..]);

        (out, OffsetMap { placed }, starts)
    }

    pub fn to_source(&self, offset: usize) -> usize {
        let mut shift: isize = 0;
        for p in &self.placed {
            if offset < p.rewritten_start {
                break;
            }
            if offset < p.rewritten_end {
                let len = p.source_end - p.source_start;
                return p.source_start + (offset - p.rewritten_start).min(len);
            }
            shift = p.source_end as isize - p.rewritten_end as isize;
        }
        (offset as isize + shift).max(0) as usize
    }

    pub fn is_identity(&self) -> bool {
        self.placed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_offsets_around_edits() {
        let src = "x := check f()";
        let edits = vec![
            Edit::replace(5, 11, "_go2check("),
            Edit::insert(14, ")"),
        ];
        let (text, map, starts) = OffsetMap::apply(src, &edits);
        assert_eq!(text, "x := _go2check(f())");
        assert_eq!(starts, vec![5, 18]);

        assert_eq!(map.to_source(0), 0);
        assert_eq!(map.to_source(5), 5);
        // `f` sits after the opener in both texts
        assert_eq!(map.to_source(15), 11);
        assert_eq!(map.to_source(18), 14);
    }

    #[test]
    fn identity_without_edits() {
        let (text, map, _) = OffsetMap::apply("abc", &[]);
        assert_eq!(text, "abc");
        assert!(map.is_identity());
        assert_eq!(map.to_source(2), 2);
    }
}
