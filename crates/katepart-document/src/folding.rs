//! Fold regions derived from per-line folding markers.

use katepart_syntax::{FoldingKind, LineHighlight, RegionId};

/// A foldable line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FoldRegion {
    /// Line holding the begin marker.
    pub start_line: usize,
    /// Line holding the matching end marker (inclusive), or the last line if the region is
    /// never closed.
    pub end_line: usize,
    /// Region id shared by the begin and end markers.
    pub region: RegionId,
}

impl FoldRegion {
    /// Create a region spanning `start_line..=end_line`.
    pub fn new(start_line: usize, end_line: usize, region: RegionId) -> Self {
        Self {
            start_line,
            end_line,
            region,
        }
    }
}

/// Pair begin and end markers of `lines` into fold regions.
///
/// An end marker closes the innermost open region with the same id; unmatched end markers
/// are ignored. Regions that open and close on the same line cannot be folded and are
/// dropped. The result is sorted by start line, outer regions first.
pub fn fold_regions<'a>(lines: impl IntoIterator<Item = &'a LineHighlight>) -> Vec<FoldRegion> {
    let mut open: Vec<(RegionId, usize)> = Vec::new();
    let mut regions = Vec::new();
    let mut last_line = 0;

    for (line, highlight) in lines.into_iter().enumerate() {
        last_line = line;
        for marker in &highlight.folding {
            match marker.kind {
                FoldingKind::Begin => open.push((marker.region, line)),
                FoldingKind::End => {
                    let Some(i) = open.iter().rposition(|(r, _)| *r == marker.region) else {
                        continue;
                    };
                    let (region, start) = open.remove(i);
                    if start < line {
                        regions.push(FoldRegion::new(start, line, region));
                    }
                }
            }
        }
    }

    for (region, start) in open {
        if start < last_line {
            regions.push(FoldRegion::new(start, last_line, region));
        }
    }

    regions.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then_with(|| b.end_line.cmp(&a.end_line))
    });
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use katepart_syntax::FoldingMarker;

    fn line(markers: &[(RegionId, FoldingKind)]) -> LineHighlight {
        LineHighlight {
            folding: markers
                .iter()
                .map(|(region, kind)| FoldingMarker {
                    offset: 0,
                    length: 1,
                    region: *region,
                    kind: *kind,
                })
                .collect(),
            ..LineHighlight::default()
        }
    }

    #[test]
    fn test_nested_and_unclosed_regions() {
        use FoldingKind::{Begin, End};
        let lines = [
            line(&[(1, Begin)]),
            line(&[(1, Begin)]),
            line(&[(1, End)]),
            line(&[(2, Begin), (2, End)]),
            line(&[(1, End), (3, End)]),
            line(&[(2, Begin)]),
            line(&[]),
        ];
        assert_eq!(
            fold_regions(&lines),
            vec![
                FoldRegion::new(0, 4, 1),
                FoldRegion::new(1, 2, 1),
                FoldRegion::new(5, 6, 2),
            ]
        );
    }
}
