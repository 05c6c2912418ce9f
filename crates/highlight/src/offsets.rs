//! Normalized text with a map back to original byte offsets.
//!
//! Normalizers may change length (decomposition grows text, diacritic and
//! punctuation stripping shrink it), so offsets found in normalized text do not
//! index the original. The whole text is normalized in one go, exactly like
//! query terms. Each cluster (a base char plus its trailing combining marks) is
//! then normalized on its own and its output aligned against the whole-text
//! output. Clusters whose output does not line up, because a transform looked
//! at neighbouring chars, are grouped until the outputs agree again. A
//! normalized range maps to the smallest run of whole groups that covers it.

use core_types::MatchRange;
use normalize::{NormalizationEngine, TransformChain};
use unicode_normalization::char::is_combining_mark;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    norm_start: usize,
    norm_end: usize,
    orig_start: usize,
    orig_end: usize,
}

#[derive(Clone, Debug)]
pub struct NormalizedText {
    text: String,
    segments: Vec<Segment>,
}

impl NormalizedText {
    pub fn build(original: &str, engine: &NormalizationEngine, chain: &TransformChain) -> Self {
        let text = engine.apply(original, chain);
        let clusters = clusters(original);
        let pieces: Vec<String> = clusters
            .iter()
            .map(|&(start, end)| chain.run(&original[start..end]))
            .collect();
        let segments = align(&text, &clusters, &pieces);
        Self { text, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Original-coordinate range covering `range`, or `None` for an empty or
    /// out-of-bounds range.
    pub fn to_original(&self, range: MatchRange) -> Option<MatchRange> {
        if range.is_empty() || range.end > self.text.len() {
            return None;
        }
        let first = self.segment_containing(range.start)?;
        let last = self.segment_containing(range.end - 1)?;
        Some(MatchRange::new(first.orig_start, last.orig_end))
    }

    /// Maps sorted, disjoint normalized ranges to original coordinates. Ranges
    /// that land in the same cluster are merged so the result stays disjoint.
    pub fn map_ranges(&self, ranges: &[MatchRange]) -> Vec<MatchRange> {
        let mut out: Vec<MatchRange> = Vec::with_capacity(ranges.len());
        for mapped in ranges.iter().filter_map(|r| self.to_original(*r)) {
            match out.last_mut() {
                Some(prev) if mapped.start < prev.end => prev.end = prev.end.max(mapped.end),
                _ => out.push(mapped),
            }
        }
        out
    }

    fn segment_containing(&self, offset: usize) -> Option<&Segment> {
        let idx = self.segments.partition_point(|s| s.norm_end <= offset);
        self.segments
            .get(idx)
            .filter(|s| s.norm_start <= offset && offset < s.norm_end)
    }
}

/// Gives every cluster a span of `text`, in order. When a cluster's own output
/// is not next in `text`, the cheaper of two repairs wins: the previous span
/// absorbs the text up to where this output appears, or this cluster is grouped
/// with the following ones up to the first whose output reappears.
fn align(text: &str, clusters: &[(usize, usize)], pieces: &[String]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::with_capacity(clusters.len());
    let mut pos = 0;
    let mut idx = 0;
    while idx < clusters.len() {
        let (orig_start, orig_end) = clusters[idx];
        let piece = pieces[idx].as_str();
        if text[pos..].starts_with(piece) {
            segments.push(Segment {
                norm_start: pos,
                norm_end: pos + piece.len(),
                orig_start,
                orig_end,
            });
            pos += piece.len();
            idx += 1;
            continue;
        }
        let gap = text[pos..].find(piece).filter(|_| !segments.is_empty());
        let resume = (idx + 1..clusters.len())
            .filter(|next| !pieces[*next].is_empty())
            .find_map(|next| {
                text[pos..]
                    .find(pieces[next].as_str())
                    .map(|offset| (next, pos + offset))
            });
        let absorb = gap.filter(|gap| resume.is_none_or(|(_, end)| pos + gap <= end));
        if let (Some(gap), Some(last)) = (absorb, segments.last_mut()) {
            last.norm_end += gap;
            pos += gap;
            continue;
        }
        let (next, norm_end) = resume.unwrap_or((clusters.len(), text.len()));
        segments.push(Segment {
            norm_start: pos,
            norm_end,
            orig_start,
            orig_end: clusters[next - 1].1,
        });
        pos = norm_end;
        idx = next;
    }
    segments
}

/// Byte spans of `(base char + trailing combining marks)` clusters.
fn clusters(text: &str) -> Vec<(usize, usize)> {
    let mut out: Vec<(usize, usize)> = Vec::new();
    for (idx, ch) in text.char_indices() {
        let end = idx + ch.len_utf8();
        match out.last_mut() {
            Some(last) if is_combining_mark(ch) => last.1 = end,
            _ => out.push((idx, end)),
        }
    }
    out
}
