// SPDX-License-Identifier: GPL-3.0-or-later

//! Fingerprint alignment and scoring used by the store's search.
//!
//! Search runs in two steps. Sub-fingerprints sharing an alignment key vote
//! for a time offset between the query and a stored track; the best offset of
//! each track is then scored by comparing the aligned items bit by bit.

use std::collections::HashMap;

use bgmprint_fingerprint::Fingerprint;

/// Number of leading bits of a sub-fingerprint used as its alignment key.
pub const ALIGN_KEY_BITS: u32 = 16;

pub fn alignment_key(item: u32) -> u32 {
    item >> (32 - ALIGN_KEY_BITS)
}

/// Query positions grouped by alignment key.
pub fn query_keys(items: &[u32]) -> HashMap<u32, Vec<usize>> {
    let mut keys: HashMap<u32, Vec<usize>> = HashMap::new();
    for (pos, item) in items.iter().enumerate() {
        keys.entry(alignment_key(*item)).or_default().push(pos);
    }
    keys
}

/// Offset histogram per stored track. An offset is `track_pos - query_pos`.
#[derive(Debug, Default)]
pub struct OffsetVotes {
    votes: HashMap<String, HashMap<i64, usize>>,
}

impl OffsetVotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, track_id: &str, track_pos: usize, query_pos: usize) {
        let offset = track_pos as i64 - query_pos as i64;
        *self
            .votes
            .entry(track_id.to_string())
            .or_default()
            .entry(offset)
            .or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// The most voted offset of every track with at least `min_votes` votes,
    /// ordered by track id. Ties prefer the offset closest to zero.
    pub fn best_offsets(&self, min_votes: usize) -> Vec<(String, i64, usize)> {
        let mut best: Vec<(String, i64, usize)> = self
            .votes
            .iter()
            .filter_map(|(track_id, offsets)| {
                offsets
                    .iter()
                    .max_by(|(oa, va), (ob, vb)| {
                        va.cmp(vb)
                            .then_with(|| ob.abs().cmp(&oa.abs()))
                            .then_with(|| ob.cmp(oa))
                    })
                    .filter(|(_, votes)| **votes >= min_votes)
                    .map(|(offset, votes)| (track_id.clone(), *offset, *votes))
            })
            .collect();
        best.sort_by(|a, b| a.0.cmp(&b.0));
        best
    }
}

/// Result of comparing a query against a track at a fixed offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub offset: i64,
    pub matched_items: usize,
    pub overlap_items: usize,
    pub first_query_item: usize,
    pub last_query_item: usize,
}

impl Alignment {
    pub fn confidence(&self) -> f64 {
        self.matched_items as f64 / self.overlap_items as f64
    }

    fn span(&self) -> usize {
        self.last_query_item - self.first_query_item + 1
    }

    pub fn query_coverage(&self, query_len: usize) -> f64 {
        (self.span() as f64 / query_len.max(1) as f64).min(1.0)
    }

    pub fn track_coverage(&self, track_len: usize) -> f64 {
        (self.span() as f64 / track_len.max(1) as f64).min(1.0)
    }

    pub fn query_start_secs(&self) -> f64 {
        Fingerprint::item_offset_secs(self.first_query_item)
    }

    pub fn track_start_secs(&self) -> f64 {
        let track_item = self.first_query_item as i64 + self.offset;
        Fingerprint::item_offset_secs(track_item.max(0) as usize)
    }
}

/// Compare `query[i]` with `track[i + offset]` over their overlap. Returns
/// `None` when nothing overlaps or no aligned pair is within `max_bit_error`.
pub fn score_alignment(
    query: &[u32],
    track: &[u32],
    offset: i64,
    max_bit_error: u32,
) -> Option<Alignment> {
    let start = (-offset).max(0);
    let end = (query.len() as i64).min(track.len() as i64 - offset);
    if start >= end {
        return None;
    }

    let mut matched_items = 0;
    let mut first = None;
    let mut last = 0;
    for q in start..end {
        let t = q + offset;
        let bit_errors = (query[q as usize] ^ track[t as usize]).count_ones();
        if bit_errors <= max_bit_error {
            matched_items += 1;
            first.get_or_insert(q as usize);
            last = q as usize;
        }
    }

    first.map(|first_query_item| Alignment {
        offset,
        matched_items,
        overlap_items: (end - start) as usize,
        first_query_item,
        last_query_item: last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo_random(seed: u32, len: usize) -> Vec<u32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state
            })
            .collect()
    }

    #[test]
    fn alignment_key_keeps_leading_bits() {
        assert_eq!(alignment_key(0xABCD_1234), 0xABCD);
        assert_eq!(alignment_key(0x0000_FFFF), 0);
    }

    #[test]
    fn query_keys_groups_positions() {
        let keys = query_keys(&[0x0001_0000, 0x0001_FFFF, 0x0002_0000]);
        assert_eq!(keys[&1], vec![0, 1]);
        assert_eq!(keys[&2], vec![2]);
    }

    #[test]
    fn best_offset_wins_by_votes() {
        let mut votes = OffsetVotes::new();
        for q in 0..5 {
            votes.record("a", q + 10, q);
        }
        votes.record("a", 3, 0);
        votes.record("b", 1, 0);

        let best = votes.best_offsets(2);
        assert_eq!(best, vec![("a".to_string(), 10, 5)]);
    }

    #[test]
    fn best_offset_tie_prefers_smaller_shift() {
        let mut votes = OffsetVotes::new();
        votes.record("a", 5, 0);
        votes.record("a", 0, 2);
        let best = votes.best_offsets(1);
        assert_eq!(best, vec![("a".to_string(), -2, 1)]);
    }

    #[test]
    fn identical_sequences_score_full_confidence() {
        let track = pseudo_random(7, 200);
        let alignment = score_alignment(&track, &track, 0, 10).unwrap();
        assert_eq!(alignment.confidence(), 1.0);
        assert_eq!(alignment.query_coverage(200), 1.0);
        assert_eq!(alignment.query_start_secs(), 0.0);
    }

    #[test]
    fn excerpt_is_found_at_its_offset() {
        let track = pseudo_random(11, 300);
        let query: Vec<u32> = track[100..150].iter().map(|v| v ^ 0b101).collect();

        let alignment = score_alignment(&query, &track, 100, 10).unwrap();
        assert_eq!(alignment.matched_items, 50);
        assert_eq!(alignment.overlap_items, 50);
        assert_eq!(alignment.first_query_item, 0);
        assert!((alignment.track_coverage(300) - 50.0 / 300.0).abs() < 1e-9);
        assert!((alignment.track_start_secs() - Fingerprint::item_offset_secs(100)).abs() < 1e-9);
    }

    #[test]
    fn unrelated_sequences_score_low() {
        let a = pseudo_random(3, 200);
        let b = pseudo_random(99, 200);
        let confidence = score_alignment(&a, &b, 0, 10)
            .map(|alignment| alignment.confidence())
            .unwrap_or(0.0);
        assert!(confidence < 0.2, "confidence {confidence}");
    }

    #[test]
    fn no_overlap_yields_none() {
        let a = pseudo_random(1, 10);
        assert!(score_alignment(&a, &a, 10, 10).is_none());
        assert!(score_alignment(&a, &a, -10, 10).is_none());
    }
}
