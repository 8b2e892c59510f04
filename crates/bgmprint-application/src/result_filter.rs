// SPDX-License-Identifier: GPL-3.0-or-later
use bgmprint_domain::MatchResult;
use tracing::trace;

/// Drops low-confidence candidates and keeps the store's ranking.
#[derive(Debug, Clone, Copy)]
pub struct ResultFilter {
    min_confidence: f64,
}

impl ResultFilter {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Candidates with confidence strictly above the threshold, in the order given.
    pub fn filter_and_rank(
        &self,
        candidates: Vec<MatchResult>,
    ) -> impl Iterator<Item = MatchResult> {
        let min_confidence = self.min_confidence;
        candidates.into_iter().filter(move |candidate| {
            let keep = candidate.confidence > min_confidence;
            if !keep {
                trace!(
                    target: "query",
                    identity = %candidate.matched_identity,
                    confidence = candidate.confidence,
                    "below confidence threshold"
                );
            }
            keep
        })
    }
}

impl Default for ResultFilter {
    fn default() -> Self {
        Self::new(0.3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgmprint_domain::TrackIdentity;

    fn candidate(token: &str, confidence: f64) -> MatchResult {
        MatchResult {
            matched_identity: TrackIdentity::new("dova-s", token),
            confidence,
            query_coverage: 1.0,
            track_coverage: 0.5,
            query_match_start_secs: 0.0,
            track_match_start_secs: 0.0,
        }
    }

    fn kept(candidates: Vec<MatchResult>) -> Vec<String> {
        ResultFilter::default()
            .filter_and_rank(candidates)
            .map(|m| m.matched_identity.to_string())
            .collect()
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(kept(vec![candidate("edge", 0.3)]).is_empty());
        assert_eq!(kept(vec![candidate("above", 0.30001)]), vec!["dova-s/above"]);
        assert!(kept(vec![candidate("zero", 0.0)]).is_empty());
    }

    #[test]
    fn store_order_is_preserved() {
        let ranked = kept(vec![
            candidate("first", 0.4),
            candidate("dropped", 0.1),
            candidate("second", 0.9),
            candidate("third", 0.5),
        ]);
        assert_eq!(ranked, vec!["dova-s/first", "dova-s/second", "dova-s/third"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(ResultFilter::default().filter_and_rank(vec![]).count(), 0);
    }

    #[test]
    fn custom_threshold() {
        let filter = ResultFilter::new(0.75);
        let kept: Vec<_> = filter
            .filter_and_rank(vec![candidate("a", 0.75), candidate("b", 0.8)])
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].matched_identity.as_str(), "dova-s/b");
    }
}
