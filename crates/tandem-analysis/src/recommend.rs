//! Next-track recommendation scoring
//!
//! Scores candidate tracks against the one playing now. Purely a function
//! of the analysis profiles, so the same library always ranks the same
//! way.

use serde::{Deserialize, Serialize};

use crate::AnalysisResult;

/// A scored candidate, referring back into the caller's track list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub index: usize,
    pub score: i32,
    pub reasons: Vec<String>,
}

/// Rank candidates for mixing out of `current`
///
/// Higher scores first; ties keep the caller's order.
pub fn recommend(current: &AnalysisResult, candidates: &[AnalysisResult]) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let (score, reasons) = score_pair(current, candidate);
            Recommendation {
                index,
                score,
                reasons,
            }
        })
        .collect();
    ranked.sort_by_key(|r| std::cmp::Reverse(r.score));
    ranked
}

fn score_pair(current: &AnalysisResult, candidate: &AnalysisResult) -> (i32, Vec<String>) {
    let mut score = 0;
    let mut reasons = Vec::new();

    let bpm_diff = (current.bpm - candidate.bpm).abs();
    if bpm_diff < 5 {
        score += 40;
        reasons.push("Perfect BPM match".to_string());
    } else if bpm_diff < 10 {
        score += 25;
        reasons.push("Close BPM".to_string());
    } else if bpm_diff < 20 {
        score += 10;
        reasons.push("Workable BPM".to_string());
    }

    if current.key.is_compatible_with(&candidate.key) {
        score += 30;
        reasons.push(format!("Compatible key ({})", candidate.key));
    }

    let energy_diff = candidate.energy - current.energy;
    if energy_diff > 0 && energy_diff < 20 {
        score += 20;
        reasons.push("Builds energy".to_string());
    } else if energy_diff.abs() < 10 {
        score += 15;
        reasons.push("Maintains energy".to_string());
    }

    (score, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::MusicalKey;

    fn profile(bpm: i32, key: MusicalKey, energy: i32) -> AnalysisResult {
        AnalysisResult {
            bpm,
            key,
            waveform: Vec::new(),
            energy,
            structure: Vec::new(),
        }
    }

    #[test]
    fn test_identical_profile_scores_maximum() {
        let current = profile(128, MusicalKey::new(9, true), 60);
        let (score, reasons) = score_pair(&current, &current);
        // 40 BPM + 30 key + 15 energy
        assert_eq!(score, 85);
        assert_eq!(reasons.len(), 3);
    }

    #[test]
    fn test_energy_build_beats_energy_drop() {
        let current = profile(128, MusicalKey::new(0, false), 50);
        let build = profile(128, MusicalKey::new(0, false), 60);
        let drop = profile(128, MusicalKey::new(0, false), 20);
        let (build_score, _) = score_pair(&current, &build);
        let (drop_score, _) = score_pair(&current, &drop);
        assert!(build_score > drop_score);
    }

    #[test]
    fn test_relative_key_counts_as_compatible() {
        let current = profile(128, MusicalKey::new(9, true), 50);
        let relative = profile(170, MusicalKey::new(0, false), 90);
        let (_, reasons) = score_pair(&current, &relative);
        assert!(reasons.iter().any(|r| r.contains("Compatible key")));
    }

    #[test]
    fn test_ranking_is_deterministic_and_sorted() {
        let current = profile(128, MusicalKey::new(0, false), 50);
        let candidates = vec![
            profile(150, MusicalKey::new(7, false), 10),
            profile(128, MusicalKey::new(0, false), 55),
            profile(135, MusicalKey::new(9, true), 52),
        ];
        let first = recommend(&current, &candidates);
        let second = recommend(&current, &candidates);
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(first[0].index, 1);
    }
}
