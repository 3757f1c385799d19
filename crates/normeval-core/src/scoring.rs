//! Rubric arithmetic.
//!
//! Two scores live side by side and must not be confused:
//!
//! - [`composite_score`]: the judge's weighted 0..=10 score over the full
//!   five-dimension rubric. Reported, never stored on the answer.
//! - [`aggregate_score`]: the simple integer stored on every answer
//!   (sub-scores present + correctness bonus + citation bonus).

use crate::errors::ConsistencyError;
use crate::model::{Answer, Judgment};

pub const QUALITY_WEIGHT: f64 = 0.7;
pub const CORRECT_BONUS: f64 = 2.0;
pub const SOURCE_BONUS: f64 = 0.5;
pub const NORM_BONUS: f64 = 0.3;
pub const ITEM_BONUS: f64 = 0.2;

pub const MAX_GROUNDING_WHEN_INCORRECT: u8 = 2;
pub const MAX_CONFORMANCE_WITHOUT_NORM: u8 = 3;

/// Mean of the five 1..=5 rubric dimensions.
pub fn quality_average(j: &Judgment) -> f64 {
    let sum = j.clarity as u32
        + j.technical_grounding as u32
        + j.concision as u32
        + j.norm_conformance as u32
        + j.technical_completeness as u32;
    sum as f64 / 5.0
}

pub fn composite_score(j: &Judgment) -> f64 {
    let mut raw = quality_average(j) * QUALITY_WEIGHT;
    if j.correct {
        raw += CORRECT_BONUS;
    }
    if j.source_cited {
        raw += SOURCE_BONUS;
    }
    if j.norm_mentioned {
        raw += NORM_BONUS;
    }
    if j.item_mentioned {
        raw += ITEM_BONUS;
    }
    raw.clamp(0.0, 10.0)
}

/// Integer score stored on the answer row.
pub fn aggregate_score(
    clarity: Option<u8>,
    technical_grounding: Option<u8>,
    concision: Option<u8>,
    correct: bool,
    source_cited: bool,
) -> i64 {
    let subscores: i64 = [clarity, technical_grounding, concision]
        .into_iter()
        .flatten()
        .map(i64::from)
        .sum();
    subscores + i64::from(correct) + i64::from(source_cited)
}

pub fn aggregate_for_answer(a: &Answer) -> i64 {
    aggregate_score(
        a.clarity,
        a.technical_grounding,
        a.concision,
        a.correct,
        a.source_cited,
    )
}

/// Checks the two cross-field rules of the rubric. The first violated rule wins.
pub fn validate_consistency(j: &Judgment) -> Result<(), ConsistencyError> {
    if !j.correct && j.technical_grounding > MAX_GROUNDING_WHEN_INCORRECT {
        return Err(ConsistencyError::IncorrectButWellGrounded {
            grounding: j.technical_grounding,
        });
    }
    if !j.norm_mentioned && j.norm_conformance > MAX_CONFORMANCE_WITHOUT_NORM {
        return Err(ConsistencyError::UnmentionedNormButConformant {
            conformance: j.norm_conformance,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn judgment(scores: [u8; 5], flags: [bool; 4]) -> Judgment {
        Judgment {
            correct: flags[0],
            norm_mentioned: flags[1],
            item_mentioned: flags[2],
            source_cited: flags[3],
            clarity: scores[0],
            technical_grounding: scores[1],
            concision: scores[2],
            norm_conformance: scores[3],
            technical_completeness: scores[4],
            rationale: String::new(),
            correct_points: vec![],
            incorrect_points: vec![],
        }
    }

    #[test]
    fn fully_cited_correct_answer_scores_5_8() {
        let j = judgment([4; 5], [true; 4]);
        assert!((composite_score(&j) - 5.8).abs() < EPS);
        assert_eq!(
            aggregate_score(
                Some(j.clarity),
                Some(j.technical_grounding),
                Some(j.concision),
                j.correct,
                j.source_cited
            ),
            14
        );
    }

    #[test]
    fn wrong_answer_with_high_grounding_is_inconsistent() {
        let mut j = judgment([4; 5], [false, true, true, false]);
        assert_eq!(
            validate_consistency(&j),
            Err(ConsistencyError::IncorrectButWellGrounded { grounding: 4 })
        );
        j.technical_grounding = 2;
        assert_eq!(validate_consistency(&j), Ok(()));
    }

    #[test]
    fn unmentioned_norm_caps_conformance_at_three() {
        let mut j = judgment([3, 3, 3, 4, 3], [true, false, false, false]);
        assert_eq!(
            validate_consistency(&j),
            Err(ConsistencyError::UnmentionedNormButConformant { conformance: 4 })
        );
        j.norm_conformance = 3;
        assert!(validate_consistency(&j).is_ok());
    }

    #[test]
    fn grounding_rule_is_reported_before_conformance_rule() {
        let j = judgment([5; 5], [false; 4]);
        assert!(matches!(
            validate_consistency(&j),
            Err(ConsistencyError::IncorrectButWellGrounded { .. })
        ));
    }

    #[test]
    fn composite_stays_within_bounds_for_every_valid_input() {
        let mut max_seen = f64::MIN;
        let mut min_seen = f64::MAX;
        for a in 1..=5u8 {
            for b in 1..=5u8 {
                for c in 1..=5u8 {
                    for d in 1..=5u8 {
                        for e in 1..=5u8 {
                            for bits in 0..16u8 {
                                let flags = [
                                    bits & 1 != 0,
                                    bits & 2 != 0,
                                    bits & 4 != 0,
                                    bits & 8 != 0,
                                ];
                                let s = composite_score(&judgment([a, b, c, d, e], flags));
                                assert!((0.0..=10.0).contains(&s));
                                max_seen = max_seen.max(s);
                                min_seen = min_seen.min(s);
                            }
                        }
                    }
                }
            }
        }
        assert!((max_seen - 6.5).abs() < EPS);
        assert!((min_seen - 0.7).abs() < EPS);
    }

    #[test]
    fn composite_is_monotone_in_each_quality_dimension() {
        for dim in 0..5 {
            for base in 1..=5u8 {
                for flags in [[false; 4], [true; 4], [true, false, true, false]] {
                    let mut prev = f64::MIN;
                    for v in 1..=5u8 {
                        let mut scores = [base; 5];
                        scores[dim] = v;
                        let s = composite_score(&judgment(scores, flags));
                        assert!(s + EPS >= prev, "dim {} value {} dropped", dim, v);
                        prev = s;
                    }
                }
            }
        }
    }

    #[test]
    fn aggregate_skips_missing_subscores() {
        assert_eq!(aggregate_score(None, None, None, false, false), 0);
        assert_eq!(aggregate_score(Some(5), None, Some(2), true, false), 8);
        assert_eq!(aggregate_score(None, None, None, true, true), 2);
    }
}
