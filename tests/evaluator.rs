//! Integration tests for span error evaluation.
//!
//! The assignment solver is checked against exhaustive enumeration of every
//! pairing on inputs small enough to enumerate.

use entity_extraction::{
    calc_error, calc_error_batch, calc_error_exhaustive, error_pair, EntitySpan,
};
use proptest::prelude::*;

fn span_strategy() -> impl Strategy<Value = EntitySpan> {
    (0usize..30, 0usize..6, 1u32..4)
        .prop_map(|(start, extra, entity_id)| EntitySpan::new(start, start + extra, entity_id))
}

#[test]
fn test_reference_examples() {
    assert_eq!(calc_error(&[], &[]).unwrap(), 0);
    assert_eq!(
        calc_error(&[EntitySpan::new(1, 3, 1)], &[EntitySpan::new(1, 3, 1)]).unwrap(),
        0
    );
    assert_eq!(
        calc_error(&[EntitySpan::new(1, 3, 1)], &[EntitySpan::new(1, 3, 2)]).unwrap(),
        3
    );
    assert_eq!(
        calc_error(
            &[EntitySpan::new(1, 3, 1), EntitySpan::new(6, 8, 2)],
            &[EntitySpan::new(2, 4, 1)]
        )
        .unwrap(),
        5
    );
}

/// A wrong id costs the covered positions once, not twice.
#[test]
fn test_partial_overlap_with_other_entity() {
    let truth = EntitySpan::new(0, 3, 1);
    let predicted = EntitySpan::new(2, 5, 2);
    assert_eq!(error_pair(Some(&truth), Some(&predicted)).unwrap(), 6);
    assert_eq!(error_pair(Some(&truth), Some(&EntitySpan::new(2, 5, 1))).unwrap(), 4);
}

/// Spurious predictions cost their full length.
#[test]
fn test_extra_predictions() {
    let truth = [EntitySpan::new(10, 12, 4)];
    let predicted = [
        EntitySpan::new(10, 12, 4),
        EntitySpan::new(20, 21, 4),
        EntitySpan::new(30, 30, 5),
    ];
    assert_eq!(calc_error(&truth, &predicted).unwrap(), 3);
}

/// An inverted span is rejected rather than costing a wrapped-around length.
#[test]
fn test_inverted_span_is_an_error() {
    let truth = [EntitySpan::new(5, 2, 1)];
    let predicted = [EntitySpan::new(2, 5, 1)];
    assert!(calc_error(&truth, &predicted).is_err());
    assert!(calc_error(&predicted, &truth).is_err());
    assert!(error_pair(Some(&truth[0]), Some(&predicted[0])).is_err());
    assert!(calc_error_batch(&[(truth.to_vec(), predicted.to_vec())]).is_err());
}

proptest! {
    #[test]
    fn test_assignment_matches_exhaustive(
        truth in prop::collection::vec(span_strategy(), 0..=6),
        predicted in prop::collection::vec(span_strategy(), 0..=6),
    ) {
        prop_assert_eq!(
            calc_error(&truth, &predicted).unwrap(),
            calc_error_exhaustive(&truth, &predicted).unwrap()
        );
    }

    #[test]
    fn test_error_is_symmetric(
        truth in prop::collection::vec(span_strategy(), 0..=6),
        predicted in prop::collection::vec(span_strategy(), 0..=6),
    ) {
        prop_assert_eq!(
            calc_error(&truth, &predicted).unwrap(),
            calc_error(&predicted, &truth).unwrap()
        );
    }

    #[test]
    fn test_identical_lists_cost_nothing(spans in prop::collection::vec(span_strategy(), 0..=8)) {
        prop_assert_eq!(calc_error(&spans, &spans).unwrap(), 0);
    }

    #[test]
    fn test_error_bounded_by_total_length(
        truth in prop::collection::vec(span_strategy(), 0..=6),
        predicted in prop::collection::vec(span_strategy(), 0..=6),
    ) {
        let total: usize = truth.iter().chain(&predicted).map(EntitySpan::len).sum();
        prop_assert!(calc_error(&truth, &predicted).unwrap() <= total);
    }

    #[test]
    fn test_batch_matches_single(
        documents in prop::collection::vec(
            (
                prop::collection::vec(span_strategy(), 0..=4),
                prop::collection::vec(span_strategy(), 0..=4),
            ),
            0..8,
        )
    ) {
        let expected: Vec<usize> = documents
            .iter()
            .map(|(truth, predicted)| calc_error(truth, predicted).unwrap())
            .collect();
        prop_assert_eq!(calc_error_batch(&documents).unwrap(), expected);
    }
}
