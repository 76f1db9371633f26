//! Span-level error between ground-truth and predicted entity annotations.
//!
//! The error of a document is the cheapest way to pair every ground-truth
//! span with a predicted span (or with nothing), where pairing two spans
//! costs the number of token positions on which they disagree.
//!
//! Every entry point rejects inverted spans (`start > end`) with
//! [`MatchError::InvalidParameter`].

use rayon::prelude::*;

use super::error::{MatchError, Result};
use super::types::EntitySpan;

fn check_span(span: &EntitySpan) -> Result<()> {
    if span.start > span.end {
        return Err(MatchError::invalid_parameter(format!(
            "span start {} is after its end {}",
            span.start, span.end
        )));
    }
    Ok(())
}

fn check_spans(ground_truth: &[EntitySpan], predicted: &[EntitySpan]) -> Result<()> {
    ground_truth.iter().chain(predicted).try_for_each(check_span)
}

/// Cost of pairing two optional spans.
///
/// A missing side costs the length of the other span. Otherwise each position
/// in the union of both spans counts once if exactly one span covers it, or if
/// both cover it with different entity ids.
///
/// # Example
///
/// ```
/// use entity_extraction::{error_pair, EntitySpan};
///
/// let truth = EntitySpan::new(1, 3, 1);
/// assert_eq!(error_pair(Some(&truth), Some(&EntitySpan::new(2, 4, 1)))?, 2);
/// assert_eq!(error_pair(Some(&truth), Some(&EntitySpan::new(1, 3, 2)))?, 3);
/// assert_eq!(error_pair(Some(&truth), None)?, 3);
/// assert!(error_pair(Some(&EntitySpan::new(3, 1, 1)), None).is_err());
/// # Ok::<(), entity_extraction::MatchError>(())
/// ```
pub fn error_pair(a: Option<&EntitySpan>, b: Option<&EntitySpan>) -> Result<usize> {
    a.into_iter().chain(b).try_for_each(check_span)?;
    Ok(pair_cost(a, b))
}

/// [`error_pair`] on spans already checked.
fn pair_cost(a: Option<&EntitySpan>, b: Option<&EntitySpan>) -> usize {
    match (a, b) {
        (None, None) => 0,
        (Some(span), None) | (None, Some(span)) => span.len(),
        (Some(a), Some(b)) => {
            let overlap = (a.end.min(b.end) + 1).saturating_sub(a.start.max(b.start));
            if a.entity_id == b.entity_id {
                a.len() + b.len() - 2 * overlap
            } else {
                a.len() + b.len() - overlap
            }
        }
    }
}

/// Square cost matrix over both lists padded with `None` to equal length.
fn cost_matrix(ground_truth: &[EntitySpan], predicted: &[EntitySpan]) -> (usize, Vec<i64>) {
    let n = ground_truth.len().max(predicted.len());
    let mut costs = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            costs.push(pair_cost(ground_truth.get(i), predicted.get(j)) as i64);
        }
    }
    (n, costs)
}

/// Minimum total [`error_pair`] cost over all pairings of the two lists.
///
/// Solved as an assignment problem with the Hungarian method in O(n³) time,
/// where n is the length of the longer list.
pub fn calc_error(ground_truth: &[EntitySpan], predicted: &[EntitySpan]) -> Result<usize> {
    check_spans(ground_truth, predicted)?;
    let (n, costs) = cost_matrix(ground_truth, predicted);
    if n == 0 {
        return Ok(0);
    }
    tracing::trace!(n, "solving span assignment");

    let cost = |row: usize, col: usize| costs[(row - 1) * n + (col - 1)];
    let inf = i64::MAX / 4;

    // Potentials and matching are 1-based; column 0 is a virtual start.
    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; n + 1];
    let mut row_of = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        row_of[0] = row;
        let mut col0 = 0;
        let mut min_slack = vec![inf; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[col0] = true;
            let row0 = row_of[col0];
            let mut delta = inf;
            let mut col1 = 0;
            for col in 1..=n {
                if used[col] {
                    continue;
                }
                let slack = cost(row0, col) - u[row0] - v[col];
                if slack < min_slack[col] {
                    min_slack[col] = slack;
                    way[col] = col0;
                }
                if min_slack[col] < delta {
                    delta = min_slack[col];
                    col1 = col;
                }
            }
            for col in 0..=n {
                if used[col] {
                    u[row_of[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_slack[col] -= delta;
                }
            }
            col0 = col1;
            if row_of[col0] == 0 {
                break;
            }
        }
        // Flip the augmenting path back to the virtual column.
        while col0 != 0 {
            let prev = way[col0];
            row_of[col0] = row_of[prev];
            col0 = prev;
        }
    }

    Ok((1..=n).map(|col| cost(row_of[col], col) as usize).sum())
}

/// Same result as [`calc_error`], by enumerating every permutation.
///
/// Factorial time; only meant for checking [`calc_error`] on small inputs.
pub fn calc_error_exhaustive(ground_truth: &[EntitySpan], predicted: &[EntitySpan]) -> Result<usize> {
    fn search(costs: &[i64], n: usize, row: usize, used: &mut [bool], partial: i64, best: &mut i64) {
        if row == n {
            *best = (*best).min(partial);
            return;
        }
        for col in 0..n {
            if !used[col] {
                used[col] = true;
                search(costs, n, row + 1, used, partial + costs[row * n + col], best);
                used[col] = false;
            }
        }
    }

    check_spans(ground_truth, predicted)?;
    let (n, costs) = cost_matrix(ground_truth, predicted);
    let mut best = i64::MAX;
    search(&costs, n, 0, &mut vec![false; n], 0, &mut best);
    Ok(best as usize)
}

/// [`calc_error`] over many independent documents in parallel.
///
/// Args:
///     documents: `(ground_truth, predicted)` span lists, one pair per document
///
/// Returns:
///     One error per document, in input order, or the first document's
///     error if any span is inverted
pub fn calc_error_batch<G, P>(documents: &[(G, P)]) -> Result<Vec<usize>>
where
    G: AsRef<[EntitySpan]> + Sync,
    P: AsRef<[EntitySpan]> + Sync,
{
    documents
        .par_iter()
        .map(|(truth, predicted)| calc_error(truth.as_ref(), predicted.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, entity_id: u32) -> EntitySpan {
        EntitySpan::new(start, end, entity_id)
    }

    #[test]
    fn test_error_pair_disjoint() {
        assert_eq!(error_pair(Some(&span(0, 1, 1)), Some(&span(5, 7, 1))).unwrap(), 5);
        assert_eq!(error_pair(Some(&span(0, 1, 1)), Some(&span(5, 7, 2))).unwrap(), 5);
        assert_eq!(error_pair(None, None).unwrap(), 0);
    }

    #[test]
    fn test_error_pair_nested() {
        assert_eq!(error_pair(Some(&span(0, 9, 1)), Some(&span(3, 4, 1))).unwrap(), 8);
        assert_eq!(error_pair(Some(&span(0, 9, 1)), Some(&span(3, 4, 2))).unwrap(), 10);
    }

    #[test]
    fn test_calc_error_examples() {
        assert_eq!(calc_error(&[], &[]).unwrap(), 0);
        assert_eq!(calc_error(&[span(1, 3, 1)], &[span(1, 3, 1)]).unwrap(), 0);
        assert_eq!(calc_error(&[span(1, 3, 1)], &[span(1, 3, 2)]).unwrap(), 3);
        assert_eq!(
            calc_error(&[span(1, 3, 1), span(6, 8, 2)], &[span(2, 4, 1)]).unwrap(),
            5
        );
    }

    #[test]
    fn test_overlapping_spans_match_exhaustive() {
        let truth = [span(0, 3, 1), span(2, 5, 1)];
        let predicted = [span(1, 4, 1), span(4, 7, 1)];
        let expected = calc_error_exhaustive(&truth, &predicted).unwrap();
        assert_eq!(calc_error(&truth, &predicted).unwrap(), expected);
        assert_eq!(expected, 6);
    }

    #[test]
    fn test_only_predictions() {
        let predicted = [span(0, 0, 1), span(4, 6, 3)];
        assert_eq!(calc_error(&[], &predicted).unwrap(), 4);
        assert_eq!(calc_error_exhaustive(&[], &predicted).unwrap(), 4);
    }

    #[test]
    fn test_batch_keeps_order() {
        let documents = vec![
            (vec![span(1, 3, 1)], vec![span(1, 3, 2)]),
            (vec![], vec![]),
            (vec![span(1, 3, 1), span(6, 8, 2)], vec![span(2, 4, 1)]),
        ];
        assert_eq!(calc_error_batch(&documents).unwrap(), vec![3, 0, 5]);
    }

    #[test]
    fn test_inverted_span_rejected() {
        let inverted = span(3, 1, 1);
        assert!(matches!(
            error_pair(Some(&inverted), None),
            Err(MatchError::InvalidParameter(_))
        ));
        assert!(calc_error(&[span(0, 1, 1)], &[inverted]).is_err());
        assert!(calc_error(&[inverted], &[]).is_err());
        assert!(calc_error_exhaustive(&[], &[inverted]).is_err());
        let documents = vec![(vec![span(0, 1, 1)], vec![]), (vec![], vec![inverted])];
        assert!(calc_error_batch(&documents).is_err());
    }
}
