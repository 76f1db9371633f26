//! Likelihood models turning match evidence into a probability.
//!
//! Two families are provided:
//!
//! - [`Likelihood`] scores an entity against the observed tokens directly
//!   ([`MissingTokenLikelihood`], [`LogisticLikelihood`]).
//! - [`AddRemoveLikelihood`] scores the proportions of added and removed tokens
//!   of an observed window ([`PiecewiseAddRemoveLikelihood`]).
//!
//! Every model validates its parameters at construction and its inputs at
//! evaluation time; out-of-range values are errors, never clipped.

use rustc_hash::FxHashSet;

use super::error::{check_probability, MatchError, Result};

/// Token overlap between an entity and the observed tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub present: usize,
    pub missing: usize,
}

impl Overlap {
    /// Count entity tokens present in / absent from `observed` (set semantics).
    pub fn count(entity: &[String], observed: &[String]) -> Result<Self> {
        if entity.is_empty() {
            return Err(MatchError::EmptyTokens);
        }
        let observed: FxHashSet<&str> = observed.iter().map(String::as_str).collect();
        let present = entity
            .iter()
            .filter(|token| observed.contains(token.as_str()))
            .count();
        let overlap = Self {
            present,
            missing: entity.len() - present,
        };
        debug_assert_eq!(overlap.present + overlap.missing, entity.len());
        Ok(overlap)
    }

    /// Fraction of the entity's tokens that were observed.
    pub fn proportion_present(&self) -> f64 {
        self.present as f64 / (self.present + self.missing) as f64
    }
}

/// Scores an entity given the tokens observed in a window.
pub trait Likelihood {
    fn likelihood(&self, entity: &[String], observed: &[String]) -> Result<f64>;
}

/// Scores a window given the proportions of tokens added and removed
/// relative to an entity.
pub trait AddRemoveLikelihood {
    fn likelihood(&self, proportion_added: f64, proportion_removed: f64) -> Result<f64>;
}

/// Each entity token is independently dropped with probability `p_missing`:
/// `p = (1 - p_missing)^present * p_missing^missing`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissingTokenLikelihood {
    p_missing: f64,
}

impl MissingTokenLikelihood {
    pub fn new(p_missing: f64) -> Result<Self> {
        check_probability("p_missing", p_missing)?;
        Ok(Self { p_missing })
    }

    pub fn p_missing(&self) -> f64 {
        self.p_missing
    }

    /// Probability for explicit counts.
    pub fn probability(&self, overlap: Overlap) -> f64 {
        (1.0 - self.p_missing).powi(overlap.present as i32)
            * self.p_missing.powi(overlap.missing as i32)
    }
}

impl Likelihood for MissingTokenLikelihood {
    fn likelihood(&self, entity: &[String], observed: &[String]) -> Result<f64> {
        let overlap = Overlap::count(entity, observed)?;
        check_probability("likelihood", self.probability(overlap))
    }
}

/// Logistic curve over the proportion of entity tokens present:
/// `p = 1 / (1 + exp(-k * (proportion - x0)))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticLikelihood {
    k: f64,
    x0: f64,
}

impl LogisticLikelihood {
    /// `k` is the steepness and must be positive; `x0` is the midpoint.
    pub fn new(k: f64, x0: f64) -> Result<Self> {
        if !(k.is_finite() && k > 0.0) {
            return Err(MatchError::invalid_parameter(format!(
                "logistic steepness must be positive and finite, got {}",
                k
            )));
        }
        if !x0.is_finite() {
            return Err(MatchError::invalid_parameter(format!(
                "logistic midpoint must be finite, got {}",
                x0
            )));
        }
        Ok(Self { k, x0 })
    }

    pub fn evaluate(&self, proportion: f64) -> Result<f64> {
        check_probability("proportion", proportion)?;
        let p = 1.0 / (1.0 + (-self.k * (proportion - self.x0)).exp());
        check_probability("likelihood", p)
    }

    /// Value when every entity token is present.
    pub fn maximum(&self) -> f64 {
        1.0 / (1.0 + (-self.k * (1.0 - self.x0)).exp())
    }
}

impl Likelihood for LogisticLikelihood {
    fn likelihood(&self, entity: &[String], observed: &[String]) -> Result<f64> {
        let overlap = Overlap::count(entity, observed)?;
        self.evaluate(overlap.proportion_present())
    }
}

/// Closed set of [`Likelihood`] models, for callers choosing at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LikelihoodModel {
    MissingToken(MissingTokenLikelihood),
    Logistic(LogisticLikelihood),
}

impl Likelihood for LikelihoodModel {
    fn likelihood(&self, entity: &[String], observed: &[String]) -> Result<f64> {
        match self {
            Self::MissingToken(model) => model.likelihood(entity, observed),
            Self::Logistic(model) => model.likelihood(entity, observed),
        }
    }
}

/// Piecewise-linear curve through `(0, 1)`, `(x0, p0)`, `(x1, p1)`, `(1, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiecewiseLinear {
    x0: f64,
    p0: f64,
    x1: f64,
    p1: f64,
}

impl PiecewiseLinear {
    /// # Errors
    /// Requires `0 < x0 < x1 < 1` and `p0`, `p1` in `[0, 1]`.
    pub fn new((x0, p0): (f64, f64), (x1, p1): (f64, f64)) -> Result<Self> {
        if !(0.0 < x0 && x0 < x1 && x1 < 1.0) {
            return Err(MatchError::invalid_parameter(format!(
                "break points must satisfy 0 < x0 < x1 < 1, got x0={} x1={}",
                x0, x1
            )));
        }
        check_probability("p0", p0)?;
        check_probability("p1", p1)?;
        Ok(Self { x0, p0, x1, p1 })
    }

    pub fn evaluate(&self, x: f64) -> Result<f64> {
        check_probability("proportion", x)?;
        let (from, to) = if x < self.x0 {
            ((0.0, 1.0), (self.x0, self.p0))
        } else if x <= self.x1 {
            ((self.x0, self.p0), (self.x1, self.p1))
        } else {
            ((self.x1, self.p1), (1.0, 0.0))
        };
        check_probability("likelihood", interpolate(from, to, x))
    }
}

/// Linear interpolation; exact at both break points.
#[inline]
fn interpolate((xa, ya): (f64, f64), (xb, yb): (f64, f64), x: f64) -> f64 {
    let t = (x - xa) / (xb - xa);
    ya + (yb - ya) * t
}

/// Product of two piecewise curves: one over the proportion of added tokens,
/// one over the proportion of removed tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiecewiseAddRemoveLikelihood {
    added: PiecewiseLinear,
    removed: PiecewiseLinear,
}

impl PiecewiseAddRemoveLikelihood {
    pub fn new(added: PiecewiseLinear, removed: PiecewiseLinear) -> Self {
        Self { added, removed }
    }

    /// Use the same curve for both proportions.
    pub fn symmetric(curve: PiecewiseLinear) -> Self {
        Self::new(curve, curve)
    }
}

impl AddRemoveLikelihood for PiecewiseAddRemoveLikelihood {
    fn likelihood(&self, proportion_added: f64, proportion_removed: f64) -> Result<f64> {
        let added = self.added.evaluate(proportion_added)?;
        let removed = self.removed.evaluate(proportion_removed)?;
        check_probability("likelihood", added * removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_token_full_match() {
        let model = MissingTokenLikelihood::new(0.1).unwrap();
        let entity = tokens(&["10", "downing", "street"]);
        let p = model.likelihood(&entity, &entity).unwrap();
        assert!((p - 0.9f64.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_token_one_missing() {
        let model = MissingTokenLikelihood::new(0.1).unwrap();
        let entity = tokens(&["10", "downing", "street"]);
        let observed = tokens(&["10", "street", "london"]);
        let p = model.likelihood(&entity, &observed).unwrap();
        assert!((p - 0.9 * 0.9 * 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_missing_token_rejects_bad_probability() {
        assert!(MissingTokenLikelihood::new(1.5).is_err());
        assert!(MissingTokenLikelihood::new(-0.1).is_err());
        assert!(MissingTokenLikelihood::new(f64::NAN).is_err());
    }

    #[test]
    fn test_overlap_rejects_empty_entity() {
        assert!(matches!(
            Overlap::count(&[], &tokens(&["a"])),
            Err(MatchError::EmptyTokens)
        ));
    }

    #[test]
    fn test_logistic_maximum_at_full_match() {
        let model = LogisticLikelihood::new(10.0, 0.5).unwrap();
        let entity = tokens(&["a", "b", "c", "d"]);
        let full = model.likelihood(&entity, &entity).unwrap();
        assert!((full - model.maximum()).abs() < 1e-12);

        let half = model.likelihood(&entity, &tokens(&["a", "b"])).unwrap();
        assert!((half - 0.5).abs() < 1e-12);
        assert!(half < full);
    }

    #[test]
    fn test_logistic_rejects_bad_parameters() {
        assert!(LogisticLikelihood::new(0.0, 0.5).is_err());
        assert!(LogisticLikelihood::new(f64::INFINITY, 0.5).is_err());
        assert!(LogisticLikelihood::new(1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_piecewise_break_points() {
        let curve = PiecewiseLinear::new((0.2, 0.8), (0.6, 0.4)).unwrap();
        assert!((curve.evaluate(0.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((curve.evaluate(0.1).unwrap() - 0.9).abs() < 1e-12);
        assert!((curve.evaluate(0.2).unwrap() - 0.8).abs() < 1e-12);
        assert!((curve.evaluate(0.4).unwrap() - 0.6).abs() < 1e-12);
        assert!((curve.evaluate(0.6).unwrap() - 0.4).abs() < 1e-12);
        assert!((curve.evaluate(0.8).unwrap() - 0.2).abs() < 1e-12);
        assert!(curve.evaluate(1.0).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_piecewise_stays_in_range_without_clipping() {
        for (p0, p1) in [(0.0, 1.0), (1.0, 0.0), (0.0, 0.0), (1.0, 1.0), (0.3, 0.7)] {
            let curve = PiecewiseLinear::new((0.1, p0), (0.7, p1)).unwrap();
            assert_eq!(curve.evaluate(0.0).unwrap(), 1.0);
            assert_eq!(curve.evaluate(0.1).unwrap(), p0);
            assert_eq!(curve.evaluate(0.7).unwrap(), p1);
            assert_eq!(curve.evaluate(1.0).unwrap(), 0.0);
            for i in 0..=1000 {
                let p = curve.evaluate(i as f64 / 1000.0).unwrap();
                assert!((0.0..=1.0).contains(&p));
            }
        }
    }

    #[test]
    fn test_piecewise_validation() {
        assert!(PiecewiseLinear::new((0.0, 0.8), (0.6, 0.4)).is_err());
        assert!(PiecewiseLinear::new((0.6, 0.8), (0.2, 0.4)).is_err());
        assert!(PiecewiseLinear::new((0.2, 0.8), (1.0, 0.4)).is_err());
        assert!(PiecewiseLinear::new((0.2, 1.2), (0.6, 0.4)).is_err());

        let curve = PiecewiseLinear::new((0.2, 0.8), (0.6, 0.4)).unwrap();
        assert!(curve.evaluate(-0.1).is_err());
        assert!(curve.evaluate(1.1).is_err());
    }

    #[test]
    fn test_add_remove_is_product() {
        let added = PiecewiseLinear::new((0.2, 0.8), (0.6, 0.4)).unwrap();
        let removed = PiecewiseLinear::new((0.1, 0.5), (0.5, 0.1)).unwrap();
        let model = PiecewiseAddRemoveLikelihood::new(added, removed);
        let p = model.likelihood(0.2, 0.1).unwrap();
        assert!((p - 0.8 * 0.5).abs() < 1e-12);
        assert!((model.likelihood(0.0, 0.0).unwrap() - 1.0).abs() < 1e-12);
        assert!(model.likelihood(1.0, 0.0).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_model_enum_dispatch() {
        let entity = tokens(&["a", "b"]);
        let model = LikelihoodModel::MissingToken(MissingTokenLikelihood::new(0.2).unwrap());
        assert!((model.likelihood(&entity, &entity).unwrap() - 0.64).abs() < 1e-12);
    }
}
