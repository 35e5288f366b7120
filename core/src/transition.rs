//! Prior over transitions between edge states.
//!
//! A vehicle moves from the edge state of its previous observation (on some edge, or
//! off-road) to that of its current one. The model distinguishes four regimes and assigns
//! each a probability from two Bernoulli pairs:
//!
//! | previous | candidate | regime | probability |
//! |---|---|---|---|
//! | off-road | off-road | [`TransitionKind::OffToOff`] | free-motion "stay off" |
//! | off-road | edge | [`TransitionKind::OffToOn`] | free-motion "get on" |
//! | edge | off-road | [`TransitionKind::OnToOff`] | edge-motion "get off" |
//! | edge | edge | [`TransitionKind::OnToOn`] | edge-motion "stay on" |
//!
//! Moving from one edge to the next and staying on the same edge both count as staying on
//! the road. The pairs are derived from pseudo-count priors, or drawn from the Beta
//! distributions those counts define.
use std::fmt::{self, Display};

use log::trace;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::graph::InferredEdge;

/// Regime of a transition between two edge states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    OffToOff,
    OffToOn,
    OnToOff,
    OnToOn,
}
impl TransitionKind {
    /// Classify the ordered pair `(previous, candidate)`; `None` is off-road.
    pub fn classify(previous: Option<&InferredEdge>, candidate: Option<&InferredEdge>) -> Self {
        match (previous.is_some(), candidate.is_some()) {
            (false, false) => TransitionKind::OffToOff,
            (false, true) => TransitionKind::OffToOn,
            (true, false) => TransitionKind::OnToOff,
            (true, true) => TransitionKind::OnToOn,
        }
    }
    pub fn starts_on_road(self) -> bool {
        matches!(self, TransitionKind::OnToOff | TransitionKind::OnToOn)
    }
    pub fn ends_on_road(self) -> bool {
        matches!(self, TransitionKind::OffToOn | TransitionKind::OnToOn)
    }
}
impl Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionKind::OffToOff => "off->off",
            TransitionKind::OffToOn => "off->on",
            TransitionKind::OnToOff => "on->off",
            TransitionKind::OnToOn => "on->on",
        };
        f.write_str(s)
    }
}

/// Pseudo-count priors of the two Bernoulli pairs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Counts for `[stay off-road, get on a road]`.
    pub free_motion_counts: [f64; 2],
    /// Counts for `[stay on the road, get off the road]`.
    pub edge_motion_counts: [f64; 2],
}
impl Default for TransitionConfig {
    fn default() -> Self {
        TransitionConfig {
            free_motion_counts: [1.0, 1.0],
            edge_motion_counts: [19.0, 1.0],
        }
    }
}
impl TransitionConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, counts) in [
            ("free_motion_counts", &self.free_motion_counts),
            ("edge_motion_counts", &self.edge_motion_counts),
        ] {
            if counts.iter().any(|c| !(c.is_finite() && *c > 0.0)) {
                return Err(TrackingError::Config(format!(
                    "{name} must be positive and finite, got {counts:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Edge-transition prior with fixed Bernoulli parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeTransitionModel {
    /// `[stay off, get on]`
    free_motion: [f64; 2],
    /// `[stay on, get off]`
    edge_motion: [f64; 2],
}
impl Default for EdgeTransitionModel {
    fn default() -> Self {
        EdgeTransitionModel::from_counts(&TransitionConfig::default())
    }
}
impl Display for EdgeTransitionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeTransitionModel")
            .field("free_motion", &self.free_motion)
            .field("edge_motion", &self.edge_motion)
            .finish()
    }
}
impl EdgeTransitionModel {
    /// Model whose parameters are the means of the configured priors.
    pub fn new(config: &TransitionConfig) -> Result<EdgeTransitionModel> {
        config.validate()?;
        Ok(EdgeTransitionModel::from_counts(config))
    }
    fn from_counts(config: &TransitionConfig) -> EdgeTransitionModel {
        let normalize = |c: [f64; 2]| {
            let total = c[0] + c[1];
            [c[0] / total, c[1] / total]
        };
        EdgeTransitionModel {
            free_motion: normalize(config.free_motion_counts),
            edge_motion: normalize(config.edge_motion_counts),
        }
    }
    /// Model from the probability of staying off-road and of staying on the road.
    pub fn from_probabilities(stay_off: f64, stay_on: f64) -> Result<EdgeTransitionModel> {
        for p in [stay_off, stay_on] {
            if !(0.0..=1.0).contains(&p) {
                return Err(TrackingError::invalid(format!(
                    "transition probability {p} is outside [0, 1]"
                )));
            }
        }
        Ok(EdgeTransitionModel {
            free_motion: [stay_off, 1.0 - stay_off],
            edge_motion: [stay_on, 1.0 - stay_on],
        })
    }
    /// Model with parameters drawn from the Beta priors defined by `config`.
    pub fn sample_from_prior<R: Rng + ?Sized>(
        config: &TransitionConfig,
        rng: &mut R,
    ) -> Result<EdgeTransitionModel> {
        config.validate()?;
        let draw = |counts: [f64; 2], rng: &mut R| -> Result<f64> {
            let beta = Beta::new(counts[0], counts[1])
                .map_err(|e| TrackingError::Config(format!("invalid Beta prior {counts:?}: {e}")))?;
            Ok(beta.sample(rng))
        };
        let stay_off = draw(config.free_motion_counts, &mut *rng)?;
        let stay_on = draw(config.edge_motion_counts, &mut *rng)?;
        EdgeTransitionModel::from_probabilities(stay_off, stay_on)
    }
    /// `[stay off, get on]`
    pub fn free_motion_probabilities(&self) -> [f64; 2] {
        self.free_motion
    }
    /// `[stay on, get off]`
    pub fn edge_motion_probabilities(&self) -> [f64; 2] {
        self.edge_motion
    }
    pub fn probability(&self, kind: TransitionKind) -> f64 {
        match kind {
            TransitionKind::OffToOff => self.free_motion[0],
            TransitionKind::OffToOn => self.free_motion[1],
            TransitionKind::OnToOn => self.edge_motion[0],
            TransitionKind::OnToOff => self.edge_motion[1],
        }
    }
    /// Log-probability of moving from `previous` to `candidate`.
    ///
    /// Impossible regimes evaluate to negative infinity.
    pub fn log_evaluate(
        &self,
        previous: Option<&InferredEdge>,
        candidate: Option<&InferredEdge>,
    ) -> f64 {
        let kind = TransitionKind::classify(previous, candidate);
        let p = self.probability(kind);
        let log_p = if p > 0.0 { p.ln() } else { f64::NEG_INFINITY };
        trace!("transition {kind}: p = {p}, ln p = {log_p}");
        log_p
    }
    /// Draw the regime of the next transition given the previous edge state.
    pub fn sample_kind<R: Rng + ?Sized>(
        &self,
        previous: Option<&InferredEdge>,
        rng: &mut R,
    ) -> TransitionKind {
        let u: f64 = rng.random();
        match previous {
            None if u < self.free_motion[0] => TransitionKind::OffToOff,
            None => TransitionKind::OffToOn,
            Some(_) if u < self.edge_motion[0] => TransitionKind::OnToOn,
            Some(_) => TransitionKind::OnToOff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeId;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::Vector2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn edge(id: u64) -> InferredEdge {
        InferredEdge::new(EdgeId(id), vec![Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0)])
            .unwrap()
    }

    #[test]
    fn classify_all_regimes() {
        let a = edge(1);
        let b = edge(2);
        assert_eq!(TransitionKind::classify(None, None), TransitionKind::OffToOff);
        assert_eq!(TransitionKind::classify(None, Some(&a)), TransitionKind::OffToOn);
        assert_eq!(TransitionKind::classify(Some(&a), None), TransitionKind::OnToOff);
        assert_eq!(TransitionKind::classify(Some(&a), Some(&a)), TransitionKind::OnToOn);
        assert_eq!(TransitionKind::classify(Some(&a), Some(&b)), TransitionKind::OnToOn);
        assert!(TransitionKind::OnToOff.starts_on_road());
        assert!(!TransitionKind::OnToOff.ends_on_road());
    }

    #[test]
    fn default_model_probabilities() {
        let model = EdgeTransitionModel::default();
        let a = edge(1);
        assert_approx_eq!(model.log_evaluate(None, None), 0.5_f64.ln(), 1e-12);
        assert_approx_eq!(model.log_evaluate(None, Some(&a)), 0.5_f64.ln(), 1e-12);
        assert_approx_eq!(model.log_evaluate(Some(&a), Some(&a)), 0.95_f64.ln(), 1e-12);
        assert_approx_eq!(model.log_evaluate(Some(&a), None), 0.05_f64.ln(), 1e-12);
    }

    #[test]
    fn log_evaluate_is_pure() {
        let model = EdgeTransitionModel::new(&TransitionConfig {
            free_motion_counts: [3.0, 1.0],
            edge_motion_counts: [9.0, 1.0],
        })
        .unwrap();
        let a = edge(1);
        let first = model.log_evaluate(Some(&a), None);
        for _ in 0..5 {
            assert_eq!(model.log_evaluate(Some(&a), None), first);
        }
        assert_approx_eq!(first, 0.1_f64.ln(), 1e-12);
    }

    #[test]
    fn zero_probability_is_negative_infinity() {
        let model = EdgeTransitionModel::from_probabilities(1.0, 1.0).unwrap();
        let a = edge(1);
        assert_eq!(model.log_evaluate(None, Some(&a)), f64::NEG_INFINITY);
        assert_eq!(model.log_evaluate(Some(&a), None), f64::NEG_INFINITY);
        assert_eq!(model.log_evaluate(None, None), 0.0);
        assert!(EdgeTransitionModel::from_probabilities(1.5, 0.5).is_err());
    }

    #[test]
    fn invalid_counts_rejected() {
        let config = TransitionConfig {
            free_motion_counts: [0.0, 1.0],
            ..Default::default()
        };
        assert!(matches!(
            EdgeTransitionModel::new(&config),
            Err(TrackingError::Config(_))
        ));
    }

    #[test]
    fn sampled_kinds_follow_parameters() {
        let model = EdgeTransitionModel::from_probabilities(0.2, 0.9).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let a = edge(1);
        let n = 10_000;
        let stays = (0..n)
            .filter(|_| model.sample_kind(Some(&a), &mut rng) == TransitionKind::OnToOn)
            .count();
        assert_approx_eq!(stays as f64 / n as f64, 0.9, 0.02);
        let offs = (0..n)
            .filter(|_| model.sample_kind(None, &mut rng) == TransitionKind::OffToOff)
            .count();
        assert_approx_eq!(offs as f64 / n as f64, 0.2, 0.02);
    }

    #[test]
    fn prior_draws_are_valid_probabilities() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = TransitionConfig::default();
        let mut mean_stay_on = 0.0;
        for _ in 0..2_000 {
            let model = EdgeTransitionModel::sample_from_prior(&config, &mut rng).unwrap();
            let [stay_on, get_off] = model.edge_motion_probabilities();
            assert_approx_eq!(stay_on + get_off, 1.0, 1e-12);
            mean_stay_on += stay_on;
        }
        assert_approx_eq!(mean_stay_on / 2_000.0, 0.95, 0.02);
    }
}
