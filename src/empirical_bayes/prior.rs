//! Conjugate priors fitted across features by method of moments

use serde::Serialize;

/// Inverse-gamma prior on per-feature batch variances.
///
/// Fitted from the mean `m` and variance `s2` of the raw variance estimates:
/// `a = (2·s2 + m²) / s2`, `b = (m·s2 + m³) / s2`. Internally the prior keeps
/// `1/a` and `b/a`, which stay finite when every feature has the same variance
/// estimate (`s2 = 0`, a point-mass prior at `m`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InverseGammaPrior {
    inv_a: f64,
    b_over_a: f64,
}

impl InverseGammaPrior {
    /// Prior with explicit shape `a` and scale `b`
    #[cfg(test)]
    pub(crate) fn new(a: f64, b: f64) -> Self {
        Self {
            inv_a: 1.0 / a,
            b_over_a: b / a,
        }
    }

    /// Method-of-moments fit. `None` when the moments do not define a prior.
    pub fn from_moments(m: f64, s2: f64) -> Option<Self> {
        let denom = 2.0 * s2 + m * m;
        if !m.is_finite() || !s2.is_finite() || s2 < 0.0 || denom <= 0.0 {
            return None;
        }
        Some(Self {
            inv_a: s2 / denom,
            b_over_a: m * (s2 + m * m) / denom,
        })
    }

    /// Shape parameter; infinite for a point-mass prior
    pub fn a(&self) -> f64 {
        1.0 / self.inv_a
    }

    /// Scale parameter; infinite for a point-mass prior
    pub fn b(&self) -> f64 {
        self.b_over_a / self.inv_a
    }

    /// Posterior mode of the variance given `n` observations whose squared
    /// deviations sum to `sum2`: `(sum2 / 2 + b) / (n / 2 + a - 1)`
    pub fn posterior_variance(&self, sum2: f64, n: f64) -> f64 {
        (0.5 * sum2 * self.inv_a + self.b_over_a) / (0.5 * n * self.inv_a + 1.0 - self.inv_a)
    }
}

/// Normal prior on per-feature batch locations
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalPrior {
    /// Prior mean, `gamma_bar`
    pub mean: f64,
    /// Prior variance, `t2`
    pub variance: f64,
}

impl NormalPrior {
    /// Precision-weighted average of the raw estimate and the prior mean
    /// given `n` observations with variance `d`
    pub fn posterior_mean(&self, gamma_hat: f64, n: f64, d: f64) -> f64 {
        (self.variance * n * gamma_hat + d * self.mean) / (self.variance * n + d)
    }
}
