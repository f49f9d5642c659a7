/*!
Epsilon scale factors
=====================

Metrics whose reasonable ranges were chosen inconsistently produce evidence
curves that rise at very different tolerances. A scale factor `x` for metric
`j` stretches its epsilon axis so that its curve lies as close as possible to
the curve of the first (reference) metric, measured by the sum of squared
differences at the grid points,

```text
Σ_i (evidence[0][i] - evidence[j][round(x · i)])²,
```

where a rescaled index past the end of the grid stands for full acceptance
(evidence 1). The same is done on the log-evidence curves, skipping the
ε = 0 point, where the log-evidence is only a sentinel.

Scaling has two states: not yet fitted, and fitted. Fitting happens once; the
factors are not refitted afterwards.
 */

use crate::evidence::EvidenceCurve;
use crate::optimize::{self, Minimum};
use crate::transform::TransformedMetric;
use serde_derive::Serialize;
use tracing::{debug, warn};

/// Bounds of the search for the log-evidence scale factor. Log curves can
/// call for very large stretches, which the bounds keep in check.
pub const LOG_SCALE_LOWER_BOUND: f64 = 0.0;
pub const LOG_SCALE_UPPER_BOUND: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFactor {
    /// Largest absolute (working-space) value of the metric when rescaling,
    /// 1 otherwise. Only used to widen the posterior tolerance.
    pub initscale: f64,
    pub optscale: f64,
    pub logoptscale: f64,
    /// Whether both minimizations met their own stopping criterion.
    pub converged: bool,
}

impl ScaleFactor {
    pub fn unit() -> ScaleFactor {
        ScaleFactor {
            initscale: 1.0,
            optscale: 1.0,
            logoptscale: 1.0,
            converged: true,
        }
    }

    /// The factor applied to the reference tolerance when selecting posterior
    /// samples for this metric.
    pub fn posterior_scale(&self) -> f64 {
        self.initscale * self.logoptscale
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scaling {
    Unscaled,
    Scaled(Vec<ScaleFactor>),
}

/// The grid index `round(x · i)`. Negative stretches collapse onto the
/// ε = 0 point.
fn rescaled_index(x: f64, i: usize) -> usize {
    let idx = (x * i as f64).round();
    if idx > 0.0 {
        idx as usize
    } else {
        0
    }
}

/// Squared distance between the reference evidence curve and `curve`
/// stretched by `x`.
pub fn square_diff(x: f64, reference: &[f64], curve: &[f64]) -> f64 {
    let epsteps = reference.len() - 1;
    (0..=epsteps)
        .map(|i| {
            let idx = rescaled_index(x, i);
            let diff = if idx > epsteps {
                reference[i] - 1.0
            } else {
                reference[i] - curve[idx]
            };
            diff * diff
        })
        .sum()
}

/// Squared distance between the reference log-evidence curve and
/// `logcurve` stretched by `x`. Index 0 is skipped on the reference side and
/// remapped to index 1 on the stretched side.
pub fn log_square_diff(x: f64, reference: &[f64], logcurve: &[f64]) -> f64 {
    let epsteps = reference.len() - 1;
    (1..=epsteps)
        .map(|i| {
            let idx = rescaled_index(x, i);
            let diff = if idx > epsteps {
                // log(1) = 0
                reference[i]
            } else {
                reference[i] - logcurve[idx.max(1)]
            };
            diff * diff
        })
        .sum()
}

fn report(metric: &str, what: &str, m: &Minimum) {
    if !m.converged {
        warn!(
            "Metric {}: {} scale search did not converge (x = {}, objective = {}, {} evaluations)",
            metric, what, m.x, m.fx, m.evaluations
        );
    } else if !(m.x > 0.0) {
        warn!(
            "Metric {}: {} scale factor {} is not positive; its curve is probably degenerate",
            metric, what, m.x
        );
    } else {
        debug!("Metric {}: {} scale factor {}", metric, what, m.x);
    }
}

/// Fit linear and log scale factors of every metric against metric 0.
pub fn fit_scales(
    curves: &[EvidenceCurve],
    metrics: &[TransformedMetric],
    epsteps: usize,
) -> Vec<ScaleFactor> {
    let reference = &curves[0];
    debug_assert_eq!(reference.evidence.len(), epsteps + 1);
    curves
        .iter()
        .zip(metrics)
        .map(|(curve, metric)| {
            let linear = optimize::minimize_scalar(|x| {
                square_diff(x, &reference.evidence, &curve.evidence)
            });
            report(&metric.name, "linear", &linear);
            let log = optimize::minimize_bounded(
                |x| log_square_diff(x, &reference.logevidence, &curve.logevidence),
                LOG_SCALE_LOWER_BOUND,
                LOG_SCALE_UPPER_BOUND,
            );
            report(&metric.name, "log", &log);
            ScaleFactor {
                initscale: metric.max_abs_value(),
                optscale: linear.x,
                logoptscale: log.x,
                converged: linear.converged && log.converged,
            }
        })
        .collect()
}
