/*!
Metric transformation
=====================

Every metric is compared against epsilon in the same dimensionless space: the
deviation of a run's value from the target, in units of the metric's
reasonable range,

```text
(value - target) / (maximum - minimum).
```

Metrics flagged with the `log` operator are compared on a logarithmic scale,
so target, bounds and every value are replaced by their natural logarithm
first.
 */

use crate::error::{AbcError, Result};
use crate::metadata::{MetricSpec, Operator};
use serde_derive::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TransformedMetric {
    pub name: String,
    pub display: String,
    /// Target and bounds in the working (possibly logarithmic) space.
    pub target: f64,
    pub minimum: f64,
    pub maximum: f64,
    /// The metric values in the working space, before normalization.
    #[serde(skip)]
    pub values: Vec<f64>,
    /// Normalized deviation from the target, one entry per run.
    #[serde(skip)]
    pub deviations: Vec<f64>,
}

impl TransformedMetric {
    pub fn range(&self) -> f64 {
        self.maximum - self.minimum
    }

    /// Whether a run with the given normalized deviation is accepted at
    /// tolerance `epsilon`.
    pub fn in_epsilon_box(deviation: f64, epsilon: f64) -> bool {
        deviation.abs() < epsilon
    }

    /// Largest absolute working-space value of the metric.
    pub fn max_abs_value(&self) -> f64 {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| v.abs())
            .fold(0.0, crate::util::greater_of_two)
    }
}

fn checked_ln(metric: &str, value: f64) -> Result<f64> {
    if value > 0.0 {
        Ok(value.ln())
    } else {
        Err(AbcError::Domain {
            metric: metric.to_string(),
            value,
        })
    }
}

/// Transform the raw column of a metric. The column is consumed and
/// transformed in place; the run table it was copied from is not touched.
pub fn transform(spec: &MetricSpec, mut column: Vec<f64>) -> Result<TransformedMetric> {
    let (mut target, mut minimum, mut maximum) = (spec.target, spec.minimum, spec.maximum);
    if spec.operator == Operator::Log {
        target = checked_ln(&spec.name, target)?;
        minimum = checked_ln(&spec.name, minimum)?;
        maximum = checked_ln(&spec.name, maximum)?;
        // Missing values stay missing.
        for v in column.iter_mut().filter(|v| !v.is_nan()) {
            *v = checked_ln(&spec.name, *v)?;
        }
    }

    if minimum > target {
        return Err(AbcError::configuration(format!(
            "Metric {}: minimum ({}) > calibration value ({})",
            spec.name, minimum, target
        )));
    }
    if target > maximum {
        return Err(AbcError::configuration(format!(
            "Metric {}: calibration value ({}) > maximum ({})",
            spec.name, target, maximum
        )));
    }
    if !(maximum > minimum) {
        return Err(AbcError::configuration(format!(
            "Metric {}: minimum ({}) must be less than maximum ({})",
            spec.name, minimum, maximum
        )));
    }

    let range = maximum - minimum;
    let deviations = column.iter().map(|v| (v - target) / range).collect();

    Ok(TransformedMetric {
        name: spec.name.clone(),
        display: spec.display.clone(),
        target,
        minimum,
        maximum,
        values: column,
        deviations,
    })
}
