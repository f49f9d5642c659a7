/*!
Evidence curves
===============

For every metric `j` and every point `ε_i = maxep · i / epsteps` of a uniform
grid, the evidence is the fraction of runs accepted at that tolerance,

```text
evidence[j][i] = |{ runs r : |deviation_j(r)| < ε_i }| / |runs|.
```

Because the acceptance region only grows with ε, every evidence curve is
non-decreasing. Alongside the evidence we keep the evidence ratio
(`evidence / ε`, 0 at ε = 0), the log-evidence (0 wherever the evidence is 0,
so that no infinities leak into later sums), and Riemann-sum moments of the
evidence and log-evidence curves.

Counting is done on the sorted absolute deviations, which gives exactly the
same counts as testing every run against every grid point.
 */

use crate::error::{AbcError, Result};
use crate::metadata::MetricSpec;
use crate::scale::{self, ScaleFactor, Scaling};
use crate::settings::Settings;
use crate::table::RunTable;
use crate::transform::{self, TransformedMetric};
use itertools::Itertools;
use rayon::prelude::*;
use serde_derive::Serialize;
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceCurve {
    pub evidence: Vec<f64>,
    pub evratio: Vec<f64>,
    pub logevidence: Vec<f64>,
    /// Σ evidence(ε_i) · ε_i, an approximation of the evidence integral.
    pub moment: f64,
    /// Σ log evidence(ε_i) · ε_i over the grid points with positive evidence.
    pub logmoment: f64,
}

impl EvidenceCurve {
    pub fn compute(deviations: &[f64], epsilons: &[f64]) -> EvidenceCurve {
        let mut sorted: Vec<f64> = deviations.iter().map(|d| d.abs()).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let total = deviations.len() as f64;

        let mut curve = EvidenceCurve {
            evidence: Vec::with_capacity(epsilons.len()),
            evratio: Vec::with_capacity(epsilons.len()),
            logevidence: Vec::with_capacity(epsilons.len()),
            moment: 0.0,
            logmoment: 0.0,
        };
        for (i, &epsilon) in epsilons.iter().enumerate() {
            // NaN deviations sort last and are never accepted.
            let accepted = sorted.partition_point(|&d| d < epsilon);
            let evidence = if total > 0.0 {
                accepted as f64 / total
            } else {
                0.0
            };
            curve.evidence.push(evidence);
            curve
                .evratio
                .push(if i > 0 { evidence / epsilon } else { 0.0 });
            curve.moment += evidence * epsilon;
            if evidence > 0.0 {
                let log = evidence.ln();
                curve.logevidence.push(log);
                curve.logmoment += log * epsilon;
            } else {
                curve.logevidence.push(0.0);
            }
        }
        curve
    }
}

/// The epsilon grid `maxep · i / epsteps` for `i = 0..=epsteps`.
pub fn epsilon_grid(epsteps: usize, maxep: f64) -> Vec<f64> {
    (0..=epsteps)
        .map(|i| maxep / epsteps as f64 * i as f64)
        .collect()
}

pub struct EvidenceEngine {
    table: RunTable,
    metrics: Vec<TransformedMetric>,
    settings: Settings,
    epsilons: Vec<f64>,
    curves: Vec<EvidenceCurve>,
    scaling: Scaling,
}

impl EvidenceEngine {
    /// Transform every metric and compute its evidence curve. Any
    /// inconsistency between metadata and run data fails here, before a
    /// single curve is computed.
    pub fn new(table: RunTable, metrics: &[MetricSpec], settings: Settings) -> Result<EvidenceEngine> {
        settings.validate()?;
        if metrics.is_empty() {
            return Err(AbcError::configuration("At least one metric is needed"));
        }

        let mut transformed = Vec::with_capacity(metrics.len());
        for spec in metrics {
            let column = table.numeric_column(&spec.name)?.to_vec();
            transformed.push(transform::transform(spec, column)?);
        }

        let epsilons = epsilon_grid(settings.epsteps, settings.maxep);
        info!(
            "Computing evidence for {} metrics over {} runs and {} tolerances",
            transformed.len(),
            table.len(),
            epsilons.len()
        );
        let curves: Vec<EvidenceCurve> = transformed
            .par_iter()
            .map(|m| EvidenceCurve::compute(&m.deviations, &epsilons))
            .collect();
        for (m, c) in transformed.iter().zip(&curves) {
            debug!(
                "Metric {}: evidence at maxep {:.4}, moment {:.4}",
                m.name,
                c.evidence.last().copied().unwrap_or(0.0),
                c.moment
            );
        }

        Ok(EvidenceEngine {
            table,
            metrics: transformed,
            settings,
            epsilons,
            curves,
            scaling: Scaling::Unscaled,
        })
    }

    pub fn n_metrics(&self) -> usize {
        self.metrics.len()
    }

    pub fn metrics(&self) -> &[TransformedMetric] {
        &self.metrics
    }

    pub fn metric(&self, j: usize) -> &TransformedMetric {
        &self.metrics[j]
    }

    pub fn table(&self) -> &RunTable {
        &self.table
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn curve(&self, j: usize) -> &EvidenceCurve {
        &self.curves[j]
    }

    pub fn curves(&self) -> &[EvidenceCurve] {
        &self.curves
    }

    /// One of the four derived arrays of metric `j`. The log of the evidence
    /// ratio follows the same convention as the log-evidence: 0 where the
    /// ratio is 0.
    pub fn evidences(&self, j: usize, log: bool, ratio: bool) -> Cow<'_, [f64]> {
        let c = &self.curves[j];
        match (ratio, log) {
            (true, true) => Cow::Owned(
                c.evratio
                    .iter()
                    .map(|&r| if r > 0.0 { r.ln() } else { 0.0 })
                    .collect(),
            ),
            (true, false) => Cow::Borrowed(&c.evratio),
            (false, true) => Cow::Borrowed(&c.logevidence),
            (false, false) => Cow::Borrowed(&c.evidence),
        }
    }

    /// The epsilon grid, or the grid divided by metric `j`'s linear or log
    /// scale factor. Asking for scaled epsilons fits the scale factors if that
    /// has not happened yet.
    pub fn epsilons(&mut self, j: usize, scaled: bool, log: bool) -> Vec<f64> {
        if !scaled {
            return self.epsilons.clone();
        }
        let factor = self.compute_scales()[j];
        let divisor = if log { factor.logoptscale } else { factor.optscale };
        self.epsilons.iter().map(|e| e / divisor).collect()
    }

    pub fn grid(&self) -> &[f64] {
        &self.epsilons
    }

    /// Fit the per-metric scale factors, once. Later calls return the stored
    /// factors.
    pub fn compute_scales(&mut self) -> &[ScaleFactor] {
        if let Scaling::Unscaled = self.scaling {
            let factors = if self.settings.rescale {
                scale::fit_scales(&self.curves, &self.metrics, self.settings.epsteps)
            } else {
                vec![ScaleFactor::unit(); self.metrics.len()]
            };
            self.scaling = Scaling::Scaled(factors);
        }
        match &self.scaling {
            Scaling::Scaled(factors) => factors.as_slice(),
            Scaling::Unscaled => &[],
        }
    }

    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    pub fn save_evidences<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save_columns(path, |c| &c.evidence)
    }

    pub fn save_evidence_ratios<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save_columns(path, |c| &c.evratio)
    }

    fn save_columns<P, F>(&self, path: P, select: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: Fn(&EvidenceCurve) -> &Vec<f64>,
    {
        let table = EvidenceTable {
            metrics: self.metrics.iter().map(|m| m.name.clone()).collect(),
            epsilons: self.epsilons.clone(),
            values: self.curves.iter().map(|c| select(c).clone()).collect(),
        };
        table.save(path, self.settings.delimiter_byte()?)
    }

    /// Write the scaled curves of every metric as `metric,epsilon,value` rows.
    pub fn save_scaled_curves<P: AsRef<Path>>(&mut self, path: P, log: bool, ratio: bool) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.settings.delimiter_byte()?)
            .from_path(path)?;
        writer.write_record(&["metric", "epsilon", "value"])?;
        for j in 0..self.n_metrics() {
            let epsilons = self.epsilons(j, true, log);
            let values = self.evidences(j, log, ratio);
            for (e, v) in epsilons.iter().zip(values.iter()) {
                writer.write_record(&[self.metrics[j].name.clone(), e.to_string(), v.to_string()])?;
            }
        }
        writer.flush()?;
        info!("Wrote scaled curves to {}", path.display());
        Ok(())
    }

    /// A serializable digest of the engine: transformed metric bounds,
    /// moments and, once fitted, the scale factors.
    pub fn summary(&self) -> EngineSummary<'_> {
        EngineSummary {
            runs: self.table.len(),
            settings: &self.settings,
            metrics: self
                .metrics
                .iter()
                .zip(&self.curves)
                .map(|(m, c)| MetricSummary {
                    metric: m,
                    moment: c.moment,
                    logmoment: c.logmoment,
                })
                .collect(),
            scales: match &self.scaling {
                Scaling::Scaled(f) => Some(f),
                Scaling::Unscaled => None,
            },
        }
    }

    pub fn save_summary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &self.summary())?;
        Ok(())
    }
}

#[derive(Serialize)]
pub struct MetricSummary<'a> {
    #[serde(flatten)]
    pub metric: &'a TransformedMetric,
    pub moment: f64,
    pub logmoment: f64,
}

#[derive(Serialize)]
pub struct EngineSummary<'a> {
    pub runs: usize,
    pub settings: &'a Settings,
    pub metrics: Vec<MetricSummary<'a>>,
    pub scales: Option<&'a Vec<ScaleFactor>>,
}

/// The on-disk form of an evidence (or evidence ratio) file: a header
/// `epsilon,<metric>,...` and one row per grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceTable {
    pub metrics: Vec<String>,
    pub epsilons: Vec<f64>,
    /// One column of values per metric.
    pub values: Vec<Vec<f64>>,
}

impl EvidenceTable {
    pub fn save<P: AsRef<Path>>(&self, path: P, delimiter: u8) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)?;
        let header = std::iter::once("epsilon").chain(self.metrics.iter().map(String::as_str));
        writer.write_record(header)?;
        for (i, epsilon) in self.epsilons.iter().enumerate() {
            let row = std::iter::once(*epsilon)
                .chain(self.values.iter().map(|column| column[i]))
                .map(|v| v.to_string());
            writer.write_record(row)?;
        }
        writer.flush()?;
        info!(
            "Wrote {} columns ({}) to {}",
            self.metrics.len(),
            self.metrics.iter().join(", "),
            path.display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<EvidenceTable> {
        let table = RunTable::load(path, delimiter)?;
        let headers = table.headers();
        if headers.first().map(String::as_str) != Some("epsilon") {
            return Err(AbcError::configuration(format!(
                "Evidence file {} does not start with an epsilon column",
                table.source()
            )));
        }
        let metrics: Vec<String> = headers[1..].to_vec();
        let epsilons = table.numeric_column("epsilon")?.to_vec();
        let values = metrics
            .iter()
            .map(|m| table.numeric_column(m).map(<[f64]>::to_vec))
            .collect::<Result<Vec<_>>>()?;
        Ok(EvidenceTable {
            metrics,
            epsilons,
            values,
        })
    }
}
