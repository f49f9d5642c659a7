/*!
Posterior samples
=================

The runs whose deviation on a metric lies within the reference tolerance
(widened by that metric's scale factor) approximate the posterior over the
parameters. Only the dynamic parameters are reported. A sample with no more
runs than dynamic parameters cannot support any multivariate summary; it is
still returned, but flagged, and the reporting functions skip it.
 */

use crate::catalog::ParameterCatalog;
use crate::error::Result;
use crate::evidence::EvidenceEngine;
use crate::metadata::ParameterSpec;
use crate::transform::TransformedMetric;
use crate::util;
use serde_derive::Serialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorSample {
    pub metric: String,
    /// `refeps · scale`, in normalized deviation units.
    pub tolerance: f64,
    pub parameters: Vec<String>,
    /// Indices of the accepted runs in the run table.
    pub rows: Vec<usize>,
    /// One column of values per parameter, in `parameters` order.
    pub columns: Vec<Vec<f64>>,
}

impl PosteriorSample {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// More samples than dimensions.
    pub fn is_sufficient(&self) -> bool {
        self.len() > self.parameters.len()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.parameters
            .iter()
            .position(|p| p == name)
            .map(|k| self.columns[k].as_slice())
    }

    pub fn summaries(&self) -> Vec<ParameterSummary> {
        self.parameters
            .iter()
            .zip(&self.columns)
            .map(|(p, c)| ParameterSummary::of(p, c))
            .collect()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, delimiter: u8) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)?;
        writer.write_record(&self.parameters)?;
        for k in 0..self.len() {
            writer.write_record(self.columns.iter().map(|c| c[k].to_string()))?;
        }
        writer.flush()?;
        info!(
            "Wrote {} posterior samples for metric {} to {}",
            self.len(),
            self.metric,
            path.display()
        );
        Ok(())
    }
}

/// Select the runs accepted for metric `j` at `refeps · scale`.
pub fn select(
    engine: &EvidenceEngine,
    j: usize,
    refeps: f64,
    scale: f64,
    catalog: &ParameterCatalog,
) -> Result<PosteriorSample> {
    let metric: &TransformedMetric = engine.metric(j);
    let tolerance = refeps * scale;
    let rows: Vec<usize> = metric
        .deviations
        .iter()
        .enumerate()
        .filter(|&(_, &d)| TransformedMetric::in_epsilon_box(d, tolerance))
        .map(|(r, _)| r)
        .collect();

    let mut parameters = vec![];
    let mut columns = vec![];
    for p in catalog.dynamic() {
        let values = engine.table().numeric_column(&p.name)?;
        parameters.push(p.name.clone());
        columns.push(rows.iter().map(|&r| values[r]).collect());
    }

    let sample = PosteriorSample {
        metric: metric.name.clone(),
        tolerance,
        parameters,
        rows,
        columns,
    };
    if !sample.is_sufficient() {
        warn!(
            "Number of valid samples ({}) for metric {} ({}) is too small for {} parameters",
            sample.len(),
            j + 1,
            sample.metric,
            sample.parameters.len()
        );
    }
    Ok(sample)
}

/// Select the posterior sample of metric `j` using the engine's reference
/// tolerance and the metric's fitted scale.
pub fn posterior(engine: &mut EvidenceEngine, j: usize, catalog: &ParameterCatalog) -> Result<PosteriorSample> {
    let scale = engine.compute_scales()[j].posterior_scale();
    let refeps = engine.settings().refeps;
    select(engine, j, refeps, scale, catalog)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSummary {
    pub parameter: String,
    pub count: usize,
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub max: f64,
}

impl ParameterSummary {
    pub fn of(parameter: &str, values: &[f64]) -> ParameterSummary {
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let sd = if n > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            f64::NAN
        };
        ParameterSummary {
            parameter: parameter.to_string(),
            count: n,
            mean,
            sd,
            min: values.iter().cloned().fold(f64::INFINITY, f64::min),
            max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// A density-normalized histogram over `[lower, upper]`. Values outside the
/// range are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub lower: f64,
    pub upper: f64,
    pub densities: Vec<f64>,
}

impl Histogram {
    pub fn new(values: &[f64], lower: f64, upper: f64, bins: usize) -> Histogram {
        if bins == 0 {
            return Histogram {
                lower,
                upper,
                densities: vec![],
            };
        }
        let width = (upper - lower) / bins as f64;
        let mut counts = vec![0usize; bins];
        for &v in values {
            if v < lower || v > upper || !v.is_finite() {
                continue;
            }
            let b = (((v - lower) / width) as usize).min(bins - 1);
            counts[b] += 1;
        }
        let inside: usize = counts.iter().sum();
        let densities = counts
            .iter()
            .map(|&c| {
                if inside > 0 {
                    c as f64 / (inside as f64 * width)
                } else {
                    0.0
                }
            })
            .collect();
        Histogram {
            lower,
            upper,
            densities,
        }
    }

    pub fn bin_edges(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let width = (self.upper - self.lower) / self.densities.len() as f64;
        (0..self.densities.len()).map(move |b| {
            (
                self.lower + width * b as f64,
                self.lower + width * (b + 1) as f64,
            )
        })
    }
}

/// Write, for every dynamic parameter, a file `<stem>_<parameter>.<suffix>`
/// in `dir` holding the posterior histograms of that parameter for every metric with
/// sufficient samples, side by side.
pub fn save_histograms(
    samples: &[PosteriorSample],
    catalog: &ParameterCatalog,
    dir: &Path,
    stem: &str,
    suffix: Option<&str>,
    bins: usize,
    delimiter: u8,
) -> Result<()> {
    let usable: Vec<&PosteriorSample> = samples.iter().filter(|s| s.is_sufficient()).collect();
    if usable.len() < samples.len() {
        warn!(
            "{} of {} metrics have too few posterior samples for histograms",
            samples.len() - usable.len(),
            samples.len()
        );
    }
    for p in catalog.dynamic() {
        save_parameter_histograms(p, &usable, dir, stem, suffix, bins, delimiter)?;
    }
    Ok(())
}

fn save_parameter_histograms(
    p: &ParameterSpec,
    samples: &[&PosteriorSample],
    dir: &Path,
    stem: &str,
    suffix: Option<&str>,
    bins: usize,
    delimiter: u8,
) -> Result<()> {
    let (lower, upper) = match p.numeric_bounds()? {
        Some((a, b)) if a < b => (a, b),
        Some((a, b)) => (b, a),
        None => return Ok(()),
    };
    let histograms: Vec<Histogram> = samples
        .iter()
        .map(|s| Histogram::new(s.column(&p.name).unwrap_or(&[]), lower, upper, bins))
        .collect();

    let path = util::output_path(dir, &util::derived_name(stem, &p.name, suffix));
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(&path)?;
    let header = ["lower", "upper"]
        .iter()
        .map(|s| s.to_string())
        .chain(samples.iter().map(|s| s.metric.clone()));
    writer.write_record(header)?;
    let edges = Histogram::new(&[], lower, upper, bins);
    for (b, (lo, hi)) in edges.bin_edges().enumerate() {
        let row = std::iter::once(lo)
            .chain(std::iter::once(hi))
            .chain(histograms.iter().map(|h| h.densities[b]))
            .map(|v| v.to_string());
        writer.write_record(row)?;
    }
    writer.flush()?;
    info!("Wrote posterior histograms of {} ({}) to {}", p.name, p.display, path.display());
    Ok(())
}

/// Write the per-parameter summaries of every sufficient sample as JSON.
pub fn save_summaries<P: AsRef<Path>>(samples: &[PosteriorSample], path: P) -> Result<()> {
    #[derive(Serialize)]
    struct MetricPosterior<'a> {
        metric: &'a str,
        tolerance: f64,
        samples: usize,
        sufficient: bool,
        parameters: Vec<ParameterSummary>,
    }
    let report: Vec<MetricPosterior> = samples
        .iter()
        .map(|s| MetricPosterior {
            metric: &s.metric,
            tolerance: s.tolerance,
            samples: s.len(),
            sufficient: s.is_sufficient(),
            parameters: if s.is_sufficient() { s.summaries() } else { vec![] },
        })
        .collect();
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &report)?;
    Ok(())
}
