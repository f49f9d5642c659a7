/*!
Metric and parameter metadata
=============================

Both metadata files are small delimited tables with a header row. The metric
file has the columns `metric, display, target, minimum, maximum, operator`,
the parameter file `parameter, display, type, setting, minimum, maximum`.
 */

use crate::error::{AbcError, Result};
use serde_derive::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Identity,
    Log,
}

impl Operator {
    fn parse(metric: &str, raw: Option<&str>) -> Operator {
        match raw.map(str::trim) {
            Some("log") => Operator::Log,
            None | Some("") => Operator::Identity,
            Some(other) => {
                warn!(
                    "Metric {}: unknown operator {:?}, using the metric as is",
                    metric, other
                );
                Operator::Identity
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub display: String,
    /// The value the metric would have if the model fitted the observed data
    /// perfectly.
    pub target: f64,
    /// The minimum and maximum ‘reasonable’ values. Their difference is the
    /// unit in which deviations from the target are measured.
    pub minimum: f64,
    pub maximum: f64,
    pub operator: Operator,
}

impl MetricSpec {
    pub fn new(name: &str, target: f64, minimum: f64, maximum: f64) -> MetricSpec {
        MetricSpec {
            name: name.to_string(),
            display: name.to_string(),
            target,
            minimum,
            maximum,
            operator: Operator::Identity,
        }
    }

    pub fn with_log(mut self) -> MetricSpec {
        self.operator = Operator::Log;
        self
    }
}

#[derive(Debug, Deserialize)]
struct MetricRecord {
    metric: String,
    #[serde(default)]
    display: Option<String>,
    target: f64,
    minimum: f64,
    maximum: f64,
    #[serde(default)]
    operator: Option<String>,
}

impl From<MetricRecord> for MetricSpec {
    fn from(r: MetricRecord) -> MetricSpec {
        let operator = Operator::parse(&r.metric, r.operator.as_deref());
        let display = match r.display {
            Some(d) => d,
            None => r.metric.clone(),
        };
        MetricSpec {
            display,
            name: r.metric,
            target: r.target,
            minimum: r.minimum,
            maximum: r.maximum,
            operator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    Numeric,
    /// Anything that is not `numeric`, with the declared type name kept for
    /// reference.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub display: String,
    pub kind: ParameterType,
    pub setting: String,
    /// Declared bounds, as written. For non-numeric parameters these are
    /// category labels.
    pub minimum: String,
    pub maximum: String,
}

impl ParameterSpec {
    pub fn numeric(name: &str, minimum: f64, maximum: f64) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            display: name.to_string(),
            kind: ParameterType::Numeric,
            setting: String::new(),
            minimum: minimum.to_string(),
            maximum: maximum.to_string(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ParameterType::Numeric
    }

    /// The declared bounds as numbers, if this is a numeric parameter.
    pub fn numeric_bounds(&self) -> Result<Option<(f64, f64)>> {
        if !self.is_numeric() {
            return Ok(None);
        }
        let parse = |s: &str| {
            s.trim().parse::<f64>().map_err(|_| {
                AbcError::configuration(format!(
                    "Numeric parameter {} has non-numeric bound {:?}",
                    self.name, s
                ))
            })
        };
        Ok(Some((parse(&self.minimum)?, parse(&self.maximum)?)))
    }

    /// Constant parameters declare the same minimum and maximum.
    pub fn is_constant(&self) -> bool {
        match self.numeric_bounds() {
            Ok(Some((min, max))) => min == max,
            _ => self.minimum.trim() == self.maximum.trim(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParameterRecord {
    parameter: String,
    #[serde(default)]
    display: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    setting: Option<String>,
    minimum: String,
    maximum: String,
}

impl From<ParameterRecord> for ParameterSpec {
    fn from(r: ParameterRecord) -> ParameterSpec {
        let display = match r.display {
            Some(d) => d,
            None => r.parameter.clone(),
        };
        let kind = if r.kind.trim() == "numeric" {
            ParameterType::Numeric
        } else {
            ParameterType::Other(r.kind)
        };
        ParameterSpec {
            display,
            name: r.parameter,
            kind,
            setting: r.setting.unwrap_or_default(),
            minimum: r.minimum,
            maximum: r.maximum,
        }
    }
}

fn reader<R: std::io::Read>(rdr: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(rdr)
}

pub fn read_metrics<R: std::io::Read>(rdr: R, delimiter: u8) -> Result<Vec<MetricSpec>> {
    let mut metrics = vec![];
    for record in reader(rdr, delimiter).deserialize() {
        let record: MetricRecord = record?;
        metrics.push(MetricSpec::from(record));
    }
    if metrics.is_empty() {
        return Err(AbcError::configuration("The metric file lists no metrics"));
    }
    Ok(metrics)
}

pub fn read_parameters<R: std::io::Read>(rdr: R, delimiter: u8) -> Result<Vec<ParameterSpec>> {
    let mut parameters = vec![];
    for record in reader(rdr, delimiter).deserialize() {
        let record: ParameterRecord = record?;
        parameters.push(ParameterSpec::from(record));
    }
    Ok(parameters)
}

pub fn load_metrics<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Vec<MetricSpec>> {
    let path = path.as_ref();
    let file = crate::table::open_input(path, "Metrics file")?;
    read_metrics(file, delimiter)
}

pub fn load_parameters<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Vec<ParameterSpec>> {
    let path = path.as_ref();
    let file = crate::table::open_input(path, "Parameter list file")?;
    read_parameters(file, delimiter)
}
