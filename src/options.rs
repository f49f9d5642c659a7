/*!
Parameter options
=================

To compare model variants, the run table is split into regions of parameter
space, each described by a file in the parameter metadata format. A region
keeps the runs whose parameters lie within its declared bounds; an evidence
engine is then built for every non-empty region.

Regions may overlap. After the literal option `exclusive` on the command
line, a region only keeps the runs that no earlier region has claimed.
 */

use crate::catalog::ParameterProfile;
use crate::error::Result;
use crate::evidence::EvidenceEngine;
use crate::metadata::{self, MetricSpec, ParameterSpec};
use crate::settings::Settings;
use crate::table::RunTable;
use crate::util;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use tracing::info;

pub const EXCLUSIVE: &str = "exclusive";

#[derive(Debug, Clone)]
pub struct ParamOption {
    pub name: String,
    pub file: String,
    pub parameters: Vec<ParameterSpec>,
    pub exclusive: bool,
}

impl ParamOption {
    pub fn new(name: &str, parameters: Vec<ParameterSpec>, exclusive: bool) -> ParamOption {
        ParamOption {
            name: name.to_string(),
            file: name.to_string(),
            parameters,
            exclusive,
        }
    }

    pub fn load(file: &str, exclusive: bool, delimiter: u8) -> Result<ParamOption> {
        let parameters = metadata::load_parameters(file, delimiter)?;
        Ok(ParamOption {
            name: option_name(file),
            file: file.to_string(),
            parameters,
            exclusive,
        })
    }

    /// Build the options listed on the command line, switching to exclusive
    /// mode at the first `exclusive`.
    pub fn build_array(files: &[String], delimiter: u8) -> Result<Vec<ParamOption>> {
        let mut exclusive = false;
        let mut options = vec![];
        for f in files {
            if f == EXCLUSIVE {
                exclusive = true;
            } else {
                options.push(ParamOption::load(f, exclusive, delimiter)?);
            }
        }
        Ok(options)
    }

    /// Whether `row` of `table` lies in this option's region.
    fn admits(&self, table: &RunTable, row: usize, profiles: &FxHashMap<&str, ParameterProfile>) -> Result<bool> {
        for p in &self.parameters {
            let column = table.column(&p.name)?;
            let keep = match p.numeric_bounds()? {
                Some((min, max)) => {
                    let v = match column.as_numeric() {
                        Some(values) => values[row],
                        None => return Ok(false),
                    };
                    if min == max {
                        v == min
                    } else if profiles.get(p.name.as_str()).map_or(false, |pr| pr.is_integer) {
                        min <= v && v <= max
                    } else {
                        min < v && v < max
                    }
                }
                None => {
                    column.matches(row, &p.minimum)
                        || column.matches(row, &p.maximum)
                        || column.matches(row, &p.setting)
                }
            };
            if !keep {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The rows of `table` selected by this option. Rows not yet claimed by
    /// any option are claimed by this one.
    pub fn select(&self, table: &RunTable, claimed: &mut Assignments) -> Result<Vec<usize>> {
        let mut profiles = FxHashMap::default();
        for p in &self.parameters {
            if p.is_numeric() && !p.is_constant() {
                profiles.insert(p.name.as_str(), ParameterProfile::observe(table, &p.name)?);
            }
        }

        let mut rows = vec![];
        for row in 0..table.len() {
            if self.exclusive && claimed.contains(row) {
                continue;
            }
            if self.admits(table, row, &profiles)? {
                rows.push(row);
            }
        }
        info!("Combination {}: {} rows", self.file, rows.len());

        for &row in &rows {
            claimed.claim(row, &self.name);
        }
        Ok(rows)
    }

    /// An evidence engine over this option's region, or `None` if the region
    /// is empty.
    pub fn abc(
        &self,
        table: &RunTable,
        metrics: &[MetricSpec],
        settings: &Settings,
        claimed: &mut Assignments,
    ) -> Result<Option<EvidenceEngine>> {
        let rows = self.select(table, claimed)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let subset = table.select_rows(&rows);
        EvidenceEngine::new(subset, metrics, settings.clone()).map(Some)
    }
}

/// `param-low.csv` is the option `low`.
pub fn option_name(file: &str) -> String {
    let stem = Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    match stem.strip_prefix("param-") {
        Some(rest) => rest.to_string(),
        None => stem,
    }
}

/// Which option first claimed each run.
#[derive(Debug, Default)]
pub struct Assignments {
    owners: FxHashMap<usize, String>,
}

impl Assignments {
    pub fn contains(&self, row: usize) -> bool {
        self.owners.contains_key(&row)
    }

    fn claim(&mut self, row: usize, option: &str) {
        self.owners.entry(row).or_insert_with(|| option.to_string());
    }

    pub fn owner(&self, row: usize) -> Option<&str> {
        self.owners.get(&row).map(String::as_str)
    }

    pub fn claimed_by(&self, option: &str) -> FxHashSet<usize> {
        self.owners
            .iter()
            .filter(|(_, o)| o.as_str() == option)
            .map(|(&r, _)| r)
            .collect()
    }
}

/// Build an engine per option and write, for every metric, the scaled
/// evidence ratio of every non-empty option to `<stem>_<metric>.<suffix>`
/// in the output directory, as `option,epsilon,value` rows.
pub fn compare(
    options: &[ParamOption],
    table: &RunTable,
    metrics: &[MetricSpec],
    settings: &Settings,
    output: &str,
) -> Result<()> {
    let mut claimed = Assignments::default();
    let mut engines = vec![];
    for option in options {
        table.check_names(&option.parameters, metrics)?;
        match option.abc(table, metrics, settings, &mut claimed)? {
            Some(engine) => engines.push((option, engine)),
            None => info!("Combination {} selects no runs, skipping it", option.file),
        }
    }

    let (stem, suffix) = util::stem_and_suffix(output);
    let delimiter = settings.delimiter_byte()?;
    for (j, metric) in metrics.iter().enumerate() {
        let path = util::output_path(&settings.output_dir, &util::derived_name(&stem, &metric.name, suffix.as_deref()));
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(&path)?;
        writer.write_record(&["option", "epsilon", "value"])?;
        for (option, engine) in engines.iter_mut() {
            let epsilons = engine.epsilons(j, true, false);
            let ratios = engine.evidences(j, false, true);
            for (e, r) in epsilons.iter().zip(ratios.iter()) {
                writer.write_record(&[option.name.clone(), e.to_string(), r.to_string()])?;
            }
        }
        writer.flush()?;
        info!("Wrote comparison for metric {} to {}", metric.name, path.display());
    }
    Ok(())
}
