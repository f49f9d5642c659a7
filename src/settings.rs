use crate::error::{AbcError, Result};
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Number of intervals of the epsilon grid. The grid has `epsteps + 1`
    /// points.
    pub epsteps: usize,
    /// Upper end of the epsilon grid, in units of the metric's reasonable
    /// range.
    pub maxep: f64,
    /// Reference tolerance for posterior selection.
    pub refeps: f64,
    /// Whether the per-metric epsilon scale factors are fitted against the
    /// first metric, or left at 1.
    pub rescale: bool,
    pub delimiter: char,
    pub histogram_bins: usize,
    /// Directory all output files are written to.
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            epsteps: 100,
            maxep: 1.0,
            refeps: 0.05,
            rescale: false,
            delimiter: ',',
            histogram_bins: 50,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.epsteps == 0 {
            return Err(AbcError::configuration("epsteps must be at least 1"));
        }
        if !(self.maxep > 0.0) {
            return Err(AbcError::configuration(format!(
                "maxep must be positive, got {}",
                self.maxep
            )));
        }
        if !(self.refeps > 0.0) {
            return Err(AbcError::configuration(format!(
                "refeps must be positive, got {}",
                self.refeps
            )));
        }
        if self.histogram_bins == 0 {
            return Err(AbcError::configuration("histogram bins must be at least 1"));
        }
        if !self.output_dir.is_dir() {
            return Err(AbcError::configuration(format!(
                "output directory {} does not exist",
                self.output_dir.display()
            )));
        }
        self.delimiter_byte().map(|_| ())
    }

    /// The delimiter as the single byte the csv reader and writer expect.
    pub fn delimiter_byte(&self) -> Result<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(AbcError::configuration(format!(
                "delimiter {:?} is not an ASCII character",
                self.delimiter
            )))
        }
    }
}
