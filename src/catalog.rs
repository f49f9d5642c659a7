/*!
Parameter catalog
=================

Only parameters that were actually varied are worth reporting posteriors for.
A parameter is dynamic when it is declared numeric with a minimum different
from its maximum. The classification uses the declared bounds only, never the
run data, and is fixed once the catalog is built.
 */

use crate::error::Result;
use crate::metadata::ParameterSpec;
use crate::table::{Column, RunTable};
use serde_derive::Serialize;

#[derive(Debug, Clone)]
pub struct ParameterCatalog {
    parameters: Vec<ParameterSpec>,
    dynamic: Vec<usize>,
}

impl ParameterCatalog {
    pub fn new(parameters: Vec<ParameterSpec>) -> Result<ParameterCatalog> {
        let mut dynamic = vec![];
        for (i, p) in parameters.iter().enumerate() {
            if let Some((min, max)) = p.numeric_bounds()? {
                if min != max {
                    dynamic.push(i);
                }
            }
        }
        Ok(ParameterCatalog { parameters, dynamic })
    }

    /// Every declared parameter, dynamic or not.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn dynamic(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.dynamic.iter().map(move |&i| &self.parameters[i])
    }

    pub fn dynamic_names(&self) -> Vec<&str> {
        self.dynamic().map(|p| p.name.as_str()).collect()
    }

    pub fn n_dynamic(&self) -> usize {
        self.dynamic.len()
    }

    pub fn is_dynamic(&self, name: &str) -> bool {
        self.dynamic().any(|p| p.name == name)
    }
}

/// What the run data says about one parameter column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterProfile {
    /// Every value in the column is a whole number.
    pub is_integer: bool,
    pub observed_min: Option<f64>,
    pub observed_max: Option<f64>,
}

impl ParameterProfile {
    pub fn observe(table: &RunTable, name: &str) -> Result<ParameterProfile> {
        Ok(match table.column(name)? {
            Column::Numeric(values) => {
                let mut profile = ParameterProfile {
                    is_integer: true,
                    observed_min: None,
                    observed_max: None,
                };
                for &v in values.iter().filter(|v| !v.is_nan()) {
                    if v.fract() != 0.0 {
                        profile.is_integer = false;
                    }
                    profile.observed_min = Some(profile.observed_min.map_or(v, |m| m.min(v)));
                    profile.observed_max = Some(profile.observed_max.map_or(v, |m| m.max(v)));
                }
                profile
            }
            Column::Text(_) => ParameterProfile {
                is_integer: false,
                observed_min: None,
                observed_max: None,
            },
        })
    }
}
