/*!
Brute-force ABC
===============

This crate estimates how well a stochastic simulation model, run many times
over a sweep of parameter settings, reproduces observed data. It follows the
idea of approximate Bayesian computation (ABC) in its most direct form: every
run that has been made is kept, and for a range of tolerances we simply count
which runs are close enough to the observations.

# 1. Purpose

Agent-based models are too expensive to calibrate by likelihood methods, but
they are cheap enough to run over a large design of parameter values. Given
such a table of runs, the questions are

 - for each observable (a *metric*), how quickly does the fraction of accepted
   runs grow as the acceptance tolerance is relaxed (the *evidence curve*),
 - which parameter values do the accepted runs have (the *posterior sample*),
 - and, when the design is split into regions of parameter space, which region
   has the most evidence.

# 2. Entities

The run table ([`table::RunTable`]) has one row per run and one column per
parameter or metric. Metrics are described by [`metadata::MetricSpec`]: a
target value, a ‘reasonable’ minimum and maximum whose difference sets the
unit of deviation, and optionally a logarithmic transformation. Parameters are
described by [`metadata::ParameterSpec`]; the [`catalog::ParameterCatalog`]
tells the varied (dynamic) parameters apart from the constant ones.

# 3. Process overview

 1. Metadata and run data are read and cross-checked ([`table`], [`metadata`]).
 2. Every metric is transformed into normalized deviations ([`transform`]).
 3. Evidence curves are computed on a uniform epsilon grid ([`evidence`]).
 4. Optionally, the epsilon axis of every metric is rescaled against the first
    metric ([`scale`], using the minimizers in [`optimize`]).
 5. Posterior samples are selected at the reference tolerance ([`posterior`]).
 6. For model comparison, steps 2 and 3 are repeated per region of parameter
    space ([`options`]).

Steps 1–5 form the `calibrate` command of the binary, step 6 the `compare`
command ([`cli`]).

```
use bruteabc::{EvidenceEngine, MetricSpec, RunTable, Settings};

let table = RunTable::from_numeric_columns(vec![
    ("m", vec![0.5, 0.55, 0.7, 0.9]),
]).unwrap();
let settings = Settings { epsteps: 4, ..Settings::default() };
let engine = EvidenceEngine::new(table, &[MetricSpec::new("m", 0.5, 0.0, 1.0)], settings).unwrap();
assert_eq!(engine.curve(0).evidence, vec![0.0, 0.75, 1.0, 1.0, 1.0]);
```
 */

pub mod catalog;
pub mod cli;
pub mod error;
pub mod evidence;
pub mod metadata;
pub mod optimize;
pub mod options;
pub mod posterior;
pub mod scale;
pub mod settings;
pub mod table;
pub mod transform;
pub mod util;

pub use catalog::ParameterCatalog;
pub use error::{AbcError, Result};
pub use evidence::{EvidenceCurve, EvidenceEngine, EvidenceTable};
pub use metadata::{MetricSpec, Operator, ParameterSpec};
pub use options::ParamOption;
pub use posterior::PosteriorSample;
pub use scale::{ScaleFactor, Scaling};
pub use settings::Settings;
pub use table::RunTable;

#[cfg(test)]
mod tests;
