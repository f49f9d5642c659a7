use bruteabc::catalog::ParameterCatalog;
use bruteabc::cli::{self, CalibrateArgs, Command, CompareArgs};
use bruteabc::error::Result;
use bruteabc::evidence::EvidenceEngine;
use bruteabc::options::{self, ParamOption};
use bruteabc::settings::Settings;
use bruteabc::table::RunTable;
use bruteabc::{metadata, posterior, util};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn calibrate(args: &CalibrateArgs, settings: Settings) -> Result<()> {
    let delimiter = settings.delimiter_byte()?;
    let table = RunTable::load(&args.run_data, delimiter)?;
    let metrics = metadata::load_metrics(&args.metrics, delimiter)?;
    let parameters = metadata::load_parameters(&args.parameters, delimiter)?;
    table.check_names(&parameters, &metrics)?;
    let catalog = ParameterCatalog::new(parameters)?;
    info!(
        "{} metrics, {} parameters of which {} dynamic",
        metrics.len(),
        catalog.parameters().len(),
        catalog.n_dynamic()
    );

    let dir = settings.output_dir.clone();
    let out = |name: &str| util::output_path(&dir, name);

    let mut engine = EvidenceEngine::new(table, &metrics, settings)?;
    engine.save_evidences(out(&args.evidence))?;
    engine.save_evidence_ratios(out(&args.evidence_ratio))?;

    if let Some(reports) = &args.reports {
        engine.save_scaled_curves(out(&reports.scaled_log_evidence_ratio), true, true)?;
        engine.save_scaled_curves(out(&reports.scaled_evidence_ratio), false, true)?;

        let (stem, suffix) = util::stem_and_suffix(&reports.posterior_samples);
        let mut samples = vec![];
        for j in 0..engine.n_metrics() {
            let sample = posterior::posterior(&mut engine, j, &catalog)?;
            if sample.is_sufficient() {
                sample.save(out(&util::derived_name(&stem, &sample.metric, suffix.as_deref())), delimiter)?;
            }
            samples.push(sample);
        }

        let (stem, suffix) = util::stem_and_suffix(&reports.posterior_histograms);
        posterior::save_histograms(
            &samples,
            &catalog,
            &dir,
            &stem,
            suffix.as_deref(),
            engine.settings().histogram_bins,
            delimiter,
        )?;
        if let Some(summary) = &args.summary {
            let (stem, suffix) = util::stem_and_suffix(summary);
            posterior::save_summaries(&samples, out(&util::derived_name(&stem, "posterior", suffix.as_deref())))?;
        }
    }

    if let Some(summary) = &args.summary {
        engine.save_summary(out(summary))?;
    }
    Ok(())
}

fn compare(args: &CompareArgs, settings: Settings) -> Result<()> {
    let delimiter = settings.delimiter_byte()?;
    let table = RunTable::load(&args.run_data, delimiter)?;
    let metrics = metadata::load_metrics(&args.metrics, delimiter)?;
    let param_options = ParamOption::build_array(&args.options, delimiter)?;
    info!("Comparing {} parameter options", param_options.len());
    options::compare(&param_options, &table, &metrics, &settings, &args.output)
}

fn main() -> std::result::Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let (command, overrides) = cli::parse_args()?;
    let settings = overrides.settings().map_err(|e| e.to_string())?;
    let outcome = match &command {
        Command::Calibrate(args) => calibrate(args, settings),
        Command::Compare(args) => compare(args, settings),
    };
    outcome.map_err(|e| e.to_string())
}
