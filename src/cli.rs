use crate::error::Result;
use crate::settings::Settings;
use argparse::{ArgumentParser, List, Store, StoreOption, StoreTrue};
use std::io::{stderr, stdout};

pub const CALIBRATE_USAGE: &str = "bruteabc calibrate <run data> <metrics file> <parameter file> \
<save evidence file> <save evidence ratio file> [<scaled log evidence ratio file> \
<scaled evidence ratio file> <posterior samples file> <posterior histograms stem>]";

pub const COMPARE_USAGE: &str =
    "bruteabc compare <run data> <metrics file> <comparison file> <parameter option files...>";

/// Optional reports written after the evidence files.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFiles {
    pub scaled_log_evidence_ratio: String,
    pub scaled_evidence_ratio: String,
    pub posterior_samples: String,
    pub posterior_histograms: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrateArgs {
    pub run_data: String,
    pub metrics: String,
    pub parameters: String,
    pub evidence: String,
    pub evidence_ratio: String,
    pub reports: Option<ReportFiles>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareArgs {
    pub run_data: String,
    pub metrics: String,
    pub output: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Calibrate(CalibrateArgs),
    Compare(CompareArgs),
}

/// Settings given on the command line. Whatever is not given falls back to
/// the settings file, if any, and then to the defaults.
#[derive(Debug, Default)]
pub struct SettingsOverrides {
    pub settings_file: Option<String>,
    pub epsteps: Option<usize>,
    pub maxep: Option<f64>,
    pub refeps: Option<f64>,
    pub rescale: bool,
    pub delimiter: Option<char>,
    pub bins: Option<usize>,
    pub output_dir: Option<String>,
}

impl SettingsOverrides {
    pub fn settings(&self) -> Result<Settings> {
        let mut s = match &self.settings_file {
            Some(f) => Settings::from_json_file(f)?,
            None => Settings::default(),
        };
        if let Some(epsteps) = self.epsteps {
            s.epsteps = epsteps;
        }
        if let Some(maxep) = self.maxep {
            s.maxep = maxep;
        }
        if let Some(refeps) = self.refeps {
            s.refeps = refeps;
        }
        if self.rescale {
            s.rescale = true;
        }
        if let Some(delimiter) = self.delimiter {
            s.delimiter = delimiter;
        }
        if let Some(bins) = self.bins {
            s.histogram_bins = bins;
        }
        if let Some(dir) = &self.output_dir {
            s.output_dir = dir.into();
        }
        s.validate()?;
        Ok(s)
    }
}

fn add_settings_options<'a>(parser: &mut ArgumentParser<'a>, o: &'a mut SettingsOverrides) {
    parser.refer(&mut o.settings_file).add_option(
        &["--settings"],
        StoreOption,
        "JSON file with settings; options given here override it",
    );
    parser.refer(&mut o.epsteps).add_option(
        &["--epsteps"],
        StoreOption,
        "number of epsilon steps (default 100)",
    );
    parser.refer(&mut o.maxep).add_option(
        &["--maxep"],
        StoreOption,
        "largest epsilon, in units of the metrics' reasonable ranges (default 1.0)",
    );
    parser.refer(&mut o.refeps).add_option(
        &["--refeps"],
        StoreOption,
        "reference epsilon for posterior samples (default 0.05)",
    );
    parser.refer(&mut o.rescale).add_option(
        &["--rescale"],
        StoreTrue,
        "fit epsilon scale factors of every metric against the first",
    );
    parser.refer(&mut o.delimiter).add_option(
        &["--delimiter"],
        StoreOption,
        "field delimiter of all input and output files (default ,)",
    );
    parser.refer(&mut o.bins).add_option(
        &["--bins"],
        StoreOption,
        "number of posterior histogram bins (default 50)",
    );
    parser.refer(&mut o.output_dir).add_option(
        &["--output-dir"],
        StoreOption,
        "directory the output files are written to (default .)",
    );
}

/// Parse `bruteabc <command> [<args>...]`, exiting on `--help` or on
/// malformed options.
pub fn parse_args() -> std::result::Result<(Command, SettingsOverrides), String> {
    let mut command = String::new();
    let mut args: Vec<String> = vec![];
    {
        let mut parser = ArgumentParser::new();
        parser.set_description("Brute-force ABC evidence for calibrating agent-based models");
        parser.refer(&mut command).required().add_argument(
            "command",
            Store,
            "calibrate or compare",
        );
        parser
            .refer(&mut args)
            .add_argument("arguments", List, "arguments of the command");
        parser.stop_on_first_argument(true);
        parser.parse_args_or_exit();
    }
    args.insert(0, format!("bruteabc {}", command));
    match command.as_str() {
        "calibrate" => parse_calibrate(args),
        "compare" => parse_compare(args),
        other => Err(format!(
            "Unknown command {:?}\nUsage: {}\n   OR: {}",
            other, CALIBRATE_USAGE, COMPARE_USAGE
        )),
    }
}

fn run_parser(parser: &ArgumentParser, args: Vec<String>) {
    if let Err(code) = parser.parse(args, &mut stdout(), &mut stderr()) {
        std::process::exit(code);
    }
}

pub fn parse_calibrate(args: Vec<String>) -> std::result::Result<(Command, SettingsOverrides), String> {
    let mut overrides = SettingsOverrides::default();
    let mut files: Vec<String> = vec![];
    let mut summary: Option<String> = None;
    {
        let mut parser = ArgumentParser::new();
        parser.set_description("Compute evidence curves and posterior samples");
        add_settings_options(&mut parser, &mut overrides);
        parser.refer(&mut summary).add_option(
            &["--summary"],
            StoreOption,
            "also write a JSON summary of metrics, moments and scale factors",
        );
        parser
            .refer(&mut files)
            .add_argument("files", List, CALIBRATE_USAGE);
        run_parser(&parser, args);
    }
    calibrate_from_files(files, summary).map(|c| (c, overrides))
}

fn calibrate_from_files(
    mut files: Vec<String>,
    summary: Option<String>,
) -> std::result::Result<Command, String> {
    if files.len() != 5 && files.len() != 9 {
        return Err(format!("Usage: {}", CALIBRATE_USAGE));
    }
    let reports = if files.len() == 9 {
        let r: Vec<String> = files.drain(5..).collect();
        Some(ReportFiles {
            scaled_log_evidence_ratio: r[0].clone(),
            scaled_evidence_ratio: r[1].clone(),
            posterior_samples: r[2].clone(),
            posterior_histograms: r[3].clone(),
        })
    } else {
        None
    };
    let mut f = files.into_iter();
    let mut next = || f.next().unwrap_or_default();
    Ok(Command::Calibrate(CalibrateArgs {
        run_data: next(),
        metrics: next(),
        parameters: next(),
        evidence: next(),
        evidence_ratio: next(),
        reports,
        summary,
    }))
}

pub fn parse_compare(args: Vec<String>) -> std::result::Result<(Command, SettingsOverrides), String> {
    let mut overrides = SettingsOverrides::default();
    let mut files: Vec<String> = vec![];
    {
        let mut parser = ArgumentParser::new();
        parser.set_description("Compare evidence curves across regions of parameter space");
        add_settings_options(&mut parser, &mut overrides);
        parser
            .refer(&mut files)
            .add_argument("files", List, COMPARE_USAGE);
        run_parser(&parser, args);
    }
    compare_from_files(files).map(|c| (c, overrides))
}

fn compare_from_files(mut files: Vec<String>) -> std::result::Result<Command, String> {
    if files.len() < 4 {
        return Err(format!("Usage: {}", COMPARE_USAGE));
    }
    let options = files.split_off(3);
    let mut f = files.into_iter();
    let mut next = || f.next().unwrap_or_default();
    Ok(Command::Compare(CompareArgs {
        run_data: next(),
        metrics: next(),
        output: next(),
        options,
    }))
}
