use crate::*;

use crate::catalog::ParameterProfile;
use crate::evidence::epsilon_grid;
use crate::metadata::ParameterType;
use crate::options::{option_name, Assignments};
use crate::posterior::Histogram;
use crate::table::Column;
use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;

fn settings(epsteps: usize) -> Settings {
    Settings {
        epsteps,
        ..Settings::default()
    }
}

fn text(values: &[&str]) -> Column {
    Column::Text(values.iter().map(|s| s.to_string()).collect())
}

#[test]
pub fn test_evidence_curve_by_hand() {
    let curve = EvidenceCurve::compute(&[0.0, 0.1, -0.3, 0.6], &epsilon_grid(4, 1.0));
    assert_eq!(curve.evidence, vec![0.0, 0.5, 0.75, 1.0, 1.0]);
    assert_eq!(curve.evratio[0], 0.0);
    assert_abs_diff_eq!(curve.evratio[1], 2.0);
    assert_abs_diff_eq!(curve.evratio[2], 1.5);
    assert_abs_diff_eq!(curve.evratio[4], 1.0);
    assert_eq!(curve.logevidence[0], 0.0);
    assert_abs_diff_eq!(curve.logevidence[1], 0.5f64.ln());
    assert_eq!(curve.logevidence[3], 0.0);
    assert_abs_diff_eq!(curve.moment, 2.25, epsilon = 1e-12);
    assert_abs_diff_eq!(
        curve.logmoment,
        0.5f64.ln() * 0.25 + 0.75f64.ln() * 0.5,
        epsilon = 1e-12
    );
}

#[test]
pub fn test_sorted_counting_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut deviations: Vec<f64> = (0..500).map(|_| rng.gen_range(-1.5..1.5)).collect();
    // Ties with grid points must not be accepted.
    deviations.extend_from_slice(&[0.25, -0.25, 0.5, 0.0]);
    let epsilons = epsilon_grid(20, 1.0);
    let curve = EvidenceCurve::compute(&deviations, &epsilons);
    for (i, &e) in epsilons.iter().enumerate() {
        let count = deviations
            .iter()
            .filter(|&&d| transform::TransformedMetric::in_epsilon_box(d, e))
            .count();
        assert_eq!(curve.evidence[i], count as f64 / deviations.len() as f64);
    }
    assert!(curve.evidence.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
pub fn test_uniform_metric_evidence_grows_linearly() {
    let mut rng = StdRng::seed_from_u64(42);
    let values: Vec<f64> = (0..100).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let table = RunTable::from_numeric_columns(vec![("m", values)]).unwrap();
    let engine = EvidenceEngine::new(table, &[MetricSpec::new("m", 0.0, -1.0, 1.0)], settings(10)).unwrap();
    let evidence = &engine.curve(0).evidence;
    assert_eq!(evidence.len(), 11);
    assert_eq!(evidence[0], 0.0);
    // Deviations are measured in units of the range 2, so the runs spread
    // over [-0.5, 0.5] and an ε box holds a fraction 2ε of them.
    for i in 1..=4 {
        let expected = 2.0 * engine.grid()[i];
        assert!(
            (evidence[i] - expected).abs() < 0.2,
            "evidence {} at ε = {}",
            evidence[i],
            engine.grid()[i]
        );
    }
    for &e in &evidence[6..] {
        assert_eq!(e, 1.0);
    }
    assert!(evidence.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
pub fn test_log_metric_is_bounded_in_log_space() {
    let spec = MetricSpec::new("size", 10.0, 1.0, 100.0).with_log();
    let m = transform::transform(&spec, vec![1.0, 10.0, 50.0, 1000.0]).unwrap();
    assert!(m.minimum <= m.target && m.target <= m.maximum);
    assert_abs_diff_eq!(m.target, 10f64.ln());
    assert_abs_diff_eq!(m.range(), 100f64.ln());
    assert_abs_diff_eq!(m.deviations[1], 0.0);
    assert_abs_diff_eq!(m.deviations[3], 2.0 * 10f64.ln() / 100f64.ln(), epsilon = 1e-12);
}

#[test]
pub fn test_log_of_zero_is_a_domain_error() {
    let table = RunTable::from_numeric_columns(vec![("size", vec![3.0, 0.0, 12.0])]).unwrap();
    let spec = MetricSpec::new("size", 10.0, 1.0, 100.0).with_log();
    match EvidenceEngine::new(table, &[spec], settings(10)) {
        Err(AbcError::Domain { metric, value }) => {
            assert_eq!(metric, "size");
            assert_eq!(value, 0.0);
        }
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("log of 0 was accepted"),
    }
}

#[test]
pub fn test_inconsistent_bounds_fail_before_curves() {
    let table = RunTable::from_numeric_columns(vec![("m", vec![0.1, 0.2])]).unwrap();
    for spec in [
        MetricSpec::new("m", 0.5, 0.6, 1.0),
        MetricSpec::new("m", 0.5, 0.0, 0.4),
        MetricSpec::new("m", 0.5, 0.5, 0.5),
    ]
    .iter()
    {
        let outcome = EvidenceEngine::new(table.clone(), std::slice::from_ref(spec), settings(10));
        assert!(matches!(outcome, Err(AbcError::Configuration(_))));
    }
}

#[test]
pub fn test_column_lookup_by_name() {
    let table = RunTable::new(
        vec!["a".to_string(), "m".to_string(), "m".to_string()],
        vec![
            Column::Numeric(vec![1.0]),
            Column::Numeric(vec![0.5]),
            Column::Numeric(vec![0.6]),
        ],
    )
    .unwrap();
    let p = vec![ParameterSpec::numeric("a", 0.0, 1.0)];
    match table.check_names(&p, &[MetricSpec::new("m", 0.5, 0.0, 1.0)]) {
        Err(AbcError::Configuration(msg)) => {
            assert!(msg.starts_with("Metric name m"));
            assert!(msg.contains("more than once"));
        }
        other => panic!("unexpected {:?}", other),
    }
    match table.check_names(&[ParameterSpec::numeric("b", 0.0, 1.0)], &[]) {
        Err(AbcError::Configuration(msg)) => {
            assert!(msg.starts_with("Parameter name b"));
            assert!(msg.contains("does not appear"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(table.check_names(&p, &[]).is_ok());
}

#[test]
pub fn test_text_columns_are_not_metrics() {
    let table = RunTable::new(vec!["m".to_string()], vec![text(&["true", "false"])]).unwrap();
    assert!(EvidenceEngine::new(table, &[MetricSpec::new("m", 0.5, 0.0, 1.0)], settings(5)).is_err());
}

#[test]
pub fn test_read_metadata() {
    let metrics = metadata::read_metrics(
        "metric,display,target,minimum,maximum,operator\n\
         size,Population size,10,1,100,log\n\
         share,,0.5,0,1,\n"
            .as_bytes(),
        b',',
    )
    .unwrap();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0].operator, Operator::Log);
    assert_eq!(metrics[0].display, "Population size");
    assert_eq!(metrics[1].operator, Operator::Identity);
    assert_eq!(metrics[1].display, "share");

    let parameters = metadata::read_parameters(
        "parameter,display,type,setting,minimum,maximum\n\
         rate,Rate,numeric,,0.1,0.9\n\
         seed,,numeric,,7,7\n\
         mode,,boolean,,true,true\n"
            .as_bytes(),
        b',',
    )
    .unwrap();
    assert_eq!(parameters[2].kind, ParameterType::Other("boolean".to_string()));
    let catalog = ParameterCatalog::new(parameters).unwrap();
    assert_eq!(catalog.dynamic_names(), vec!["rate"]);
    assert!(!catalog.is_dynamic("seed"));
    assert!(!catalog.is_dynamic("mode"));
    assert_eq!(catalog.parameters().len(), 3);
}

#[test]
pub fn test_empty_metric_file_is_rejected() {
    let outcome = metadata::read_metrics("metric,display,target,minimum,maximum,operator\n".as_bytes(), b',');
    assert!(matches!(outcome, Err(AbcError::Configuration(_))));
}

fn posterior_table(m: Vec<f64>) -> RunTable {
    let n = m.len();
    RunTable::from_numeric_columns(vec![
        ("rate", (0..n).map(|i| 0.1 * i as f64).collect()),
        ("seed", vec![7.0; n]),
        ("m", m),
    ])
    .unwrap()
}

fn posterior_catalog() -> ParameterCatalog {
    ParameterCatalog::new(vec![
        ParameterSpec::numeric("rate", 0.0, 1.0),
        ParameterSpec::numeric("seed", 7.0, 7.0),
    ])
    .unwrap()
}

#[test]
pub fn test_constant_parameters_are_not_reported() {
    let table = posterior_table(vec![0.5, 0.51, 0.52, 0.9, 0.1]);
    let catalog = posterior_catalog();
    let mut engine = EvidenceEngine::new(table, &[MetricSpec::new("m", 0.5, 0.0, 1.0)], settings(10)).unwrap();
    let sample = posterior::posterior(&mut engine, 0, &catalog).unwrap();
    assert_abs_diff_eq!(sample.tolerance, 0.05);
    assert_eq!(sample.parameters, vec!["rate".to_string()]);
    assert_eq!(sample.rows, vec![0, 1, 2]);
    assert!(sample.column("seed").is_none());
    assert_eq!(sample.column("rate").unwrap().len(), 3);
    assert!(sample.is_sufficient());
}

#[test]
pub fn test_small_posterior_is_flagged() {
    let table = posterior_table(vec![0.5, 0.9, 0.1]);
    let catalog = posterior_catalog();
    let mut engine = EvidenceEngine::new(table, &[MetricSpec::new("m", 0.5, 0.0, 1.0)], settings(10)).unwrap();
    let sample = posterior::posterior(&mut engine, 0, &catalog).unwrap();
    assert_eq!(sample.len(), 1);
    assert!(!sample.is_sufficient());

    let dir = tempfile::tempdir().unwrap();
    posterior::save_histograms(&[sample], &catalog, dir.path(), "hist", Some("csv"), 10, b',').unwrap();
    let written = fs::read_to_string(dir.path().join("hist_rate.csv")).unwrap();
    assert_eq!(written.lines().next(), Some("lower,upper"));
    assert_eq!(written.lines().count(), 11);
}

#[test]
pub fn test_histogram_is_a_density() {
    let values = [0.05, 0.15, 0.15, 0.95, 1.0, 2.0];
    let h = Histogram::new(&values, 0.0, 1.0, 10);
    let total: f64 = h
        .bin_edges()
        .zip(&h.densities)
        .map(|((lo, hi), d)| (hi - lo) * d)
        .sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
    // 1.0 falls into the last bin, 2.0 is left out.
    assert_abs_diff_eq!(h.densities[9], 2.0 / 5.0 / 0.1, epsilon = 1e-9);
}

#[test]
pub fn test_scales_default_to_one() {
    let table = posterior_table(vec![0.5, 0.51, 0.52, 0.9, 0.1]);
    let mut engine = EvidenceEngine::new(table, &[MetricSpec::new("m", 0.5, 0.0, 1.0)], settings(10)).unwrap();
    assert_eq!(engine.scaling(), &Scaling::Unscaled);
    assert_eq!(engine.compute_scales().to_vec(), vec![ScaleFactor::unit()]);
    assert_eq!(engine.epsilons(0, true, true), engine.grid().to_vec());
    assert_eq!(engine.epsilons(0, false, false), epsilon_grid(10, 1.0));
}

#[test]
pub fn test_scales_are_fitted_once() {
    let mut rng = StdRng::seed_from_u64(11);
    let values: Vec<f64> = (0..200).map(|_| rng.gen_range(0.0..1.0)).collect();
    let doubled: Vec<f64> = values.iter().map(|v| 2.0 * v).collect();
    let table = RunTable::from_numeric_columns(vec![("a", values), ("b", doubled)]).unwrap();
    let metrics = [MetricSpec::new("a", 0.5, 0.0, 1.0), MetricSpec::new("b", 1.0, 0.0, 2.0)];
    let s = Settings {
        epsteps: 20,
        rescale: true,
        ..Settings::default()
    };
    let mut engine = EvidenceEngine::new(table, &metrics, s).unwrap();
    // Both metrics normalize to the same deviations.
    assert_eq!(engine.curve(0), engine.curve(1));

    let first = engine.compute_scales().to_vec();
    assert_eq!(first.len(), 2);
    assert_eq!(engine.compute_scales().to_vec(), first);
    assert!(matches!(engine.scaling(), Scaling::Scaled(_)));
    assert_abs_diff_eq!(first[1].initscale, engine.metric(1).max_abs_value());
    for f in &first {
        assert!(f.logoptscale >= -1e-3 && f.logoptscale <= 10.0 + 1e-3);
    }
    assert_eq!(
        engine.epsilons(1, true, false),
        engine.grid().iter().map(|e| e / first[1].optscale).collect::<Vec<_>>()
    );
}

#[test]
pub fn test_evidence_files_round_trip() {
    let table = posterior_table(vec![0.5, 0.51, 0.52, 0.9, 0.1]);
    let metrics = [MetricSpec::new("m", 0.5, 0.0, 1.0)];
    let engine = EvidenceEngine::new(table, &metrics, settings(10)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evidence.csv");
    engine.save_evidences(&path).unwrap();

    let loaded = EvidenceTable::load(&path, b',').unwrap();
    assert_eq!(loaded.metrics, vec!["m".to_string()]);
    assert_eq!(loaded.epsilons, engine.grid().to_vec());
    assert_eq!(loaded.values[0], engine.curve(0).evidence);
}

#[test]
pub fn test_output_names_are_sanitized() {
    assert_eq!(util::mkname("a|b*c?.csv"), "a_b_c_.csv");
    let dir = std::path::Path::new("results");
    assert_eq!(
        util::output_path(dir, "out/ratio (log).csv"),
        std::path::PathBuf::from("results/out_ratio _log_.csv")
    );
    assert_eq!(
        util::output_path(dir, "..\\up.csv"),
        std::path::PathBuf::from("results/.._up.csv")
    );
    let (stem, suffix) = util::stem_and_suffix("out/posterior.csv");
    let name = util::derived_name(&stem, "m", suffix.as_deref());
    assert_eq!(name, "out/posterior_m.csv");
    assert_eq!(util::output_path(dir, &name), std::path::PathBuf::from("results/out_posterior_m.csv"));
    assert_eq!(util::derived_name("plain", "m", None), "plain_m");
}

fn option_table() -> RunTable {
    RunTable::new(
        vec!["a".to_string(), "c".to_string(), "mode".to_string(), "m".to_string()],
        vec![
            Column::Numeric(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            Column::Numeric(vec![0.5, 1.0, 1.5, 1.0, 0.5]),
            text(&["x", "y", "x", "y", "x"]),
            Column::Numeric(vec![0.5, 0.5, 0.6, 0.9, 0.5]),
        ],
    )
    .unwrap()
}

#[test]
pub fn test_param_option_selection() {
    let table = option_table();
    let mut claimed = Assignments::default();

    // Integer columns include their bounds.
    let low = ParamOption::new("low", vec![ParameterSpec::numeric("a", 1.0, 3.0)], false);
    assert_eq!(low.select(&table, &mut claimed).unwrap(), vec![0, 1, 2]);

    let high = ParamOption::new("high", vec![ParameterSpec::numeric("a", 2.0, 5.0)], true);
    assert_eq!(high.select(&table, &mut claimed).unwrap(), vec![3, 4]);
    assert_eq!(claimed.owner(1), Some("low"));
    assert_eq!(claimed.claimed_by("high").len(), 2);

    // Without exclusivity the regions overlap.
    let overlap = ParamOption::new("overlap", vec![ParameterSpec::numeric("a", 2.0, 5.0)], false);
    assert_eq!(overlap.select(&table, &mut claimed).unwrap(), vec![1, 2, 3, 4]);
    assert!(claimed.claimed_by("overlap").is_empty());

    // Other columns exclude their bounds.
    let inner = ParamOption::new("inner", vec![ParameterSpec::numeric("c", 0.5, 1.5)], false);
    assert_eq!(inner.select(&table, &mut Assignments::default()).unwrap(), vec![1, 3]);

    let constant = ParamOption::new("three", vec![ParameterSpec::numeric("a", 3.0, 3.0)], false);
    assert_eq!(constant.select(&table, &mut Assignments::default()).unwrap(), vec![2]);

    let label = ParamOption::new(
        "x",
        vec![ParameterSpec {
            name: "mode".to_string(),
            display: "mode".to_string(),
            kind: ParameterType::Other("string".to_string()),
            setting: String::new(),
            minimum: "x".to_string(),
            maximum: "x".to_string(),
        }],
        false,
    );
    assert_eq!(label.select(&table, &mut Assignments::default()).unwrap(), vec![0, 2, 4]);
}

#[test]
pub fn test_parameter_profile() {
    let table = option_table();
    let a = ParameterProfile::observe(&table, "a").unwrap();
    assert!(a.is_integer);
    assert_eq!((a.observed_min, a.observed_max), (Some(1.0), Some(5.0)));
    assert!(!ParameterProfile::observe(&table, "c").unwrap().is_integer);
    assert!(!ParameterProfile::observe(&table, "mode").unwrap().is_integer);
}

#[test]
pub fn test_option_names() {
    assert_eq!(option_name("runs/param-low.csv"), "low");
    assert_eq!(option_name("other.csv"), "other");
}

#[test]
pub fn test_compare_writes_one_file_per_metric() {
    let table = option_table();
    let metrics = [MetricSpec::new("m", 0.5, 0.0, 1.0)];
    let options = vec![
        ParamOption::new("low", vec![ParameterSpec::numeric("a", 1.0, 3.0)], false),
        ParamOption::new("high", vec![ParameterSpec::numeric("a", 2.0, 5.0)], true),
        ParamOption::new("none", vec![ParameterSpec::numeric("a", 9.0, 9.0)], true),
    ];
    let dir = tempfile::tempdir().unwrap();
    let s = Settings {
        epsteps: 4,
        output_dir: dir.path().to_path_buf(),
        ..Settings::default()
    };
    options::compare(&options, &table, &metrics, &s, "cmp.csv").unwrap();

    let written = fs::read_to_string(dir.path().join("cmp_m.csv")).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "option,epsilon,value");
    assert_eq!(lines.len(), 1 + 2 * 5);
    assert!(lines[1..6].iter().all(|l| l.starts_with("low,")));
    assert!(lines[6..].iter().all(|l| l.starts_with("high,")));
    assert!(!written.contains("none"));
}

#[test]
pub fn test_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, r#"{"epsteps": 20, "rescale": true}"#).unwrap();
    let s = Settings::from_json_file(&path).unwrap();
    assert_eq!(s.epsteps, 20);
    assert!(s.rescale);
    assert_eq!(s.maxep, 1.0);

    fs::write(&path, r#"{"maxep": -1.0}"#).unwrap();
    assert!(matches!(Settings::from_json_file(&path), Err(AbcError::Configuration(_))));
}

#[test]
pub fn test_scales_tolerate_a_curve_that_never_rises() {
    let mut rng = StdRng::seed_from_u64(5);
    let a: Vec<f64> = (0..50).map(|_| rng.gen_range(0.0..1.0)).collect();
    let table = RunTable::from_numeric_columns(vec![("a", a), ("b", vec![100.0; 50])]).unwrap();
    let metrics = [MetricSpec::new("a", 0.5, 0.0, 1.0), MetricSpec::new("b", 0.5, 0.0, 1.0)];
    let s = Settings {
        epsteps: 20,
        rescale: true,
        ..Settings::default()
    };
    let mut engine = EvidenceEngine::new(table, &metrics, s).unwrap();
    assert!(engine.curve(1).evidence.iter().all(|&e| e == 0.0));
    assert!(engine.curve(1).logevidence.iter().all(|&l| l == 0.0));

    let b = engine.compute_scales()[1];
    assert!(b.optscale.is_finite());
    assert!(b.logoptscale >= 0.0 && b.logoptscale <= 10.0);
    assert_eq!(b.initscale, 100.0);
}

#[test]
pub fn test_missing_cells_are_not_accepted() {
    let table = RunTable::read("a,m,mode\n1,0.5,x\n2,,y\n3,NA,\n4,0.52,x\n".as_bytes(), b',').unwrap();
    let m = table.numeric_column("m").unwrap();
    assert_eq!(m[0], 0.5);
    assert!(m[1].is_nan() && m[2].is_nan());
    assert!(table.numeric_column("mode").is_err());

    let engine = EvidenceEngine::new(table, &[MetricSpec::new("m", 0.5, 0.0, 1.0)], settings(10)).unwrap();
    assert_eq!(*engine.curve(0).evidence.last().unwrap(), 0.5);
    assert_eq!(engine.metric(0).max_abs_value(), 0.52);

    let empty = RunTable::read("m\n\"\"\nNA\n".as_bytes(), b',').unwrap();
    assert!(empty.numeric_column("m").is_err());
}

#[test]
pub fn test_missing_log_values_stay_missing() {
    let spec = MetricSpec::new("size", 10.0, 1.0, 100.0).with_log();
    let m = transform::transform(&spec, vec![10.0, f64::NAN]).unwrap();
    assert_eq!(m.deviations[0], 0.0);
    assert!(m.deviations[1].is_nan());
}

#[test]
pub fn test_histogram_without_bins() {
    let h = Histogram::new(&[0.5], 0.0, 1.0, 0);
    assert!(h.densities.is_empty());
    assert_eq!(h.bin_edges().count(), 0);
}
