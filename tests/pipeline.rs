use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use xrt_locus::{
    analyze, load_table, AnalysisConfig, AnalysisError, PositionRange, RegionOfInterest,
    XyFilter,
};

const I0_HIGH: f64 = 45_000.0;
const I0_LOW: f64 = 30_000.0;
const ROWS: usize = 100;
const MATERIAL_ROWS: usize = 70;
const SPIKE_ROW: usize = 10;

fn low_att(row: usize) -> f64 {
    if row < MATERIAL_ROWS {
        0.2 + 0.025 * row as f64
    } else {
        0.0
    }
}

fn high_att(row: usize) -> f64 {
    1.5 * low_att(row).powf(1.2)
}

/// One-board scan with a leading unnamed index column, as pandas writes it.
fn write_scan(dir: &Path, spike: bool) -> PathBuf {
    let mut text = String::new();
    text.push(',');
    text.push_str(
        &(1..=128)
            .map(|c| format!("D{c}"))
            .collect::<Vec<_>>()
            .join(","),
    );
    text.push('\n');

    for row in 0..ROWS {
        let gain = if spike && row == SPIKE_ROW { 0.5 } else { 1.0 };
        let high = I0_HIGH * (-high_att(row)).exp() * gain;
        let low = I0_LOW * (-low_att(row)).exp();
        write!(text, "{row}").unwrap();
        for c in 0..128 {
            let v = if c < 64 { high } else { low };
            write!(text, ",{v}").unwrap();
        }
        text.push('\n');
    }

    let path = dir.join("scan.csv");
    std::fs::write(&path, text).unwrap();
    path
}

fn base_config() -> AnalysisConfig {
    let mut cfg = AnalysisConfig::new(1, PositionRange::new(113.0, 160.0));
    cfg.fit_range = Some(PositionRange::new(0.0, 100.0));
    cfg
}

#[test]
fn csv_scan_recovers_locus_and_objects() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_table(&write_scan(dir.path(), true)).unwrap();

    let mut cfg = base_config();
    cfg.interpolate_spikes.high = true;
    cfg.xy_filter = Some(XyFilter {
        y_low: 1.0,
        y_high: 1e6,
        ..XyFilter::default()
    });
    cfg.objects = vec![RegionOfInterest::new(31.5, 48.5, "kimb1")];
    cfg.continuously_colour = true;

    let report = analyze(&table, &cfg).unwrap();

    assert_eq!(report.high.len(), ROWS);
    assert!((report.references.high - I0_HIGH).abs() < 1e-6);
    assert!((report.references.low - I0_LOW).abs() < 1e-6);

    // the dropout is replaced by its neighbours' projection
    let expected = I0_HIGH * (-high_att(SPIKE_ROW)).exp();
    assert!((report.high.val[SPIKE_ROW] - expected).abs() / expected < 1e-3);

    // rows 20..=30 lie in the object region
    let obj = &report.objects[0];
    let mean_low: f64 = (20..=30)
        .map(|r| I0_LOW * (-low_att(r)).exp())
        .sum::<f64>()
        / 11.0;
    assert!((obj.low_att - (I0_LOW / mean_low).ln()).abs() < 1e-9);

    assert_eq!(report.cloud.len(), ROWS);
    assert_eq!(report.cloud.point_colours.as_ref().map(Vec::len), Some(ROWS));

    let fit = report.locus.as_ref().unwrap().as_ref().unwrap();
    assert!((fit.a - 1.5).abs() < 1e-2, "a = {}", fit.a);
    assert!((fit.b - 1.2).abs() < 1e-2, "b = {}", fit.b);
    assert_eq!(fit.points, 63);

    let curve = fit.sample(report.cloud.low_att_max().unwrap(), 1000);
    assert_eq!(curve.len(), 1000);
}

#[test]
fn wrong_board_count_is_a_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_table(&write_scan(dir.path(), false)).unwrap();

    let mut cfg = base_config();
    cfg.board_count = 2;
    assert!(matches!(analyze(&table, &cfg), Err(AnalysisError::Schema(_))));
}

#[test]
fn failed_fit_keeps_the_point_cloud() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_table(&write_scan(dir.path(), false)).unwrap();

    let mut cfg = base_config();
    // a single exposure cannot support two parameters
    cfg.fit_range = Some(PositionRange::new(0.0, 1.0));

    let report = analyze(&table, &cfg).unwrap();
    assert_eq!(report.cloud.len(), ROWS);
    assert!(matches!(
        report.locus,
        Some(Err(AnalysisError::FitConvergence(_)))
    ));

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["locus"]["error"].as_str().unwrap().contains("converge"));
}

#[test]
fn config_file_drives_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_table(&write_scan(dir.path(), false)).unwrap();

    let cfg_path = dir.path().join("run.json");
    std::fs::write(
        &cfg_path,
        r#"{
            "board_count": 1,
            "reference": { "left": 113, "right": 160 },
            "regions_of_interest": [
                { "left": 0, "right": 50, "label": "thin", "colour": "tab:green" },
                { "left": 51, "right": 100, "label": "thick" }
            ],
            "fit_range": { "left": 0, "right": 100 }
        }"#,
    )
    .unwrap();
    let cfg = AnalysisConfig::from_json_file(&cfg_path).unwrap();

    let report = analyze(&table, &cfg).unwrap();
    assert_eq!(report.cloud.groups.len(), 2);
    assert_eq!(report.cloud.groups[0].colour, "tab:green");
    // rows 0..=31 and 32..=62
    assert_eq!(report.cloud.groups[0].indices.len(), 32);
    assert_eq!(report.cloud.groups[1].indices.len(), 31);
    assert!(report.locus.unwrap().is_ok());
}
