//! End-to-end runs of the `enso-daily` binary on generated sample data.

use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

use enso_daily::data::loader::{load_gridded, load_index};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_enso-daily"))
}

fn generate(out: &Path) {
    Command::new(env!("CARGO_BIN_EXE_generate_sample"))
        .args([path_arg(out).as_str(), "1990", "1993"])
        .assert()
        .success();
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn index_predictors_align_produce_split_files() -> TestResult {
    let tmp = TempDir::new()?;
    let raw = tmp.path().join("raw");
    let processed = tmp.path().join("processed");
    let splits = tmp.path().join("splits");
    generate(&raw);

    cli()
        .args([
            "index",
            "--data-dir",
            &path_arg(&raw.join("sst")),
            "--save-dir",
            &path_arg(&processed),
            "--start-year",
            "1990",
            "--end-year",
            "1993",
            "--n-days-rolling",
            "30",
        ])
        .assert()
        .success();

    let index = load_index(&processed.join("enso_daily.parquet"))?;
    // 1990..=1993 with one leap year.
    assert_eq!(index.len(), 4 * 365 + 1);
    assert_eq!(index.values().iter().take_while(|v| v.is_none()).count(), 29);

    cli()
        .args([
            "predictors",
            "--data-dir",
            &path_arg(&raw),
            "--save-dir",
            &path_arg(&processed),
            "--start-year",
            "1990",
            "--end-year",
            "1993",
            "-v",
            "2m_temperature",
            "-v",
            "temperature",
            "--constants",
            &path_arg(&raw.join("constants.parquet")),
        ])
        .assert()
        .success();

    let predictors = load_gridded(&processed.join("era5_daily.parquet"))?;
    let names: Vec<String> = predictors.channels().iter().map(|c| c.to_string()).collect();
    // t at 1000 hPa is not a configured pressure level; constants keep file order.
    assert_eq!(names, ["t2m", "t_500", "t_850", "lsm", "orography", "lat2d"]);
    assert_eq!(predictors.len(), index.len());

    cli()
        .args([
            "align",
            "--data-dir",
            &path_arg(&processed),
            "--save-dir",
            &path_arg(&splits),
            "--start-train-year",
            "1991",
            "--start-val-year",
            "1992",
            "--start-test-year",
            "1993",
            "--end-year",
            "1993",
            "--lead-time",
            "10",
        ])
        .assert()
        .success();

    for split in ["train", "val", "test"] {
        assert!(splits.join(format!("{split}.parquet")).is_file(), "{split}");
    }
    Ok(())
}

#[test]
fn compare_reports_perfect_agreement_with_itself() -> TestResult {
    let tmp = TempDir::new()?;
    let raw = tmp.path().join("raw");
    generate(&raw);

    cli()
        .args([
            "index",
            "--data-dir",
            &path_arg(&raw.join("sst")),
            "--save-dir",
            &path_arg(tmp.path()),
            "--start-year",
            "1990",
            "--end-year",
            "1991",
            "--format",
            "csv",
        ])
        .assert()
        .success();

    let index = path_arg(&tmp.path().join("enso_daily.csv"));
    cli()
        .args(["compare", "--index", &index, "--reference", &index])
        .assert()
        .success()
        .stdout(contains("correlation: 1.0000"))
        .stdout(contains("rmse: 0.0000"));
    Ok(())
}

#[test]
fn normalize_flag_overrides_the_config_file() -> TestResult {
    let tmp = TempDir::new()?;
    let raw = tmp.path().join("raw");
    generate(&raw);
    let config = tmp.path().join("config.json");
    std::fs::write(&config, r#"{ "index": { "normalize": true } }"#)?;

    let run = |save: &Path, extra: &[&str]| {
        cli()
            .args(["--config", &path_arg(&config), "index"])
            .args(["--data-dir", &path_arg(&raw.join("sst")), "--save-dir", &path_arg(save)])
            .args(["--start-year", "1990", "--end-year", "1991"])
            .args(extra)
            .assert()
            .success();
        load_index(&save.join("enso_daily.parquet"))
    };
    let configured = run(&tmp.path().join("configured"), &[])?;
    let overridden = run(&tmp.path().join("overridden"), &["--normalize", "false"])?;

    cli()
        .args(["index", "--data-dir", &path_arg(&raw.join("sst"))])
        .args(["--save-dir", &path_arg(&tmp.path().join("plain"))])
        .args(["--start-year", "1990", "--end-year", "1991"])
        .assert()
        .success();
    let plain = load_index(&tmp.path().join("plain").join("enso_daily.parquet"))?;

    assert_eq!(overridden, plain);
    assert_ne!(configured, plain);
    Ok(())
}

#[test]
fn inverted_year_range_fails() {
    let tmp = TempDir::new().unwrap();
    cli()
        .args([
            "index",
            "--data-dir",
            &path_arg(tmp.path()),
            "--save-dir",
            &path_arg(tmp.path()),
            "--start-year",
            "1993",
            "--end-year",
            "1990",
        ])
        .assert()
        .failure()
        .stderr(contains("must be before"));
}

#[test]
fn lead_time_reaching_before_the_data_fails() -> TestResult {
    let tmp = TempDir::new()?;
    let raw = tmp.path().join("raw");
    generate(&raw);

    for (cmd, dir) in [("index", raw.join("sst")), ("predictors", raw.clone())] {
        let mut c = cli();
        c.args([cmd, "--data-dir", &path_arg(&dir), "--save-dir", &path_arg(tmp.path())])
            .args(["--start-year", "1990", "--end-year", "1993"]);
        if cmd == "predictors" {
            c.args(["-v", "2m_temperature"]);
        }
        c.assert().success();
    }

    // Training starts on the first available day, so a 10-day lead has no
    // predictor history.
    cli()
        .args([
            "align",
            "--data-dir",
            &path_arg(tmp.path()),
            "--save-dir",
            &path_arg(&tmp.path().join("splits")),
            "--start-train-year",
            "1990",
            "--start-val-year",
            "1991",
            "--start-test-year",
            "1992",
            "--end-year",
            "1993",
            "--lead-time",
            "10",
        ])
        .assert()
        .failure()
        .stderr(contains("predictor series needs data from 1989-12-22"));
    Ok(())
}
