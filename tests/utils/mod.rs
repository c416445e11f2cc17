// Integration test utilities
//
// Trip-record fixtures written as CSV files in a temporary directory

#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const HEADER: &str =
    "vehicle,timestamp,stop_sequence,hist_cum,rece_cum,sche_cum,t_predicted,t_measured,route,depot,is_express";

/// Predictors and measured time of the `i`-th synthetic trip
///
/// The measured time follows `0.5 h + 0.3 r + 0.2 s` plus a small
/// deterministic wobble, so every bin with data has a well-posed fit.
pub fn synthetic_trip(i: usize) -> (f64, f64, f64, f64) {
    let h = 20.0 + i as f64 * 9.0;
    let r = 15.0 + ((i * 7) % 13) as f64 * 25.0;
    let s = 30.0 + ((i * 5) % 11) as f64 * 30.0;
    let measured = 0.5 * h + 0.3 * r + 0.2 * s + ((i % 3) as f64 - 1.0);
    (h, r, s, measured)
}

/// CSV text for `count` synthetic trips; even rows are express on route 10,
/// odd rows local on route 22
pub fn synthetic_csv(count: usize) -> String {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for i in 0..count {
        let (h, r, s, measured) = synthetic_trip(i);
        let predicted = 0.4 * h + 0.4 * r + 0.2 * s;
        let (route, express) = if i % 2 == 0 {
            ("10", "true")
        } else {
            ("22", "false")
        };
        let _ = writeln!(
            csv,
            "bus-{},2024-03-01T08:{:02}:00,{},{},{},{},{},{},{},north,{}",
            i % 5,
            i % 60,
            i % 30,
            h,
            r,
            s,
            predicted,
            measured,
            route,
            express
        );
    }
    csv
}

/// A temporary directory holding one CSV fixture
pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

pub fn write_csv(contents: &str) -> Fixture {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("trips.csv");
    fs::write(&path, contents).expect("write fixture");
    Fixture { dir, path }
}

pub fn synthetic_fixture(count: usize) -> Fixture {
    write_csv(&synthetic_csv(count))
}
