//! Shared fixtures for integration tests

#![allow(dead_code)]

use mlops_lab::tracking::{open_workspace, WorkspaceConfig, WorkspaceStore, WORKSPACE_DATASET};
use std::fs;
use std::path::{Path, PathBuf};

pub const NUMERIC: [&str; 5] = ["Age", "Job", "Credit amount", "Duration", "Dependents"];
pub const SEX: [&str; 2] = ["female", "male"];
pub const HOUSING: [&str; 3] = ["free", "own", "rent"];
pub const PURPOSE: [&str; 4] = ["business", "car", "education", "radio/TV"];

/// Width of the engineered matrix for the synthetic credit file
pub const ENGINEERED_WIDTH: usize = 5 + 2 + 3 + 4;

/// Credit-style CSV: id column, five numeric and three categorical features,
/// and a good/bad risk label driven mostly by duration and amount
pub fn credit_csv(rows: usize) -> String {
    let mut out = String::from(
        "Sno,Age,Sex,Job,Housing,Credit amount,Duration,Purpose,Dependents,Risk\n",
    );
    for i in 0..rows {
        let age = 19 + (i * 7) % 50;
        let job = i % 4;
        let amount = 500 + (i * 389) % 9000;
        let duration = 6 + (i * 11) % 54;
        let dependents = 1 + i % 2;
        let risky = duration > 30 || amount > 7000;
        // A few rows against the rule keep the classes from separating perfectly
        let risky = if i % 17 == 0 { !risky } else { risky };
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            i,
            age,
            SEX[i % 2],
            job,
            HOUSING[i % 3],
            amount,
            duration,
            PURPOSE[i % 4],
            dependents,
            if risky { "bad" } else { "good" }
        ));
    }
    out
}

pub fn write_credit_csv(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("german_credit_data.csv");
    fs::write(&path, credit_csv(rows)).unwrap();
    path
}

/// Workspace config plus a registered credit dataset; returns the config path
pub fn setup_workspace(dir: &Path, rows: usize) -> PathBuf {
    let config_path = dir.join("config.json");
    WorkspaceConfig::new("sub-1", "rg-lab", "lab-ws")
        .write(&config_path)
        .unwrap();
    let csv = write_credit_csv(dir, rows);
    store(&config_path)
        .register_dataset(WORKSPACE_DATASET, &csv, None, "German credit")
        .unwrap();
    config_path
}

pub fn store(config_path: &Path) -> WorkspaceStore {
    open_workspace(config_path).unwrap()
}
