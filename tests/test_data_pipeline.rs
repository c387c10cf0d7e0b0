//! Integration tests for loading, partitioning and the feature pipeline

mod common;

use common::{write_credit_csv, ENGINEERED_WIDTH};
use mlops_lab::dataset::{partition_features, ColumnKind, Schema, Table, TableColumn};
use mlops_lab::export::Artifact;
use mlops_lab::preprocessing::{HandleUnknown, PreprocessingConfig};
use mlops_lab::training::{stratified_split, CreditPipeline, LogisticRegressionConfig};
use mlops_lab::utils::DataLoader;
use ndarray::Array1;
use std::fs;
use tempfile::tempdir;

fn load_features(rows: usize) -> (Table, Array1<f64>) {
    let dir = tempdir().unwrap();
    let csv = write_credit_csv(dir.path(), rows);
    let mut table = DataLoader::new().load_table(&csv, None).unwrap();
    table.drop_column("Sno").unwrap();
    table.recode_as_category("Risk", "Risk_cat").unwrap();
    let y = table.take_target("Risk_cat").unwrap();
    (table, y)
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_inferred_kinds() {
    let (table, y) = load_features(50);
    assert_eq!(table.n_rows(), 50);
    assert_eq!(y.len(), 50);
    assert!(y.iter().all(|&v| v == 0.0 || v == 1.0));

    let partition = partition_features(&table).unwrap();
    assert_eq!(partition.numeric.len(), 5);
    assert_eq!(partition.categorical, vec!["Sex", "Housing", "Purpose"]);
    assert_eq!(partition.len(), table.n_cols());
}

#[test]
fn test_declared_schema_overrides_inference() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("jobs.csv"), "Job,Age\n1,30\n2,41\n1,25\n").unwrap();
    let schema = Schema::new()
        .with_field("Job", ColumnKind::Categorical)
        .with_field("Age", ColumnKind::Numeric);

    let table = DataLoader::new()
        .load_table(dir.path().join("jobs.csv"), Some(&schema))
        .unwrap();
    let partition = partition_features(&table).unwrap();
    assert_eq!(partition.categorical, vec!["Job"]);
    assert_eq!(partition.numeric, vec!["Age"]);
}

#[test]
fn test_undeclared_column_rejected() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("extra.csv"), "Age,Extra\n30,a\n").unwrap();
    let schema = Schema::new().with_field("Age", ColumnKind::Numeric);
    assert!(DataLoader::new()
        .load_table(dir.path().join("extra.csv"), Some(&schema))
        .is_err());
}

// ============================================================================
// Feature pipeline
// ============================================================================

#[test]
fn test_pipeline_width_and_accuracy() {
    let (table, y) = load_features(120);
    let partition = partition_features(&table).unwrap();
    let split = stratified_split(&y, 0.2, 0).unwrap();
    let x_train = table.take_rows(&split.train).unwrap();
    let x_test = table.take_rows(&split.test).unwrap();
    let y_train = Array1::from(split.train.iter().map(|&i| y[i]).collect::<Vec<_>>());
    let y_test = Array1::from(split.test.iter().map(|&i| y[i]).collect::<Vec<_>>());

    let mut pipeline = CreditPipeline::new(
        &partition,
        &PreprocessingConfig::default(),
        LogisticRegressionConfig::default(),
    );
    pipeline.fit(&x_train, &y_train).unwrap();

    assert_eq!(pipeline.transform(&x_test).unwrap().ncols(), ENGINEERED_WIDTH);
    let proba = pipeline.predict_proba(&x_test).unwrap();
    assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    assert!(pipeline.score(&x_test, &y_test).unwrap() > 0.5);
}

#[test]
fn test_missing_numeric_values_are_imputed() {
    let (mut table, y) = load_features(60);
    let ages: Vec<Option<f64>> = (0..60).map(|i| if i % 5 == 0 { None } else { Some(30.0 + i as f64) }).collect();
    table.drop_column("Age").unwrap();
    table.push_column(TableColumn::numeric("Age", ages)).unwrap();

    let partition = partition_features(&table).unwrap();
    let mut pipeline = CreditPipeline::new(
        &partition,
        &PreprocessingConfig::default(),
        LogisticRegressionConfig::default(),
    );
    pipeline.fit(&table, &y).unwrap();
    let x = pipeline.transform(&table).unwrap();
    assert!(x.iter().all(|v| v.is_finite()));
}

#[test]
fn test_unknown_category_handling() {
    let (table, y) = load_features(60);
    let partition = partition_features(&table).unwrap();

    let mut unseen = table.take_rows(&[0, 1]).unwrap();
    unseen.drop_column("Purpose").unwrap();
    unseen
        .push_column(TableColumn::categorical(
            "Purpose",
            vec![Some("vacation".to_string()), Some("car".to_string())],
        ))
        .unwrap();

    let mut lenient = CreditPipeline::new(
        &partition,
        &PreprocessingConfig::default(),
        LogisticRegressionConfig::default(),
    );
    lenient.fit(&table, &y).unwrap();
    assert_eq!(lenient.predict(&unseen).unwrap().len(), 2);

    let mut strict = CreditPipeline::new(
        &partition,
        &PreprocessingConfig::default().with_handle_unknown(HandleUnknown::Error),
        LogisticRegressionConfig::default(),
    );
    strict.fit(&table, &y).unwrap();
    assert!(strict.predict(&unseen).is_err());
}

// ============================================================================
// Artifacts
// ============================================================================

#[test]
fn test_corrupted_pipeline_artifact_rejected() {
    let (table, y) = load_features(60);
    let partition = partition_features(&table).unwrap();
    let mut pipeline = CreditPipeline::new(
        &partition,
        &PreprocessingConfig::default(),
        LogisticRegressionConfig::default(),
    );
    pipeline.fit(&table, &y).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("model.pkl");
    pipeline.save(&path).unwrap();
    let restored = CreditPipeline::load(&path).unwrap();
    assert_eq!(
        restored.predict(&table).unwrap(),
        pipeline.predict(&table).unwrap()
    );

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 10;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();
    assert!(CreditPipeline::load(&path).is_err());
}
