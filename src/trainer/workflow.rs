//! Train-and-explain workflow

use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::info;

use super::config::TrainConfig;
use crate::dataset::partition_features;
use crate::error::{LabError, Result};
use crate::explainability::{classifier_explainer, explain_table};
use crate::export::Artifact;
use crate::tracking::{RunContext, RunMode};
use crate::training::{stratified_split, CreditPipeline};

/// Local file holding the holdout features
pub const X_TEST_FILE: &str = "x_test.pkl";
/// Run artifact name of the holdout features
pub const X_TEST_ARTIFACT: &str = "x_test_credit.pkl";
/// Local file holding the fitted pipeline
pub const MODEL_FILE: &str = "log_reg.pkl";
/// Run artifact name of the fitted pipeline
pub const MODEL_ARTIFACT: &str = "model.pkl";

/// Summary of a finished training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub run_id: String,
    pub remote: bool,
    pub n_train: usize,
    pub n_test: usize,
    /// Target classes in code order
    pub classes: Vec<String>,
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    /// Width of the engineered feature matrix
    pub n_engineered_features: usize,
    pub accuracy: f64,
    pub converged: bool,
    pub iterations: usize,
    pub model_name: String,
    pub model_version: u32,
    pub explanation_id: String,
    /// Features by descending global importance
    pub ranking: Vec<(String, f64)>,
}

fn select(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    y.select(Axis(0), indices)
}

/// Train the credit pipeline, store its artifacts and explain it through `ctx`.
///
/// The run is completed at the end only when it is interactive.
pub fn train_and_explain(ctx: &mut dyn RunContext, config: &TrainConfig) -> Result<TrainReport> {
    config.validate()?;
    fs::create_dir_all(&config.output_dir)?;

    info!(run_id = ctx.id(), workspace = ctx.workspace_name(), "load dataset");
    let mut table = ctx.input_dataset()?;
    info!(
        rows = table.n_rows(),
        columns = ?table.column_names(),
        "dataset loaded"
    );

    table.drop_column(&config.id_column)?;
    let codes = table.recode_as_category(&config.target_column, &config.encoded_target)?;
    if codes.categories.len() != 2 {
        return Err(LabError::DataError(format!(
            "target '{}' must have exactly two classes, found {:?}",
            config.target_column, codes.categories
        )));
    }
    let target = table.take_target(&config.encoded_target)?;

    let partition = partition_features(&table)?;
    info!(
        numeric = ?partition.numeric,
        categorical = ?partition.categorical,
        "features partitioned"
    );

    let split = stratified_split(&target, config.test_size, config.seed)?;
    let x_train = table.take_rows(&split.train)?;
    let x_test = table.take_rows(&split.test)?;
    let y_train = select(&target, &split.train);
    let y_test = select(&target, &split.test);

    let x_test_path = config.output_dir.join(X_TEST_FILE);
    x_test.save(&x_test_path)?;
    ctx.upload_file(X_TEST_ARTIFACT, &x_test_path)?;

    info!(train_rows = x_train.n_rows(), test_rows = x_test.n_rows(), "train model");
    let mut pipeline = CreditPipeline::new(
        &partition,
        &config.preprocessing,
        config.classifier.clone(),
    );
    pipeline.fit(&x_train, &y_train)?;

    let model_path = config.output_dir.join(MODEL_FILE);
    pipeline.save(&model_path)?;
    ctx.upload_file(MODEL_ARTIFACT, &model_path)?;
    let model = ctx.register_model(&config.model_name, MODEL_ARTIFACT)?;

    let accuracy = pipeline.score(&x_test, &y_test)?;
    ctx.log_metric("accuracy", accuracy)?;
    ctx.log_param("C", &config.classifier.c.to_string())?;
    ctx.log_param("max_iter", &config.classifier.max_iter.to_string())?;
    ctx.log_param("test_size", &config.test_size.to_string())?;
    ctx.log_param("seed", &config.seed.to_string())?;
    info!(accuracy, model = %model.name, version = model.version, "model registered");

    info!("create explainer");
    let explainer = classifier_explainer(
        pipeline.classifier(),
        pipeline.mapper(),
        &x_train,
        config.explainer.clone(),
    )?;
    let explanation = explain_table(&explainer, pipeline.mapper(), &x_test)?
        .with_comment(config.explanation_comment.clone());

    info!("upload explanation");
    let uploaded = ctx.upload_explanation(&explanation, &config.explanation_comment)?;

    let remote = ctx.mode() == RunMode::Remote;
    if !remote {
        ctx.complete()?;
    }
    info!(run_id = ctx.id(), "completed");

    let ranking = explanation
        .top_k(explanation.feature_names.len())
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

    Ok(TrainReport {
        run_id: ctx.id().to_string(),
        remote,
        n_train: x_train.n_rows(),
        n_test: x_test.n_rows(),
        classes: codes.categories,
        numeric_features: partition.numeric,
        categorical_features: partition.categorical,
        n_engineered_features: pipeline.mapper().n_output_features(),
        accuracy,
        converged: pipeline.classifier().converged,
        iterations: pipeline.classifier().n_iter,
        model_name: model.name,
        model_version: model.version,
        explanation_id: uploaded.id,
        ranking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Table, TableColumn};
    use crate::explainability::{ExplainerConfig, GlobalExplanation};
    use crate::tracking::{ExplanationEntry, ModelEntry};
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::tempdir;

    struct MockRun {
        id: String,
        mode: RunMode,
        table: Table,
        uploads: Vec<String>,
        metrics: BTreeMap<String, f64>,
        explanations: Vec<String>,
        completions: usize,
    }

    impl MockRun {
        fn new(id: &str, table: Table) -> Self {
            Self {
                id: id.to_string(),
                mode: RunMode::from_run_id(id),
                table,
                uploads: Vec::new(),
                metrics: BTreeMap::new(),
                explanations: Vec::new(),
                completions: 0,
            }
        }
    }

    impl RunContext for MockRun {
        fn id(&self) -> &str {
            &self.id
        }

        fn mode(&self) -> RunMode {
            self.mode
        }

        fn workspace_name(&self) -> &str {
            "mock"
        }

        fn input_dataset(&self) -> Result<Table> {
            Ok(self.table.clone())
        }

        fn upload_file(&mut self, name: &str, path: &Path) -> Result<()> {
            assert!(path.is_file(), "{} was not written", path.display());
            self.uploads.push(name.to_string());
            Ok(())
        }

        fn register_model(&mut self, model_name: &str, artifact_name: &str) -> Result<ModelEntry> {
            assert!(self.uploads.iter().any(|u| u == artifact_name));
            Ok(ModelEntry {
                name: model_name.to_string(),
                version: 1,
                run_id: self.id.clone(),
                run_artifact: artifact_name.to_string(),
                path: format!("models/{}/1/{}", model_name, artifact_name),
                registered_at: String::new(),
            })
        }

        fn upload_explanation(
            &mut self,
            _explanation: &GlobalExplanation,
            comment: &str,
        ) -> Result<ExplanationEntry> {
            self.explanations.push(comment.to_string());
            Ok(ExplanationEntry {
                id: "explanation-1".to_string(),
                comment: comment.to_string(),
                uploaded_at: String::new(),
            })
        }

        fn log_metric(&mut self, name: &str, value: f64) -> Result<()> {
            self.metrics.insert(name.to_string(), value);
            Ok(())
        }

        fn log_param(&mut self, _name: &str, _value: &str) -> Result<()> {
            Ok(())
        }

        fn complete(&mut self) -> Result<()> {
            self.completions += 1;
            Ok(())
        }
    }

    fn credit_table(n: usize) -> Table {
        let housing = ["own", "rent", "free"];
        let duration: Vec<f64> = (0..n).map(|i| (6 + (i * 7) % 40) as f64).collect();
        Table::new(vec![
            TableColumn::numeric("Sno", (0..n).map(|i| Some(i as f64)).collect()),
            TableColumn::numeric("Age", (0..n).map(|i| Some((20 + (i * 3) % 45) as f64)).collect()),
            TableColumn::numeric("Duration", duration.iter().map(|&d| Some(d)).collect()),
            TableColumn::categorical(
                "Housing",
                (0..n).map(|i| Some(housing[i % 3].to_string())).collect(),
            ),
            TableColumn::categorical(
                "Risk",
                duration
                    .iter()
                    .map(|&d| Some(if d > 25.0 { "bad" } else { "good" }.to_string()))
                    .collect(),
            ),
        ])
        .unwrap()
    }

    fn fast_config(dir: &Path) -> TrainConfig {
        TrainConfig::default()
            .with_output_dir(dir)
            .with_explainer(ExplainerConfig::default().with_n_permutations(4))
    }

    #[test]
    fn test_local_run_completes_once() {
        let dir = tempdir().unwrap();
        let mut run = MockRun::new("OfflineRun_1234", credit_table(40));
        let report = train_and_explain(&mut run, &fast_config(dir.path())).unwrap();

        assert_eq!(run.completions, 1);
        assert!(!report.remote);
        assert_eq!(run.uploads, vec![X_TEST_ARTIFACT, MODEL_ARTIFACT]);
        assert_eq!(run.explanations.len(), 1);
        assert!(run.metrics.contains_key("accuracy"));
        assert!(dir.path().join(X_TEST_FILE).is_file());
        assert!(dir.path().join(MODEL_FILE).is_file());
    }

    #[test]
    fn test_remote_run_never_completes() {
        let dir = tempdir().unwrap();
        let mut run = MockRun::new("Train-Explain-Remote_1_abcd", credit_table(40));
        let report = train_and_explain(&mut run, &fast_config(dir.path())).unwrap();

        assert_eq!(run.completions, 0);
        assert!(report.remote);
    }

    #[test]
    fn test_report_contents() {
        let dir = tempdir().unwrap();
        let mut run = MockRun::new("OfflineRun_1", credit_table(40));
        let report = train_and_explain(&mut run, &fast_config(dir.path())).unwrap();

        assert_eq!(report.n_test, 8);
        assert_eq!(report.n_train, 32);
        assert_eq!(report.classes, vec!["bad", "good"]);
        assert_eq!(report.numeric_features, vec!["Age", "Duration"]);
        assert_eq!(report.categorical_features, vec!["Housing"]);
        assert_eq!(report.n_engineered_features, 2 + 3);
        assert_eq!(report.ranking.len(), 3);
        assert!((0.0..=1.0).contains(&report.accuracy));
    }

    #[test]
    fn test_holdout_artifact_loads_back() {
        let dir = tempdir().unwrap();
        let mut run = MockRun::new("OfflineRun_1", credit_table(40));
        train_and_explain(&mut run, &fast_config(dir.path())).unwrap();

        let x_test = Table::load(dir.path().join(X_TEST_FILE)).unwrap();
        assert_eq!(x_test.n_rows(), 8);
        assert!(x_test.column("Sno").is_err());
        assert!(x_test.column("Risk").is_err());

        let pipeline = CreditPipeline::load(dir.path().join(MODEL_FILE)).unwrap();
        assert_eq!(pipeline.predict(&x_test).unwrap().len(), 8);
    }

    #[test]
    fn test_missing_id_column_fails() {
        let dir = tempdir().unwrap();
        let mut table = credit_table(40);
        table.drop_column("Sno").unwrap();
        let mut run = MockRun::new("OfflineRun_1", table);
        assert!(train_and_explain(&mut run, &fast_config(dir.path())).is_err());
        assert_eq!(run.completions, 0);
    }

    #[test]
    fn test_non_binary_target_fails() {
        let dir = tempdir().unwrap();
        let n = 30;
        let table = Table::new(vec![
            TableColumn::numeric("Sno", (0..n).map(|i| Some(i as f64)).collect()),
            TableColumn::numeric("Age", (0..n).map(|i| Some(i as f64)).collect()),
            TableColumn::categorical(
                "Risk",
                (0..n).map(|i| Some(["a", "b", "c"][i % 3].to_string())).collect(),
            ),
        ])
        .unwrap();
        let mut run = MockRun::new("OfflineRun_1", table);
        assert!(train_and_explain(&mut run, &fast_config(dir.path())).is_err());
    }
}
