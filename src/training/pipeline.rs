//! Preprocessing + classifier pipeline

use super::linear_models::{LogisticRegression, LogisticRegressionConfig};
use crate::dataset::{FeaturePartition, Table};
use crate::error::{LabError, Result};
use crate::preprocessing::{ColumnMapper, PreprocessingConfig};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Column mapper followed by a logistic regression classifier.
///
/// Raw feature tables go in; the mapper is fitted on the training table only
/// and reused unchanged for every later prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditPipeline {
    feature_columns: Vec<String>,
    mapper: ColumnMapper,
    classifier: LogisticRegression,
    is_fitted: bool,
    /// Seconds spent in fit
    fit_time: Option<f64>,
}

impl CreditPipeline {
    pub fn new(
        partition: &FeaturePartition,
        preprocessing: &PreprocessingConfig,
        classifier: LogisticRegressionConfig,
    ) -> Self {
        let mapper = ColumnMapper::from_partition(partition, preprocessing);
        let feature_columns = mapper.source_columns().into_iter().map(String::from).collect();
        Self {
            feature_columns,
            mapper,
            classifier: LogisticRegression::with_config(classifier),
            is_fitted: false,
            fit_time: None,
        }
    }

    /// Raw columns the pipeline consumes, in transform order
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn mapper(&self) -> &ColumnMapper {
        &self.mapper
    }

    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }

    /// Fit the mapper and classifier. A pipeline can be fitted once.
    pub fn fit(&mut self, x: &Table, y: &Array1<f64>) -> Result<&mut Self> {
        if self.is_fitted {
            return Err(LabError::TrainingError("pipeline is already fitted".to_string()));
        }
        if x.n_rows() != y.len() {
            return Err(LabError::ShapeError {
                expected: format!("{} labels", x.n_rows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let start = Instant::now();
        let features = self.mapper.fit_transform(x)?;
        self.classifier.fit(&features, y)?;
        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());

        info!(
            rows = x.n_rows(),
            raw_features = self.feature_columns.len(),
            engineered_features = features.ncols(),
            iterations = self.classifier.n_iter,
            "pipeline fitted"
        );
        Ok(self)
    }

    /// Engineered feature matrix for a raw table
    pub fn transform(&self, x: &Table) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(LabError::ModelNotFitted);
        }
        self.mapper.transform(x)
    }

    /// Probability of class 1 per row
    pub fn predict_proba(&self, x: &Table) -> Result<Array1<f64>> {
        let features = self.transform(x)?;
        self.classifier.predict_proba(&features)
    }

    pub fn predict(&self, x: &Table) -> Result<Array1<f64>> {
        let features = self.transform(x)?;
        self.classifier.predict(&features)
    }

    /// Accuracy on a labelled table
    pub fn score(&self, x: &Table, y: &Array1<f64>) -> Result<f64> {
        let features = self.transform(x)?;
        self.classifier.score(&features, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{partition_features, TableColumn};
    use ndarray::array;

    fn create_training_table() -> (Table, Array1<f64>) {
        let table = Table::new(vec![
            TableColumn::numeric(
                "amount",
                vec![Some(1.0), Some(2.0), None, Some(8.0), Some(9.0), Some(10.0)],
            ),
            TableColumn::categorical(
                "housing",
                vec![
                    Some("own".into()),
                    Some("own".into()),
                    Some("rent".into()),
                    Some("free".into()),
                    Some("rent".into()),
                    Some("free".into()),
                ],
            ),
        ])
        .unwrap();
        (table, array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0])
    }

    fn pipeline_for(table: &Table) -> CreditPipeline {
        let partition = partition_features(table).unwrap();
        CreditPipeline::new(
            &partition,
            &PreprocessingConfig::default(),
            LogisticRegressionConfig::default(),
        )
    }

    #[test]
    fn test_fit_and_predict() {
        let (table, y) = create_training_table();
        let mut pipeline = pipeline_for(&table);
        pipeline.fit(&table, &y).unwrap();

        assert!(pipeline.is_fitted());
        assert_eq!(pipeline.feature_columns(), ["amount", "housing"]);
        assert_eq!(pipeline.mapper().n_output_features(), 4);

        let proba = pipeline.predict_proba(&table).unwrap();
        assert_eq!(proba.len(), 6);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(pipeline.score(&table, &y).unwrap() >= 0.5);
    }

    #[test]
    fn test_second_fit_rejected() {
        let (table, y) = create_training_table();
        let mut pipeline = pipeline_for(&table);
        pipeline.fit(&table, &y).unwrap();
        assert!(pipeline.fit(&table, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let (table, _) = create_training_table();
        let pipeline = pipeline_for(&table);
        assert!(matches!(pipeline.predict(&table), Err(LabError::ModelNotFitted)));
    }

    #[test]
    fn test_unknown_category_at_prediction() {
        let (table, y) = create_training_table();
        let mut pipeline = pipeline_for(&table);
        pipeline.fit(&table, &y).unwrap();

        let unseen = Table::new(vec![
            TableColumn::numeric("amount", vec![Some(5.0)]),
            TableColumn::categorical("housing", vec![Some("boat".into())]),
        ])
        .unwrap();
        let features = pipeline.transform(&unseen).unwrap();
        assert_eq!(features.row(0).iter().skip(1).sum::<f64>(), 0.0);
        assert!(pipeline.predict_proba(&unseen).is_ok());
    }
}
