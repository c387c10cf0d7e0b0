//! Sampling Shapley explanations over raw features
//!
//! Each raw feature is one player. Its engineered columns (one column for a
//! numeric feature, the one-hot block for a categorical one) are swapped
//! together, so attributions land on the features the user supplied rather than
//! on the encoded matrix.

use crate::dataset::Table;
use crate::error::{LabError, Result};
use crate::preprocessing::{ColumnMapper, FeatureGroup};
use crate::training::LogisticRegression;
use ndarray::{Array1, Array2, Axis};
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Sampling parameters for [`TabularExplainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Random permutations averaged per evaluation row
    pub n_permutations: usize,
    /// Upper bound on background rows drawn from the training features
    pub max_background: usize,
    pub seed: u64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            n_permutations: 32,
            max_background: 100,
            seed: 0,
        }
    }
}

impl ExplainerConfig {
    pub fn with_n_permutations(mut self, n: usize) -> Self {
        self.n_permutations = n.max(1);
        self
    }

    pub fn with_max_background(mut self, n: usize) -> Self {
        self.max_background = n.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Both sample counts must be positive
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("n_permutations", self.n_permutations),
            ("max_background", self.max_background),
        ] {
            if value == 0 {
                return Err(LabError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Global explanation over raw features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalExplanation {
    pub method: String,
    /// Raw feature names, in attribution order
    pub feature_names: Vec<String>,
    /// Mean absolute attribution per feature
    pub global_importance: Vec<f64>,
    /// Feature names sorted by descending importance
    pub ranking: Vec<String>,
    /// Mean model output over the background sample
    pub expected_value: f64,
    /// Per evaluation row, one attribution per feature
    pub local_importance: Vec<Vec<f64>>,
    /// Model output for each evaluation row
    pub predictions: Vec<f64>,
    pub comment: Option<String>,
}

impl GlobalExplanation {
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Importance of a feature by name
    pub fn importance_of(&self, feature: &str) -> Option<f64> {
        self.feature_names
            .iter()
            .position(|name| name == feature)
            .map(|i| self.global_importance[i])
    }

    /// The `k` most important features with their importance
    pub fn top_k(&self, k: usize) -> Vec<(&str, f64)> {
        self.ranking
            .iter()
            .take(k)
            .filter_map(|name| self.importance_of(name).map(|v| (name.as_str(), v)))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Black-box explainer over grouped feature columns
pub struct TabularExplainer<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>>,
{
    predict_fn: F,
    background: Array2<f64>,
    groups: Vec<FeatureGroup>,
    config: ExplainerConfig,
}

impl<F> TabularExplainer<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>>,
{
    /// Build an explainer from a prediction function over engineered rows.
    ///
    /// `background` is subsampled to at most `config.max_background` rows.
    pub fn new(
        predict_fn: F,
        background: Array2<f64>,
        groups: Vec<FeatureGroup>,
        config: ExplainerConfig,
    ) -> Result<Self> {
        config.validate()?;
        if groups.is_empty() {
            return Err(LabError::ExplanationError("no features to explain".to_string()));
        }
        let width = groups.iter().map(|g| g.range.end).max().unwrap_or(0);
        if width != background.ncols() {
            return Err(LabError::ShapeError {
                expected: format!("{} engineered columns", width),
                actual: format!("{} engineered columns", background.ncols()),
            });
        }

        let background = sample_background(background, config.max_background, config.seed);
        if background.nrows() == 0 {
            return Err(LabError::ExplanationError("background sample is empty".to_string()));
        }
        debug!(rows = background.nrows(), features = groups.len(), "explainer background ready");
        Ok(Self {
            predict_fn,
            background,
            groups,
            config,
        })
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.source.clone()).collect()
    }

    pub fn background(&self) -> &Array2<f64> {
        &self.background
    }

    /// Mean model output over the background
    pub fn expected_value(&self) -> Result<f64> {
        let preds = (self.predict_fn)(&self.background)?;
        Ok(preds.mean().unwrap_or(0.0))
    }

    /// Attributions of one engineered row, one value per feature
    pub fn explain_row(&self, instance: &Array1<f64>, row_index: usize) -> Result<Array1<f64>> {
        if instance.len() != self.background.ncols() {
            return Err(LabError::ShapeError {
                expected: format!("{} engineered columns", self.background.ncols()),
                actual: format!("{} engineered columns", instance.len()),
            });
        }

        let n_groups = self.groups.len();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(row_index as u64));
        let mut phi = Array1::<f64>::zeros(n_groups);
        let mut order: Vec<usize> = (0..n_groups).collect();

        for _ in 0..self.config.n_permutations {
            order.shuffle(&mut rng);
            let start = self.background.row(rng.gen_range(0..self.background.nrows()));

            // Row k holds the background with the first k features of the
            // permutation switched to the instance's values.
            let mut coalitions = Array2::<f64>::zeros((n_groups + 1, instance.len()));
            let mut current = start.to_owned();
            coalitions.row_mut(0).assign(&current);
            for (step, &g) in order.iter().enumerate() {
                let range = self.groups[g].range.clone();
                current
                    .slice_mut(ndarray::s![range.clone()])
                    .assign(&instance.slice(ndarray::s![range]));
                coalitions.row_mut(step + 1).assign(&current);
            }

            let outputs = (self.predict_fn)(&coalitions)?;
            for (step, &g) in order.iter().enumerate() {
                phi[g] += outputs[step + 1] - outputs[step];
            }
        }

        Ok(phi / self.config.n_permutations as f64)
    }

    /// Explain every row of an engineered matrix
    pub fn explain_matrix(&self, x: &Array2<f64>) -> Result<GlobalExplanation> {
        if x.nrows() == 0 {
            return Err(LabError::ExplanationError("evaluation sample is empty".to_string()));
        }

        let mut local = Array2::<f64>::zeros((x.nrows(), self.groups.len()));
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            let phi = self.explain_row(&row.to_owned(), i)?;
            local.row_mut(i).assign(&phi);
        }

        let global = local
            .mapv(f64::abs)
            .mean_axis(Axis(0))
            .ok_or_else(|| LabError::ExplanationError("evaluation sample is empty".to_string()))?;
        let feature_names = self.feature_names();

        let mut ranked: Vec<usize> = (0..feature_names.len()).collect();
        ranked.sort_by(|&a, &b| global[b].total_cmp(&global[a]));
        let ranking = ranked.iter().map(|&i| feature_names[i].clone()).collect();

        let predictions = (self.predict_fn)(x)?.to_vec();

        info!(
            rows = x.nrows(),
            features = feature_names.len(),
            permutations = self.config.n_permutations,
            "global explanation computed"
        );

        Ok(GlobalExplanation {
            method: "sampling_shapley".to_string(),
            feature_names,
            global_importance: global.to_vec(),
            ranking,
            expected_value: self.expected_value()?,
            local_importance: local.outer_iter().map(|r| r.to_vec()).collect(),
            predictions,
            comment: None,
        })
    }
}

/// Seeded subsample without replacement, original row order kept
fn sample_background(data: Array2<f64>, max_rows: usize, seed: u64) -> Array2<f64> {
    if data.nrows() <= max_rows {
        return data;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = index::sample(&mut rng, data.nrows(), max_rows).into_vec();
    rows.sort_unstable();
    data.select(Axis(0), &rows)
}

/// Explainer for a fitted classifier over raw feature tables.
///
/// The background is drawn from `x_train` after applying `mapper`, and the
/// explained output is the probability of class 1.
pub fn classifier_explainer<'a>(
    classifier: &'a LogisticRegression,
    mapper: &ColumnMapper,
    x_train: &Table,
    config: ExplainerConfig,
) -> Result<TabularExplainer<impl Fn(&Array2<f64>) -> Result<Array1<f64>> + 'a>> {
    if !classifier.is_fitted() || !mapper.is_fitted() {
        return Err(LabError::ModelNotFitted);
    }
    let background = mapper.transform(x_train)?;
    TabularExplainer::new(
        move |x: &Array2<f64>| classifier.predict_proba(x),
        background,
        mapper.feature_groups(),
        config,
    )
}

/// Explain raw rows with a classifier explainer
pub fn explain_table<F>(
    explainer: &TabularExplainer<F>,
    mapper: &ColumnMapper,
    x_eval: &Table,
) -> Result<GlobalExplanation>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>>,
{
    let features = mapper.transform(x_eval)?;
    explainer.explain_matrix(&features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_model(x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(x.dot(&array![1.0, 2.0, -3.0]))
    }

    fn groups() -> Vec<FeatureGroup> {
        vec![
            FeatureGroup { source: "a".into(), range: 0..1 },
            FeatureGroup { source: "bc".into(), range: 1..3 },
        ]
    }

    #[test]
    fn test_linear_model_exact_with_single_background_row() {
        let background = array![[0.0, 0.0, 0.0]];
        let explainer =
            TabularExplainer::new(linear_model, background, groups(), ExplainerConfig::default())
                .unwrap();

        let phi = explainer.explain_row(&array![1.0, 1.0, 1.0], 0).unwrap();
        assert!((phi[0] - 1.0).abs() < 1e-12);
        // Grouped columns share one attribution: 2 - 3
        assert!((phi[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_attributions_sum_to_prediction_minus_background() {
        let background = array![[0.5, 1.0, 2.0]];
        let explainer =
            TabularExplainer::new(linear_model, background, groups(), ExplainerConfig::default())
                .unwrap();

        let x = array![[1.0, -1.0, 0.0], [3.0, 2.0, 1.0]];
        let explanation = explainer.explain_matrix(&x).unwrap();
        for (local, pred) in explanation.local_importance.iter().zip(&explanation.predictions) {
            let total: f64 = local.iter().sum();
            assert!((total - (pred - explanation.expected_value)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ranking_and_importance() {
        let background = array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let explainer = TabularExplainer::new(
            linear_model,
            background,
            groups(),
            ExplainerConfig::default().with_n_permutations(8),
        )
        .unwrap();

        let x = array![[10.0, 0.0, 0.0], [-10.0, 0.5, 0.5]];
        let explanation = explainer.explain_matrix(&x).unwrap();
        assert_eq!(explanation.feature_names, vec!["a", "bc"]);
        assert_eq!(explanation.ranking[0], "a");
        assert!(explanation.importance_of("a").unwrap() > explanation.importance_of("bc").unwrap());
        assert_eq!(explanation.top_k(1).len(), 1);
        assert_eq!(explanation.method, "sampling_shapley");
    }

    #[test]
    fn test_zero_sample_counts_rejected() {
        let background = array![[0.0, 0.0, 0.0]];
        for config in [
            ExplainerConfig { max_background: 0, ..ExplainerConfig::default() },
            ExplainerConfig { n_permutations: 0, ..ExplainerConfig::default() },
        ] {
            let result = TabularExplainer::new(linear_model, background.clone(), groups(), config);
            assert!(matches!(result, Err(LabError::InvalidParameter { .. })));
        }
    }

    #[test]
    fn test_empty_background_rejected() {
        let background = Array2::<f64>::zeros((0, 3));
        let result =
            TabularExplainer::new(linear_model, background, groups(), ExplainerConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_seeded_results_repeat() {
        let background = array![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [2.0, 1.0, 0.0]];
        let config = ExplainerConfig::default().with_seed(7);
        let a = TabularExplainer::new(linear_model, background.clone(), groups(), config.clone())
            .unwrap();
        let b = TabularExplainer::new(linear_model, background, groups(), config).unwrap();

        let x = array![[1.0, 1.0, 1.0]];
        assert_eq!(
            a.explain_matrix(&x).unwrap().local_importance,
            b.explain_matrix(&x).unwrap().local_importance
        );
    }

    #[test]
    fn test_background_capped() {
        let background = Array2::from_shape_fn((50, 3), |(i, j)| (i * 3 + j) as f64);
        let explainer = TabularExplainer::new(
            linear_model,
            background,
            groups(),
            ExplainerConfig::default().with_max_background(10),
        )
        .unwrap();
        assert_eq!(explainer.background().nrows(), 10);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let background = array![[0.0, 0.0]];
        assert!(TabularExplainer::new(
            linear_model,
            background,
            groups(),
            ExplainerConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_empty_evaluation_rejected() {
        let explainer = TabularExplainer::new(
            linear_model,
            array![[0.0, 0.0, 0.0]],
            groups(),
            ExplainerConfig::default(),
        )
        .unwrap();
        assert!(explainer.explain_matrix(&Array2::zeros((0, 3))).is_err());
    }
}
