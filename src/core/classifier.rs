use crate::core::{ClassWeight, Dataset, FittedModel, ModelSettings};
use crate::utils::error::{FlowError, Result};
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_logistic::LogisticRegression as LinfaLogisticRegression;
use ndarray::{s, Array1, Array2, ArrayView1};

// L-BFGS 保留的歷史步數
const LBFGS_MEMORY: usize = 10;

fn model_error(e: impl std::fmt::Display) -> FlowError {
    FlowError::ModelError {
        message: e.to_string(),
    }
}

/// 從資料集取出特徵欄位組成矩陣，每個值都必須是數值
pub fn feature_matrix(dataset: &Dataset, feature_cols: &[String]) -> Result<Array2<f64>> {
    for column in feature_cols {
        dataset.require_column(column)?;
    }

    let mut data = Vec::with_capacity(dataset.len() * feature_cols.len());
    for (row, record) in dataset.records.iter().enumerate() {
        for column in feature_cols {
            let value = record
                .get_f64(column)
                .ok_or_else(|| FlowError::InvalidValueError {
                    column: column.clone(),
                    row,
                    value: record
                        .get(column)
                        .map(crate::core::ingest::cell_to_string)
                        .unwrap_or_default(),
                })?;
            data.push(value);
        }
    }

    Array2::from_shape_vec((dataset.len(), feature_cols.len()), data).map_err(model_error)
}

/// 取出 0/1 結果欄位
pub fn labels_from_dataset(dataset: &Dataset, outcome_col: &str) -> Result<Vec<u8>> {
    dataset.require_column(outcome_col)?;
    dataset
        .records
        .iter()
        .enumerate()
        .map(|(row, record)| match record.get_f64(outcome_col) {
            Some(v) if v == 0.0 => Ok(0),
            Some(v) if v == 1.0 => Ok(1),
            _ => Err(FlowError::InvalidValueError {
                column: outcome_col.to_string(),
                row,
                value: record
                    .get(outcome_col)
                    .map(crate::core::ingest::cell_to_string)
                    .unwrap_or_default(),
            }),
        })
        .collect()
}

/// 加權、L2 正則化的 log-loss，參數為 `[w_0 .. w_{p-1}, intercept]`
///
/// `Σ sᵢ · logloss(i) + 0.5 · alpha · ||w||²`，截距不做懲罰
#[derive(Debug, Clone, Copy)]
struct WeightedLogLoss<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    weights: &'a Array1<f64>,
    alpha: f64,
}

impl WeightedLogLoss<'_> {
    fn split<'p>(&self, theta: &'p Array1<f64>) -> (ArrayView1<'p, f64>, f64) {
        let p = self.x.ncols();
        (theta.slice(s![..p]), theta[p])
    }

    fn linear(&self, theta: &Array1<f64>) -> Array1<f64> {
        let (w, intercept) = self.split(theta);
        self.x.dot(&w) + intercept
    }

    fn loss(&self, theta: &Array1<f64>) -> f64 {
        let (w, _) = self.split(theta);
        let data_loss: f64 = self
            .linear(theta)
            .iter()
            .zip(self.y.iter())
            .zip(self.weights.iter())
            .map(|((&z, &y), &s)| s * (softplus(z) - y * z))
            .sum();
        data_loss + 0.5 * self.alpha * w.dot(&w)
    }

    fn grad(&self, theta: &Array1<f64>) -> Array1<f64> {
        let p = self.x.ncols();
        let (w, _) = self.split(theta);
        let residual: Array1<f64> = self
            .linear(theta)
            .iter()
            .zip(self.y.iter())
            .zip(self.weights.iter())
            .map(|((&z, &y), &s)| s * (sigmoid(z) - y))
            .collect();

        let mut gradient = Array1::zeros(p + 1);
        gradient
            .slice_mut(s![..p])
            .assign(&(self.x.t().dot(&residual) + &w * self.alpha));
        gradient[p] = residual.sum();
        gradient
    }

    fn gradient_norm(&self, theta: &Array1<f64>) -> f64 {
        let g = self.grad(theta);
        g.dot(&g).sqrt()
    }
}

impl CostFunction for WeightedLogLoss<'_> {
    type Param = Array1<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        Ok(self.loss(param))
    }
}

impl Gradient for WeightedLogLoss<'_> {
    type Param = Array1<f64>;
    type Gradient = Array1<f64>;

    fn gradient(&self, param: &Self::Param) -> std::result::Result<Self::Gradient, ArgminError> {
        Ok(self.grad(param))
    }
}

/// 二元邏輯迴歸，支援 L2 正則化與平衡類別權重
///
/// 不加權時直接交給 `linfa-logistic`；平衡權重時以 argmin 的 L-BFGS 最小化加權 log-loss
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    c: f64,
    max_iter: usize,
    tolerance: f64,
    class_weight: ClassWeight,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    n_iter: Option<u64>,
    converged: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        let defaults = ModelSettings::default();
        Self {
            c: defaults.c,
            max_iter: defaults.max_iter,
            tolerance: defaults.tolerance,
            class_weight: ClassWeight::None,
            coefficients: None,
            intercept: 0.0,
            n_iter: None,
            converged: false,
        }
    }

    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self::new()
            .with_c(settings.c)
            .with_max_iter(settings.max_iter)
            .with_tolerance(settings.tolerance)
            .with_class_weight(settings.class_weight)
    }

    /// 正則化強度的倒數
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// 求解器迭代次數；linfa 不回報時為 `None`
    pub fn n_iter(&self) -> Option<u64> {
        self.n_iter
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    fn sample_weights(&self, y: &[u8]) -> Result<Array1<f64>> {
        let positives = y.iter().filter(|&&v| v == 1).count();
        let negatives = y.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(FlowError::ModelError {
                message: format!(
                    "training data needs both classes (got {} positive, {} negative)",
                    positives, negatives
                ),
            });
        }

        let weights = match self.class_weight {
            ClassWeight::None => Array1::ones(y.len()),
            ClassWeight::Balanced => {
                // n / (2 * 類別筆數)
                let n = y.len() as f64;
                let w_pos = n / (2.0 * positives as f64);
                let w_neg = n / (2.0 * negatives as f64);
                y.iter()
                    .map(|&v| if v == 1 { w_pos } else { w_neg })
                    .collect()
            }
        };
        Ok(weights)
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()> {
        if x.nrows() == 0 {
            return Err(FlowError::ModelError {
                message: "no training rows".to_string(),
            });
        }
        if x.nrows() != y.len() {
            return Err(FlowError::ModelError {
                message: format!("{} feature rows but {} labels", x.nrows(), y.len()),
            });
        }
        if !(self.c > 0.0) {
            return Err(FlowError::ModelError {
                message: format!("C must be positive, got {}", self.c),
            });
        }

        let weights = self.sample_weights(y)?;
        let targets: Array1<f64> = y.iter().map(|&v| f64::from(v)).collect();
        let problem = WeightedLogLoss {
            x,
            y: &targets,
            weights: &weights,
            alpha: 1.0 / self.c,
        };

        let (theta, iterations) = match self.class_weight {
            ClassWeight::None => (self.fit_unweighted(x, y)?, None),
            ClassWeight::Balanced => {
                let (theta, iterations) = self.minimize(problem)?;
                (theta, Some(iterations))
            }
        };

        let gradient_norm = problem.gradient_norm(&theta);
        let converged = gradient_norm <= self.tolerance;
        if converged {
            tracing::debug!(
                "Logistic regression fitted (objective {:.6}, |grad| {:.2e})",
                problem.loss(&theta),
                gradient_norm
            );
        } else {
            tracing::warn!(
                "Logistic regression stopped before reaching tolerance {} (|grad| {:.2e}, max_iter {})",
                self.tolerance,
                gradient_norm,
                self.max_iter
            );
        }

        let p = x.ncols();
        self.intercept = theta[p];
        self.coefficients = Some(theta.slice(s![..p]).to_owned());
        self.n_iter = iterations;
        self.converged = converged;
        Ok(())
    }

    fn fit_unweighted(&self, x: &Array2<f64>, y: &[u8]) -> Result<Array1<f64>> {
        let targets: Array1<usize> = y.iter().map(|&v| usize::from(v)).collect();
        let dataset = DatasetBase::new(x.clone(), targets);

        let fitted = LinfaLogisticRegression::default()
            .alpha(1.0 / self.c)
            .max_iterations(self.max_iter as u64)
            .gradient_tolerance(self.tolerance)
            .with_intercept(true)
            .fit(&dataset)
            .map_err(model_error)?;

        // linfa 的機率是對 labels().pos 而言，正類不是 1 時反轉符號
        let sign = if fitted.labels().pos.class == 1 { 1.0 } else { -1.0 };

        let p = x.ncols();
        let mut theta = Array1::zeros(p + 1);
        theta.slice_mut(s![..p]).assign(&(fitted.params() * sign));
        theta[p] = fitted.intercept() * sign;
        Ok(theta)
    }

    fn minimize(&self, problem: WeightedLogLoss<'_>) -> Result<(Array1<f64>, u64)> {
        let init = Array1::zeros(problem.x.ncols() + 1);
        // 起點已是最佳解時 line search 沒有下降方向
        if problem.gradient_norm(&init) <= self.tolerance {
            return Ok((init, 0));
        }

        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, LBFGS_MEMORY)
            .with_tolerance_grad(self.tolerance)
            .map_err(model_error)?;

        let result = Executor::new(problem, solver)
            .configure(|state| state.param(init).max_iters(self.max_iter as u64))
            .run()
            .map_err(model_error)?;

        let state = result.state();
        let theta = state
            .get_best_param()
            .cloned()
            .ok_or_else(|| model_error("solver returned no parameters"))?;
        Ok((theta, state.get_iter()))
    }

    fn fitted_coefficients(&self, x: &Array2<f64>) -> Result<&Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| model_error("model has not been fitted"))?;
        if coefficients.len() != x.ncols() {
            return Err(FlowError::ModelError {
                message: format!(
                    "model expects {} features, got {}",
                    coefficients.len(),
                    x.ncols()
                ),
            });
        }
        Ok(coefficients)
    }

    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let coefficients = self.fitted_coefficients(x)?;
        Ok((x.dot(coefficients) + self.intercept).to_vec())
    }

    /// 每一列屬於正類的機率
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        Ok(self.decision_function(x)?.into_iter().map(sigmoid).collect())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<u8>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|z| u8::from(z > 0.0))
            .collect())
    }

    pub fn score(&self, x: &Array2<f64>, y: &[u8]) -> Result<f64> {
        let predictions = self.predict(x)?;
        crate::core::metrics::accuracy_score(y, &predictions)
    }

    pub fn to_fitted_model(&self, feature_names: &[String]) -> Result<FittedModel> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| model_error("model has not been fitted"))?;
        Ok(FittedModel {
            feature_names: feature_names.to_vec(),
            coefficients: coefficients.to_vec(),
            intercept: self.intercept,
            iterations: self.n_iter,
            converged: self.converged,
        })
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// ln(1 + e^z)，避免溢位
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}
