//! Seasonal ARIMA with exogenous regressors.
//!
//! The model is a regression with SARIMA errors:
//!
//! ```text
//! y_t = β'x_t + μ + u_t
//! φ(B) Φ(B^s) (1 − B)^d (1 − B^s)^D u_t = θ(B) Θ(B^s) ε_t
//! ```
//!
//! Parameters are estimated by maximising the conditional Gaussian
//! likelihood, with the innovations before the longest autoregressive lag set
//! to zero. Neither stationarity nor invertibility is enforced, so
//! near-unit-root fits are accepted as the optimizer finds them.

use crate::core::TimeSeries;
use crate::error::{AnalysisError, Result};
use crate::forecast::diff::{
    difference, differencing_polynomial, lag_polynomial, poly_mul, psi_weights,
    seasonal_difference,
};
use crate::prepare::align_to;
use crate::utils::ols::ols_fit;
use crate::utils::optimization::{
    lbfgs, nelder_mead, LbfgsConfig, NelderMeadConfig, OptimizationResult,
};
use crate::utils::stats::{mean, quantile_normal};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Model order `(p, d, q)(P, D, Q, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarimaxOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    /// Seasonal period `s`; ignored when all seasonal orders are zero.
    pub period: usize,
}

impl Default for SarimaxOrder {
    fn default() -> Self {
        Self::new(1, 1, 1).with_seasonal(1, 0, 0, 24)
    }
}

impl SarimaxOrder {
    /// A non-seasonal `(p, d, q)` order.
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 0,
        }
    }

    pub fn with_seasonal(mut self, p: usize, d: usize, q: usize, period: usize) -> Self {
        self.seasonal_p = p;
        self.seasonal_d = d;
        self.seasonal_q = q;
        self.period = period;
        self
    }

    pub fn is_seasonal(&self) -> bool {
        self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    /// Number of AR and MA coefficients.
    pub fn arma_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// `s · (P + D + Q + 1)` for seasonal orders, zero otherwise.
    pub fn min_seasonal_length(&self) -> usize {
        if self.is_seasonal() {
            self.period * (self.seasonal_p + self.seasonal_d + self.seasonal_q + 1)
        } else {
            0
        }
    }

    fn seasonal_period(&self) -> usize {
        if self.is_seasonal() {
            self.period
        } else {
            0
        }
    }

    /// Highest lag of the expanded autoregressive polynomial, differencing
    /// included. The first this many observations only condition the fit.
    pub fn conditioning_lags(&self) -> usize {
        self.p + self.d + self.seasonal_period() * (self.seasonal_p + self.seasonal_d)
    }

    fn validate(&self) -> Result<()> {
        if self.is_seasonal() && self.period < 2 {
            return Err(AnalysisError::InvalidParameter(format!(
                "seasonal period must be at least 2, got {}",
                self.period
            )));
        }
        Ok(())
    }
}

/// Parameter estimation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    #[default]
    Lbfgs,
    NelderMead,
}

/// Forecast engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaxConfig {
    pub order: SarimaxOrder,
    /// Estimate a mean for the regression errors. Only valid without
    /// differencing.
    pub include_constant: bool,
    /// Coverage of the forecast intervals, in `(0, 1)`.
    pub interval_level: f64,
    /// Optimizer iteration budget; exhausting it fails the fit.
    pub max_iter: usize,
    pub method: FitMethod,
}

impl Default for SarimaxConfig {
    fn default() -> Self {
        Self {
            order: SarimaxOrder::default(),
            include_constant: false,
            interval_level: 0.95,
            max_iter: 200,
            method: FitMethod::Lbfgs,
        }
    }
}

impl SarimaxConfig {
    pub fn new(order: SarimaxOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn with_constant(mut self, include: bool) -> Self {
        self.include_constant = include;
        self
    }

    pub fn with_interval_level(mut self, level: f64) -> Self {
        self.interval_level = level;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_method(mut self, method: FitMethod) -> Self {
        self.method = method;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.order.validate()?;
        if !(self.interval_level > 0.0 && self.interval_level < 1.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "interval level must lie in (0, 1), got {}",
                self.interval_level
            )));
        }
        if self.max_iter == 0 {
            return Err(AnalysisError::InvalidParameter(
                "iteration budget must be positive".to_string(),
            ));
        }
        if self.include_constant && self.order.d + self.order.seasonal_d > 0 {
            return Err(AnalysisError::InvalidParameter(
                "a constant cannot be estimated together with differencing".to_string(),
            ));
        }
        Ok(())
    }
}

/// Estimated coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaxParams {
    /// One coefficient per exogenous regressor.
    pub exog: Vec<f64>,
    pub constant: Option<f64>,
    pub ar: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
}

impl SarimaxParams {
    fn unpack(order: &SarimaxOrder, n_exog: usize, constant: bool, x: &[f64]) -> Self {
        let mut rest = x;
        let mut take = |k: usize| {
            let (head, tail) = rest.split_at(k);
            rest = tail;
            head.to_vec()
        };
        Self {
            exog: take(n_exog),
            constant: if constant { take(1).first().copied() } else { None },
            ar: take(order.p),
            seasonal_ar: take(order.seasonal_p),
            ma: take(order.q),
            seasonal_ma: take(order.seasonal_q),
        }
    }

    fn pack(&self) -> Vec<f64> {
        let mut x = self.exog.clone();
        x.extend(self.constant);
        x.extend(&self.ar);
        x.extend(&self.seasonal_ar);
        x.extend(&self.ma);
        x.extend(&self.seasonal_ma);
        x
    }

    /// `φ(B) Φ(B^s) (1 − B)^d (1 − B^s)^D`.
    fn ar_polynomial(&self, order: &SarimaxOrder) -> Vec<f64> {
        let s = order.seasonal_period();
        let arma = poly_mul(
            &lag_polynomial(&self.ar, 1, -1.0),
            &lag_polynomial(&self.seasonal_ar, s, -1.0),
        );
        poly_mul(&arma, &differencing_polynomial(order.d, order.seasonal_d, s))
    }

    /// `θ(B) Θ(B^s)`.
    fn ma_polynomial(&self, order: &SarimaxOrder) -> Vec<f64> {
        poly_mul(
            &lag_polynomial(&self.ma, 1, 1.0),
            &lag_polynomial(&self.seasonal_ma, order.seasonal_period(), 1.0),
        )
    }

    /// `β'x + μ` for one regressor row.
    fn regression(&self, row: &[f64]) -> f64 {
        self.constant.unwrap_or(0.0) + self.exog.iter().zip(row).map(|(b, x)| b * x).sum::<f64>()
    }
}

/// Conditional likelihood of one training set.
struct ConditionalLikelihood<'a> {
    y: &'a [f64],
    exog: &'a [Vec<f64>],
    order: SarimaxOrder,
    constant: bool,
}

impl ConditionalLikelihood<'_> {
    fn conditioning(&self) -> usize {
        self.order.conditioning_lags()
    }

    fn effective_len(&self) -> usize {
        self.y.len() - self.conditioning()
    }

    /// Regression errors `u_t = y_t − β'x_t − μ`.
    fn regression_errors(&self, params: &SarimaxParams) -> Vec<f64> {
        let mut row = vec![0.0; self.exog.len()];
        (0..self.y.len())
            .map(|t| {
                for (slot, col) in row.iter_mut().zip(self.exog) {
                    *slot = col[t];
                }
                self.y[t] - params.regression(&row)
            })
            .collect()
    }

    /// One-step innovations `ε_t`, zero before the conditioning lags.
    fn innovations(&self, errors: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
        let r = self.conditioning();
        let mut e = vec![0.0; errors.len()];
        for t in r..errors.len() {
            let mut value: f64 = ar.iter().enumerate().map(|(i, c)| c * errors[t - i]).sum();
            for (j, c) in ma.iter().enumerate().skip(1) {
                if t >= j {
                    value -= c * e[t - j];
                }
            }
            e[t] = value;
        }
        e
    }

    fn sum_of_squares(&self, innovations: &[f64]) -> f64 {
        innovations[self.conditioning()..].iter().map(|e| e * e).sum()
    }

    /// Negative log-likelihood per effective observation, with σ²
    /// concentrated out.
    fn objective(&self, x: &[f64]) -> f64 {
        let params = SarimaxParams::unpack(&self.order, self.exog.len(), self.constant, x);
        let errors = self.regression_errors(&params);
        let e = self.innovations(
            &errors,
            &params.ar_polynomial(&self.order),
            &params.ma_polynomial(&self.order),
        );
        let sse = self.sum_of_squares(&e);
        if !sse.is_finite() {
            return f64::INFINITY;
        }
        let sigma2 = (sse / self.effective_len() as f64).max(f64::MIN_POSITIVE);
        0.5 * ((2.0 * PI * sigma2).ln() + 1.0)
    }
}

/// AIC and BIC of a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InformationCriteria {
    pub aic: f64,
    pub bic: f64,
}

/// Point forecasts with symmetric Gaussian intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub point: TimeSeries,
    pub lower: TimeSeries,
    pub upper: TimeSeries,
    pub level: f64,
}

/// A fitted model, ready to forecast.
#[derive(Debug, Clone)]
pub struct SarimaxFit {
    order: SarimaxOrder,
    params: SarimaxParams,
    sigma2: f64,
    log_likelihood: f64,
    criteria: InformationCriteria,
    iterations: usize,
    interval_level: f64,
    n_effective: usize,
    last_timestamp: DateTime<Utc>,
    frequency: Duration,
    /// Regressor row held constant over the forecast horizon.
    exog_last: Vec<f64>,
    errors: Vec<f64>,
    innovations: Vec<f64>,
    fitted: TimeSeries,
    residuals: TimeSeries,
}

impl SarimaxFit {
    pub fn order(&self) -> &SarimaxOrder {
        &self.order
    }

    pub fn params(&self) -> &SarimaxParams {
        &self.params
    }

    /// Innovation variance estimate.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn information_criteria(&self) -> InformationCriteria {
        self.criteria
    }

    pub fn aic(&self) -> f64 {
        self.criteria.aic
    }

    pub fn bic(&self) -> f64 {
        self.criteria.bic
    }

    /// Optimizer iterations used.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Observations that entered the likelihood.
    pub fn effective_observations(&self) -> usize {
        self.n_effective
    }

    /// In-sample one-step predictions; NaN over the conditioning lags.
    pub fn fitted_values(&self) -> &TimeSeries {
        &self.fitted
    }

    /// Observed minus fitted; NaN over the conditioning lags.
    pub fn residuals(&self) -> &TimeSeries {
        &self.residuals
    }

    /// Forecast `horizon` steps ahead with intervals at `level`.
    ///
    /// Future innovations are zero and the last regressor row is carried
    /// forward. Interval half-widths use the ψ-weights of the expanded model,
    /// so they widen with the horizon whenever the model is integrated.
    pub fn predict(&self, horizon: usize, level: f64) -> Result<Prediction> {
        if horizon == 0 {
            return Err(AnalysisError::InvalidParameter(
                "forecast horizon must be positive".to_string(),
            ));
        }
        if !(level > 0.0 && level < 1.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "interval level must lie in (0, 1), got {level}"
            )));
        }

        let ar = self.params.ar_polynomial(&self.order);
        let ma = self.params.ma_polynomial(&self.order);
        let n = self.errors.len();

        let mut u = self.errors.clone();
        let mut e = self.innovations.clone();
        for t in n..n + horizon {
            let mut next = 0.0;
            for (i, c) in ar.iter().enumerate().skip(1) {
                if t >= i {
                    next -= c * u[t - i];
                }
            }
            for (j, c) in ma.iter().enumerate().skip(1) {
                if t >= j {
                    next += c * e[t - j];
                }
            }
            u.push(next);
            e.push(0.0);
        }

        let regression = self.params.regression(&self.exog_last);
        let z = quantile_normal((1.0 + level) / 2.0);
        let psi = psi_weights(&ar, &ma, horizon);

        let mut point = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        let mut cumulative = 0.0;
        for h in 0..horizon {
            cumulative += psi[h] * psi[h];
            let half_width = z * (self.sigma2 * cumulative).sqrt();
            let value = u[n + h] + regression;
            point.push(value);
            lower.push(value - half_width);
            upper.push(value + half_width);
        }

        let start = self.last_timestamp + self.frequency;
        let series = |values: Vec<f64>, label: &str| -> Result<TimeSeries> {
            Ok(TimeSeries::regular(start, self.frequency, values)?.with_label(label))
        };
        Ok(Prediction {
            point: series(point, "forecast")?,
            lower: series(lower, "lower")?,
            upper: series(upper, "upper")?,
            level,
        })
    }

    /// Forecast at the configured interval level, keeping this model as the
    /// result's handle.
    pub fn forecast(self, horizon: usize) -> Result<ForecastResult> {
        let prediction = self.predict(horizon, self.interval_level)?;
        Ok(ForecastResult {
            point: prediction.point,
            lower: prediction.lower,
            upper: prediction.upper,
            level: prediction.level,
            information_criteria: self.criteria,
            model: self,
        })
    }
}

/// Output of one fit-and-forecast call.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    pub point: TimeSeries,
    pub lower: TimeSeries,
    pub upper: TimeSeries,
    pub level: f64,
    pub information_criteria: InformationCriteria,
    #[serde(skip)]
    pub model: SarimaxFit,
}

impl ForecastResult {
    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    pub fn aic(&self) -> f64 {
        self.information_criteria.aic
    }

    pub fn bic(&self) -> f64 {
        self.information_criteria.bic
    }
}

/// SARIMAX estimator.
#[derive(Debug, Clone, Default)]
pub struct Sarimax {
    config: SarimaxConfig,
}

impl Sarimax {
    pub fn new(config: SarimaxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SarimaxConfig {
        &self.config
    }

    /// Fit on `series`, with optional exogenous regressors.
    ///
    /// Regressors are reindexed onto the series timestamps with forward then
    /// backward fill. Fails with [`AnalysisError::InsufficientData`] on an
    /// empty series and with [`AnalysisError::ModelFit`] when the series is
    /// too short for the order or the optimizer exhausts its budget.
    pub fn fit(&self, series: &TimeSeries, exog: &[TimeSeries]) -> Result<SarimaxFit> {
        let config = &self.config;
        config.validate()?;
        let order = config.order;

        let n = series.len();
        if n == 0 {
            return Err(AnalysisError::InsufficientData {
                needed: order.min_seasonal_length().max(1),
                got: 0,
            });
        }
        if series.has_missing_values() {
            return Err(AnalysisError::MissingValues);
        }
        let min_len = order.min_seasonal_length();
        if n < min_len {
            return Err(AnalysisError::ModelFit(format!(
                "training length {n} is below the {min_len} observations the seasonal order requires"
            )));
        }
        let n_params = exog.len() + usize::from(config.include_constant) + order.arma_params();
        let r = order.conditioning_lags();
        if n <= r + n_params {
            return Err(AnalysisError::ModelFit(format!(
                "training length {n} is too short for {n_params} parameters after {r} conditioning lags"
            )));
        }

        let columns = exog
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let aligned = align_to(x, series.timestamps())?;
                if aligned.has_missing_values() {
                    return Err(AnalysisError::DataFormat(format!(
                        "exogenous regressor {i} has no observations"
                    )));
                }
                Ok(aligned.values().to_vec())
            })
            .collect::<Result<Vec<_>>>()?;
        let frequency = series.frequency_or_infer()?;

        let likelihood = ConditionalLikelihood {
            y: series.values(),
            exog: &columns,
            order,
            constant: config.include_constant,
        };
        let initial = self.initial_params(series.values(), &columns)?;

        let result = if initial.is_empty() {
            OptimizationResult {
                optimal_value: likelihood.objective(&[]),
                optimal_point: Vec::new(),
                iterations: 0,
                converged: true,
            }
        } else {
            let objective = |x: &[f64]| likelihood.objective(x);
            match config.method {
                FitMethod::Lbfgs => lbfgs(
                    objective,
                    &initial,
                    &LbfgsConfig::default().with_max_iter(config.max_iter),
                ),
                FitMethod::NelderMead => nelder_mead(
                    objective,
                    &initial,
                    &NelderMeadConfig::default().with_max_iter(config.max_iter),
                ),
            }
        };
        if !result.optimal_value.is_finite() {
            return Err(AnalysisError::ModelFit(
                "likelihood is not finite at the starting point".to_string(),
            ));
        }
        if !result.converged {
            return Err(AnalysisError::ModelFit(format!(
                "optimizer did not converge within {} iterations",
                config.max_iter
            )));
        }

        let params = SarimaxParams::unpack(
            &order,
            columns.len(),
            config.include_constant,
            &result.optimal_point,
        );
        let errors = likelihood.regression_errors(&params);
        let innovations = likelihood.innovations(
            &errors,
            &params.ar_polynomial(&order),
            &params.ma_polynomial(&order),
        );
        let n_eff = likelihood.effective_len();
        let sigma2 = likelihood.sum_of_squares(&innovations) / n_eff as f64;
        let log_likelihood = -(n_eff as f64) * result.optimal_value;

        // σ² counts as an estimated parameter.
        let k = (n_params + 1) as f64;
        let criteria = InformationCriteria {
            aic: -2.0 * log_likelihood + 2.0 * k,
            bic: -2.0 * log_likelihood + k * (n_eff as f64).ln(),
        };

        let residual_values: Vec<f64> = innovations
            .iter()
            .enumerate()
            .map(|(t, e)| if t < r { f64::NAN } else { *e })
            .collect();
        let fitted_values: Vec<f64> = series
            .values()
            .iter()
            .zip(&residual_values)
            .map(|(y, e)| y - e)
            .collect();

        debug!(
            n,
            n_eff,
            iterations = result.iterations,
            sigma2,
            aic = criteria.aic,
            "sarimax fitted"
        );

        let exog_last = columns.iter().map(|c| c[n - 1]).collect();
        Ok(SarimaxFit {
            order,
            params,
            sigma2,
            log_likelihood,
            criteria,
            iterations: result.iterations,
            interval_level: config.interval_level,
            n_effective: n_eff,
            last_timestamp: series.timestamps()[n - 1],
            frequency,
            exog_last,
            errors,
            innovations,
            fitted: series.with_values(fitted_values)?.with_label("fitted"),
            residuals: series.with_values(residual_values)?.with_label("residual"),
        })
    }

    /// Fit and forecast `horizon` steps in one call.
    pub fn forecast(
        &self,
        series: &TimeSeries,
        exog: &[TimeSeries],
        horizon: usize,
    ) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(AnalysisError::InvalidParameter(
                "forecast horizon must be positive".to_string(),
            ));
        }
        self.fit(series, exog)?.forecast(horizon)
    }

    /// Regressor coefficients from OLS on the differenced data; small
    /// positive AR and MA coefficients.
    fn initial_params(&self, y: &[f64], columns: &[Vec<f64>]) -> Result<Vec<f64>> {
        let order = &self.config.order;
        let s = order.seasonal_period();
        let differenced = |v: &[f64]| seasonal_difference(&difference(v, order.d), order.seasonal_d, s);

        let exog = if columns.is_empty() {
            Vec::new()
        } else {
            let dy = differenced(y);
            let dx: Vec<Vec<f64>> = columns.iter().map(|c| differenced(c.as_slice())).collect();
            let refs: Vec<&[f64]> = dx.iter().map(Vec::as_slice).collect();
            ols_fit(&dy, &refs)?.coefficients
        };

        let constant = self.config.include_constant.then(|| {
            let residual: Vec<f64> = (0..y.len())
                .map(|t| y[t] - exog.iter().zip(columns).map(|(b, c)| b * c[t]).sum::<f64>())
                .collect();
            mean(&residual)
        });

        let start = |k: usize| (0..k).map(|i| 0.1 / (i + 1) as f64).collect::<Vec<_>>();
        Ok(SarimaxParams {
            exog,
            constant,
            ar: start(order.p),
            seasonal_ar: start(order.seasonal_p),
            ma: start(order.q),
            seasonal_ma: start(order.seasonal_q),
        }
        .pack())
    }
}

/// Fit `config.order` on `series` and forecast `horizon` steps.
pub fn forecast(
    series: &TimeSeries,
    exog: &[TimeSeries],
    config: &SarimaxConfig,
    horizon: usize,
) -> Result<ForecastResult> {
    Sarimax::new(config.clone()).forecast(series, exog, horizon)
}
