//! Ordinary Least Squares
//! Design matrix assembly, minimum-norm fit through the SVD pseudo-inverse,
//! and the inference statistics reported alongside the coefficients.

use nalgebra::{DMatrix, DVector, SymmetricEigen, SVD};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub const CONSTANT_COLUMN: &str = "const";

/// Condition number above which the summary notes multicollinearity.
pub const CONDITION_WARNING_THRESHOLD: f64 = 1000.0;

/// Singular values below `RANK_RTOL * sigma_max` count as zero.
pub const RANK_RTOL: f64 = 1e-10;

#[derive(Error, Debug, PartialEq)]
pub enum RegressionError {
    #[error("Design matrix has no rows or no columns")]
    EmptyDesign,
    #[error("Design has {rows} rows but the response has {response}")]
    LengthMismatch { rows: usize, response: usize },
    #[error("Design column '{0}' contains non-finite values")]
    NonFinite(String),
    #[error("Response contains non-finite values")]
    NonFiniteResponse,
    #[error("Pseudo-inverse failed: {0}")]
    Decomposition(String),
}

/// Conditions that do not stop the fit but are reported with it.
#[derive(Debug, Clone, PartialEq)]
pub enum FitWarning {
    /// Rank below column count; the minimum-norm solution was used.
    SingularDesignMatrix { rank: usize, columns: usize },
    Multicollinearity { condition_number: f64 },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::SingularDesignMatrix { rank, columns } => write!(
                f,
                "The design matrix has rank {} with {} columns. Coefficients are the \
                 minimum-norm solution and are not individually identified.",
                rank, columns
            ),
            FitWarning::Multicollinearity { condition_number } => write!(
                f,
                "The condition number is large, {:.3e}. This might indicate strong \
                 multicollinearity or other numerical problems.",
                condition_number
            ),
        }
    }
}

/// Predictor matrix with named columns.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub columns: Vec<String>,
    pub values: DMatrix<f64>,
    /// Column acting as the intercept, if any.
    pub intercept: Option<usize>,
}

impl DesignMatrix {
    /// One indicator per distinct category (sorted, none dropped), then the
    /// numeric predictors, with a constant prepended unless some column is
    /// already a non-zero constant.
    pub fn build(
        categories: &[String],
        numeric: &[(String, Vec<f64>)],
    ) -> Result<Self, RegressionError> {
        let n = categories.len();
        for (name, values) in numeric {
            if values.len() != n {
                return Err(RegressionError::LengthMismatch {
                    rows: n,
                    response: values.len(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(RegressionError::NonFinite(name.clone()));
            }
        }

        let levels: BTreeSet<&str> = categories.iter().map(String::as_str).collect();
        let mut columns: Vec<String> = Vec::new();
        let mut data: Vec<Vec<f64>> = Vec::new();

        for level in &levels {
            columns.push(level.to_string());
            data.push(
                categories
                    .iter()
                    .map(|c| if c == level { 1.0 } else { 0.0 })
                    .collect(),
            );
        }
        for (name, values) in numeric {
            columns.push(name.clone());
            data.push(values.clone());
        }

        let existing_constant = data.iter().position(|col| {
            col.first()
                .is_some_and(|&first| first != 0.0 && col.iter().all(|&v| v == first))
        });
        let intercept = match existing_constant {
            Some(idx) => Some(idx),
            None => {
                columns.insert(0, CONSTANT_COLUMN.to_string());
                data.insert(0, vec![1.0; n]);
                Some(0)
            }
        };

        if n == 0 || data.is_empty() {
            return Err(RegressionError::EmptyDesign);
        }
        let values = DMatrix::from_fn(n, data.len(), |i, j| data[j][i]);

        Ok(Self {
            columns,
            values,
            intercept,
        })
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

/// Result of an ordinary least squares fit.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub response: String,
    pub columns: Vec<String>,
    pub intercept: Option<usize>,
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    pub p_values: Vec<f64>,
    pub conf_int: Vec<(f64, f64)>,
    pub actual: Vec<f64>,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub nobs: usize,
    pub rank: usize,
    pub df_model: f64,
    pub df_resid: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub durbin_watson: f64,
    pub jarque_bera: f64,
    pub jb_p_value: f64,
    pub skew: f64,
    pub kurtosis: f64,
    pub condition_number: f64,
    pub warnings: Vec<FitWarning>,
}

impl OlsFit {
    pub fn coefficient(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.coefficients[i])
    }

    pub fn intercept_value(&self) -> Option<f64> {
        self.intercept.map(|i| self.coefficients[i])
    }

    pub fn is_rank_deficient(&self) -> bool {
        self.rank < self.columns.len()
    }

    pub fn ssr(&self) -> f64 {
        self.residuals.iter().map(|r| r * r).sum()
    }
}

pub struct OlsFitter;

impl OlsFitter {
    /// Fit `y ~ design` by least squares. Rank-deficient designs get the
    /// minimum-norm coefficients and a [`FitWarning::SingularDesignMatrix`].
    pub fn fit(design: &DesignMatrix, y: &[f64], response: &str) -> Result<OlsFit, RegressionError> {
        let (n, p) = design.values.shape();
        if n == 0 || p == 0 {
            return Err(RegressionError::EmptyDesign);
        }
        if y.len() != n {
            return Err(RegressionError::LengthMismatch {
                rows: n,
                response: y.len(),
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(RegressionError::NonFiniteResponse);
        }

        let x = &design.values;
        let yv = DVector::from_column_slice(y);

        let svd = SVD::new(x.clone(), true, true);
        let s_max = svd.singular_values.max();
        let tol = s_max * RANK_RTOL;
        let rank = svd.rank(tol);
        let condition_number = condition_number(x);
        let pinv = svd
            .pseudo_inverse(tol)
            .map_err(|e| RegressionError::Decomposition(e.to_string()))?;

        let beta = &pinv * &yv;
        let fitted_v = x * &beta;
        let resid_v = &yv - &fitted_v;

        let nf = n as f64;
        let k_constant = if design.intercept.is_some() { 1.0 } else { 0.0 };
        let ssr = resid_v.dot(&resid_v);
        let y_mean = yv.mean();
        let tss = if design.intercept.is_some() {
            yv.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>()
        } else {
            yv.dot(&yv)
        };
        let ess = tss - ssr;

        let df_model = rank as f64 - k_constant;
        let df_resid = nf - rank as f64;
        let scale = if df_resid > 0.0 { ssr / df_resid } else { f64::NAN };

        let r_squared = 1.0 - ssr / tss;
        let adj_r_squared = 1.0 - (nf - k_constant) / df_resid * (1.0 - r_squared);

        let normalized_cov = &pinv * pinv.transpose();
        let std_errors: Vec<f64> = (0..p)
            .map(|i| (normalized_cov[(i, i)] * scale).sqrt())
            .collect();
        let coefficients: Vec<f64> = beta.iter().copied().collect();
        let t_values: Vec<f64> = coefficients
            .iter()
            .zip(&std_errors)
            .map(|(b, se)| b / se)
            .collect();

        let t_dist = StudentsT::new(0.0, 1.0, df_resid).ok();
        let p_values = t_values
            .iter()
            .map(|t| match &t_dist {
                Some(dist) if t.is_finite() => 2.0 * (1.0 - dist.cdf(t.abs())),
                _ => f64::NAN,
            })
            .collect();
        let t_crit = t_dist
            .as_ref()
            .map(|d| d.inverse_cdf(0.975))
            .unwrap_or(f64::NAN);
        let conf_int = coefficients
            .iter()
            .zip(&std_errors)
            .map(|(b, se)| (b - t_crit * se, b + t_crit * se))
            .collect();

        let f_statistic = if df_model > 0.0 && df_resid > 0.0 {
            (ess / df_model) / (ssr / df_resid)
        } else {
            f64::NAN
        };
        let f_p_value = match FisherSnedecor::new(df_model, df_resid) {
            Ok(dist) if f_statistic.is_finite() => 1.0 - dist.cdf(f_statistic),
            _ => f64::NAN,
        };

        let log_likelihood = -nf / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (ssr / nf).ln() + 1.0);
        let n_params = df_model + k_constant;
        let aic = -2.0 * log_likelihood + 2.0 * n_params;
        let bic = -2.0 * log_likelihood + nf.ln() * n_params;

        let residuals: Vec<f64> = resid_v.iter().copied().collect();
        let durbin_watson = durbin_watson(&residuals);
        let (skew, kurtosis) = skew_kurtosis(&residuals);
        let jarque_bera = nf / 6.0 * (skew.powi(2) + (kurtosis - 3.0).powi(2) / 4.0);
        let jb_p_value = match ChiSquared::new(2.0) {
            Ok(dist) if jarque_bera.is_finite() => 1.0 - dist.cdf(jarque_bera),
            _ => f64::NAN,
        };

        let mut warnings = Vec::new();
        if rank < p {
            warnings.push(FitWarning::SingularDesignMatrix { rank, columns: p });
        } else if condition_number > CONDITION_WARNING_THRESHOLD {
            warnings.push(FitWarning::Multicollinearity { condition_number });
        }

        Ok(OlsFit {
            response: response.to_string(),
            columns: design.columns.clone(),
            intercept: design.intercept,
            coefficients,
            std_errors,
            t_values,
            p_values,
            conf_int,
            actual: y.to_vec(),
            fitted: fitted_v.iter().copied().collect(),
            residuals,
            nobs: n,
            rank,
            df_model,
            df_resid,
            r_squared,
            adj_r_squared,
            f_statistic,
            f_p_value,
            log_likelihood,
            aic,
            bic,
            durbin_watson,
            jarque_bera,
            jb_p_value,
            skew,
            kurtosis,
            condition_number,
            warnings,
        })
    }
}

/// sqrt(max / min) over the eigenvalues of XᵀX. The smallest magnitude is
/// floored at `max * ε²`, so exact collinearity stays finite (about 1/ε).
fn condition_number(x: &DMatrix<f64>) -> f64 {
    let eigenvalues = SymmetricEigen::new(x.transpose() * x).eigenvalues;
    let max = eigenvalues.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if max == 0.0 {
        return f64::NAN;
    }
    let floor = max * f64::EPSILON * f64::EPSILON;
    let min = eigenvalues
        .iter()
        .fold(f64::INFINITY, |acc, v| acc.min(v.abs()))
        .max(floor);
    (max / min).sqrt()
}

fn durbin_watson(residuals: &[f64]) -> f64 {
    let denom: f64 = residuals.iter().map(|r| r * r).sum();
    let num: f64 = residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    num / denom
}

/// Sample skewness and (non-excess) kurtosis from central moments.
fn skew_kurtosis(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let moment = |k: i32| values.iter().map(|v| (v - mean).powi(k)).sum::<f64>() / n;
    let m2 = moment(2);
    (moment(3) / m2.powf(1.5), moment(4) / (m2 * m2))
}

const RULE_WIDTH: usize = 78;

fn format_stat(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && (magnitude >= 1e5 || magnitude < 1e-3) {
        format!("{:.3e}", value)
    } else {
        format!("{:.3}", value)
    }
}

impl fmt::Display for OlsFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);
        let pair = |f: &mut fmt::Formatter<'_>, l: &str, lv: String, r: &str, rv: String| {
            writeln!(f, "{:<20}{:>18}   {:<22}{:>15}", l, lv, r, rv)
        };

        writeln!(f, "{:^width$}", "OLS Regression Results", width = RULE_WIDTH)?;
        writeln!(f, "{}", heavy)?;
        pair(f, "Dep. Variable:", self.response.clone(), "R-squared:", format!("{:.3}", self.r_squared))?;
        pair(f, "Model:", "OLS".into(), "Adj. R-squared:", format!("{:.3}", self.adj_r_squared))?;
        pair(f, "Method:", "Least Squares".into(), "F-statistic:", format_stat(self.f_statistic))?;
        pair(f, "No. Observations:", self.nobs.to_string(), "Prob (F-statistic):", format_stat(self.f_p_value))?;
        pair(f, "Df Residuals:", format!("{:.0}", self.df_resid), "Log-Likelihood:", format_stat(self.log_likelihood))?;
        pair(f, "Df Model:", format!("{:.0}", self.df_model), "AIC:", format_stat(self.aic))?;
        pair(f, "Covariance Type:", "nonrobust".into(), "BIC:", format_stat(self.bic))?;
        writeln!(f, "{}", heavy)?;

        writeln!(
            f,
            "{:<18}{:>10}{:>11}{:>11}{:>9}{:>10}{:>10}",
            "", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"
        )?;
        writeln!(f, "{}", light)?;
        for (i, name) in self.columns.iter().enumerate() {
            let (lo, hi) = self.conf_int[i];
            writeln!(
                f,
                "{:<18}{:>10.4}{:>11.3}{:>11.3}{:>9.3}{:>10.3}{:>10.3}",
                name,
                self.coefficients[i],
                self.std_errors[i],
                self.t_values[i],
                self.p_values[i],
                lo,
                hi
            )?;
        }
        writeln!(f, "{}", heavy)?;

        pair(f, "Durbin-Watson:", format!("{:.3}", self.durbin_watson), "Jarque-Bera (JB):", format_stat(self.jarque_bera))?;
        pair(f, "Skew:", format!("{:.3}", self.skew), "Prob(JB):", format_stat(self.jb_p_value))?;
        pair(f, "Kurtosis:", format!("{:.3}", self.kurtosis), "Cond. No.", format_stat(self.condition_number))?;
        writeln!(f, "{}", heavy)?;

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Notes:")?;
            for (i, warning) in self.warnings.iter().enumerate() {
                writeln!(f, "[{}] {}", i + 1, warning)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_category_recovers_linear_truth() {
        let alcohol = vec![9.0, 9.5, 10.0, 11.2, 12.0, 12.8, 13.5];
        let sulphates = vec![0.5, 0.7, 0.6, 0.9, 0.4, 0.8, 0.55];
        let ph = vec![3.2, 3.0, 3.5, 3.1, 3.4, 3.3, 2.9];
        let y: Vec<f64> = alcohol.iter().map(|a| 2.0 * a + 1.0).collect();

        let design = DesignMatrix::build(
            &labels(&["A"; 7]),
            &[
                ("alcohol".into(), alcohol),
                ("sulphates".into(), sulphates),
                ("pH".into(), ph),
            ],
        )
        .unwrap();

        // The single indicator column is already constant and serves as intercept.
        assert_eq!(design.columns, vec!["A", "alcohol", "sulphates", "pH"]);
        assert_eq!(design.intercept, Some(0));

        let fit = OlsFitter::fit(&design, &y, "quality_num").unwrap();
        assert_eq!(fit.rank, 4);
        assert!((fit.intercept_value().unwrap() - 1.0).abs() < 1e-8);
        assert!((fit.coefficient("alcohol").unwrap() - 2.0).abs() < 1e-8);
        assert!(fit.coefficient("sulphates").unwrap().abs() < 1e-8);
        assert!(fit.coefficient("pH").unwrap().abs() < 1e-8);
        assert!(fit.residuals.iter().all(|r| r.abs() < 1e-8));
        assert!(!fit.is_rank_deficient());
    }

    #[test]
    fn test_two_categories_rank_deficient_min_norm() {
        let cats = labels(&["red", "white", "red", "white", "red", "white"]);
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.5];
        let y: Vec<f64> = cats
            .iter()
            .zip(&x)
            .map(|(c, v)| 1.0 + if c == "white" { 3.0 } else { 0.0 } + 2.0 * v)
            .collect();

        let design = DesignMatrix::build(&cats, &[("x".into(), x)]).unwrap();
        assert_eq!(design.columns, vec!["const", "red", "white", "x"]);

        let fit = OlsFitter::fit(&design, &y, "y").unwrap();
        assert_eq!(fit.rank, 3);
        assert!(fit.is_rank_deficient());
        assert!(matches!(
            fit.warnings[0],
            FitWarning::SingularDesignMatrix { rank: 3, columns: 4 }
        ));
        assert!(fit.residuals.iter().all(|r| r.abs() < 1e-8));

        // Minimum norm: orthogonal to the null direction const - red - white.
        let c = fit.coefficient("const").unwrap();
        let red = fit.coefficient("red").unwrap();
        let white = fit.coefficient("white").unwrap();
        assert!((c - (red + white)).abs() < 1e-8);
        assert!((c + red - 1.0).abs() < 1e-8);
        assert!((white - red - 3.0).abs() < 1e-8);
        assert!((fit.coefficient("x").unwrap() - 2.0).abs() < 1e-8);

        // Exact collinearity still reports a finite, very large condition number.
        assert!(fit.condition_number.is_finite());
        assert!(fit.condition_number > CONDITION_WARNING_THRESHOLD);
    }

    #[test]
    fn test_simple_regression_inference() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.1, 3.9, 6.2, 7.8, 10.1];
        let plain = DesignMatrix {
            columns: vec!["const".into(), "x".into()],
            values: DMatrix::from_fn(5, 2, |i, j| if j == 0 { 1.0 } else { x[i] }),
            intercept: Some(0),
        };

        let fit = OlsFitter::fit(&plain, &y, "y").unwrap();

        let x_mean = 3.0;
        let y_mean = y.iter().sum::<f64>() / 5.0;
        let sxx: f64 = x.iter().map(|v| (v - x_mean).powi(2)).sum();
        let sxy: f64 = x.iter().zip(&y).map(|(a, b)| (a - x_mean) * (b - y_mean)).sum();
        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;
        assert!((fit.coefficients[1] - slope).abs() < 1e-10);
        assert!((fit.coefficients[0] - intercept).abs() < 1e-10);

        let s2 = fit.ssr() / 3.0;
        assert!((fit.std_errors[1] - (s2 / sxx).sqrt()).abs() < 1e-10);
        assert_eq!(fit.df_resid, 3.0);
        assert_eq!(fit.df_model, 1.0);

        let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
        assert!((fit.r_squared - (1.0 - fit.ssr() / tss)).abs() < 1e-12);
        // with one regressor F equals t squared
        assert!((fit.f_statistic - fit.t_values[1].powi(2)).abs() < 1e-6);
        assert!(fit.p_values[1] < 0.001);
        let (lo, hi) = fit.conf_int[1];
        assert!(lo < slope && slope < hi);

        for i in 0..5 {
            assert!((fit.residuals[i] - (y[i] - fit.fitted[i])).abs() < 1e-12);
        }

        let svd = SVD::new(plain.values.clone(), false, false);
        let ratio = svd.singular_values.max() / svd.singular_values.min();
        assert!((fit.condition_number - ratio).abs() / ratio < 1e-8);
    }

    #[test]
    fn test_length_mismatch() {
        let design =
            DesignMatrix::build(&labels(&["a", "b", "a"]), &[("x".into(), vec![1.0, 2.0, 3.0])])
                .unwrap();
        let err = OlsFitter::fit(&design, &[1.0, 2.0], "y").unwrap_err();
        assert_eq!(err, RegressionError::LengthMismatch { rows: 3, response: 2 });
    }

    #[test]
    fn test_summary_lists_every_column() {
        let cats = labels(&["red", "white", "red", "white", "red", "white", "red"]);
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.5];
        let y = vec![3.2, 7.9, 7.1, 11.8, 11.2, 15.9, 16.1];
        let design = DesignMatrix::build(&cats, &[("alcohol".into(), x)]).unwrap();
        let fit = OlsFitter::fit(&design, &y, "quality_num").unwrap();

        let report = fit.to_string();
        assert!(report.contains("OLS Regression Results"));
        assert!(report.contains("quality_num"));
        for name in ["const", "red", "white", "alcohol"] {
            assert!(report.contains(name), "missing {name}");
        }
        assert!(report.contains("minimum-norm"));
        let cond_line = report.lines().find(|l| l.contains("Cond. No.")).unwrap();
        assert!(!cond_line.contains("inf"));
    }
}
