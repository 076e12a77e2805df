//! Outlier filtering, min-max scaling and principal component projection

use ndarray::{Array1, Array2};

use crate::data::FeatureTable;
use crate::EngageError;

/// Tukey fence multiplier for the IQR rule.
const IQR_MULTIPLIER: f64 = 1.5;

/// Convergence threshold for the Jacobi eigensolver.
const JACOBI_EPS: f64 = 1e-12;
const JACOBI_MAX_SWEEPS: usize = 64;

/// Per-column scaling parameters, scoped to one pipeline run.
#[derive(Debug, Clone)]
pub struct NormalizationParams {
    pub mins: Array1<f64>,
    pub maxs: Array1<f64>,
}

/// Drop rows that are extreme on any feature column.
///
/// Per column, bounds are [Q1 − 1.5·IQR, Q3 + 1.5·IQR]; a row survives
/// only if every column lies within its own bounds. Row order and video
/// ids are preserved for the survivors. An empty table yields an empty
/// table.
pub fn handle_outliers_iqr(table: &FeatureTable) -> FeatureTable {
    if table.is_empty() {
        return table.clone();
    }

    let n_cols = table.n_features();
    let mut lower = Vec::with_capacity(n_cols);
    let mut upper = Vec::with_capacity(n_cols);

    for column in table.features.columns() {
        let values: Vec<f64> = column.iter().copied().collect();
        let q1 = quantile(&values, 0.25);
        let q3 = quantile(&values, 0.75);
        let iqr = q3 - q1;
        lower.push(q1 - IQR_MULTIPLIER * iqr);
        upper.push(q3 + IQR_MULTIPLIER * iqr);
    }

    let keep: Vec<usize> = (0..table.n_rows())
        .filter(|&i| {
            table
                .row(i)
                .iter()
                .enumerate()
                .all(|(j, &v)| v >= lower[j] && v <= upper[j])
        })
        .collect();

    table.select_rows(&keep)
}

/// Quantile with linear interpolation between closest ranks, matching the
/// standard convention so repeated runs are deterministic.
fn quantile(values: &[f64], q: f64) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (sorted.len() - 1) as f64;
    let low = pos.floor() as usize;
    let high = pos.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        sorted[low] + (pos - low as f64) * (sorted[high] - sorted[low])
    }
}

/// Rescale each column independently into [0, 1] by observed min/max.
///
/// A zero-variance column (max == min) maps to a constant 0.0 across the
/// board; division by a zero range must never produce NaN.
pub fn normalize_minmax(table: &FeatureTable) -> (FeatureTable, NormalizationParams) {
    let n_cols = table.n_features();
    let mut mins = Array1::zeros(n_cols);
    let mut maxs = Array1::zeros(n_cols);

    for (j, column) in table.features.columns().into_iter().enumerate() {
        mins[j] = column.iter().copied().fold(f64::INFINITY, f64::min);
        maxs[j] = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    }

    let mut normalized = table.features.clone();
    for ((_, j), value) in normalized.indexed_iter_mut() {
        let range = maxs[j] - mins[j];
        *value = if range == 0.0 {
            0.0
        } else {
            (*value - mins[j]) / range
        };
    }

    let params = NormalizationParams { mins, maxs };
    (table.with_features(table.columns.clone(), normalized), params)
}

/// Project the table onto its top-k orthogonal directions of maximal
/// variance (PCA), producing columns PC1..PCk in descending-variance
/// order.
///
/// The eigendecomposition is a cyclic Jacobi sweep over the covariance
/// matrix with no randomized step, and each component's sign is fixed so
/// its largest-magnitude loading is positive. Identical input therefore
/// yields bit-identical output.
pub fn apply_pca(table: &FeatureTable, n_components: usize) -> crate::Result<FeatureTable> {
    let n = table.n_rows();
    let d = table.n_features();

    if n_components < 1 || n_components > d {
        return Err(EngageError::InvalidParameter(format!(
            "component count {} must be between 1 and the feature count {}",
            n_components, d
        ))
        .into());
    }
    if n < 2 {
        return Err(EngageError::InvalidParameter(format!(
            "principal component projection needs at least 2 rows, got {}",
            n
        ))
        .into());
    }

    // Center columns on their means
    let means = table.features.mean_axis(ndarray::Axis(0)).expect("n >= 2");
    let mut centered = table.features.clone();
    for ((_, j), value) in centered.indexed_iter_mut() {
        *value -= means[j];
    }

    let covariance = centered.t().dot(&centered) / (n as f64 - 1.0);
    let (eigenvalues, eigenvectors) = jacobi_eigen(covariance);

    // Order components by descending explained variance
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

    let mut components = Array2::zeros((d, n_components));
    for (k, &idx) in order.iter().take(n_components).enumerate() {
        let column = eigenvectors.column(idx);
        // Fix the sign: the largest-magnitude loading is positive
        let dominant = column
            .iter()
            .copied()
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap_or(1.0);
        let sign = if dominant < 0.0 { -1.0 } else { 1.0 };
        for i in 0..d {
            components[[i, k]] = sign * column[i];
        }
    }

    let projected = centered.dot(&components);
    let columns = (1..=n_components).map(|k| format!("PC{}", k)).collect();
    Ok(table.with_features(columns, projected))
}

/// Eigendecomposition of a symmetric matrix by cyclic Jacobi rotations.
/// Returns (eigenvalues, eigenvectors-as-columns), unordered.
fn jacobi_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let d = a.nrows();
    let mut v = Array2::eye(d);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off_diagonal: f64 = (0..d)
            .flat_map(|p| (p + 1..d).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();
        if off_diagonal < JACOBI_EPS {
            break;
        }

        for p in 0..d - 1 {
            for q in p + 1..d {
                let apq = a[[p, q]];
                if apq.abs() < f64::EPSILON {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = if theta >= 0.0 {
                    1.0 / (theta + (theta * theta + 1.0).sqrt())
                } else {
                    -1.0 / (-theta + (theta * theta + 1.0).sqrt())
                };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                let tau = s / (1.0 + c);

                let app = a[[p, p]];
                let aqq = a[[q, q]];
                a[[p, p]] = app - t * apq;
                a[[q, q]] = aqq + t * apq;
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;

                for i in 0..d {
                    if i != p && i != q {
                        let aip = a[[i, p]];
                        let aiq = a[[i, q]];
                        a[[i, p]] = aip - s * (aiq + tau * aip);
                        a[[p, i]] = a[[i, p]];
                        a[[i, q]] = aiq + s * (aip - tau * aiq);
                        a[[q, i]] = a[[i, q]];
                    }
                }

                for i in 0..d {
                    let vip = v[[i, p]];
                    let viq = v[[i, q]];
                    v[[i, p]] = vip - s * (viq + tau * vip);
                    v[[i, q]] = viq + s * (vip - tau * viq);
                }
            }
        }
    }

    let eigenvalues = Array1::from_iter((0..d).map(|i| a[[i, i]]));
    (eigenvalues, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FeatureTable, VideoStats};

    fn table_from_columns(ids: &[&str], rows: Vec<Vec<f64>>) -> FeatureTable {
        let n = rows.len();
        let d = rows[0].len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        FeatureTable {
            video_ids: ids.iter().map(|s| s.to_string()).collect(),
            columns: (0..d).map(|j| format!("f{}", j)).collect(),
            features: Array2::from_shape_vec((n, d), flat).unwrap(),
        }
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.25), 1.75);
        assert_eq!(quantile(&values, 0.5), 2.5);
        assert_eq!(quantile(&values, 0.75), 3.25);
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
    }

    #[test]
    fn test_outlier_filter_drops_extreme_rows_only() {
        let mut rows: Vec<Vec<f64>> = (0..10).map(|i| vec![10.0 + i as f64, 5.0]).collect();
        rows.push(vec![1000.0, 5.0]);
        let ids: Vec<String> = (0..11).map(|i| format!("v{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let table = table_from_columns(&id_refs, rows);

        let cleaned = handle_outliers_iqr(&table);

        assert_eq!(cleaned.n_rows(), 10);
        assert!(!cleaned.video_ids.contains(&"v10".to_string()));
        // Order preserved
        assert_eq!(cleaned.video_ids[0], "v0");
        assert_eq!(cleaned.video_ids[9], "v9");
    }

    #[test]
    fn test_outlier_filter_requires_all_columns_in_bounds() {
        // Row extreme on the second column only must still be dropped
        let mut rows: Vec<Vec<f64>> = (0..10).map(|i| vec![10.0 + i as f64, 5.0]).collect();
        rows.push(vec![14.0, 900.0]);
        let ids: Vec<String> = (0..11).map(|i| format!("v{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let table = table_from_columns(&id_refs, rows);

        let cleaned = handle_outliers_iqr(&table);
        assert_eq!(cleaned.n_rows(), 10);
    }

    #[test]
    fn test_outlier_filter_empty_table() {
        let table = FeatureTable::from_stats(&[] as &[VideoStats]);
        let cleaned = handle_outliers_iqr(&table);
        assert!(cleaned.is_empty());
    }

    #[test]
    fn test_normalize_minmax_bounds() {
        let table = table_from_columns(
            &["a", "b", "c"],
            vec![vec![10.0, 1.0], vec![20.0, 3.0], vec![30.0, 2.0]],
        );

        let (normalized, params) = normalize_minmax(&table);

        assert!(normalized.features.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(normalized.features[[0, 0]], 0.0);
        assert_eq!(normalized.features[[2, 0]], 1.0);
        assert_eq!(params.mins[0], 10.0);
        assert_eq!(params.maxs[0], 30.0);
        // Schema unchanged
        assert_eq!(normalized.columns, table.columns);
    }

    #[test]
    fn test_normalize_constant_column_maps_to_zero() {
        let table = table_from_columns(
            &["a", "b", "c"],
            vec![vec![7.0, 1.0], vec![7.0, 2.0], vec![7.0, 3.0]],
        );

        let (normalized, _) = normalize_minmax(&table);

        for i in 0..3 {
            assert_eq!(normalized.features[[i, 0]], 0.0);
        }
        assert!(normalized.features.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_pca_shape_and_column_names() {
        let table = table_from_columns(
            &["a", "b", "c", "d"],
            vec![
                vec![0.0, 0.0, 0.1],
                vec![1.0, 1.0, 0.2],
                vec![2.0, 2.0, 0.1],
                vec![3.0, 3.0, 0.3],
            ],
        );

        let reduced = apply_pca(&table, 2).unwrap();
        assert_eq!(reduced.features.shape(), &[4, 2]);
        assert_eq!(reduced.columns, vec!["PC1".to_string(), "PC2".to_string()]);
        assert_eq!(reduced.video_ids, table.video_ids);
    }

    #[test]
    fn test_pca_captures_dominant_direction() {
        // Points on a straight line: PC1 carries all the variance
        let table = table_from_columns(
            &["a", "b", "c", "d"],
            vec![
                vec![0.0, 0.0],
                vec![1.0, 1.0],
                vec![2.0, 2.0],
                vec![3.0, 3.0],
            ],
        );

        let reduced = apply_pca(&table, 2).unwrap();
        for i in 0..4 {
            assert!(reduced.features[[i, 1]].abs() < 1e-9);
        }
        let pc1_spread = reduced.features[[3, 0]] - reduced.features[[0, 0]];
        assert!(pc1_spread.abs() > 3.0);
    }

    #[test]
    fn test_pca_is_deterministic() {
        let table = table_from_columns(
            &["a", "b", "c", "d", "e"],
            vec![
                vec![0.3, 0.9, 0.2],
                vec![0.1, 0.4, 0.8],
                vec![0.7, 0.2, 0.5],
                vec![0.9, 0.6, 0.1],
                vec![0.5, 0.5, 0.5],
            ],
        );

        let first = apply_pca(&table, 2).unwrap();
        let second = apply_pca(&table, 2).unwrap();
        assert_eq!(first.features, second.features);
    }

    #[test]
    fn test_pca_rejects_too_many_components() {
        let table = table_from_columns(&["a", "b"], vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert!(apply_pca(&table, 3).is_err());
        assert!(apply_pca(&table, 0).is_err());
    }

    #[test]
    fn test_jacobi_eigen_recovers_diagonal() {
        let m = Array2::from_shape_vec((2, 2), vec![2.0, 0.0, 0.0, 5.0]).unwrap();
        let (values, _) = jacobi_eigen(m);
        let mut sorted: Vec<f64> = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert!((sorted[0] - 2.0).abs() < 1e-12);
        assert!((sorted[1] - 5.0).abs() < 1e-12);
    }
}
