//! Sparse matrix helpers.
//!
//! Thin utilities over CSC matrices: a triplet builder and the two
//! matrix-vector products the reference system needs.

use sprs::{CsMat, TriMat};

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// y = A x for a CSC matrix. `y` is overwritten.
pub fn mul_vec(a: &SparseCsc, x: &[f64], y: &mut [f64]) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());
    y.fill(0.0);
    for (col, col_view) in a.outer_iterator().enumerate() {
        for (row, &val) in col_view.iter() {
            y[row] += val * x[col];
        }
    }
}

/// y = Aᵀ x for a CSC matrix. `y` is overwritten.
pub fn mul_transpose_vec(a: &SparseCsc, x: &[f64], y: &mut [f64]) {
    assert_eq!(a.rows(), x.len());
    assert_eq!(a.cols(), y.len());
    y.fill(0.0);
    for (col, col_view) in a.outer_iterator().enumerate() {
        for (row, &val) in col_view.iter() {
            y[col] += val * x[row];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_vec() {
        // [1 2]
        // [0 3]
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 1, 3.0)]);
        let mut y = vec![0.0; 2];
        mul_vec(&a, &[1.0, 1.0], &mut y);
        assert_eq!(y, vec![3.0, 3.0]);
    }

    #[test]
    fn test_mul_transpose_vec() {
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 1, 3.0)]);
        let mut y = vec![0.0; 2];
        mul_transpose_vec(&a, &[1.0, 1.0], &mut y);
        assert_eq!(y, vec![1.0, 5.0]);
    }
}
