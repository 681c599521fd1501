//! Sparse matrices and factorized solves.
//!
//! [`CsrMatrix`] is a small compressed-sparse-row matrix with the handful of
//! operations the mesh operators need (transpose, products, sums, quadratic
//! forms). [`SparseCholesky`] factorizes a symmetric positive definite
//! [`CsrMatrix`] once through `nalgebra-sparse` and solves it repeatedly.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::error::{MeshError, Result};

/// Compressed Sparse Row (CSR) matrix.
///
/// Stores a sparse matrix in CSR format for efficient matrix-vector multiplication.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// Row pointers: row_ptr[i] is the index in col_idx/values where row i starts.
    /// Length is rows + 1, with row_ptr[rows] = nnz.
    row_ptr: Vec<usize>,
    /// Column indices, ascending within each row.
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from triplets (row, col, value).
    ///
    /// Duplicate entries at the same (row, col) are summed. Entries outside the
    /// matrix shape are a caller bug and panic.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        // Sort by (row, col) for CSR construction
        triplets.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut prev = None;

        for (row, col, val) in triplets {
            assert!(row < rows && col < cols, "triplet ({row}, {col}) outside {rows}x{cols}");
            if prev == Some((row, col)) {
                // Same position: accumulate value
                if let Some(last) = values.last_mut() {
                    *last += val;
                }
                continue;
            }
            col_idx.push(col);
            values.push(val);
            row_ptr[row + 1] += 1;
            prev = Some((row, col));
        }

        // Per-row counts to offsets
        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// The `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self::from_diagonal(&vec![1.0; n])
    }

    /// A square diagonal matrix.
    pub fn from_diagonal(diag: &[f64]) -> Self {
        let n = diag.len();
        Self {
            rows: n,
            cols: n,
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: diag.to_vec(),
        }
    }

    /// Get the number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Get the number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Stored `(col, value)` entries of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// All stored entries as `(row, col, value)`.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.rows).flat_map(move |i| self.row(i).map(move |(j, v)| (i, j, v)))
    }

    /// Entry at `(i, j)`, zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        match self.col_idx[range.clone()].binary_search(&j) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.0,
        }
    }

    /// The main diagonal.
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows.min(self.cols)).map(|i| self.get(i, i)).collect()
    }

    /// Multiply matrix by vector: y = A * x.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.cols, "Vector dimension mismatch");

        DVector::from_iterator(
            self.rows,
            (0..self.rows).map(|i| self.row(i).map(|(j, v)| v * x[j]).sum::<f64>()),
        )
    }

    /// Multiply matrix by a dense matrix column by column: Y = A * X.
    pub fn mul_dense(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        assert_eq!(x.nrows(), self.cols, "Matrix dimension mismatch");

        let mut y = DMatrix::zeros(self.rows, x.ncols());
        for i in 0..self.rows {
            for (j, v) in self.row(i) {
                for c in 0..x.ncols() {
                    y[(i, c)] += v * x[(j, c)];
                }
            }
        }
        y
    }

    /// Quadratic form `xᵀ A x`.
    pub fn quadratic_form(&self, x: &DVector<f64>) -> f64 {
        x.dot(&self.mul_vec(x))
    }

    /// The transpose `Aᵀ`.
    pub fn transpose(&self) -> Self {
        let mut row_ptr = vec![0usize; self.cols + 1];
        for &j in &self.col_idx {
            row_ptr[j + 1] += 1;
        }
        for j in 0..self.cols {
            row_ptr[j + 1] += row_ptr[j];
        }

        let mut next = row_ptr.clone();
        let mut col_idx = vec![0usize; self.nnz()];
        let mut values = vec![0.0; self.nnz()];
        // Rows are visited in order, so columns of the result stay sorted
        for (i, j, v) in self.triplets() {
            let k = next[j];
            col_idx[k] = i;
            values[k] = v;
            next[j] += 1;
        }

        Self {
            rows: self.cols,
            cols: self.rows,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Sparse product `A * B`.
    pub fn matmul(&self, other: &CsrMatrix) -> Self {
        assert_eq!(self.cols, other.rows, "Matrix dimension mismatch");

        let mut row_ptr = Vec::with_capacity(self.rows + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);

        // Dense accumulator over one result row
        let mut acc = vec![0.0; other.cols];
        let mut occupied = vec![false; other.cols];
        let mut touched: Vec<usize> = Vec::new();

        for i in 0..self.rows {
            for (k, a) in self.row(i) {
                for (j, b) in other.row(k) {
                    if !occupied[j] {
                        occupied[j] = true;
                        touched.push(j);
                    }
                    acc[j] += a * b;
                }
            }
            touched.sort_unstable();
            for &j in &touched {
                col_idx.push(j);
                values.push(acc[j]);
                acc[j] = 0.0;
                occupied[j] = false;
            }
            touched.clear();
            row_ptr.push(col_idx.len());
        }

        Self {
            rows: self.rows,
            cols: other.cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// `self + alpha * other`.
    pub fn add_scaled(&self, alpha: f64, other: &CsrMatrix) -> Self {
        assert_eq!(
            (self.rows, self.cols),
            (other.rows, other.cols),
            "Matrix dimension mismatch"
        );
        let triplets = self
            .triplets()
            .chain(other.triplets().map(|(i, j, v)| (i, j, alpha * v)))
            .collect();
        Self::from_triplets(self.rows, self.cols, triplets)
    }

    /// `alpha * A`.
    pub fn scale(&self, alpha: f64) -> Self {
        let mut out = self.clone();
        out.values.iter_mut().for_each(|v| *v *= alpha);
        out
    }

    /// Scale row `i` by `factors[i]`, i.e. `diag(factors) * A`.
    pub fn scale_rows(&self, factors: &[f64]) -> Self {
        assert_eq!(factors.len(), self.rows, "Vector dimension mismatch");
        let mut out = self.clone();
        for (i, &f) in factors.iter().enumerate() {
            for v in &mut out.values[self.row_ptr[i]..self.row_ptr[i + 1]] {
                *v *= f;
            }
        }
        out
    }

    /// True if `A` equals `Aᵀ` within `tol` entrywise.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        self.rows == self.cols && self.triplets().all(|(i, j, v)| (self.get(j, i) - v).abs() <= tol)
    }

    /// Dense copy, for tests and small systems.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.rows, self.cols);
        for (i, j, v) in self.triplets() {
            dense[(i, j)] += v;
        }
        dense
    }

    fn to_csc(&self) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(self.rows, self.cols);
        for (i, j, v) in self.triplets() {
            coo.push(i, j, v);
        }
        CscMatrix::from(&coo)
    }
}

/// A Cholesky factorization `A = LLᵀ` of a symmetric positive definite matrix,
/// reusable across right-hand sides.
pub struct SparseCholesky {
    factor: CscCholesky<f64>,
    dim: usize,
    context: &'static str,
}

impl std::fmt::Debug for SparseCholesky {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseCholesky")
            .field("dim", &self.dim)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl SparseCholesky {
    /// Factorize `a`.
    ///
    /// `context` names the system in errors and logs. Fails with
    /// [`MeshError::SingularSystem`] if `a` is not square or not positive
    /// definite.
    pub fn factor(a: &CsrMatrix, context: &'static str) -> Result<Self> {
        if a.nrows() != a.ncols() {
            return Err(MeshError::SizeMismatch {
                what: "system matrix columns",
                expected: a.nrows(),
                actual: a.ncols(),
            });
        }
        if a.values.iter().any(|v| !v.is_finite()) {
            return Err(MeshError::NonFiniteValue { context });
        }

        log::debug!("factorizing {context}: {}x{}, nnz {}", a.nrows(), a.ncols(), a.nnz());
        let factor = CscCholesky::factor(&a.to_csc())
            .map_err(|_| MeshError::SingularSystem { context })?;

        Ok(Self {
            factor,
            dim: a.nrows(),
            context,
        })
    }

    /// Factorize `a + eps * mean(diag(a)) * I`.
    ///
    /// Used for positive semi-definite operators whose null space is removed
    /// afterwards (the constant field per connected component for Laplacians).
    pub fn factor_shifted(a: &CsrMatrix, relative_eps: f64, context: &'static str) -> Result<Self> {
        let diag = a.diagonal();
        let mean = if diag.is_empty() {
            0.0
        } else {
            diag.iter().map(|d| d.abs()).sum::<f64>() / diag.len() as f64
        };
        let shift = relative_eps * if mean > 0.0 { mean } else { 1.0 };
        let shifted = a.add_scaled(shift, &CsrMatrix::identity(a.nrows()));
        Self::factor(&shifted, context)
    }

    /// Dimension of the factorized system.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Solve `A X = B` for every column of `b` at once.
    pub fn solve_dense(&self, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if b.nrows() != self.dim {
            return Err(MeshError::SizeMismatch {
                what: "right-hand side rows",
                expected: self.dim,
                actual: b.nrows(),
            });
        }
        let x = self.factor.solve(b);
        if x.iter().any(|v| !v.is_finite()) {
            return Err(MeshError::NonFiniteValue {
                context: self.context,
            });
        }
        Ok(x)
    }

    /// Solve `A x = b`.
    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        let rhs = DMatrix::from_column_slice(b.len(), 1, b.as_slice());
        let x = self.solve_dense(&rhs)?;
        Ok(x.column(0).into_owned())
    }
}
