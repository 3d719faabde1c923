use serde::{Deserialize, Serialize};
use std::fmt;

/// A row major matrix of transformed features, owning its data.
///
/// Rows are contiguous, which suits scoring and attribution one row at a time
/// and appending rows as a split is transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    /// The raw data in row-major order.
    pub data: Vec<f64>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl DenseMatrix {
    /// Create a new DenseMatrix.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "data length must be rows * cols");
        DenseMatrix { data, rows, cols }
    }

    /// An empty matrix with a fixed column count.
    pub fn with_cols(cols: usize) -> Self {
        DenseMatrix {
            data: Vec::new(),
            rows: 0,
            cols,
        }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &f64 {
        &self.data[i * self.cols + j]
    }

    /// Get a row as a slice.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_iter(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on a zero chunk size.
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Add a row to the matrix.
    pub fn append_row(&mut self, items: &[f64]) {
        assert_eq!(items.len(), self.cols);
        self.rows += 1;
        self.data.extend_from_slice(items);
    }

    /// Copy of the first `n` rows.
    pub fn head(&self, n: usize) -> DenseMatrix {
        let n = n.min(self.rows);
        DenseMatrix::new(self.data[..n * self.cols].to_vec(), n, self.cols)
    }

    /// Mean of every column; zeros for an empty matrix.
    pub fn column_means(&self) -> Vec<f64> {
        let mut means = vec![0.0; self.cols];
        if self.rows == 0 {
            return means;
        }
        for row in self.row_iter() {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        let n = self.rows as f64;
        means.iter_mut().for_each(|m| *m /= n);
        means
    }
}

impl fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.row_iter() {
            let line = row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
