//! Row-major global matrix and read-only views onto it.

use crate::stencil_error::StencilError;
use itertools::Itertools;
use std::fmt::Write as _;
use std::io::Write;

/// Value of the fixed side columns in generated inputs.
pub const BOUNDARY_VALUE: f64 = 1.0;

/// Smallest row / column count that still has an interior cell.
pub const MIN_EXTENT: usize = 3;

/// Reserve a zero-filled `f64` buffer, reporting failure instead of aborting.
pub fn try_alloc(len: usize, what: &'static str) -> Result<Vec<f64>, StencilError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| StencilError::Allocation {
            what,
            bytes: len.saturating_mul(std::mem::size_of::<f64>()),
        })?;
    buf.resize(len, 0.0);
    Ok(buf)
}

/// Dense `rows × cols` matrix of doubles.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Wrap existing row-major data.
    ///
    /// # Errors
    /// `Configuration` if either extent is below 3 or `data` has the wrong length.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, StencilError> {
        check_extent(rows, cols)?;
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| StencilError::Configuration(format!("matrix[{rows}x{cols}] overflows")))?;
        if data.len() != expected {
            return Err(StencilError::Configuration(format!(
                "matrix[{rows}x{cols}] needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Generated starting state: interior 0.0, first and last column 1.0.
    pub fn initial(rows: usize, cols: usize) -> Result<Self, StencilError> {
        check_extent(rows, cols)?;
        let mut data = try_alloc(rows * cols, "matrix")?;
        for row in data.chunks_exact_mut(cols) {
            row[0] = BOUNDARY_VALUE;
            row[cols - 1] = BOUNDARY_VALUE;
        }
        Ok(Self { rows, cols, data })
    }

    /// All four borders set to `value`, interior 0.0.
    pub fn with_border(rows: usize, cols: usize, value: f64) -> Result<Self, StencilError> {
        let mut grid = Self::initial(rows, cols)?;
        for (i, row) in grid.data.chunks_exact_mut(cols).enumerate() {
            if i == 0 || i == rows - 1 {
                row.fill(value);
            } else {
                row[0] = value;
                row[cols - 1] = value;
            }
        }
        Ok(grid)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of rows the stencil recomputes.
    pub fn interior_rows(&self) -> usize {
        self.rows - 2
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn view(&self) -> GridView<'_> {
        GridView {
            rows: self.rows,
            cols: self.cols,
            data: &self.data,
        }
    }
}

fn check_extent(rows: usize, cols: usize) -> Result<(), StencilError> {
    if rows < MIN_EXTENT || cols < MIN_EXTENT {
        return Err(StencilError::Configuration(format!(
            "matrix[{rows}x{cols}] must be at least {MIN_EXTENT}x{MIN_EXTENT}"
        )));
    }
    Ok(())
}

/// Borrowed full-matrix view handed to snapshot sinks.
#[derive(Clone, Copy, Debug)]
pub struct GridView<'a> {
    pub rows: usize,
    pub cols: usize,
    pub data: &'a [f64],
}

impl<'a> GridView<'a> {
    pub fn new(rows: usize, cols: usize, data: &'a [f64]) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    /// Render the matrix the way `print-2d` does: blank line, then one
    /// tab-separated line per row with two decimals.
    pub fn format_matrix(&self) -> String {
        let mut out = String::with_capacity(self.data.len() * 6 + self.rows + 1);
        out.push('\n');
        for row in self.data.chunks_exact(self.cols) {
            let _ = writeln!(out, "{}\t", row.iter().map(|v| format!("{v:.2}")).join("\t"));
        }
        out
    }

    /// Write [`format_matrix`](Self::format_matrix) to `w`.
    pub fn print_to<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        w.write_all(self.format_matrix().as_bytes())?;
        w.flush()
    }
}
