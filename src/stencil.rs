//! 9-point averaging kernel.
//!
//! The kernel never knows which substrate drives it: it reads a source
//! buffer, writes a run of destination rows and nothing else.

/// Average of the 3×3 neighbourhood of `(i, j)` in a row-major buffer.
///
/// Terms are summed in one fixed order; changing it changes the last bits of
/// the result and breaks equivalence between substrates.
#[inline(always)]
pub fn stencil_point(src: &[f64], i: usize, j: usize, cols: usize) -> f64 {
    let up = (i - 1) * cols;
    let mid = i * cols;
    let down = (i + 1) * cols;
    (src[up + j - 1]
        + src[up + j]
        + src[up + j + 1]
        + src[mid + j + 1]
        + src[down + j + 1]
        + src[down + j]
        + src[down + j - 1]
        + src[mid + j - 1]
        + src[mid + j])
        / 9.0
}

/// One sweep over `dst.len() / cols` consecutive rows starting at `first_row`.
///
/// `src` must hold rows `first_row - 1 ..= first_row + n` in the same row
/// numbering; `dst` holds exactly the `n` destination rows. The side columns
/// of each destination row are copied from `src` unchanged.
pub fn sweep_rows(src: &[f64], dst: &mut [f64], cols: usize, first_row: usize) {
    debug_assert!(first_row >= 1);
    debug_assert_eq!(dst.len() % cols, 0);
    debug_assert!(src.len() >= (first_row + dst.len() / cols + 1) * cols);
    for (k, out) in dst.chunks_exact_mut(cols).enumerate() {
        let i = first_row + k;
        out[0] = src[i * cols];
        for j in 1..cols - 1 {
            out[j] = stencil_point(src, i, j, cols);
        }
        out[cols - 1] = src[i * cols + cols - 1];
    }
}

/// Sweep every interior row of a full `rows × cols` buffer into `dst`.
///
/// Rows 0 and `rows - 1` of `dst` are left untouched.
pub fn sweep_interior(src: &[f64], dst: &mut [f64], rows: usize, cols: usize) {
    sweep_rows(src, &mut dst[cols..(rows - 1) * cols], cols, 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn single_sweep_on_unit_border() {
        let src = Grid::with_border(5, 5, 1.0).unwrap();
        let mut dst = src.clone();
        sweep_interior(src.as_slice(), dst.as_mut_slice(), 5, 5);
        assert_eq!(dst.get(1, 1), 5.0 / 9.0);
        assert_eq!(dst.get(2, 2), 0.0);
        assert_eq!(dst.get(1, 2), 3.0 / 9.0);
        for k in 0..5 {
            assert_eq!(dst.get(0, k), 1.0);
            assert_eq!(dst.get(4, k), 1.0);
            assert_eq!(dst.get(k, 0), 1.0);
            assert_eq!(dst.get(k, 4), 1.0);
        }
    }

    #[test]
    fn row_subset_matches_full_sweep() {
        let src: Vec<f64> = (0..6 * 4).map(|v| v as f64 * 0.25).collect();
        let mut full = src.clone();
        sweep_interior(&src, &mut full, 6, 4);

        let mut part = vec![0.0; 2 * 4];
        sweep_rows(&src, &mut part, 4, 2);
        assert_eq!(&part[..], &full[2 * 4..4 * 4]);
    }
}
