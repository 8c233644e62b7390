//! Console summaries printed by the front-ends.

use crate::io::{data_file_size, trace_file_size};
use std::io::{self, Write};
use std::path::Path;

const RULE: &str = "------------------------------------------------------";
const LONG_RULE: &str = "------------------------------------------------------------";

/// Which matrix state a data file holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixState {
    Initial,
    Final,
}

impl MatrixState {
    fn as_str(self) -> &'static str {
        match self {
            MatrixState::Initial => "initial",
            MatrixState::Final => "final",
        }
    }
}

fn gigabytes(bytes: u64) -> f64 {
    bytes as f64 * 1e-9
}

/// Format like C's `%.<precision>g`: shortest of fixed or exponent form,
/// trailing zeros removed.
pub fn format_general(value: f64, precision: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let precision = precision.max(1);
    // the exponent after rounding to `precision` digits picks the form
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_zeros(mantissa), exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Name, extents and size of a data file just written.
pub fn print_data_file_info<W: Write>(
    mut w: W,
    path: &Path,
    rows: usize,
    cols: usize,
    state: MatrixState,
) -> io::Result<()> {
    let bytes = data_file_size(rows, cols);
    writeln!(w, "{RULE}")?;
    writeln!(
        w,
        "Wrote {} matrix[{rows}x{cols}] state to '{}'",
        state.as_str(),
        path.display()
    )?;
    writeln!(
        w,
        "[{}] size = {bytes}(B) = {}(GB)",
        path.display(),
        format_general(gigabytes(bytes), 6)
    )
}

/// Name and size of a trace holding the initial state plus `iterations`.
pub fn print_stacked_file_info<W: Write>(
    mut w: W,
    path: &Path,
    rows: usize,
    cols: usize,
    iterations: usize,
) -> io::Result<()> {
    let bytes = trace_file_size(rows, cols, iterations);
    writeln!(w, "{RULE}")?;
    writeln!(
        w,
        "Wrote initial matrix state + {iterations} iterations to '{}'",
        path.display()
    )?;
    writeln!(
        w,
        "[{}] size = {bytes}(B) = {}(GB)",
        path.display(),
        format_general(gigabytes(bytes), 6)
    )
}

/// Overall, I/O (overall minus compute) and compute seconds.
pub fn print_times<W: Write>(mut w: W, overall: f64, compute: f64) -> io::Result<()> {
    writeln!(w)?;
    writeln!(w, "[Overall Time] = {} sec", format_general(overall, 6))?;
    writeln!(w, "[I/O Time] = {} sec", format_general(overall - compute, 6))?;
    write!(w, "[Compute Time] = {} sec", format_general(compute, 6))?;
    writeln!(w, "\n{LONG_RULE}")?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_format_matches_printf() {
        assert_eq!(format_general(0.0, 6), "0");
        assert_eq!(format_general(1.5, 6), "1.5");
        assert_eq!(format_general(123456789.0, 6), "1.23457e+08");
        assert_eq!(format_general(0.00001234, 6), "1.234e-05");
        assert_eq!(format_general(0.000208, 6), "0.000208");
        assert_eq!(format_general(2.0, 6), "2");
    }

    #[test]
    fn general_format_uses_rounded_exponent() {
        assert_eq!(format_general(999999.5, 6), "1e+06");
        assert_eq!(format_general(999999.4, 6), "999999");
        assert_eq!(format_general(9.9999996, 6), "10");
        assert_eq!(format_general(0.000099999996, 6), "0.0001");
        assert_eq!(format_general(-999999.5, 6), "-1e+06");
    }

    #[test]
    fn data_file_info_reports_bytes() {
        let mut out = Vec::new();
        print_data_file_info(&mut out, Path::new("a.dat"), 10, 10, MatrixState::Final).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("Wrote final matrix[10x10] state to 'a.dat'"), "{s}");
        assert!(s.contains("size = 808(B) = 8.08e-07(GB)"), "{s}");
    }

    #[test]
    fn times_split_out_io() {
        let mut out = Vec::new();
        print_times(&mut out, 3.0, 1.0).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("[I/O Time] = 2 sec"), "{s}");
        assert!(s.ends_with(&format!("\n{LONG_RULE}\n")));
    }
}
