//! Writing the kernel matrix.
//!
//! The matrix is written as plain text: one row per line, values separated
//! by a single space. Every value is printed with 15 significant digits in
//! the style of C's `%g` conversion, e.g. `0.00878258479203767`, `1e-05` or
//! `nan`.

use crate::Error;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub const SIGNIFICANT_DIGITS: usize = 15;

/// Where the matrix gets written
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputTarget {
    #[default]
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// `-` stands for standard output
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(PathBuf::from(arg))
        }
    }

    /// Writes `matrix` to the target.
    ///
    /// A file target is only created by this call, so nothing exists on disk
    /// unless the caller got far enough to have a matrix to write.
    pub fn write(&self, matrix: &Array2<f64>) -> Result<(), Error> {
        match self {
            OutputTarget::Stdout => {
                let stdout = std::io::stdout();
                write_matrix(&mut stdout.lock(), matrix)
                    .map_err(|err| Error::io("failed to write to standard output", err))
            }
            OutputTarget::File(path) => {
                let what = || format!("failed to write output file {}", path.display());
                let file = File::create(path).map_err(|err| Error::io(what(), err))?;
                let mut writer = BufWriter::new(file);
                write_matrix(&mut writer, matrix)
                    .and_then(|_| writer.flush())
                    .map_err(|err| Error::io(what(), err))
            }
        }
    }
}

/// Writes `matrix` row by row.
pub fn write_matrix(writer: &mut impl Write, matrix: &Array2<f64>) -> std::io::Result<()> {
    for row in matrix.rows() {
        let mut first = true;
        for &value in row.iter() {
            if !first {
                writer.write_all(b" ")?;
            }
            first = false;
            writer.write_all(format_significant(value, SIGNIFICANT_DIGITS).as_bytes())?;
        }
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Formats `value` with `digits` significant digits, like `%.{digits}g`.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return String::from("nan");
    } else if value.is_infinite() {
        return String::from(if value < 0.0 { "-inf" } else { "inf" });
    }
    let digits = digits.max(1);

    // rounding to the requested precision may bump the exponent (9.99 ->
    // 10.0), so we let the scientific formatter do it and read the exponent
    // back
    let sci = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= digits as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_zeros(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (digits as i32 - 1 - exponent) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

/// strips trailing zeros after a decimal point (and the point itself)
fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
