//! Reading (and writing) persistence diagrams.
//!
//! Diagrams are stored in the DIPHA persistence-diagram format. Every value is
//! a little-endian, 8-byte number:
//!
//! | field | type |
//! |---|---|
//! | magic number (`8067171840`) | `i64` |
//! | file type (`2` for persistence diagrams) | `i64` |
//! | number of intervals `n` | `i64` |
//! | `n` × (dimension, birth, death) | `(i64, f64, f64)` |
//!
//! An essential (infinite) interval in dimension `d` is stored with a
//! dimension of `-d - 1`.

use pdkernel_nostd_internal::Point;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DIPHA_MAGIC: i64 = 8067171840;
pub const DIPHA_PERSISTENCE_DIAGRAM: i64 = 2;

/// Describes why a diagram file couldn't be decoded
#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("can't open file: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a DIPHA file (magic number {found})")]
    BadMagic { found: i64 },
    #[error("not a DIPHA persistence diagram (file type {found})")]
    NotPersistenceDiagram { found: i64 },
    #[error("negative interval count {0}")]
    NegativeCount(i64),
    #[error("file ended after {read} of {expected} intervals")]
    Truncated { expected: u64, read: u64 },
    #[error("no intervals remain in degree {degree}")]
    Empty { degree: u32 },
}

/// The external collaborator that turns a diagram file into points.
///
/// Implementations are shared (by reference) between all workers of a run.
pub trait DiagramSource: Send + Sync {
    /// Reads the points of degree `degree` from the diagram at `path`.
    ///
    /// Essential intervals of that degree die at `finitization`. Intervals
    /// with `birth >= death` (after finitization) are discarded.
    fn read(
        &self,
        path: &Path,
        degree: u32,
        finitization: f64,
    ) -> Result<Vec<Point<f64>>, DiagramError>;
}

/// Reads DIPHA persistence-diagram files from disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiphaSource;

impl DiagramSource for DiphaSource {
    fn read(
        &self,
        path: &Path,
        degree: u32,
        finitization: f64,
    ) -> Result<Vec<Point<f64>>, DiagramError> {
        let file = File::open(path)?;
        read_dipha_degree(BufReader::new(file), degree, finitization)
    }
}

fn read_i64(reader: &mut impl Read) -> std::io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f64(reader: &mut impl Read) -> std::io::Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// maps an unexpected end-of-file to [`DiagramError::Truncated`]
fn truncated(err: std::io::Error, expected: u64, read: u64) -> DiagramError {
    if err.kind() == IoErrorKind::UnexpectedEof {
        DiagramError::Truncated { expected, read }
    } else {
        DiagramError::Io(err)
    }
}

/// Decodes the points of degree `degree` from a DIPHA persistence diagram.
pub fn read_dipha_degree(
    mut reader: impl Read,
    degree: u32,
    finitization: f64,
) -> Result<Vec<Point<f64>>, DiagramError> {
    let magic = read_i64(&mut reader).map_err(|e| truncated(e, 0, 0))?;
    if magic != DIPHA_MAGIC {
        return Err(DiagramError::BadMagic { found: magic });
    }
    let file_type = read_i64(&mut reader).map_err(|e| truncated(e, 0, 0))?;
    if file_type != DIPHA_PERSISTENCE_DIAGRAM {
        return Err(DiagramError::NotPersistenceDiagram { found: file_type });
    }
    let n = read_i64(&mut reader).map_err(|e| truncated(e, 0, 0))?;
    if n < 0 {
        return Err(DiagramError::NegativeCount(n));
    }
    let n = n as u64;

    let degree = degree as i64;
    let essential_dim = -degree - 1;
    let mut points = Vec::new();
    for i in 0..n {
        let dim = read_i64(&mut reader).map_err(|e| truncated(e, n, i))?;
        let birth = read_f64(&mut reader).map_err(|e| truncated(e, n, i))?;
        let death = read_f64(&mut reader).map_err(|e| truncated(e, n, i))?;

        let death = if dim == degree {
            death
        } else if dim == essential_dim {
            finitization
        } else {
            continue;
        };
        // degenerate intervals (including those that would be born after
        // the finitization) are dropped
        if birth < death {
            points.push(Point::new(birth, death));
        }
    }

    if points.is_empty() {
        Err(DiagramError::Empty {
            degree: degree as u32,
        })
    } else {
        Ok(points)
    }
}

/// A single interval, as stored in a DIPHA file
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub dim: u32,
    pub birth: f64,
    /// `f64::INFINITY` marks an essential interval
    pub death: f64,
}

/// Writes `intervals` to `path` as a DIPHA persistence diagram.
pub fn write_dipha(path: &Path, intervals: &[Interval]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&DIPHA_MAGIC.to_le_bytes())?;
    writer.write_all(&DIPHA_PERSISTENCE_DIAGRAM.to_le_bytes())?;
    writer.write_all(&(intervals.len() as i64).to_le_bytes())?;
    for interval in intervals {
        let dim = interval.dim as i64;
        let (dim, death) = if interval.death.is_finite() {
            (dim, interval.death)
        } else {
            (-dim - 1, f64::INFINITY)
        };
        writer.write_all(&dim.to_le_bytes())?;
        writer.write_all(&interval.birth.to_le_bytes())?;
        writer.write_all(&death.to_le_bytes())?;
    }
    writer.flush()
}

/// Reads a list of diagram paths, one per line.
///
/// Trailing whitespace is removed and blank lines are skipped.
pub fn read_file_list(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    Ok(contents
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}
