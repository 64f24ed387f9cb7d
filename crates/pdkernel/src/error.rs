// We follow the same approach as the other crates we build on: the public
// `Error` is an opaque struct that wraps a private `ErrorKind`. The leaf
// types describe each failure in enough detail to locate it (which execution
// unit, which stage, which file).
//
// The internal `no_std` crate returns `&'static str` errors. We wrap those at
// the boundary with `Error::config` or `Error::internal`.

use crate::device::DeviceError;
use crate::diagram::DiagramError;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;

/// The coarse category of an [`Error`]
///
/// This is what gets reported per failing execution unit when a run fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// invalid options or parameters (detected before anything runs)
    Config,
    /// program build, kernel construction or tiling-shape detection failed
    /// (fatal to the whole run, before any work starts)
    Setup,
    /// a diagram file was missing, malformed or empty after filtering
    Load,
    /// an allocation, transfer, launch or readback failed on a device
    Compute,
    /// reading a file list or writing the output failed
    Io,
    /// one or more workers failed during a run
    Run,
}

impl core::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let name = match self {
            ErrorClass::Config => "configuration error",
            ErrorClass::Setup => "setup error",
            ErrorClass::Load => "load error",
            ErrorClass::Compute => "compute error",
            ErrorClass::Io => "I/O error",
            ErrorClass::Run => "run error",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The underlying internal error type
#[derive(Debug, ThisError)]
enum ErrorKind {
    #[error(transparent)]
    Config(ConfigError),
    #[error(transparent)]
    Setup(SetupError),
    #[error(transparent)]
    Load(LoadError),
    #[error(transparent)]
    Compute(ComputeError),
    #[error(transparent)]
    Io(IoError),
    #[error(transparent)]
    RunFailed(RunFailedError),
}

// define constructor methods for Error
impl Error {
    /// produce an error indicating that an option or parameter is invalid
    pub(crate) fn config(what: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Config(ConfigError { what: what.into() }),
        }
    }

    /// produce an error indicating that an execution unit couldn't be set
    /// up (before any work is claimed)
    pub(crate) fn setup(unit: usize, stage: SetupStage, source: DeviceError) -> Self {
        Error {
            kind: ErrorKind::Setup(SetupError {
                unit,
                stage,
                what: source.to_string(),
            }),
        }
    }

    /// produce a setup error from one of the internal crate's messages
    pub(crate) fn setup_adhoc(unit: usize, stage: SetupStage, what: &'static str) -> Self {
        Error {
            kind: ErrorKind::Setup(SetupError {
                unit,
                stage,
                what: what.to_string(),
            }),
        }
    }

    /// produce an error indicating that a diagram couldn't be loaded
    pub(crate) fn load(path: &Path, source: DiagramError) -> Self {
        Error {
            kind: ErrorKind::Load(LoadError {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// produce an error indicating that a device operation failed while
    /// evaluating the named kernel variant
    pub(crate) fn compute(variant: &'static str, source: DeviceError) -> Self {
        Error {
            kind: ErrorKind::Compute(ComputeError { variant, source }),
        }
    }

    /// wraps an error message from `pdkernel_nostd_internal` that occurs
    /// while evaluating a kernel. These indicate a bug (e.g. an operand that
    /// wasn't padded), rather than a device failure.
    pub(crate) fn internal(variant: &'static str, what: &'static str) -> Self {
        Error::compute(variant, DeviceError::internal(what))
    }

    pub(crate) fn io(what: impl Into<String>, source: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io(IoError {
                what: what.into(),
                source,
            }),
        }
    }

    /// produce the aggregate error of a run in which some workers failed
    pub(crate) fn run_failed(failures: Vec<UnitFailure>) -> Self {
        Error {
            kind: ErrorKind::RunFailed(RunFailedError { failures }),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self.kind {
            ErrorKind::Config(_) => ErrorClass::Config,
            ErrorKind::Setup(_) => ErrorClass::Setup,
            ErrorKind::Load(_) => ErrorClass::Load,
            ErrorKind::Compute(_) => ErrorClass::Compute,
            ErrorKind::Io(_) => ErrorClass::Io,
            ErrorKind::RunFailed(_) => ErrorClass::Run,
        }
    }

    /// the offending file, for load errors
    pub fn path(&self) -> Option<&Path> {
        match self.kind {
            ErrorKind::Load(ref err) => Some(&err.path),
            _ => None,
        }
    }

    /// the failing execution units, for the aggregate error of a run
    pub fn unit_failures(&self) -> &[UnitFailure] {
        match self.kind {
            ErrorKind::RunFailed(ref err) => &err.failures,
            _ => &[],
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        self.kind.fmt(f)
    }
}

/// An error that occurs when an option or parameter is invalid
#[derive(Debug, ThisError)]
#[error("invalid configuration: {what}")]
struct ConfigError {
    what: String,
}

/// The stage of execution-unit setup that failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupStage {
    /// building the program for the unit
    ProgramBuild,
    /// constructing the kernel from the built program
    KernelConstruction,
    /// deriving the tiling shape from the unit's work-group limits
    TileDetection,
}

impl core::fmt::Display for SetupStage {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let name = match self {
            SetupStage::ProgramBuild => "program build",
            SetupStage::KernelConstruction => "kernel construction",
            SetupStage::TileDetection => "tiling shape detection",
        };
        f.write_str(name)
    }
}

/// An error that occurs while setting up an execution unit
#[derive(Debug, ThisError)]
#[error("{stage} failed for execution unit {unit}: {what}")]
struct SetupError {
    unit: usize,
    stage: SetupStage,
    what: String,
}

/// An error that occurs when a diagram can't be loaded
#[derive(Debug, ThisError)]
#[error("failed to load persistence diagram {}: {source}", .path.display())]
struct LoadError {
    path: PathBuf,
    #[source]
    source: DiagramError,
}

/// An error that occurs when a device operation fails
#[derive(Debug, ThisError)]
#[error("the {variant} kernel failed: {source}")]
struct ComputeError {
    variant: &'static str,
    #[source]
    source: DeviceError,
}

#[derive(Debug, ThisError)]
#[error("{what}: {source}")]
struct IoError {
    what: String,
    #[source]
    source: std::io::Error,
}

/// Describes the failure of a single worker within a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitFailure {
    pub unit: usize,
    pub class: ErrorClass,
    pub message: String,
}

impl core::fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "execution unit {} ({}): {}",
            self.unit, self.class, self.message
        )
    }
}

/// The aggregate error reported when one or more workers of a run failed
///
/// # Note
/// We don't track which cells are missing. A matrix from a failed run should
/// be treated as unreliable in its entirety.
#[derive(Debug, ThisError)]
struct RunFailedError {
    failures: Vec<UnitFailure>,
}

impl core::fmt::Display for RunFailedError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{} execution unit(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}
