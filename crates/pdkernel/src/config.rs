//! The options of a run.
//!
//! Everything here is validated before any diagram is read or any execution
//! unit is touched; a problem is reported as a configuration error.

use crate::Error;
use crate::host::UnitSelection;
use crate::kernel::KernelSpec;
use crate::output::OutputTarget;
use pdkernel_nostd_internal::TileShape;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

/// How the tiling shape of each kernel gets picked
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TileRequest {
    /// derive it from the unit's work-group limits
    #[default]
    Auto,
    Explicit(TileShape),
}

impl FromStr for TileRequest {
    type Err = Error;

    /// Accepts `auto`, `max` (a synonym) or 2 positive integers separated by
    /// a comma or whitespace.
    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if s == "auto" || s == "max" {
            return Ok(TileRequest::Auto);
        }
        let dims: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .collect();
        let [rows, cols] = dims[..] else {
            return Err(Error::config(format!(
                "a work shape needs 2 dimensions, got \"{s}\""
            )));
        };
        let parse = |dim: &str| {
            dim.parse::<usize>()
                .map_err(|_| Error::config(format!("bad work shape dimension \"{dim}\"")))
        };
        let tile = TileShape::new(parse(rows)?, parse(cols)?).map_err(Error::config)?;
        Ok(TileRequest::Explicit(tile))
    }
}

/// The working precision of the kernels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Precision {
    #[default]
    Single,
    Double,
}

/// Names a kernel variant (without its parameters)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KernelKind {
    #[default]
    Heat,
    WeightedGaussian,
}

impl FromStr for KernelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "heat" | "pssk" => Ok(KernelKind::Heat),
            "pwgk" => Ok(KernelKind::WeightedGaussian),
            _ => Err(Error::config(format!(
                "unknown kernel \"{s}\" (expected heat or pwgk)"
            ))),
        }
    }
}

impl KernelKind {
    /// Assembles (and validates) a [`KernelSpec`].
    ///
    /// `power` and `weight` must be given together, and only for the
    /// weighted kernel.
    pub fn spec(
        &self,
        sigma: f64,
        power: Option<f64>,
        weight: Option<f64>,
    ) -> Result<KernelSpec, Error> {
        let spec = match (self, power, weight) {
            (KernelKind::Heat, None, None) => KernelSpec::Heat { sigma },
            (KernelKind::Heat, _, _) => {
                return Err(Error::config(
                    "power and weight only apply to the pwgk kernel",
                ));
            }
            (KernelKind::WeightedGaussian, Some(power), Some(weight)) => {
                KernelSpec::WeightedGaussian {
                    sigma,
                    power,
                    weight,
                }
            }
            (KernelKind::WeightedGaussian, _, _) => {
                return Err(Error::config(
                    "the pwgk kernel needs both a power and a weight",
                ));
            }
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// The validated options of a run
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub kernel: KernelSpec,
    pub finitization: f64,
    pub degree: u32,
    pub tile: TileRequest,
    pub precision: Precision,
    /// number of host units to provision (`None` means one per hardware
    /// thread)
    pub n_units: Option<NonZeroUsize>,
    pub selection: UnitSelection,
    /// the files listing the left and right diagrams
    pub file_lists: [PathBuf; 2],
    pub output: OutputTarget,
    pub cache_operands: bool,
}

impl RunOptions {
    /// Creates options with defaults for everything that has one.
    pub fn new(
        kernel: KernelSpec,
        finitization: f64,
        degree: u32,
        file_lists: [PathBuf; 2],
    ) -> Self {
        RunOptions {
            kernel,
            finitization,
            degree,
            tile: TileRequest::Auto,
            precision: Precision::Single,
            n_units: None,
            selection: UnitSelection::All,
            file_lists,
            output: OutputTarget::Stdout,
            cache_operands: true,
        }
    }

    /// the same file list on both sides means only the upper triangle
    /// (including the diagonal) gets computed
    pub fn symmetric(&self) -> bool {
        self.file_lists[0] == self.file_lists[1]
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.kernel.validate()?;
        if !self.finitization.is_finite() {
            return Err(Error::config("the finitization must be finite"));
        }
        for list in &self.file_lists {
            if list.as_os_str().is_empty() {
                return Err(Error::config("both file lists must be specified"));
            }
        }
        Ok(())
    }
}
