//! The interface to an execution unit: one accelerator together with the
//! queue used to drive it.
//!
//! Discovering and selecting accelerators is not the job of this crate's
//! core. Whoever provisions the units hands the scheduler an ordered list of
//! types implementing [`ExecutionUnit`]; the scheduler gives each one its own
//! worker thread and never touches a unit from another thread.
//!
//! All operations are synchronous: `upload` returns once the transfer has
//! completed and `launch` returns once the partial sums have been read back.
//! That way, a worker can reuse its buffers in the next iteration without any
//! further synchronization.

use pdkernel_nostd_internal::{PairFunction, Point, Real, TileShape};

/// The entry points of the kernel program
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryPoint {
    Heat,
    WeightedGaussian,
}

impl EntryPoint {
    pub fn name(&self) -> &'static str {
        match self {
            EntryPoint::Heat => "pdk_heat",
            EntryPoint::WeightedGaussian => "pdk_pwgk",
        }
    }
}

/// Describes an execution unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitInfo {
    /// position of the unit in the list handed to the scheduler
    pub index: usize,
    pub name: String,
}

/// The work-group limits that a unit reports for an entry point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkGroupInfo {
    /// work-group sizes should preferably be a multiple of this
    pub preferred_multiple: usize,
    /// largest supported number of members in a work-group
    pub max_group_size: usize,
}

/// The device operation that failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceStage {
    Build,
    Query,
    Allocate,
    Transfer,
    Launch,
    Readback,
    /// a violated precondition in the evaluation machinery (a bug)
    Internal,
}

impl core::fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let name = match self {
            DeviceStage::Build => "build",
            DeviceStage::Query => "query",
            DeviceStage::Allocate => "allocation",
            DeviceStage::Transfer => "transfer",
            DeviceStage::Launch => "launch",
            DeviceStage::Readback => "readback",
            DeviceStage::Internal => "internal check",
        };
        f.write_str(name)
    }
}

/// An error reported by an execution unit
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("device {stage} failed: {message}")]
pub struct DeviceError {
    pub stage: DeviceStage,
    pub message: String,
}

impl DeviceError {
    pub fn new(stage: DeviceStage, message: impl Into<String>) -> Self {
        DeviceError {
            stage,
            message: message.into(),
        }
    }

    pub(crate) fn internal(what: &'static str) -> Self {
        DeviceError::new(DeviceStage::Internal, what)
    }
}

/// An operand buffer that lives in a unit's memory.
///
/// # Note
/// For the host backend, device memory is host memory, so the buffer simply
/// owns the points. A backend for a discrete accelerator would keep a
/// device handle here instead (and drop the host copy).
#[derive(Clone, Debug)]
pub struct PointBuffer<T> {
    unit: usize,
    points: Vec<Point<T>>,
}

impl<T: Real> PointBuffer<T> {
    /// wraps points that were transferred to the unit with index `unit`
    pub fn from_host(unit: usize, points: Vec<Point<T>>) -> Self {
        PointBuffer { unit, points }
    }

    pub fn unit(&self) -> usize {
        self.unit
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_host_slice(&self) -> &[Point<T>] {
        &self.points
    }
}

/// One accelerator plus its execution queue.
pub trait ExecutionUnit: Send {
    fn info(&self) -> UnitInfo;

    /// Constructs the kernel for `entry` from the shared program.
    fn build_entry(&mut self, entry: EntryPoint) -> Result<(), DeviceError>;

    /// Queries the work-group limits of a (built) entry point.
    fn work_group_info(&self, entry: EntryPoint) -> Result<WorkGroupInfo, DeviceError>;

    /// Allocates a buffer and transfers `points` into it (blocking).
    fn upload<T: Real>(&mut self, points: &[Point<T>]) -> Result<PointBuffer<T>, DeviceError>;

    /// Evaluates `pair_fn` over the `left × right` grid, tiled with `tile`,
    /// and reads the per-tile partial sums back into `partial_sums` (blocking).
    ///
    /// `partial_sums` holds the tile grid in row-major order.
    fn launch<T: Real, F: PairFunction<T>>(
        &mut self,
        pair_fn: &F,
        left: &PointBuffer<T>,
        right: &PointBuffer<T>,
        tile: TileShape,
        partial_sums: &mut [T],
    ) -> Result<(), DeviceError>;
}
