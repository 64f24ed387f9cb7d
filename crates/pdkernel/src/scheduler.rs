//! Distributes the cells of a kernel matrix over a pool of workers.
//!
//! Every execution unit gets one worker (an OS thread) that owns the unit's
//! kernel. The workers pull `(i, j)` pairs from a single shared cursor, so a
//! fast unit naturally ends up computing more cells than a slow one. Each
//! worker runs a small loop:
//!
//! 1. **Claim** the next pair from the cursor (the only place a lock is
//!    taken).
//! 2. **Load** the diagrams of the pair that aren't already bound to the
//!    kernel, pad them to the tiling shape and transfer them to the unit.
//! 3. **Compute** the kernel value on the unit and reduce it on the host.
//! 4. **Write** the value into the result matrix (and its mirror image, in
//!    the symmetric case).
//!
//! Cells are claimed in row-major order. Consecutive claims by one worker
//! therefore tend to share the left diagram, which the worker only transfers
//! again when its index changes.
//!
//! A worker that hits an error stops right away and records the error in
//! its [`WorkerReport`]; the other workers keep draining the cursor, so only
//! the cell held by the failed worker is left unset (NaN).

use crate::Error;
use crate::config::{Precision, TileRequest};
use crate::device::ExecutionUnit;
use crate::diagram::DiagramSource;
use crate::error::UnitFailure;
use crate::kernel::{Kernel, KernelSpec, SimilarityKernel, Slot};
use crate::misc::padded_points;
use ndarray::Array2;
use pdkernel_nostd_internal::n_padding;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// A single cell of the result matrix
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkItem {
    pub i: usize,
    pub j: usize,
}

#[derive(Debug)]
struct CursorState {
    i: usize,
    j: usize,
    done: bool,
}

/// Hands out the cells of an `M × N` matrix, one at a time, in row-major
/// order.
///
/// In symmetric mode only the upper triangle (including the diagonal) is
/// visited: every row starts at the diagonal.
#[derive(Debug)]
pub struct WorkCursor {
    shape: [usize; 2],
    symmetric: bool,
    state: Mutex<CursorState>,
}

impl WorkCursor {
    pub fn new(shape: [usize; 2], symmetric: bool) -> Self {
        WorkCursor {
            shape,
            symmetric,
            state: Mutex::new(CursorState {
                i: 0,
                j: 0,
                done: shape[0] == 0 || shape[1] == 0,
            }),
        }
    }

    /// Reads the current cell and advances past it, or returns `None` once
    /// every cell has been handed out.
    pub fn claim(&self) -> Option<WorkItem> {
        // the state is always consistent between statements, so a panic in
        // another holder doesn't invalidate it
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.done {
            return None;
        }
        let item = WorkItem {
            i: state.i,
            j: state.j,
        };

        state.j += 1;
        if state.j == self.shape[1] {
            state.i += 1;
            state.j = if self.symmetric { state.i } else { 0 };
            if state.i >= self.shape[0] || state.j >= self.shape[1] {
                state.done = true;
            }
        }
        Some(item)
    }

    /// the number of cells the cursor hands out in total
    pub fn n_items(&self) -> usize {
        let [m, n] = self.shape;
        if self.symmetric {
            // the shape is square in this case
            m * (m + 1) / 2
        } else {
            m * n
        }
    }
}

/// The shared `M × N` result matrix.
///
/// Each cell is written by exactly one worker (the one that claimed it, or
/// that claimed its mirror image), so stores don't need a lock. Cells that
/// are never written stay NaN.
#[derive(Debug)]
pub struct ResultMatrix {
    shape: [usize; 2],
    cells: Vec<AtomicU64>,
}

impl ResultMatrix {
    pub fn new(shape: [usize; 2]) -> Self {
        let cells = (0..shape[0] * shape[1])
            .map(|_| AtomicU64::new(f64::NAN.to_bits()))
            .collect();
        ResultMatrix { shape, cells }
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn store(&self, i: usize, j: usize, value: f64) {
        self.cells[i * self.shape[1] + j].store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        f64::from_bits(self.cells[i * self.shape[1] + j].load(Ordering::Relaxed))
    }

    /// copies the matrix out (call this after all workers have been joined)
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn(self.shape, |(i, j)| self.get(i, j))
    }
}

/// Remembers which diagram is bound to each slot of a worker's kernel
#[derive(Clone, Copy, Debug, Default)]
pub struct OperandCache {
    loaded: [Option<usize>; 2],
}

impl OperandCache {
    pub fn is_loaded(&self, slot: Slot, index: usize) -> bool {
        self.loaded[slot.index()] == Some(index)
    }

    pub fn record(&mut self, slot: Slot, index: usize) {
        self.loaded[slot.index()] = Some(index);
    }

    pub fn invalidate(&mut self, slot: Slot) {
        self.loaded[slot.index()] = None;
    }
}

/// Parameters shared by every worker of a run
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub kernel: KernelSpec,
    pub precision: Precision,
    pub tile: TileRequest,
    /// the homological degree read from every diagram
    pub degree: u32,
    /// essential intervals die here
    pub finitization: f64,
    /// both sides use the same list of diagrams
    pub symmetric: bool,
    /// skip transfers of a diagram that is already bound to a slot (this
    /// never changes the result)
    pub cache_operands: bool,
}

impl SchedulerConfig {
    pub fn new(kernel: KernelSpec, degree: u32, finitization: f64) -> Self {
        SchedulerConfig {
            kernel,
            precision: Precision::Single,
            tile: TileRequest::Auto,
            degree,
            finitization,
            symmetric: false,
            cache_operands: true,
        }
    }
}

/// What a single worker did during a run
#[derive(Debug)]
pub struct WorkerReport {
    pub unit: usize,
    /// number of cells computed (mirror images aren't counted)
    pub computed: usize,
    /// number of transfers into the left and right slots
    pub transfers: [usize; 2],
    /// the error that terminated the worker early
    pub error: Option<Error>,
}

impl WorkerReport {
    fn new(unit: usize) -> Self {
        WorkerReport {
            unit,
            computed: 0,
            transfers: [0, 0],
            error: None,
        }
    }
}

/// The outcome of a run.
///
/// The matrix is kept even if some workers failed. In that case it should
/// be treated as unreliable: we don't promise anything about which cells
/// are missing.
#[derive(Debug)]
pub struct RunReport {
    matrix: Array2<f64>,
    workers: Vec<WorkerReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.workers.iter().all(|w| w.error.is_none())
    }

    pub fn failures(&self) -> Vec<UnitFailure> {
        self.workers
            .iter()
            .filter_map(|w| {
                w.error.as_ref().map(|err| UnitFailure {
                    unit: w.unit,
                    class: err.class(),
                    message: err.to_string(),
                })
            })
            .collect()
    }

    pub fn workers(&self) -> &[WorkerReport] {
        &self.workers
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// the total number of cells computed by all workers
    pub fn computed_cells(&self) -> usize {
        self.workers.iter().map(|w| w.computed).sum()
    }

    /// Returns the matrix of a successful run, or an error naming every
    /// failed execution unit.
    pub fn into_matrix(self) -> Result<Array2<f64>, Error> {
        if self.is_success() {
            Ok(self.matrix)
        } else {
            Err(Error::run_failed(self.failures()))
        }
    }
}

/// the state that all workers of a run share (by reference)
struct Shared<'a, S> {
    config: &'a SchedulerConfig,
    files: &'a [Vec<PathBuf>; 2],
    source: &'a S,
    cursor: WorkCursor,
    matrix: ResultMatrix,
}

/// Computes kernel matrices on a fixed set of execution units.
pub struct Scheduler<U, S> {
    config: SchedulerConfig,
    files: [Vec<PathBuf>; 2],
    kernels: Vec<Kernel<U>>,
    source: S,
}

impl<U, S> Scheduler<U, S>
where
    U: ExecutionUnit,
    S: DiagramSource,
{
    /// Sets up one kernel per execution unit.
    ///
    /// `files` lists the left and right diagrams. In the symmetric case,
    /// both lists must be identical. Any setup failure aborts construction.
    pub fn new(
        config: SchedulerConfig,
        files: [Vec<PathBuf>; 2],
        units: Vec<U>,
        source: S,
    ) -> Result<Self, Error> {
        if files[0].is_empty() || files[1].is_empty() {
            return Err(Error::config("the file lists can't be empty"));
        } else if config.symmetric && files[0] != files[1] {
            return Err(Error::config(
                "a symmetric run needs the same diagrams on both sides",
            ));
        } else if units.is_empty() {
            return Err(Error::config("at least 1 execution unit is needed"));
        } else if !config.finitization.is_finite() {
            return Err(Error::config("the finitization must be finite"));
        }

        let kernels = units
            .into_iter()
            .map(|unit| -> Result<Kernel<U>, Error> {
                let name = unit.info().name;
                let kernel = Kernel::new(unit, &config.kernel, config.precision, config.tile)?;
                tracing::debug!(
                    unit = kernel.unit_index(),
                    name = %name,
                    kernel = kernel.variant(),
                    tile = ?kernel.tiling_shape().dims(),
                    "set up execution unit"
                );
                Ok(kernel)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Scheduler {
            config,
            files,
            kernels,
            source,
        })
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.files[0].len(), self.files[1].len()]
    }

    pub fn n_workers(&self) -> usize {
        self.kernels.len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Computes the matrix, with one worker thread per execution unit, and
    /// returns once every worker has finished.
    pub fn run(&mut self) -> RunReport {
        let shared = Shared {
            config: &self.config,
            files: &self.files,
            source: &self.source,
            cursor: WorkCursor::new(self.shape(), self.config.symmetric),
            matrix: ResultMatrix::new(self.shape()),
        };
        tracing::info!(
            shape = ?self.shape(),
            symmetric = self.config.symmetric,
            cells = shared.cursor.n_items(),
            workers = self.kernels.len(),
            "starting run"
        );

        let start = Instant::now();
        let workers: Vec<WorkerReport> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .kernels
                .iter_mut()
                .map(|kernel| {
                    let shared = &shared;
                    scope.spawn(move || work(kernel, shared))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(report) => report,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        });

        let report = RunReport {
            matrix: shared.matrix.to_array(),
            workers,
        };
        tracing::info!(
            computed = report.computed_cells(),
            failed = report.failures().len(),
            elapsed = ?start.elapsed(),
            "finished run"
        );
        report
    }
}

/// the loop run by each worker thread
fn work<U, S>(kernel: &mut Kernel<U>, shared: &Shared<'_, S>) -> WorkerReport
where
    U: ExecutionUnit,
    S: DiagramSource,
{
    let unit = kernel.unit_index();
    let mut report = WorkerReport::new(unit);
    let mut cache = OperandCache::default();

    while let Some(item) = shared.cursor.claim() {
        tracing::trace!(unit, i = item.i, j = item.j, "claimed pair");
        if let Err(err) = process(kernel, shared, &mut cache, item, &mut report) {
            tracing::error!(unit, i = item.i, j = item.j, "{err}");
            report.error = Some(err);
            break;
        }
    }
    tracing::debug!(
        unit,
        computed = report.computed,
        left_transfers = report.transfers[0],
        right_transfers = report.transfers[1],
        "worker done"
    );
    report
}

/// load, compute and write a single pair
fn process<U, S>(
    kernel: &mut Kernel<U>,
    shared: &Shared<'_, S>,
    cache: &mut OperandCache,
    item: WorkItem,
    report: &mut WorkerReport,
) -> Result<(), Error>
where
    U: ExecutionUnit,
    S: DiagramSource,
{
    let unit = report.unit;
    let config = shared.config;

    for (slot, index) in [(Slot::Left, item.i), (Slot::Right, item.j)] {
        if config.cache_operands && cache.is_loaded(slot, index) {
            continue;
        }
        let path = &shared.files[slot.index()][index];
        let points = shared
            .source
            .read(path, config.degree, config.finitization)
            .map_err(|err| Error::load(path, err))?;
        let granularity = kernel.tiling_shape().dim(slot.index());
        let padded = padded_points(&points, granularity);
        tracing::trace!(
            unit,
            ?slot,
            index,
            path = %path.display(),
            points = points.len(),
            padding = n_padding(points.len(), granularity),
            "loading diagram"
        );

        // a failed transfer leaves the slot in an unknown state
        cache.invalidate(slot);
        kernel.prepare(slot, &padded)?;
        cache.record(slot, index);
        report.transfers[slot.index()] += 1;
    }

    let start = Instant::now();
    kernel.evaluate()?;
    let value = kernel.reduce();

    shared.matrix.store(item.i, item.j, value);
    if config.symmetric && item.i != item.j {
        shared.matrix.store(item.j, item.i, value);
    }
    report.computed += 1;
    tracing::info!(
        unit,
        i = item.i,
        j = item.j,
        value,
        elapsed = ?start.elapsed(),
        "computed pair"
    );
    Ok(())
}
