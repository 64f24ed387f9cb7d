/*!
Computes kernel matrices between collections of persistence diagrams,
spreading the work over a pool of execution units.

# High-Level: Kernels on Persistence Diagrams

Given 2 ordered lists of persistence diagrams (with `M` and `N` entries),
we compute the `M × N` matrix whose `(i, j)` entry is a similarity kernel
evaluated on the `i`th left diagram and the `j`th right diagram. Two kernels
are available:

- the persistence scale-space (heat) kernel, and
- the persistence weighted Gaussian kernel.

Evaluating a kernel on 2 diagrams is a sum over every pair of points. That
sum is what gets offloaded: an execution unit evaluates the pairs in tiles
(work-groups), reduces each tile to a partial sum and the host adds up the
partial sums in double precision.

When both lists are the same, the matrix is symmetric and only the upper
triangle (plus the diagonal) is computed.

# User Guide

Build a [`Scheduler`] from a [`SchedulerConfig`], the 2 lists of diagram
files, a set of execution units (e.g. from [`HostPlatform`]) and a
[`DiagramSource`], then call [`Scheduler::run`]. The `pdkernel` binary wraps
all of this (see [`app::execute`]).

# Developer Guide

The point type, the pair functions and the tiled evaluation live in
[`pdkernel_nostd_internal`], which doesn't depend on the standard library
(it holds everything that would also run on a device).

*/

#![deny(rustdoc::broken_intra_doc_links)]

// inform build-system of the crates in this package
pub mod app;
pub mod config;
pub mod device;
pub mod diagram;
mod error;
pub mod host;
pub mod kernel;
mod misc;
pub mod output;
pub mod scheduler;

// pull in symbols that are visible outside of the package
pub use config::{KernelKind, Precision, RunOptions, TileRequest};
pub use device::{DeviceError, DeviceStage, EntryPoint, ExecutionUnit, PointBuffer, UnitInfo};
pub use diagram::{DiagramError, DiagramSource, DiphaSource, Interval};
pub use error::{Error, ErrorClass, SetupStage, UnitFailure};
pub use host::{HostPlatform, HostUnit, UnitSelection};
pub use kernel::{Kernel, KernelSpec, SimilarityKernel, Slot};
pub use output::OutputTarget;
pub use pdkernel_nostd_internal::{
    HeatPair, PairFunction, Point, Real, TileShape, WeightedGaussianPair,
};
pub use scheduler::{RunReport, Scheduler, SchedulerConfig, WorkCursor, WorkerReport};
