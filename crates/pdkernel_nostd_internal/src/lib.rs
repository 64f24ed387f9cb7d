//! Internal, `no_std` machinery for evaluating persistence diagram kernels.
//!
//! Everything in this crate is written so that it could also run on a device:
//! there is no allocation, no I/O and errors are `&'static str`. The public
//! `pdkernel` crate wraps these pieces with execution units, scheduling and
//! proper error types.
//!
//! # Overview
//! A kernel value between 2 diagrams is a (prefactor-scaled) sum of a pair
//! function over every pair of points. The `left × right` grid of pairs is
//! split into tiles (see [`TileShape`]); each tile is reduced by a team into a
//! single partial sum (see [`fill_partial_sums`]). The partial sums are summed
//! on the host in double precision.
#![no_std]
mod pair_fn;
mod point;
mod real;
mod team;
mod tile;

pub use pair_fn::{HeatPair, PairFunction, WeightedGaussianPair};
pub use point::{Point, n_padding, padded_len, squared_dist};
pub use real::Real;
pub use team::{fill_partial_sums, team_reduce};
pub use tile::TileShape;
