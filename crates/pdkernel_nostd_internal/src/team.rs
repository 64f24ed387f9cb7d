//! Tiled evaluation of a pair function over the `left × right` grid.
//!
//! We reuse the "team" vocabulary: a tile of the evaluation grid is a unit of
//! work handed to a team (a device work-group). Every member of the team
//! evaluates the pair function for one `(i, j)` and records the result in a
//! distinct slot of the team's scratch buffer (local memory on a device).
//! Then the team combines the scratch buffer, so that one member holds the
//! tile's total contribution and writes it to the tile's partial sum.
//!
//! The order of the combination is fixed, so a given tile shape always
//! produces bitwise identical partial sums (regardless of which execution
//! unit evaluates them or how many units there are).

use crate::pair_fn::PairFunction;
use crate::point::Point;
use crate::real::Real;
use crate::tile::TileShape;
use ndarray::ArrayViewMut2;

/// Combines all entries of `scratch` with a pairwise tree reduction and
/// returns the total.
///
/// In each round the upper half of the live entries is folded onto the lower
/// half. Unlike a strict power-of-two reduction, an odd entry is simply
/// carried to the next round. The contents of `scratch` are left in an
/// undetermined state.
pub fn team_reduce<T: Real>(scratch: &mut [T]) -> T {
    let mut n_live = scratch.len();
    if n_live == 0 {
        return T::zero();
    }
    while n_live > 1 {
        let half = n_live.div_ceil(2);
        for i in 0..(n_live - half) {
            scratch[i] = scratch[i] + scratch[i + half];
        }
        n_live = half;
    }
    scratch[0]
}

/// Fills `partial_sums` with one contribution per tile of the grid spanned by
/// `left` and `right`.
///
/// `partial_sums` must have the shape of the tile grid (see
/// [`TileShape::n_tiles`]) and `scratch` must hold exactly
/// [`TileShape::group_size`] entries. The operand lengths must already be
/// padded to multiples of the tile shape.
pub fn fill_partial_sums<T, F>(
    pair_fn: &F,
    left: &[Point<T>],
    right: &[Point<T>],
    tile: TileShape,
    scratch: &mut [T],
    partial_sums: &mut ArrayViewMut2<T>,
) -> Result<(), &'static str>
where
    T: Real,
    F: PairFunction<T>,
{
    let n_tiles = tile.n_tiles(left.len(), right.len())?;
    let [rows, cols] = tile.dims();
    if scratch.len() != tile.group_size() {
        return Err("the scratch buffer must hold one entry per team member");
    } else if partial_sums.shape() != n_tiles {
        return Err("partial_sums doesn't have the shape of the tile grid");
    }

    for tile_i in 0..n_tiles[0] {
        let left_tile = &left[tile_i * rows..(tile_i + 1) * rows];
        for tile_j in 0..n_tiles[1] {
            let right_tile = &right[tile_j * cols..(tile_j + 1) * cols];

            // each member records its own contribution
            for (local_i, p) in left_tile.iter().enumerate() {
                for (local_j, q) in right_tile.iter().enumerate() {
                    scratch[local_i * cols + local_j] = pair_fn.contribution(p, q);
                }
            }

            partial_sums[[tile_i, tile_j]] = team_reduce(scratch);
        }
    }
    Ok(())
}
