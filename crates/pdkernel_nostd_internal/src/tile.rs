/// The 2D shape of the tiles (work-groups) that a pairwise evaluation grid is
/// partitioned into.
///
/// Axis 0 runs over the points of the left operand and axis 1 over the points
/// of the right operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileShape([usize; 2]);

impl TileShape {
    pub fn new(rows: usize, cols: usize) -> Result<Self, &'static str> {
        if rows == 0 || cols == 0 {
            Err("tile dimensions must be positive")
        } else {
            Ok(TileShape([rows, cols]))
        }
    }

    /// Picks the shape `[1, n]` where `n` is the largest multiple of
    /// `preferred_multiple` that doesn't exceed `max_group_size`.
    pub fn auto(preferred_multiple: usize, max_group_size: usize) -> Result<Self, &'static str> {
        if preferred_multiple == 0 {
            return Err("the preferred group size multiple is 0");
        }
        let cols = (max_group_size / preferred_multiple) * preferred_multiple;
        if cols == 0 {
            Err("the maximum group size is smaller than the preferred group size multiple")
        } else {
            Ok(TileShape([1, cols]))
        }
    }

    #[inline(always)]
    pub fn dims(&self) -> [usize; 2] {
        self.0
    }

    /// tile extent along the axis of the given operand (0: left, 1: right)
    #[inline(always)]
    pub fn dim(&self, axis: usize) -> usize {
        self.0[axis]
    }

    /// number of members (work-items) in a single tile
    #[inline(always)]
    pub fn group_size(&self) -> usize {
        self.0[0] * self.0[1]
    }

    /// the shape of the tile grid that covers operands of the given
    /// (already padded) lengths
    pub fn n_tiles(&self, len_left: usize, len_right: usize) -> Result<[usize; 2], &'static str> {
        if len_left % self.0[0] != 0 || len_right % self.0[1] != 0 {
            Err("operand lengths must be multiples of the tile shape")
        } else {
            Ok([len_left / self.0[0], len_right / self.0[1]])
        }
    }
}
