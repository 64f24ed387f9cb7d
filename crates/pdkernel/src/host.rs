//! Implements the "host" backend: execution units that evaluate kernels on
//! the CPU.
//!
//! A host unit runs every launch on the thread that calls it (i.e. on the
//! worker thread that owns the unit). Within a launch, the members of each
//! team are simulated one after another by that single thread; the team
//! reduction is the same fixed-order tree that a device would use, so a host
//! unit produces bitwise identical partial sums for a given tile shape.

use crate::Error;
use crate::device::{
    DeviceError, DeviceStage, EntryPoint, ExecutionUnit, PointBuffer, UnitInfo, WorkGroupInfo,
};
use ndarray::ArrayViewMut2;
use pdkernel_nostd_internal::{PairFunction, Point, Real, TileShape, fill_partial_sums};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;

/// the work-group limits that host units report by default
pub const DEFAULT_WORK_GROUP: WorkGroupInfo = WorkGroupInfo {
    preferred_multiple: 32,
    max_group_size: 256,
};

pub struct HostUnit {
    index: usize,
    work_group: WorkGroupInfo,
    built: Vec<EntryPoint>,
}

impl HostUnit {
    pub fn new(index: usize, work_group: WorkGroupInfo) -> Self {
        HostUnit {
            index,
            work_group,
            built: Vec::new(),
        }
    }

    fn check_built(&self, entry: EntryPoint) -> Result<(), DeviceError> {
        if self.built.contains(&entry) {
            Ok(())
        } else {
            Err(DeviceError::new(
                DeviceStage::Query,
                format!("entry point {} hasn't been built", entry.name()),
            ))
        }
    }

    fn check_owned<T: Real>(&self, buf: &PointBuffer<T>) -> Result<(), DeviceError> {
        if buf.unit() == self.index {
            Ok(())
        } else {
            Err(DeviceError::new(
                DeviceStage::Launch,
                format!(
                    "buffer belongs to unit {}, not unit {}",
                    buf.unit(),
                    self.index
                ),
            ))
        }
    }
}

impl ExecutionUnit for HostUnit {
    fn info(&self) -> UnitInfo {
        UnitInfo {
            index: self.index,
            name: format!("host-{}", self.index),
        }
    }

    fn build_entry(&mut self, entry: EntryPoint) -> Result<(), DeviceError> {
        if !self.built.contains(&entry) {
            self.built.push(entry);
        }
        Ok(())
    }

    fn work_group_info(&self, entry: EntryPoint) -> Result<WorkGroupInfo, DeviceError> {
        self.check_built(entry)?;
        Ok(self.work_group)
    }

    fn upload<T: Real>(&mut self, points: &[Point<T>]) -> Result<PointBuffer<T>, DeviceError> {
        if points.is_empty() {
            return Err(DeviceError::new(
                DeviceStage::Allocate,
                "can't allocate a zero-sized buffer",
            ));
        }
        Ok(PointBuffer::from_host(self.index, points.to_vec()))
    }

    fn launch<T: Real, F: PairFunction<T>>(
        &mut self,
        pair_fn: &F,
        left: &PointBuffer<T>,
        right: &PointBuffer<T>,
        tile: TileShape,
        partial_sums: &mut [T],
    ) -> Result<(), DeviceError> {
        self.check_owned(left)?;
        self.check_owned(right)?;
        if tile.group_size() > self.work_group.max_group_size {
            return Err(DeviceError::new(
                DeviceStage::Launch,
                format!(
                    "a {:?} tile exceeds the maximum group size of {}",
                    tile.dims(),
                    self.work_group.max_group_size
                ),
            ));
        }
        let n_tiles = tile
            .n_tiles(left.len(), right.len())
            .map_err(|what| DeviceError::new(DeviceStage::Launch, what))?;
        let mut partial_sums = ArrayViewMut2::from_shape(n_tiles, partial_sums)
            .map_err(|_| DeviceError::new(DeviceStage::Readback, "result buffer has the wrong size"))?;

        // this plays the role of the team's local memory
        let mut scratch = vec![T::zero(); tile.group_size()];
        fill_partial_sums(
            pair_fn,
            left.as_host_slice(),
            right.as_host_slice(),
            tile,
            &mut scratch,
            &mut partial_sums,
        )
        .map_err(DeviceError::internal)
    }
}

/// Selects which of a platform's units to use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum UnitSelection {
    #[default]
    All,
    Ids(BTreeSet<usize>),
}

impl UnitSelection {
    /// Parses `"all"` or a comma-separated list of ids and inclusive ranges
    /// (e.g. `"0,2-3"`).
    pub fn parse(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if s == "all" {
            return Ok(UnitSelection::All);
        }
        let parse_id = |id: &str| {
            id.trim()
                .parse::<usize>()
                .map_err(|_| Error::config(format!("bad unit id \"{id}\" in \"{s}\"")))
        };
        let mut ids = BTreeSet::new();
        for part in s.split(',') {
            match part.split_once('-') {
                None => {
                    ids.insert(parse_id(part)?);
                }
                Some((start, stop)) => {
                    let (start, stop) = (parse_id(start)?, parse_id(stop)?);
                    if start > stop {
                        return Err(Error::config(format!("empty unit range \"{part}\"")));
                    }
                    ids.extend(start..=stop);
                }
            }
        }
        Ok(UnitSelection::Ids(ids))
    }

    fn contains(&self, id: usize) -> bool {
        match self {
            UnitSelection::All => true,
            UnitSelection::Ids(ids) => ids.contains(&id),
        }
    }
}

/// Provisions host execution units.
#[derive(Clone, Debug)]
pub struct HostPlatform {
    n_units: NonZeroUsize,
    work_group: WorkGroupInfo,
}

impl HostPlatform {
    pub fn new(n_units: NonZeroUsize) -> Self {
        HostPlatform {
            n_units,
            work_group: DEFAULT_WORK_GROUP,
        }
    }

    /// one unit per available hardware thread
    pub fn detect() -> Self {
        let n_units = std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        HostPlatform::new(n_units)
    }

    pub fn with_work_group(mut self, work_group: WorkGroupInfo) -> Self {
        self.work_group = work_group;
        self
    }

    pub fn name(&self) -> &'static str {
        "host"
    }

    pub fn n_units(&self) -> usize {
        self.n_units.get()
    }

    /// names of all units on the platform (used by `--list`)
    pub fn unit_names(&self) -> Vec<String> {
        (0..self.n_units())
            .map(|i| HostUnit::new(i, self.work_group).info().name)
            .collect()
    }

    /// Creates the selected units. They are re-indexed in order, so the
    /// scheduler always sees indices `0..n`.
    pub fn units(&self, selection: &UnitSelection) -> Result<Vec<HostUnit>, Error> {
        if let UnitSelection::Ids(ids) = selection {
            if let Some(bad) = ids.iter().find(|&&id| id >= self.n_units()) {
                return Err(Error::config(format!(
                    "unit {bad} isn't available (the {} platform has {} units)",
                    self.name(),
                    self.n_units()
                )));
            }
        }
        let units: Vec<HostUnit> = (0..self.n_units())
            .filter(|&id| selection.contains(id))
            .enumerate()
            .map(|(index, _)| HostUnit::new(index, self.work_group))
            .collect();
        if units.is_empty() {
            Err(Error::config("unable to select any execution units"))
        } else {
            Ok(units)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdkernel_nostd_internal::HeatPair;

    #[test]
    fn selection_parsing() {
        assert_eq!(UnitSelection::parse("all").unwrap(), UnitSelection::All);
        let expected = UnitSelection::Ids(BTreeSet::from([0, 2, 3, 4, 7]));
        assert_eq!(UnitSelection::parse("0,2-4,7").unwrap(), expected);
        assert!(UnitSelection::parse("1,x").is_err());
        assert!(UnitSelection::parse("3-1").is_err());
        assert!(UnitSelection::parse("1-2-3").is_err());
    }

    #[test]
    fn platform_units() {
        let platform = HostPlatform::new(NonZeroUsize::new(4).unwrap());
        assert_eq!(platform.units(&UnitSelection::All).unwrap().len(), 4);
        let units = platform.units(&UnitSelection::parse("1,3").unwrap()).unwrap();
        let indices: Vec<usize> = units.iter().map(|u| u.info().index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert!(platform.units(&UnitSelection::parse("4").unwrap()).is_err());
    }

    #[test]
    fn work_group_requires_build() {
        let mut unit = HostUnit::new(0, DEFAULT_WORK_GROUP);
        assert!(unit.work_group_info(EntryPoint::Heat).is_err());
        unit.build_entry(EntryPoint::Heat).unwrap();
        assert_eq!(
            unit.work_group_info(EntryPoint::Heat).unwrap(),
            DEFAULT_WORK_GROUP
        );
        assert!(unit.work_group_info(EntryPoint::WeightedGaussian).is_err());
    }

    #[test]
    fn launch_checks() {
        let mut unit = HostUnit::new(0, DEFAULT_WORK_GROUP);
        let mut other = HostUnit::new(1, DEFAULT_WORK_GROUP);
        let f = HeatPair::<f64>::new(1.0).unwrap();
        let points = vec![Point::new(0.0, 1.0); 4];
        let left = unit.upload(&points).unwrap();
        let right = unit.upload(&points).unwrap();
        let foreign = other.upload(&points).unwrap();
        let tile = TileShape::new(2, 2).unwrap();

        let mut partial_sums = vec![0.0; 4];
        unit.launch(&f, &left, &right, tile, &mut partial_sums).unwrap();
        assert!(partial_sums.iter().all(|v| *v > 0.0));

        let err = unit
            .launch(&f, &left, &foreign, tile, &mut partial_sums)
            .unwrap_err();
        assert_eq!(err.stage, DeviceStage::Launch);

        let big = TileShape::new(1, 512).unwrap();
        assert!(unit.launch(&f, &left, &right, big, &mut partial_sums).is_err());

        let mut wrong_size = vec![0.0; 3];
        assert!(unit.launch(&f, &left, &right, tile, &mut wrong_size).is_err());

        assert!(unit.upload::<f64>(&[]).is_err());
    }
}
