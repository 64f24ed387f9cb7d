//! Similarity kernels: the strategy a worker uses to turn 2 diagrams into a
//! scalar.
//!
//! Every worker owns exactly one kernel, which in turn owns that worker's
//! execution unit, its bound operand buffers and its partial sums. The kernel
//! variant (and working precision) is fixed at construction.

use crate::config::{Precision, TileRequest};
use crate::device::{EntryPoint, ExecutionUnit, PointBuffer};
use crate::error::{Error, SetupStage};
use pdkernel_nostd_internal::{
    HeatPair, PairFunction, Point, Real, TileShape, WeightedGaussianPair,
};

/// The operand slot of a kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Left = 0,
    Right = 1,
}

impl Slot {
    #[inline(always)]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Selects a kernel variant and holds its parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KernelSpec {
    /// the persistence scale-space kernel
    Heat { sigma: f64 },
    /// the persistence weighted Gaussian kernel
    WeightedGaussian { sigma: f64, power: f64, weight: f64 },
}

impl KernelSpec {
    pub fn entry_point(&self) -> EntryPoint {
        match self {
            KernelSpec::Heat { .. } => EntryPoint::Heat,
            KernelSpec::WeightedGaussian { .. } => EntryPoint::WeightedGaussian,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KernelSpec::Heat { .. } => <HeatPair<f64> as PairFunction<f64>>::NAME,
            KernelSpec::WeightedGaussian { .. } => {
                <WeightedGaussianPair<f64> as PairFunction<f64>>::NAME
            }
        }
    }

    /// checks the parameters without building anything
    pub fn validate(&self) -> Result<(), Error> {
        let checked = match *self {
            KernelSpec::Heat { sigma } => HeatPair::<f64>::new(sigma).map(|_| ()),
            KernelSpec::WeightedGaussian {
                sigma,
                power,
                weight,
            } => WeightedGaussianPair::<f64>::new(sigma, power, weight).map(|_| ()),
        };
        checked.map_err(Error::config)
    }
}

/// The capabilities that the scheduler needs from a kernel
pub trait SimilarityKernel {
    /// name of the kernel variant
    fn variant(&self) -> &'static str;

    /// Transfers `points` to the unit and binds them as the operand in
    /// `slot`, replacing whatever was bound there before.
    ///
    /// The points must already be padded to a multiple of the tile extent
    /// along that slot's axis.
    fn prepare(&mut self, slot: Slot, points: &[Point<f64>]) -> Result<(), Error>;

    /// Launches the evaluation over the grid of the 2 bound operands and
    /// reads back one partial sum per tile.
    fn evaluate(&mut self) -> Result<(), Error>;

    /// Sums the partial sums of the last evaluation (in double precision)
    /// and applies the global prefactor.
    ///
    /// Returns NaN if nothing has been evaluated since the operands changed.
    fn reduce(&self) -> f64;

    fn tiling_shape(&self) -> TileShape;
}

/// A kernel evaluated on an execution unit with working precision `T`
pub struct DeviceKernel<U, T, F> {
    unit: U,
    pair_fn: F,
    tile: TileShape,
    operands: [Option<PointBuffer<T>>; 2],
    partial_sums: Vec<T>,
    evaluated: bool,
}

impl<U, T, F> DeviceKernel<U, T, F>
where
    U: ExecutionUnit,
    T: Real,
    F: PairFunction<T>,
{
    /// Builds the entry point on `unit` and settles the tiling shape.
    pub fn new(
        mut unit: U,
        entry: EntryPoint,
        pair_fn: F,
        tile: TileRequest,
    ) -> Result<Self, Error> {
        let index = unit.info().index;
        unit.build_entry(entry)
            .map_err(|err| Error::setup(index, SetupStage::KernelConstruction, err))?;

        let tile = match tile {
            TileRequest::Explicit(tile) => tile,
            TileRequest::Auto => {
                let info = unit
                    .work_group_info(entry)
                    .map_err(|err| Error::setup(index, SetupStage::TileDetection, err))?;
                let tile = TileShape::auto(info.preferred_multiple, info.max_group_size)
                    .map_err(|what| Error::setup_adhoc(index, SetupStage::TileDetection, what))?;
                tracing::debug!(
                    unit = index,
                    tile = ?tile.dims(),
                    "automatically picked tiling shape"
                );
                tile
            }
        };

        tracing::debug!(
            unit = index,
            entry = entry.name(),
            precision = T::NAME,
            "constructed kernel"
        );
        Ok(DeviceKernel {
            unit,
            pair_fn,
            tile,
            operands: [None, None],
            partial_sums: Vec::new(),
            evaluated: false,
        })
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }
}

impl<U, T, F> SimilarityKernel for DeviceKernel<U, T, F>
where
    U: ExecutionUnit,
    T: Real,
    F: PairFunction<T>,
{
    fn variant(&self) -> &'static str {
        F::NAME
    }

    fn prepare(&mut self, slot: Slot, points: &[Point<f64>]) -> Result<(), Error> {
        let converted: Vec<Point<T>> = points.iter().map(Point::cast).collect();
        let buf = self
            .unit
            .upload(&converted)
            .map_err(|err| Error::compute(F::NAME, err))?;
        self.operands[slot.index()] = Some(buf);
        self.evaluated = false;
        Ok(())
    }

    fn evaluate(&mut self) -> Result<(), Error> {
        let [Some(left), Some(right)] = &self.operands else {
            return Err(Error::internal(F::NAME, "both operands must be prepared"));
        };
        let n_tiles = self
            .tile
            .n_tiles(left.len(), right.len())
            .map_err(|what| Error::internal(F::NAME, what))?;

        self.partial_sums.clear();
        self.partial_sums.resize(n_tiles[0] * n_tiles[1], T::zero());
        self.unit
            .launch(
                &self.pair_fn,
                left,
                right,
                self.tile,
                &mut self.partial_sums,
            )
            .map_err(|err| Error::compute(F::NAME, err))?;
        self.evaluated = true;
        Ok(())
    }

    fn reduce(&self) -> f64 {
        if !self.evaluated {
            return f64::NAN;
        }
        crate::misc::sum_f64(&self.partial_sums) * self.pair_fn.global_prefactor()
    }

    fn tiling_shape(&self) -> TileShape {
        self.tile
    }
}

/// The closed set of kernels that the scheduler can drive
///
/// The variant is picked once (from a [`KernelSpec`] and a [`Precision`]) and
/// never changes afterwards.
pub enum Kernel<U> {
    HeatSingle(DeviceKernel<U, f32, HeatPair<f32>>),
    HeatDouble(DeviceKernel<U, f64, HeatPair<f64>>),
    WeightedGaussianSingle(DeviceKernel<U, f32, WeightedGaussianPair<f32>>),
    WeightedGaussianDouble(DeviceKernel<U, f64, WeightedGaussianPair<f64>>),
}

impl<U: ExecutionUnit> Kernel<U> {
    pub fn new(
        unit: U,
        spec: &KernelSpec,
        precision: Precision,
        tile: TileRequest,
    ) -> Result<Self, Error> {
        let entry = spec.entry_point();
        let kernel = match (*spec, precision) {
            (KernelSpec::Heat { sigma }, Precision::Single) => Kernel::HeatSingle(
                DeviceKernel::new(unit, entry, HeatPair::new(sigma).map_err(Error::config)?, tile)?,
            ),
            (KernelSpec::Heat { sigma }, Precision::Double) => Kernel::HeatDouble(
                DeviceKernel::new(unit, entry, HeatPair::new(sigma).map_err(Error::config)?, tile)?,
            ),
            (
                KernelSpec::WeightedGaussian {
                    sigma,
                    power,
                    weight,
                },
                Precision::Single,
            ) => Kernel::WeightedGaussianSingle(DeviceKernel::new(
                unit,
                entry,
                WeightedGaussianPair::new(sigma, power, weight).map_err(Error::config)?,
                tile,
            )?),
            (
                KernelSpec::WeightedGaussian {
                    sigma,
                    power,
                    weight,
                },
                Precision::Double,
            ) => Kernel::WeightedGaussianDouble(DeviceKernel::new(
                unit,
                entry,
                WeightedGaussianPair::new(sigma, power, weight).map_err(Error::config)?,
                tile,
            )?),
        };
        Ok(kernel)
    }

    fn inner(&self) -> &dyn SimilarityKernel {
        match self {
            Kernel::HeatSingle(k) => k,
            Kernel::HeatDouble(k) => k,
            Kernel::WeightedGaussianSingle(k) => k,
            Kernel::WeightedGaussianDouble(k) => k,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SimilarityKernel {
        match self {
            Kernel::HeatSingle(k) => k,
            Kernel::HeatDouble(k) => k,
            Kernel::WeightedGaussianSingle(k) => k,
            Kernel::WeightedGaussianDouble(k) => k,
        }
    }

    /// the index of the execution unit that the kernel runs on
    pub fn unit_index(&self) -> usize {
        match self {
            Kernel::HeatSingle(k) => k.unit().info().index,
            Kernel::HeatDouble(k) => k.unit().info().index,
            Kernel::WeightedGaussianSingle(k) => k.unit().info().index,
            Kernel::WeightedGaussianDouble(k) => k.unit().info().index,
        }
    }
}

impl<U: ExecutionUnit> SimilarityKernel for Kernel<U> {
    fn variant(&self) -> &'static str {
        self.inner().variant()
    }

    fn prepare(&mut self, slot: Slot, points: &[Point<f64>]) -> Result<(), Error> {
        self.inner_mut().prepare(slot, points)
    }

    fn evaluate(&mut self) -> Result<(), Error> {
        self.inner_mut().evaluate()
    }

    fn reduce(&self) -> f64 {
        self.inner().reduce()
    }

    fn tiling_shape(&self) -> TileShape {
        self.inner().tiling_shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::WorkGroupInfo;
    use crate::host::{DEFAULT_WORK_GROUP, HostUnit};
    use pdkernel_nostd_internal::padded_len;

    fn heat(precision: Precision, tile: TileRequest) -> Kernel<HostUnit> {
        let unit = HostUnit::new(0, DEFAULT_WORK_GROUP);
        Kernel::new(unit, &KernelSpec::Heat { sigma: 1.0 }, precision, tile).unwrap()
    }

    fn padded(points: &[Point<f64>], granularity: usize) -> Vec<Point<f64>> {
        let mut out = points.to_vec();
        out.resize(padded_len(points.len(), granularity), Point::zero());
        out
    }

    #[test]
    fn single_pair_heat() {
        let mut kernel = heat(Precision::Double, TileRequest::Auto);
        assert_eq!(kernel.tiling_shape().dims(), [1, 256]);
        let tile = kernel.tiling_shape();
        let pd = [Point::new(0.0, 1.0)];
        kernel.prepare(Slot::Left, &padded(&pd, tile.dim(0))).unwrap();
        kernel.prepare(Slot::Right, &padded(&pd, tile.dim(1))).unwrap();
        assert!(kernel.reduce().is_nan());
        kernel.evaluate().unwrap();
        let expected = (1.0 - (-0.25_f64).exp()) / (8.0 * std::f64::consts::PI);
        assert!((kernel.reduce() - expected).abs() < 1e-12);
    }

    #[test]
    fn evaluate_requires_operands() {
        let mut kernel = heat(Precision::Single, TileRequest::Auto);
        assert!(kernel.evaluate().is_err());
    }

    #[test]
    fn unpadded_operand_is_rejected() {
        let tile = TileShape::new(2, 2).unwrap();
        let mut kernel = heat(Precision::Double, TileRequest::Explicit(tile));
        let pd = [Point::new(0.0, 1.0); 3];
        kernel.prepare(Slot::Left, &pd).unwrap();
        kernel.prepare(Slot::Right, &padded(&pd, 2)).unwrap();
        assert!(kernel.evaluate().is_err());
    }

    #[test]
    fn tile_detection_failure_is_setup_error() {
        let work_group = WorkGroupInfo {
            preferred_multiple: 64,
            max_group_size: 32,
        };
        let unit = HostUnit::new(3, work_group);
        let err = Kernel::new(
            unit,
            &KernelSpec::Heat { sigma: 1.0 },
            Precision::Single,
            TileRequest::Auto,
        )
        .err()
        .unwrap();
        assert_eq!(err.class(), crate::ErrorClass::Setup);
    }

    #[test]
    fn invalid_spec() {
        let spec = KernelSpec::WeightedGaussian {
            sigma: 1.0,
            power: -1.0,
            weight: 1.0,
        };
        assert!(spec.validate().is_err());
        let unit = HostUnit::new(0, DEFAULT_WORK_GROUP);
        let result = Kernel::new(unit, &spec, Precision::Double, TileRequest::Auto);
        assert_eq!(result.err().unwrap().class(), crate::ErrorClass::Config);
    }
}
