// the reason this is named mod.rs has to do with some complexities of how
// testing is handled
//
// we are following the advice of the rust book
// https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

#![allow(dead_code)]

use pdkernel::diagram::write_dipha;
use pdkernel::host::DEFAULT_WORK_GROUP;
use pdkernel::{
    DeviceError, DeviceStage, DiagramError, DiagramSource, DiphaSource, EntryPoint,
    ExecutionUnit, HostUnit, Interval, PairFunction, Point, PointBuffer, Real, TileShape,
    UnitInfo,
};
use pdkernel::device::WorkGroupInfo;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

// based on numpy!
// https://numpy.org/doc/stable/reference/generated/numpy.isclose.html
pub fn isclose(actual: f64, ref_val: f64, rtol: f64, atol: f64) -> bool {
    let actual_nan = actual.is_nan();
    let ref_nan = ref_val.is_nan();
    if actual_nan || ref_nan {
        actual_nan && ref_nan
    } else {
        (actual - ref_val).abs() <= (atol + rtol * ref_val.abs())
    }
}

/// writes a diagram holding finite intervals of degree 1
pub fn write_diagram(dir: &Path, name: &str, points: &[(f64, f64)]) -> PathBuf {
    let intervals: Vec<Interval> = points
        .iter()
        .map(|&(birth, death)| Interval {
            dim: 1,
            birth,
            death,
        })
        .collect();
    write_intervals(dir, name, &intervals)
}

pub fn write_intervals(dir: &Path, name: &str, intervals: &[Interval]) -> PathBuf {
    let path = dir.join(name);
    write_dipha(&path, intervals).unwrap();
    path
}

/// writes a file list (one path per line)
pub fn write_list(dir: &Path, name: &str, paths: &[PathBuf]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for p in paths {
        writeln!(file, "{}", p.display()).unwrap();
    }
    path
}

/// writes `n` seeded random diagrams (with degree 1 intervals)
pub fn random_diagrams(dir: &Path, prefix: &str, n: usize, seed: u64) -> Vec<PathBuf> {
    (0..n)
        .map(|i| {
            let path = dir.join(format!("{prefix}{i}.dipha"));
            // vary the number of points, so that padding differs per diagram
            pdkernel::app::generate(&path, 3 + 5 * i, 1, 0.1, seed + i as u64).unwrap();
            path
        })
        .collect()
}

pub fn host_units(n: usize) -> Vec<HostUnit> {
    (0..n).map(|i| HostUnit::new(i, DEFAULT_WORK_GROUP)).collect()
}

/// evaluates a kernel directly (no tiling, no padding) in double precision
pub fn direct_kernel<F: PairFunction<f64>>(
    pair_fn: &F,
    left: &[Point<f64>],
    right: &[Point<f64>],
) -> f64 {
    let mut sum = 0.0;
    for p in left {
        for q in right {
            sum += pair_fn.contribution(p, q);
        }
    }
    sum * pair_fn.global_prefactor()
}

pub fn read_points(path: &Path, degree: u32, finitization: f64) -> Vec<Point<f64>> {
    DiphaSource.read(path, degree, finitization).unwrap()
}

/// A diagram source that counts how often each file gets read
#[derive(Default)]
pub struct CountingSource {
    reads: Mutex<HashMap<PathBuf, usize>>,
}

impl CountingSource {
    pub fn total_reads(&self) -> usize {
        self.reads.lock().unwrap().values().sum()
    }

    pub fn reads_of(&self, path: &Path) -> usize {
        self.reads.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

impl DiagramSource for CountingSource {
    fn read(
        &self,
        path: &Path,
        degree: u32,
        finitization: f64,
    ) -> Result<Vec<Point<f64>>, DiagramError> {
        *self
            .reads
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_insert(0) += 1;
        DiphaSource.read(path, degree, finitization)
    }
}

/// The fault that a [`FaultyUnit`] injects
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    None,
    /// kernel construction fails
    Build,
    /// reporting the work-group limits fails
    Query,
    /// every launch after the first `after` launches fails
    Launch { after: usize },
}

/// Wraps a host unit and injects a fault.
///
/// A unit built with [`FaultyUnit::wait_for`] blocks in its first launch
/// until the flag is raised (another unit raises it when its fault fires).
/// That way a test can be sure that the faulty unit got to claim a pair.
pub struct FaultyUnit {
    inner: HostUnit,
    fault: Fault,
    launches: usize,
    fired: Arc<AtomicBool>,
    wait: Option<Arc<AtomicBool>>,
}

impl FaultyUnit {
    pub fn new(index: usize, fault: Fault, fired: Arc<AtomicBool>) -> Self {
        FaultyUnit {
            inner: HostUnit::new(index, DEFAULT_WORK_GROUP),
            fault,
            launches: 0,
            fired,
            wait: None,
        }
    }

    pub fn healthy(index: usize) -> Self {
        FaultyUnit::new(index, Fault::None, Arc::new(AtomicBool::new(false)))
    }

    pub fn wait_for(mut self, flag: Arc<AtomicBool>) -> Self {
        self.wait = Some(flag);
        self
    }
}

impl ExecutionUnit for FaultyUnit {
    fn info(&self) -> UnitInfo {
        self.inner.info()
    }

    fn build_entry(&mut self, entry: EntryPoint) -> Result<(), DeviceError> {
        if let Fault::Build = self.fault {
            return Err(DeviceError::new(DeviceStage::Build, "injected build failure"));
        }
        self.inner.build_entry(entry)
    }

    fn work_group_info(&self, entry: EntryPoint) -> Result<WorkGroupInfo, DeviceError> {
        if let Fault::Query = self.fault {
            return Err(DeviceError::new(DeviceStage::Query, "injected query failure"));
        }
        self.inner.work_group_info(entry)
    }

    fn upload<T: Real>(&mut self, points: &[Point<T>]) -> Result<PointBuffer<T>, DeviceError> {
        self.inner.upload(points)
    }

    fn launch<T: Real, F: PairFunction<T>>(
        &mut self,
        pair_fn: &F,
        left: &PointBuffer<T>,
        right: &PointBuffer<T>,
        tile: TileShape,
        partial_sums: &mut [T],
    ) -> Result<(), DeviceError> {
        if let Some(flag) = self.wait.take() {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !flag.load(Ordering::Acquire) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        if let Fault::Launch { after } = self.fault {
            if self.launches >= after {
                self.fired.store(true, Ordering::Release);
                return Err(DeviceError::new(DeviceStage::Launch, "injected launch failure"));
            }
        }
        self.launches += 1;
        self.inner.launch(pair_fn, left, right, tile, partial_sums)
    }
}
