mod common;

use common::{isclose, random_diagrams, write_diagram, write_list};
use pdkernel::app::execute;
use pdkernel::{
    ErrorClass, KernelSpec, OutputTarget, Precision, RunOptions, TileRequest, TileShape,
    UnitSelection,
};
use std::num::NonZeroUsize;
use std::path::PathBuf;

fn options(lists: [PathBuf; 2], output: PathBuf) -> RunOptions {
    let mut opts = RunOptions::new(KernelSpec::Heat { sigma: 1.0 }, 10.0, 1, lists);
    opts.n_units = NonZeroUsize::new(2);
    opts.precision = Precision::Double;
    opts.output = OutputTarget::File(output);
    opts
}

fn read_matrix(path: &PathBuf) -> Vec<Vec<f64>> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line.split(' ').map(|v| v.parse().unwrap()).collect())
        .collect()
}

#[test]
fn writes_single_value() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_diagram(dir.path(), "a.dipha", &[(0.0, 1.0)]);
    let list = write_list(dir.path(), "list.txt", &[a]);
    let out = dir.path().join("k.txt");

    let summary = execute(&options([list.clone(), list], out.clone())).unwrap();
    assert_eq!(summary.shape, [1, 1]);
    assert_eq!(summary.computed_cells, 1);
    assert_eq!(summary.n_units, 2);

    let matrix = read_matrix(&out);
    let expected = (1.0 - (-0.25_f64).exp()) / (8.0 * std::f64::consts::PI);
    assert_eq!(matrix.len(), 1);
    assert!(isclose(matrix[0][0], expected, 1e-14, 0.0));
}

#[test]
fn rectangular_matrix_layout() {
    let dir = tempfile::tempdir().unwrap();
    let left = random_diagrams(dir.path(), "l", 2, 1);
    let right = random_diagrams(dir.path(), "r", 3, 2);
    let left_list = write_list(dir.path(), "left.txt", &left);
    let right_list = write_list(dir.path(), "right.txt", &right);
    let out = dir.path().join("k.txt");

    let mut opts = options([left_list.clone(), right_list.clone()], out.clone());
    opts.tile = TileRequest::Explicit(TileShape::new(2, 4).unwrap());
    let summary = execute(&opts).unwrap();
    assert_eq!(summary.shape, [2, 3]);
    assert_eq!(summary.computed_cells, 6);

    let matrix = read_matrix(&out);
    assert_eq!(matrix.len(), 2);
    assert!(matrix.iter().all(|row| row.len() == 3));

    // swapping the lists transposes the matrix
    let out_t = dir.path().join("k_t.txt");
    execute(&options([right_list, left_list], out_t.clone())).unwrap();
    let transposed = read_matrix(&out_t);
    for i in 0..2 {
        for j in 0..3 {
            assert!(isclose(transposed[j][i], matrix[i][j], 1e-12, 1e-15));
        }
    }
}

#[test]
fn file_list_skips_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let files = random_diagrams(dir.path(), "pd", 2, 4);
    let list = dir.path().join("list.txt");
    let contents = format!(
        "{}\n\n{}  \n\n",
        files[0].display(),
        files[1].display()
    );
    std::fs::write(&list, contents).unwrap();
    let out = dir.path().join("k.txt");

    let summary = execute(&options([list.clone(), list], out)).unwrap();
    assert_eq!(summary.shape, [2, 2]);
    assert_eq!(summary.computed_cells, 3);
}

#[test]
fn missing_diagram_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = random_diagrams(dir.path(), "pd", 2, 5);
    files.insert(1, dir.path().join("missing.dipha"));
    let list = write_list(dir.path(), "list.txt", &files);
    let out = dir.path().join("k.txt");

    let err = execute(&options([list.clone(), list], out.clone())).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Run);
    assert!(
        err.unit_failures()
            .iter()
            .all(|f| f.class == ErrorClass::Load)
    );
    assert!(!out.exists());
}

#[test]
fn bad_options() {
    let dir = tempfile::tempdir().unwrap();
    let files = random_diagrams(dir.path(), "pd", 1, 6);
    let list = write_list(dir.path(), "list.txt", &files);
    let empty = write_list(dir.path(), "empty.txt", &[]);
    let out = dir.path().join("k.txt");

    let mut opts = options([list.clone(), list.clone()], out.clone());
    opts.selection = UnitSelection::parse("5").unwrap();
    assert_eq!(execute(&opts).unwrap_err().class(), ErrorClass::Config);

    let opts = options([list.clone(), empty], out.clone());
    assert_eq!(execute(&opts).unwrap_err().class(), ErrorClass::Config);

    let opts = options([list, dir.path().join("nope.txt")], out.clone());
    assert_eq!(execute(&opts).unwrap_err().class(), ErrorClass::Io);
    assert!(!out.exists());
}
