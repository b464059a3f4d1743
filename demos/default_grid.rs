//? mpirun -n {{NPROCESSES}} --features "mpi"

#[cfg(feature = "mpi")]
fn print_default_grid() {
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use procgrid::grid::default::{default_grid, finalize, initialize};

    // Setup an MPI environment
    let universe: Universe = mpi::initialize().unwrap();
    initialize(universe.world()).unwrap();

    let grid = default_grid::<SimpleCommunicator>().unwrap();
    let (row, col) = grid.coordinates().unwrap();
    println!(
        "Process {} of a {} x {} grid: row {row}, col {col}, VR rank {}, diagonal path {} (position {})",
        grid.rank().unwrap().unwrap(),
        grid.height().unwrap(),
        grid.width().unwrap(),
        grid.vr_rank().unwrap().unwrap(),
        grid.md_perp_rank().unwrap().unwrap(),
        grid.md_rank().unwrap().unwrap(),
    );

    drop(grid);
    // The default grid must be released before MPI is finalized
    finalize().unwrap();
}

#[cfg(feature = "mpi")]
fn main() {
    print_default_grid();
}

#[cfg(not(feature = "mpi"))]
fn main() {}
