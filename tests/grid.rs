use procgrid::comm::local::{LocalComm, LocalUniverse};
use procgrid::comm::{Communicator, ProcessGroup};
use procgrid::{GridError, GridOrder, ProcessGrid};

fn position(comm: Option<&LocalComm>) -> Option<(usize, usize)> {
    comm.map(|c| (c.rank(), c.size()))
}

fn members(comm: Option<&LocalComm>) -> Vec<usize> {
    comm.map(|c| c.group().members().to_vec())
        .unwrap_or_default()
}

#[test]
fn test_column_major_grid_of_twelve() {
    let results = LocalUniverse::new(12).run(|world| {
        let grid = ProcessGrid::new(&world, GridOrder::ColumnMajor).unwrap();
        assert_eq!(grid.height().unwrap(), 3);
        assert_eq!(grid.width().unwrap(), 4);
        assert_eq!(grid.size().unwrap(), 12);
        assert_eq!(grid.gcd().unwrap(), 1);
        assert_eq!(grid.lcm().unwrap(), 12);
        assert!(grid.in_grid().unwrap());
        assert!(!grid.have_viewers().unwrap());
        for vc in 0..12 {
            assert_eq!(grid.vc_to_viewing(vc).unwrap(), vc);
        }
        (
            grid.coordinates().unwrap(),
            grid.rank().unwrap(),
            grid.vc_rank().unwrap(),
            grid.vr_rank().unwrap(),
            position(grid.mc_comm().unwrap()),
            position(grid.mr_comm().unwrap()),
            position(grid.vc_comm().unwrap()),
            position(grid.vr_comm().unwrap()),
            position(grid.md_perp_comm().unwrap()),
        )
    });

    for (rank, (coordinates, grid_rank, vc, vr, mc, mr, vc_comm, vr_comm, md_perp)) in
        results.into_iter().enumerate()
    {
        let (row, col) = (rank % 3, rank / 3);
        assert_eq!(coordinates, (row, col));
        assert_eq!(grid_rank, Some(rank));
        assert_eq!(vc, Some(rank));
        assert_eq!(vr, Some(col + row * 4));
        assert_eq!(mc, Some((row, 3)));
        assert_eq!(mr, Some((col, 4)));
        assert_eq!(vc_comm, Some((rank, 12)));
        assert_eq!(vr_comm, Some((col + row * 4, 12)));
        assert_eq!(md_perp, Some((0, 1)));
    }
}

#[test]
fn test_row_major_grid() {
    let results = LocalUniverse::new(6).run(|world| {
        let grid = ProcessGrid::with_height(&world, 2, GridOrder::RowMajor).unwrap();
        assert_eq!(grid.order().unwrap(), GridOrder::RowMajor);
        assert_eq!(grid.mc_size().unwrap(), 2);
        assert_eq!(grid.mr_size().unwrap(), 3);
        let viewing = (0..6)
            .map(|vc| grid.vc_to_viewing(vc).unwrap())
            .collect::<Vec<_>>();
        (
            grid.row().unwrap(),
            grid.col().unwrap(),
            grid.vc_rank().unwrap(),
            grid.vr_rank().unwrap(),
            position(grid.mc_comm().unwrap()),
            position(grid.mr_comm().unwrap()),
            viewing,
        )
    });

    for (rank, (row, col, vc, vr, mc, mr, viewing)) in results.into_iter().enumerate() {
        let (r, c) = (rank / 3, rank % 3);
        assert_eq!((row, col), (Some(r), Some(c)));
        assert_eq!(vc, Some(r + c * 2));
        assert_eq!(vr, Some(rank));
        assert_eq!(mc, Some((r, 2)));
        assert_eq!(mr, Some((c, 3)));
        // VC rank v sits at (v % 2, v / 2), whose owning rank is its VR rank
        assert_eq!(viewing, vec![0, 3, 1, 4, 2, 5]);
    }
}

#[test]
fn test_row_and_column_communicators_differ() {
    let results = LocalUniverse::new(6).run(|world| {
        let grid = ProcessGrid::new(&world, GridOrder::ColumnMajor).unwrap();
        (
            members(grid.col_comm().unwrap()),
            members(grid.row_comm().unwrap()),
        )
    });
    // 2 x 3 column-major grid: columns are {0, 1}, {2, 3}, {4, 5}
    assert_eq!(results[2].0, vec![2, 3]);
    assert_eq!(results[2].1, vec![0, 2, 4]);
    assert_eq!(results[5].0, vec![4, 5]);
    assert_eq!(results[5].1, vec![1, 3, 5]);
}

#[test]
fn test_diagonal_communicators() {
    let results = LocalUniverse::new(24).run(|world| {
        let grid = ProcessGrid::with_height(&world, 4, GridOrder::ColumnMajor).unwrap();
        assert_eq!(grid.gcd().unwrap(), 2);
        assert_eq!(grid.lcm().unwrap(), 12);
        let vc = grid.vc_rank().unwrap().unwrap();
        let md = grid.md_comm().unwrap().unwrap();
        let md_perp = grid.md_perp_comm().unwrap().unwrap();
        assert_eq!(md.size(), grid.md_size().unwrap());
        assert_eq!(md_perp.size(), grid.md_perp_size().unwrap());
        assert_eq!(Some(md.rank()), grid.md_rank().unwrap());
        assert_eq!(Some(md_perp.rank()), grid.md_perp_rank().unwrap());
        assert_eq!(md.rank(), grid.diag_path_rank(vc).unwrap());
        assert_eq!(md_perp.rank(), grid.diag_path(vc).unwrap());

        let path = grid.diag_path(vc).unwrap();
        for (k, member) in md.group().members().iter().enumerate() {
            // world ranks are VC ranks in a column-major grid over the world
            assert_eq!(grid.diag_path(*member).unwrap(), path);
            assert_eq!(grid.diag_path_rank(*member).unwrap(), k);
        }
        for (d, member) in md_perp.group().members().iter().enumerate() {
            assert_eq!(grid.diag_path(*member).unwrap(), d);
            assert_eq!(
                grid.diag_path_rank(*member).unwrap(),
                grid.diag_path_rank(vc).unwrap()
            );
        }
        path
    });
    assert_eq!(results.iter().filter(|&&path| path == 0).count(), 12);
    assert_eq!(results.iter().filter(|&&path| path == 1).count(), 12);
}

#[test]
fn test_diagonal_queries_on_three_by_four() {
    LocalUniverse::new(12).run(|world| {
        let grid = ProcessGrid::new(&world, GridOrder::ColumnMajor).unwrap();
        assert_eq!(grid.shape().unwrap().vc_to_coordinates(5).unwrap(), (2, 1));
        assert_eq!(grid.diag_path(5).unwrap(), 0);
        assert_eq!(grid.first_vc_rank(0).unwrap(), 0);
        assert!(matches!(
            grid.first_vc_rank(1),
            Err(GridError::InvalidArgument(_))
        ));
        assert!(matches!(
            grid.diag_path(12),
            Err(GridError::InvalidArgument(_))
        ));
    });
}

#[test]
fn test_invalid_height() {
    let results = LocalUniverse::new(12).run(|world| {
        (
            ProcessGrid::with_height(&world, 5, GridOrder::ColumnMajor).err(),
            ProcessGrid::with_height(&world, 0, GridOrder::RowMajor).err(),
        )
    });
    for (five, zero) in results {
        assert!(matches!(five, Some(GridError::InvalidArgument(_))));
        assert!(matches!(zero, Some(GridError::InvalidArgument(_))));
    }
}

#[test]
fn test_prime_and_single_process_grids() {
    let shapes = LocalUniverse::new(7).run(|world| {
        let grid = ProcessGrid::new(&world, GridOrder::ColumnMajor).unwrap();
        (grid.height().unwrap(), grid.width().unwrap(), grid.col().unwrap())
    });
    for (rank, shape) in shapes.into_iter().enumerate() {
        assert_eq!(shape, (1, 7, Some(rank)));
    }

    let solo = LocalComm::solo();
    let grid = ProcessGrid::new(&solo, GridOrder::RowMajor).unwrap();
    assert_eq!(grid.coordinates().unwrap(), (0, 0));
    assert_eq!(grid.md_size().unwrap(), 1);
    assert_eq!(position(grid.md_comm().unwrap()), Some((0, 1)));
    assert_eq!(grid.viewing_rank().unwrap(), 0);
}

#[test]
fn test_viewers() {
    let results = LocalUniverse::new(6).run(|world| {
        let owners = world.group().include(&[5, 3, 1, 0]).unwrap();
        let grid = ProcessGrid::with_viewers(&world, owners, 2, GridOrder::ColumnMajor).unwrap();
        assert_eq!(grid.height().unwrap(), 2);
        assert_eq!(grid.width().unwrap(), 2);
        assert!(grid.have_viewers().unwrap());
        assert_eq!(grid.viewing_rank().unwrap(), world.rank());
        assert_eq!(grid.viewing_comm().unwrap().size(), 6);
        assert_eq!(grid.owning_group().unwrap().size(), 4);
        let viewing = (0..4)
            .map(|vc| grid.vc_to_viewing(vc).unwrap())
            .collect::<Vec<_>>();
        (
            grid.in_grid().unwrap(),
            grid.owning_rank().unwrap(),
            grid.row().unwrap(),
            grid.col().unwrap(),
            grid.coordinates().err(),
            position(grid.owning_comm().unwrap()),
            position(grid.vc_comm().unwrap()),
            viewing,
        )
    });

    let expected = [
        Some((3, 1, 1)),
        Some((2, 0, 1)),
        None,
        Some((1, 1, 0)),
        None,
        Some((0, 0, 0)),
    ];
    for (result, expected) in results.into_iter().zip(expected) {
        let (in_grid, owning_rank, row, col, strict, owning, vc, viewing) = result;
        assert_eq!(viewing, vec![5, 3, 1, 0]);
        match expected {
            Some((rank, r, c)) => {
                assert!(in_grid);
                assert_eq!(owning_rank, Some(rank));
                assert_eq!((row, col), (Some(r), Some(c)));
                assert_eq!(strict, None);
                assert_eq!(owning, Some((rank, 4)));
                assert_eq!(vc, Some((r + 2 * c, 4)));
            }
            None => {
                assert!(!in_grid);
                assert_eq!(owning_rank, None);
                assert_eq!((row, col), (None, None));
                assert_eq!(strict, Some(GridError::NotInGrid));
                assert_eq!(owning, None);
                assert_eq!(vc, None);
            }
        }
    }
}

#[test]
fn test_viewers_require_valid_owners() {
    LocalUniverse::new(4).run(|world| {
        let owners = world.group().include(&[0, 1, 2]).unwrap();
        assert!(matches!(
            ProcessGrid::with_viewers(&world, owners, 2, GridOrder::ColumnMajor),
            Err(GridError::InvalidArgument(_))
        ));
        let nobody = world.group().include(&[]).unwrap();
        assert!(matches!(
            ProcessGrid::with_viewers(&world, nobody, 1, GridOrder::ColumnMajor),
            Err(GridError::InvalidArgument(_))
        ));
    });
}

#[test]
fn test_use_after_destroy() {
    LocalUniverse::new(4).run(|world| {
        let mut grid = ProcessGrid::new(&world, GridOrder::ColumnMajor).unwrap();
        assert!(matches!(
            grid.vc_to_viewing(4),
            Err(GridError::InvalidArgument(_))
        ));
        grid.destroy().unwrap();

        assert_eq!(grid.row(), Err(GridError::UseAfterFree));
        assert_eq!(grid.height(), Err(GridError::UseAfterFree));
        assert_eq!(grid.in_grid(), Err(GridError::UseAfterFree));
        assert_eq!(grid.vc_to_viewing(0), Err(GridError::UseAfterFree));
        assert_eq!(grid.diag_path(0), Err(GridError::UseAfterFree));
        assert_eq!(grid.first_vc_rank(0), Err(GridError::UseAfterFree));
        assert!(matches!(grid.mc_comm(), Err(GridError::UseAfterFree)));
        assert!(matches!(grid.viewing_comm(), Err(GridError::UseAfterFree)));
        assert_eq!(grid.destroy(), Err(GridError::UseAfterFree));
        assert_eq!(format!("{grid:?}"), "ProcessGrid(destroyed)");
    });
}
