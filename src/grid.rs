//! Process grids
//!
//! A [`ProcessGrid`] arranges the processes of an owning group as a
//! `height x width` grid and derives the communicators that dense distributions
//! use: the column (MC) and row (MR) communicators, the vectorized VC and VR
//! communicators spanning the grid, and the diagonal MD communicator with its
//! perpendicular complement.
//!
//! Grids may be viewed by processes that do not own a position in them. Such
//! viewers see the shape and the rank translations, but every rank and
//! communicator specific to a grid position is `None` for them.
pub mod default;

use crate::comm::{Communicator, ProcessGroup};
use crate::shape::GridShape;
use crate::types::{GridError, GridOrder, Result};
use log::{debug, trace, warn};
use std::fmt;

/// The communicators derived from the owning communicator of a grid.
struct DerivedComms<C: Communicator> {
    mc: C,
    mr: C,
    vc: C,
    vr: C,
    md: C,
    md_perp: C,
}

/// Position and communicators of a process that owns part of the grid.
struct Membership<C: Communicator> {
    row: usize,
    col: usize,
    owning_comm: C,
    comms: DerivedComms<C>,
}

struct GridState<C: Communicator> {
    shape: GridShape,
    viewing_comm: C,
    owning_group: C::Group,
    vc_to_viewing: Vec<usize>,
    membership: Option<Membership<C>>,
}

/// A 2D grid of processes.
pub struct ProcessGrid<C: Communicator> {
    state: Option<GridState<C>>,
}

impl<C: Communicator> fmt::Debug for ProcessGrid<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => f
                .debug_struct("ProcessGrid")
                .field("shape", &state.shape)
                .field(
                    "coordinates",
                    &state.membership.as_ref().map(|m| (m.row, m.col)),
                )
                .field("viewing_rank", &state.viewing_comm.rank())
                .finish(),
            None => f.write_str("ProcessGrid(destroyed)"),
        }
    }
}

fn split_required<C: Communicator>(
    comm: &C,
    color: usize,
    key: usize,
    name: &str,
) -> Result<C> {
    trace!("Splitting {name} communicator with color {color} and key {key}");
    comm.split(Some(color), key)?.ok_or_else(|| {
        GridError::CollectiveFailure(format!("split of the {name} communicator returned nothing"))
    })
}

impl<C: Communicator> DerivedComms<C> {
    fn new(owning_comm: &C, shape: &GridShape, row: usize, col: usize) -> Result<Self> {
        let vc_rank = shape.coordinates_to_vc(row, col)?;
        let vr_rank = shape.coordinates_to_vr(row, col)?;
        let path = shape.diag_path_of(row, col)?;
        let path_rank = shape.diag_path_rank_of(row, col)?;
        Ok(Self {
            mc: split_required(owning_comm, col, row, "MC")?,
            mr: split_required(owning_comm, row, col, "MR")?,
            vc: split_required(owning_comm, 0, vc_rank, "VC")?,
            vr: split_required(owning_comm, 0, vr_rank, "VR")?,
            md: split_required(owning_comm, path, path_rank, "MD")?,
            md_perp: split_required(owning_comm, path_rank, path, "MD perp")?,
        })
    }
}

impl<C: Communicator> ProcessGrid<C> {
    /// Create the most square grid over all processes of `comm`.
    ///
    /// This is a collective call over `comm`.
    pub fn new(comm: &C, order: GridOrder) -> Result<Self> {
        let shape = GridShape::from_size(comm.size(), order)?;
        if shape.height() == 1 && shape.size() > 3 {
            warn!(
                "Creating a grid over a prime number of processes ({}). The grid degenerates to a single row.",
                shape.size()
            );
        }
        Self::create(comm, None, shape)
    }

    /// Create a grid over all processes of `comm` with the given height.
    ///
    /// The height must divide the number of processes. This is a collective call
    /// over `comm`.
    pub fn with_height(comm: &C, height: usize, order: GridOrder) -> Result<Self> {
        let shape = GridShape::with_height(comm.size(), height, order)?;
        Self::create(comm, None, shape)
    }

    /// Create a grid owned by `owners` and viewed by every process of `viewing_comm`.
    ///
    /// `owners` must be a non-empty subgroup of the group of `viewing_comm` and
    /// `height` must divide its size. This is a collective call over `viewing_comm`.
    pub fn with_viewers(
        viewing_comm: &C,
        owners: C::Group,
        height: usize,
        order: GridOrder,
    ) -> Result<Self> {
        if owners.size() == 0 {
            return Err(GridError::InvalidArgument(
                "the owning group of a grid cannot be empty".to_string(),
            ));
        }
        let shape = GridShape::with_height(owners.size(), height, order)?;
        Self::create(viewing_comm, Some(owners), shape)
    }

    fn create(comm: &C, owners: Option<C::Group>, shape: GridShape) -> Result<Self> {
        let viewing_comm = comm.duplicate()?;
        let viewing_group = viewing_comm.group();
        let owning_group = match owners {
            Some(owners) => owners,
            None => viewing_comm.group(),
        };

        // Every viewer needs the translation, so it is computed from the groups alone.
        let vc_to_viewing = (0..shape.size())
            .map(|vc_rank| {
                let owning_rank = shape.vc_to_owning(vc_rank)?;
                owning_group
                    .translate_rank(owning_rank, &viewing_group)
                    .ok_or_else(|| {
                        GridError::InvalidArgument(format!(
                            "owning rank {owning_rank} is not part of the viewing communicator"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let membership = match viewing_comm.create_from_group(&owning_group)? {
            Some(owning_comm) => {
                let (row, col) = shape.owning_to_coordinates(owning_comm.rank())?;
                let comms = DerivedComms::new(&owning_comm, &shape, row, col)?;
                Some(Membership {
                    row,
                    col,
                    owning_comm,
                    comms,
                })
            }
            None => None,
        };

        debug!(
            "Created {shape} at viewing rank {} ({} owning and {} viewing processes)",
            viewing_comm.rank(),
            shape.size(),
            viewing_comm.size()
        );

        Ok(Self {
            state: Some(GridState {
                shape,
                viewing_comm,
                owning_group,
                vc_to_viewing,
                membership,
            }),
        })
    }

    /// Release every communicator and group held by the grid.
    ///
    /// Any later call on the grid fails with [`GridError::UseAfterFree`].
    pub fn destroy(&mut self) -> Result<()> {
        let state = self.state.take().ok_or(GridError::UseAfterFree)?;
        debug!(
            "Destroying {} at viewing rank {}",
            state.shape,
            state.viewing_comm.rank()
        );
        Ok(())
    }

    fn state(&self) -> Result<&GridState<C>> {
        self.state.as_ref().ok_or(GridError::UseAfterFree)
    }

    fn membership(&self) -> Result<Option<&Membership<C>>> {
        Ok(self.state()?.membership.as_ref())
    }

    fn derived(&self) -> Result<Option<&DerivedComms<C>>> {
        Ok(self.membership()?.map(|m| &m.comms))
    }

    /// The shape of the grid
    pub fn shape(&self) -> Result<&GridShape> {
        Ok(&self.state()?.shape)
    }

    /// Row of the calling process, `None` for viewers.
    pub fn row(&self) -> Result<Option<usize>> {
        Ok(self.membership()?.map(|m| m.row))
    }

    /// Column of the calling process, `None` for viewers.
    pub fn col(&self) -> Result<Option<usize>> {
        Ok(self.membership()?.map(|m| m.col))
    }

    /// Row and column of the calling process.
    ///
    /// Unlike [`row`](Self::row) and [`col`](Self::col), this fails with
    /// [`GridError::NotInGrid`] for viewers.
    pub fn coordinates(&self) -> Result<(usize, usize)> {
        self.membership()?
            .map(|m| (m.row, m.col))
            .ok_or(GridError::NotInGrid)
    }

    /// Rank of the calling process in the grid's canonical order, `None` for viewers.
    pub fn rank(&self) -> Result<Option<usize>> {
        self.owning_rank()
    }

    /// Number of process rows
    pub fn height(&self) -> Result<usize> {
        Ok(self.shape()?.height())
    }

    /// Number of process columns
    pub fn width(&self) -> Result<usize> {
        Ok(self.shape()?.width())
    }

    /// Number of processes owning the grid
    pub fn size(&self) -> Result<usize> {
        Ok(self.shape()?.size())
    }

    /// Order of the canonical numbering
    pub fn order(&self) -> Result<GridOrder> {
        Ok(self.shape()?.order())
    }

    /// Greatest common divisor of height and width
    pub fn gcd(&self) -> Result<usize> {
        Ok(self.shape()?.gcd())
    }

    /// Least common multiple of height and width
    pub fn lcm(&self) -> Result<usize> {
        Ok(self.shape()?.lcm())
    }

    /// Communicator of the processes in the calling process's column.
    pub fn col_comm(&self) -> Result<Option<&C>> {
        Ok(self.derived()?.map(|c| &c.mc))
    }

    /// Communicator of the processes in the calling process's row.
    pub fn row_comm(&self) -> Result<Option<&C>> {
        Ok(self.derived()?.map(|c| &c.mr))
    }

    /// Matrix column communicator, the same as [`col_comm`](Self::col_comm).
    pub fn mc_comm(&self) -> Result<Option<&C>> {
        self.col_comm()
    }

    /// Matrix row communicator, the same as [`row_comm`](Self::row_comm).
    pub fn mr_comm(&self) -> Result<Option<&C>> {
        self.row_comm()
    }

    /// Communicator over the whole grid ranked in VC order.
    pub fn vc_comm(&self) -> Result<Option<&C>> {
        Ok(self.derived()?.map(|c| &c.vc))
    }

    /// Communicator over the whole grid ranked in VR order.
    pub fn vr_comm(&self) -> Result<Option<&C>> {
        Ok(self.derived()?.map(|c| &c.vr))
    }

    /// Communicator of the processes on the calling process's diagonal path.
    pub fn md_comm(&self) -> Result<Option<&C>> {
        Ok(self.derived()?.map(|c| &c.md))
    }

    /// Communicator of the processes sharing the calling process's position along
    /// a diagonal path, one per path.
    pub fn md_perp_comm(&self) -> Result<Option<&C>> {
        Ok(self.derived()?.map(|c| &c.md_perp))
    }

    /// The owning communicator
    pub fn comm(&self) -> Result<Option<&C>> {
        self.owning_comm()
    }

    /// Rank in the matrix column communicator, which is the row.
    pub fn mc_rank(&self) -> Result<Option<usize>> {
        self.row()
    }

    /// Rank in the matrix row communicator, which is the column.
    pub fn mr_rank(&self) -> Result<Option<usize>> {
        self.col()
    }

    /// VC rank of the calling process
    pub fn vc_rank(&self) -> Result<Option<usize>> {
        let shape = self.shape()?;
        self.membership()?
            .map(|m| shape.coordinates_to_vc(m.row, m.col))
            .transpose()
    }

    /// VR rank of the calling process
    pub fn vr_rank(&self) -> Result<Option<usize>> {
        let shape = self.shape()?;
        self.membership()?
            .map(|m| shape.coordinates_to_vr(m.row, m.col))
            .transpose()
    }

    /// Rank of the calling process in the diagonal communicator.
    pub fn md_rank(&self) -> Result<Option<usize>> {
        let shape = self.shape()?;
        self.membership()?
            .map(|m| shape.diag_path_rank_of(m.row, m.col))
            .transpose()
    }

    /// Rank of the calling process in the perpendicular diagonal communicator.
    pub fn md_perp_rank(&self) -> Result<Option<usize>> {
        let shape = self.shape()?;
        self.membership()?
            .map(|m| shape.diag_path_of(m.row, m.col))
            .transpose()
    }

    /// Size of the matrix column communicator
    pub fn mc_size(&self) -> Result<usize> {
        self.height()
    }

    /// Size of the matrix row communicator
    pub fn mr_size(&self) -> Result<usize> {
        self.width()
    }

    /// Size of the VC communicator
    pub fn vc_size(&self) -> Result<usize> {
        self.size()
    }

    /// Size of the VR communicator
    pub fn vr_size(&self) -> Result<usize> {
        self.size()
    }

    /// Size of the diagonal communicator
    pub fn md_size(&self) -> Result<usize> {
        self.lcm()
    }

    /// Size of the perpendicular diagonal communicator
    pub fn md_perp_size(&self) -> Result<usize> {
        self.gcd()
    }

    /// Whether the calling process owns a position in the grid.
    pub fn in_grid(&self) -> Result<bool> {
        Ok(self.membership()?.is_some())
    }

    /// Whether some processes view the grid without owning a position in it.
    pub fn have_viewers(&self) -> Result<bool> {
        let state = self.state()?;
        Ok(state.viewing_comm.size() > state.shape.size())
    }

    /// Rank of the calling process in the owning group, `None` for viewers.
    pub fn owning_rank(&self) -> Result<Option<usize>> {
        Ok(self.state()?.owning_group.rank())
    }

    /// Rank of the calling process in the viewing communicator.
    pub fn viewing_rank(&self) -> Result<usize> {
        Ok(self.state()?.viewing_comm.rank())
    }

    /// Rank in the viewing communicator of the process with the given VC rank.
    pub fn vc_to_viewing(&self, vc_rank: usize) -> Result<usize> {
        let state = self.state()?;
        state.vc_to_viewing.get(vc_rank).copied().ok_or_else(|| {
            GridError::InvalidArgument(format!(
                "VC rank {vc_rank} is outside a grid of {} processes",
                state.shape.size()
            ))
        })
    }

    /// The group of processes owning the grid
    pub fn owning_group(&self) -> Result<&C::Group> {
        Ok(&self.state()?.owning_group)
    }

    /// The communicator of the processes owning the grid, `None` for viewers.
    pub fn owning_comm(&self) -> Result<Option<&C>> {
        Ok(self.membership()?.map(|m| &m.owning_comm))
    }

    /// The communicator of every process viewing the grid
    pub fn viewing_comm(&self) -> Result<&C> {
        Ok(&self.state()?.viewing_comm)
    }

    /// Diagonal path of the process with the given VC rank.
    pub fn diag_path(&self, vc_rank: usize) -> Result<usize> {
        self.shape()?.diag_path(vc_rank)
    }

    /// Position of the process with the given VC rank along its diagonal path.
    pub fn diag_path_rank(&self, vc_rank: usize) -> Result<usize> {
        self.shape()?.diag_path_rank(vc_rank)
    }

    /// Smallest VC rank on the given diagonal path.
    pub fn first_vc_rank(&self, diag_path: usize) -> Result<usize> {
        self.shape()?.first_vc_rank(diag_path)
    }
}
