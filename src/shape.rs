//! Grid shapes and the rank numberings defined on them
//!
//! A grid of `height x width` processes carries several linear numberings of its
//! positions. All of them are pure functions of the shape and are collected here:
//!
//! - VC (vector column-major): `vc = row + col * height`
//! - VR (vector row-major): `vr = col + row * width`
//! - owning: the canonical numbering, equal to VC for column-major grids and to VR
//!   for row-major grids
//! - diagonal paths: process `(row, col)` lies on path `(col - row) mod gcd`, and the
//!   path `d` is walked as `(k mod height, (d + k) mod width)` for `k` in `0..lcm`
use crate::factor::{find_factor, gcd, lcm};
use crate::types::{GridError, GridOrder, Result};
use std::fmt;

/// The shape of a process grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridShape {
    height: usize,
    width: usize,
    order: GridOrder,
}

impl GridShape {
    /// Create a shape with the given height and width.
    pub fn new(height: usize, width: usize, order: GridOrder) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(GridError::InvalidArgument(format!(
                "grid dimensions must be positive, got {height} x {width}"
            )));
        }
        Ok(Self {
            height,
            width,
            order,
        })
    }

    /// Create the most square shape for `size` processes.
    pub fn from_size(size: usize, order: GridOrder) -> Result<Self> {
        let height = find_factor(size)?;
        Self::new(height, size / height, order)
    }

    /// Create a shape for `size` processes with a prescribed height.
    pub fn with_height(size: usize, height: usize, order: GridOrder) -> Result<Self> {
        if height == 0 {
            return Err(GridError::InvalidArgument(
                "grid height must be positive".to_string(),
            ));
        }
        if size % height != 0 {
            return Err(GridError::InvalidArgument(format!(
                "grid height {height} does not divide the number of processes {size}"
            )));
        }
        Self::new(height, size / height, order)
    }

    /// Number of process rows
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of process columns
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of processes in the grid
    pub fn size(&self) -> usize {
        self.height * self.width
    }

    /// Order of the canonical numbering
    pub fn order(&self) -> GridOrder {
        self.order
    }

    /// Greatest common divisor of height and width, also the number of diagonal paths.
    pub fn gcd(&self) -> usize {
        gcd(self.height, self.width)
    }

    /// Least common multiple of height and width, also the length of a diagonal path.
    pub fn lcm(&self) -> usize {
        lcm(self.height, self.width)
    }

    fn check_rank(&self, rank: usize, scheme: &str) -> Result<()> {
        if rank >= self.size() {
            return Err(GridError::InvalidArgument(format!(
                "{scheme} rank {rank} is outside a grid of {} processes",
                self.size()
            )));
        }
        Ok(())
    }

    fn check_coordinates(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.height || col >= self.width {
            return Err(GridError::InvalidArgument(format!(
                "coordinates ({row}, {col}) are outside a {} x {} grid",
                self.height, self.width
            )));
        }
        Ok(())
    }

    /// Row and column of the process with the given VC rank.
    pub fn vc_to_coordinates(&self, vc_rank: usize) -> Result<(usize, usize)> {
        self.check_rank(vc_rank, "VC")?;
        Ok((vc_rank % self.height, vc_rank / self.height))
    }

    /// Row and column of the process with the given VR rank.
    pub fn vr_to_coordinates(&self, vr_rank: usize) -> Result<(usize, usize)> {
        self.check_rank(vr_rank, "VR")?;
        Ok((vr_rank / self.width, vr_rank % self.width))
    }

    /// VC rank of the process at `(row, col)`.
    pub fn coordinates_to_vc(&self, row: usize, col: usize) -> Result<usize> {
        self.check_coordinates(row, col)?;
        Ok(row + col * self.height)
    }

    /// VR rank of the process at `(row, col)`.
    pub fn coordinates_to_vr(&self, row: usize, col: usize) -> Result<usize> {
        self.check_coordinates(row, col)?;
        Ok(col + row * self.width)
    }

    /// Convert a VC rank into a VR rank.
    pub fn vc_to_vr(&self, vc_rank: usize) -> Result<usize> {
        let (row, col) = self.vc_to_coordinates(vc_rank)?;
        self.coordinates_to_vr(row, col)
    }

    /// Convert a VR rank into a VC rank.
    pub fn vr_to_vc(&self, vr_rank: usize) -> Result<usize> {
        let (row, col) = self.vr_to_coordinates(vr_rank)?;
        self.coordinates_to_vc(row, col)
    }

    /// Row and column of the process with the given canonical (owning) rank.
    pub fn owning_to_coordinates(&self, rank: usize) -> Result<(usize, usize)> {
        match self.order {
            GridOrder::ColumnMajor => self.vc_to_coordinates(rank),
            GridOrder::RowMajor => self.vr_to_coordinates(rank),
        }
    }

    /// Canonical (owning) rank of the process at `(row, col)`.
    pub fn coordinates_to_owning(&self, row: usize, col: usize) -> Result<usize> {
        match self.order {
            GridOrder::ColumnMajor => self.coordinates_to_vc(row, col),
            GridOrder::RowMajor => self.coordinates_to_vr(row, col),
        }
    }

    /// Canonical (owning) rank of the process with the given VC rank.
    pub fn vc_to_owning(&self, vc_rank: usize) -> Result<usize> {
        let (row, col) = self.vc_to_coordinates(vc_rank)?;
        self.coordinates_to_owning(row, col)
    }

    /// VC rank of the process with the given canonical (owning) rank.
    pub fn owning_to_vc(&self, rank: usize) -> Result<usize> {
        let (row, col) = self.owning_to_coordinates(rank)?;
        self.coordinates_to_vc(row, col)
    }

    /// Diagonal path through `(row, col)`.
    pub fn diag_path_of(&self, row: usize, col: usize) -> Result<usize> {
        self.check_coordinates(row, col)?;
        let g = self.gcd();
        Ok((col % g + g - row % g) % g)
    }

    /// Position of `(row, col)` along its diagonal path.
    pub fn diag_path_rank_of(&self, row: usize, col: usize) -> Result<usize> {
        let path = self.diag_path_of(row, col)?;
        // Steps landing on `row` are `row + t * height`; one of them also lands on `col`.
        (0..self.width / self.gcd())
            .map(|t| row + t * self.height)
            .find(|k| (path + k) % self.width == col)
            .ok_or_else(|| {
                GridError::InvalidArgument(format!(
                    "({row}, {col}) is not reached by diagonal path {path}"
                ))
            })
    }

    /// Diagonal path of the process with the given VC rank.
    pub fn diag_path(&self, vc_rank: usize) -> Result<usize> {
        let (row, col) = self.vc_to_coordinates(vc_rank)?;
        self.diag_path_of(row, col)
    }

    /// Position of the process with the given VC rank along its diagonal path.
    pub fn diag_path_rank(&self, vc_rank: usize) -> Result<usize> {
        let (row, col) = self.vc_to_coordinates(vc_rank)?;
        self.diag_path_rank_of(row, col)
    }

    /// Smallest VC rank lying on the given diagonal path.
    ///
    /// The smallest VC rank sits in column zero, in the first row `r` with
    /// `(0 - r) mod gcd == diag_path`.
    pub fn first_vc_rank(&self, diag_path: usize) -> Result<usize> {
        let g = self.gcd();
        if diag_path >= g {
            return Err(GridError::InvalidArgument(format!(
                "diagonal path {diag_path} is outside the {g} paths of the grid"
            )));
        }
        Ok((g - diag_path) % g)
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} {} grid", self.height, self.width, self.order)
    }
}
