//! Message-passing transport used to build process grids
//!
//! A grid only needs a handful of capabilities from its transport: rank and size
//! queries, groups with rank translation, and the collective calls that derive
//! sub-communicators. Handles are released when they are dropped.
pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi;

use crate::types::Result;

/// An ordered set of processes.
pub trait ProcessGroup: Sized {
    /// Number of processes in the group.
    fn size(&self) -> usize;

    /// Rank of the calling process in the group, or `None` if it is not a member.
    fn rank(&self) -> Option<usize>;

    /// Rank in `other` of the process with rank `rank` in this group.
    ///
    /// Returns `None` if that process is not a member of `other`.
    fn translate_rank(&self, rank: usize, other: &Self) -> Option<usize>;

    /// The subgroup made of the given ranks of this group, in the given order.
    fn include(&self, ranks: &[usize]) -> Result<Self>;
}

/// A communication context shared by a group of processes.
///
/// `duplicate`, `split` and `create_from_group` are collective: every process of
/// the communicator must make the same sequence of calls.
pub trait Communicator: Sized {
    /// The group type of the communicator.
    type Group: ProcessGroup;

    /// Rank of the calling process.
    fn rank(&self) -> usize;

    /// Number of processes.
    fn size(&self) -> usize;

    /// The group of processes in this communicator.
    fn group(&self) -> Self::Group;

    /// Create a new communicator with the same processes and a separate context.
    fn duplicate(&self) -> Result<Self>;

    /// Partition the processes by `color`, ranking each part by `key`.
    ///
    /// Ties in `key` are broken by the rank in this communicator. Processes passing
    /// `None` as their color do not join any part and receive `None`.
    fn split(&self, color: Option<usize>, key: usize) -> Result<Option<Self>>;

    /// Create a communicator from a subgroup of this communicator's group.
    ///
    /// Processes outside `group` receive `None`.
    fn create_from_group(&self, group: &Self::Group) -> Result<Option<Self>>;
}
