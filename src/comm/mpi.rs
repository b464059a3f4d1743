//! Transport backed by MPI
use crate::comm::{Communicator, ProcessGroup};
use crate::types::{GridError, Result};
use ::mpi::topology::{Color, SimpleCommunicator, UserGroup};
use ::mpi::traits::{Communicator as MpiCommunicator, Group as MpiGroup};
use ::mpi::Rank;

fn to_rank(value: usize) -> Result<Rank> {
    Rank::try_from(value).map_err(|_| {
        GridError::InvalidArgument(format!("{value} does not fit into an MPI rank"))
    })
}

fn from_rank(rank: Rank) -> usize {
    // MPI ranks and sizes are never negative
    rank as usize
}

impl ProcessGroup for UserGroup {
    fn size(&self) -> usize {
        from_rank(MpiGroup::size(self))
    }

    fn rank(&self) -> Option<usize> {
        MpiGroup::rank(self).map(from_rank)
    }

    fn translate_rank(&self, rank: usize, other: &Self) -> Option<usize> {
        let rank = to_rank(rank).ok()?;
        MpiGroup::translate_rank(self, rank, other).map(from_rank)
    }

    fn include(&self, ranks: &[usize]) -> Result<Self> {
        let size = ProcessGroup::size(self);
        if let Some(rank) = ranks.iter().find(|&&rank| rank >= size) {
            return Err(GridError::InvalidArgument(format!(
                "rank {rank} is outside a group of {size} processes"
            )));
        }
        let ranks = ranks
            .iter()
            .map(|&rank| to_rank(rank))
            .collect::<Result<Vec<_>>>()?;
        Ok(MpiGroup::include(self, &ranks))
    }
}

impl Communicator for SimpleCommunicator {
    type Group = UserGroup;

    fn rank(&self) -> usize {
        from_rank(MpiCommunicator::rank(self))
    }

    fn size(&self) -> usize {
        from_rank(MpiCommunicator::size(self))
    }

    fn group(&self) -> UserGroup {
        MpiCommunicator::group(self)
    }

    fn duplicate(&self) -> Result<Self> {
        Ok(MpiCommunicator::duplicate(self))
    }

    fn split(&self, color: Option<usize>, key: usize) -> Result<Option<Self>> {
        let color = match color {
            Some(color) => Color::with_value(to_rank(color)?),
            None => Color::undefined(),
        };
        Ok(MpiCommunicator::split_by_color_with_key(
            self,
            color,
            to_rank(key)?,
        ))
    }

    fn create_from_group(&self, group: &UserGroup) -> Result<Option<Self>> {
        Ok(MpiCommunicator::split_by_subgroup_collective(self, group))
    }
}
