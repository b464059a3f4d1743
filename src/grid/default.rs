//! The default grid
//!
//! Every process has at most one default grid. It spans the world communicator
//! registered with [`initialize`], uses column-major order and the most square
//! shape, and is created by the first call to [`default_grid`]. Later calls share
//! the same grid instead of splitting the world communicator again. [`finalize`]
//! releases it.
//!
//! One thread of control is one process, so the registry is thread-local. When
//! running on MPI, call [`finalize`] before the `mpi` universe is dropped.
use crate::comm::Communicator;
use crate::grid::ProcessGrid;
use crate::types::{GridError, GridOrder, Result};
use log::{debug, warn};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

enum Slot {
    Uninitialized,
    Pending(Box<dyn Any>),
    Ready {
        world: Box<dyn Any>,
        grid: Rc<dyn Any>,
    },
    Failed(GridError),
    Finalized,
}

thread_local! {
    static DEFAULT_GRID: RefCell<Slot> = RefCell::new(Slot::Uninitialized);
}

fn type_mismatch() -> GridError {
    GridError::InvalidArgument(
        "the default grid was initialized with a different communicator type".to_string(),
    )
}

/// Register the world communicator of the default grid.
///
/// No communication happens until the default grid is first requested.
pub fn initialize<C: Communicator + 'static>(world: C) -> Result<()> {
    DEFAULT_GRID.with(|cell| {
        let mut slot = cell.borrow_mut();
        match &*slot {
            Slot::Uninitialized => {}
            Slot::Finalized => return Err(GridError::UseAfterFree),
            _ => {
                return Err(GridError::InvalidArgument(
                    "the default grid is already initialized".to_string(),
                ))
            }
        }
        *slot = Slot::Pending(Box::new(world));
        Ok(())
    })
}

/// Whether a world communicator is registered and the default grid not yet finalized.
pub fn is_initialized() -> bool {
    DEFAULT_GRID.with(|slot| matches!(*slot.borrow(), Slot::Pending(_) | Slot::Ready { .. }))
}

/// Get the default grid, creating it on first use.
///
/// The first call is collective over the world communicator. A failed creation is
/// not retried.
pub fn default_grid<C>() -> Result<Rc<ProcessGrid<C>>>
where
    C: Communicator + 'static,
    C::Group: 'static,
{
    DEFAULT_GRID.with(|cell| {
        // Left in place if creating the grid panics
        let interrupted = Slot::Failed(GridError::CollectiveFailure(
            "creating the default grid panicked".to_string(),
        ));
        let (next, result) = match cell.replace(interrupted) {
            Slot::Ready { world, grid } => {
                let result = Rc::clone(&grid)
                    .downcast::<ProcessGrid<C>>()
                    .map_err(|_| type_mismatch());
                (Slot::Ready { world, grid }, result)
            }
            Slot::Pending(world) => match world.downcast::<C>() {
                Ok(world) => match ProcessGrid::new(&*world, GridOrder::ColumnMajor) {
                    Ok(grid) => {
                        let grid = Rc::new(grid);
                        let shared: Rc<dyn Any> = Rc::clone(&grid) as Rc<dyn Any>;
                        (
                            Slot::Ready {
                                world: world as Box<dyn Any>,
                                grid: shared,
                            },
                            Ok(grid),
                        )
                    }
                    Err(e) => (Slot::Failed(e.clone()), Err(e)),
                },
                Err(world) => (Slot::Pending(world), Err(type_mismatch())),
            },
            Slot::Uninitialized => (Slot::Uninitialized, Err(GridError::NotInitialized)),
            Slot::Failed(e) => {
                let result = Err(GridError::CollectiveFailure(format!(
                    "creating the default grid failed earlier: {e}"
                )));
                (Slot::Failed(e), result)
            }
            Slot::Finalized => (Slot::Finalized, Err(GridError::UseAfterFree)),
        };
        cell.replace(next);
        result
    })
}

/// Release the default grid and the world communicator.
///
/// Handles obtained from [`default_grid`] stay valid; the grid is released when the
/// last of them is dropped.
pub fn finalize() -> Result<()> {
    DEFAULT_GRID.with(|cell| match cell.replace(Slot::Finalized) {
        Slot::Uninitialized => {
            cell.replace(Slot::Uninitialized);
            Err(GridError::NotInitialized)
        }
        Slot::Finalized => Err(GridError::UseAfterFree),
        Slot::Ready { world, grid } => {
            let handles = Rc::strong_count(&grid) - 1;
            if handles > 0 {
                warn!("Finalizing the default grid while {handles} handles to it are still alive");
            }
            debug!("Finalizing the default grid");
            drop(grid);
            drop(world);
            Ok(())
        }
        Slot::Pending(_) | Slot::Failed(_) => Ok(()),
    })
}
