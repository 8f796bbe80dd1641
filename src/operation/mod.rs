//! Operation lifecycle shared by every export and copy action.

pub mod machine;
pub mod timer;

pub use machine::{
    GENERIC_ERROR_MESSAGE, Operation, OperationState, ResetDelays, UNEXPECTED_ERROR_MESSAGE,
};
pub use timer::{Clock, ManualClock, SystemClock, TimerId, TimerQueue};
