pub mod counter;
pub mod status;

pub use counter::{Lap, StateCounter};
pub use status::Status;
