pub mod classifier;
pub mod learner;
pub mod priority;

pub use classifier::*;
pub use learner::*;
pub use priority::*;
