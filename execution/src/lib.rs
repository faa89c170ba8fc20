pub mod game;
pub mod xp;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod layer;

mod state;

pub use layer::Layer;
pub use state::{Memory, State, Status};
