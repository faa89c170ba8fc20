pub mod address;
pub mod api;
pub mod execution;
pub mod game;

pub use address::{Address, AddressError, ADDRESS_LENGTH};
