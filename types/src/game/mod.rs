mod codec;
mod constants;
mod leaderboard;
mod level;
mod notification;
mod payment;
mod payout;
mod profile;
mod session;
mod settings;
mod trophy;

pub use codec::*;
pub use constants::*;
pub use leaderboard::*;
pub use level::*;
pub use notification::*;
pub use payment::*;
pub use payout::*;
pub use profile::*;
pub use session::*;
pub use settings::*;
pub use trophy::*;

#[cfg(test)]
mod tests;
