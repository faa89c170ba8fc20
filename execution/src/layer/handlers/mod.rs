mod game;
mod leaderboard;
mod payments;
mod payouts;
mod profile;
