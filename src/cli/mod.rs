pub mod account;
pub mod payments;
pub mod user;
pub mod utils;
