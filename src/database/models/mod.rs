pub mod segment;
pub mod user;
