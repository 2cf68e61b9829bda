pub mod health;
pub mod segment;
pub mod user;
