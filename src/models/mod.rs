pub mod follow;
pub mod user;
