pub mod image;
pub mod job;
pub mod token;
pub mod transformation;
pub mod user;
