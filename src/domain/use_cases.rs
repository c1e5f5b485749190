pub mod auth;
pub mod extractors;
pub mod images;
pub mod transform;
