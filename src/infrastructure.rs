pub mod auth;
pub mod db;
pub mod queue;
pub mod storage;
