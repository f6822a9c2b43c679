pub mod aggregate;
pub mod context;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod service;
pub mod tools;
