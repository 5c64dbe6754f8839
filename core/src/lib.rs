pub mod aggregate;
pub mod category;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod export;
pub mod generator;
pub mod models;
pub mod normalize;
pub mod ports;
pub mod recipe_import;
pub mod service;
pub mod store;
pub mod units;

#[cfg(test)]
mod testing;
