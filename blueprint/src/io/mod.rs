//! Side-effecting operations: storage access and the workflows built on it.

pub mod config;
pub mod installation;
pub mod product;
pub mod release;
pub mod storage;
pub mod upgrades;
