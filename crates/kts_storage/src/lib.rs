#![forbid(unsafe_code)]

pub mod audit;
pub mod config;
pub mod derive;
pub mod error;
pub mod registry;
pub mod repo;
pub mod shared;
pub mod slots;
pub mod snapshot;
