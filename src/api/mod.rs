//! Usage: Clients for downstream resource APIs.

pub mod vehicles;
