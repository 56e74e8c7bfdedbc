//! Adapters implementing the domain ports: stores, gateways and clocks.

pub mod clock;
pub mod gateway;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
