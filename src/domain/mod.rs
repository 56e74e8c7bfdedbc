//! Domain model: payment records, access sessions and the ports the
//! application layer depends on.

pub mod gateway;
pub mod payment;
pub mod ports;
pub mod session;
