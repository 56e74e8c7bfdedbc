//! Application layer: the payment lifecycle, access sessions and the
//! background sweeper. Everything here talks to storage and the provider
//! only through the ports in `crate::domain::ports`.

pub mod lifecycle;
pub mod sessions;
pub mod sweeper;
