//! Application layer: the operation state machine, the atomic transfer
//! executor, and the read-side validation queue. Storage is reached only
//! through the ports in `crate::domain::ports`.

pub mod engine;
pub mod queue;
pub mod transfer;
