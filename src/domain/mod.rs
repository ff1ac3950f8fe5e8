pub mod account;
pub mod commission;
pub mod operation;
pub mod ports;
