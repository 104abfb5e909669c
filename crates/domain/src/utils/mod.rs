//! Small pure helpers with no I/O.

pub mod mac;
