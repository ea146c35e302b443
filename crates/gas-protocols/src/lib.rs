//! gas-protocols crate
//!
//! Event tables for each benchmarked privacy protocol and the jobs that turn
//! them into gas metrics.

pub mod hinkal;
pub mod intmax;
pub mod job;
pub mod privacy_pools;
pub mod protocol;
pub mod railgun;
pub mod tornado_cash;

pub use job::{run_all, run_operation, run_protocol, BenchmarkSettings, ProtocolReport};
pub use protocol::{EventPattern, OperationSpec, Protocol};

/// Every supported protocol, in report order.
pub fn all() -> Vec<Protocol> {
    vec![
        railgun::protocol(),
        tornado_cash::protocol(),
        privacy_pools::protocol(),
        intmax::protocol(),
        hinkal::protocol(),
    ]
}

/// Looks a protocol up by name (`"railgun"`, `"tornado-cash"`, ...).
pub fn find(name: &str) -> Option<Protocol> {
    all().into_iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Names accepted by [`find`].
pub fn names() -> Vec<&'static str> {
    all().iter().map(|p| p.name).collect()
}
