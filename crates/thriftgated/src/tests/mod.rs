//! Test suites for the gateway daemon.

mod gateway_behaviour;
pub(crate) mod support;
mod unit;
