//! JSONL request dispatch for the gateway front-end.
//!
//! Clients send a single request line naming an operation:
//!
//! ```json
//! {"operation":"call","file":"calc.thrift","service":"Calc","method":"add","port":9090,"args":{"a":2,"b":3}}
//! ```
//!
//! The daemon answers with one line tagged by `kind`:
//!
//! ```json
//! {"kind":"reply","body":{"success":5}}
//! ```
//!
//! Unknown files, services, and methods answer `not_found`; malformed
//! requests and other failures answer `error`. Call failures past
//! resolution are `reply` lines carrying an exception payload.

mod errors;
mod handler;
mod request;
mod response;

pub(crate) use self::handler::GatewayConnectionHandler;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
