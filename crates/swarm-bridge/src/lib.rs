//! swarm-bridge — synchronous calls over asynchronous queues.
//!
//! A caller's `submit` stages the payload, publishes a job with a fresh
//! correlation id, and blocks until a result carrying that id shows up in
//! the bridge's [`CorrelationTable`], or the timeout elapses.
//!
//! # Architecture
//!
//! ```text
//! Bridge
//!   ├── submit()  ×N concurrent callers
//!   │   ├── store.put(input, uploads/<id>/<file>)
//!   │   ├── work.send(JobRequest)          bounded retry
//!   │   └── await_result(id)               table pop / notify / poll
//!   ├── ResultPoller (one per bridge)
//!   │   └── results.receive → table.insert → results.delete
//!   └── orphan sweeper
//!       └── table.sweep(ttl)
//! ```
//!
//! The table is owned by the bridge instance, so independent bridges can
//! coexist in one process.

pub mod bridge;
pub mod error;
pub mod poller;
pub mod table;

pub use bridge::Bridge;
pub use error::{BridgeError, BridgeResult};
pub use poller::ResultPoller;
pub use table::CorrelationTable;
