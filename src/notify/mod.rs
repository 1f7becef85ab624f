//! Post-commit side effects: realtime events, push notifications and the
//! audit trail. Nothing in here may fail a request; errors are logged and
//! counted.

pub mod audit;
pub mod events;
pub mod fanout;
pub mod push;
pub mod realtime;
