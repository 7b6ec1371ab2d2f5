//! Realtime fan-out: every authenticated connection joins the room named by
//! its own user id, and stored messages are relayed into rooms.

pub mod connection;
pub mod dispatcher;
pub mod session;
