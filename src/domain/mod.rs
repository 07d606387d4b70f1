//! Usage: Domain state owned by the client (the persisted session).

pub mod session;
