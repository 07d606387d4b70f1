//! Usage: Process-level wiring (logging, runtime glue).

pub mod logging;
