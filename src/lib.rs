pub mod config;
pub mod environment;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod providers;
pub mod rate_limit;
pub mod verify;
