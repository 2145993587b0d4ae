pub mod cli;
pub mod config;
pub mod csma;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod logging;
pub mod medium;
pub mod sim;
pub mod station;
pub mod stats;
pub mod sweep;
pub mod timeline;
pub mod transmitter;
pub mod visualization;
