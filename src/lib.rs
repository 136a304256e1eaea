pub mod analysis;
pub mod cli;
pub mod config;
pub mod detection;
pub mod intake;
pub mod overlay;
pub mod report;
pub mod session;
pub mod util;
