//! Run configuration.

use std::path::PathBuf;

/// Paths and symbols the driver needs to start semantic analysis.
#[derive(Clone, Debug)]
pub struct Config {
    /// File whose top level is analyzed first.
    pub entrypoint_filepath: PathBuf,
    /// Symbol the code generator would start from. Recorded but not
    /// consumed by the front-end.
    pub entrypoint_symbol: String,
    /// Standard library file imported by the prelude bootstrap.
    pub std_filepath: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entrypoint_filepath: PathBuf::from("main.evl"),
            entrypoint_symbol: String::from("main"),
            std_filepath: PathBuf::from("std.evl"),
        }
    }
}
