//! # Steering Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::str::FromStr;
use serde::Deserialize;
use util::logger::LevelFilter;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExecParams {

    /// TCP address the WebSocket server listens on for the simulator
    #[serde(default = "default_sim_address")]
    pub sim_address: String,

    /// Minimum level of log messages, one of `info`, `debug` or `trace`.
    #[serde(default = "default_log_level")]
    pub log_level: String
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ExecParams {
    /// Parse the configured log level.
    pub fn log_level_filter(&self) -> Result<LevelFilter, log::ParseLevelError> {
        LevelFilter::from_str(&self.log_level)
    }
}

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            sim_address: default_sim_address(),
            log_level: default_log_level()
        }
    }
}

fn default_sim_address() -> String {
    "0.0.0.0:4567".into()
}

fn default_log_level() -> String {
    "info".into()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_exec_params() -> Result<(), util::params::LoadError> {
        let p: ExecParams = util::params::from_str(r#"
            log_level = "debug"
        "#)?;

        assert_eq!(p.sim_address, "0.0.0.0:4567");
        assert_eq!(p.log_level_filter().ok(), Some(LevelFilter::Debug));

        let bad = ExecParams {
            log_level: "loud".into(),
            ..ExecParams::default()
        };
        assert!(bad.log_level_filter().is_err());

        Ok(())
    }
}
