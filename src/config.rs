//! Runtime configuration.
//!
//! Defaults are the limits declared next to each type. Each can be
//! overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `STACKVM_TRACE` | `vm.trace` (`0`, `false`, `off`, `no` disable) |
//! | `STACKVM_STACK_SIZE` | `vm.max_stack` |
//! | `STACKVM_CALL_DEPTH` | `vm.max_call_depth` |
//! | `STACKVM_MEMORY_SIZE` | `vm.memory_size` |
//! | `STACKVM_CODE_CAPACITY` | `assembler.code_capacity` |
//! | `STACKVM_LOG` | log level (`debug`, `info`, `warn`, `error`) |
//! | `STACKVM_LOG_TIMESTAMP` | prefix log lines with a UTC timestamp |

use crate::utils::log::Level;
use crate::virtual_machine::assembler::AsmLimits;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::VmConfig;
use std::env;

pub const ENV_TRACE: &str = "STACKVM_TRACE";
pub const ENV_STACK_SIZE: &str = "STACKVM_STACK_SIZE";
pub const ENV_CALL_DEPTH: &str = "STACKVM_CALL_DEPTH";
pub const ENV_MEMORY_SIZE: &str = "STACKVM_MEMORY_SIZE";
pub const ENV_CODE_CAPACITY: &str = "STACKVM_CODE_CAPACITY";
pub const ENV_LOG: &str = "STACKVM_LOG";
pub const ENV_LOG_TIMESTAMP: &str = "STACKVM_LOG_TIMESTAMP";

/// Assembler and VM settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub assembler: AsmLimits,
    pub vm: VmConfig,
    pub log_level: Level,
    pub log_timestamp: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assembler: AsmLimits::default(),
            vm: VmConfig::default(),
            log_level: Level::Info,
            log_timestamp: false,
        }
    }
}

impl Config {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, VMError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, applying overrides to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VMError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_TRACE) {
            config.vm.trace = parse_flag(ENV_TRACE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STACK_SIZE) {
            config.vm.max_stack = parse_size(ENV_STACK_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CALL_DEPTH) {
            config.vm.max_call_depth = parse_size(ENV_CALL_DEPTH, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MEMORY_SIZE) {
            config.vm.memory_size = parse_size(ENV_MEMORY_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CODE_CAPACITY) {
            let capacity = parse_size(ENV_CODE_CAPACITY, &raw)?;
            // Offsets are encoded as 32-bit targets.
            if u32::try_from(capacity).is_err() {
                return Err(invalid(ENV_CODE_CAPACITY, &raw));
            }
            config.assembler.code_capacity = capacity;
        }
        if let Some(raw) = lookup(ENV_LOG) {
            config.log_level = Level::parse(raw.trim()).ok_or_else(|| invalid(ENV_LOG, &raw))?;
        }
        if let Some(raw) = lookup(ENV_LOG_TIMESTAMP) {
            config.log_timestamp = parse_flag(ENV_LOG_TIMESTAMP, &raw)?;
        }

        Ok(config)
    }
}

fn invalid(key: &'static str, raw: &str) -> VMError {
    VMError::Config {
        key,
        value: raw.to_string(),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, VMError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}

/// Parses a strictly positive size.
fn parse_size(key: &'static str, raw: &str) -> Result<usize, VMError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, VMError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.assembler.code_capacity, 131_072);
        assert_eq!(config.assembler.max_labels, 2048);
        assert_eq!(config.assembler.max_relocations, 2048);
        assert_eq!(config.assembler.max_tokens_per_line, 3);
        assert_eq!(config.vm.max_stack, 1024);
        assert_eq!(config.vm.max_call_depth, 1024);
        assert_eq!(config.vm.memory_size, 4096);
        assert!(config.vm.trace);
        assert_eq!(config.vm.trace_window, 8);
        assert_eq!(config.log_level, Level::Info);
        assert!(!config.log_timestamp);
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            (ENV_TRACE, "off"),
            (ENV_STACK_SIZE, "16"),
            (ENV_CALL_DEPTH, " 8 "),
            (ENV_MEMORY_SIZE, "64"),
            (ENV_CODE_CAPACITY, "1024"),
            (ENV_LOG, "debug"),
            (ENV_LOG_TIMESTAMP, "yes"),
        ])
        .unwrap();
        assert!(!config.vm.trace);
        assert_eq!(config.vm.max_stack, 16);
        assert_eq!(config.vm.max_call_depth, 8);
        assert_eq!(config.vm.memory_size, 64);
        assert_eq!(config.assembler.code_capacity, 1024);
        assert_eq!(config.log_level, Level::Debug);
        assert!(config.log_timestamp);
    }

    #[test]
    fn trace_flag_spellings() {
        for off in ["0", "false", "OFF", "no"] {
            assert!(!config_from(&[(ENV_TRACE, off)]).unwrap().vm.trace);
        }
        for on in ["1", "true", "On", "yes"] {
            assert!(config_from(&[(ENV_TRACE, on)]).unwrap().vm.trace);
        }
    }

    #[test]
    fn malformed_values() {
        let err = config_from(&[(ENV_STACK_SIZE, "lots")]).unwrap_err();
        assert!(matches!(
            err,
            VMError::Config { key: ENV_STACK_SIZE, ref value } if value == "lots"
        ));
        assert!(config_from(&[(ENV_MEMORY_SIZE, "0")]).is_err());
        assert!(config_from(&[(ENV_TRACE, "maybe")]).is_err());
        assert!(config_from(&[(ENV_LOG, "loud")]).is_err());
        assert!(config_from(&[(ENV_LOG_TIMESTAMP, "sometimes")]).is_err());
        assert!(config_from(&[(ENV_CODE_CAPACITY, "99999999999")]).is_err());
    }

    #[test]
    fn error_message_names_variable() {
        let err = config_from(&[(ENV_CALL_DEPTH, "-1")]).unwrap_err();
        assert_eq!(err.to_string(), "invalid value '-1' for STACKVM_CALL_DEPTH");
    }
}
