// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    limits,
};
use ::libc::EINVAL;
use ::std::{
    env,
    fs,
    path::Path,
    str::FromStr,
    time::Duration,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Scheduler options.
mod duet_config {
    pub const SECTION_NAME: &str = "duet";
    // Stack size of every task, in bytes.
    pub const STACK_SIZE: &str = "stack_size";
    // Idle wait bound for both executors, in microseconds.
    pub const POLL_INTERVAL_US: &str = "poll_interval_us";
    // Default logger specification.
    pub const LOG_LEVEL: &str = "log_level";
}

/// Prefix of the environment variables that override configuration options.
const ENV_PREFIX: &str = "DUET_";

//======================================================================================================================
// Structures
//======================================================================================================================

/// Scheduler configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self, Fail> {
        let config_path: &Path = config_path.as_ref();
        let config_s: String = match fs::read_to_string(config_path) {
            Ok(config_s) => config_s,
            Err(e) => {
                warn!("new(): failed to read {:?} ({:?})", config_path, e);
                return Err(e.into());
            },
        };
        Self::parse(&config_s)
    }

    /// Parses a configuration from YAML text.
    pub fn parse(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = match YamlLoader::load_from_str(config_s) {
            Ok(config) => config,
            Err(e) => {
                let cause: String = format!("malformed configuration ({})", e);
                return Err(Fail::new(EINVAL, &cause));
            },
        };
        match &config[..] {
            [c] => Ok(Self(c.clone())),
            [] => Ok(Self::default()),
            _ => Err(Fail::new(EINVAL, "Wrong number of config objects")),
        }
    }

    /// Reads the task stack size from the environment first, then the configuration, then the default.
    pub fn stack_size(&self) -> Result<usize, Fail> {
        let stack_size: usize = match Self::get_typed_env_option(duet_config::STACK_SIZE)? {
            Some(stack_size) => stack_size,
            None => match self.get_int_option(duet_config::STACK_SIZE)? {
                Some(stack_size) => stack_size,
                None => limits::DEFAULT_STACK_SIZE,
            },
        };
        if stack_size < limits::MIN_STACK_SIZE {
            let cause: String = format!(
                "stack size below {} bytes (stack_size={:?})",
                limits::MIN_STACK_SIZE,
                stack_size
            );
            error!("stack_size(): {}", cause);
            return Err(Fail::new(EINVAL, &cause));
        }
        Ok(stack_size)
    }

    /// Reads the idle poll interval from the environment first, then the configuration, then the default.
    pub fn poll_interval(&self) -> Result<Duration, Fail> {
        let poll_interval_us: u64 = match Self::get_typed_env_option(duet_config::POLL_INTERVAL_US)? {
            Some(us) => us,
            None => match self.get_int_option(duet_config::POLL_INTERVAL_US)? {
                Some(us) => us,
                None => limits::DEFAULT_POLL_INTERVAL_US,
            },
        };
        if poll_interval_us == 0 {
            return Err(Fail::new(EINVAL, "poll interval must be positive"));
        }
        Ok(Duration::from_micros(poll_interval_us))
    }

    /// Reads the default logger specification, if any.
    pub fn log_level(&self) -> Result<Option<String>, Fail> {
        if let Some(level) = Self::get_typed_env_option::<String>(duet_config::LOG_LEVEL)? {
            return Ok(Some(level));
        }
        match self.get_section()?.map(|section| &section[duet_config::LOG_LEVEL]) {
            None | Some(Yaml::BadValue) | Some(Yaml::Null) => Ok(None),
            Some(Yaml::String(level)) => Ok(Some(level.clone())),
            Some(_) => Err(Fail::new(EINVAL, "log_level must be a string")),
        }
    }

    /// The `duet` section, if the document has one.
    fn get_section(&self) -> Result<Option<&Yaml>, Fail> {
        match &self.0 {
            Yaml::Null | Yaml::BadValue => Ok(None),
            Yaml::Hash(_) => match &self.0[duet_config::SECTION_NAME] {
                Yaml::BadValue | Yaml::Null => Ok(None),
                section @ Yaml::Hash(_) => Ok(Some(section)),
                _ => Err(Fail::new(EINVAL, "duet section must be a mapping")),
            },
            _ => Err(Fail::new(EINVAL, "configuration must be a mapping")),
        }
    }

    /// Reads a non-negative integer option from the `duet` section.
    fn get_int_option<T: TryFrom<i64>>(&self, name: &str) -> Result<Option<T>, Fail> {
        let value: &Yaml = match self.get_section()? {
            Some(section) => &section[name],
            None => return Ok(None),
        };
        match value {
            Yaml::BadValue | Yaml::Null => Ok(None),
            Yaml::Integer(n) if *n >= 0 => match T::try_from(*n) {
                Ok(value) => Ok(Some(value)),
                Err(_) => {
                    let cause: String = format!("{} out of range ({:?})", name, n);
                    Err(Fail::new(EINVAL, &cause))
                },
            },
            Yaml::Integer(n) => {
                let cause: String = format!("{} must not be negative ({:?})", name, n);
                Err(Fail::new(EINVAL, &cause))
            },
            _ => {
                let cause: String = format!("{} must be an integer", name);
                Err(Fail::new(EINVAL, &cause))
            },
        }
    }

    /// Reads an option from the `DUET_<NAME>` environment variable.
    fn get_typed_env_option<T: FromStr>(name: &str) -> Result<Option<T>, Fail> {
        let var: String = format!("{}{}", ENV_PREFIX, name.to_uppercase());
        match env::var(&var) {
            Ok(value) => match value.parse::<T>() {
                Ok(value) => Ok(Some(value)),
                Err(_) => {
                    let cause: String = format!("invalid value for {} ({:?})", var, value);
                    error!("get_typed_env_option(): {}", cause);
                    Err(Fail::new(EINVAL, &cause))
                },
            },
            Err(_) => Ok(None),
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for Config {
    fn default() -> Self {
        Self(Yaml::Null)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
