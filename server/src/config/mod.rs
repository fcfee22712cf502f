/*
 * Created on Wed May 20 2026
 *
 * This file is a part of Skyconf
 * Skyconf is a free and open-source YANG-driven configuration management
 * engine written by Sayan Nandan ("the Author") with the vision to provide
 * safe, transactional network configuration without compromising on
 * correctness or performance.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

// std imports
use core::str::FromStr;
use std::env::VarError;
use std::fs;
use std::net::IpAddr;
// internal modules
mod cfgfile;
mod definitions;
mod feedback;
// internal imports
pub use self::definitions::*;
use self::feedback::{ConfigError, ErrorStack, WarningStack};

// server defaults
const DEFAULT_PORT: u16 = 2007;
const MAXIMUM_CONNECTION_LIMIT: usize = 50000;
// datastore defaults
const DEFAULT_SNAPSHOT_COUNT: usize = 30;
// stream defaults
const DEFAULT_STREAM_RETENTION: u64 = 3600;
/// The default configuration file name
const DEFAULT_CONFIG_FILE: &str = "skyconf.yaml";

type StaticStr = &'static str;

#[derive(Debug)]
/// An enum representing the outcome of a parse operation for a specific configuration item from a
/// specific configuration source
pub enum ConfigSourceParseResult<T> {
    Okay(T),
    Absent,
    ParseFailure,
}

/// A trait for configuration sources. Any type implementing this trait is considered to be a valid
/// source for configuration
pub trait TryFromConfigSource<T: Sized>: Sized {
    /// Check if the value is present
    fn is_present(&self) -> bool;
    /// Attempt to parse the value into the target type
    fn try_parse(self) -> ConfigSourceParseResult<T>;
}

impl<'a, T: FromStr + 'a> TryFromConfigSource<T> for Option<&'a str> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
    fn try_parse(self) -> ConfigSourceParseResult<T> {
        self.map(|s| {
            s.parse()
                .map(ConfigSourceParseResult::Okay)
                .unwrap_or(ConfigSourceParseResult::ParseFailure)
        })
        .unwrap_or(ConfigSourceParseResult::Absent)
    }
}

impl<T: FromStr> TryFromConfigSource<T> for Result<String, VarError> {
    fn is_present(&self) -> bool {
        !matches!(self, Err(VarError::NotPresent))
    }
    fn try_parse(self) -> ConfigSourceParseResult<T> {
        match self {
            Ok(s) => s
                .parse()
                .map(ConfigSourceParseResult::Okay)
                .unwrap_or(ConfigSourceParseResult::ParseFailure),
            Err(e) => match e {
                VarError::NotPresent => ConfigSourceParseResult::Absent,
                VarError::NotUnicode(_) => ConfigSourceParseResult::ParseFailure,
            },
        }
    }
}

#[derive(Debug)]
/// A high-level configuration set that automatically handles errors, warnings and provides a
/// convenient [`Result`] type that can be used
pub struct Configset {
    did_mutate: bool,
    cfg: ConfigurationSet,
    estack: ErrorStack,
    wstack: WarningStack,
}

impl Configset {
    const EMSG_ENV: StaticStr = "Environment";
    const EMSG_FILE: StaticStr = "Configuration file";

    /// Internal ctor for a given feedback source. We do not want to expose this to avoid
    /// erroneous feedback source names
    fn _new(feedback_source: StaticStr) -> Self {
        Self {
            did_mutate: false,
            cfg: ConfigurationSet::default(),
            estack: ErrorStack::new(feedback_source),
            wstack: WarningStack::new(feedback_source),
        }
    }
    /// Create a new configset for environment variables
    pub fn new_env() -> Self {
        Self::_new(Self::EMSG_ENV)
    }
    /// Create a new configset for config files, seeded with the outcome of an earlier source
    pub fn new_file(seed: ConfigurationSet) -> Self {
        Self {
            did_mutate: true,
            cfg: seed,
            estack: ErrorStack::new(Self::EMSG_FILE),
            wstack: WarningStack::new(Self::EMSG_FILE),
        }
    }
    /// Push an error onto the error stack
    fn epush(&mut self, field_key: StaticStr, expected: StaticStr) {
        self.estack
            .push(format!("Bad value for `{field_key}`. Expected {expected}"))
    }
    /// Check if no errors have occurred
    pub fn is_okay(&self) -> bool {
        self.estack.is_empty()
    }
    /// Check if the configset was mutated
    pub fn is_mutated(&self) -> bool {
        self.did_mutate
    }
    /// Attempt to parse a `TryFromConfigSource` type into `target`, and push in any error that
    /// occurs using the given diagnostic info
    fn try_mutate<T>(
        &mut self,
        new: impl TryFromConfigSource<T>,
        target: &mut T,
        expected: StaticStr,
        field_key: StaticStr,
    ) {
        if new.is_present() {
            self.did_mutate = true;
            match new.try_parse() {
                ConfigSourceParseResult::Okay(value) => *target = value,
                ConfigSourceParseResult::ParseFailure => self.epush(field_key, expected),
                ConfigSourceParseResult::Absent => unreachable!("is_present() was true"),
            }
        }
    }
    /// Finish evaluation: print warnings, return the set or the error stack
    pub fn into_result(self) -> Result<(ConfigurationSet, bool), ConfigError> {
        let Self {
            did_mutate,
            cfg,
            estack,
            wstack,
        } = self;
        wstack.print_warnings();
        if estack.is_empty() {
            Ok((cfg, did_mutate))
        } else {
            Err(ConfigError::Stacked(estack))
        }
    }

    // per-option setters

    pub fn server_settings(
        &mut self,
        nhost: impl TryFromConfigSource<IpAddr>,
        nport: impl TryFromConfigSource<u16>,
        nmaxcon: impl TryFromConfigSource<usize>,
    ) {
        let mut host = self.cfg.host;
        let mut port = self.cfg.port;
        let mut maxcon = self.cfg.maxcon;
        self.try_mutate(nhost, &mut host, "a valid IPv4/IPv6 address", "host");
        self.try_mutate(nport, &mut port, "a 16-bit positive integer", "port");
        self.try_mutate(nmaxcon, &mut maxcon, "a positive integer", "maxcon");
        if maxcon > MAXIMUM_CONNECTION_LIMIT {
            self.epush("maxcon", "a value within the connection limit");
        }
        self.cfg.host = host;
        self.cfg.port = port;
        self.cfg.maxcon = maxcon;
    }
    pub fn system_paths(
        &mut self,
        ndata_dir: impl TryFromConfigSource<String>,
        nschema_file: impl TryFromConfigSource<String>,
        nnoart: impl TryFromConfigSource<bool>,
    ) {
        let mut data_dir = core::mem::take(&mut self.cfg.data_dir);
        let mut schema_file = self.cfg.schema_file.take().unwrap_or_default();
        let had_schema = !schema_file.is_empty();
        let mut noart = self.cfg.noart;
        self.try_mutate(ndata_dir, &mut data_dir, "a directory path", "data_dir");
        self.try_mutate(nschema_file, &mut schema_file, "a file path", "schema_file");
        self.try_mutate(nnoart, &mut noart, "true/false", "noart");
        self.cfg.data_dir = data_dir;
        self.cfg.schema_file = if schema_file.is_empty() && !had_schema {
            None
        } else {
            Some(schema_file)
        };
        self.cfg.noart = noart;
    }
    pub fn datastore_settings(
        &mut self,
        ncache: impl TryFromConfigSource<bool>,
        nformat: impl TryFromConfigSource<DataFormat>,
        npretty: impl TryFromConfigSource<bool>,
        narchive: impl TryFromConfigSource<String>,
        nsnapcount: impl TryFromConfigSource<usize>,
    ) {
        let mut cache = self.cfg.cache_datastores;
        let mut format = self.cfg.datastore_format;
        let mut pretty = self.cfg.pretty_print;
        let mut archive = core::mem::take(&mut self.cfg.archive_dir);
        let mut snapcount = self.cfg.snapshot_count;
        self.try_mutate(ncache, &mut cache, "true/false", "cache_datastores");
        self.try_mutate(nformat, &mut format, "`xml` or `json`", "datastore_format");
        self.try_mutate(npretty, &mut pretty, "true/false", "pretty_print");
        self.try_mutate(narchive, &mut archive, "a directory path", "archive_dir");
        self.try_mutate(nsnapcount, &mut snapcount, "a positive integer", "snapshot_count");
        if snapcount == 0 {
            self.epush("snapshot_count", "a non-zero snapshot count");
        }
        self.cfg.cache_datastores = cache;
        self.cfg.datastore_format = format;
        self.cfg.pretty_print = pretty;
        self.cfg.archive_dir = archive;
        self.cfg.snapshot_count = snapcount;
    }
    pub fn access_settings(&mut self, nmode: impl TryFromConfigSource<AccessMode>) {
        let mut mode = self.cfg.access_control_mode;
        self.try_mutate(
            nmode,
            &mut mode,
            "`none`, `internal` or `external`",
            "access_control_mode",
        );
        self.cfg.access_control_mode = mode;
    }
    pub fn stream_settings(
        &mut self,
        nprefix: impl TryFromConfigSource<String>,
        nretention: impl TryFromConfigSource<u64>,
        npublish: impl TryFromConfigSource<bool>,
    ) {
        let mut prefix = core::mem::take(&mut self.cfg.stream_url_prefix);
        let mut retention = self.cfg.stream_retention_seconds;
        let mut publish = self.cfg.publish_enabled;
        self.try_mutate(nprefix, &mut prefix, "a URL prefix", "stream_url_prefix");
        self.try_mutate(
            nretention,
            &mut retention,
            "a positive integer (seconds)",
            "stream_retention_seconds",
        );
        self.try_mutate(npublish, &mut publish, "true/false", "publish_enabled");
        if retention == 0 {
            self.wstack
                .push("stream_retention_seconds is 0; replay buffers will not retain events".to_owned());
        }
        self.cfg.stream_url_prefix = prefix;
        self.cfg.stream_retention_seconds = retention;
        self.cfg.publish_enabled = publish;
    }

    /// Apply every recognized environment variable
    fn apply_env(&mut self) {
        use std::env::var;
        self.server_settings(
            var("SKYCONF_HOST"),
            var("SKYCONF_PORT"),
            var("SKYCONF_MAXCON"),
        );
        self.system_paths(
            var("SKYCONF_DATA_DIR"),
            var("SKYCONF_SCHEMA_FILE"),
            var("SKYCONF_NOART"),
        );
        self.datastore_settings(
            var("SKYCONF_DS_CACHE"),
            var("SKYCONF_DS_FORMAT"),
            var("SKYCONF_DS_PRETTY"),
            var("SKYCONF_ARCHIVE_DIR"),
            var("SKYCONF_SNAPSHOT_COUNT"),
        );
        self.access_settings(var("SKYCONF_ACCESS_MODE"));
        self.stream_settings(
            var("SKYCONF_STREAM_URL_PREFIX"),
            var("SKYCONF_STREAM_RETENTION"),
            var("SKYCONF_STREAM_PUBLISH"),
        );
    }

    /// Apply a parsed configuration file
    fn apply_file(&mut self, cf: cfgfile::Config) {
        let cfgfile::Config {
            system,
            datastore,
            access,
            streams,
        } = cf;
        if let Some(system) = system {
            self.server_settings(
                system.host.as_deref(),
                system.port.map(|p| p.to_string()).as_deref(),
                system.maxcon.map(|m| m.to_string()).as_deref(),
            );
            self.system_paths(
                system.data_dir.as_deref(),
                system.schema_file.as_deref(),
                system.noart.map(|b| b.to_string()).as_deref(),
            );
        }
        if let Some(ds) = datastore {
            self.datastore_settings(
                ds.cache.map(|b| b.to_string()).as_deref(),
                ds.format.as_deref(),
                ds.pretty_print.map(|b| b.to_string()).as_deref(),
                ds.archive_dir.as_deref(),
                ds.snapshot_count.map(|c| c.to_string()).as_deref(),
            );
        }
        if let Some(access) = access {
            self.access_settings(access.mode.as_deref());
        }
        if let Some(streams) = streams {
            self.stream_settings(
                streams.url_prefix.as_deref(),
                streams.retention_seconds.map(|r| r.to_string()).as_deref(),
                streams.publish.map(|b| b.to_string()).as_deref(),
            );
        }
    }
}

#[derive(Debug)]
/// The final configuration that will be used by the server
pub enum ConfigType {
    Def(ConfigurationSet),
    Custom(ConfigurationSet),
}

/// Evaluate environment variables and (optionally) a configuration file into the final
/// configuration, or return a startup error
pub fn get_config_file_or_return_cfg() -> Result<ConfigType, ConfigError> {
    let mut env_set = Configset::new_env();
    env_set.apply_env();
    let (cfg, env_mutated) = env_set.into_result()?;
    // Look for a config file: an explicit `SKYCONF_CONFIG` always wins, else we pick up
    // `skyconf.yaml` from the current directory if it exists
    let cfg_path = match std::env::var("SKYCONF_CONFIG") {
        Ok(path) => Some(path),
        Err(_) => {
            if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
                Some(DEFAULT_CONFIG_FILE.to_owned())
            } else {
                None
            }
        }
    };
    match cfg_path {
        Some(path) => {
            let raw = fs::read_to_string(&path)?;
            let parsed: cfgfile::Config = serde_yaml::from_str(&raw)
                .map_err(|e| ConfigError::CfgError(e.to_string()))?;
            let mut file_set = Configset::new_file(cfg);
            file_set.apply_file(parsed);
            let (cfg, _) = file_set.into_result()?;
            Ok(ConfigType::Custom(cfg))
        }
        None => {
            if env_mutated {
                Ok(ConfigType::Custom(cfg))
            } else {
                Ok(ConfigType::Def(cfg))
            }
        }
    }
}
