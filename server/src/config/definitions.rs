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

use core::fmt;
use core::str::FromStr;
use std::net::{IpAddr, Ipv4Addr};

/// The on-disk serialization format for datastores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Xml,
    Json,
}

impl DataFormat {
    /// The file extension for this format
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
        }
    }
}

impl FromStr for DataFormat {
    type Err = ();
    fn from_str(st: &str) -> Result<Self, Self::Err> {
        match st {
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The access-control evaluation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// No access control: every principal may write
    None,
    /// Policy is read from the `acl` subtree of the base tree being written
    Internal,
    /// Policy is delegated to extension `auth` callbacks
    External,
}

impl FromStr for AccessMode {
    type Err = ();
    fn from_str(st: &str) -> Result<Self, Self::Err> {
        match st {
            "none" => Ok(Self::None),
            "internal" => Ok(Self::Internal),
            "external" => Ok(Self::External),
            _ => Err(()),
        }
    }
}

/// The fully resolved engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSet {
    /// the address the listener binds to
    pub host: IpAddr,
    /// the port the listener binds to
    pub port: u16,
    /// maximum concurrent client sessions
    pub maxcon: usize,
    /// directory holding the datastore files
    pub data_dir: String,
    /// path to the schema definition delivered by the YANG front-end
    pub schema_file: Option<String>,
    /// whether datastore roots are kept cached in memory
    pub cache_datastores: bool,
    /// on-disk serialization format
    pub datastore_format: DataFormat,
    /// pretty-print serialized trees
    pub pretty_print: bool,
    /// snapshot archive directory
    pub archive_dir: String,
    /// number of rotated snapshots kept in the archive
    pub snapshot_count: usize,
    /// access-control mode
    pub access_control_mode: AccessMode,
    /// URL prefix advertised in stream state
    pub stream_url_prefix: String,
    /// replay buffer retention in seconds
    pub stream_retention_seconds: u64,
    /// publish stream events to the process log sink
    pub publish_enabled: bool,
    /// disable terminal artwork
    pub noart: bool,
}

impl ConfigurationSet {
    /// Are we allowed to display the terminal artwork?
    pub const fn is_artful(&self) -> bool {
        !self.noart
    }
}

impl Default for ConfigurationSet {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: super::DEFAULT_PORT,
            maxcon: super::MAXIMUM_CONNECTION_LIMIT,
            data_dir: "data".to_owned(),
            schema_file: None,
            cache_datastores: true,
            datastore_format: DataFormat::Xml,
            pretty_print: false,
            archive_dir: "data/archive".to_owned(),
            snapshot_count: super::DEFAULT_SNAPSHOT_COUNT,
            access_control_mode: AccessMode::None,
            stream_url_prefix: "https://localhost/streams".to_owned(),
            stream_retention_seconds: super::DEFAULT_STREAM_RETENTION,
            publish_enabled: false,
            noart: false,
        }
    }
}
