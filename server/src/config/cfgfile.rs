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

use serde::Deserialize;

/// The `skyconf.yaml` configuration file layout
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    pub system: Option<ConfigSystem>,
    pub datastore: Option<ConfigDatastore>,
    pub access: Option<ConfigAccess>,
    pub streams: Option<ConfigStreams>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct ConfigSystem {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub maxcon: Option<usize>,
    pub data_dir: Option<String>,
    pub schema_file: Option<String>,
    pub noart: Option<bool>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct ConfigDatastore {
    pub cache: Option<bool>,
    pub format: Option<String>,
    pub pretty_print: Option<bool>,
    pub archive_dir: Option<String>,
    pub snapshot_count: Option<usize>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct ConfigAccess {
    pub mode: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct ConfigStreams {
    pub url_prefix: Option<String>,
    pub retention_seconds: Option<u64>,
    pub publish: Option<bool>,
}
