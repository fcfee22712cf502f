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

//! Feedback for configuration evaluation: warnings are logged and execution
//! continues, errors terminate startup with a report of everything that went
//! wrong in the source that produced them

use core::fmt;
use core::ops::Deref;

#[derive(Debug)]
/// A startup configuration error
pub enum ConfigError {
    /// The configuration file could not be read
    OSError(std::io::Error),
    /// The configuration file could not be parsed
    CfgError(String),
    /// One or more sources produced bad values
    Stacked(ErrorStack),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OSError(e) => write!(f, "Startup failure: OS error: {}", e),
            Self::CfgError(e) => write!(f, "Startup failure: bad configuration file: {}", e),
            Self::Stacked(estack) => write!(f, "Startup failure: {}", estack),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::OSError(e)
    }
}

#[derive(Debug)]
/// A stack of errors attributed to one configuration source
pub struct ErrorStack {
    source: &'static str,
    stack: Vec<String>,
}

impl ErrorStack {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            stack: Vec::new(),
        }
    }
    pub fn push(&mut self, error: String) {
        self.stack.push(error)
    }
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
    pub const fn source(&self) -> &'static str {
        self.source
    }
}

impl fmt::Display for ErrorStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errors in {}:", self.source)?;
        for error in &self.stack {
            write!(f, "\n - {}", error)?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
/// A stack of warnings attributed to one configuration source
pub struct WarningStack {
    source: &'static str,
    stack: Vec<String>,
}

impl WarningStack {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            stack: Vec::new(),
        }
    }
    pub fn push(&mut self, warning: String) {
        self.stack.push(warning)
    }
    /// Print all the warnings through the log sink
    pub fn print_warnings(&self) {
        for warning in &self.stack {
            log::warn!("{}: {}", self.source, warning);
        }
    }
}

impl Deref for WarningStack {
    type Target = Vec<String>;
    fn deref(&self) -> &Self::Target {
        &self.stack
    }
}
