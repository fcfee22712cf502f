/*
 * Created on Fri May 01 2026
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

//! # Skyconf
//!
//! The `skyconfd` crate (or the `server` folder) is Skyconf's configuration
//! engine daemon: a YANG-driven NETCONF-model core with named datastores, a
//! transactional commit pipeline and event notification streams. See the
//! modules for their respective documentation.

use crate::config::ConfigurationSet;
use crate::engine::Engine;
use crate::extensions::ExtensionRegistry;
use crate::schema::SchemaTree;
use crate::util::error::{ConfResult, Error};
use env_logger::Builder;
use libskyconf::util::terminal;
use libskyconf::{URL, VERSION};
use std::env;
use std::fs;
use std::io::Write;
use std::path;
use std::process;

#[macro_use]
mod util;
mod acl;
mod actions;
mod commit;
mod config;
mod datastore;
mod dbnet;
mod engine;
mod extensions;
mod merge;
mod protocol;
mod queryengine;
mod schema;
mod services;
mod streams;
mod validate;
mod xmltree;
mod xpath;
#[cfg(test)]
mod tests;

use tokio::signal;

/// A generic I/O result
pub type IoResult<T> = std::io::Result<T>;

const PATH: &str = ".skyconf_pid";

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// Jemallocator - this is the default memory allocator for platforms other than msvc
static GLOBAL: Jemalloc = Jemalloc;

/// The terminal art for `!noart` configurations
static TEXT: &str = "\n███████ ██   ██ ██    ██  ██████  ██████  ███    ██ ███████ \n██      ██  ██   ██  ██  ██      ██    ██ ████   ██ ██      \n███████ █████     ████   ██      ██    ██ ██ ██  ██ █████   \n     ██ ██  ██     ██    ██      ██    ██ ██  ██ ██ ██      \n███████ ██   ██    ██     ██████  ██████  ██   ████ ██      \n                                                            ";

fn main() {
    Builder::new()
        .parse_filters(&env::var("SKYCONF_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();
    // claim the datastores for this process before anything touches them
    let pid_guard = match PidGuard::acquire() {
        Ok(guard) => guard,
        Err(e) => {
            log::error!("Startup failure: {}", e);
            process::exit(0x100);
        }
    };
    // The engine runs on a single-threaded cooperative reactor: handlers run
    // to completion between I/O suspension points, so sessions only contend
    // through the advisory datastore locks
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let engine = runtime.block_on(async {
        let cfg = check_args_and_get_cfg();
        let schema = load_schema(&cfg);
        let extensions = ExtensionRegistry::new();
        let engine = match Engine::new(schema, cfg, extensions) {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("Startup failure: {}", e);
                process::exit(0x100);
            }
        };
        if let Err(e) = engine
            .shared
            .extensions
            .start_all(&env::args().collect::<Vec<String>>())
        {
            log::error!("Startup failure: {}", e);
            process::exit(0x100);
        }
        match dbnet::run(engine, wait_for_termination()).await {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("Server failure: {}", e);
                process::exit(0x100);
            }
        }
    });
    // make sure all background workers terminate before the engine winds down
    drop(runtime);
    engine.shutdown();
    // the datastores are released once the guard goes
    drop(pid_guard);
    terminal::write_success("Engine stopped cleanly\n").unwrap();
}

/// Resolves on SIGINT, and on unix also on SIGTERM, to begin the graceful
/// shutdown: stop accepting connections, drain in-flight handlers, run the
/// extension exit callbacks
async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};
        match unix_signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}

/// This function evaluates the configuration sources and either returns a
/// config object or prints an error to `stderr` and terminates the server
fn check_args_and_get_cfg() -> ConfigurationSet {
    match config::get_config_file_or_return_cfg() {
        Ok(config::ConfigType::Custom(cfg)) => {
            if cfg.is_artful() {
                println!("Skyconf v{} | {}\n{}", VERSION, URL, TEXT);
            } else {
                println!("Skyconf v{} | {}", VERSION, URL);
            }
            log::info!("Using settings from supplied configuration");
            cfg
        }
        Ok(config::ConfigType::Def(cfg)) => {
            println!("Skyconf v{} | {}\n{}", VERSION, URL, TEXT);
            log::warn!("No configuration supplied. Using default settings");
            cfg
        }
        Err(e) => {
            log::error!("{}", e);
            process::exit(0x100);
        }
    }
}

/// Load the schema tree delivered by the YANG front-end, or start with an
/// empty tree when none is configured
fn load_schema(cfg: &ConfigurationSet) -> SchemaTree {
    match &cfg.schema_file {
        Some(file) => match schema::def::load_from_file(file) {
            Ok(schema) => schema,
            Err(e) => {
                log::error!("Startup failure: failed to load schema {}: {}", file, e);
                process::exit(0x100);
            }
        },
        None => {
            log::warn!("No schema file configured; every edit will be rejected as unknown");
            SchemaTree::new()
        }
    }
}

/// Exclusive claim on the datastores for the lifetime of the process.
///
/// Two engines writing the same datastore files would corrupt each other's
/// caches, since cache validity is only tracked through the datastore API.
/// The claim is a `.skyconf_pid` file recording our pid; it is removed when
/// the guard drops at the end of a clean shutdown. A leftover file from a
/// crashed run has to be inspected and removed by the operator.
struct PidGuard {
    // keeps the handle open exactly as long as the claim is held
    _file: fs::File,
}

impl PidGuard {
    fn acquire() -> ConfResult<Self> {
        let path = path::Path::new(PATH);
        if path.exists() {
            let holder = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(Error::in_use(format!(
                "datastores are claimed through {} by pid {}; remove the file if that engine is gone",
                PATH,
                holder.trim()
            )));
        }
        let mut file = fs::File::create(path)?;
        write!(file, "{}", process::id())?;
        Ok(Self { _file: file })
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(PATH) {
            log::warn!("Could not release the pid file {}: {}", PATH, e);
        }
    }
}
