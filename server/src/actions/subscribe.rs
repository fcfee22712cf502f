/*
 * Created on Mon Jul 13 2026
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

use super::{ActionOutcome, ActionResult};
use crate::engine::Engine;
use crate::util::error::{ConfResult, Error};
use chrono::{DateTime, Utc};
use std::time::Duration;

fn parse_time(raw: Option<String>) -> ConfResult<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| Error::malformed(format!("bad timestamp `{}`: {}", raw, e))),
    }
}

/// Create (status set) or cancel a subscription on a stream. A start-time
/// schedules a near-now one-shot that replays the stream's buffer into the
/// new subscription.
pub fn run(
    engine: &Engine,
    session: u64,
    status: bool,
    stream: &str,
    filter: Option<String>,
    starttime: Option<String>,
    stoptime: Option<String>,
) -> ActionResult {
    let starttime = parse_time(starttime)?;
    let stoptime = parse_time(stoptime)?;
    let wants_replay = engine.subscribe(session, status, stream, filter, starttime, stoptime)?;
    if wants_replay {
        let engine = engine.clone();
        let stream = stream.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            engine.run_replay(&stream, session);
        });
    }
    Ok(ActionOutcome::Okay)
}
