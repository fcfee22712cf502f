/*
 * Created on Tue Jul 14 2026
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

//! # The query engine
//!
//! Maps a decoded request onto its action handler and writes exactly one
//! reply frame: `OK`, `REPLY` or `ERR`. Engine errors never terminate the
//! session; only I/O failures bubble up to the connection loop.

use crate::actions::{self, ActionOutcome, ActionResult};
use crate::dbnet::Connection;
use crate::engine::Engine;
use crate::protocol::{Request, Response};
use crate::IoResult;

fn dispatch(engine: &Engine, session: u64, req: Request) -> ActionResult {
    match req {
        Request::Commit => actions::commit::run(engine, session),
        Request::Validate => actions::validate::run(engine),
        Request::Change {
            db,
            op,
            xkey,
            value,
        } => actions::edit::change(engine, session, &db, op, &xkey, value.as_deref()),
        Request::XmlPut { db, op, xml } => actions::edit::xmlput(engine, session, &db, op, &xml),
        Request::Save {
            db,
            snapshot,
            filename,
        } => actions::save::run(engine, &db, snapshot, &filename),
        Request::Load {
            db,
            replace,
            filename,
        } => actions::load::run(engine, session, &db, replace, &filename),
        Request::Copy { src, dst } => actions::copy::run(engine, session, &src, &dst),
        Request::Lock { db } => actions::lockops::lock(engine, session, &db),
        Request::Unlock { db } => actions::lockops::unlock(engine, session, &db),
        Request::Kill { session: peer } => actions::kill::run(engine, peer),
        Request::Debug { level } => actions::debug::run(engine, level),
        Request::Call { tag, payload } => actions::call::run(engine, &tag, &payload),
        Request::Subscription {
            status,
            stream,
            filter,
            starttime,
            stoptime,
        } => actions::subscribe::run(
            engine, session, status, &stream, filter, starttime, stoptime,
        ),
        Request::Get { db, xpath } => actions::get::run(engine, &db, &xpath),
    }
}

/// Execute one request and write its reply
pub async fn execute(
    engine: &Engine,
    con: &mut Connection,
    session: u64,
    req: Request,
) -> IoResult<()> {
    let reply = match dispatch(engine, session, req) {
        Ok(ActionOutcome::Okay) => Response::Ok,
        Ok(ActionOutcome::Reply(bytes)) => Response::Reply(bytes),
        Err(e) => {
            log::debug!("Session {} request failed: {}", session, e);
            Response::err_from(&e)
        }
    };
    con.write_response(&reply).await
}
