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
use crate::merge::ModifyOp;

/// `change`: a path-addressed edit with an optional value
pub fn change(
    engine: &Engine,
    session: u64,
    db: &str,
    op: ModifyOp,
    xkey: &str,
    value: Option<&str>,
) -> ActionResult {
    engine.edit_path(session, db, op, xkey, value)?;
    Ok(ActionOutcome::Okay)
}

/// `xmlput`: an XML-payload edit
pub fn xmlput(engine: &Engine, session: u64, db: &str, op: ModifyOp, xml: &str) -> ActionResult {
    engine.edit_xml(session, db, op, xml)?;
    Ok(ActionOutcome::Okay)
}
