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

//! Request handlers, one module per request kind. Every handler maps a
//! decoded request onto engine operations and yields either a bare `ok` or
//! an opaque reply payload; errors bubble up to the dispatcher which turns
//! them into `ERR` frames.

pub mod call;
pub mod commit;
pub mod copy;
pub mod debug;
pub mod edit;
pub mod get;
pub mod kill;
pub mod load;
pub mod lockops;
pub mod save;
pub mod subscribe;
pub mod validate;

use crate::util::error::ConfResult;

/// What a successful handler produces
pub enum ActionOutcome {
    /// Reply with a bare `OK` frame
    Okay,
    /// Reply with an opaque `REPLY` frame
    Reply(Vec<u8>),
}

pub type ActionResult = ConfResult<ActionOutcome>;
