/*
 * Created on Tue Jul 07 2026
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

//! Tools for rotating snapshots
//!
//! The archive directory holds files `0`..`N-1`, `0` being the most recent.
//! Taking a snapshot renames `i` to `i+1` for `i = N-2..0`, then writes the
//! current tree as `0`. The file previously at `N-1` is overwritten by the
//! rotation, which is how snapshots beyond the configured count get
//! discarded.

use crate::util::error::{ConfResult, Error};
use std::fs;
use std::path::Path;

/// Rotate the archive under `dir` and write `payload` as snapshot `0`
pub fn rotate(dir: &Path, count: usize, payload: &str) -> ConfResult<()> {
    let meta = fs::metadata(dir)
        .map_err(|e| Error::operation_failed(format!("{}: {}", dir.display(), e)))?;
    if !meta.is_dir() {
        return Err(Error::operation_failed(format!(
            "{}: not a directory",
            dir.display()
        )));
    }
    for i in (1..count).rev() {
        let from = dir.join((i - 1).to_string());
        let to = dir.join(i.to_string());
        if from.exists() {
            fs::rename(&from, &to)?;
        }
    }
    fs::write(dir.join("0"), payload.as_bytes())?;
    Ok(())
}
