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

use crate::dbnet::Terminator;
use crate::engine::Engine;
use tokio::time::{self, Duration};

/// How often the stream sweep runs
const STREAM_TIMER_TIMEOUT_S: u64 = 5;

/// The stream timer service
///
/// Every five seconds this walks all streams, expiring subscriptions whose
/// stop-time has passed (their sessions get a terminal indicator) and
/// dropping replay entries that fell out of the retention window. The
/// service winds down when the engine terminates.
pub async fn stream_timer_service(engine: Engine, mut terminator: Terminator) {
    let duration = Duration::from_secs(STREAM_TIMER_TIMEOUT_S);
    loop {
        tokio::select! {
            _ = time::sleep_until(time::Instant::now() + duration) => {
                engine.timer_sweep();
            }
            _ = terminator.receive_signal() => break,
        }
    }
    log::info!("Stream timer service has exited");
}
