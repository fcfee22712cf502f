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

pub mod terminal {
    //! Utilities for Terminal I/O

    use std::fmt;
    use std::io::Write;
    use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

    /// The severity classes the daemon writes to the terminal with
    #[derive(Debug, Clone, Copy)]
    pub enum Tone {
        Info,
        Warning,
        Error,
        Success,
    }

    impl Tone {
        const fn color(self) -> Color {
            match self {
                Self::Info => Color::Cyan,
                Self::Warning => Color::Yellow,
                Self::Error => Color::Red,
                Self::Success => Color::Green,
            }
        }
    }

    /// Write an item to stdout in the tone's color, resetting afterwards
    pub fn write_toned<T: fmt::Display>(item: T, tone: Tone) -> fmt::Result {
        let mut stdout = StandardStream::stdout(ColorChoice::Always);
        stdout
            .set_color(ColorSpec::new().set_fg(Some(tone.color())))
            .and_then(|_| write!(&mut stdout, "{}", item))
            .and_then(|_| stdout.reset())
            .map_err(|_| fmt::Error)
    }
    pub fn write_info<T: fmt::Display>(item: T) -> fmt::Result {
        write_toned(item, Tone::Info)
    }
    pub fn write_warning<T: fmt::Display>(item: T) -> fmt::Result {
        write_toned(item, Tone::Warning)
    }
    pub fn write_error<T: fmt::Display>(item: T) -> fmt::Result {
        write_toned(item, Tone::Error)
    }
    pub fn write_success<T: fmt::Display>(item: T) -> fmt::Result {
        write_toned(item, Tone::Success)
    }
}
