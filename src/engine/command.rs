// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use crossbeam_channel::{Receiver, Sender};

use crate::engine::source::{SourceEntry, SourceHandle};

/// The mixer's table of providers, indexed by source handle.
pub(crate) type SourceTable = Vec<Option<SourceEntry>>;

pub(crate) enum Command {
    /// Replaces the mixer's table with a larger one allocated on the control thread.
    Grow(SourceTable),
    Register(SourceEntry),
    Unload(SourceHandle),
}

/// Allocations the mixer hands back to be dropped on the control thread.
pub(crate) enum Garbage {
    Source(SourceEntry),
    Table(SourceTable),
}

pub(crate) struct Channels {
    pub commands: (Sender<Command>, Receiver<Command>),
    pub garbage: (Sender<Garbage>, Receiver<Garbage>),
}

impl Channels {
    /// Every command returns at most one piece of garbage, so the garbage queue gets the same
    /// capacity as the command queue.
    pub(crate) fn bounded(capacity: usize) -> Channels {
        Channels {
            commands: crossbeam_channel::bounded(capacity),
            garbage: crossbeam_channel::bounded(capacity),
        }
    }
}
