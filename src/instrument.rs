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

//! The instrument model: an ordered list of sample regions.

use std::fmt;

mod error;
mod loader;
mod region;

pub use error::InstrumentError;
pub use loader::InstrumentLoader;
pub use region::{Region, SampleData};

/// An immutable set of regions. Built off the audio thread and then shared.
pub struct Instrument {
    name: String,
    regions: Vec<Region>,
}

impl Instrument {
    /// Creates a new instrument, validating every region.
    pub fn new(name: &str, regions: Vec<Region>) -> Result<Instrument, InstrumentError> {
        if regions.is_empty() {
            return Err(InstrumentError::NoRegions);
        }
        for (index, region) in regions.iter().enumerate() {
            region
                .validate()
                .map_err(|reason| InstrumentError::InvalidRegion { index, reason })?;
        }
        Ok(Instrument {
            name: name.to_string(),
            regions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Returns the indices of every region that matches the note and velocity,
    /// in definition order. Overlapping regions all sound together.
    pub fn matching(&self, note: u8, velocity: u8) -> impl Iterator<Item = usize> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter(move |(_, region)| region.matches(note, velocity))
            .map(|(index, _)| index)
    }
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("regions", &self.regions.len())
            .finish()
    }
}
