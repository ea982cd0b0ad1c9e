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
use std::path::PathBuf;

/// Error types for instrument loading and validation. A failed load rejects the
/// whole instrument.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("Instrument definition error: {0}")]
    Definition(#[from] crate::config::ConfigError),

    #[error("Sample file {path} not found")]
    MissingSample { path: PathBuf },

    #[error("Failed to decode sample {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Sample {path} has no audio frames")]
    EmptySample { path: PathBuf },

    #[error("Invalid region {index}: {reason}")]
    InvalidRegion { index: usize, reason: String },

    #[error("Instrument has no regions")]
    NoRegions,
}
