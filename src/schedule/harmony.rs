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

//! Automatic harmony: expands one root note into a chord.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// The chord built on top of each played note.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HarmonyType {
    /// Play the root only.
    #[default]
    None,
    Octave,
    Fifth,
    Major,
    Minor,
}

impl HarmonyType {
    pub const ALL: [HarmonyType; 5] = [
        HarmonyType::None,
        HarmonyType::Octave,
        HarmonyType::Fifth,
        HarmonyType::Major,
        HarmonyType::Minor,
    ];

    /// Semitone offsets added above the root.
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            HarmonyType::None => &[],
            HarmonyType::Octave => &[12],
            HarmonyType::Fifth => &[7],
            HarmonyType::Major => &[4, 7],
            HarmonyType::Minor => &[3, 7],
        }
    }

    /// Expands a root into its full note set, dropping notes above 127.
    pub fn expand(&self, root: u8) -> Vec<u8> {
        std::iter::once(root)
            .chain(
                self.intervals()
                    .iter()
                    .map(|interval| root as u16 + *interval as u16)
                    .filter(|note| *note <= 127)
                    .map(|note| note as u8),
            )
            .collect()
    }
}

impl fmt::Display for HarmonyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HarmonyType::None => "none",
            HarmonyType::Octave => "octave",
            HarmonyType::Fifth => "fifth",
            HarmonyType::Major => "major",
            HarmonyType::Minor => "minor",
        };
        f.write_str(name)
    }
}

impl FromStr for HarmonyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HarmonyType::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown harmony type {s}"))
    }
}

/// The change needed to move one held root to a new harmony type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reharmonization {
    pub root: u8,
    pub to_remove: Vec<u8>,
    pub to_add: Vec<u8>,
}

struct HarmonyState {
    harmony_type: HarmonyType,
    /// The notes that were sounded for each held root.
    held: BTreeMap<u8, Vec<u8>>,
}

/// Tracks held roots and the chord notes issued for each of them.
pub struct Harmony {
    state: Mutex<HarmonyState>,
}

impl Harmony {
    pub fn new(harmony_type: HarmonyType) -> Self {
        Self {
            state: Mutex::new(HarmonyState {
                harmony_type,
                held: BTreeMap::new(),
            }),
        }
    }

    pub fn harmony_type(&self) -> HarmonyType {
        self.state.lock().harmony_type
    }

    /// Returns the notes to start for the root and remembers them.
    pub fn note_on(&self, root: u8) -> Vec<u8> {
        let mut state = self.state.lock();
        let notes = state.harmony_type.expand(root);
        state.held.insert(root, notes.clone());
        notes
    }

    /// Returns the notes to stop for the root. These are exactly the notes
    /// issued for it, including any live reharmonization since.
    pub fn note_off(&self, root: u8) -> Vec<u8> {
        let mut state = self.state.lock();
        match state.held.remove(&root) {
            Some(notes) => notes,
            None => state.harmony_type.expand(root),
        }
    }

    /// Changes the harmony type and returns the per-root changes for every held
    /// root whose note set differs.
    pub fn set_type(&self, harmony_type: HarmonyType) -> Vec<Reharmonization> {
        let mut state = self.state.lock();
        state.harmony_type = harmony_type;

        let mut changes = Vec::new();
        for (root, notes) in state.held.iter_mut() {
            let updated = harmony_type.expand(*root);
            let to_remove: Vec<u8> = notes
                .iter()
                .filter(|n| !updated.contains(n))
                .copied()
                .collect();
            let to_add: Vec<u8> = updated
                .iter()
                .filter(|n| !notes.contains(n))
                .copied()
                .collect();
            if !to_remove.is_empty() || !to_add.is_empty() {
                changes.push(Reharmonization {
                    root: *root,
                    to_remove,
                    to_add,
                });
            }
            *notes = updated;
        }
        changes
    }

    /// The roots currently held, ascending.
    pub fn held_roots(&self) -> Vec<u8> {
        self.state.lock().held.keys().copied().collect()
    }

    /// Forgets every held root.
    pub fn clear(&self) {
        self.state.lock().held.clear();
    }
}

impl fmt::Debug for Harmony {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Harmony")
            .field("harmony_type", &state.harmony_type)
            .field("held", &state.held.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chords_on_middle_c() {
        let cases = [
            (HarmonyType::None, vec![60]),
            (HarmonyType::Octave, vec![60, 72]),
            (HarmonyType::Fifth, vec![60, 67]),
            (HarmonyType::Major, vec![60, 64, 67]),
            (HarmonyType::Minor, vec![60, 63, 67]),
        ];
        for (harmony_type, expected) in cases {
            let harmony = Harmony::new(harmony_type);
            assert_eq!(harmony.note_on(60), expected, "{harmony_type}");
        }
    }

    #[test]
    fn test_never_above_127() {
        for harmony_type in HarmonyType::ALL {
            for root in 0..=127u8 {
                let notes = harmony_type.expand(root);
                assert_eq!(notes[0], root);
                assert!(notes.iter().all(|n| *n <= 127));
            }
        }
        assert_eq!(HarmonyType::Major.expand(122), vec![122, 126]);
        assert_eq!(HarmonyType::Octave.expand(120), vec![120]);
    }

    #[test]
    fn test_note_off_returns_note_on_set() {
        let harmony = Harmony::new(HarmonyType::Major);
        for root in 0..=127u8 {
            let on = harmony.note_on(root);
            assert_eq!(harmony.note_off(root), on);
        }
        assert!(harmony.held_roots().is_empty());
    }

    #[test]
    fn test_note_off_after_type_change_uses_issued_notes() {
        let harmony = Harmony::new(HarmonyType::Minor);
        harmony.note_on(60);
        harmony.set_type(HarmonyType::Octave);
        assert_eq!(harmony.note_off(60), vec![60, 72]);

        // A root pressed under the old type and not reharmonized is still
        // released with what it actually sounded.
        let harmony = Harmony::new(HarmonyType::Fifth);
        let on = harmony.note_on(50);
        assert_eq!(harmony.note_off(50), on);
    }

    #[test]
    fn test_reharmonize_diff() {
        let harmony = Harmony::new(HarmonyType::Major);
        harmony.note_on(60);
        harmony.note_on(62);

        let changes = harmony.set_type(HarmonyType::Minor);
        assert_eq!(
            changes,
            vec![
                Reharmonization {
                    root: 60,
                    to_remove: vec![64],
                    to_add: vec![63],
                },
                Reharmonization {
                    root: 62,
                    to_remove: vec![66],
                    to_add: vec![65],
                },
            ]
        );

        // Shared notes are left alone.
        let changes = harmony.set_type(HarmonyType::Fifth);
        assert_eq!(changes[0].to_remove, vec![63]);
        assert!(changes[0].to_add.is_empty());

        // Nothing changes when the type stays the same.
        assert!(harmony.set_type(HarmonyType::Fifth).is_empty());
        assert_eq!(harmony.held_roots(), vec![60, 62]);
    }

    #[test]
    fn test_parse() {
        assert_eq!("major".parse::<HarmonyType>(), Ok(HarmonyType::Major));
        assert_eq!("OCTAVE".parse::<HarmonyType>(), Ok(HarmonyType::Octave));
        assert!("seventh".parse::<HarmonyType>().is_err());
    }
}
