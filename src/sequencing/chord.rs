#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SynthError},
    sequencing::notes::Key,
};

/// Semitone offsets of a major seventh chord: root, major third, fifth, major seventh.
///
/// The triad is the first three entries.
pub const MAJOR_SEVENTH: [i32; 4] = [0, 4, 7, 11];

/// What a single key press turns into.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChordMode {
    /// Just the pressed key.
    #[default]
    Off,
    /// Major triad, all notes at once.
    ChordTriad,
    /// Major seventh chord, all notes at once.
    ChordSeventh,
    /// Major triad, one note after the other, repeating.
    ArpTriad,
    /// Major seventh chord, one note after the other, repeating.
    ArpSeventh,
}

impl ChordMode {
    pub fn name(self) -> &'static str {
        match self {
            ChordMode::Off => "off",
            ChordMode::ChordTriad => "chord_triad",
            ChordMode::ChordSeventh => "chord_seventh",
            ChordMode::ArpTriad => "arp_triad",
            ChordMode::ArpSeventh => "arp_seventh",
        }
    }

    /// Notes in the expanded set.
    pub fn note_count(self) -> usize {
        match self {
            ChordMode::Off => 1,
            ChordMode::ChordTriad | ChordMode::ArpTriad => 3,
            ChordMode::ChordSeventh | ChordMode::ArpSeventh => 4,
        }
    }

    /// True when the notes sound together as one voice.
    pub fn is_chord(self) -> bool {
        matches!(self, ChordMode::ChordTriad | ChordMode::ChordSeventh)
    }

    /// True when the notes are scheduled one after another.
    pub fn is_arpeggio(self) -> bool {
        matches!(self, ChordMode::ArpTriad | ChordMode::ArpSeventh)
    }
}

impl std::fmt::Display for ChordMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ChordMode {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off" => Ok(ChordMode::Off),
            "chord_triad" | "chords3" => Ok(ChordMode::ChordTriad),
            "chord_seventh" | "chords4" => Ok(ChordMode::ChordSeventh),
            "arp_triad" | "arpeggio3" => Ok(ChordMode::ArpTriad),
            "arp_seventh" | "arpeggio4" => Ok(ChordMode::ArpSeventh),
            other => Err(SynthError::invalid("arpeggio.mode", other)),
        }
    }
}

/// Expand a pressed key into the keys `mode` plays, root first.
///
/// Octaves carry when an interval crosses B to C, so `expand(A4, ChordTriad)`
/// yields A4, C#5, E5.
pub fn expand(root: Key, mode: ChordMode) -> Vec<Key> {
    MAJOR_SEVENTH[..mode.note_count()]
        .iter()
        .map(|&offset| root.transpose(offset))
        .collect()
}

/// Space-separated note names, for status messages.
pub fn describe(keys: &[Key]) -> String {
    keys.iter()
        .map(|key| key.note.name())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::notes::Note;

    #[test]
    fn off_is_the_root() {
        let root = Key::new(Note::D, 3);
        assert_eq!(expand(root, ChordMode::Off), vec![root]);
    }

    #[test]
    fn c_major_seventh() {
        let keys = expand(Key::new(Note::C, 4), ChordMode::ChordSeventh);
        assert_eq!(
            keys,
            vec![
                Key::new(Note::C, 4),
                Key::new(Note::E, 4),
                Key::new(Note::G, 4),
                Key::new(Note::B, 4),
            ]
        );
        assert_eq!(describe(&keys), "C E G B");
    }

    #[test]
    fn triad_is_prefix_of_seventh() {
        for midi in 24..96 {
            let root = Key::from_midi(midi);
            let triad = expand(root, ChordMode::ChordTriad);
            let seventh = expand(root, ChordMode::ChordSeventh);
            assert_eq!(triad.len(), 3);
            assert_eq!(triad[..], seventh[..3]);
            assert_eq!(expand(root, ChordMode::ArpTriad), triad);
            assert_eq!(expand(root, ChordMode::ArpSeventh), seventh);
        }
    }

    #[test]
    fn intervals_carry_into_next_octave() {
        let keys = expand(Key::new(Note::A, 4), ChordMode::ChordTriad);
        assert_eq!(keys[1], Key::new(Note::Cs, 5));
        assert_eq!(keys[2], Key::new(Note::E, 5));
    }

    #[test]
    fn accepts_legacy_mode_names() {
        assert_eq!("arpeggio3".parse::<ChordMode>(), Ok(ChordMode::ArpTriad));
        assert_eq!("chord_seventh".parse::<ChordMode>(), Ok(ChordMode::ChordSeventh));
        assert!("minor".parse::<ChordMode>().is_err());
    }
}
