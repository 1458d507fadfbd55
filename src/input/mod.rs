//! Keyboard input for teleoperation
//!
//! Splits key polling into two halves:
//!
//! 1. [`KeySource`] - platform query for the raw state word of one key
//! 2. [`KeyInputReader`] - fixed priority scan over the tracked keys
//!
//! # Architecture
//!
//! ```text
//! Terminal / Script ──► KeySource ──► KeyInputReader ──► KeyState
//!                      (raw words)    (W A S D Q E R)
//! ```
//!
//! Backends live in [`terminal`] (crossterm raw mode) and [`scripted`]
//! (replayed frames, used for dry runs and tests).

pub mod error;
pub mod scripted;
pub mod terminal;

pub use error::InputError;
pub use scripted::ScriptedKeys;
pub use terminal::{HostCommand, TerminalKeys};

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use tracing::{debug, warn};

/// The keys the reader tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
    R,
}

impl Key {
    /// Scan order used by [`KeyInputReader::poll`]; earlier keys win
    pub const PRIORITY: [Key; 7] = [Key::W, Key::A, Key::S, Key::D, Key::Q, Key::E, Key::R];

    /// Position of this key in [`Key::PRIORITY`]
    pub const fn index(self) -> usize {
        match self {
            Key::W => 0,
            Key::A => 1,
            Key::S => 2,
            Key::D => 3,
            Key::Q => 4,
            Key::E => 5,
            Key::R => 6,
        }
    }

    /// Upper-case character printed on the key
    pub const fn as_char(self) -> char {
        match self {
            Key::W => 'W',
            Key::A => 'A',
            Key::S => 'S',
            Key::D => 'D',
            Key::Q => 'Q',
            Key::E => 'E',
            Key::R => 'R',
        }
    }

    /// Looks up a tracked key by character, ignoring case
    pub fn from_char(c: char) -> Option<Key> {
        match c.to_ascii_uppercase() {
            'W' => Some(Key::W),
            'A' => Some(Key::A),
            'S' => Some(Key::S),
            'D' => Some(Key::D),
            'Q' => Some(Key::Q),
            'E' => Some(Key::E),
            'R' => Some(Key::R),
            _ => None,
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Result of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyState {
    W,
    A,
    S,
    D,
    Q,
    E,
    R,
    #[default]
    None,
}

impl KeyState {
    /// Character handed to the teleop table; `'\0'` when nothing is held
    pub const fn stroke(self) -> char {
        match self {
            KeyState::W => 'W',
            KeyState::A => 'A',
            KeyState::S => 'S',
            KeyState::D => 'D',
            KeyState::Q => 'Q',
            KeyState::E => 'E',
            KeyState::R => 'R',
            KeyState::None => '\0',
        }
    }
}

impl From<Key> for KeyState {
    fn from(key: Key) -> Self {
        match key {
            Key::W => KeyState::W,
            Key::A => KeyState::A,
            Key::S => KeyState::S,
            Key::D => KeyState::D,
            Key::Q => KeyState::Q,
            Key::E => KeyState::E,
            Key::R => KeyState::R,
        }
    }
}

/// Raw 16-bit state of one key as reported by the platform
///
/// Bit 15 marks the key as held down. Bit 0 is a toggle that flips on
/// every fresh press and survives the release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyStateWord(pub u16);

impl KeyStateWord {
    pub const DOWN: u16 = 0x8000;
    pub const TOGGLED: u16 = 0x0001;

    pub const fn is_down(self) -> bool {
        self.0 & Self::DOWN != 0
    }

    pub const fn is_toggled(self) -> bool {
        self.0 & Self::TOGGLED != 0
    }

    /// The product test used for E by the legacy check
    ///
    /// Widened to 32 bits before multiplying, so the result is nonzero for
    /// any nonzero word, including a word with only the toggle bit set.
    pub const fn legacy_product_test(self) -> bool {
        (self.0 as i16 as i32).wrapping_mul(0x8000) != 0
    }
}

/// How the reader decides whether a key state word means "held"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCheck {
    /// Mask test on bit 15 for every key
    #[default]
    Masked,
    /// Mask test for every key except E, which uses the product test
    Legacy,
}

impl KeyCheck {
    pub fn is_held(self, key: Key, word: KeyStateWord) -> bool {
        match (self, key) {
            (KeyCheck::Legacy, Key::E) => word.legacy_product_test(),
            _ => word.is_down(),
        }
    }
}

impl Display for KeyCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCheck::Masked => write!(f, "masked"),
            KeyCheck::Legacy => write!(f, "legacy"),
        }
    }
}

/// Platform query for key state
pub trait KeySource {
    /// Pulls pending platform events; called once at the start of every poll
    fn refresh(&mut self) {}

    /// Current state word for `key`
    fn key_state(&self, key: Key) -> KeyStateWord;

    /// Called on every tick while the reader is not polled
    ///
    /// Sources that share a channel with host controls use this to keep
    /// draining it outside teleop.
    fn idle(&mut self) {}

    /// True once the source will never report another key
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Per-key state words shared by the backends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStates {
    words: [KeyStateWord; 7],
}

impl KeyStates {
    /// Marks `key` held. A press on a key that was up flips its toggle bit.
    pub fn press(&mut self, key: Key) {
        let word = &mut self.words[key.index()];
        if !word.is_down() {
            word.0 ^= KeyStateWord::TOGGLED;
        }
        word.0 |= KeyStateWord::DOWN;
    }

    pub fn release(&mut self, key: Key) {
        self.words[key.index()].0 &= !KeyStateWord::DOWN;
    }

    pub fn release_all(&mut self) {
        for key in Key::PRIORITY {
            self.release(key);
        }
    }

    pub fn word(&self, key: Key) -> KeyStateWord {
        self.words[key.index()]
    }
}

/// Scans the tracked keys in priority order and reports the first one held
#[derive(Debug)]
pub struct KeyInputReader<S: KeySource> {
    source: S,
    check: KeyCheck,
}

impl<S: KeySource> KeyInputReader<S> {
    pub fn new(source: S, check: KeyCheck) -> Self {
        if check == KeyCheck::Legacy {
            warn!("Key reader uses the legacy check: E reads as held whenever its state word is nonzero");
        } else {
            debug!("Key reader uses the masked check");
        }
        Self { source, check }
    }

    pub fn check(&self) -> KeyCheck {
        self.check
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Refreshes the source once, then returns the first held key
    pub fn poll(&mut self) -> KeyState {
        self.source.refresh();
        Key::PRIORITY
            .into_iter()
            .find(|&key| self.check.is_held(key, self.source.key_state(key)))
            .map(KeyState::from)
            .unwrap_or(KeyState::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FixedKeys {
        states: KeyStates,
        refreshes: usize,
    }

    impl KeySource for FixedKeys {
        fn refresh(&mut self) {
            self.refreshes += 1;
        }

        fn key_state(&self, key: Key) -> KeyStateWord {
            self.states.word(key)
        }
    }

    fn reader_with(keys: &[Key], check: KeyCheck) -> KeyInputReader<FixedKeys> {
        let mut source = FixedKeys::default();
        for &key in keys {
            source.states.press(key);
        }
        KeyInputReader::new(source, check)
    }

    #[test]
    fn each_key_alone_is_reported() {
        for key in Key::PRIORITY {
            let mut reader = reader_with(&[key], KeyCheck::Masked);
            assert_eq!(reader.poll(), KeyState::from(key), "key {key}");
        }
    }

    #[test]
    fn nothing_held_reports_none() {
        let mut reader = reader_with(&[], KeyCheck::Masked);
        assert_eq!(reader.poll(), KeyState::None);
        assert_eq!(reader.poll().stroke(), '\0');
    }

    #[test]
    fn earliest_key_in_priority_wins() {
        let mut reader = reader_with(&[Key::R, Key::S, Key::A], KeyCheck::Masked);
        assert_eq!(reader.poll(), KeyState::A);

        let mut reader = reader_with(&[Key::E, Key::Q], KeyCheck::Masked);
        assert_eq!(reader.poll(), KeyState::Q);

        let mut reader = reader_with(&Key::PRIORITY, KeyCheck::Masked);
        assert_eq!(reader.poll(), KeyState::W);
    }

    #[test]
    fn poll_refreshes_source_once() {
        let mut reader = reader_with(&[], KeyCheck::Masked);
        reader.poll();
        reader.poll();
        assert_eq!(reader.source().refreshes, 2);
    }

    #[test]
    fn released_key_falls_through_to_next() {
        let mut reader = reader_with(&[Key::W, Key::S], KeyCheck::Masked);
        assert_eq!(reader.poll(), KeyState::W);
        reader.source_mut().states.release(Key::W);
        assert_eq!(reader.poll(), KeyState::S);
    }

    #[test]
    fn toggle_bit_flips_on_fresh_press_only() {
        let mut states = KeyStates::default();
        states.press(Key::E);
        assert!(states.word(Key::E).is_toggled());
        states.press(Key::E);
        assert!(states.word(Key::E).is_toggled());
        states.release(Key::E);
        assert_eq!(states.word(Key::E), KeyStateWord(KeyStateWord::TOGGLED));
        states.press(Key::E);
        states.release(Key::E);
        assert_eq!(states.word(Key::E), KeyStateWord(0));
    }

    #[test]
    fn legacy_check_reads_toggled_e_as_held() {
        let mut reader = reader_with(&[Key::E], KeyCheck::Legacy);
        reader.source_mut().states.release(Key::E);
        assert_eq!(reader.poll(), KeyState::E);

        let mut reader = reader_with(&[Key::E], KeyCheck::Masked);
        reader.source_mut().states.release(Key::E);
        assert_eq!(reader.poll(), KeyState::None);
    }

    #[test]
    fn legacy_check_only_affects_e() {
        let mut reader = reader_with(&[Key::R], KeyCheck::Legacy);
        reader.source_mut().states.release(Key::R);
        assert_eq!(reader.poll(), KeyState::None);
    }

    #[test]
    fn product_test_matches_any_nonzero_word() {
        assert!(!KeyStateWord(0).legacy_product_test());
        assert!(KeyStateWord(0x0001).legacy_product_test());
        assert!(KeyStateWord(0x8000).legacy_product_test());
        assert!(KeyStateWord(0x8001).legacy_product_test());
    }

    #[test]
    fn key_chars_round_trip_case_insensitively() {
        for key in Key::PRIORITY {
            assert_eq!(Key::from_char(key.as_char()), Some(key));
            assert_eq!(Key::from_char(key.as_char().to_ascii_lowercase()), Some(key));
        }
        assert_eq!(Key::from_char('0'), None);
    }
}
