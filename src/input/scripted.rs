//! Replays a fixed sequence of held-key frames

use crate::input::{InputError, Key, KeySource, KeyStateWord, KeyStates};
use tracing::{debug, info};

/// Key source that advances one frame per refresh
///
/// Each frame lists the keys held during that poll. Once the frames run out
/// every key reads as released, unless the script loops.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    frames: Vec<Vec<Key>>,
    cursor: usize,
    looping: bool,
    states: KeyStates,
}

impl ScriptedKeys {
    pub fn new(frames: Vec<Vec<Key>>, looping: bool) -> Self {
        info!(
            "Scripted key source with {} frames (looping: {})",
            frames.len(),
            looping
        );
        Self {
            frames,
            cursor: 0,
            looping,
            states: KeyStates::default(),
        }
    }

    /// Builds a script from frames of key names such as `[["W"], [], ["E", "R"]]`
    pub fn from_names(frames: &[Vec<String>], looping: bool) -> Result<Self, InputError> {
        let frames = frames
            .iter()
            .map(|frame| {
                frame
                    .iter()
                    .map(|name| {
                        let mut chars = name.chars();
                        let key = match (chars.next(), chars.next()) {
                            (Some(c), None) => Key::from_char(c),
                            _ => None,
                        };
                        key.ok_or_else(|| InputError::UnknownKey(name.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(frames, looping))
    }

    /// True once a non-looping script has played every frame
    pub fn is_finished(&self) -> bool {
        !self.looping && self.cursor >= self.frames.len()
    }

    /// Index and keys of the frame to play next
    fn next_frame(&mut self) -> Option<(usize, &[Key])> {
        if self.cursor >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return None;
            }
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor += 1;
        Some((index, &self.frames[index]))
    }
}

impl KeySource for ScriptedKeys {
    fn refresh(&mut self) {
        let Some((index, frame)) = self.next_frame().map(|(i, keys)| (i, keys.to_vec())) else {
            self.states.release_all();
            return;
        };
        debug!("Script frame {}: {:?}", index, frame);
        for key in Key::PRIORITY {
            if frame.contains(&key) {
                self.states.press(key);
            } else {
                self.states.release(key);
            }
        }
    }

    fn key_state(&self, key: Key) -> KeyStateWord {
        self.states.word(key)
    }

    fn is_exhausted(&self) -> bool {
        self.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeyCheck, KeyInputReader, KeyState};

    fn names(frames: &[&[&str]]) -> Vec<Vec<String>> {
        frames
            .iter()
            .map(|frame| frame.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn plays_frames_in_order_then_goes_quiet() {
        let source = ScriptedKeys::from_names(&names(&[&["W"], &["s"], &[], &["E", "R"]]), false)
            .expect("valid script");
        let mut reader = KeyInputReader::new(source, KeyCheck::Masked);

        assert_eq!(reader.poll(), KeyState::W);
        assert_eq!(reader.poll(), KeyState::S);
        assert_eq!(reader.poll(), KeyState::None);
        assert_eq!(reader.poll(), KeyState::E);
        assert!(reader.source().is_finished());
        assert_eq!(reader.poll(), KeyState::None);
    }

    #[test]
    fn looping_script_wraps_around() {
        let source = ScriptedKeys::new(vec![vec![Key::W], vec![Key::D]], true);
        let mut reader = KeyInputReader::new(source, KeyCheck::Masked);

        let seen: Vec<_> = (0..5).map(|_| reader.poll()).collect();
        assert_eq!(
            seen,
            vec![KeyState::W, KeyState::D, KeyState::W, KeyState::D, KeyState::W]
        );
        assert!(!reader.source().is_finished());
    }

    #[test]
    fn frames_are_indexed_from_zero_across_wraps() {
        let mut source = ScriptedKeys::new(vec![vec![Key::W], vec![Key::S]], true);
        let played: Vec<_> = (0..5)
            .filter_map(|_| source.next_frame().map(|(index, keys)| (index, keys.to_vec())))
            .collect();
        assert_eq!(
            played,
            vec![
                (0, vec![Key::W]),
                (1, vec![Key::S]),
                (0, vec![Key::W]),
                (1, vec![Key::S]),
                (0, vec![Key::W]),
            ]
        );

        let mut source = ScriptedKeys::new(vec![vec![Key::E]], false);
        assert_eq!(source.next_frame().map(|(index, _)| index), Some(0));
        assert_eq!(source.next_frame().map(|(index, _)| index), None);
    }

    #[test]
    fn rejects_unknown_key_names() {
        let err = ScriptedKeys::from_names(&names(&[&["W"], &["X"]]), false).unwrap_err();
        assert!(matches!(err, InputError::UnknownKey(name) if name == "X"));

        let err = ScriptedKeys::from_names(&names(&[&["WA"]]), false).unwrap_err();
        assert!(matches!(err, InputError::UnknownKey(_)));
    }

    #[test]
    fn released_e_keeps_toggle_for_legacy_check() {
        let source = ScriptedKeys::new(vec![vec![Key::E], vec![]], false);
        let mut legacy = KeyInputReader::new(source.clone(), KeyCheck::Legacy);
        let mut masked = KeyInputReader::new(source, KeyCheck::Masked);

        assert_eq!(legacy.poll(), KeyState::E);
        assert_eq!(masked.poll(), KeyState::E);
        assert_eq!(legacy.poll(), KeyState::E);
        assert_eq!(masked.poll(), KeyState::None);
    }
}
