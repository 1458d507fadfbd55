//! Keyboard teleoperation for the differential drive

use crate::drive::{MotorCommand, MotorOutput};
use crate::input::{KeyInputReader, KeySource, KeyState};
use tracing::debug;

/// Maps a key stroke to drive power
///
/// A, D and Q are read by the key reader but have no entry here, and `'0'`
/// never comes out of the reader. Strokes without an entry leave the
/// motors untouched.
pub const fn command_for(stroke: char) -> Option<MotorCommand> {
    match stroke {
        // forward
        'W' => Some(MotorCommand::new(0.1, 0.1)),
        // pivot left
        'E' => Some(MotorCommand::new(0.0, 0.1)),
        // backward
        'S' => Some(MotorCommand::new(-0.1, -0.1)),
        // pivot right
        'R' => Some(MotorCommand::new(0.1, 0.0)),
        '0' => Some(MotorCommand::STOP),
        _ => None,
    }
}

/// Owns the key reader and both drive motors
pub struct TeleopController<S: KeySource, M: MotorOutput> {
    reader: KeyInputReader<S>,
    left: M,
    right: M,
    last_key: KeyState,
}

impl<S: KeySource, M: MotorOutput> TeleopController<S, M> {
    pub fn new(reader: KeyInputReader<S>, left: M, right: M) -> Self {
        Self {
            reader,
            left,
            right,
            last_key: KeyState::None,
        }
    }

    /// Polls one key and drives the motors from it
    ///
    /// Returns the command written, or `None` when the key has no entry in
    /// the drive table and the motors keep their last command.
    pub fn step(&mut self) -> Option<MotorCommand> {
        let key = self.reader.poll();
        if key != self.last_key {
            debug!("Teleop key {:?} -> {:?}", self.last_key, key);
            self.last_key = key;
        }
        self.apply(key.stroke())
    }

    /// Writes the table entry for `stroke` to both motors
    pub fn apply(&mut self, stroke: char) -> Option<MotorCommand> {
        let command = command_for(stroke)?;
        self.left.set(command.left);
        self.right.set(command.right);
        Some(command)
    }

    pub fn stop(&mut self) {
        self.left.stop();
        self.right.stop();
    }

    /// Power currently requested on each side
    pub fn output(&self) -> MotorCommand {
        MotorCommand::new(self.left.get(), self.right.get())
    }

    pub fn last_key(&self) -> KeyState {
        self.last_key
    }

    pub fn reader(&self) -> &KeyInputReader<S> {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut KeyInputReader<S> {
        &mut self.reader
    }

    pub fn motors(&self) -> (&M, &M) {
        (&self.left, &self.right)
    }

    pub fn motors_mut(&mut self) -> (&mut M, &mut M) {
        (&mut self.left, &mut self.right)
    }
}
