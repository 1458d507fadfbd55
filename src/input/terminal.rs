//! Terminal key source backed by crossterm raw mode
//!
//! Terminals deliver key events, not key state, so this module rebuilds
//! per-key state words from the event stream. Where the terminal reports
//! key releases (keyboard enhancement protocol) they clear the held bit
//! directly; elsewhere a key counts as released once no press or auto-repeat
//! event has arrived for the configured hold timeout. Losing focus releases
//! every key, and a much longer timeout still applies when releases are
//! reported, so a dropped release event cannot leave a key held.

use crate::input::{InputError, Key, KeySource, KeyStateWord, KeyStates};
use chrono::Local;
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Hold limit while the terminal reports releases
///
/// Auto-repeat keeps a held key fresh well inside this, so it only trips
/// when a release event went missing.
pub const LOST_RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

/// Keys that steer the host rather than the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Teleop,
    Autonomous,
    Test,
    Disable,
    Shutdown,
}

impl HostCommand {
    fn from_key_event(event: &KeyEvent) -> Option<Self> {
        match event.code {
            KeyCode::Esc => Some(HostCommand::Shutdown),
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(HostCommand::Shutdown)
            }
            KeyCode::Enter => Some(HostCommand::Teleop),
            KeyCode::Char(' ') => Some(HostCommand::Disable),
            KeyCode::Char('u') => Some(HostCommand::Autonomous),
            KeyCode::Char('t') => Some(HostCommand::Test),
            _ => None,
        }
    }
}

/// Rebuilds key state words from a stream of terminal key events
#[derive(Debug, Clone)]
pub struct KeyEventTracker {
    states: KeyStates,
    last_seen: [Option<Instant>; 7],
    hold_timeout: Duration,
    reports_release: bool,
}

impl KeyEventTracker {
    pub fn new(hold_timeout: Duration, reports_release: bool) -> Self {
        Self {
            states: KeyStates::default(),
            last_seen: [None; 7],
            hold_timeout,
            reports_release,
        }
    }

    /// Applies one key event; returns the host command it carries, if any
    pub fn handle(&mut self, event: &KeyEvent, now: Instant) -> Option<HostCommand> {
        if let Some(command) = HostCommand::from_key_event(event) {
            return (event.kind == KeyEventKind::Press).then_some(command);
        }

        let KeyCode::Char(c) = event.code else {
            return None;
        };
        let key = Key::from_char(c)?;

        match event.kind {
            KeyEventKind::Press => {
                if !self.states.word(key).is_down() {
                    debug!("Key {} down at {}", key, Local::now().format("%H:%M:%S.%3f"));
                }
                self.states.press(key);
                self.last_seen[key.index()] = Some(now);
            }
            KeyEventKind::Repeat => {
                self.states.press(key);
                self.last_seen[key.index()] = Some(now);
            }
            KeyEventKind::Release => {
                debug!("Key {} up at {}", key, Local::now().format("%H:%M:%S.%3f"));
                self.states.release(key);
                self.last_seen[key.index()] = None;
            }
        }
        None
    }

    /// How long a key stays held without a press or repeat event
    pub fn hold_limit(&self) -> Duration {
        if self.reports_release {
            self.hold_timeout.max(LOST_RELEASE_TIMEOUT)
        } else {
            self.hold_timeout
        }
    }

    /// Releases keys whose hold timed out
    pub fn expire_holds(&mut self, now: Instant) {
        let limit = self.hold_limit();
        for key in Key::PRIORITY {
            let Some(seen) = self.last_seen[key.index()] else {
                continue;
            };
            if now.saturating_duration_since(seen) >= limit {
                if self.reports_release {
                    warn!(
                        "Key {} held for {}ms without repeat, assuming its release was lost",
                        key,
                        limit.as_millis()
                    );
                } else {
                    debug!("Key {} hold expired", key);
                }
                self.states.release(key);
                self.last_seen[key.index()] = None;
            }
        }
    }

    /// Releases every key, e.g. when the terminal loses focus
    pub fn release_all(&mut self) {
        self.states.release_all();
        self.last_seen = [None; 7];
    }

    pub fn word(&self, key: Key) -> KeyStateWord {
        self.states.word(key)
    }
}

/// Runs `restore` on drop unless disarmed
///
/// Covers the window in [`TerminalKeys::open`] between entering raw mode and
/// handing ownership to [`TerminalKeys`], whose own `Drop` takes over.
struct RestoreGuard<F: FnMut()> {
    restore: Option<F>,
}

impl<F: FnMut()> RestoreGuard<F> {
    fn new(restore: F) -> Self {
        Self {
            restore: Some(restore),
        }
    }

    fn disarm(mut self) {
        self.restore = None;
    }
}

impl<F: FnMut()> Drop for RestoreGuard<F> {
    fn drop(&mut self) {
        if let Some(mut restore) = self.restore.take() {
            restore();
        }
    }
}

fn leave_raw_mode() {
    match terminal::disable_raw_mode() {
        Ok(()) => info!("Terminal restored"),
        Err(e) => error!("Failed to leave raw mode: {}", e),
    }
}

/// Key source reading the controlling terminal in raw mode
///
/// Raw mode is entered on construction and left again on drop.
pub struct TerminalKeys {
    tracker: KeyEventTracker,
    host_sender: mpsc::Sender<HostCommand>,
    enhanced: bool,
    focus_events: bool,
}

impl TerminalKeys {
    pub fn open(
        hold_timeout: Duration,
        host_sender: mpsc::Sender<HostCommand>,
    ) -> Result<Self, InputError> {
        info!("Switching terminal to raw mode");
        terminal::enable_raw_mode()?;
        let raw_mode = RestoreGuard::new(leave_raw_mode);

        let enhanced = match terminal::supports_keyboard_enhancement() {
            Ok(true) => {
                execute!(
                    stdout(),
                    PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
                )?;
                info!("Terminal reports key releases");
                true
            }
            Ok(false) => {
                info!(
                    "Terminal does not report key releases, holds expire after {}ms",
                    hold_timeout.as_millis()
                );
                false
            }
            Err(e) => {
                warn!("Unable to query keyboard enhancement support: {}", e);
                false
            }
        };

        let focus_events = match execute!(stdout(), EnableFocusChange) {
            Ok(()) => true,
            Err(e) => {
                warn!("Focus events unavailable, keys are not released on focus loss: {}", e);
                false
            }
        };

        raw_mode.disarm();
        Ok(Self {
            tracker: KeyEventTracker::new(hold_timeout, enhanced),
            host_sender,
            enhanced,
            focus_events,
        })
    }

    fn drain_events(&mut self) -> Result<(), InputError> {
        while event::poll(Duration::ZERO).map_err(|e| InputError::EventRead(e.to_string()))? {
            let event = event::read().map_err(|e| InputError::EventRead(e.to_string()))?;
            let key_event = match event {
                Event::Key(key_event) => key_event,
                Event::FocusLost => {
                    debug!("Terminal lost focus, releasing all keys");
                    self.tracker.release_all();
                    continue;
                }
                _ => continue,
            };
            if let Some(command) = self.tracker.handle(&key_event, Instant::now()) {
                info!("Host command: {:?}", command);
                if let Err(e) = self.host_sender.try_send(command) {
                    error!("Failed to forward host command: {}", e);
                }
            }
        }
        Ok(())
    }
}

impl KeySource for TerminalKeys {
    fn refresh(&mut self) {
        if let Err(e) = self.drain_events() {
            error!("Error reading terminal events: {}", e);
        }
        self.tracker.expire_holds(Instant::now());
    }

    fn key_state(&self, key: Key) -> KeyStateWord {
        self.tracker.word(key)
    }

    fn idle(&mut self) {
        self.refresh();
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if self.focus_events {
            if let Err(e) = execute!(stdout(), DisableFocusChange) {
                warn!("Failed to disable focus events: {}", e);
            }
        }
        if self.enhanced {
            if let Err(e) = execute!(stdout(), PopKeyboardEnhancementFlags) {
                warn!("Failed to restore keyboard flags: {}", e);
            }
        }
        leave_raw_mode();
    }
}
