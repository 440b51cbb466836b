//! Keyboard capture
//! This module turns raw-mode keystrokes into input events on a channel.
//! Reading happens on a detached thread so the async session loop never
//! blocks on the terminal.

use std::collections::HashMap;
use std::io;
use std::thread;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::core::session::InputEvent;

/// Puts the terminal into raw mode and restores it when dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Restores the terminal on exit paths where the reader thread is still
/// parked inside `event::read`. Calling it twice is harmless.
pub fn restore_terminal() {
    let _ = disable_raw_mode();
}

/// Maps one key event through the bindings. Ctrl-C always quits, whatever
/// the bindings say; repeats and releases are ignored.
fn resolve_key(key: &KeyEvent, bindings: &HashMap<char, InputEvent>) -> Option<InputEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(InputEvent::Quit)
        }
        KeyCode::Char(c) => bindings.get(&c).copied(),
        _ => None,
    }
}

/// Enables raw mode and spawns the detached reader thread. Events flow into
/// `tx`; the thread exits after delivering a quit or when the session side
/// of the channel closes.
pub fn spawn_key_reader(
    bindings: HashMap<char, InputEvent>,
    tx: mpsc::Sender<InputEvent>,
) -> io::Result<()> {
    let guard = RawModeGuard::new()?;

    thread::spawn(move || {
        let _guard = guard;
        loop {
            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Keyboard read failed: {}", e);
                    break;
                }
            };
            let Some(input) = resolve_key(&key, &bindings) else {
                if let KeyCode::Char(c) = key.code {
                    if key.kind == KeyEventKind::Press {
                        debug!("Key '{}' is not bound", c);
                    }
                }
                continue;
            };
            let quitting = input == InputEvent::Quit;
            if tx.blocking_send(input).is_err() {
                break;
            }
            if quitting {
                break;
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainConfig;
    use crate::core::protocol::{Direction, Speed};

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn bound_keys_resolve_through_the_config() {
        let bindings = TrainConfig::default().bindings();
        assert_eq!(
            resolve_key(&press(KeyCode::Char('F'), KeyModifiers::SHIFT), &bindings),
            Some(InputEvent::Drive {
                direction: Direction::Forward,
                speed: Speed::Fast
            })
        );
        assert_eq!(
            resolve_key(&press(KeyCode::Char('q'), KeyModifiers::NONE), &bindings),
            Some(InputEvent::Quit)
        );
        assert_eq!(
            resolve_key(&press(KeyCode::Char('4'), KeyModifiers::NONE), &bindings),
            Some(InputEvent::Sound(4))
        );
    }

    #[test]
    fn ctrl_c_quits_even_without_a_binding() {
        let bindings = HashMap::new();
        assert_eq!(
            resolve_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL), &bindings),
            Some(InputEvent::Quit)
        );
    }

    #[test]
    fn unbound_keys_and_releases_resolve_to_none() {
        let bindings = TrainConfig::default().bindings();
        assert_eq!(
            resolve_key(&press(KeyCode::Char('z'), KeyModifiers::NONE), &bindings),
            None
        );
        assert_eq!(
            resolve_key(&press(KeyCode::Esc, KeyModifiers::NONE), &bindings),
            None
        );
        let release = KeyEvent::new_with_kind(
            KeyCode::Char('f'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
        );
        assert_eq!(resolve_key(&release, &bindings), None);
    }
}
