use crate::error::SessionError;
use rdk_core::FrameSink;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A key or mouse button the session can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    Char(char),
    Space,
    Escape,
    Enter,
    MouseLeft,
    MouseRight,
}

impl Key {
    /// Parses config names such as `"d"`, `"space"` or `"escape"`.
    pub fn parse(name: &str) -> Option<Key> {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "space" => Some(Key::Space),
            "escape" | "esc" => Some(Key::Escape),
            "enter" | "return" => Some(Key::Enter),
            "mouse_left" => Some(Key::MouseLeft),
            "mouse_right" => Some(Key::MouseRight),
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_graphic() => Some(Key::Char(c)),
                    _ => None,
                }
            }
        }
    }

    /// An empty filter accepts any key.
    pub fn matches(self, filter: &[Key]) -> bool {
        filter.is_empty() || filter.contains(&self)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Space => f.write_str("space"),
            Key::Escape => f.write_str("escape"),
            Key::Enter => f.write_str("enter"),
            Key::MouseLeft => f.write_str("mouse_left"),
            Key::MouseRight => f.write_str("mouse_right"),
        }
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Key::parse(&name).ok_or_else(|| format!("unknown key `{name}`"))
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPress {
    pub key: Key,
    /// Seconds on the session clock.
    pub timestamp: f64,
}

/// The input side of the session.
///
/// Every blocking wait checks `abort_requested` on each iteration; that is
/// the only way a session is cancelled.
pub trait InputSource {
    /// Seconds since the session clock started.
    fn now(&self) -> f64;

    /// Drains pending presses, returning those that match `filter`.
    fn poll_keys(&mut self, filter: &[Key]) -> Vec<KeyPress>;

    fn abort_requested(&self) -> bool;

    /// Suspends until the next input event or display tick.
    fn wait_event(&mut self) -> Result<(), SessionError>;

    fn clear_events(&mut self) {
        let _ = self.poll_keys(&[]);
    }

    fn wait_for_key(&mut self, filter: &[Key]) -> Result<KeyPress, SessionError> {
        loop {
            if self.abort_requested() {
                return Err(SessionError::Aborted);
            }
            if let Some(press) = self.poll_keys(filter).into_iter().next() {
                return Ok(press);
            }
            self.wait_event()?;
        }
    }
}

impl<I: InputSource + ?Sized> InputSource for &mut I {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn poll_keys(&mut self, filter: &[Key]) -> Vec<KeyPress> {
        (**self).poll_keys(filter)
    }

    fn abort_requested(&self) -> bool {
        (**self).abort_requested()
    }

    fn wait_event(&mut self) -> Result<(), SessionError> {
        (**self).wait_event()
    }

    fn clear_events(&mut self) {
        (**self).clear_events()
    }

    fn wait_for_key(&mut self, filter: &[Key]) -> Result<KeyPress, SessionError> {
        (**self).wait_for_key(filter)
    }
}

/// A display that also takes input, as the session drives it.
pub trait Screen: FrameSink + InputSource {}

impl<T: FrameSink + InputSource + ?Sized> Screen for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Queue {
        t: f64,
        pending: VecDeque<Key>,
        abort_at: Option<f64>,
    }

    impl InputSource for Queue {
        fn now(&self) -> f64 {
            self.t
        }

        fn poll_keys(&mut self, filter: &[Key]) -> Vec<KeyPress> {
            let t = self.t;
            self.pending
                .drain(..)
                .filter(|k| k.matches(filter))
                .map(|key| KeyPress { key, timestamp: t })
                .collect()
        }

        fn abort_requested(&self) -> bool {
            self.abort_at.is_some_and(|at| self.t >= at)
        }

        fn wait_event(&mut self) -> Result<(), SessionError> {
            self.t += 0.25;
            if self.t >= 1.0 && self.pending.is_empty() {
                self.pending.push_back(Key::Char('e'));
            }
            Ok(())
        }
    }

    #[test]
    fn key_names_round_trip_through_config_strings() {
        assert_eq!(Key::parse("space"), Some(Key::Space));
        assert_eq!(Key::parse("D"), Some(Key::Char('d')));
        assert_eq!(Key::parse("Esc"), Some(Key::Escape));
        assert_eq!(Key::parse("dd"), None);
        let keys: Vec<Key> = serde_json::from_str(r#"["d", "e", "escape"]"#).unwrap();
        assert_eq!(keys, vec![Key::Char('d'), Key::Char('e'), Key::Escape]);
        assert!(serde_json::from_str::<Key>(r#""f1f2""#).is_err());
    }

    #[test]
    fn wait_for_key_ignores_unfiltered_presses() {
        let mut q = Queue {
            t: 0.0,
            pending: VecDeque::from([Key::Char('x')]),
            abort_at: None,
        };
        let press = q.wait_for_key(&[Key::Char('d'), Key::Char('e')]).unwrap();
        assert_eq!(press.key, Key::Char('e'));
        assert_eq!(press.timestamp, 1.0);
    }

    #[test]
    fn wait_for_key_honours_abort() {
        let mut q = Queue {
            t: 0.0,
            pending: VecDeque::new(),
            abort_at: Some(0.5),
        };
        assert!(matches!(
            q.wait_for_key(&[Key::Space]),
            Err(SessionError::Aborted)
        ));
    }
}
