use std::cell::Cell;
use std::time::Duration;

use anyhow::{Context, Result};
use opencv::{core::Mat, highgui};

const KEY_ESCAPE: u8 = 27;

/// What the operator asked for through the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Other,
}

impl Command {
    /// Decodes a raw `waitKey` code. `None` when no key was pressed.
    pub fn from_key(code: i32) -> Option<Self> {
        if code < 0 {
            return None;
        }
        // Some backends set modifier bits above the low byte.
        let key = (code & 0xFF) as u8;
        match key {
            b'q' | b'Q' | KEY_ESCAPE => Some(Command::Quit),
            _ => Some(Command::Other),
        }
    }
}

/// Surface the annotated frames are presented on.
pub trait Display {
    fn show(&mut self, frame: &Mat) -> Result<()>;
    /// Waits up to `wait` for a key press. Doubles as frame pacing.
    fn poll(&mut self, wait: Duration) -> Result<Option<Command>>;
    /// True once the operator has closed the surface.
    fn is_closed(&self) -> bool;
}

/// Tracks `WND_PROP_VISIBLE` readings to tell a closed window apart from a
/// backend that never reports visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisibilityWatch {
    /// `None` until the first reading after the window was shown.
    tracked: Option<bool>,
}

impl VisibilityWatch {
    /// Feeds one reading; returns true only when a window that was reported
    /// visible is no longer visible.
    pub fn observe(&mut self, reading: opencv::Result<f64>) -> bool {
        let visible = match reading {
            Ok(visible) => visible,
            Err(e) => {
                tracing::debug!("Window visibility query failed: {e}");
                return false;
            }
        };
        match self.tracked {
            None => {
                let tracked = visible >= 1.0;
                if !tracked {
                    tracing::debug!(
                        "Backend does not report window visibility; close detection off"
                    );
                }
                self.tracked = Some(tracked);
                false
            }
            Some(false) => false,
            Some(true) => visible < 1.0,
        }
    }
}

pub struct Window {
    name: String,
    shown: bool,
    destroyed: bool,
    visibility: Cell<VisibilityWatch>,
}

impl Window {
    pub fn open(name: &str) -> Result<Self> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("failed to create window {name:?}"))?;
        Ok(Self {
            name: name.to_string(),
            shown: false,
            destroyed: false,
            visibility: Cell::default(),
        })
    }

    pub fn close(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        highgui::destroy_window(&self.name)
            .with_context(|| format!("failed to destroy window {:?}", self.name))?;
        // Let the GUI backend process the destroy event.
        let _ = highgui::wait_key(1);
        Ok(())
    }
}

impl Display for Window {
    fn show(&mut self, frame: &Mat) -> Result<()> {
        highgui::imshow(&self.name, frame).context("failed to show frame")?;
        self.shown = true;
        Ok(())
    }

    fn poll(&mut self, wait: Duration) -> Result<Option<Command>> {
        let ms = wait.as_millis().clamp(1, i32::MAX as u128) as i32;
        let code = highgui::wait_key(ms).context("failed to poll keyboard")?;
        Ok(Command::from_key(code))
    }

    fn is_closed(&self) -> bool {
        if self.destroyed {
            return true;
        }
        // Before the first imshow the window may not be mapped yet.
        if !self.shown {
            return false;
        }
        let mut watch = self.visibility.get();
        let closed =
            watch.observe(highgui::get_window_property(&self.name, highgui::WND_PROP_VISIBLE));
        self.visibility.set(watch);
        closed
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("{e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_is_none() {
        assert_eq!(Command::from_key(-1), None);
    }

    #[test]
    fn q_and_escape_quit() {
        assert_eq!(Command::from_key('q' as i32), Some(Command::Quit));
        assert_eq!(Command::from_key('Q' as i32), Some(Command::Quit));
        assert_eq!(Command::from_key(27), Some(Command::Quit));
    }

    #[test]
    fn modifier_bits_are_masked() {
        assert_eq!(Command::from_key(0x10_0000 | 'q' as i32), Some(Command::Quit));
    }

    #[test]
    fn other_keys_pass_through() {
        assert_eq!(Command::from_key('s' as i32), Some(Command::Other));
    }

    fn unsupported() -> opencv::Result<f64> {
        Err(opencv::Error::new(opencv::core::StsNotImplemented, "no visibility"))
    }

    #[test]
    fn visible_then_hidden_is_closed() {
        let mut watch = VisibilityWatch::default();
        assert!(!watch.observe(Ok(1.0)));
        assert!(!watch.observe(Ok(1.0)));
        assert!(watch.observe(Ok(0.0)));
    }

    #[test]
    fn query_errors_never_close() {
        let mut watch = VisibilityWatch::default();
        assert!(!watch.observe(unsupported()));
        assert!(!watch.observe(Ok(1.0)));
        assert!(!watch.observe(unsupported()));
    }

    #[test]
    fn backend_without_visibility_never_closes() {
        let mut watch = VisibilityWatch::default();
        assert!(!watch.observe(Ok(-1.0)));
        assert!(!watch.observe(Ok(-1.0)));
        assert!(!watch.observe(Ok(0.0)));
    }
}
