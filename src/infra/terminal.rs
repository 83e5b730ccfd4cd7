use crate::infra::watch::CancelSignal;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

/// Esc or Ctrl+C on an interactive stdin stops a watch.
///
/// Raw mode is needed to see single keys, which also swallows the terminal's own Ctrl+C handling.
/// When stdin is not a terminal nothing is changed and the default interrupt still applies.
#[derive(Debug)]
pub struct KeypressCancel {
    raw_mode: bool,
}

impl KeypressCancel {
    pub fn install() -> Self {
        if !io::stdin().is_terminal() {
            return Self { raw_mode: false };
        }
        match enable_raw_mode() {
            Ok(()) => Self { raw_mode: true },
            Err(error) => {
                tracing::debug!(error = %error, "raw mode unavailable; Esc detection disabled");
                Self { raw_mode: false }
            }
        }
    }

    pub fn raw_mode(&self) -> bool {
        self.raw_mode
    }
}

impl CancelSignal for KeypressCancel {
    fn is_cancelled(&mut self) -> bool {
        if !self.raw_mode {
            return false;
        }
        while let Ok(true) = event::poll(Duration::ZERO) {
            let Ok(event) = event::read() else {
                return false;
            };
            if is_cancel_key(&event) {
                return true;
            }
        }
        false
    }
}

impl Drop for KeypressCancel {
    fn drop(&mut self) {
        if self.raw_mode {
            let _ = disable_raw_mode();
        }
    }
}

fn is_cancel_key(event: &Event) -> bool {
    let Event::Key(KeyEvent {
        code,
        modifiers,
        kind,
        ..
    }) = event
    else {
        return false;
    };
    if *kind == KeyEventKind::Release {
        return false;
    }
    match code {
        KeyCode::Esc => true,
        KeyCode::Char('c') | KeyCode::Char('C') => modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Writes `\n` as `\r\n` while the terminal is in raw mode.
#[derive(Debug)]
pub struct CrlfWriter<W> {
    inner: W,
    enabled: bool,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W, enabled: bool) -> Self {
        Self { inner, enabled }
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.enabled {
            return self.inner.write(buf);
        }
        let mut start = 0usize;
        for (idx, byte) in buf.iter().enumerate() {
            if *byte == b'\n' {
                self.inner.write_all(&buf[start..idx])?;
                self.inner.write_all(b"\r\n")?;
                start = idx + 1;
            }
        }
        self.inner.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_writer_translates_newlines_only_when_enabled() {
        let mut raw = CrlfWriter::new(Vec::new(), true);
        write!(raw, "a\nb\n").expect("write");
        assert_eq!(raw.inner, b"a\r\nb\r\n");

        let mut plain = CrlfWriter::new(Vec::new(), false);
        write!(plain, "a\nb\n").expect("write");
        assert_eq!(plain.inner, b"a\nb\n");
    }

    #[test]
    fn cancel_keys() {
        let esc = Event::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        let plain_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE));
        assert!(is_cancel_key(&esc));
        assert!(is_cancel_key(&ctrl_c));
        assert!(!is_cancel_key(&plain_c));
    }
}
