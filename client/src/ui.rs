use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use tracing::{debug, warn};

use crate::frame::CapturedFrame;
use crate::session::InputEvent;

/// Operator-facing sink: shows the current frame's overlay and reports input.
pub trait UiSink {
    fn display(&mut self, frame: &CapturedFrame, overlay: &[String]);

    /// Non-blocking; returns `InputEvent::None` when nothing is pending.
    fn poll_input(&mut self) -> InputEvent;
}

/// Map one typed command line to an input event.
///
/// An empty line (bare Enter), `space` or `t` toggles sampling; `g` takes a
/// snapshot; `q`, `esc` or `quit` exits.
pub fn parse_command(line: &str) -> InputEvent {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "space" | "t" => InputEvent::Toggle,
        "g" => InputEvent::Snapshot,
        "q" | "esc" | "quit" => InputEvent::Quit,
        _ => InputEvent::None,
    }
}

/// Terminal UI: overlay lines go to stdout, commands come from stdin.
///
/// Stdin is read on a dedicated thread so `poll_input` never blocks the loop.
pub struct TerminalUi {
    inputs: Receiver<InputEvent>,
    disconnected: bool,
    output_failed: bool,
}

impl TerminalUi {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("stdin-input".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    let event = parse_command(&line);
                    if event == InputEvent::None {
                        debug!(line, "ignoring unknown command");
                        continue;
                    }
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            })
            .map(|_| ())
            .unwrap_or_else(|e| warn!(error = %e, "failed to spawn stdin reader"));

        Self::with_inputs(rx)
    }

    fn with_inputs(inputs: Receiver<InputEvent>) -> Self {
        Self {
            inputs,
            disconnected: false,
            output_failed: false,
        }
    }

    pub fn print_usage(&self) {
        println!("<enter> = start/pause sampling");
        println!("g       = snapshot (+ GET /status while sampling)");
        println!("q       = quit");
    }

    fn display_to<W: Write>(&mut self, out: &mut W, frame: &CapturedFrame, overlay: &[String]) {
        let (width, height) = frame.dimensions();
        let result = write!(
            out,
            "\r\x1b[2K[#{} {}x{}] {}",
            frame.seq,
            width,
            height,
            overlay.join("  ·  ")
        )
        .and_then(|()| out.flush());

        if let Err(e) = result {
            if !self.output_failed {
                debug!(error = %e, "failed to write overlay");
                self.output_failed = true;
            }
        }
    }
}

impl UiSink for TerminalUi {
    fn display(&mut self, frame: &CapturedFrame, overlay: &[String]) {
        let mut stdout = std::io::stdout().lock();
        self.display_to(&mut stdout, frame, overlay);
    }

    fn poll_input(&mut self) -> InputEvent {
        if self.disconnected {
            return InputEvent::Quit;
        }
        match self.inputs.try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Empty) => InputEvent::None,
            Err(TryRecvError::Disconnected) => {
                warn!("stdin closed, quitting");
                self.disconnected = true;
                InputEvent::Quit
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::solid_frame;

    #[test]
    fn command_mapping() {
        assert_eq!(parse_command(""), InputEvent::Toggle);
        assert_eq!(parse_command(" "), InputEvent::Toggle);
        assert_eq!(parse_command("T"), InputEvent::Toggle);
        assert_eq!(parse_command("g\n"), InputEvent::Snapshot);
        assert_eq!(parse_command("ESC"), InputEvent::Quit);
        assert_eq!(parse_command("q"), InputEvent::Quit);
        assert_eq!(parse_command("hello"), InputEvent::None);
    }

    #[test]
    fn closed_stdin_drains_pending_then_quits() {
        let (tx, rx) = mpsc::channel();
        let mut ui = TerminalUi::with_inputs(rx);
        assert_eq!(ui.poll_input(), InputEvent::None);

        tx.send(InputEvent::Toggle).unwrap();
        drop(tx);
        assert_eq!(ui.poll_input(), InputEvent::Toggle);
        assert_eq!(ui.poll_input(), InputEvent::Quit);
        assert_eq!(ui.poll_input(), InputEvent::Quit);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn overlay_is_written_on_one_line() {
        let (_tx, rx) = mpsc::channel();
        let mut ui = TerminalUi::with_inputs(rx);
        let mut out = Vec::new();
        let overlay = vec!["Claro | Parado".to_string(), "RTT: 25.0 ms (avg 25.0 ms)".to_string()];
        ui.display_to(&mut out, &solid_frame(10, 4), &overlay);

        let line = String::from_utf8(out).unwrap();
        assert_eq!(
            line,
            "\r\x1b[2K[#4 32x24] Claro | Parado  ·  RTT: 25.0 ms (avg 25.0 ms)"
        );
        assert!(!ui.output_failed);
    }

    #[test]
    fn write_failure_is_recorded_and_not_fatal() {
        let (_tx, rx) = mpsc::channel();
        let mut ui = TerminalUi::with_inputs(rx);
        let frame = solid_frame(10, 0);
        ui.display_to(&mut BrokenPipe, &frame, &[]);
        assert!(ui.output_failed);
        ui.display_to(&mut BrokenPipe, &frame, &[]);
        assert!(ui.output_failed);
    }
}
