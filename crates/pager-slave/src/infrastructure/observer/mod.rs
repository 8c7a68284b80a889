//! Status observer: the optional front end watching the slave.
//!
//! An interactive run attaches a [`StatusObserver`] so the operator sees
//! when the server starts and stops and when it fails.  Headless (`-nogui`)
//! runs attach none, and the lifecycle controller closes the log sink on
//! shutdown instead.
//!
//! [`ConsoleObserver`] is the built-in observer; it writes to stdout.

use std::io::{self, Write};

/// Receives lifecycle notifications from the controller.
#[cfg_attr(test, mockall::automock)]
pub trait StatusObserver: Send + Sync {
    /// The server went up (`true`) or down (`false`).
    fn set_status(&self, running: bool);

    /// A runtime error ended the server.
    fn show_error(&self, title: &str, message: &str);

    /// Start/stop controls should return to their idle state.
    fn reset_controls(&self);

    /// Repaint whatever the observer displays.
    fn redraw(&self) {}
}

/// Observer that prints every notification as a single stdout line.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl ConsoleObserver {
    fn print(&self, line: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

impl StatusObserver for ConsoleObserver {
    fn set_status(&self, running: bool) {
        self.print(if running {
            "[status] server running"
        } else {
            "[status] server stopped"
        });
    }

    fn show_error(&self, title: &str, message: &str) {
        self.print(&format!("[{title}] {message}"));
    }

    fn reset_controls(&self) {
        self.print("[status] ready");
    }
}
