use chrono::Utc;
use std::io::Write;
use std::sync::Mutex;

/// Injected diagnostics capability. The library never touches process-wide
/// logging state; components take a `Logger` and the host decides where the
/// lines go.
pub trait Logger: Send + Sync {
    fn debug(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Timestamped stderr logger used by the binary.
pub struct StderrLogger {
    verbose: bool,
    out: Mutex<std::io::Stderr>,
}

impl StderrLogger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            out: Mutex::new(std::io::stderr()),
        }
    }

    fn line(&self, level: &str, msg: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "[{}] [{}] {}", Utc::now().to_rfc3339(), level, msg);
        }
    }
}

impl Logger for StderrLogger {
    fn debug(&self, msg: &str) {
        if self.verbose {
            self.line("DEBUG", msg);
        }
    }
    fn info(&self, msg: &str) {
        self.line("INFO", msg);
    }
    fn error(&self, msg: &str) {
        self.line("ERROR", msg);
    }
}
