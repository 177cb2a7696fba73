//! One file, start to finish: open, report, release
//!
//! Expected open failures are printed on one line and the session ends. A
//! panic inside the reader is caught and reported the same way, followed by
//! the backtrace captured where the panic was raised. The workbook is always
//! dropped before [`WorkbookSession::run`] returns.

use crate::config::Configuration;
use crate::error::OpenError;
use crate::reader::{OpenOptions, Sheet, Workbook, open_workbook};
use crate::report::Report;
use anyhow::Result;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::rc::Weak;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Processed,
    OpenFailed,
    ReportFailed,
    Interrupted,
}

pub struct WorkbookSession<'a> {
    config: &'a Configuration,
    options: OpenOptions,
    interrupt: &'a AtomicBool,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chain a hook that records the backtrace of panics raised under [`catch_with_trace`]
fn install_trace_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARDED.with(Cell::get) {
                let trace = Backtrace::force_capture().to_string();
                PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

/// A caught panic: its message and the backtrace taken at the panic site
struct CaughtPanic {
    message: String,
    trace: String,
}

impl CaughtPanic {
    fn write_to(&self, prefix: &str, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "{}: Panic: {}", prefix, self.message)?;
        writeln!(out, "{}", self.trace)?;
        Ok(())
    }
}

fn catch_with_trace<R>(f: impl FnOnce() -> R) -> Result<R, CaughtPanic> {
    install_trace_hook();
    GUARDED.with(|g| g.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARDED.with(|g| g.set(false));
    let trace = PANIC_TRACE.with(|slot| slot.borrow_mut().take());
    result.map_err(|payload| CaughtPanic {
        message: panic_message(payload.as_ref()),
        trace: trace.unwrap_or_else(|| "<no backtrace captured>".to_string()),
    })
}

impl<'a> WorkbookSession<'a> {
    pub fn new(config: &'a Configuration, options: OpenOptions, interrupt: &'a AtomicBool) -> Self {
        Self {
            config,
            options,
            interrupt,
        }
    }

    fn interrupted(&self, out: &mut dyn Write) -> Result<bool> {
        if self.interrupt.load(Ordering::SeqCst) {
            writeln!(out, "*** KeyboardInterrupt ***")?;
            return Ok(true);
        }
        Ok(false)
    }

    fn open(&self, path: &Path, out: &mut dyn Write) -> Result<Option<Workbook>> {
        let started = Instant::now();
        let opened = catch_with_trace(|| open_workbook(path, &self.options));
        match opened {
            Ok(Ok(book)) => {
                if !self.config.suppress_timing {
                    writeln!(out, "Open took {:.2} seconds", started.elapsed().as_secs_f64())?;
                }
                Ok(Some(book))
            }
            Ok(Err(e)) => {
                self.report_open_error(&e, out)?;
                Ok(None)
            }
            Err(caught) => {
                caught.write_to("*** Open failed", out)?;
                Ok(None)
            }
        }
    }

    fn report_open_error(&self, e: &OpenError, out: &mut dyn Write) -> Result<()> {
        tracing::debug!(kind = e.kind(), "open failed");
        writeln!(out, "{}", e.failure_line())?;
        Ok(())
    }

    /// Process one file; loaded sheets are appended to `tracked` as weak handles
    pub fn run(
        &self,
        path: &Path,
        report: Report,
        out: &mut dyn Write,
        tracked: &mut Vec<Weak<Sheet>>,
    ) -> Result<SessionOutcome> {
        let book = self.open(path, out)?;
        if self.interrupted(out)? {
            return Ok(SessionOutcome::Interrupted);
        }
        let Some(mut book) = book else {
            return Ok(SessionOutcome::OpenFailed);
        };

        let started = Instant::now();
        let result = catch_with_trace(|| report.run(&mut book, self.config, out));
        tracked.extend(book.tracked_sheets());
        drop(book);

        let outcome = match result {
            Ok(Ok(())) => SessionOutcome::Processed,
            Ok(Err(e)) => {
                writeln!(out, "*** Command failed: {:#}", e)?;
                SessionOutcome::ReportFailed
            }
            Err(caught) => {
                caught.write_to("*** Command failed", out)?;
                SessionOutcome::ReportFailed
            }
        };
        if self.interrupted(out)? {
            return Ok(SessionOutcome::Interrupted);
        }
        tracing::debug!(path = %path.display(), elapsed = ?started.elapsed(), "command finished");
        Ok(outcome)
    }
}
