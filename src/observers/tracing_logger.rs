//! # TracingLogger: forwards events to `tracing`
//!
//! Maps [`LogLevel`] onto `tracing` levels (`Critical` → `error`) and records the
//! event fields as structured fields.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! DEBUG opvisor: attempt 1/4 for insert into tarefas component="CLIENT" event="attempt_starting" attempt=1
//!  WARN opvisor: attempt 1 failed for insert into tarefas component="CLIENT" category="NET_001" err="Failed to fetch"
//! DEBUG opvisor: waiting 731ms before retrying insert into tarefas component="CLIENT" delay_ms=731
//!  INFO opvisor: insert into tarefas succeeded after 1 retries component="CLIENT" elapsed_ms=734
//! ```

use std::borrow::Cow;

use crate::events::{Event, LogLevel};
use crate::observers::Observe;

/// Observer writing every event through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: Cow<'static, str>,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("CLIENT")
    }
}

impl TracingLogger {
    /// Creates a logger tagging every record with `component`.
    #[must_use]
    pub fn new(component: impl Into<Cow<'static, str>>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Component tag.
    pub fn component(&self) -> &str {
        &self.component
    }
}

macro_rules! emit {
    ($level:ident, $self:ident, $e:ident) => {
        tracing::$level!(
            component = %$self.component,
            event = $e.kind.as_label(),
            operation = $e.operation.as_deref(),
            attempt = $e.attempt,
            max_attempts = $e.max_attempts,
            delay_ms = $e.delay.map(|d| d.as_millis() as u64),
            category = $e.category.map(|c| c.code()),
            err = $e.error.as_deref(),
            elapsed_ms = $e.elapsed.map(|d| d.as_millis() as u64),
            "{}",
            $e.message()
        )
    };
}

impl Observe for TracingLogger {
    fn on_event(&self, e: &Event) {
        match e.level() {
            LogLevel::Debug => emit!(debug, self, e),
            LogLevel::Info => emit!(info, self, e),
            LogLevel::Warning => emit!(warn, self, e),
            LogLevel::Error | LogLevel::Critical => emit!(error, self, e),
        }
    }

    fn name(&self) -> &'static str {
        "TracingLogger"
    }
}
