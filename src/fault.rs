//! Handler faults: errors returned or panics raised inside the chain.
//!
//! A fault never reaches the transport. The dispatcher turns it into the
//! `500` page, which carries the message and one line per trace entry.

use std::any::Any;
use std::backtrace::BacktraceStatus;
use std::fmt;

/// What went wrong inside middleware or a handler.
#[derive(Clone, Debug)]
pub struct Fault {
    message: String,
    trace: Vec<String>,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), trace: Vec::new() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Cause chain first, then backtrace frames when one was captured
    /// (`RUST_BACKTRACE=1` or `RUST_LIB_BACKTRACE=1`).
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_owned()
        };
        Self::new(message)
    }

    /// Renders the `500` page body.
    pub(crate) fn page(&self) -> String {
        let mut detail = escape(&self.message);
        for line in &self.trace {
            detail.push_str("<br>&ensp;at ");
            detail.push_str(&escape(line));
        }
        format!(
            "<html>\n<head>\n    <title>Internal Server Error</title>\n</head>\n<body>\n    \
             <h1>500</h1><h3>(Internal Server Error)</h3>\n    <div>{detail}</div>\n</body>\n</html>\n"
        )
    }
}

impl From<anyhow::Error> for Fault {
    fn from(err: anyhow::Error) -> Self {
        let mut trace: Vec<String> = err
            .chain()
            .skip(1)
            .map(|cause| format!("caused by: {cause}"))
            .collect();

        let backtrace = err.backtrace();
        if backtrace.status() == BacktraceStatus::Captured {
            trace.extend(
                backtrace
                    .to_string()
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_owned),
            );
        }

        Self { message: err.to_string(), trace }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
