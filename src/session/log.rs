// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Append-only accumulator for engine diagnostics

use parking_lot::Mutex;
use std::sync::Arc;

/// Engine output of one computation, safe to append from any thread.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    text: Arc<Mutex<String>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message, terminating it with a newline if needed.
    pub fn append(&self, message: &str) {
        let mut text = self.text.lock();
        text.push_str(message);
        if !message.ends_with('\n') {
            text.push('\n');
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.lock().is_empty()
    }

    /// Copy of everything appended so far.
    pub fn contents(&self) -> String {
        self.text.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_lines_are_never_interleaved() {
        let log = DiagnosticLog::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        log.append(&format!("thread {} line {}", t, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let text = log.contents();
        assert_eq!(text.lines().count(), 200);
        assert!(text.lines().all(|l| l.starts_with("thread ")));
    }
}
