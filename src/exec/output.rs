// src/exec/output.rs

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Bounded, shared buffer of captured process output lines.
///
/// Cloning shares the buffer. When `limit` lines are held, the oldest line is
/// dropped; a limit of 0 keeps everything.
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    lines: Arc<Mutex<VecDeque<String>>>,
    limit: usize,
}

impl OutputSink {
    pub fn new(limit: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::new())),
            limit,
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if self.limit > 0 && lines.len() >= self.limit {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect()
    }
}
