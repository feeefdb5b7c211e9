//! Scripted in-memory transport for exercising the controller and
//! protocol stack without hardware. Clones share the same state, so a
//! test can keep a handle while the controller owns the boxed transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Result, Transport, TransportError};

/// One scripted reaction to a `read_line` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Line(String),
    Timeout,
}

#[derive(Debug, Default)]
struct Inner {
    open: bool,
    fail_next_open: bool,
    sent: Vec<String>,
    replies: VecDeque<MockReply>,
    open_calls: usize,
    close_calls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response line for the next unanswered read.
    pub fn push_reply(&self, line: impl Into<String>) {
        self.lock().replies.push_back(MockReply::Line(line.into()));
    }

    /// Queue a read timeout.
    pub fn push_timeout(&self) {
        self.lock().replies.push_back(MockReply::Timeout);
    }

    /// Make the next `open` call fail with a connection error.
    pub fn fail_next_open(&self) {
        self.lock().fail_next_open = true;
    }

    /// Every command line written so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn open_calls(&self) -> usize {
        self.lock().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    pub fn remaining_replies(&self) -> usize {
        self.lock().replies.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.open_calls += 1;
        if inner.fail_next_open {
            inner.fail_next_open = false;
            return Err(TransportError::ConnectionFailed(
                "scripted open failure".to_string(),
            ));
        }
        inner.open = true;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut inner = self.lock();
        if !inner.open {
            return Err(TransportError::NotConnected);
        }
        inner.sent.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<String> {
        let mut inner = self.lock();
        if !inner.open {
            return Err(TransportError::NotConnected);
        }
        match inner.replies.pop_front() {
            Some(MockReply::Line(line)) => Ok(line),
            // An unanswered read is indistinguishable from a timeout.
            Some(MockReply::Timeout) | None => Err(TransportError::Timeout),
        }
    }

    fn close(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.close_calls += 1;
        inner.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_replies_are_consumed_in_order() {
        let mock = MockTransport::new();
        mock.push_reply("first");
        mock.push_timeout();
        mock.push_reply("second");

        let mut transport = mock.clone();
        transport.open().unwrap();
        transport.write_line("T1RTid0001").unwrap();

        assert_eq!(transport.read_line(Duration::ZERO).unwrap(), "first");
        assert!(matches!(
            transport.read_line(Duration::ZERO),
            Err(TransportError::Timeout)
        ));
        assert_eq!(transport.read_line(Duration::ZERO).unwrap(), "second");
        assert_eq!(mock.sent(), vec!["T1RTid0001".to_string()]);
    }

    #[test]
    fn closed_transport_rejects_io() {
        let mut transport = MockTransport::new();
        assert!(matches!(
            transport.write_line("T1LIid0001"),
            Err(TransportError::NotConnected)
        ));
    }
}
