//! Shared echo-suppression slot between the Writer and the Ingress Framer.
//!
//! The bus is half-duplex: whatever the Writer transmits loops back and is
//! received by the Reader like any other frame. The Writer records the
//! bytes it just sent here immediately before transmitting; the Framer
//! compares every de-escaped ingress frame against it and, on an exact
//! match, consumes the record and drops the frame instead of passing it
//! upstream.

use std::sync::Mutex;

#[derive(Default)]
pub struct EchoSuppressor {
    last_sent: Mutex<Option<Vec<u8>>>,
}

impl EchoSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the bytes about to be transmitted.
    pub fn set(&self, bytes: Vec<u8>) {
        *self.last_sent.lock().unwrap() = Some(bytes);
    }

    /// If `candidate` matches the recorded transmission, consumes the
    /// record (so it matches only once) and returns `true`.
    pub fn take_if_match(&self, candidate: &[u8]) -> bool {
        let mut guard = self.last_sent.lock().unwrap();
        if guard.as_deref() == Some(candidate) {
            *guard = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_once() {
        let suppressor = EchoSuppressor::new();
        suppressor.set(vec![1, 2, 3]);
        assert!(suppressor.take_if_match(&[1, 2, 3]));
        assert!(!suppressor.take_if_match(&[1, 2, 3]));
    }

    #[test]
    fn no_match_leaves_record_untouched() {
        let suppressor = EchoSuppressor::new();
        suppressor.set(vec![1, 2, 3]);
        assert!(!suppressor.take_if_match(&[9, 9, 9]));
        assert!(suppressor.take_if_match(&[1, 2, 3]));
    }
}
