//! Ingress Framer: turns a break-delimited raw frame into a [`ClassifiedFrame`]
//! (or drops/flags it).

use crossbeam_channel::{Receiver, Sender};

use crate::echo::EchoSuppressor;
use crate::frame::{self, classify_ingress, ClassifiedFrame, ErredFrame, FrameKind};
use crate::queue::IngressQueueItem;
use crate::reader::RawFrame;
use crate::stats::Statistics;

/// Frames with a type byte at or above this value carry EMS-plus (rather
/// than classic EMS) payloads; counted separately, otherwise treated
/// identically.
const EMSPLUS_TYPE_THRESHOLD: u8 = 0xF0;

/// Unescapes a raw wire buffer: a doubled `0xFF` collapses to one real data
/// byte; `0xFF 0x00 <byte>` marks `<byte>` as having arrived with a framing
/// error (both marker bytes are dropped, the byte itself is kept in place
/// and counted). Returns the unescaped bytes and the number of framing
/// errors encountered.
fn unescape(raw: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(raw.len());
    let mut errors = 0usize;
    let mut i = 0usize;
    while i < raw.len() {
        if raw[i] == 0xFF && i + 1 < raw.len() && raw[i + 1] == 0xFF {
            out.push(0xFF);
            i += 2;
        } else if raw[i] == 0xFF && i + 1 < raw.len() && raw[i + 1] == 0x00 {
            errors += 1;
            if i + 2 < raw.len() {
                out.push(raw[i + 2]);
                i += 3;
            } else {
                i += 2;
            }
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    (out, errors)
}

fn error_frame(bytes: Vec<u8>, time_of_arrival: std::time::Instant) -> ClassifiedFrame {
    ClassifiedFrame { bytes, kind: FrameKind::ErrorFrame, time_of_arrival }
}

/// Processes one raw frame, returning the item to hand the Ingress
/// Dispatcher, if any (echo matches and empty frames are dropped silently).
pub fn handle_raw_frame(
    raw: RawFrame,
    stats: &Statistics,
    echo: &EchoSuppressor,
    erred_frame_callback: &dyn Fn(ErredFrame),
) -> Option<ClassifiedFrame> {
    if echo.take_if_match(&raw.bytes) {
        Statistics::bump(&stats.ingress_echo_frames);
        return None;
    }

    Statistics::bump(&stats.ingress_total_frames);
    // +1 for the break that terminated this frame.
    Statistics::add(&stats.ingress_total_octets, raw.bytes.len() as u64 + 1);

    let (unescaped, iframe_errors) = unescape(&raw.bytes);

    if iframe_errors > 0 {
        Statistics::bump(&stats.ingress_err_frames);
        // +1 for the terminating break octet, same as ingress_total_octets above.
        Statistics::add(&stats.ingress_err_octets, unescaped.len() as u64 + 1);
        Statistics::add(&stats.ingress_errors, iframe_errors as u64);
        return Some(error_frame(unescaped, raw.time_of_arrival));
    }

    if unescaped.is_empty() {
        Statistics::bump(&stats.ingress_empty_frames);
        return None;
    }

    if unescaped.len() == 1 {
        let kind = classify_ingress(&unescaped);
        return Some(ClassifiedFrame { bytes: unescaped, kind, time_of_arrival: raw.time_of_arrival });
    }

    if unescaped.len() <= frame::MIN_FRAME_SIZE {
        erred_frame_callback(ErredFrame {
            time_of_arrival: raw.time_of_arrival,
            bytes: unescaped.clone(),
            computed_checksum: None,
        });
        Statistics::bump(&stats.ingress_short_frames);
        return Some(error_frame(unescaped, raw.time_of_arrival));
    }

    match frame::verify_checksum(&unescaped) {
        Ok(()) => {
            let payload = unescaped[..unescaped.len() - 1].to_vec();
            if payload[frame::header::TYPE] >= EMSPLUS_TYPE_THRESHOLD {
                Statistics::bump(&stats.ingress_emsplus_frames);
            }
            let kind = classify_ingress(&payload);
            Some(ClassifiedFrame { bytes: payload, kind, time_of_arrival: raw.time_of_arrival })
        }
        Err(computed) => {
            erred_frame_callback(ErredFrame {
                time_of_arrival: raw.time_of_arrival,
                bytes: unescaped.clone(),
                computed_checksum: Some(computed),
            });
            Statistics::bump(&stats.ingress_err_frames);
            Statistics::add(&stats.ingress_err_octets, unescaped.len() as u64 + 1);
            Some(error_frame(unescaped, raw.time_of_arrival))
        }
    }
}

/// Runs the Framer loop until `from_reader` disconnects.
pub fn run(
    from_reader: Receiver<RawFrame>,
    to_ingress: Sender<IngressQueueItem>,
    stats: &Statistics,
    echo: &EchoSuppressor,
    erred_frame_callback: &dyn Fn(ErredFrame),
) {
    while let Ok(raw) = from_reader.recv() {
        if let Some(frame) = handle_raw_frame(raw, stats, echo, erred_frame_callback) {
            if to_ingress.send(IngressQueueItem::Frame(frame)).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn raw(bytes: &[u8]) -> RawFrame {
        RawFrame { bytes: bytes.to_vec(), time_of_arrival: Instant::now() }
    }

    fn noop_callback(_: ErredFrame) {}

    #[test]
    fn echo_frame_is_dropped_and_counted() {
        let stats = Statistics::default();
        let echo = EchoSuppressor::new();
        echo.set(vec![0x08, 0x0B, 0x18, 0x00, 0xAB]);
        let result = handle_raw_frame(raw(&[0x08, 0x0B, 0x18, 0x00, 0xAB]), &stats, &echo, &noop_callback);
        assert!(result.is_none());
        assert_eq!(stats.snapshot().ingress_echo_frames, 1);
        // Total counters are not touched for a suppressed echo.
        assert_eq!(stats.snapshot().ingress_total_frames, 0);
    }

    #[test]
    fn single_octet_frame_passes_through() {
        let stats = Statistics::default();
        let echo = EchoSuppressor::new();
        let result = handle_raw_frame(raw(&[0x8B]), &stats, &echo, &noop_callback).unwrap();
        assert_eq!(result.kind, FrameKind::PollReq);
        assert_eq!(stats.snapshot().ingress_total_frames, 1);
    }

    #[test]
    fn short_frame_is_flagged_as_error() {
        let stats = Statistics::default();
        let echo = EchoSuppressor::new();
        let result = handle_raw_frame(raw(&[0x08, 0x0B, 0x18, 0x00]), &stats, &echo, &noop_callback).unwrap();
        assert_eq!(result.kind, FrameKind::ErrorFrame);
        assert_eq!(stats.snapshot().ingress_short_frames, 1);
    }

    #[test]
    fn normal_frame_verifies_checksum_and_strips_it() {
        let stats = Statistics::default();
        let echo = EchoSuppressor::new();
        let payload = [0x08, 0x0B, 0x18, 0x00, 0xAB];
        let framed = frame::append_checksum(&payload);
        let result = handle_raw_frame(raw(&framed), &stats, &echo, &noop_callback).unwrap();
        assert_eq!(result.bytes, payload);
        assert_eq!(result.kind, classify_ingress(&payload));
    }

    #[test]
    fn checksum_mismatch_invokes_callback_and_flags_error() {
        let stats = Statistics::default();
        let echo = EchoSuppressor::new();
        let payload = [0x08, 0x0B, 0x18, 0x00, 0xAB];
        let mut framed = frame::append_checksum(&payload);
        let last = framed.len() - 1;
        framed[last] ^= 0xFF;
        let seen = std::cell::Cell::new(false);
        let callback = |erred: ErredFrame| {
            seen.set(true);
            assert!(erred.computed_checksum.is_some());
        };
        let result = handle_raw_frame(raw(&framed), &stats, &echo, &callback).unwrap();
        assert_eq!(result.kind, FrameKind::ErrorFrame);
        assert!(seen.get());
        assert_eq!(stats.snapshot().ingress_err_frames, 1);
    }

    #[test]
    fn doubled_ff_in_payload_unescapes_to_one_byte() {
        let stats = Statistics::default();
        let echo = EchoSuppressor::new();
        let payload = [0x08, 0x0B, 0x18, 0x00, 0xFF];
        let framed = frame::append_checksum(&payload);
        let wire = frame::escape_for_wire(&framed);
        let result = handle_raw_frame(raw(&wire), &stats, &echo, &noop_callback).unwrap();
        assert_eq!(result.bytes, payload);
    }

    #[test]
    fn framing_error_marker_is_counted_and_flagged() {
        let stats = Statistics::default();
        let echo = EchoSuppressor::new();
        // 0xFF 0x00 0x2A: byte 0x2A arrived with a framing error.
        let raw_bytes = [0x08, 0x0B, 0xFF, 0x00, 0x2A, 0x00, 0xAB];
        let result = handle_raw_frame(raw(&raw_bytes), &stats, &echo, &noop_callback).unwrap();
        assert_eq!(result.kind, FrameKind::ErrorFrame);
        assert_eq!(stats.snapshot().ingress_errors, 1);
        assert_eq!(stats.snapshot().ingress_err_frames, 1);
        // Unescaped length (6: the 0xFF/0x00 marker collapses away) plus the
        // terminating break octet that isn't part of `raw_bytes` itself.
        assert_eq!(stats.snapshot().ingress_err_octets, 6 + 1);
    }

    #[test]
    fn checksum_mismatch_counts_break_octet_in_err_octets() {
        let stats = Statistics::default();
        let echo = EchoSuppressor::new();
        let payload = [0x08, 0x0B, 0x18, 0x00, 0xAB];
        let mut framed = frame::append_checksum(&payload);
        let last = framed.len() - 1;
        framed[last] ^= 0xFF;
        let framed_len = framed.len();
        let result = handle_raw_frame(raw(&framed), &stats, &echo, &noop_callback).unwrap();
        assert_eq!(result.kind, FrameKind::ErrorFrame);
        assert_eq!(stats.snapshot().ingress_err_octets, framed_len as u64 + 1);
    }
}
