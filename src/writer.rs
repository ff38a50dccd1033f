//! UART Writer: serializes outgoing frames, emits the trailing break, and
//! notifies the dispatchers of transmissions they need to track.
//!
//! Byte-pacing differs by role: the bus master (device id `0x0B`) must pace each byte by hand at
//! roughly its own poll interval so its echoed bytes are not mistaken for a
//! second transmitter, while every other device simply writes the whole
//! buffer and sleeps long enough for the UART to drain it.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::warn;

use crate::echo::EchoSuppressor;
use crate::frame::{self, FrameKind, OutgoingFrame};
use crate::queue::{EgressQueueItem, IngressNotice, IngressQueueItem, WriterNotice, WriterQueueItem};
use crate::stats::Statistics;
use crate::uart::Uart;

/// Device id reserved for the bus master, paced byte-by-byte rather than as
/// a single buffered write.
const BUS_MASTER_ID: u8 = 0x0B;

/// Inter-byte delay the bus master uses so its own echo cannot be confused
/// with a second concurrent transmitter.
const BUS_MASTER_INTER_BYTE_DELAY: Duration = Duration::from_micros(3_300);

/// Duration of the break transmitted after every frame.
const BREAK_DURATION: Duration = Duration::from_millis(2);

/// UART baud rate in bits/second, used to size the post-write drain delay
/// for non-master writers (`len / 960` seconds, i.e. roughly one
/// start+8+stop-bit character time per byte at 9600 baud).
const DRAIN_BYTES_PER_SECOND: f64 = 960.0;

fn stats_counter_for<'a>(stats: &'a Statistics, kind: FrameKind) -> Option<&'a std::sync::atomic::AtomicU64> {
    match kind {
        FrameKind::PollRep => Some(&stats.egress_polrep_frames),
        FrameKind::ReadReq => Some(&stats.egress_reareq_frames),
        FrameKind::ReadRep => Some(&stats.egress_rearep_frames),
        FrameKind::WriteReq => Some(&stats.egress_wrireq_frames),
        FrameKind::WriteRep => Some(&stats.egress_wrirep_frames),
        FrameKind::PollReq | FrameKind::ReadReplyOrWriteReq | FrameKind::ErrorFrame => None,
    }
}

fn serialize(frame: &OutgoingFrame) -> Vec<u8> {
    if frame.bytes.len() >= frame::MIN_FRAME_SIZE {
        frame::append_checksum(&frame.bytes)
    } else {
        frame.bytes.clone()
    }
}

fn transmit(uart: &mut dyn Uart, device_id: u8, wire_bytes: &[u8]) {
    if device_id == BUS_MASTER_ID {
        for &byte in wire_bytes {
            if let Err(err) = uart.write_all(&[byte]) {
                warn!("writer: byte write failed: {err}");
                return;
            }
            thread::sleep(BUS_MASTER_INTER_BYTE_DELAY);
        }
    } else {
        if let Err(err) = uart.write_all(wire_bytes) {
            warn!("writer: write failed: {err}");
            return;
        }
        let drain = Duration::from_secs_f64(wire_bytes.len() as f64 / DRAIN_BYTES_PER_SECOND);
        thread::sleep(drain);
    }
    if let Err(err) = uart.send_break(BREAK_DURATION) {
        warn!("writer: break generation failed: {err}");
    }
}

/// Runs the Writer loop until a `Shutdown` item is received or `to_ingress`
/// disconnects.
pub fn run(
    mut uart: Box<dyn Uart>,
    device_id: u8,
    from_egress: Receiver<WriterQueueItem>,
    to_ingress: Sender<IngressQueueItem>,
    to_egress: Sender<EgressQueueItem>,
    echo: &EchoSuppressor,
    stats: &Statistics,
) {
    loop {
        let item = match from_egress.recv() {
            Ok(item) => item,
            Err(_) => return,
        };
        let frame = match item {
            WriterQueueItem::Shutdown => return,
            WriterQueueItem::Frame(frame) => frame,
        };

        if let Some(counter) = stats_counter_for(stats, frame.kind) {
            Statistics::bump(counter);
        }
        Statistics::bump(&stats.egress_total_frames);
        Statistics::add(&stats.egress_total_octets, frame.bytes.len() as u64);

        let notice = match frame.kind {
            FrameKind::ReadReq => Some(WriterNotice::ReadRequestSent),
            FrameKind::WriteReq => Some(WriterNotice::WriteRequestSent),
            _ => None,
        };
        if let Some(notice) = notice {
            if to_ingress.send(IngressQueueItem::Notice(notice)).is_err() {
                return;
            }
        }

        let wire_bytes = serialize(&frame);
        // PARMRK doubling is a receive-side termios transform; the bytes
        // actually put on the wire are never escaped. The escaped form is
        // only needed as the echo fingerprint, since that's how the Framer
        // will see our own transmission come back through PARMRK.
        let escaped = frame::escape_for_wire(&wire_bytes);
        echo.set(escaped);
        transmit(uart.as_mut(), device_id, &wire_bytes);

        let is_broadcast_read_reply =
            frame.kind == FrameKind::ReadRep && frame.bytes.get(frame::header::DEST).copied() == Some(0x00);
        if is_broadcast_read_reply
            && to_egress
                .send(EgressQueueItem::Notice(IngressNotice::ExchangeDone))
                .is_err()
        {
            return;
        }
    }
}
