//! EMS bus wire frame model: layout, checksum, and byte-stuffing helpers.
//!
//! Frame layout on the wire is `[src][dest][type][offset][data...][checksum]`
//! followed by a break. A handful of single-byte frames (poll request/reply,
//! write-reply) carry no checksum and no addressing fields at all.

use std::time::Instant;

/// Minimum length of a full (non-single-byte) frame, checksum excluded.
pub const MIN_FRAME_SIZE: usize = 4;
/// Maximum length of a full frame, checksum excluded.
pub const MAX_FRAME_SIZE: usize = 34;

/// The two single-byte values a write-reply can take; these can never be
/// legal bus addresses.
pub const WRITE_REPLY_SENTINELS: [u8; 2] = [0x01, 0x04];

const ESCAPE: u8 = 0xFF;

/// Header field offsets within a full frame.
pub mod header {
    pub const SOURCE: usize = 0;
    pub const DEST: usize = 1;
    pub const TYPE: usize = 2;
    pub const OFFSET: usize = 3;
}

/// The kind of a frame, derived either from its length/addressing (ingress,
/// pre-FSM classification) or attached by the caller of `write_frame`
/// (egress, statistics tagging only — see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Single-byte poll request: `device | 0x80`.
    PollReq,
    /// Single-byte poll reply: any other single byte not a write-reply
    /// sentinel.
    PollRep,
    /// Full frame with `dest == 0x00` (broadcast): a read reply.
    ReadRep,
    /// Full frame with `dest & 0x80` set: a read request.
    ReadReq,
    /// Full frame addressed directly to a device (low bit clear, nonzero):
    /// ambiguous between a read-reply continuation and a write request until
    /// bus state disambiguates it.
    ReadReplyOrWriteReq,
    /// A write request that has been disambiguated from the above.
    WriteReq,
    /// Single-byte write-reply sentinel (`0x01` success, `0x04` failure).
    WriteRep,
    /// A frame that failed validation (checksum, short/long, framing error).
    ErrorFrame,
}

/// A frame as it arrives off the wire, after de-escaping and classification,
/// carried from the Framer to the Ingress Dispatcher.
#[derive(Debug, Clone)]
pub struct ClassifiedFrame {
    pub bytes: Vec<u8>,
    pub kind: FrameKind,
    pub time_of_arrival: Instant,
}

/// A frame queued by an upstream caller (or re-queued by the FSMs) for
/// transmission by the Writer.
#[derive(Debug, Clone)]
pub struct OutgoingFrame {
    pub bytes: Vec<u8>,
    pub kind: FrameKind,
}

/// Result of a checksum-erred frame, handed to the `log_erred_frames`
/// callback.
#[derive(Debug, Clone)]
pub struct ErredFrame {
    pub time_of_arrival: Instant,
    pub bytes: Vec<u8>,
    /// `None` when the frame was too short to even attempt a checksum.
    pub computed_checksum: Option<u8>,
}

/// Computes the EMS bus checksum over `payload` (the frame bytes with the
/// trailing checksum byte already excluded).
///
/// This is not a CRC: `mask = 0x0C`; the accumulator starts at zero and for
/// each byte, is rotated (with the mask folded in when the high bit is set)
/// before being XORed with the byte.
pub fn compute_checksum(payload: &[u8]) -> u8 {
    const MASK: u8 = 0x0C;
    let mut acc: u8 = 0;
    for &byte in payload {
        acc = if acc & 0x80 != 0 {
            ((acc ^ MASK) << 1) | 0x01
        } else {
            acc << 1
        };
        acc ^= byte;
    }
    acc
}

/// Verifies a full frame (payload plus trailing checksum byte). Returns
/// `Ok(())` if it matches, `Err(expected)` with the computed checksum
/// otherwise.
pub fn verify_checksum(frame_with_checksum: &[u8]) -> Result<(), u8> {
    let (payload, checksum_byte) = frame_with_checksum
        .split_last()
        .map(|(last, rest)| (rest, *last))
        .unwrap_or((&[], 0));
    let expected = compute_checksum(payload);
    if expected == checksum_byte {
        Ok(())
    } else {
        Err(expected)
    }
}

/// Appends the checksum byte to `payload`, returning the full frame.
pub fn append_checksum(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(compute_checksum(payload));
    frame
}

/// Doubles every real `0xFF` byte in `frame` so the receiver's parity-marking
/// scheme cannot confuse a data byte for an escape sequence or a break.
pub fn escape_for_wire(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len());
    for &byte in frame {
        out.push(byte);
        if byte == ESCAPE {
            out.push(ESCAPE);
        }
    }
    out
}

/// Classifies a fully-received (post-checksum-verification) frame by length
/// and addressing, per the pre-FSM classification rules.
pub fn classify_ingress(bytes: &[u8]) -> FrameKind {
    match bytes.len() {
        1 => {
            let byte = bytes[0];
            if byte & 0x80 != 0 {
                FrameKind::PollReq
            } else if WRITE_REPLY_SENTINELS.contains(&byte) {
                FrameKind::WriteRep
            } else {
                FrameKind::PollRep
            }
        }
        _ => {
            let dest = bytes[header::DEST];
            if dest == 0x00 {
                FrameKind::ReadRep
            } else if dest & 0x80 != 0 {
                FrameKind::ReadReq
            } else {
                FrameKind::ReadReplyOrWriteReq
            }
        }
    }
}

/// Result of the pre-FSM classification the Egress Dispatcher applies to a
/// frame an upstream caller wants transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EgressClassification {
    Kind(FrameKind),
    /// Shorter than [`MIN_FRAME_SIZE`] and not a recognized single-byte
    /// frame: counted as a short-egress error and dropped before reaching
    /// the writer.
    TooShort,
    /// Longer than [`MAX_FRAME_SIZE`]: counted as a long-egress error and
    /// dropped before reaching the writer.
    TooLong,
}

/// Classifies an outgoing frame by length and addressing, per the Egress
/// Dispatcher's pre-FSM classification rules.
pub fn classify_egress(bytes: &[u8]) -> EgressClassification {
    match bytes.len() {
        1 => {
            let byte = bytes[0];
            if WRITE_REPLY_SENTINELS.contains(&byte) {
                EgressClassification::Kind(FrameKind::WriteRep)
            } else {
                EgressClassification::TooShort
            }
        }
        len if len < MIN_FRAME_SIZE => EgressClassification::TooShort,
        len if len > MAX_FRAME_SIZE => EgressClassification::TooLong,
        _ => {
            let dest = bytes[header::DEST];
            if dest == 0x00 {
                EgressClassification::Kind(FrameKind::ReadRep)
            } else if dest & 0x80 != 0 {
                EgressClassification::Kind(FrameKind::ReadReq)
            } else {
                EgressClassification::Kind(FrameKind::ReadReplyOrWriteReq)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_round_trips() {
        let payload = [0x0B, 0x88, 0x01, 0x00, 0xAB, 0xCD];
        let framed = append_checksum(&payload);
        assert!(verify_checksum(&framed).is_ok());
    }

    #[test]
    fn checksum_mismatch_reports_expected() {
        let payload = [0x0B, 0x88, 0x01, 0x00];
        let mut framed = append_checksum(&payload);
        let last = framed.len() - 1;
        framed[last] ^= 0xFF;
        assert!(verify_checksum(&framed).is_err());
    }

    #[test]
    fn escapes_doubled_0xff() {
        let frame = [0x0B, 0xFF, 0x01];
        assert_eq!(escape_for_wire(&frame), vec![0x0B, 0xFF, 0xFF, 0x01]);
    }

    #[test]
    fn classifies_poll_request() {
        assert_eq!(classify_ingress(&[0x8B]), FrameKind::PollReq);
    }

    #[test]
    fn classifies_write_reply_sentinels() {
        assert_eq!(classify_ingress(&[0x01]), FrameKind::WriteRep);
        assert_eq!(classify_ingress(&[0x04]), FrameKind::WriteRep);
    }

    #[test]
    fn classifies_broadcast_as_read_reply() {
        assert_eq!(
            classify_ingress(&[0x0B, 0x00, 0x01, 0x00]),
            FrameKind::ReadRep
        );
    }

    #[test]
    fn classifies_high_bit_dest_as_read_request() {
        assert_eq!(
            classify_ingress(&[0x0B, 0x8C, 0x01, 0x00]),
            FrameKind::ReadReq
        );
    }

    #[test]
    fn classifies_plain_dest_as_ambiguous() {
        assert_eq!(
            classify_ingress(&[0x0B, 0x0C, 0x01, 0x00]),
            FrameKind::ReadReplyOrWriteReq
        );
    }

    #[test]
    fn egress_classifies_short_and_long_frames_as_errors() {
        assert_eq!(classify_egress(&[0x0B, 0x00]), EgressClassification::TooShort);
        assert_eq!(
            classify_egress(&[0u8; MAX_FRAME_SIZE + 1]),
            EgressClassification::TooLong
        );
    }

    #[test]
    fn egress_classifies_broadcast_and_addressed_frames() {
        assert_eq!(
            classify_egress(&[0x0B, 0x00, 0x01, 0x00]),
            EgressClassification::Kind(FrameKind::ReadRep)
        );
        assert_eq!(
            classify_egress(&[0x0B, 0x8C, 0x01, 0x00]),
            EgressClassification::Kind(FrameKind::ReadReq)
        );
        assert_eq!(
            classify_egress(&[0x01]),
            EgressClassification::Kind(FrameKind::WriteRep)
        );
    }
}
