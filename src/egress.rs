//! Egress Dispatcher: the FSM that orchestrates the half-duplex send
//! window and request/reply pairing for frames an upstream caller wants
//! transmitted.
//!
//! The participate/mixed table buffers outgoing frames in
//! `Init`/`WePq` until our poll window opens, and tracks our own pending
//! read/write exchanges in `WiRp`/`WiWp` (buffered variants `WiRpb`/`WiWpb`)
//! so a second frame is never sent before the first's reply resolves.
//! Monitor mode's egress FSM never transmits, so it collapses to a single
//! absorbing state that drops everything.
//!
//! The queue wiring only ever carries an [`IngressNotice`] from the Ingress
//! Dispatcher to this FSM (the Writer's notices go to the Ingress
//! Dispatcher instead, to arm its own watchdog before the paired reply can
//! arrive — see `queue.rs`). `RQ`/`WQ` notices can originate from either the
//! ingress dispatcher or the writer; this implementation folds both
//! sources into the single wired path — an exchange pending on us,
//! whether we initiated it or it was addressed to us, is observed by the
//! Ingress Dispatcher and forwarded here as the same notice.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::frame::{classify_egress, EgressClassification, FrameKind, OutgoingFrame};
use crate::fsm::{Fsm, Next, StateAction, Transition};
use crate::queue::{EgressQueueItem, IngressNotice, WriterQueueItem};
use crate::stats::Statistics;
use crate::watchdog::Watchdog;

const READ_EXCHANGE_TIMEOUT: Duration = Duration::from_millis(125);
const WRITE_EXCHANGE_TIMEOUT: Duration = Duration::from_millis(125);
const POLL_WINDOW_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EgressState {
    Init,
    /// Waiting for the reply to a read exchange pending on us.
    WiRp,
    /// Same, with outgoing frames already buffered behind it.
    WiRpb,
    /// Waiting for the reply to a write exchange pending on us.
    WiWp,
    /// Same, with outgoing frames already buffered behind it.
    WiWpb,
    /// Frames buffered, waiting for our poll.
    WePq,
    /// Drained one buffered frame during our poll window, waiting for `XD`.
    WeXd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EgressStim {
    /// `PQ`: a poll addressed to us was observed.
    PollForUs,
    /// `RQ`: a read exchange is pending on us (we sent the request, or one
    /// addressed to us arrived and a reply is due).
    ReadExchangePending,
    /// `WQ`: same, for a write exchange.
    WriteExchangePending,
    /// `XD`: the pending exchange resolved.
    ExchangeDone,
    ReadReq,
    ReadRep,
    WriteReq,
    WriteRep,
    ReadReplyOrWriteReq,
    /// `bufemp`: synthetic stimulus reclassified by [`drain_or_empty`] once
    /// the outgoing buffer runs dry.
    BufferEmpty,
    Timeout,
}

impl From<IngressNotice> for EgressStim {
    fn from(notice: IngressNotice) -> Self {
        match notice {
            IngressNotice::PollForUs => EgressStim::PollForUs,
            IngressNotice::ReadRequestPending => EgressStim::ReadExchangePending,
            IngressNotice::WriteRequestPending => EgressStim::WriteExchangePending,
            IngressNotice::ExchangeDone => EgressStim::ExchangeDone,
        }
    }
}

impl From<FrameKind> for EgressStim {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::ReadReq => EgressStim::ReadReq,
            FrameKind::ReadRep => EgressStim::ReadRep,
            FrameKind::WriteReq => EgressStim::WriteReq,
            FrameKind::WriteRep => EgressStim::WriteRep,
            FrameKind::ReadReplyOrWriteReq => EgressStim::ReadReplyOrWriteReq,
            // PollReq/PollRep/ErrorFrame never originate as outgoing frames.
            other => panic!("{other:?} is not a valid outgoing frame classification"),
        }
    }
}

pub struct EgressContext {
    pub device_id: u8,
    pub stats: Arc<Statistics>,
    pub writer_tx: Sender<WriterQueueItem>,
    pub self_tx: Sender<EgressQueueItem>,
    pub watchdog: Arc<Watchdog>,
    buffer: VecDeque<OutgoingFrame>,
}

impl EgressContext {
    pub fn new(
        device_id: u8,
        stats: Arc<Statistics>,
        writer_tx: Sender<WriterQueueItem>,
        self_tx: Sender<EgressQueueItem>,
        watchdog: Arc<Watchdog>,
    ) -> Self {
        Self {
            device_id,
            stats,
            writer_tx,
            self_tx,
            watchdog,
            buffer: VecDeque::new(),
        }
    }
}

pub type EgressFsm = Fsm<EgressContext, EgressState, EgressStim, OutgoingFrame>;

pub fn new_monitor_fsm() -> EgressFsm {
    Fsm::new(EgressState::Init, monitor_transition, monitor_state_action)
}

pub fn new_participate_fsm() -> EgressFsm {
    Fsm::new(EgressState::Init, participate_transition, participate_state_action)
}

/// Runs the Egress Dispatcher loop until a `Shutdown` item is received or
/// the queue disconnects.
pub fn run(mut fsm: EgressFsm, mut ctx: EgressContext, from_queue: Receiver<EgressQueueItem>) {
    while let Ok(item) = from_queue.recv() {
        match item {
            EgressQueueItem::Outgoing(frame) => match classify_egress(&frame.bytes) {
                EgressClassification::TooShort => {
                    Statistics::bump(&ctx.stats.egress_err_short_frames);
                }
                EgressClassification::TooLong => {
                    Statistics::bump(&ctx.stats.egress_err_long_frames);
                }
                EgressClassification::Kind(kind) => {
                    let frame = OutgoingFrame { kind, ..frame };
                    fsm.handle_event_with(&mut ctx, EgressStim::from(kind), frame);
                }
            },
            EgressQueueItem::Notice(notice) => {
                fsm.handle_event(&mut ctx, EgressStim::from(notice));
            }
            EgressQueueItem::Timeout => {
                Statistics::bump(&ctx.stats.egress_err_timeout);
                fsm.handle_event(&mut ctx, EgressStim::Timeout);
            }
            EgressQueueItem::Shutdown => return,
        }
    }
}

type Row = Transition<EgressContext, EgressState, EgressStim, OutgoingFrame>;

fn row(next: EgressState, action: crate::fsm::Action<EgressContext, EgressStim, OutgoingFrame>) -> Row {
    Row { next: Next::State(next), action }
}

fn do_nothing(_ctx: &mut EgressContext, _frame: Option<&OutgoingFrame>) -> Option<(EgressStim, Option<OutgoingFrame>)> {
    None
}

fn report_protocol_error(ctx: &mut EgressContext) {
    Statistics::bump(&ctx.stats.egress_err_protocol);
}

fn report_error_and_ignore(
    ctx: &mut EgressContext,
    _frame: Option<&OutgoingFrame>,
) -> Option<(EgressStim, Option<OutgoingFrame>)> {
    report_protocol_error(ctx);
    None
}

fn buffer_frame(
    ctx: &mut EgressContext,
    frame: Option<&OutgoingFrame>,
) -> Option<(EgressStim, Option<OutgoingFrame>)> {
    if let Some(frame) = frame {
        ctx.buffer.push_back(frame.clone());
    }
    None
}

/// The awaited reply to an exchange pending on us (`ReadRep` in `WiRp`,
/// `WriteRep` in `WiWp`): goes straight to the Writer, never through the
/// buffer.
fn forward_frame(
    ctx: &mut EgressContext,
    frame: Option<&OutgoingFrame>,
) -> Option<(EgressStim, Option<OutgoingFrame>)> {
    if let Some(frame) = frame {
        let _ = ctx.writer_tx.send(WriterQueueItem::Frame(frame.clone()));
    }
    None
}

fn do_wrireq(
    ctx: &mut EgressContext,
    frame: Option<&OutgoingFrame>,
) -> Option<(EgressStim, Option<OutgoingFrame>)> {
    Statistics::bump(&ctx.stats.egress_wrireq_frames);
    Some((EgressStim::WriteReq, frame.cloned()))
}

/// `PQ` while waiting for our window: forward the oldest buffered frame to
/// the Writer.
fn forward_one_buffered(
    ctx: &mut EgressContext,
    _frame: Option<&OutgoingFrame>,
) -> Option<(EgressStim, Option<OutgoingFrame>)> {
    if let Some(frame) = ctx.buffer.pop_front() {
        let _ = ctx.writer_tx.send(WriterQueueItem::Frame(frame));
    }
    None
}

fn send_polrep(ctx: &mut EgressContext) {
    let _ = ctx.writer_tx.send(WriterQueueItem::Frame(OutgoingFrame {
        bytes: vec![ctx.device_id],
        kind: FrameKind::PollRep,
    }));
}

/// `PQ` with nothing buffered: reply to the poll immediately.
fn answer_bare_poll(
    ctx: &mut EgressContext,
    _frame: Option<&OutgoingFrame>,
) -> Option<(EgressStim, Option<OutgoingFrame>)> {
    send_polrep(ctx);
    None
}

/// `XD` closing our poll window: if more is buffered, acknowledge with a
/// `polrep` and keep the window open; otherwise drain out to `Init` via the
/// synthetic `bufemp` stimulus.
fn drain_or_empty(
    ctx: &mut EgressContext,
    _frame: Option<&OutgoingFrame>,
) -> Option<(EgressStim, Option<OutgoingFrame>)> {
    if ctx.buffer.is_empty() {
        Some((EgressStim::BufferEmpty, None))
    } else {
        send_polrep(ctx);
        None
    }
}

// --- participate/mixed table -------------------------------------------------

pub fn participate_transition(state: &EgressState, stim: &EgressStim) -> Row {
    use EgressStim::*;
    match (state, stim) {
        (EgressState::Init, PollForUs) => row(EgressState::Init, answer_bare_poll),
        (EgressState::Init, ReadExchangePending) => row(EgressState::WiRp, do_nothing),
        (EgressState::Init, WriteExchangePending) => row(EgressState::WiWp, do_nothing),
        (EgressState::Init, ReadReq | ReadRep | WriteReq | WriteRep) => row(EgressState::WePq, buffer_frame),
        (EgressState::Init, ReadReplyOrWriteReq) => row(EgressState::Init, do_wrireq),

        (EgressState::WiRp, PollForUs) => row(EgressState::WiRp, answer_bare_poll),
        (EgressState::WiRp, ReadRep) => row(EgressState::Init, forward_frame),
        (EgressState::WiRp, Timeout) => row(EgressState::Init, do_nothing),
        (EgressState::WiRp, ReadReq | WriteReq | WriteRep) => row(EgressState::WiRpb, buffer_frame),
        (EgressState::WiWp, PollForUs) => row(EgressState::WiWp, answer_bare_poll),
        (EgressState::WiWp, WriteRep) => row(EgressState::Init, forward_frame),
        (EgressState::WiWp, Timeout) => row(EgressState::Init, do_nothing),
        (EgressState::WiWp, ReadReq | ReadRep | WriteReq) => row(EgressState::WiWpb, buffer_frame),

        (EgressState::WiRpb, ExchangeDone) => row(EgressState::WePq, do_nothing),
        (EgressState::WiRpb, Timeout) => row(EgressState::WePq, do_nothing),
        (EgressState::WiRpb, ReadReq | ReadRep | WriteReq | WriteRep) => row(EgressState::WiRpb, buffer_frame),
        (EgressState::WiWpb, ExchangeDone) => row(EgressState::WePq, do_nothing),
        (EgressState::WiWpb, Timeout) => row(EgressState::WePq, do_nothing),
        (EgressState::WiWpb, ReadReq | ReadRep | WriteReq | WriteRep) => row(EgressState::WiWpb, buffer_frame),

        (EgressState::WePq, ReadReq | ReadRep | WriteReq | WriteRep) => row(EgressState::WePq, buffer_frame),
        (EgressState::WePq, PollForUs) => row(EgressState::WeXd, forward_one_buffered),
        (EgressState::WePq, ReadExchangePending) => row(EgressState::WiRpb, do_nothing),
        (EgressState::WePq, WriteExchangePending) => row(EgressState::WiWpb, do_nothing),
        (EgressState::WePq, BufferEmpty) => row(EgressState::Init, do_nothing),
        (EgressState::WePq, ReadReplyOrWriteReq) => row(EgressState::WePq, do_wrireq),

        (EgressState::WeXd, ExchangeDone) => row(EgressState::WePq, drain_or_empty),
        (EgressState::WeXd, Timeout) => row(EgressState::Init, do_nothing),
        (EgressState::WeXd, ReadReq | ReadRep | WriteReq | WriteRep) => row(EgressState::WeXd, buffer_frame),

        _ => row(*state, report_error_and_ignore),
    }
}

fn participate_state_action(state: &EgressState, _stim: &EgressStim) -> Option<StateAction<EgressContext>> {
    match state {
        EgressState::Init => Some(stop_watchdog),
        EgressState::WiRp | EgressState::WiRpb => Some(start_read_watchdog),
        EgressState::WiWp | EgressState::WiWpb => Some(start_write_watchdog),
        EgressState::WePq => Some(stop_watchdog),
        EgressState::WeXd => Some(start_poll_window_watchdog),
    }
}

// --- monitor table: absorbing, drops everything -----------------------------

pub fn monitor_transition(state: &EgressState, _stim: &EgressStim) -> Row {
    row(*state, do_nothing)
}

fn monitor_state_action(_state: &EgressState, _stim: &EgressStim) -> Option<StateAction<EgressContext>> {
    None
}

// --- state actions: watchdog arm/disarm -------------------------------------

fn stop_watchdog(ctx: &mut EgressContext) -> bool {
    ctx.watchdog.stop();
    true
}

fn timeout_handler(tx: Sender<EgressQueueItem>) -> crate::watchdog::Handler {
    Arc::new(move || {
        let _ = tx.send(EgressQueueItem::Timeout);
    })
}

fn start_read_watchdog(ctx: &mut EgressContext) -> bool {
    ctx.watchdog
        .start(READ_EXCHANGE_TIMEOUT, Some(timeout_handler(ctx.self_tx.clone())));
    true
}

fn start_write_watchdog(ctx: &mut EgressContext) -> bool {
    ctx.watchdog
        .start(WRITE_EXCHANGE_TIMEOUT, Some(timeout_handler(ctx.self_tx.clone())));
    true
}

fn start_poll_window_watchdog(ctx: &mut EgressContext) -> bool {
    ctx.watchdog
        .start(POLL_WINDOW_TIMEOUT, Some(timeout_handler(ctx.self_tx.clone())));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn context() -> (EgressContext, crossbeam_channel::Receiver<WriterQueueItem>) {
        let (writer_tx, writer_rx) = unbounded();
        let (self_tx, _self_rx) = unbounded();
        let ctx = EgressContext::new(
            0x0B,
            Arc::new(Statistics::default()),
            writer_tx,
            self_tx,
            Arc::new(Watchdog::new("test-edisp")),
        );
        (ctx, writer_rx)
    }

    fn outgoing(bytes: &[u8], kind: FrameKind) -> OutgoingFrame {
        OutgoingFrame { bytes: bytes.to_vec(), kind }
    }

    #[test]
    fn bare_poll_with_nothing_buffered_replies_immediately() {
        let (mut ctx, writer_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event(&mut ctx, EgressStim::PollForUs);
        assert_eq!(*fsm.state(), EgressState::Init);
        match writer_rx.try_recv().unwrap() {
            WriterQueueItem::Frame(frame) => assert_eq!(frame.bytes, vec![0x0B]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn buffered_frame_waits_for_poll_then_drains() {
        let (mut ctx, writer_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event_with(
            &mut ctx,
            EgressStim::ReadRep,
            outgoing(&[0x08, 0x00, 0x18, 0x00, 0xAB], FrameKind::ReadRep),
        );
        assert_eq!(*fsm.state(), EgressState::WePq);
        fsm.handle_event(&mut ctx, EgressStim::PollForUs);
        assert_eq!(*fsm.state(), EgressState::WeXd);
        match writer_rx.try_recv().unwrap() {
            WriterQueueItem::Frame(frame) => assert_eq!(frame.bytes, vec![0x08, 0x00, 0x18, 0x00, 0xAB]),
            other => panic!("unexpected {other:?}"),
        }
        fsm.handle_event(&mut ctx, EgressStim::ExchangeDone);
        assert_eq!(*fsm.state(), EgressState::Init);
    }

    #[test]
    fn second_buffered_frame_keeps_window_open_with_polrep() {
        let (mut ctx, writer_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event_with(&mut ctx, EgressStim::ReadRep, outgoing(&[1], FrameKind::ReadRep));
        fsm.handle_event_with(&mut ctx, EgressStim::WriteReq, outgoing(&[2], FrameKind::WriteReq));
        fsm.handle_event(&mut ctx, EgressStim::PollForUs);
        let _ = writer_rx.try_recv().unwrap(); // first buffered frame
        fsm.handle_event(&mut ctx, EgressStim::ExchangeDone);
        assert_eq!(*fsm.state(), EgressState::WePq);
        match writer_rx.try_recv().unwrap() {
            WriterQueueItem::Frame(frame) => assert_eq!(frame.bytes, vec![0x0B]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rporwq_resolves_to_write_request() {
        let (mut ctx, writer_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event_with(
            &mut ctx,
            EgressStim::ReadReplyOrWriteReq,
            outgoing(&[0x08, 0x0B, 0x18, 0x00], FrameKind::ReadReplyOrWriteReq),
        );
        assert_eq!(*fsm.state(), EgressState::WePq);
        assert_eq!(ctx.stats.snapshot().egress_wrireq_frames, 1);
        let _ = writer_rx.try_recv().unwrap();
    }

    #[test]
    fn read_exchange_pending_forwards_reply_immediately_without_buffering() {
        let (mut ctx, writer_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event(&mut ctx, EgressStim::ReadExchangePending);
        assert_eq!(*fsm.state(), EgressState::WiRp);
        fsm.handle_event_with(
            &mut ctx,
            EgressStim::ReadRep,
            outgoing(&[0x08, 0x00, 0x18, 0x00, 0xAB], FrameKind::ReadRep),
        );
        assert_eq!(*fsm.state(), EgressState::Init);
        match writer_rx.try_recv().unwrap() {
            WriterQueueItem::Frame(frame) => assert_eq!(frame.bytes, vec![0x08, 0x00, 0x18, 0x00, 0xAB]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(ctx.buffer.is_empty());
    }

    #[test]
    fn write_exchange_pending_forwards_reply_immediately_without_buffering() {
        let (mut ctx, writer_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event(&mut ctx, EgressStim::WriteExchangePending);
        assert_eq!(*fsm.state(), EgressState::WiWp);
        fsm.handle_event_with(&mut ctx, EgressStim::WriteRep, outgoing(&[0x01], FrameKind::WriteRep));
        assert_eq!(*fsm.state(), EgressState::Init);
        match writer_rx.try_recv().unwrap() {
            WriterQueueItem::Frame(frame) => assert_eq!(frame.bytes, vec![0x01]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn poll_while_reply_pending_is_answered_without_leaving_state() {
        let (mut ctx, writer_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event(&mut ctx, EgressStim::ReadExchangePending);
        fsm.handle_event(&mut ctx, EgressStim::PollForUs);
        assert_eq!(*fsm.state(), EgressState::WiRp);
        match writer_rx.try_recv().unwrap() {
            WriterQueueItem::Frame(frame) => assert_eq!(frame.bytes, vec![0x0B]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stray_exchange_done_while_reply_pending_is_a_protocol_error() {
        let (mut ctx, _writer_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event(&mut ctx, EgressStim::ReadExchangePending);
        fsm.handle_event(&mut ctx, EgressStim::ExchangeDone);
        assert_eq!(*fsm.state(), EgressState::WiRp);
        assert_eq!(ctx.stats.snapshot().egress_err_protocol, 1);
    }

    #[test]
    fn monitor_table_drops_everything() {
        let (mut ctx, writer_rx) = context();
        let mut fsm = new_monitor_fsm();
        fsm.handle_event_with(&mut ctx, EgressStim::ReadRep, outgoing(&[1, 2, 3, 4], FrameKind::ReadRep));
        assert_eq!(*fsm.state(), EgressState::Init);
        assert!(writer_rx.try_recv().is_err());
    }
}
