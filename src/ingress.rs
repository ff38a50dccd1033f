//! Ingress Dispatcher: the FSM that classifies frames handed up by the
//! Framer, forwards them upstream, and tells the Egress Dispatcher about
//! bus activity it needs to react to.
//!
//! Two transition tables exist, one per participation shape:
//!
//! - [`forward_all_transition`] ("monitor" shape): every addressed frame is
//!   forwarded upstream unconditionally; used when `Mode::Monitor` (which
//!   never transmits, so nothing downstream of this ever originates an
//!   `xmtrq`/`xmtwq`) or `Mode::Mixed` (which forwards all ingress but still
//!   participates in egress).
//! - [`participate_transition`] ("participate" shape): requests originate
//!   from us; the Writer signals `xmtrq`/`xmtwq` just before transmitting so
//!   this FSM starts watching for the paired reply before it can physically
//!   arrive, and only frames addressed to us or broadcast are forwarded.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::frame::{ClassifiedFrame, FrameKind};
use crate::fsm::{Fsm, Next, StateAction, Transition};
use crate::queue::{EgressQueueItem, IngressNotice, IngressQueueItem, WriterNotice};
use crate::stats::Statistics;
use crate::watchdog::Watchdog;

const READ_REQUEST_TIMEOUT: Duration = Duration::from_millis(125);
const WRITE_REQUEST_TIMEOUT: Duration = Duration::from_millis(125);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressState {
    Init,
    RxRq,
    RxWq,
    RxEf,
    XmRq,
    XmWq,
}

/// The FSM alphabet: [`FrameKind`] plus the writer notices and the watchdog
/// timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressStim {
    PollReq,
    PollRep,
    ReadReq,
    ReadRep,
    WriteReq,
    WriteRep,
    ReadReplyOrWriteReq,
    ErrorFrame,
    /// `xmtrq`: the Writer is about to transmit a read request we queued.
    XmitReadReq,
    /// `xmtwq`: the Writer is about to transmit a write request we queued.
    XmitWriteReq,
    Timeout,
}

impl From<FrameKind> for IngressStim {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::PollReq => IngressStim::PollReq,
            FrameKind::PollRep => IngressStim::PollRep,
            FrameKind::ReadReq => IngressStim::ReadReq,
            FrameKind::ReadRep => IngressStim::ReadRep,
            FrameKind::WriteReq => IngressStim::WriteReq,
            FrameKind::WriteRep => IngressStim::WriteRep,
            FrameKind::ReadReplyOrWriteReq => IngressStim::ReadReplyOrWriteReq,
            FrameKind::ErrorFrame => IngressStim::ErrorFrame,
        }
    }
}

impl From<WriterNotice> for IngressStim {
    fn from(notice: WriterNotice) -> Self {
        match notice {
            WriterNotice::ReadRequestSent => IngressStim::XmitReadReq,
            WriterNotice::WriteRequestSent => IngressStim::XmitWriteReq,
        }
    }
}

/// Owning driver state the ingress actions mutate; shared fields only, so
/// there is nothing this FSM needs exclusive access to beyond the `Fsm`
/// itself.
pub struct IngressContext {
    pub device_id: u8,
    pub stats: Arc<Statistics>,
    pub upstream_tx: Sender<ClassifiedFrame>,
    pub egress_tx: Sender<EgressQueueItem>,
    /// Back-channel to our own queue, so the watchdog's expiry handler can
    /// post a `Timeout` item instead of calling back into this FSM from its
    /// own thread (see `queue::IngressQueueItem::Timeout`).
    pub self_tx: Sender<IngressQueueItem>,
    pub watchdog: Arc<Watchdog>,
}

pub type IngressFsm = Fsm<IngressContext, IngressState, IngressStim, ClassifiedFrame>;

pub fn new_forward_all_fsm() -> IngressFsm {
    Fsm::new(IngressState::Init, forward_all_transition, forward_all_state_action)
}

pub fn new_participate_fsm() -> IngressFsm {
    Fsm::new(IngressState::Init, participate_transition, participate_state_action)
}

/// Runs the Ingress Dispatcher loop until a `Shutdown` item is received or
/// the queue disconnects.
pub fn run(mut fsm: IngressFsm, mut ctx: IngressContext, from_queue: Receiver<IngressQueueItem>) {
    while let Ok(item) = from_queue.recv() {
        match item {
            IngressQueueItem::Frame(frame) => {
                let stim = IngressStim::from(frame.kind);
                fsm.handle_event_with(&mut ctx, stim, frame);
            }
            IngressQueueItem::Notice(notice) => {
                fsm.handle_event(&mut ctx, IngressStim::from(notice));
            }
            IngressQueueItem::Timeout => {
                Statistics::bump(&ctx.stats.ingress_err_timeout);
                fsm.handle_event(&mut ctx, IngressStim::Timeout);
            }
            IngressQueueItem::Shutdown => return,
        }
    }
}

type Row = Transition<IngressContext, IngressState, IngressStim, ClassifiedFrame>;

fn row(next: IngressState, action: crate::fsm::Action<IngressContext, IngressStim, ClassifiedFrame>) -> Row {
    Row { next: Next::State(next), action }
}

// --- actions shared by both tables -----------------------------------------

fn ignore_frame(
    _ctx: &mut IngressContext,
    _frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    None
}

fn do_nothing(
    _ctx: &mut IngressContext,
    _frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    None
}

fn forward_frame(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    if let Some(frame) = frame {
        let _ = ctx.upstream_tx.send(frame.clone());
    }
    None
}

fn report_protocol_error(ctx: &mut IngressContext) {
    Statistics::bump(&ctx.stats.ingress_err_protocol);
}

fn report_error_and_forward(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    report_protocol_error(ctx);
    forward_frame(ctx, frame)
}

fn report_error_and_ignore(
    ctx: &mut IngressContext,
    _frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    report_protocol_error(ctx);
    None
}

fn do_rearep(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    Statistics::bump(&ctx.stats.ingress_rearep_frames);
    Some((IngressStim::ReadRep, frame.cloned()))
}

fn do_wrireq(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    Statistics::bump(&ctx.stats.ingress_wrireq_frames);
    Some((IngressStim::WriteReq, frame.cloned()))
}

// --- "forward everything" table (monitor / mixed-ingress) ------------------

/// `ifsm_handle_rearep`: a bare `rearep` arriving in `Init` (not preceded by
/// a request we are tracking) is forwarded, but reported as a protocol
/// error unless it is a broadcast.
fn handle_rearep(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    if let Some(frame) = frame {
        if frame.bytes.get(crate::frame::header::DEST).copied() != Some(0) {
            report_protocol_error(ctx);
        }
    }
    forward_frame(ctx, frame)
}

pub fn forward_all_transition(state: &IngressState, stim: &IngressStim) -> Row {
    use IngressStim::*;
    match (state, stim) {
        (IngressState::Init, PollReq) => row(IngressState::Init, ignore_frame),
        (IngressState::Init, PollRep) => row(IngressState::Init, ignore_frame),
        (IngressState::Init, ReadReq) => row(IngressState::RxRq, forward_frame),
        (IngressState::Init, ReadRep) => row(IngressState::Init, handle_rearep),
        (IngressState::Init, WriteReq) => row(IngressState::RxWq, forward_frame),
        (IngressState::Init, WriteRep) => row(IngressState::Init, report_error_and_forward),
        (IngressState::Init, ReadReplyOrWriteReq) => row(IngressState::Init, do_wrireq),
        (IngressState::Init, ErrorFrame) => row(IngressState::RxEf, ignore_frame),
        (IngressState::Init, Timeout) => row(IngressState::Init, do_nothing),

        (IngressState::RxRq, PollReq) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::RxRq, PollRep) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::RxRq, ReadReq) => row(IngressState::RxRq, report_error_and_forward),
        (IngressState::RxRq, ReadRep) => row(IngressState::Init, forward_frame),
        (IngressState::RxRq, WriteReq) => row(IngressState::RxWq, report_error_and_forward),
        (IngressState::RxRq, WriteRep) => row(IngressState::Init, report_error_and_forward),
        (IngressState::RxRq, ReadReplyOrWriteReq) => row(IngressState::RxRq, do_rearep),
        (IngressState::RxRq, ErrorFrame) => row(IngressState::RxEf, ignore_frame),
        (IngressState::RxRq, Timeout) => row(IngressState::Init, do_nothing),

        (IngressState::RxWq, PollReq) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::RxWq, PollRep) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::RxWq, ReadReq) => row(IngressState::RxRq, report_error_and_forward),
        (IngressState::RxWq, ReadRep) => row(IngressState::Init, report_error_and_forward),
        (IngressState::RxWq, WriteReq) => row(IngressState::RxWq, report_error_and_forward),
        (IngressState::RxWq, WriteRep) => row(IngressState::Init, forward_frame),
        (IngressState::RxWq, ReadReplyOrWriteReq) => row(IngressState::Init, do_wrireq),
        (IngressState::RxWq, ErrorFrame) => row(IngressState::RxEf, ignore_frame),
        (IngressState::RxWq, Timeout) => row(IngressState::Init, do_nothing),

        (IngressState::RxEf, PollReq) => row(IngressState::Init, ignore_frame),
        (IngressState::RxEf, PollRep) => row(IngressState::Init, ignore_frame),
        (IngressState::RxEf, ReadReq) => row(IngressState::RxRq, forward_frame),
        (IngressState::RxEf, ReadRep) => row(IngressState::Init, forward_frame),
        (IngressState::RxEf, WriteReq) => row(IngressState::RxWq, forward_frame),
        (IngressState::RxEf, WriteRep) => row(IngressState::Init, forward_frame),
        (IngressState::RxEf, ReadReplyOrWriteReq) => row(IngressState::Init, do_rearep),
        (IngressState::RxEf, ErrorFrame) => row(IngressState::RxEf, ignore_frame),
        (IngressState::RxEf, Timeout) => row(IngressState::Init, do_nothing),

        // The writer-notice and Xm* states never arise in this table (no
        // mode using it ever transmits a request), but are total for the
        // alphabet so the match stays exhaustive.
        (_, XmitReadReq) => row(*state, do_nothing),
        (_, XmitWriteReq) => row(*state, do_nothing),
        (IngressState::XmRq, _) | (IngressState::XmWq, _) => row(IngressState::Init, do_nothing),
    }
}

fn forward_all_state_action(state: &IngressState, _stim: &IngressStim) -> Option<StateAction<IngressContext>> {
    match state {
        IngressState::Init => Some(stop_watchdog),
        IngressState::RxRq => Some(start_read_watchdog),
        IngressState::RxWq => Some(start_write_watchdog),
        IngressState::RxEf | IngressState::XmRq | IngressState::XmWq => None,
    }
}

// --- "participate" table (requests originate from us) -----------------------

fn passon_polreq(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    if let Some(frame) = frame {
        if frame.bytes.first().copied() == Some(ctx.device_id | 0x80) {
            let _ = ctx.egress_tx.send(EgressQueueItem::Notice(IngressNotice::PollForUs));
        }
    }
    None
}

fn check_polrep(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    if let Some(frame) = frame {
        if frame.bytes.first().copied() == Some(ctx.device_id) {
            Statistics::bump(&ctx.stats.bus_address_conflict);
        }
    }
    None
}

fn passon_reareq(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    match frame {
        Some(frame) if frame.bytes.get(crate::frame::header::DEST).copied() == Some(ctx.device_id | 0x80) => {
            let _ = ctx.egress_tx.send(EgressQueueItem::Notice(IngressNotice::ReadRequestPending));
            forward_frame(ctx, Some(frame))
        }
        _ => None,
    }
}

fn passon_wrireq(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    match frame {
        Some(frame) if frame.bytes.get(crate::frame::header::DEST).copied() == Some(ctx.device_id) => {
            let _ = ctx.egress_tx.send(EgressQueueItem::Notice(IngressNotice::WriteRequestPending));
            forward_frame(ctx, Some(frame))
        }
        _ => None,
    }
}

fn passon_rearep(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    match frame {
        Some(frame) => {
            let dest = frame.bytes.get(crate::frame::header::DEST).copied();
            if dest == Some(0) || dest == Some(ctx.device_id) {
                forward_frame(ctx, Some(frame))
            } else {
                None
            }
        }
        None => None,
    }
}

/// `ifsm_reprxd_and_forf`: the reply to a read request we sent. Only
/// addressed-to-us replies close the exchange with an `XD` signal; a
/// broadcast reply to someone else's read request should never reach this
/// state (we are the one awaiting a reply), so it is dropped.
fn reprxd_and_forf(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    match frame {
        Some(frame) if frame.bytes.get(crate::frame::header::DEST).copied() == Some(ctx.device_id) => {
            repwxd_and_forf(ctx, Some(frame))
        }
        _ => None,
    }
}

/// `ifsm_repwxd_and_forf`: the reply to a write request we sent; signals
/// `XD` to the egress FSM and forwards the reply upstream.
fn repwxd_and_forf(
    ctx: &mut IngressContext,
    frame: Option<&ClassifiedFrame>,
) -> Option<(IngressStim, Option<ClassifiedFrame>)> {
    let _ = ctx.egress_tx.send(EgressQueueItem::Notice(IngressNotice::ExchangeDone));
    forward_frame(ctx, frame)
}

pub fn participate_transition(state: &IngressState, stim: &IngressStim) -> Row {
    use IngressStim::*;
    match (state, stim) {
        (IngressState::Init, PollReq) => row(IngressState::Init, passon_polreq),
        (IngressState::Init, PollRep) => row(IngressState::Init, check_polrep),
        (IngressState::Init, ReadReq) => row(IngressState::Init, passon_reareq),
        (IngressState::Init, ReadRep) => row(IngressState::Init, passon_rearep),
        (IngressState::Init, XmitReadReq) => row(IngressState::XmRq, do_nothing),
        (IngressState::Init, WriteReq) => row(IngressState::Init, passon_wrireq),
        (IngressState::Init, WriteRep) => row(IngressState::Init, ignore_frame),
        (IngressState::Init, XmitWriteReq) => row(IngressState::XmWq, do_nothing),
        (IngressState::Init, ReadReplyOrWriteReq) => row(IngressState::Init, do_wrireq),
        (IngressState::Init, ErrorFrame) => row(IngressState::Init, ignore_frame),
        (IngressState::Init, Timeout) => row(IngressState::Init, do_nothing),

        (IngressState::XmRq, PollReq) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmRq, PollRep) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmRq, ReadReq) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmRq, ReadRep) => row(IngressState::Init, reprxd_and_forf),
        (IngressState::XmRq, XmitReadReq) => row(IngressState::XmRq, report_error_and_ignore),
        (IngressState::XmRq, WriteReq) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmRq, WriteRep) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmRq, XmitWriteReq) => row(IngressState::XmRq, report_error_and_ignore),
        (IngressState::XmRq, ReadReplyOrWriteReq) => row(IngressState::XmRq, do_rearep),
        (IngressState::XmRq, ErrorFrame) => row(IngressState::Init, ignore_frame),
        (IngressState::XmRq, Timeout) => row(IngressState::Init, do_nothing),

        (IngressState::XmWq, PollReq) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmWq, PollRep) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmWq, ReadReq) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmWq, ReadRep) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmWq, XmitReadReq) => row(IngressState::XmWq, report_error_and_ignore),
        (IngressState::XmWq, WriteReq) => row(IngressState::XmWq, report_error_and_ignore),
        (IngressState::XmWq, WriteRep) => row(IngressState::Init, repwxd_and_forf),
        (IngressState::XmWq, XmitWriteReq) => row(IngressState::XmWq, report_error_and_ignore),
        (IngressState::XmWq, ReadReplyOrWriteReq) => row(IngressState::Init, report_error_and_ignore),
        (IngressState::XmWq, ErrorFrame) => row(IngressState::Init, ignore_frame),
        (IngressState::XmWq, Timeout) => row(IngressState::Init, do_nothing),

        // RxRq/RxWq/RxEf never arise while in participate mode.
        (IngressState::RxRq, _) | (IngressState::RxWq, _) | (IngressState::RxEf, _) => {
            row(IngressState::Init, do_nothing)
        }
    }
}

fn participate_state_action(state: &IngressState, _stim: &IngressStim) -> Option<StateAction<IngressContext>> {
    match state {
        IngressState::Init => Some(stop_watchdog),
        IngressState::XmRq => Some(start_read_watchdog),
        IngressState::XmWq => Some(start_write_watchdog),
        IngressState::RxRq | IngressState::RxWq | IngressState::RxEf => None,
    }
}

// --- state actions: watchdog arm/disarm -------------------------------------

fn stop_watchdog(ctx: &mut IngressContext) -> bool {
    ctx.watchdog.stop();
    true
}

fn timeout_handler(tx: Sender<IngressQueueItem>) -> crate::watchdog::Handler {
    Arc::new(move || {
        let _ = tx.send(IngressQueueItem::Timeout);
    })
}

fn start_read_watchdog(ctx: &mut IngressContext) -> bool {
    ctx.watchdog
        .start(READ_REQUEST_TIMEOUT, Some(timeout_handler(ctx.self_tx.clone())));
    true
}

fn start_write_watchdog(ctx: &mut IngressContext) -> bool {
    ctx.watchdog
        .start(WRITE_REQUEST_TIMEOUT, Some(timeout_handler(ctx.self_tx.clone())));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Instant;

    fn context() -> (IngressContext, crossbeam_channel::Receiver<ClassifiedFrame>, crossbeam_channel::Receiver<EgressQueueItem>)
    {
        let (upstream_tx, upstream_rx) = unbounded();
        let (egress_tx, egress_rx) = unbounded();
        let (self_tx, _self_rx) = unbounded();
        let ctx = IngressContext {
            device_id: 0x0B,
            stats: Arc::new(Statistics::default()),
            upstream_tx,
            egress_tx,
            self_tx,
            watchdog: Arc::new(Watchdog::new("test-idisp")),
        };
        (ctx, upstream_rx, egress_rx)
    }

    fn frame(bytes: &[u8]) -> ClassifiedFrame {
        ClassifiedFrame {
            bytes: bytes.to_vec(),
            kind: FrameKind::ErrorFrame, // unused by actions
            time_of_arrival: Instant::now(),
        }
    }

    #[test]
    fn forward_all_pairs_read_request_and_reply() {
        let (mut ctx, upstream_rx, _egress_rx) = context();
        let mut fsm = new_forward_all_fsm();
        fsm.handle_event_with(&mut ctx, IngressStim::ReadReq, frame(&[0x08, 0x10, 0x18, 0x00, 0xAB]));
        assert_eq!(*fsm.state(), IngressState::RxRq);
        fsm.handle_event_with(&mut ctx, IngressStim::ReadRep, frame(&[0x10, 0x08, 0x18, 0x00, 0xCD]));
        assert_eq!(*fsm.state(), IngressState::Init);
        assert_eq!(upstream_rx.try_recv().unwrap().bytes, vec![0x08, 0x10, 0x18, 0x00, 0xAB]);
        assert_eq!(upstream_rx.try_recv().unwrap().bytes, vec![0x10, 0x08, 0x18, 0x00, 0xCD]);
    }

    #[test]
    fn participate_polreq_for_us_notifies_egress() {
        let (mut ctx, _upstream_rx, egress_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event_with(&mut ctx, IngressStim::PollReq, frame(&[0x8B]));
        assert_eq!(*fsm.state(), IngressState::Init);
        assert!(matches!(
            egress_rx.try_recv().unwrap(),
            EgressQueueItem::Notice(IngressNotice::PollForUs)
        ));
    }

    #[test]
    fn participate_polrep_with_our_address_is_a_conflict() {
        let (mut ctx, _upstream_rx, _egress_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event_with(&mut ctx, IngressStim::PollRep, frame(&[0x0B]));
        assert_eq!(ctx.stats.snapshot().bus_address_conflict, 1);
    }

    #[test]
    fn participate_xmtrq_then_reply_signals_exchange_done() {
        let (mut ctx, upstream_rx, egress_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event(&mut ctx, IngressStim::XmitReadReq);
        assert_eq!(*fsm.state(), IngressState::XmRq);
        fsm.handle_event_with(&mut ctx, IngressStim::ReadRep, frame(&[0x10, 0x0B, 0x18, 0x00, 0xCD]));
        assert_eq!(*fsm.state(), IngressState::Init);
        assert!(matches!(
            egress_rx.try_recv().unwrap(),
            EgressQueueItem::Notice(IngressNotice::ExchangeDone)
        ));
        assert_eq!(upstream_rx.try_recv().unwrap().bytes, vec![0x10, 0x0B, 0x18, 0x00, 0xCD]);
    }

    #[test]
    fn ambiguous_rporwq_resolves_to_wrireq_in_init() {
        let (mut ctx, upstream_rx, egress_rx) = context();
        let mut fsm = new_participate_fsm();
        fsm.handle_event_with(
            &mut ctx,
            IngressStim::ReadReplyOrWriteReq,
            frame(&[0x08, 0x0B, 0x18, 0x00, 0xAB]),
        );
        assert_eq!(*fsm.state(), IngressState::Init);
        assert_eq!(ctx.stats.snapshot().ingress_wrireq_frames, 1);
        assert!(matches!(
            egress_rx.try_recv().unwrap(),
            EgressQueueItem::Notice(IngressNotice::WriteRequestPending)
        ));
        assert_eq!(upstream_rx.try_recv().unwrap().bytes, vec![0x08, 0x0B, 0x18, 0x00, 0xAB]);
    }
}
