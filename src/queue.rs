//! Typed sum-type items carried on the two cross-component queues.
//!
//! Each queue gets its own enum so the signal/frame distinction is checked
//! by the compiler rather than inferred from payload shape at dequeue time.

use crate::frame::{ClassifiedFrame, OutgoingFrame};

/// A notice the Writer posts to the Ingress Dispatcher immediately before
/// transmitting a request it just pulled off the egress queue, so the
/// ingress side starts watching for the corresponding reply before the
/// first reply byte can possibly arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterNotice {
    /// `'RQ'`: a read request was just sent.
    ReadRequestSent,
    /// `'WQ'`: a write request was just sent.
    WriteRequestSent,
}

/// An item on the ingress-side queue, consumed by the Ingress Dispatcher.
#[derive(Debug, Clone)]
pub enum IngressQueueItem {
    Frame(ClassifiedFrame),
    Notice(WriterNotice),
    /// Posted by the watchdog's expiry callback instead of calling the FSM
    /// directly, so the FSM is still only ever mutated by its own
    /// dispatcher thread.
    Timeout,
    /// Sentinel used to unblock a blocking `recv` during shutdown.
    Shutdown,
}

/// A notice the Ingress Dispatcher posts to the Egress Dispatcher in
/// response to something it observed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressNotice {
    /// `'PQ'`: a poll addressed to us was observed; a reply is due.
    PollForUs,
    /// `'RQ'`: a read request addressed to us was observed; a reply is due.
    ReadRequestPending,
    /// `'WQ'`: a write request addressed to us was observed; a reply is due.
    WriteRequestPending,
    /// `'XD'`: an exchange we initiated (or a broadcast read reply) has
    /// completed.
    ExchangeDone,
}

/// An item on the egress-side queue, consumed by the Egress Dispatcher.
#[derive(Debug, Clone)]
pub enum EgressQueueItem {
    Outgoing(OutgoingFrame),
    Notice(IngressNotice),
    /// Posted by the watchdog's expiry callback instead of calling the FSM
    /// directly; see [`IngressQueueItem::Timeout`].
    Timeout,
    Shutdown,
}

/// An item on the writer queue, consumed by the UART Writer. The Egress
/// Dispatcher is the sole producer.
#[derive(Debug, Clone)]
pub enum WriterQueueItem {
    Frame(OutgoingFrame),
    Shutdown,
}
