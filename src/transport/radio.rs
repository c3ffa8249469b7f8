//! Peer-radio backend.
//!
//! The radio stack delivers received frames from its own task, racing the
//! main loop. The only shared object is a bounded single-producer /
//! single-consumer inbox:
//!
//! - the receive callback owns the [`RxLatch`] (producer) and only copies
//!   the frame and enqueues it;
//! - [`PeerRadioBackend::poll`] owns the consumer and is the only place
//!   frames are dequeued and handed to game logic.
//!
//! Send completion is reported asynchronously too; it is latched into the
//! atomic counters of [`RadioStats`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use heapless::spsc::{Consumer, Producer, Queue};
use log::{info, warn};

use super::{Transport, TransportConfig};
use crate::error::TransportError;
use crate::protocol::{Frame, MAX_FRAME_LEN};

/// Inbox slots. A heapless queue of size N holds N - 1 frames.
pub const INBOX_DEPTH: usize = 8;

/// Link-layer broadcast address.
pub const BROADCAST_ADDR: [u8; 6] = [0xFF; 6];

// ───────────────────────────────────────────────────────────────
// Shared counters
// ───────────────────────────────────────────────────────────────

/// Counters written from the radio task, read from the main loop.
#[derive(Debug, Default)]
pub struct RadioStats {
    tx_ok: AtomicU32,
    tx_failed: AtomicU32,
    rx_dropped: AtomicU32,
}

/// Point-in-time copy of [`RadioStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RadioStatsSnapshot {
    pub tx_ok: u32,
    pub tx_failed: u32,
    pub rx_dropped: u32,
}

impl RadioStats {
    /// Send-status latch.
    pub fn record_send(&self, delivered: bool) {
        let counter = if delivered { &self.tx_ok } else { &self.tx_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rx_drop(&self) {
        self.rx_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RadioStatsSnapshot {
        RadioStatsSnapshot {
            tx_ok: self.tx_ok.load(Ordering::Relaxed),
            tx_failed: self.tx_failed.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Receive latch
// ───────────────────────────────────────────────────────────────

/// Producer half of the inbox, moved into the radio receive callback.
pub struct RxLatch {
    producer: Producer<'static, Frame, INBOX_DEPTH>,
    stats: Arc<RadioStats>,
}

impl RxLatch {
    /// Copy `data` into the inbox. Oversized frames and frames arriving
    /// while the inbox is full are counted and dropped. Never blocks.
    pub fn deliver(&mut self, data: &[u8]) {
        let Ok(frame) = Frame::from_slice(data) else {
            self.stats.record_rx_drop();
            return;
        };
        if self.producer.enqueue(frame).is_err() {
            self.stats.record_rx_drop();
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Driver seam
// ───────────────────────────────────────────────────────────────

/// Vendor radio stack as seen by the backend.
pub trait RadioDriver {
    /// Pin the radio to `channel`. Must happen before [`RadioDriver::start`].
    fn lock_channel(&mut self, channel: u8) -> Result<(), TransportError>;

    /// Initialise the stack, register the send-status latch and add the
    /// broadcast peer.
    fn start(&mut self, stats: Arc<RadioStats>) -> Result<(), TransportError>;

    /// Register the receive latch. Only called after a successful
    /// [`RadioDriver::start`].
    fn attach_rx(&mut self, rx: RxLatch);

    /// Queue one frame for `peer`. `Ok` means accepted by the stack, not
    /// delivered.
    fn send(&mut self, peer: &[u8; 6], data: &[u8]) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Backend
// ───────────────────────────────────────────────────────────────

pub struct PeerRadioBackend<D: RadioDriver> {
    driver: D,
    inbox: Option<Consumer<'static, Frame, INBOX_DEPTH>>,
    stats: Arc<RadioStats>,
}

impl<D: RadioDriver> PeerRadioBackend<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            inbox: None,
            stats: Arc::new(RadioStats::default()),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn stats(&self) -> RadioStatsSnapshot {
        self.stats.snapshot()
    }

    fn send_frame(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if data.is_empty() {
            return Err(TransportError::EmptyPayload);
        }
        if self.inbox.is_none() {
            return Err(TransportError::NotInitialized);
        }
        if data.len() > MAX_FRAME_LEN {
            return Err(TransportError::TooLarge);
        }
        self.driver.send(&BROADCAST_ADDR, data)
    }
}

impl<D: RadioDriver> Transport for PeerRadioBackend<D> {
    fn name(&self) -> &'static str {
        "peer-radio"
    }

    fn init(&mut self, config: &TransportConfig) -> Result<(), TransportError> {
        if self.inbox.is_some() {
            return Ok(());
        }

        self.driver.lock_channel(config.wifi_channel).map_err(|e| {
            warn!("[Radio] channel {} lock failed: {}", config.wifi_channel, e);
            TransportError::InitFailed
        })?;

        self.driver.start(self.stats.clone()).map_err(|e| {
            warn!("[Radio] stack start failed: {}", e);
            TransportError::InitFailed
        })?;

        // Lives for the rest of the program: the radio task holds the
        // producer until reboot. Allocated once, after the stack is up.
        let queue: &'static mut Queue<Frame, INBOX_DEPTH> = Box::leak(Box::new(Queue::new()));
        let (producer, consumer) = queue.split();
        self.driver.attach_rx(RxLatch {
            producer,
            stats: self.stats.clone(),
        });

        self.inbox = Some(consumer);
        info!("[Radio] ready on channel {}", config.wifi_channel);
        Ok(())
    }

    fn send_to_server(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.send_frame(data)
    }

    fn broadcast(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.send_frame(data)
    }

    fn poll(&mut self, handler: &mut dyn FnMut(&[u8])) {
        let Some(inbox) = self.inbox.as_mut() else {
            return;
        };
        while let Some(frame) = inbox.dequeue() {
            handler(&frame);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation driver
// ───────────────────────────────────────────────────────────────

/// Radio stand-in for host builds: records sends and lets tests inject
/// received frames through the registered latch.
#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct SimRadio {
    pub channel: Option<u8>,
    pub sent: Vec<([u8; 6], Vec<u8>)>,
    pub fail_lock: bool,
    pub fail_start: bool,
    pub starts: u32,
    latch: Option<RxLatch>,
    stats: Option<Arc<RadioStats>>,
}

#[cfg(not(target_os = "espidf"))]
impl SimRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_rx_latch(&self) -> bool {
        self.latch.is_some()
    }

    /// Deliver `data` as if it arrived over the air.
    pub fn inject(&mut self, data: &[u8]) {
        if let Some(latch) = self.latch.as_mut() {
            latch.deliver(data);
        }
    }

    /// Report an asynchronous send status.
    pub fn complete_send(&self, delivered: bool) {
        if let Some(stats) = &self.stats {
            stats.record_send(delivered);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl RadioDriver for SimRadio {
    fn lock_channel(&mut self, channel: u8) -> Result<(), TransportError> {
        if self.fail_lock {
            return Err(TransportError::InitFailed);
        }
        self.channel = Some(channel);
        Ok(())
    }

    fn start(&mut self, stats: Arc<RadioStats>) -> Result<(), TransportError> {
        self.starts += 1;
        if self.fail_start {
            return Err(TransportError::InitFailed);
        }
        self.stats = Some(stats);
        Ok(())
    }

    fn attach_rx(&mut self, rx: RxLatch) {
        self.latch = Some(rx);
    }

    fn send(&mut self, peer: &[u8; 6], data: &[u8]) -> Result<(), TransportError> {
        self.sent.push((*peer, data.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> PeerRadioBackend<SimRadio> {
        let mut b = PeerRadioBackend::new(SimRadio::new());
        b.init(&TransportConfig::default()).unwrap();
        b
    }

    fn drain(b: &mut PeerRadioBackend<SimRadio>) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        b.poll(&mut |f: &[u8]| out.push(f.to_vec()));
        out
    }

    #[test]
    fn init_locks_channel_first() {
        let mut b = PeerRadioBackend::new(SimRadio::new());
        let cfg = TransportConfig {
            wifi_channel: 11,
            ..TransportConfig::default()
        };
        b.init(&cfg).unwrap();
        assert_eq!(b.driver().channel, Some(11));
    }

    #[test]
    fn init_fails_when_channel_lock_fails() {
        let mut radio = SimRadio::new();
        radio.fail_lock = true;
        let mut b = PeerRadioBackend::new(radio);
        assert_eq!(
            b.init(&TransportConfig::default()),
            Err(TransportError::InitFailed)
        );
        assert_eq!(b.broadcast(&[1]), Err(TransportError::NotInitialized));
    }

    #[test]
    fn init_fails_when_stack_start_fails() {
        let mut radio = SimRadio::new();
        radio.fail_start = true;
        let mut b = PeerRadioBackend::new(radio);
        assert_eq!(
            b.init(&TransportConfig::default()),
            Err(TransportError::InitFailed)
        );
        assert!(!b.driver().has_rx_latch());
    }

    #[test]
    fn retry_after_failed_start_receives() {
        let mut radio = SimRadio::new();
        radio.fail_start = true;
        let mut b = PeerRadioBackend::new(radio);
        assert!(b.init(&TransportConfig::default()).is_err());
        assert!(b.init(&TransportConfig::default()).is_err());
        assert!(!b.driver().has_rx_latch());

        b.driver_mut().fail_start = false;
        b.init(&TransportConfig::default()).unwrap();
        assert_eq!(b.driver().starts, 3);
        b.driver_mut().inject(&[4, 2]);
        assert_eq!(drain(&mut b), vec![vec![4, 2]]);
    }

    #[test]
    fn empty_payload_never_reaches_the_radio() {
        let mut b = ready();
        assert_eq!(b.broadcast(&[]), Err(TransportError::EmptyPayload));
        assert_eq!(b.send_to_server(&[]), Err(TransportError::EmptyPayload));
        assert!(b.driver().sent.is_empty());
    }

    #[test]
    fn oversized_payload_rejected() {
        let mut b = ready();
        let big = vec![0u8; MAX_FRAME_LEN + 1];
        assert_eq!(b.broadcast(&big), Err(TransportError::TooLarge));
        assert!(b.driver().sent.is_empty());
    }

    #[test]
    fn both_send_paths_broadcast() {
        let mut b = ready();
        b.send_to_server(&[1]).unwrap();
        b.broadcast(&[2]).unwrap();
        let sent = &b.driver().sent;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(peer, _)| *peer == BROADCAST_ADDR));
    }

    #[test]
    fn received_frames_are_drained_in_order() {
        let mut b = ready();
        b.driver_mut().inject(&[1, 1]);
        b.driver_mut().inject(&[2]);
        assert_eq!(drain(&mut b), vec![vec![1, 1], vec![2]]);
        assert!(drain(&mut b).is_empty());
    }

    #[test]
    fn full_inbox_drops_and_counts() {
        let mut b = ready();
        for i in 0..INBOX_DEPTH as u8 + 2 {
            b.driver_mut().inject(&[i]);
        }
        let got = drain(&mut b);
        assert_eq!(got.len(), INBOX_DEPTH - 1);
        assert_eq!(b.stats().rx_dropped, 3);
    }

    #[test]
    fn send_status_latches_into_counters() {
        let b = ready();
        b.driver().complete_send(true);
        b.driver().complete_send(true);
        b.driver().complete_send(false);
        let s = b.stats();
        assert_eq!((s.tx_ok, s.tx_failed), (2, 1));
    }

    #[test]
    fn second_init_is_a_no_op() {
        let mut b = ready();
        b.driver_mut().channel = None;
        b.init(&TransportConfig::default()).unwrap();
        assert_eq!(b.driver().channel, None);
    }
}
