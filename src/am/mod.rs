//! AM entity: combines the Tx and Rx engines behind one mutex plus an independently-locked SDU
//! queue, per spec §5's concurrency model.
//!
//! Grounded on the teacher's `Manager`/`NetStack` (`lib.rs`): one `Arc<Mutex<_>>` owning all
//! per-connection state, with a separate polling loop driving time-based behavior. Here that
//! collapses from a whole connection table down to one entity's Tx+Rx substructs, per spec §9's
//! "collapse into a single owned object with private substructs" design note. Tx and Rx never
//! hold pointers to each other; this type is where cross-engine calls (STATUS handoff) resolve.

mod rx;
mod tx;

pub use rx::RxEngine;
pub use tx::{MaxRetxEvent, TxEngine, WINDOW_SIZE};

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::config::AmConfig;
use crate::metrics::Metrics;
use crate::pdu::StatusPdu;
use crate::queue::SduQueue;
use crate::timer::Timer;
use crate::Error;

struct Inner {
    tx: TxEngine,
    rx: RxEngine,
    status_prohibit: Timer,
}

/// One AM entity for one logical channel. Owns a bounded SDU queue (its own mutex, so
/// `write_sdu` can block without stalling `read_pdu`/`write_pdu`) and the combined Tx/Rx state
/// behind a second mutex.
pub struct AmEntity {
    cfg: AmConfig,
    queue: SduQueue,
    inner: Mutex<Inner>,
    metrics: Metrics,
}

impl AmEntity {
    pub fn new(cfg: AmConfig) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(AmEntity {
            cfg,
            queue: SduQueue::new(cfg.tx_queue_capacity),
            inner: Mutex::new(Inner {
                tx: TxEngine::new(cfg),
                rx: RxEngine::new(cfg),
                status_prohibit: Timer::new(),
            }),
            metrics: Metrics::default(),
        })
    }

    /// Push one SDU from the upper layer (PDCP). Blocking per `blocking`.
    pub fn write_sdu(&self, sdu: Vec<u8>, blocking: bool) -> Result<(), Error> {
        if blocking {
            self.queue.push(sdu)
        } else {
            self.queue.try_push(sdu)
        }
    }

    /// Called by MAC at each TTI to fill one grant. Never blocks.
    pub fn read_pdu(&self, max_bytes: usize, now_tti: u64) -> Vec<u8> {
        let mut inner = self.inner.lock().unwrap();
        inner.status_prohibit.check(now_tti);
        let status_prohibited = inner.status_prohibit.is_running() && !inner.status_prohibit.has_expired();

        if !status_prohibited && inner.rx.get_do_status() && !inner.tx.has_status_pending() {
            let status = inner.rx.build_status_pdu();
            inner.tx.queue_status(status);
        }

        // Drain as many queued SDUs as the Tx engine might plausibly consume this call;
        // `build_data_pdu_from` only takes however many fit the grant, and whatever it leaves
        // behind is pushed back onto the queue below. try_pop keeps this non-blocking.
        let mut sdus = VecDeque::new();
        while sdus.len() < 8 {
            match self.queue.try_pop() {
                Some(sdu) => sdus.push_back(sdu),
                None => break,
            }
        }

        let bytes = inner.tx.read_pdu(max_bytes, now_tti, status_prohibited, &mut sdus);

        if !bytes.is_empty() {
            self.metrics.add_tx_bytes(bytes.len());
            if StatusPdu::is_control_pdu(bytes[0]) {
                inner.status_prohibit.start(now_tti, self.cfg.t_status_prohibit);
            }
        }

        // give back any SDUs that didn't fit this grant, preserving order
        while let Some(sdu) = sdus.pop_back() {
            self.queue.push_front(sdu);
        }

        let events = inner.tx.take_max_retx_events();
        drop(inner);
        for event in events {
            log::error!(
                "sn {} reached the configured retransmission threshold ({})",
                event.sn,
                event.threshold
            );
        }
        bytes
    }

    /// Called by MAC for each received transport block.
    pub fn write_pdu(&self, bytes: &[u8], now_tti: u64) -> Result<(), Error> {
        if bytes.is_empty() {
            return Err(Error::MalformedPdu {
                reason: "empty PDU",
            });
        }
        self.metrics.add_rx_bytes(bytes.len());
        let mut inner = self.inner.lock().unwrap();
        let is_data = inner.rx.write_pdu(bytes, now_tti)?;
        if !is_data {
            let mut r = crate::pdu::cursor::BitReader::new(bytes);
            let status = StatusPdu::read(&mut r)?;
            inner.tx.handle_control_pdu(&status, now_tti);
        }
        Ok(())
    }

    /// Drain SDUs reassembled by the Rx engine, in delivery order, for handoff to PDCP.
    pub fn take_delivered_sdus(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().rx.take_delivered()
    }

    pub fn on_tick(&self, now_tti: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.tx.on_tick(now_tti);
        inner.rx.on_tick(now_tti);
        inner.status_prohibit.check(now_tti);
    }

    pub fn get_buffer_state(&self, now_tti: u64) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let queue_bytes = self.queue.bytes_pending();
        inner.tx.get_buffer_state(now_tti, queue_bytes)
    }

    pub fn reestablish(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.tx.reestablish();
        inner.rx.reestablish();
        inner.status_prohibit.stop();
        drop(inner);
        self.queue.reset();
        self.metrics.reset();
    }

    pub fn stop(&self) {
        self.queue.close();
        let mut inner = self.inner.lock().unwrap();
        inner.tx.stop();
        inner.rx.stop();
    }

    pub fn empty_queue(&self) {
        self.queue.reset();
    }

    pub fn get_num_tx_bytes(&self) -> u64 {
        self.metrics.num_tx_bytes()
    }

    pub fn get_num_rx_bytes(&self) -> u64 {
        self.metrics.num_rx_bytes()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub fn config(&self) -> AmConfig {
        self.cfg
    }

    pub fn get_bearer(&self) -> u32 {
        self.cfg.lcid
    }
}
