use std::sync::atomic::{AtomicU64, Ordering};

/// Byte counters carried alongside the Tx/Rx engines' own accounting, exposed to RRC for
/// reporting. Reset independently of protocol state via `reset()`.
#[derive(Debug, Default)]
pub struct Metrics {
    tx_bytes: AtomicU64,
    rx_bytes: AtomicU64,
}

impl Metrics {
    pub fn add_tx_bytes(&self, n: usize) {
        self.tx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_rx_bytes(&self, n: usize) {
        self.rx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn num_tx_bytes(&self) -> u64 {
        self.tx_bytes.load(Ordering::Relaxed)
    }

    pub fn num_rx_bytes(&self) -> u64 {
        self.rx_bytes.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.tx_bytes.store(0, Ordering::Relaxed);
        self.rx_bytes.store(0, Ordering::Relaxed);
    }
}
