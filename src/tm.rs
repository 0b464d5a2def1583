//! TM (Transparent Mode): no header, no segmentation, no ARQ.
//!
//! Grounded on §4.6: the simplest sibling mode, kept minimal since TM exists behind the common
//! `RlcEntity` interface rather than as a hard-engineering target in its own right. Reuses the
//! bounded SDU queue and byte metrics wholesale; nothing else from AM applies.

use crate::config::TmConfig;
use crate::metrics::Metrics;
use crate::queue::SduQueue;
use crate::Error;

pub struct TmEntity {
    cfg: TmConfig,
    queue: SduQueue,
    metrics: Metrics,
}

impl TmEntity {
    pub fn new(cfg: TmConfig) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(TmEntity {
            cfg,
            queue: SduQueue::new(cfg.tx_queue_capacity),
            metrics: Metrics::default(),
        })
    }

    pub fn write_sdu(&self, sdu: Vec<u8>, blocking: bool) -> Result<(), Error> {
        if blocking {
            self.queue.push(sdu)
        } else {
            self.queue.try_push(sdu)
        }
    }

    /// Copies one SDU verbatim if it fits the grant; TM never segments, so an oversized SDU at
    /// the head of the queue is dropped rather than split.
    pub fn read_pdu(&self, max_bytes: usize) -> Vec<u8> {
        let front_len = self.queue.front_bytes();
        if front_len == 0 {
            return Vec::new();
        }
        if front_len > max_bytes {
            log::warn!(
                "dropping {}-byte TM SDU: exceeds {}-byte grant with no segmentation available",
                front_len,
                max_bytes
            );
            self.queue.try_pop();
            return Vec::new();
        }
        match self.queue.try_pop() {
            Some(sdu) => {
                self.metrics.add_tx_bytes(sdu.len());
                sdu
            }
            None => Vec::new(),
        }
    }

    /// Delivers the bytes upward unchanged; TM carries no header to strip.
    pub fn write_pdu(&self, bytes: &[u8]) -> Vec<u8> {
        self.metrics.add_rx_bytes(bytes.len());
        bytes.to_vec()
    }

    pub fn get_buffer_state(&self) -> usize {
        self.queue.bytes_pending()
    }

    pub fn get_bearer(&self) -> u32 {
        self.cfg.lcid
    }

    pub fn reestablish(&self) {
        self.queue.reset();
        self.metrics.reset();
    }

    pub fn stop(&self) {
        self.queue.close();
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_sdu_verbatim_when_it_fits() {
        let tm = TmEntity::new(TmConfig::default()).unwrap();
        tm.write_sdu(vec![1, 2, 3], true).unwrap();
        assert_eq!(tm.read_pdu(10), vec![1, 2, 3]);
    }

    #[test]
    fn drops_oversized_sdu_without_segmenting() {
        let tm = TmEntity::new(TmConfig::default()).unwrap();
        tm.write_sdu(vec![0u8; 20], true).unwrap();
        assert!(tm.read_pdu(5).is_empty());
        assert_eq!(tm.get_buffer_state(), 0);
    }

    #[test]
    fn write_pdu_passes_bytes_through() {
        let tm = TmEntity::new(TmConfig::default()).unwrap();
        assert_eq!(tm.write_pdu(&[9, 9]), vec![9, 9]);
    }
}
