use crate::Error;

/// Legal values for `max_retx_threshold`, per 3GPP TS 36.322 configurable range.
const LEGAL_MAX_RETX: &[u32] = &[1, 2, 3, 4, 6, 8, 16, 32];

/// RRC-supplied configuration for one AM entity, validated on `configure()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmConfig {
    /// t-PollRetransmit duration in ms.
    pub t_poll_retx: u32,
    /// PDU-count threshold before a poll is forced; `0` disables this threshold (the comparison
    /// is guarded by `poll_pdu > 0`, not evaluated against it).
    pub poll_pdu: u32,
    /// Byte-count threshold before a poll is forced; `0` disables this threshold the same way.
    pub poll_byte: u32,
    /// Number of retransmissions of one SN before `MaxRetxReached` fires.
    pub max_retx_threshold: u32,
    /// t-Reordering duration in ms.
    pub t_reordering: u32,
    /// t-StatusProhibit duration in ms.
    pub t_status_prohibit: u32,
    /// Bounded SDU queue capacity, in PDUs.
    pub tx_queue_capacity: usize,
    /// Fallback poll periodicity used only when both `poll_pdu` and `poll_byte` are disabled.
    pub poll_periodicity: u32,
    /// Logical channel ID RRC assigned this bearer, returned verbatim by `get_bearer`.
    pub lcid: u32,
}

impl Default for AmConfig {
    fn default() -> Self {
        AmConfig {
            t_poll_retx: 80,
            poll_pdu: 0,
            poll_byte: 0,
            max_retx_threshold: 4,
            t_reordering: 35,
            t_status_prohibit: 0,
            tx_queue_capacity: 128,
            poll_periodicity: 8,
            lcid: 0,
        }
    }
}

impl AmConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(5..=500).contains(&self.t_poll_retx) {
            return Err(Error::InvalidConfig {
                reason: "t_poll_retx out of range 5..=500",
            });
        }
        if !LEGAL_MAX_RETX.contains(&self.max_retx_threshold) {
            return Err(Error::InvalidConfig {
                reason: "max_retx_threshold must be one of 1,2,3,4,6,8,16,32",
            });
        }
        if self.t_reordering > 200 {
            return Err(Error::InvalidConfig {
                reason: "t_reordering out of range 0..=200",
            });
        }
        if self.t_status_prohibit > 500 {
            return Err(Error::InvalidConfig {
                reason: "t_status_prohibit out of range 0..=500",
            });
        }
        if self.tx_queue_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "tx_queue_capacity must be non-zero",
            });
        }
        if self.poll_periodicity == 0 {
            return Err(Error::InvalidConfig {
                reason: "poll_periodicity must be non-zero",
            });
        }
        Ok(())
    }
}

/// UM-mode configuration: just the reordering timer and queue capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UmConfig {
    pub t_reordering: u32,
    pub tx_queue_capacity: usize,
    /// Logical channel ID RRC assigned this bearer, returned verbatim by `get_bearer`.
    pub lcid: u32,
}

impl Default for UmConfig {
    fn default() -> Self {
        UmConfig {
            t_reordering: 35,
            tx_queue_capacity: 128,
            lcid: 0,
        }
    }
}

impl UmConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.t_reordering > 200 {
            return Err(Error::InvalidConfig {
                reason: "t_reordering out of range 0..=200",
            });
        }
        if self.tx_queue_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "tx_queue_capacity must be non-zero",
            });
        }
        Ok(())
    }
}

/// TM-mode configuration: no timers, no ARQ, just a queue capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmConfig {
    pub tx_queue_capacity: usize,
    /// Logical channel ID RRC assigned this bearer, returned verbatim by `get_bearer`.
    pub lcid: u32,
}

impl Default for TmConfig {
    fn default() -> Self {
        TmConfig {
            tx_queue_capacity: 128,
            lcid: 0,
        }
    }
}

impl TmConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.tx_queue_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "tx_queue_capacity must be non-zero",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(AmConfig::default().validate().is_ok());
        assert!(UmConfig::default().validate().is_ok());
        assert!(TmConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_illegal_max_retx() {
        let mut cfg = AmConfig::default();
        cfg.max_retx_threshold = 5;
        assert_eq!(
            cfg.validate(),
            Err(Error::InvalidConfig {
                reason: "max_retx_threshold must be one of 1,2,3,4,6,8,16,32"
            })
        );
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        let mut cfg = AmConfig::default();
        cfg.tx_queue_capacity = 0;
        assert!(cfg.validate().is_err());
    }
}
