#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("SDU queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("byte-buffer pool exhausted, requested {requested} bytes")]
    BufferPoolExhausted { requested: usize },

    #[error("malformed PDU: {reason}")]
    MalformedPdu { reason: &'static str },

    #[error("SN {sn} is outside the receive window")]
    OutOfWindow { sn: u16 },

    #[error("SN {sn} is a duplicate of a PDU already in the receive window")]
    DuplicatePdu { sn: u16 },

    #[error("SN {sn} reached the configured retransmission threshold ({threshold})")]
    MaxRetxReached { sn: u16, threshold: u32 },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}
