//! Trace and span identifiers.

use std::fmt;

/// 128-bit trace identifier. Rendered as 16 hex chars when the high half is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId {
    high: u64,
    low: u64,
}

impl TraceId {
    /// A fresh 64-bit trace id.
    pub fn generate() -> Self {
        Self {
            high: 0,
            low: non_zero_random(),
        }
    }

    pub fn from_parts(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    /// Parse 16 or 32 lowercase/uppercase hex chars. An all-zero id is invalid.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let id = match hex.len() {
            16 => Self {
                high: 0,
                low: parse_hex(hex)?,
            },
            32 => Self {
                high: parse_hex(&hex[..16])?,
                low: parse_hex(&hex[16..])?,
            },
            _ => return None,
        };
        (id.high != 0 || id.low != 0).then_some(id)
    }

    pub fn high(&self) -> u64 {
        self.high
    }

    pub fn low(&self) -> u64 {
        self.low
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{:016x}", self.low)
        } else {
            write!(f, "{:016x}{:016x}", self.high, self.low)
        }
    }
}

/// 64-bit span identifier, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    pub fn generate() -> Self {
        Self(non_zero_random())
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 {
            return None;
        }
        parse_hex(hex).filter(|v| *v != 0).map(Self)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SpanId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Immutable identity of one span within a trace.
///
/// This is the snapshot handed across the dispatch boundary; it is `Copy` and carries
/// no reference to the span that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_id: Option<SpanId>,
    /// Upstream sampling decision; `None` defers to the local tracer.
    pub sampled: Option<bool>,
}

impl TraceContext {
    /// Start a new trace.
    pub fn new_root() -> Self {
        Self {
            trace_id: TraceId::generate(),
            span_id: SpanId::generate(),
            parent_id: None,
            sampled: None,
        }
    }

    /// A new span in the same trace whose parent is `self`.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::generate(),
            parent_id: Some(self.span_id),
            sampled: self.sampled,
        }
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled != Some(false)
    }
}

fn parse_hex(hex: &str) -> Option<u64> {
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(hex, 16).ok()
}

fn non_zero_random() -> u64 {
    loop {
        let value: u64 = rand::random();
        if value != 0 {
            return value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_hex() {
        let short = TraceId::from_hex("463ac35c9f6413ad").unwrap();
        assert_eq!(short.high(), 0);
        assert_eq!(short.to_string(), "463ac35c9f6413ad");

        let long = TraceId::from_hex("463ac35c9f6413ad48485a3953bb6124").unwrap();
        assert_eq!(long.high(), 0x463ac35c9f6413ad);
        assert_eq!(long.to_string(), "463ac35c9f6413ad48485a3953bb6124");
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(TraceId::from_hex("").is_none());
        assert!(TraceId::from_hex("0000000000000000").is_none());
        assert!(TraceId::from_hex("463ac35c9f6413az").is_none());
        assert!(TraceId::from_hex("+63ac35c9f6413ad").is_none());
        assert!(SpanId::from_hex("abc").is_none());
        assert!(SpanId::from_hex("0000000000000000").is_none());
    }

    #[test]
    fn test_child_shares_trace() {
        let root = TraceContext::new_root();
        let child = root.child();
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_id, Some(root.span_id));
        assert_ne!(child.span_id, root.span_id);
        assert!(child.is_sampled());
    }
}
