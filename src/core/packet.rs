//! Packets in flight and the status tags reported for them.

use std::fmt;
use std::net::SocketAddr;
use uuid::Uuid;

/// Time-ordered identifier assigned to a packet at receipt (or before send).
///
/// Used for correlation in logs only; it carries no ordering or
/// deduplication guarantee between packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(Uuid);

impl PacketId {
    /// Generate a new identifier from the current time.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PacketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of traffic: identifier, peer address and a payload that codecs
/// rewrite in place.
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: PacketId,
    /// Peer the packet was received from, or is destined to.
    pub addr: SocketAddr,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Wrap raw bytes read off the wire, assigning a fresh identifier.
    pub fn new(addr: SocketAddr, payload: Vec<u8>) -> Self {
        Self {
            id: PacketId::new(),
            addr,
            payload,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Status tag attached to every packet event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketStatus {
    Read,
    RejectedTooLarge,
    RejectedUnreadable,
    RejectedUnidentified,
    RejectedUnassigned,
    Processed,
    ProcessedFailed,
    Sent,
    SendFailed,
}

impl PacketStatus {
    pub const ALL: [PacketStatus; 9] = [
        PacketStatus::Read,
        PacketStatus::RejectedTooLarge,
        PacketStatus::RejectedUnreadable,
        PacketStatus::RejectedUnidentified,
        PacketStatus::RejectedUnassigned,
        PacketStatus::Processed,
        PacketStatus::ProcessedFailed,
        PacketStatus::Sent,
        PacketStatus::SendFailed,
    ];

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PacketStatus::Read => "read",
            PacketStatus::RejectedTooLarge => "rejected-too-large",
            PacketStatus::RejectedUnreadable => "rejected-unreadable",
            PacketStatus::RejectedUnidentified => "rejected-unidentified",
            PacketStatus::RejectedUnassigned => "rejected-unassigned",
            PacketStatus::Processed => "processed",
            PacketStatus::ProcessedFailed => "processed-failed",
            PacketStatus::Sent => "sent",
            PacketStatus::SendFailed => "send-failed",
        }
    }
}

impl fmt::Display for PacketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
