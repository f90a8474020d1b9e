// ABOUTME: Reassembles segmented messages received as UDH or SAR packets
// ABOUTME: Buckets segments by sender, recipient and reference with expiry and a bucket limit

use crate::datatypes::{Address, Tag};
use crate::encoding::{Alphabet, EncodingError, gsm7};
use crate::gsm::{ReferenceWidth, UserDataError, UserDataHeader};
use crate::message::{LogicalMessage, Scheme};
use crate::pdu::ShortMessagePacket;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("message is incomplete: {received} of {total} segments received")]
    IncompleteMessage { received: usize, total: u8 },

    #[error("segment claims {actual} segments but the message has {expected}")]
    TotalMismatch { expected: u8, actual: u8 },

    #[error("segment {sequence} of {total} is out of range")]
    InvalidSegment { sequence: u8, total: u8 },

    #[error("packet carries no reassembly information")]
    NotSegmented,

    #[error("no message is being assembled for this key")]
    UnknownMessage,

    #[error(transparent)]
    Header(#[from] UserDataError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Identifies the message a segment belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReassemblyKey {
    pub source: Address,
    pub destination: Address,
    pub scheme: Scheme,
    pub width: ReferenceWidth,
    pub reference: u16,
}

/// What happened to a delivered packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The packet was a whole message on its own
    Single(LogicalMessage),
    /// Stored, more segments are needed
    Pending {
        key: ReassemblyKey,
        received: usize,
        total: u8,
    },
    /// This segment completed the message; fetch it with [`MessageAssembler::get`]
    Complete(ReassemblyKey),
    /// The sequence number was already stored; the first copy is kept
    Duplicate(ReassemblyKey),
    /// The message was already complete or removed, the segment was dropped
    Stale(ReassemblyKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// How long an incomplete message waits for its remaining segments (default: 300s)
    pub ttl: Duration,

    /// Incomplete messages held at once; the oldest is dropped to make room (default: 1024)
    pub max_buckets: usize,

    /// How long a completed or removed message is remembered (default: 300s)
    ///
    /// Segments for a remembered message are reported as stale instead of
    /// starting a new message.
    pub completed_ttl: Duration,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_buckets: 1024,
            completed_ttl: Duration::from_secs(300),
        }
    }
}

impl AssemblerConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets;
        self
    }

    pub fn with_completed_ttl(mut self, completed_ttl: Duration) -> Self {
        self.completed_ttl = completed_ttl;
        self
    }
}

struct SegmentInfo {
    key: ReassemblyKey,
    total: u8,
    sequence: u8,
    alphabet: Alphabet,
    /// Code units, GSM septets already unpacked
    units: Bytes,
}

enum Received {
    Single(LogicalMessage),
    Segment(SegmentInfo),
}

impl Received {
    fn from_packet(packet: &impl ShortMessagePacket) -> Result<Self, AssemblyError> {
        let alphabet = packet.data_coding().alphabet();
        let user_data = packet.user_data();

        if packet.has_udh() {
            let (header, payload) = UserDataHeader::parse(user_data)?;
            let units = unpack_units(alphabet, payload, gsm7::fill_bits(header.encoded_len()));
            return Ok(match header.concatenation()? {
                Some(info) => Received::Segment(SegmentInfo {
                    key: key(packet, Scheme::Udh, info.width, info.reference),
                    total: info.total,
                    sequence: info.sequence,
                    alphabet,
                    units,
                }),
                None => Received::Single(decode(alphabet, &units)?),
            });
        }

        let units = unpack_units(alphabet, user_data.clone(), 0);
        Ok(match packet_sar(packet) {
            Some((reference, total, sequence)) => Received::Segment(SegmentInfo {
                key: key(packet, Scheme::Sar, ReferenceWidth::Sixteen, reference),
                total,
                sequence,
                alphabet,
                units,
            }),
            None => Received::Single(decode(alphabet, &units)?),
        })
    }
}

fn key(
    packet: &impl ShortMessagePacket,
    scheme: Scheme,
    width: ReferenceWidth,
    reference: u16,
) -> ReassemblyKey {
    ReassemblyKey {
        source: packet.source().clone(),
        destination: packet.destination().clone(),
        scheme,
        width,
        reference,
    }
}

fn packet_sar(packet: &impl ShortMessagePacket) -> Option<(u16, u8, u8)> {
    let tlvs = packet.tlvs();
    let reference = tlvs.get_u16(Tag::SarMsgRefNum).ok()?;
    let total = tlvs.get_u8(Tag::SarTotalSegments).ok()?;
    let sequence = tlvs.get_u8(Tag::SarSegmentSeqnum).ok()?;
    Some((reference, total, sequence))
}

fn unpack_units(alphabet: Alphabet, payload: Bytes, fill: usize) -> Bytes {
    match alphabet {
        Alphabet::Gsm7Bit => Bytes::from(gsm7::unpack(&payload, fill)),
        _ => payload,
    }
}

fn decode(alphabet: Alphabet, units: &[u8]) -> Result<LogicalMessage, AssemblyError> {
    Ok(if alphabet.is_text() {
        LogicalMessage::text(alphabet, alphabet.decode(units)?)
    } else {
        LogicalMessage::binary(Bytes::copy_from_slice(units))
    })
}

struct Bucket {
    alphabet: Alphabet,
    total: u8,
    parts: BTreeMap<u8, Bytes>,
    created: Instant,
    /// Arrival order, breaks ties between equal `created` instants
    order: u64,
    completed: Option<Instant>,
}

impl Bucket {
    fn message(&self) -> Result<LogicalMessage, AssemblyError> {
        let mut units = BytesMut::new();
        for part in self.parts.values() {
            units.extend_from_slice(part);
        }
        decode(self.alphabet, &units)
    }

    fn incomplete(&self) -> AssemblyError {
        AssemblyError::IncompleteMessage {
            received: self.parts.len(),
            total: self.total,
        }
    }
}

#[derive(Default)]
struct State {
    buckets: HashMap<ReassemblyKey, Bucket>,
    /// Keys of completed messages that have been removed or expired
    retired: HashMap<ReassemblyKey, Instant>,
    next_order: u64,
}

/// Collects segments until every one of a message has arrived.
///
/// Shared between receiving tasks by reference; all state sits behind one lock.
///
/// # Example
///
/// ```rust
/// use smpp_concat::message::{Delivery, MessageAssembler};
/// use smpp_concat::datatypes::CommandId;
/// use smpp_concat::pdu::SmPacket;
///
/// let assembler = MessageAssembler::default();
/// let packet = SmPacket::builder(CommandId::DeliverSm)
///     .user_data(&b"hello"[..])?
///     .build();
/// assert!(matches!(assembler.deliver(&packet)?, Delivery::Single(_)));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct MessageAssembler {
    config: AssemblerConfig,
    state: Mutex<State>,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}

impl MessageAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// The key `packet` would be stored under.
    pub fn key_for(&self, packet: &impl ShortMessagePacket) -> Result<ReassemblyKey, AssemblyError> {
        match Received::from_packet(packet)? {
            Received::Segment(segment) => Ok(segment.key),
            Received::Single(_) => Err(AssemblyError::NotSegmented),
        }
    }

    /// Accepts one received packet.
    ///
    /// Packets without reassembly information come straight back as
    /// [`Delivery::Single`]. A segment whose total disagrees with the
    /// segments already held is rejected and leaves the message untouched.
    pub fn deliver(&self, packet: &impl ShortMessagePacket) -> Result<Delivery, AssemblyError> {
        let segment = match Received::from_packet(packet)? {
            Received::Single(message) => return Ok(Delivery::Single(message)),
            Received::Segment(segment) => segment,
        };
        if segment.total == 0 || segment.sequence > segment.total {
            return Err(AssemblyError::InvalidSegment {
                sequence: segment.sequence,
                total: segment.total,
            });
        }

        let now = Instant::now();
        let mut state = self.state.lock();
        self.evict(&mut state, now);

        let key = segment.key;
        if state.retired.contains_key(&key) {
            warn!(
                reference = key.reference,
                sequence = segment.sequence,
                "segment for a finished message dropped"
            );
            return Ok(Delivery::Stale(key));
        }
        if !state.buckets.contains_key(&key) {
            self.make_room(&mut state);
            let order = state.next_order;
            state.next_order += 1;
            state.buckets.insert(
                key.clone(),
                Bucket {
                    alphabet: segment.alphabet,
                    total: segment.total,
                    parts: BTreeMap::new(),
                    created: now,
                    order,
                    completed: None,
                },
            );
        }
        let Some(bucket) = state.buckets.get_mut(&key) else {
            return Err(AssemblyError::UnknownMessage);
        };

        if bucket.total != segment.total {
            warn!(
                reference = key.reference,
                expected = bucket.total,
                actual = segment.total,
                "segment total does not match"
            );
            return Err(AssemblyError::TotalMismatch {
                expected: bucket.total,
                actual: segment.total,
            });
        }
        if let Some(existing) = bucket.parts.get(&segment.sequence) {
            if *existing != segment.units {
                warn!(
                    reference = key.reference,
                    sequence = segment.sequence,
                    "conflicting duplicate segment ignored"
                );
            } else {
                debug!(reference = key.reference, sequence = segment.sequence, "duplicate segment");
            }
            return Ok(Delivery::Duplicate(key));
        }
        if bucket.completed.is_some() {
            warn!(
                reference = key.reference,
                sequence = segment.sequence,
                "segment for a finished message dropped"
            );
            return Ok(Delivery::Stale(key));
        }
        // Sequences run 0..total or 1..=total, never both within one message
        let conflicting = match segment.sequence {
            0 => bucket.parts.contains_key(&bucket.total),
            sequence if sequence == bucket.total => bucket.parts.contains_key(&0),
            _ => false,
        };
        if conflicting {
            warn!(
                reference = key.reference,
                sequence = segment.sequence,
                total = bucket.total,
                "segment numbering does not match the segments held"
            );
            return Err(AssemblyError::InvalidSegment {
                sequence: segment.sequence,
                total: segment.total,
            });
        }

        bucket.parts.insert(segment.sequence, segment.units);
        let received = bucket.parts.len();
        trace!(
            reference = key.reference,
            sequence = segment.sequence,
            received,
            total = bucket.total,
            "segment stored"
        );
        if received == bucket.total as usize {
            bucket.completed = Some(now);
            debug!(reference = key.reference, total = bucket.total, "message complete");
            Ok(Delivery::Complete(key))
        } else {
            Ok(Delivery::Pending {
                key,
                received,
                total: bucket.total,
            })
        }
    }

    pub fn is_complete(&self, key: &ReassemblyKey) -> bool {
        self.state
            .lock()
            .buckets
            .get(key)
            .is_some_and(|bucket| bucket.completed.is_some())
    }

    /// The reassembled message, leaving it in place.
    pub fn get(&self, key: &ReassemblyKey) -> Result<LogicalMessage, AssemblyError> {
        let state = self.state.lock();
        let bucket = state.buckets.get(key).ok_or(AssemblyError::UnknownMessage)?;
        if bucket.completed.is_none() {
            return Err(bucket.incomplete());
        }
        bucket.message()
    }

    /// Takes a completed message out. Later segments for it are reported as stale.
    pub fn remove(&self, key: &ReassemblyKey) -> Result<LogicalMessage, AssemblyError> {
        let mut state = self.state.lock();
        let bucket = state.buckets.get(key).ok_or(AssemblyError::UnknownMessage)?;
        if bucket.completed.is_none() {
            return Err(bucket.incomplete());
        }
        let message = bucket.message()?;
        state.buckets.remove(key);
        state.retired.insert(key.clone(), Instant::now());
        Ok(message)
    }

    /// Drops whatever is held for `key`, complete or not. A new segment
    /// with the same key starts a fresh message.
    pub fn discard(&self, key: &ReassemblyKey) -> bool {
        let mut state = self.state.lock();
        state.retired.remove(key);
        state.buckets.remove(key).is_some()
    }

    /// Drops expired messages now rather than on the next delivery.
    /// Returns how many incomplete messages were dropped.
    pub fn evict_expired(&self) -> usize {
        let mut state = self.state.lock();
        self.evict(&mut state, Instant::now())
    }

    /// Number of messages still waiting for segments
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .buckets
            .values()
            .filter(|bucket| bucket.completed.is_none())
            .count()
    }

    fn evict(&self, state: &mut State, now: Instant) -> usize {
        let completed_ttl = self.config.completed_ttl;
        state
            .retired
            .retain(|_, retired| now.saturating_duration_since(*retired) < completed_ttl);

        let mut expired = 0;
        let mut retired = Vec::new();
        state.buckets.retain(|key, bucket| match bucket.completed {
            Some(completed) => {
                let keep = now.saturating_duration_since(completed) < completed_ttl;
                if !keep {
                    retired.push(key.clone());
                }
                keep
            }
            None => {
                let keep = now.saturating_duration_since(bucket.created) < self.config.ttl;
                if !keep {
                    debug!(
                        reference = key.reference,
                        received = bucket.parts.len(),
                        total = bucket.total,
                        "incomplete message expired"
                    );
                    expired += 1;
                }
                keep
            }
        });
        state.retired.extend(retired.into_iter().map(|key| (key, now)));
        expired
    }

    fn make_room(&self, state: &mut State) {
        loop {
            let incomplete = state
                .buckets
                .iter()
                .filter(|(_, bucket)| bucket.completed.is_none());
            if incomplete.clone().count() < self.config.max_buckets {
                return;
            }
            let Some(oldest) = incomplete
                .min_by_key(|(_, bucket)| bucket.order)
                .map(|(key, _)| key.clone())
            else {
                return;
            };
            warn!(
                reference = oldest.reference,
                "too many incomplete messages, dropping the oldest"
            );
            state.buckets.remove(&oldest);
        }
    }
}
