//! # Event Buffer Module
//!
//! Bounded queue of per-element state changes for applications that read
//! buffered input instead of polling whole packets.
//!
//! The buffer starts disabled with a capacity of 0. Once enabled, each change
//! is queued with a sequence number and a timestamp. When the queue is full
//! the oldest event is dropped and the buffer reports an overflow until the
//! next non-peeking read.
//!
//! ## Usage
//!
//! ```
//! use vpad_mapper::controller::event_buffer::EventBuffer;
//! use vpad_mapper::controller::types::{AxisKind, ElementIdentifier};
//!
//! let mut buffer = EventBuffer::default();
//! buffer.set_capacity(2)?;
//!
//! for value in [10, 20, 30] {
//!     buffer.push(ElementIdentifier::Axis(AxisKind::X), 0, value);
//! }
//!
//! let data = buffer.read(8, false);
//! assert!(data.overflowed);
//! assert_eq!(data.events.len(), 2);
//! assert_eq!(data.events[0].value, 20);
//! # Ok::<(), vpad_mapper::error::MapperError>(())
//! ```

use std::collections::VecDeque;
use std::time::Instant;

use crate::controller::types::ElementIdentifier;
use crate::error::{MapperError, Result};

/// Largest capacity an application may request.
pub const EVENT_BUFFER_CAPACITY_MAX: u32 = 1024;

/// One buffered state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangeEvent {
    /// Element that changed.
    pub element: ElementIdentifier,
    /// Offset of the element in the data format installed when it changed.
    pub offset: u32,
    /// New value, encoded as in a packet.
    pub value: i32,
    /// Monotonic per-controller sequence number.
    pub sequence: u32,
    /// When the change was recorded.
    pub timestamp: Instant,
}

/// Result of reading the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferedData {
    /// Events in the order they occurred, oldest first.
    pub events: Vec<StateChangeEvent>,
    /// Whether events were dropped since the last non-peeking read.
    pub overflowed: bool,
}

/// Bounded FIFO of state change events.
#[derive(Debug, Default)]
pub struct EventBuffer {
    capacity: usize,
    events: VecDeque<StateChangeEvent>,
    overflowed: bool,
    next_sequence: u32,
}

impl EventBuffer {
    /// Capacity in events; 0 means buffering is disabled.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Whether events are being recorded.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether events were dropped since the last non-peeking read.
    #[must_use]
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Changes the capacity, keeping the newest events that still fit.
    ///
    /// Dropping queued events to shrink the buffer counts as an overflow.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `capacity` exceeds [`EVENT_BUFFER_CAPACITY_MAX`].
    pub fn set_capacity(&mut self, capacity: u32) -> Result<()> {
        if capacity > EVENT_BUFFER_CAPACITY_MAX {
            return Err(MapperError::Validation(format!(
                "event buffer capacity {} exceeds the maximum of {}",
                capacity, EVENT_BUFFER_CAPACITY_MAX
            )));
        }

        self.capacity = capacity as usize;
        if self.events.len() > self.capacity {
            let excess = self.events.len() - self.capacity;
            self.events.drain(..excess);
            self.overflowed = true;
        }
        Ok(())
    }

    /// Queues one change, dropping the oldest event when full.
    ///
    /// Does nothing while buffering is disabled.
    pub fn push(&mut self, element: ElementIdentifier, offset: u32, value: i32) {
        if !self.is_enabled() {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.overflowed = true;
        }

        self.events.push_back(StateChangeEvent {
            element,
            offset,
            value,
            sequence: self.next_sequence,
            timestamp: Instant::now(),
        });
        self.next_sequence = self.next_sequence.wrapping_add(1);
    }

    /// Returns up to `max` of the oldest events.
    ///
    /// With `peek` the events stay queued and the overflow flag is kept.
    /// Otherwise they are removed and the flag is cleared.
    pub fn read(&mut self, max: usize, peek: bool) -> BufferedData {
        let count = max.min(self.events.len());
        let overflowed = self.overflowed;

        let events = if peek {
            self.events.iter().take(count).copied().collect()
        } else {
            self.overflowed = false;
            self.events.drain(..count).collect()
        };

        BufferedData { events, overflowed }
    }

    /// Discards all queued events and the overflow flag.
    pub fn clear(&mut self) {
        self.events.clear();
        self.overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::types::{AxisKind, ButtonIndex};

    fn x_axis() -> ElementIdentifier {
        ElementIdentifier::Axis(AxisKind::X)
    }

    // ==================== Capacity Tests ====================

    #[test]
    fn test_disabled_by_default() {
        let mut buffer = EventBuffer::default();
        assert!(!buffer.is_enabled());
        assert_eq!(buffer.capacity(), 0);

        buffer.push(x_axis(), 0, 100);
        assert!(buffer.is_empty());
        assert!(!buffer.is_overflowed());
    }

    #[test]
    fn test_set_capacity_bounds() {
        let mut buffer = EventBuffer::default();
        assert!(buffer.set_capacity(EVENT_BUFFER_CAPACITY_MAX).is_ok());
        assert!(matches!(
            buffer.set_capacity(EVENT_BUFFER_CAPACITY_MAX + 1),
            Err(MapperError::Validation(_))
        ));
        assert_eq!(buffer.capacity(), EVENT_BUFFER_CAPACITY_MAX);
    }

    #[test]
    fn test_shrinking_keeps_newest_and_flags_overflow() {
        let mut buffer = EventBuffer::default();
        buffer.set_capacity(4).unwrap();
        for value in 0..4 {
            buffer.push(x_axis(), 0, value);
        }

        buffer.set_capacity(2).unwrap();
        assert!(buffer.is_overflowed());

        let data = buffer.read(10, false);
        let values: Vec<i32> = data.events.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![2, 3]);
    }

    #[test]
    fn test_disabling_drops_everything() {
        let mut buffer = EventBuffer::default();
        buffer.set_capacity(2).unwrap();
        buffer.push(x_axis(), 0, 1);

        buffer.set_capacity(0).unwrap();
        assert!(buffer.is_empty());
        assert!(!buffer.is_enabled());
    }

    // ==================== Overflow Tests ====================

    #[test]
    fn test_overflow_drops_oldest() {
        let mut buffer = EventBuffer::default();
        buffer.set_capacity(3).unwrap();
        for value in 0..5 {
            buffer.push(x_axis(), 0, value);
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_overflowed());

        let data = buffer.read(3, false);
        assert!(data.overflowed);
        let sequences: Vec<u32> = data.events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 3, 4]);
        assert!(!buffer.is_overflowed());
    }

    #[test]
    fn test_no_overflow_at_exact_capacity() {
        let mut buffer = EventBuffer::default();
        buffer.set_capacity(2).unwrap();
        buffer.push(x_axis(), 0, 1);
        buffer.push(x_axis(), 0, 2);
        assert!(!buffer.is_overflowed());
    }

    // ==================== Read Tests ====================

    #[test]
    fn test_read_partial() {
        let mut buffer = EventBuffer::default();
        buffer.set_capacity(8).unwrap();
        let button = ElementIdentifier::Button(ButtonIndex::new(1).unwrap());
        buffer.push(x_axis(), 0, 7);
        buffer.push(button, 9, 0x80);
        buffer.push(button, 9, 0);

        let first = buffer.read(2, false);
        assert_eq!(first.events.len(), 2);
        assert_eq!(first.events[1].element, button);
        assert_eq!(first.events[1].offset, 9);
        assert_eq!(buffer.len(), 1);

        let rest = buffer.read(2, false);
        assert_eq!(rest.events.len(), 1);
        assert_eq!(rest.events[0].value, 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_peek_leaves_events_and_overflow() {
        let mut buffer = EventBuffer::default();
        buffer.set_capacity(1).unwrap();
        buffer.push(x_axis(), 0, 1);
        buffer.push(x_axis(), 0, 2);

        let peeked = buffer.read(1, true);
        assert!(peeked.overflowed);
        assert_eq!(peeked.events[0].value, 2);
        assert_eq!(buffer.len(), 1);
        assert!(buffer.is_overflowed());

        let taken = buffer.read(1, false);
        assert_eq!(taken, peeked);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_timestamps_are_ordered() {
        let mut buffer = EventBuffer::default();
        buffer.set_capacity(2).unwrap();
        buffer.push(x_axis(), 0, 1);
        buffer.push(x_axis(), 0, 2);

        let data = buffer.read(2, true);
        assert!(data.events[0].timestamp <= data.events[1].timestamp);
    }

    #[test]
    fn test_clear() {
        let mut buffer = EventBuffer::default();
        buffer.set_capacity(1).unwrap();
        buffer.push(x_axis(), 0, 1);
        buffer.push(x_axis(), 0, 2);

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.is_overflowed());
        assert!(buffer.is_enabled());
    }
}
