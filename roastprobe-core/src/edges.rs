//! Lock-Free Edge Timestamp Store
//!
//! ## Overview
//!
//! Phase-controlled loads are sensed with three digital inputs:
//!
//! ```text
//! reference (zero-cross)  ─┐_____________┌┐_____________┌┐____
//! trigger_a (heater)      ______┌┐____________┌┐____________┌┐
//! trigger_b (fan)         __________┌┐____________┌┐________
//!                          |<-d_a->|
//!                          |<--d_b--->|
//! ```
//!
//! Each rising edge is reported by an edge callback with the tick at which it
//! happened. The store keeps only the most recent tick per input plus the delay
//! of each trigger measured against the reference that preceded it. It is a
//! set of last-write-wins registers, not a queue: edges that arrive between two
//! sampling cycles overwrite each other, which is fine because the sampling
//! loop only needs the latest delay.
//!
//! ## Concurrency Model
//!
//! Same split as an interrupt-fed queue: the edge context writes, the sampling
//! context reads, and neither blocks.
//!
//! - Every field is an independent atomic. `record()` is a handful of atomic
//!   loads and stores, so it is wait-free and safe to call from a callback
//!   thread or an interrupt handler.
//! - There is deliberately no cross-field atomicity. A read may pair a fresh
//!   reference tick with a trigger delay captured one cycle earlier; at 120
//!   edges per second that imprecision is far below what the power scale can
//!   resolve.
//! - Each field has exactly one writer: the callback for that input.
//!
//! ## Example
//!
//! ```rust
//! use roastprobe_core::edges::{EdgeKind, EdgeTimestampStore};
//! use roastprobe_core::time::{Tick, TickDelta};
//!
//! static EDGES: EdgeTimestampStore = EdgeTimestampStore::new();
//!
//! // Edge callbacks
//! EDGES.record(EdgeKind::Reference, Tick(10_000));
//! EDGES.record(EdgeKind::TriggerA, Tick(11_450));
//!
//! // Sampling loop
//! assert_eq!(EDGES.read(EdgeKind::Reference), Some(Tick(10_000)));
//! assert_eq!(EDGES.trigger_delay(EdgeKind::TriggerA), Some(TickDelta(1450)));
//! assert_eq!(EDGES.trigger_delay(EdgeKind::TriggerB), None);
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::time::{Tick, TickDelta};

/// Which digital input produced an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeKind {
    /// Zero-cross reference, the timing origin of each half-cycle
    Reference,
    /// Heater trigger
    TriggerA,
    /// Fan trigger
    TriggerB,
}

impl EdgeKind {
    /// All inputs, in wiring order
    pub const ALL: [EdgeKind; 3] = [EdgeKind::Reference, EdgeKind::TriggerA, EdgeKind::TriggerB];

    /// Name used in logs
    pub const fn name(&self) -> &'static str {
        match self {
            EdgeKind::Reference => "reference",
            EdgeKind::TriggerA => "trigger_a",
            EdgeKind::TriggerB => "trigger_b",
        }
    }
}

/// One last-write-wins register
struct EdgeSlot {
    tick: AtomicU32,
    recorded: AtomicBool,
}

impl EdgeSlot {
    const fn new() -> Self {
        Self {
            tick: AtomicU32::new(0),
            recorded: AtomicBool::new(false),
        }
    }

    fn store(&self, tick: Tick) {
        self.tick.store(tick.0, Ordering::Relaxed);
        // Publish the tick before the flag so a reader never sees the flag
        // without a value behind it.
        self.recorded.store(true, Ordering::Release);
    }

    fn load(&self) -> Option<Tick> {
        if self.recorded.load(Ordering::Acquire) {
            Some(Tick(self.tick.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    fn clear(&self) {
        self.recorded.store(false, Ordering::Release);
        self.tick.store(0, Ordering::Relaxed);
    }
}

/// Latest reference/trigger ticks shared between edge callbacks and the sampler
pub struct EdgeTimestampStore {
    reference: EdgeSlot,
    trigger_a: EdgeSlot,
    trigger_b: EdgeSlot,
    /// Trigger delays captured at edge time (µs), stored as slots too
    delay_a: EdgeSlot,
    delay_b: EdgeSlot,
    /// Edges seen since start, for diagnostics only
    edge_count: AtomicU32,
}

impl EdgeTimestampStore {
    /// Empty store, usable in `static` context
    pub const fn new() -> Self {
        Self {
            reference: EdgeSlot::new(),
            trigger_a: EdgeSlot::new(),
            trigger_b: EdgeSlot::new(),
            delay_a: EdgeSlot::new(),
            delay_b: EdgeSlot::new(),
            edge_count: AtomicU32::new(0),
        }
    }

    /// Record a rising edge
    ///
    /// For a trigger edge the delay from the most recent reference is captured
    /// now, against the reference that actually preceded this firing. Trigger
    /// edges seen before any reference only update the trigger tick.
    pub fn record(&self, kind: EdgeKind, tick: Tick) {
        match kind {
            EdgeKind::Reference => self.reference.store(tick),
            EdgeKind::TriggerA => {
                self.trigger_a.store(tick);
                if let Some(reference) = self.reference.load() {
                    self.delay_a.store(Tick(tick.since(reference).0));
                }
            }
            EdgeKind::TriggerB => {
                self.trigger_b.store(tick);
                if let Some(reference) = self.reference.load() {
                    self.delay_b.store(Tick(tick.since(reference).0));
                }
            }
        }
        self.edge_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Last tick recorded for `kind`, or `None` if that input never fired
    pub fn read(&self, kind: EdgeKind) -> Option<Tick> {
        self.slot(kind).load()
    }

    /// Trigger delay captured at edge time
    ///
    /// Always `None` for [`EdgeKind::Reference`].
    pub fn trigger_delay(&self, kind: EdgeKind) -> Option<TickDelta> {
        let slot = match kind {
            EdgeKind::Reference => return None,
            EdgeKind::TriggerA => &self.delay_a,
            EdgeKind::TriggerB => &self.delay_b,
        };
        slot.load().map(|t| TickDelta(t.0))
    }

    /// Total edges recorded since start or the last reset (wrapping)
    pub fn edge_count(&self) -> u32 {
        self.edge_count.load(Ordering::Relaxed)
    }

    /// Forget everything, as if no edge had ever been seen
    pub fn reset(&self) {
        for slot in [&self.reference, &self.trigger_a, &self.trigger_b, &self.delay_a, &self.delay_b] {
            slot.clear();
        }
        self.edge_count.store(0, Ordering::Relaxed);
    }

    fn slot(&self, kind: EdgeKind) -> &EdgeSlot {
        match kind {
            EdgeKind::Reference => &self.reference,
            EdgeKind::TriggerA => &self.trigger_a,
            EdgeKind::TriggerB => &self.trigger_b,
        }
    }
}

impl Default for EdgeTimestampStore {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EdgeTimestampStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EdgeTimestampStore")
            .field("reference", &self.read(EdgeKind::Reference))
            .field("trigger_a", &self.read(EdgeKind::TriggerA))
            .field("trigger_b", &self.read(EdgeKind::TriggerB))
            .field("delay_a", &self.trigger_delay(EdgeKind::TriggerA))
            .field("delay_b", &self.trigger_delay(EdgeKind::TriggerB))
            .finish()
    }
}
