use crate::ad_config::AdBreakConfig;
use crate::slot::InsertionPoint;
use tracing::{debug, warn};

/// Location of a registered break: slot plus position in that slot's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BreakRef {
    pub slot: InsertionPoint,
    pub index: usize,
}

/// Controller-owned runtime fields of a registered break.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakRuntime {
    pub currently_displayed: bool,
}

/// A registered break: immutable configuration plus runtime state.
#[derive(Debug, Clone)]
pub struct AdBreak {
    pub config: AdBreakConfig,
    pub runtime: BreakRuntime,
}

#[derive(Debug, Default)]
struct SlotEntries {
    breaks: Vec<AdBreak>,
    cursor: usize,
}

/// Per-slot ordered break lists with a "next pending" cursor each.
///
/// Breaks are never removed; registration order is consumption order.
#[derive(Debug, Default)]
pub struct TimelineRegistry {
    slots: [SlotEntries; 5],
}

impl TimelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a break to `slot`.
    pub fn register(&mut self, slot: InsertionPoint, config: AdBreakConfig) {
        let entries = &mut self.slots[slot.index()];
        entries.breaks.push(AdBreak {
            config,
            runtime: BreakRuntime::default(),
        });
        debug!(slot = %slot, count = entries.breaks.len(), "Registered ad break");
    }

    /// Register by slot name. Unknown names are ignored; returns whether it was stored.
    pub fn register_named(&mut self, slot: &str, config: AdBreakConfig) -> bool {
        match InsertionPoint::from_str_loose(slot) {
            Some(slot) => {
                self.register(slot, config);
                true
            }
            None => {
                warn!(slot, "Ignoring ad break for unknown insertion point");
                false
            }
        }
    }

    /// All breaks registered for `slot`, in registration order.
    pub fn list_for(&self, slot: InsertionPoint) -> &[AdBreak] {
        &self.slots[slot.index()].breaks
    }

    /// Like [`list_for`](Self::list_for) but by name; unknown names yield an empty list.
    pub fn list_for_named(&self, slot: &str) -> &[AdBreak] {
        match InsertionPoint::from_str_loose(slot) {
            Some(slot) => self.list_for(slot),
            None => &[],
        }
    }

    pub fn cursor(&self, slot: InsertionPoint) -> usize {
        self.slots[slot.index()].cursor
    }

    /// Move past the current break. Advancing beyond the end is allowed;
    /// lookups then find nothing to show.
    pub fn advance_cursor(&mut self, slot: InsertionPoint) {
        let entries = &mut self.slots[slot.index()];
        entries.cursor += 1;
        debug!(slot = %slot, cursor = entries.cursor, "Advanced cursor");
    }

    /// The break under the cursor, if any.
    pub fn current_ref(&self, slot: InsertionPoint) -> Option<BreakRef> {
        let entries = &self.slots[slot.index()];
        (entries.cursor < entries.breaks.len()).then_some(BreakRef {
            slot,
            index: entries.cursor,
        })
    }

    /// Whether `slot` still has a break at or after its cursor.
    pub fn has_pending(&self, slot: InsertionPoint) -> bool {
        self.current_ref(slot).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.breaks.is_empty())
    }

    pub fn get(&self, at: BreakRef) -> Option<&AdBreak> {
        self.slots[at.slot.index()].breaks.get(at.index)
    }

    pub fn get_mut(&mut self, at: BreakRef) -> Option<&mut AdBreak> {
        self.slots[at.slot.index()].breaks.get_mut(at.index)
    }

    /// Every break currently flagged as displayed, across all slots.
    pub fn displayed(&self) -> Vec<BreakRef> {
        InsertionPoint::ALL
            .iter()
            .flat_map(|&slot| {
                self.list_for(slot)
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| b.runtime.currently_displayed)
                    .map(move |(index, _)| BreakRef { slot, index })
            })
            .collect()
    }
}
