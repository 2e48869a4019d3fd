//! Board DragDrop Utilities
//!
//! Framework-agnostic drag-and-drop state for board lists and cards.
//! Uses movement threshold to distinguish click from drag.

use serde::{Deserialize, Serialize};

/// What kind of thing is being dragged
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    /// A card, dropped into a list
    Card,
    /// A list, dropped onto the board
    List,
}

/// A slot inside a droppable container (container id, index)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragLocation {
    pub container_id: String,
    pub index: usize,
}

impl DragLocation {
    pub fn new(container_id: impl Into<String>, index: usize) -> Self {
        Self {
            container_id: container_id.into(),
            index,
        }
    }
}

/// Finished drag gesture, handed to the reorder protocol
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragResult {
    pub draggable_id: String,
    pub kind: DragKind,
    pub source: DragLocation,
    /// None when released outside every droppable container
    pub destination: Option<DragLocation>,
}

impl DragResult {
    /// Dropped nowhere, or dropped back into the slot it came from
    pub fn is_noop(&self) -> bool {
        match &self.destination {
            None => true,
            Some(dest) => *dest == self.source,
        }
    }
}

/// Movement threshold in pixels to start dragging
pub const DRAG_THRESHOLD_PX: i32 = 5;

#[derive(Clone, Debug)]
struct Pending {
    draggable_id: String,
    kind: DragKind,
    source: DragLocation,
    start_x: i32,
    start_y: i32,
}

/// DnD state for one board canvas
#[derive(Debug, Default)]
pub struct DragTracker {
    /// Pressed but not yet dragging
    pending: Option<Pending>,
    dragging: bool,
    drop_target: Option<DragLocation>,
    drag_just_ended: bool,
}

impl DragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer pressed on a draggable.
    /// Records pending drag with start position; only the primary button arms it.
    pub fn press(
        &mut self,
        button: i16,
        draggable_id: impl Into<String>,
        kind: DragKind,
        source: DragLocation,
        x: i32,
        y: i32,
    ) {
        if button != 0 {
            return;
        }
        self.pending = Some(Pending {
            draggable_id: draggable_id.into(),
            kind,
            source,
            start_x: x,
            start_y: y,
        });
        self.dragging = false;
        self.drop_target = None;
        self.drag_just_ended = false;
    }

    /// Pointer moved. Returns true when this movement started the drag.
    pub fn pointer_move(&mut self, x: i32, y: i32) -> bool {
        if self.dragging {
            return false;
        }
        let Some(pending) = &self.pending else {
            return false;
        };
        let dx = (x - pending.start_x).abs();
        let dy = (y - pending.start_y).abs();
        if dx > DRAG_THRESHOLD_PX || dy > DRAG_THRESHOLD_PX {
            self.dragging = true;
            return true;
        }
        false
    }

    /// Pointer entered a drop slot. Slots of another kind are ignored.
    pub fn enter_slot(&mut self, kind: DragKind, slot: DragLocation) {
        if !self.dragging {
            return;
        }
        if let Some(pending) = &self.pending {
            if pending.kind == kind {
                self.drop_target = Some(slot);
            }
        }
    }

    /// Pointer left the current drop slot
    pub fn leave_slot(&mut self) {
        if self.dragging {
            self.drop_target = None;
        }
    }

    /// Pointer released. Yields a result only if a drag was actually in progress;
    /// a plain click returns None.
    pub fn release(&mut self) -> Option<DragResult> {
        let pending = self.pending.take();
        let was_dragging = std::mem::replace(&mut self.dragging, false);
        let destination = self.drop_target.take();

        match pending {
            Some(p) if was_dragging => {
                self.drag_just_ended = true;
                Some(DragResult {
                    draggable_id: p.draggable_id,
                    kind: p.kind,
                    source: p.source,
                    destination,
                })
            }
            _ => None,
        }
    }

    /// Abort any pending or active drag without producing a result
    pub fn cancel(&mut self) {
        self.pending = None;
        self.dragging = false;
        self.drop_target = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn dragging_id(&self) -> Option<&str> {
        if self.dragging {
            self.pending.as_ref().map(|p| p.draggable_id.as_str())
        } else {
            None
        }
    }

    pub fn drop_target(&self) -> Option<&DragLocation> {
        self.drop_target.as_ref()
    }

    /// True once right after a drag ends, so the trailing click can be swallowed
    pub fn take_drag_just_ended(&mut self) -> bool {
        std::mem::take(&mut self.drag_just_ended)
    }
}

/// Remove the element at `from` and reinsert it at `to`.
/// `to` is an index into the sequence *without* the moved element and is clamped.
pub fn reinsert<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() {
        return;
    }
    let moved = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, moved);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press_card(tracker: &mut DragTracker) {
        tracker.press(0, "card-1", DragKind::Card, DragLocation::new("list-a", 0), 100, 100);
    }

    #[test]
    fn test_click_without_movement_yields_nothing() {
        let mut tracker = DragTracker::new();
        press_card(&mut tracker);
        assert!(!tracker.pointer_move(103, 102));
        assert!(!tracker.is_dragging());
        assert!(tracker.release().is_none());
        assert!(!tracker.take_drag_just_ended());
    }

    #[test]
    fn test_drag_past_threshold_produces_result() {
        let mut tracker = DragTracker::new();
        press_card(&mut tracker);
        assert!(tracker.pointer_move(100, 110));
        assert_eq!(tracker.dragging_id(), Some("card-1"));

        tracker.enter_slot(DragKind::Card, DragLocation::new("list-b", 2));
        let result = tracker.release().expect("drag result");
        assert_eq!(result.draggable_id, "card-1");
        assert_eq!(result.source, DragLocation::new("list-a", 0));
        assert_eq!(result.destination, Some(DragLocation::new("list-b", 2)));
        assert!(!result.is_noop());

        assert!(tracker.take_drag_just_ended());
        assert!(!tracker.take_drag_just_ended());
    }

    #[test]
    fn test_secondary_button_does_not_arm() {
        let mut tracker = DragTracker::new();
        tracker.press(2, "card-1", DragKind::Card, DragLocation::new("list-a", 0), 0, 0);
        assert!(!tracker.pointer_move(50, 50));
        assert!(tracker.release().is_none());
    }

    #[test]
    fn test_slot_of_other_kind_is_ignored() {
        let mut tracker = DragTracker::new();
        press_card(&mut tracker);
        tracker.pointer_move(200, 100);
        tracker.enter_slot(DragKind::List, DragLocation::new("board", 1));
        assert!(tracker.drop_target().is_none());
    }

    #[test]
    fn test_release_outside_is_noop() {
        let mut tracker = DragTracker::new();
        press_card(&mut tracker);
        tracker.pointer_move(200, 100);
        tracker.enter_slot(DragKind::Card, DragLocation::new("list-b", 0));
        tracker.leave_slot();
        let result = tracker.release().expect("drag result");
        assert!(result.destination.is_none());
        assert!(result.is_noop());
    }

    #[test]
    fn test_same_slot_is_noop() {
        let result = DragResult {
            draggable_id: "l1".into(),
            kind: DragKind::List,
            source: DragLocation::new("board", 1),
            destination: Some(DragLocation::new("board", 1)),
        };
        assert!(result.is_noop());
    }

    #[test]
    fn test_reinsert() {
        let mut ids = vec!["a", "b", "c"];
        reinsert(&mut ids, 0, 2);
        assert_eq!(ids, vec!["b", "c", "a"]);

        let mut ids = vec!["a", "b", "c"];
        reinsert(&mut ids, 2, 0);
        assert_eq!(ids, vec!["c", "a", "b"]);

        let mut ids = vec!["a", "b"];
        reinsert(&mut ids, 0, 10);
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_drag_kind_serialization() {
        assert_eq!(serde_json::to_string(&DragKind::Card).unwrap(), "\"card\"");
        let kind: DragKind = serde_json::from_str("\"list\"").unwrap();
        assert_eq!(kind, DragKind::List);
    }
}
