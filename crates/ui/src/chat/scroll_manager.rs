use gpui::{Bounds, Pixels, point};
use gpui_component::VirtualListScrollHandle;

/// Small delta used to ignore floating-point layout jitter.
const MAX_OFFSET_EPSILON: f32 = 0.5;

/// What the message pane looked like at its last render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaneSnapshot {
    pub message_count: usize,
    pub thinking: bool,
}

/// Keeps the conversation pinned to its newest row.
///
/// Any change to the message count or the thinking flag schedules a jump to the
/// bottom. The jump is repeated on later frames until the list height settles,
/// since new rows are only measured after the frame that added them.
pub struct ScrollManager {
    scroll_handle: VirtualListScrollHandle,
    last: PaneSnapshot,
    pending_scroll_to_bottom: bool,
    last_applied_max: Option<Pixels>,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            scroll_handle: VirtualListScrollHandle::new(),
            last: PaneSnapshot::default(),
            pending_scroll_to_bottom: false,
            last_applied_max: None,
        }
    }

    pub fn handle(&self) -> &VirtualListScrollHandle {
        &self.scroll_handle
    }

    /// Records the new pane state; returns true if a scroll was scheduled.
    pub fn observe(&mut self, next: PaneSnapshot) -> bool {
        let changed = needs_scroll(self.last, next);
        self.last = next;
        if changed {
            self.request_scroll_to_bottom();
        }
        changed
    }

    pub fn request_scroll_to_bottom(&mut self) {
        self.pending_scroll_to_bottom = true;
        self.last_applied_max = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending_scroll_to_bottom
    }

    /// Jumps to the tail if a scroll is pending. Returns true while another
    /// frame is needed for the jump to land.
    pub fn apply_pending_scroll(&mut self) -> bool {
        if !self.pending_scroll_to_bottom {
            return false;
        }

        // Offsets grow negative downward; the tail sits at -max_offset.
        let max_offset = self.scroll_handle.max_offset().height;
        let current_x = self.scroll_handle.offset().x;
        let target_y = if max_offset > Pixels::ZERO {
            -max_offset
        } else {
            Pixels::ZERO
        };
        self.scroll_handle.set_offset(point(current_x, target_y));

        let settled = self
            .last_applied_max
            .is_some_and(|previous| !pixels_changed(previous, max_offset));
        self.last_applied_max = Some(max_offset);
        if settled {
            self.pending_scroll_to_bottom = false;
        }
        self.pending_scroll_to_bottom
    }

    pub fn bounds(&self) -> Bounds<Pixels> {
        self.scroll_handle.bounds()
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}

fn needs_scroll(previous: PaneSnapshot, next: PaneSnapshot) -> bool {
    previous.message_count != next.message_count || previous.thinking != next.thinking
}

fn pixels_changed(a: Pixels, b: Pixels) -> bool {
    (f32::from(a) - f32::from(b)).abs() > MAX_OFFSET_EPSILON
}
