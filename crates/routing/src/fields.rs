//! Splitting interlaced compositions into their two fields

use contracts::{ConstFrame, DrawFrame, FieldMode, FrameTransform, FrameVisitor};

/// Progress of a field pair extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    NoPendingField,
    FirstFieldSeen,
    PairReady,
}

struct FieldExtractor {
    first_field: FieldMode,
    /// Field modes of the nodes currently being visited
    stack: Vec<FieldMode>,
    fields: Vec<DrawFrame>,
    state: FieldState,
}

impl FieldExtractor {
    fn new(first_field: FieldMode) -> Self {
        Self {
            first_field,
            stack: Vec::new(),
            fields: Vec::with_capacity(2),
            state: FieldState::NoPendingField,
        }
    }

    /// The outermost interlaced mode wins
    fn visiting_mode(&self) -> FieldMode {
        self.stack
            .iter()
            .copied()
            .find(|mode| mode.is_interlaced())
            .unwrap_or(FieldMode::Progressive)
    }
}

impl FrameVisitor for FieldExtractor {
    fn push(&mut self, transform: &FrameTransform) {
        self.stack.push(transform.field_mode);
    }

    fn visit(&mut self, frame: &ConstFrame) {
        let mode = self.visiting_mode();
        match self.state {
            FieldState::NoPendingField if mode == self.first_field => {
                self.fields.push(DrawFrame::from(frame.clone()));
                self.state = FieldState::FirstFieldSeen;
            }
            FieldState::FirstFieldSeen if mode.is_interlaced() && mode != self.first_field => {
                self.fields.push(DrawFrame::from(frame.clone()));
                self.state = FieldState::PairReady;
            }
            _ => {}
        }
    }

    fn pop(&mut self) {
        self.stack.pop();
    }
}

/// Frames to emit for one composition on a channel with `field_mode`
///
/// Returns the two fields, first field first, when the composition holds a
/// complete pair, otherwise the composition itself.
pub fn extract_fields(frame: DrawFrame, field_mode: FieldMode) -> Vec<DrawFrame> {
    if !field_mode.is_interlaced() {
        return vec![frame];
    }

    let mut extractor = FieldExtractor::new(field_mode);
    frame.accept(&mut extractor);

    if extractor.state == FieldState::PairReady {
        extractor.fields
    } else {
        vec![frame]
    }
}
