//! DrawFrame - composition tree handed between producers and the mixer

use crate::{ConstFrame, FieldMode, FrameTag};

/// Per-node transform relevant to routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTransform {
    /// Field this node is drawn into (progressive = both)
    pub field_mode: FieldMode,
    /// Audio should not be repeated when the frame is
    pub is_still: bool,
}

/// Walks a composition tree
///
/// `push` is called with a node's transform before its content is visited
/// and `pop` after.
pub trait FrameVisitor {
    fn push(&mut self, transform: &FrameTransform);
    fn visit(&mut self, frame: &ConstFrame);
    fn pop(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Content {
    #[default]
    Empty,
    Frame(ConstFrame),
    Group(Vec<DrawFrame>),
}

/// A node of the composition tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrawFrame {
    content: Content,
    transform: FrameTransform,
}

impl DrawFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Group several frames under one node
    pub fn group(frames: Vec<DrawFrame>) -> Self {
        Self {
            content: Content::Group(frames),
            transform: FrameTransform::default(),
        }
    }

    /// Wrap a frame in a single-child group
    pub fn push(frame: DrawFrame) -> Self {
        Self::group(vec![frame])
    }

    /// Draw `top` over `bottom`
    pub fn over(bottom: DrawFrame, top: DrawFrame) -> Self {
        if !bottom.is_real() && !top.is_real() {
            return Self::empty();
        }
        Self::group(vec![bottom, top])
    }

    /// Combine two frames into one interlaced frame with `mode` field first
    pub fn interlace(first: DrawFrame, mut second: DrawFrame, mode: FieldMode) -> Self {
        if !first.is_real() && !second.is_real() {
            return Self::empty();
        }
        if first == second || mode == FieldMode::Progressive {
            return second;
        }
        let mut first = first;
        first.transform.field_mode = mode;
        second.transform.field_mode = mode.opposite();
        Self::group(vec![first, second])
    }

    /// Mark a frame as a still so its audio is not replayed
    pub fn still(mut frame: DrawFrame) -> Self {
        frame.transform.is_still = true;
        frame
    }

    /// Anything other than the empty placeholder
    pub fn is_real(&self) -> bool {
        !matches!(self.content, Content::Empty)
    }

    pub fn transform(&self) -> &FrameTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut FrameTransform {
        &mut self.transform
    }

    pub fn accept(&self, visitor: &mut dyn FrameVisitor) {
        visitor.push(&self.transform);
        match &self.content {
            Content::Empty => {}
            Content::Frame(frame) => visitor.visit(frame),
            Content::Group(children) => {
                for child in children {
                    child.accept(visitor);
                }
            }
        }
        visitor.pop();
    }

    /// Copy of the tree with every leaf frame carrying `tag`
    pub fn with_tag(&self, tag: FrameTag) -> Self {
        let content = match &self.content {
            Content::Empty => Content::Empty,
            Content::Frame(frame) => Content::Frame(frame.with_tag(tag)),
            Content::Group(children) => {
                Content::Group(children.iter().map(|c| c.with_tag(tag)).collect())
            }
        };
        Self {
            content,
            transform: self.transform,
        }
    }

    /// Leaf frames in visiting order
    pub fn frames(&self) -> Vec<ConstFrame> {
        struct Collect(Vec<ConstFrame>);

        impl FrameVisitor for Collect {
            fn push(&mut self, _: &FrameTransform) {}
            fn visit(&mut self, frame: &ConstFrame) {
                self.0.push(frame.clone());
            }
            fn pop(&mut self) {}
        }

        let mut collect = Collect(Vec::new());
        self.accept(&mut collect);
        collect.0
    }
}

impl From<ConstFrame> for DrawFrame {
    fn from(frame: ConstFrame) -> Self {
        if frame.is_empty() {
            return Self::empty();
        }
        Self {
            content: Content::Frame(frame),
            transform: FrameTransform::default(),
        }
    }
}
