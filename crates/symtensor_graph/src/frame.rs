use crate::variable::VarId;
use std::{fmt, sync::Arc};

/// Name of the outermost execution frame.
pub const MAIN_FRAME: &str = "main";

/// A frame name plus iteration number, chained to the frame it was entered from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameIter {
    pub frame: Arc<str>,
    pub iteration: usize,
    pub parent: Option<Arc<FrameIter>>,
}

impl FrameIter {
    pub fn main() -> Self {
        Self {
            frame: Arc::from(MAIN_FRAME),
            iteration: 0,
            parent: None,
        }
    }

    /// First iteration of a child frame entered from `self`.
    pub fn enter(&self, frame: &str) -> Self {
        Self {
            frame: Arc::from(frame),
            iteration: 0,
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn exit(&self) -> Option<Self> {
        self.parent.as_deref().cloned()
    }

    pub fn next_iteration(&self) -> Self {
        Self {
            frame: Arc::clone(&self.frame),
            iteration: self.iteration + 1,
            parent: self.parent.clone(),
        }
    }

    pub fn is_main(&self) -> bool {
        self.parent.is_none()
    }

    /// Key shared by every iteration of this frame, used for loop-invariant values.
    pub fn frame_key(&self) -> (Arc<str>, Option<Arc<FrameIter>>) {
        (Arc::clone(&self.frame), self.parent.clone())
    }
}

impl fmt::Display for FrameIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{}/", parent)?;
        }
        write!(f, "{}:{}", self.frame, self.iteration)
    }
}

/// Session cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarKey {
    pub var: VarId,
    pub frame_iter: FrameIter,
}

impl VarKey {
    pub fn new(var: VarId, frame_iter: FrameIter) -> Self {
        Self { var, frame_iter }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_navigation() {
        let main = FrameIter::main();
        let inner = main.enter("while");
        let next = inner.next_iteration();

        assert_eq!(next.iteration, 1);
        assert_eq!(next.frame_key(), inner.frame_key());
        assert_eq!(next.exit(), Some(main.clone()));
        assert!(main.exit().is_none());
        assert_eq!(next.to_string(), "main:0/while:1");
    }
}
