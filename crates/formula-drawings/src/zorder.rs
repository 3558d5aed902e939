//! Stacking order. A drawing's position in the collection is its z-order: the last drawing is
//! painted on top.

use crate::drawing::DrawingRef;
use crate::drawings::{name_key, Drawings};
use crate::error::{DrawingError, Result};

impl Drawings {
    /// Move `drawing` to the top of the stack.
    pub fn bring_to_front(&mut self, drawing: DrawingRef) -> Result<()> {
        let index = self.stack_position(drawing)?;
        let last = self.drawings.len() - 1;
        if index == last {
            return Ok(());
        }

        self.tree.move_to_front(index);
        let moved = self.drawings.remove(index);
        self.drawings.push(moved);

        if self.has_duplicate_names {
            self.reindex_names();
            return Ok(());
        }
        // Everything that was above the moved drawing slides down one slot.
        for pos in index..last {
            if let Some(slot) = self.names.get_mut(&name_key(&self.drawings[pos].name)) {
                *slot = pos;
            }
        }
        self.names.insert(name_key(&self.drawings[last].name), last);
        Ok(())
    }

    /// Move `drawing` to the bottom of the stack.
    pub fn send_to_back(&mut self, drawing: DrawingRef) -> Result<()> {
        let index = self.stack_position(drawing)?;
        if index == 0 {
            return Ok(());
        }

        self.tree.move_to_back(index);
        let moved = self.drawings.remove(index);
        self.drawings.insert(0, moved);

        if self.has_duplicate_names {
            self.reindex_names();
            return Ok(());
        }
        for pos in 1..=index {
            if let Some(slot) = self.names.get_mut(&name_key(&self.drawings[pos].name)) {
                *slot = pos;
            }
        }
        self.names.insert(name_key(&self.drawings[0].name), 0);
        Ok(())
    }

    fn stack_position(&self, drawing: DrawingRef) -> Result<usize> {
        self.position_of(drawing)
            .ok_or_else(|| DrawingError::NotFound(format!("drawing {drawing:?}")))
    }
}
