use super::snapshot::Snapshot;
use crate::model::PageResult;

/// Linear undo history over full result-set snapshots.
///
/// `snapshots[cursor]` is the live state. Pushing truncates everything after the cursor.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<Snapshot>,
    cursor: usize,
}

impl History {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            snapshots: vec![initial],
            cursor: 0,
        }
    }

    pub fn current(&self) -> &Snapshot {
        &self.snapshots[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Appends a new undo step, dropping any redo branch.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        self.cursor = self.snapshots.len() - 1;
    }

    /// Overwrites the live snapshot without creating an undo step.
    pub fn replace_current(&mut self, snapshot: Snapshot) {
        self.snapshots[self.cursor] = snapshot;
    }

    /// Appends `pages` to every snapshot, so ingested pages survive undo and redo.
    ///
    /// Every extended snapshot must pass `check`. On the first failure the history is left as it
    /// was. Each snapshot gets its own copy of the pages.
    pub fn append_everywhere<E>(
        &mut self,
        pages: &[PageResult],
        check: impl Fn(&[PageResult]) -> Result<(), E>,
    ) -> Result<(), E> {
        let extended = self
            .snapshots
            .iter()
            .map(|snapshot| {
                let mut results = snapshot.to_vec();
                results.extend_from_slice(pages);
                check(&results)?;
                Ok(Snapshot::new(results))
            })
            .collect::<Result<Vec<_>, E>>()?;
        self.snapshots = extended;
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor += 1;
        true
    }
}
