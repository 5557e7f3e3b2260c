use std::collections::{HashMap, HashSet};

use crate::{Operation, OperationId, UserId};

/// Per-user LIFO stacks of operation ids.
///
/// A user without an entry has an empty stack; entries are dropped as soon
/// as they become empty, so "absent" and "empty" are the same state.
#[derive(Debug, Default)]
pub struct UserStacks {
    stacks: HashMap<UserId, Vec<OperationId>>,
}

impl UserStacks {
    pub fn new() -> Self {
        Self {
            stacks: HashMap::new(),
        }
    }

    pub fn push(&mut self, user_id: UserId, operation_id: OperationId) {
        self.stacks.entry(user_id).or_default().push(operation_id);
    }

    pub fn pop(&mut self, user_id: &UserId) -> Option<OperationId> {
        let stack = self.stacks.get_mut(user_id)?;
        let popped = stack.pop();
        if stack.is_empty() {
            self.stacks.remove(user_id);
        }
        popped
    }

    /// Empties `user_id`'s stack, returning what was on it.
    pub fn take(&mut self, user_id: &UserId) -> Vec<OperationId> {
        self.stacks.remove(user_id).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }

    pub fn stack(&self, user_id: &UserId) -> &[OperationId] {
        self.stacks
            .get(user_id)
            .map(|stack| stack.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty_for(&self, user_id: &UserId) -> bool {
        self.stack(user_id).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Every id on any user's stack.
    pub fn ids(&self) -> impl Iterator<Item = &OperationId> + '_ {
        self.stacks.values().flat_map(|stack| stack.iter())
    }
}

/// Authoritative operation log with per-user linear undo/redo.
///
/// Undo only ever reaches the calling user's own most recent operation.
/// Undone operations stay in the log and are filtered out of the active
/// history until redone or cleared.
///
/// `undone` always equals the union of the redo stacks. Undone operations
/// whose redo was invalidated by a newer commit move to `discarded`: they
/// stay hidden but sit on no stack.
#[derive(Debug, Default)]
pub struct SessionStore {
    log: Vec<Operation>,
    positions: HashMap<OperationId, usize>,
    undone: HashSet<OperationId>,
    discarded: HashSet<OperationId>,
    undo_stacks: UserStacks,
    redo_stacks: UserStacks,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `operation` and makes it the owner's next undo target.
    /// Invalidates the owner's redo stack; those operations stay hidden.
    pub fn commit(&mut self, operation: Operation) -> &Operation {
        debug_assert!(
            !self.positions.contains_key(&operation.id),
            "operation {} committed twice",
            operation.id
        );
        let user_id = operation.user_id;
        let operation_id = operation.id;
        let position = self.log.len();

        for discarded in self.redo_stacks.take(&user_id) {
            self.undone.remove(&discarded);
            self.discarded.insert(discarded);
        }
        self.undo_stacks.push(user_id, operation_id);
        self.positions.insert(operation_id, position);
        self.log.push(operation);

        &self.log[position]
    }

    /// Undoes `user_id`'s most recent active operation, if any.
    pub fn undo(&mut self, user_id: &UserId) -> Option<Operation> {
        let operation_id = self.undo_stacks.pop(user_id)?;
        self.undone.insert(operation_id);
        self.redo_stacks.push(*user_id, operation_id);
        self.get(&operation_id).cloned()
    }

    /// Restores `user_id`'s most recently undone operation, if any.
    pub fn redo(&mut self, user_id: &UserId) -> Option<Operation> {
        let operation_id = self.redo_stacks.pop(user_id)?;
        self.undone.remove(&operation_id);
        self.undo_stacks.push(*user_id, operation_id);
        self.get(&operation_id).cloned()
    }

    /// Operations that are neither undone nor discarded, in commit order.
    pub fn active_operations(&self) -> impl Iterator<Item = &Operation> + '_ {
        self.log.iter().filter(move |operation| self.is_active(&operation.id))
    }

    pub fn active_history(&self) -> Vec<Operation> {
        self.active_operations().cloned().collect()
    }

    /// Drops every operation and every user's stacks.
    pub fn clear(&mut self) {
        self.log.clear();
        self.positions.clear();
        self.undone.clear();
        self.discarded.clear();
        self.undo_stacks.clear();
        self.redo_stacks.clear();
    }

    pub fn get(&self, operation_id: &OperationId) -> Option<&Operation> {
        self.positions
            .get(operation_id)
            .and_then(|position| self.log.get(*position))
    }

    pub fn can_undo(&self, user_id: &UserId) -> bool {
        !self.undo_stacks.is_empty_for(user_id)
    }

    pub fn can_redo(&self, user_id: &UserId) -> bool {
        !self.redo_stacks.is_empty_for(user_id)
    }

    pub fn is_undone(&self, operation_id: &OperationId) -> bool {
        self.undone.contains(operation_id)
    }

    /// Undone and no longer redoable.
    pub fn is_discarded(&self, operation_id: &OperationId) -> bool {
        self.discarded.contains(operation_id)
    }

    fn is_active(&self, operation_id: &OperationId) -> bool {
        !self.undone.contains(operation_id) && !self.discarded.contains(operation_id)
    }

    /// Number of operations in the log, undone ones included.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.log.len() - self.undone.len() - self.discarded.len()
    }

    pub fn undone(&self) -> &HashSet<OperationId> {
        &self.undone
    }

    pub fn discarded(&self) -> &HashSet<OperationId> {
        &self.discarded
    }

    pub fn undo_stacks(&self) -> &UserStacks {
        &self.undo_stacks
    }

    pub fn redo_stacks(&self) -> &UserStacks {
        &self.redo_stacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Point, Stroke, Tool};

    fn stroke_by(user_id: UserId) -> Operation {
        Operation::stroke(
            user_id,
            Stroke {
                points: vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
                color: "#000000".into(),
                line_width: 2.0,
                tool: Tool::Brush,
            },
        )
    }

    fn active_ids(store: &SessionStore) -> Vec<OperationId> {
        store.active_operations().map(|op| op.id).collect()
    }

    #[test]
    fn it_treats_absent_user_as_empty_stack() {
        let mut stacks = UserStacks::new();
        let user_id = uuid::Uuid::new_v4();
        assert!(stacks.is_empty_for(&user_id));
        assert_eq!(stacks.pop(&user_id), None);

        let operation_id = uuid::Uuid::new_v4();
        stacks.push(user_id, operation_id);
        assert_eq!(stacks.stack(&user_id), &[operation_id]);
        assert_eq!(stacks.pop(&user_id), Some(operation_id));
        assert!(stacks.is_empty());
    }

    #[test]
    fn it_commits_to_log_and_undo_stack() {
        let mut store = SessionStore::new();
        let user_id = uuid::Uuid::new_v4();
        let operation = stroke_by(user_id);
        let committed = store.commit(operation.clone()).clone();

        assert_eq!(committed, operation);
        assert_eq!(store.len(), 1);
        assert!(store.can_undo(&user_id));
        assert!(!store.can_redo(&user_id));
        assert_eq!(store.active_history(), vec![operation]);
    }

    #[test]
    fn it_undoes_most_recent_own_operation() {
        let mut store = SessionStore::new();
        let user_id = uuid::Uuid::new_v4();
        let first = store.commit(stroke_by(user_id)).id;
        let second = store.commit(stroke_by(user_id)).id;

        let undone = store.undo(&user_id).expect("");
        assert_eq!(undone.id, second);
        assert_eq!(active_ids(&store), vec![first]);
        assert!(store.is_undone(&second));
        // the log keeps undone operations
        assert_eq!(store.len(), 2);
        assert_eq!(store.active_len(), 1);
    }

    #[test]
    fn it_returns_none_on_empty_stacks() {
        let mut store = SessionStore::new();
        let user_id = uuid::Uuid::new_v4();
        assert_eq!(store.undo(&user_id), None);
        assert_eq!(store.redo(&user_id), None);
        assert!(store.is_empty());
        assert!(store.undone().is_empty());
        assert!(store.undo_stacks().is_empty());
        assert!(store.redo_stacks().is_empty());
    }

    #[test]
    fn it_clears_redo_on_new_commit() {
        let mut store = SessionStore::new();
        let user_id = uuid::Uuid::new_v4();
        let first = store.commit(stroke_by(user_id)).id;
        store.undo(&user_id).expect("");
        assert!(store.can_redo(&user_id));

        let second = store.commit(stroke_by(user_id)).id;
        assert!(!store.can_redo(&user_id));
        assert_eq!(store.redo(&user_id), None);
        assert!(!store.is_undone(&first));
        assert!(store.is_discarded(&first));
        assert!(store.undone().is_empty());
        assert_eq!(active_ids(&store), vec![second]);
        assert_eq!(store.active_len(), 1);
    }

    #[test]
    fn it_does_not_clear_other_users_redo_on_commit() {
        let mut store = SessionStore::new();
        let alice = uuid::Uuid::new_v4();
        let bob = uuid::Uuid::new_v4();
        store.commit(stroke_by(alice));
        store.undo(&alice).expect("");

        store.commit(stroke_by(bob));
        assert!(store.can_redo(&alice));
    }

    #[test]
    fn it_clears_everything() {
        let mut store = SessionStore::new();
        let alice = uuid::Uuid::new_v4();
        let bob = uuid::Uuid::new_v4();
        store.commit(stroke_by(alice));
        store.commit(stroke_by(bob));
        store.undo(&bob).expect("");

        store.clear();
        assert!(store.is_empty());
        assert!(store.active_history().is_empty());
        assert!(!store.can_undo(&alice));
        assert!(!store.can_redo(&bob));
        assert!(store.undone().is_empty());
        assert!(store.discarded().is_empty());
    }

    #[test]
    #[should_panic]
    fn should_panic_when_committing_same_operation_twice() {
        let mut store = SessionStore::new();
        let operation = stroke_by(uuid::Uuid::new_v4());
        store.commit(operation.clone());
        store.commit(operation);
    }
}
