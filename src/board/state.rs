//! In-memory, column-grouped view of a board's tickets.
//!
//! `BoardState` owns three invariants, re-established by every operation:
//!
//! 1. a ticket id appears in at most one column;
//! 2. positions within a column are exactly `0..n-1` in sequence order;
//! 3. every ticket's status is the status mapped from its column.
//!
//! Operations validate before mutating, so an `Err` always leaves the state
//! as it was.

use super::models::{Ticket, TicketId};
use super::status::{self, ColumnKey};
use crate::errors::StateError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardState {
    columns: [Vec<Ticket>; 3],
}

/// Immutable copy of a `BoardState`, used as a rollback point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot(BoardState);

impl BoardSnapshot {
    pub fn state(&self) -> &BoardState {
        &self.0
    }

    pub fn tickets(&self, column: ColumnKey) -> &[Ticket] {
        self.0.tickets(column)
    }
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition tickets into columns by status. Each column is ordered by
    /// the incoming `position` (ties keep input order) and then renumbered.
    pub fn from_tickets(tickets: impl IntoIterator<Item = Ticket>) -> Result<Self, StateError> {
        let mut state = Self::default();
        for ticket in tickets {
            if state.locate(ticket.id).is_some() {
                return Err(StateError::DuplicateTicket(ticket.id));
            }
            state.columns[ticket.column().index()].push(ticket);
        }
        for column in &mut state.columns {
            column.sort_by_key(|t| t.position);
        }
        for column in ColumnKey::ALL {
            state.renumber(column);
        }
        Ok(state)
    }

    pub fn tickets(&self, column: ColumnKey) -> &[Ticket] {
        &self.columns[column.index()]
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }

    /// Column and index currently holding `id`.
    pub fn locate(&self, id: TicketId) -> Option<(ColumnKey, usize)> {
        ColumnKey::ALL.into_iter().find_map(|column| {
            self.tickets(column)
                .iter()
                .position(|t| t.id == id)
                .map(|index| (column, index))
        })
    }

    pub fn get(&self, id: TicketId) -> Option<&Ticket> {
        self.locate(id)
            .map(|(column, index)| &self.columns[column.index()][index])
    }

    /// Append `ticket` to the end of `column`.
    pub fn insert(&mut self, column: ColumnKey, ticket: Ticket) -> Result<(), StateError> {
        let end = self.tickets(column).len();
        self.insert_at(column, end, ticket)
    }

    /// Insert `ticket` at `index` (clamped to the column length). The
    /// ticket's status is rewritten to match `column`.
    pub fn insert_at(
        &mut self,
        column: ColumnKey,
        index: usize,
        mut ticket: Ticket,
    ) -> Result<(), StateError> {
        if self.locate(ticket.id).is_some() {
            return Err(StateError::DuplicateTicket(ticket.id));
        }
        if u32::try_from(self.tickets(column).len()).is_err() {
            return Err(StateError::ColumnFull(column));
        }
        ticket.status = status::to_status(column);
        let tickets = &mut self.columns[column.index()];
        let index = index.min(tickets.len());
        tickets.insert(index, ticket);
        self.renumber_from(column, index);
        Ok(())
    }

    /// Remove `id` from whichever column holds it.
    pub fn remove(&mut self, id: TicketId) -> Result<(ColumnKey, Ticket), StateError> {
        let (column, index) = self.locate(id).ok_or(StateError::UnknownTicket(id))?;
        let ticket = self.columns[column.index()].remove(index);
        self.renumber_from(column, index);
        Ok((column, ticket))
    }

    /// Move `id` from `from` to the end of `to`. Same-column moves are a no-op
    /// and return `false`.
    pub fn move_ticket(
        &mut self,
        id: TicketId,
        from: ColumnKey,
        to: ColumnKey,
    ) -> Result<bool, StateError> {
        match self.locate(id) {
            None => return Err(StateError::UnknownTicket(id)),
            Some((column, _)) if column != from => {
                return Err(StateError::NotInColumn {
                    ticket: id,
                    column: from,
                });
            }
            Some(_) => {}
        }
        if from == to {
            return Ok(false);
        }
        let (_, ticket) = self.remove(id)?;
        self.insert(to, ticket)?;
        Ok(true)
    }

    pub fn rename(&mut self, id: TicketId, title: &str) -> Result<(), StateError> {
        let ticket = self.get_mut(id).ok_or(StateError::UnknownTicket(id))?;
        ticket.title = title.to_string();
        Ok(())
    }

    /// Swap a ticket's identity in place (placeholder -> server id).
    pub fn replace_id(&mut self, from: TicketId, to: TicketId) -> Result<(), StateError> {
        if from != to && self.locate(to).is_some() {
            return Err(StateError::DuplicateTicket(to));
        }
        let ticket = self.get_mut(from).ok_or(StateError::UnknownTicket(from))?;
        ticket.id = to;
        Ok(())
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot(self.clone())
    }

    pub fn restore(&mut self, snapshot: &BoardSnapshot) {
        *self = snapshot.0.clone();
    }

    /// Put a single ticket back where `snapshot` had it, leaving every other
    /// ticket as it is now. A ticket absent from the snapshot is removed.
    pub fn revert_ticket(&mut self, snapshot: &BoardSnapshot, id: TicketId) {
        if let Some((column, index)) = self.locate(id) {
            self.columns[column.index()].remove(index);
            self.renumber_from(column, index);
        }
        if let Some((column, index)) = snapshot.0.locate(id) {
            let ticket = snapshot.0.columns[column.index()][index].clone();
            let tickets = &mut self.columns[column.index()];
            let index = index.min(tickets.len());
            tickets.insert(index, ticket);
            self.renumber_from(column, index);
        }
    }

    /// Check the three structural invariants.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for column in ColumnKey::ALL {
            for (i, ticket) in self.tickets(column).iter().enumerate() {
                if !seen.insert(ticket.id) {
                    return Err(format!("ticket {} appears more than once", ticket.id));
                }
                if usize::try_from(ticket.position).ok() != Some(i) {
                    return Err(format!(
                        "ticket {} in {} has position {} at index {}",
                        ticket.id, column, ticket.position, i
                    ));
                }
                if ticket.status != status::to_status(column) {
                    return Err(format!(
                        "ticket {} in {} has status {}",
                        ticket.id, column, ticket.status
                    ));
                }
            }
        }
        Ok(())
    }

    fn get_mut(&mut self, id: TicketId) -> Option<&mut Ticket> {
        self.columns
            .iter_mut()
            .flat_map(|c| c.iter_mut())
            .find(|t| t.id == id)
    }

    fn renumber(&mut self, column: ColumnKey) {
        self.renumber_from(column, 0);
    }

    /// `insert_at` keeps every column within `u32` positions.
    fn renumber_from(&mut self, column: ColumnKey, start: usize) {
        for (i, ticket) in self.columns[column.index()]
            .iter_mut()
            .enumerate()
            .skip(start)
        {
            ticket.position = u32::try_from(i).unwrap_or(u32::MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::models::BoardId;
    use crate::board::status::TicketStatus;

    fn ticket(id: i64, column: ColumnKey, title: &str) -> Ticket {
        Ticket::draft(TicketId::Persisted(id), BoardId(1), column, title)
    }

    fn board() -> BoardState {
        let mut state = BoardState::new();
        state.insert(ColumnKey::Backlog, ticket(1, ColumnKey::Backlog, "one")).unwrap();
        state.insert(ColumnKey::Backlog, ticket(2, ColumnKey::Backlog, "two")).unwrap();
        state.insert(ColumnKey::Backlog, ticket(3, ColumnKey::Backlog, "three")).unwrap();
        state.insert(ColumnKey::Active, ticket(4, ColumnKey::Active, "four")).unwrap();
        state
    }

    fn ids(state: &BoardState, column: ColumnKey) -> Vec<i64> {
        state
            .tickets(column)
            .iter()
            .filter_map(|t| t.id.persisted())
            .collect()
    }

    #[test]
    fn test_insert_appends_with_next_position() {
        let state = board();
        assert_eq!(ids(&state, ColumnKey::Backlog), vec![1, 2, 3]);
        assert_eq!(state.tickets(ColumnKey::Backlog)[2].position, 2);
        assert_eq!(state.len(), 4);
        state.validate().unwrap();
    }

    #[test]
    fn test_insert_rewrites_status_to_column() {
        let mut state = BoardState::new();
        state
            .insert(ColumnKey::Complete, ticket(9, ColumnKey::Backlog, "x"))
            .unwrap();
        assert_eq!(state.tickets(ColumnKey::Complete)[0].status, TicketStatus::Done);
    }

    #[test]
    fn test_insert_at_renumbers_tail() {
        let mut state = board();
        state
            .insert_at(ColumnKey::Backlog, 1, ticket(5, ColumnKey::Backlog, "five"))
            .unwrap();
        assert_eq!(ids(&state, ColumnKey::Backlog), vec![1, 5, 2, 3]);
        state.validate().unwrap();
    }

    #[test]
    fn test_insert_at_clamps_index() {
        let mut state = board();
        state
            .insert_at(ColumnKey::Active, 99, ticket(5, ColumnKey::Active, "five"))
            .unwrap();
        assert_eq!(ids(&state, ColumnKey::Active), vec![4, 5]);
        state.validate().unwrap();
    }

    #[test]
    fn test_insert_duplicate_is_rejected() {
        let mut state = board();
        let before = state.clone();
        let err = state
            .insert(ColumnKey::Complete, ticket(2, ColumnKey::Complete, "dup"))
            .unwrap_err();
        assert_eq!(err, StateError::DuplicateTicket(TicketId::Persisted(2)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_remove_keeps_positions_contiguous() {
        let mut state = board();
        let (column, removed) = state.remove(TicketId::Persisted(2)).unwrap();
        assert_eq!(column, ColumnKey::Backlog);
        assert_eq!(removed.title, "two");
        assert_eq!(ids(&state, ColumnKey::Backlog), vec![1, 3]);
        state.validate().unwrap();
    }

    #[test]
    fn test_remove_unknown_ticket() {
        let mut state = board();
        assert_eq!(
            state.remove(TicketId::Persisted(77)).unwrap_err(),
            StateError::UnknownTicket(TicketId::Persisted(77))
        );
    }

    #[test]
    fn test_insert_then_remove_restores_positions() {
        let mut state = board();
        let before = state.clone();
        state
            .insert(ColumnKey::Backlog, ticket(8, ColumnKey::Backlog, "temp"))
            .unwrap();
        state.remove(TicketId::Persisted(8)).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn test_move_appends_to_destination_and_rewrites_status() {
        let mut state = board();
        let moved = state
            .move_ticket(TicketId::Persisted(1), ColumnKey::Backlog, ColumnKey::Active)
            .unwrap();
        assert!(moved);
        assert_eq!(ids(&state, ColumnKey::Backlog), vec![2, 3]);
        assert_eq!(ids(&state, ColumnKey::Active), vec![4, 1]);
        let ticket = state.get(TicketId::Persisted(1)).unwrap();
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.position, 1);
        state.validate().unwrap();
    }

    #[test]
    fn test_move_within_same_column_is_noop() {
        let mut state = board();
        let before = state.clone();
        let moved = state
            .move_ticket(TicketId::Persisted(2), ColumnKey::Backlog, ColumnKey::Backlog)
            .unwrap();
        assert!(!moved);
        assert_eq!(state, before);
    }

    #[test]
    fn test_move_from_wrong_column_is_rejected() {
        let mut state = board();
        let before = state.clone();
        let err = state
            .move_ticket(TicketId::Persisted(4), ColumnKey::Backlog, ColumnKey::Complete)
            .unwrap_err();
        assert!(matches!(err, StateError::NotInColumn { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_rename_keeps_place() {
        let mut state = board();
        state.rename(TicketId::Persisted(2), "renamed").unwrap();
        let ticket = state.get(TicketId::Persisted(2)).unwrap();
        assert_eq!(ticket.title, "renamed");
        assert_eq!(ticket.position, 1);
        assert_eq!(state.locate(TicketId::Persisted(2)), Some((ColumnKey::Backlog, 1)));
    }

    #[test]
    fn test_replace_id() {
        let mut state = board();
        state
            .insert(
                ColumnKey::Backlog,
                Ticket::draft(TicketId::Placeholder(1), BoardId(1), ColumnKey::Backlog, "new"),
            )
            .unwrap();
        state
            .replace_id(TicketId::Placeholder(1), TicketId::Persisted(10))
            .unwrap();
        assert_eq!(state.locate(TicketId::Persisted(10)), Some((ColumnKey::Backlog, 3)));
        assert!(state.locate(TicketId::Placeholder(1)).is_none());

        let err = state
            .replace_id(TicketId::Persisted(10), TicketId::Persisted(1))
            .unwrap_err();
        assert_eq!(err, StateError::DuplicateTicket(TicketId::Persisted(1)));
    }

    #[test]
    fn test_snapshot_and_restore() {
        let mut state = board();
        let snapshot = state.snapshot();
        state
            .move_ticket(TicketId::Persisted(3), ColumnKey::Backlog, ColumnKey::Complete)
            .unwrap();
        state.remove(TicketId::Persisted(4)).unwrap();
        assert_ne!(&state, snapshot.state());
        state.restore(&snapshot);
        assert_eq!(&state, snapshot.state());
    }

    #[test]
    fn test_revert_ticket_only_touches_that_ticket() {
        let mut state = board();
        let snapshot = state.snapshot();
        state
            .move_ticket(TicketId::Persisted(1), ColumnKey::Backlog, ColumnKey::Complete)
            .unwrap();
        // An unrelated change made after the snapshot must survive.
        state.rename(TicketId::Persisted(4), "still here").unwrap();

        state.revert_ticket(&snapshot, TicketId::Persisted(1));
        assert_eq!(ids(&state, ColumnKey::Backlog), vec![1, 2, 3]);
        assert!(state.tickets(ColumnKey::Complete).is_empty());
        assert_eq!(state.get(TicketId::Persisted(4)).unwrap().title, "still here");
        state.validate().unwrap();
    }

    #[test]
    fn test_revert_ticket_removes_ticket_absent_from_snapshot() {
        let mut state = board();
        let snapshot = state.snapshot();
        state
            .insert(
                ColumnKey::Active,
                Ticket::draft(TicketId::Placeholder(1), BoardId(1), ColumnKey::Active, "new"),
            )
            .unwrap();
        state.revert_ticket(&snapshot, TicketId::Placeholder(1));
        assert_eq!(&state, snapshot.state());
    }

    #[test]
    fn test_revert_ticket_reinserts_deleted_ticket() {
        let mut state = board();
        let snapshot = state.snapshot();
        state.remove(TicketId::Persisted(2)).unwrap();
        state.revert_ticket(&snapshot, TicketId::Persisted(2));
        assert_eq!(&state, snapshot.state());
    }

    #[test]
    fn test_from_tickets_partitions_and_orders() {
        let mut a = ticket(1, ColumnKey::Backlog, "a");
        a.position = 5;
        let mut b = ticket(2, ColumnKey::Backlog, "b");
        b.position = 1;
        let mut c = ticket(3, ColumnKey::Complete, "c");
        c.position = 9;
        let state = BoardState::from_tickets(vec![a, b, c]).unwrap();
        assert_eq!(ids(&state, ColumnKey::Backlog), vec![2, 1]);
        assert_eq!(ids(&state, ColumnKey::Complete), vec![3]);
        state.validate().unwrap();
    }

    #[test]
    fn test_from_tickets_rejects_duplicates() {
        let err = BoardState::from_tickets(vec![
            ticket(1, ColumnKey::Backlog, "a"),
            ticket(1, ColumnKey::Active, "b"),
        ])
        .unwrap_err();
        assert_eq!(err, StateError::DuplicateTicket(TicketId::Persisted(1)));
    }

    #[test]
    fn test_validate_reports_broken_positions() {
        let mut state = board();
        state.columns[0][1].position = 7;
        assert!(state.validate().unwrap_err().contains("position 7"));
    }

    #[test]
    fn test_extreme_remote_positions_are_renumbered() {
        let mut a = ticket(1, ColumnKey::Active, "a");
        a.position = u32::MAX;
        let mut b = ticket(2, ColumnKey::Active, "b");
        b.position = u32::MAX - 1;
        let state = BoardState::from_tickets(vec![a, b]).unwrap();
        assert_eq!(ids(&state, ColumnKey::Active), vec![2, 1]);
        let positions: Vec<u32> = state.tickets(ColumnKey::Active).iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1]);
        state.validate().unwrap();
    }

    #[test]
    fn test_validate_reports_position_out_of_range() {
        let mut state = board();
        state.columns[0][0].position = u32::MAX;
        assert!(state.validate().unwrap_err().contains(&u32::MAX.to_string()));
    }
}
