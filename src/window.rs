//! Membership windows of a person at a unit.
//!
//! Store documents use `-1` (or omit the field) for an unknown start or end.
//! Both collapse to [`Bound::Unbounded`]; no literal infinite timestamp is
//! ever compared against a real date.

use serde::Serialize;

use crate::model::{Membership, Person};

pub const UNKNOWN_DATE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Unbounded,
    At(i64),
}

impl Bound {
    pub fn from_epoch(value: Option<i64>) -> Self {
        match value {
            None | Some(UNKNOWN_DATE) => Bound::Unbounded,
            Some(epoch) => Bound::At(epoch),
        }
    }

    pub fn epoch(self) -> Option<i64> {
        match self {
            Bound::Unbounded => None,
            Bound::At(epoch) => Some(epoch),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MembershipWindow {
    pub start: Bound,
    pub end: Bound,
}

impl MembershipWindow {
    pub const UNBOUNDED: MembershipWindow = MembershipWindow {
        start: Bound::Unbounded,
        end: Bound::Unbounded,
    };

    pub fn new(start: Bound, end: Bound) -> Self {
        MembershipWindow { start, end }
    }

    pub fn from_membership(membership: &Membership) -> Self {
        MembershipWindow {
            start: Bound::from_epoch(membership.start_date),
            end: Bound::from_epoch(membership.end_date),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start == Bound::Unbounded && self.end == Bound::Unbounded
    }

    /// Inclusive on both ends. An end before the start contains nothing.
    pub fn contains(&self, date: i64) -> bool {
        let after_start = match self.start {
            Bound::Unbounded => true,
            Bound::At(start) => date >= start,
        };
        let before_end = match self.end {
            Bound::Unbounded => true,
            Bound::At(end) => date <= end,
        };
        after_start && before_end
    }

    /// An undated Work only falls inside a window with no bound at all.
    pub fn admits(&self, date: Option<i64>) -> bool {
        match date {
            Some(date) => self.contains(date),
            None => self.is_unbounded(),
        }
    }
}

/// The person's window at `affiliation_id`, from the first matching
/// membership. `None` means the person has no entry there and the caller
/// must not filter by date at all.
pub fn window(person: &Person, affiliation_id: &str) -> Option<MembershipWindow> {
    person
        .affiliations
        .iter()
        .find(|m| m.id.as_deref() == Some(affiliation_id))
        .map(MembershipWindow::from_membership)
}
