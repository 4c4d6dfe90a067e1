//! Transition tables for lifecycle status enums.

use thiserror::Error;

/// A status change the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal status change {from} -> {to}")]
pub struct IllegalTransition {
    pub from: &'static str,
    pub to: &'static str,
}

/// A status enum whose legal moves are a fixed list of `(from, to)` edges.
///
/// ```ignore
/// impl StateMachine for InvoiceStatus {
///     const TRANSITIONS: &'static [(Self, Self)] = &[(Draft, Paid), (Draft, Unpaid), (Unpaid, Paid)];
///
///     fn label(&self) -> &'static str {
///         self.as_str()
///     }
/// }
///
/// invoice.status = invoice.status.transition_to(InvoiceStatus::Paid)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + 'static {
    const TRANSITIONS: &'static [(Self, Self)];

    /// Stored name of the status, used in error messages.
    fn label(&self) -> &'static str;

    fn can_transition_to(&self, target: &Self) -> bool {
        Self::TRANSITIONS
            .iter()
            .any(|(from, to)| from == self && to == target)
    }

    fn valid_transitions(&self) -> impl Iterator<Item = Self> + '_ {
        Self::TRANSITIONS
            .iter()
            .filter(move |(from, _)| from == self)
            .map(|(_, to)| *to)
    }

    fn transition_to(&self, target: Self) -> Result<Self, IllegalTransition> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(IllegalTransition {
                from: self.label(),
                to: target.label(),
            })
        }
    }

    /// No outgoing edges.
    fn is_terminal(&self) -> bool {
        self.valid_transitions().next().is_none()
    }
}
