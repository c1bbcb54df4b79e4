//! Pushdown translation.
//!
//! Turns the constraints and order-bys a host engine offers into the fixed
//! parameters of a scan. Runs once, before the first fetch.

use tracing::{debug, warn};

use crate::error::{ScanError, ScanResult};
use crate::ports::{OrderDirection, StarOrder, StarOrderField};
use crate::schema::{Column, ConstraintOp, Value};

/// A constraint offered by the host engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Schema position of the constrained column.
    pub column: usize,
    pub op: ConstraintOp,
    pub value: Value,
}

impl Constraint {
    pub fn eq(column: Column, value: Value) -> Self {
        Self {
            column: column.index(),
            op: ConstraintOp::Eq,
            value,
        }
    }
}

/// An order-by term offered by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    /// Schema position of the sort column.
    pub column: usize,
    pub desc: bool,
}

impl OrderBy {
    pub fn new(column: Column, desc: bool) -> Self {
        Self {
            column: column.index(),
            desc,
        }
    }
}

/// Fixed parameters of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    /// Entity key pushed down as `login = ?`.
    pub login: String,
    /// Remote ordering, if one could be pushed down.
    pub order: Option<StarOrder>,
    /// Index (into the offered constraints) of the constraint consumed as
    /// the key. The host may skip re-checking it.
    pub consumed_constraint: Option<usize>,
    /// Whether the remote order satisfies the host's ORDER BY, so the host
    /// can skip its own sort.
    pub order_satisfied: bool,
}

impl ScanPlan {
    /// Plan for a known login and ordering, bypassing host descriptors.
    pub fn new(login: impl Into<String>, order: Option<StarOrder>) -> Self {
        Self {
            login: login.into(),
            order,
            consumed_constraint: None,
            order_satisfied: order.is_some(),
        }
    }
}

/// Translate host constraints and order-bys into a [`ScanPlan`].
///
/// The first `login = <text>` constraint wins. Ordering is pushed down only
/// for a single order-by on `starred_at`; anything else falls back to the
/// remote default order.
pub fn plan_scan(constraints: &[Constraint], order_bys: &[OrderBy]) -> ScanResult<ScanPlan> {
    let (consumed, login) = constraints
        .iter()
        .enumerate()
        .find(|(_, c)| c.column == Column::Login.index() && c.op == ConstraintOp::Eq)
        .map(|(i, c)| match c.value.as_text() {
            Some(login) => Ok((i, login.to_string())),
            None => Err(ScanError::InvalidConstraint {
                column: Column::Login.name(),
                reason: format!("expected text, got {:?}", c.value),
            }),
        })
        .transpose()?
        .ok_or(ScanError::MissingRequiredFilter(Column::Login.name()))?;

    let order = translate_order(order_bys);
    debug!(login = %login, order = ?order, "Scan planned");

    Ok(ScanPlan {
        login,
        order,
        consumed_constraint: Some(consumed),
        order_satisfied: order.is_some(),
    })
}

fn translate_order(order_bys: &[OrderBy]) -> Option<StarOrder> {
    // Only single-column orderings can be pushed down.
    let [order_by] = order_bys else {
        if order_bys.len() > 1 {
            debug!(terms = order_bys.len(), "Multi-column ORDER BY not pushed down");
        }
        return None;
    };

    let column = Column::from_index(order_by.column);
    match column.filter(|c| c.def().order_by.any()) {
        Some(Column::StarredAt) => Some(StarOrder {
            field: StarOrderField::StarredAt,
            direction: OrderDirection::from_desc(order_by.desc),
        }),
        _ => {
            warn!(
                column = ?column.map(Column::name),
                index = order_by.column,
                "ORDER BY column cannot be pushed down, using remote default order"
            );
            None
        }
    }
}
