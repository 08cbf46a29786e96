use crate::limits::MAX_AMOUNT;
use crate::model::*;

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentChange {
    /// The booking's dates changed and this is the new total.
    Repriced { new_total: Amount },
    /// The operator recorded a payment status. `paid_amount` only matters for
    /// `HalfPaid`.
    StatusSet {
        status: PaymentStatus,
        paid_amount: Amount,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub payment: Payment,
    /// Owed back to the payer; settled by the refund collaborator.
    pub refund_due: Amount,
}

fn rank(status: PaymentStatus) -> u8 {
    match status {
        PaymentStatus::Unpaid | PaymentStatus::ToBill => 0,
        PaymentStatus::HalfPaid => 1,
        PaymentStatus::Paid => 2,
    }
}

/// Every amount/status mutation goes through here.
pub fn reconcile(current: &Payment, change: PaymentChange) -> Result<Reconciled, EngineError> {
    match change {
        PaymentChange::Repriced { new_total } => reprice(current, new_total),
        PaymentChange::StatusSet { status, paid_amount } => set_status(current, status, paid_amount),
    }
}

fn reprice(current: &Payment, new_total: Amount) -> Result<Reconciled, EngineError> {
    if !(0..=MAX_AMOUNT).contains(&new_total) {
        return Err(EngineError::Validation(format!("total price out of bounds: {new_total}")));
    }
    let paid = current.paid_amount;

    if new_total < paid {
        return Ok(Reconciled {
            payment: Payment {
                status: PaymentStatus::Paid,
                total_price: new_total,
                paid_amount: new_total,
                pending_amount: 0,
            },
            refund_due: paid - new_total,
        });
    }

    // Money already taken covers the new total exactly.
    let status = if new_total == paid && paid > 0 {
        PaymentStatus::Paid
    } else {
        match current.status {
            // A free stay marked paid collected nothing, so nothing is half paid.
            PaymentStatus::Paid if new_total > paid && paid == 0 => PaymentStatus::Unpaid,
            PaymentStatus::Paid if new_total > paid => PaymentStatus::HalfPaid,
            other => other,
        }
    };
    Ok(Reconciled {
        payment: Payment {
            status,
            total_price: new_total,
            paid_amount: paid,
            pending_amount: new_total - paid,
        },
        refund_due: 0,
    })
}

fn set_status(current: &Payment, status: PaymentStatus, paid_amount: Amount) -> Result<Reconciled, EngineError> {
    if rank(status) < rank(current.status) {
        return Err(EngineError::Validation(format!(
            "payment status cannot move back from {} to {}",
            current.status.as_str(),
            status.as_str()
        )));
    }
    let total = current.total_price;
    let paid = match status {
        PaymentStatus::Paid => total,
        PaymentStatus::Unpaid | PaymentStatus::ToBill => 0,
        PaymentStatus::HalfPaid => {
            if paid_amount <= 0 || paid_amount >= total {
                return Err(EngineError::Validation(format!(
                    "half payment must be between 0 and {total} exclusive, got {paid_amount}"
                )));
            }
            if paid_amount < current.paid_amount {
                return Err(EngineError::Validation(format!(
                    "paid amount cannot drop from {} to {paid_amount}",
                    current.paid_amount
                )));
            }
            paid_amount
        }
    };
    Ok(Reconciled {
        payment: Payment {
            status,
            total_price: total,
            paid_amount: paid,
            pending_amount: total - paid,
        },
        refund_due: 0,
    })
}
