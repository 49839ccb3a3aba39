//! Fault injection
//!
//! Lets tests make the next N calls of one store operation fail with a chosen
//! error, to exercise propagation of throttling and unavailability.

use ordo_core::StoreError;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Store operations faults can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `get_item`
    GetItem,
    /// `put_item`
    PutItem,
    /// `update_item`
    UpdateItem,
    /// `query`
    Query,
    /// `transact_write`
    TransactWrite,
}

#[derive(Debug)]
struct PendingFault {
    error: StoreError,
    remaining: usize,
}

/// Pending injected faults, per operation
#[derive(Debug, Default)]
pub struct FaultInjector {
    pending: Mutex<FxHashMap<Operation, PendingFault>>,
}

impl FaultInjector {
    /// Make the next `times` calls of `operation` fail with `error`
    ///
    /// Replaces any fault already pending for that operation.
    pub fn inject(&self, operation: Operation, error: StoreError, times: usize) {
        let mut pending = self.pending.lock();
        if times == 0 {
            pending.remove(&operation);
        } else {
            pending.insert(
                operation,
                PendingFault {
                    error,
                    remaining: times,
                },
            );
        }
    }

    /// Consume one pending fault for `operation`, if any
    pub fn check(&self, operation: Operation) -> Result<(), StoreError> {
        let mut pending = self.pending.lock();
        let Some(fault) = pending.get_mut(&operation) else {
            return Ok(());
        };
        let error = fault.error.clone();
        fault.remaining -= 1;
        if fault.remaining == 0 {
            pending.remove(&operation);
        }
        debug!(target: "ordo::store", ?operation, %error, "Injected fault");
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_fires_requested_number_of_times() {
        let faults = FaultInjector::default();
        faults.inject(Operation::Query, StoreError::Throttled("x".into()), 2);

        assert!(faults.check(Operation::Query).is_err());
        assert!(faults.check(Operation::PutItem).is_ok());
        assert!(faults.check(Operation::Query).is_err());
        assert!(faults.check(Operation::Query).is_ok());
    }
}
