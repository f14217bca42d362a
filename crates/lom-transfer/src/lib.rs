//! lom-transfer
//!
//! Fractional content movements between containers.
//!
//! Pure and deterministic: no IO, no clock, no locks. Callers supply the
//! sequence number and timestamp of each record, and serialize access to a
//! [`SourceAccount`] themselves.

mod fraction;
mod ledger;

pub use fraction::{Fraction, FractionError, PPM_PER_UNIT};
pub use ledger::{
    check_batch, validate_spec, LedgerError, SourceAccount, TransferRecord, TransferSpec,
};
