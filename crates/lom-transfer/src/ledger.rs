//! Append-only per-source transfer history.
//!
//! # Purpose
//! Each source container owns one [`SourceAccount`]: the ordered list of
//! every transfer that ever drew material out of it. The account is the only
//! write surface, and it enforces conservation on every append:
//!
//! - a transfer moves a fraction in `(0, 1]` (guaranteed by [`Fraction`]);
//! - source and target differ, aliquot type is non-empty;
//! - `withdrawn + fraction <= 1` for the source.
//!
//! # Derived, never stored
//! `withdrawn` and `remaining` are recomputed from the entries on every call.
//! There is no cached balance that could disagree with the history.
//!
//! # Batches
//! [`check_batch`] validates a whole list of transfers against the current
//! withdrawn totals (accumulating within the batch) without touching any
//! account. Callers lock every involved account, run `check_batch`, and only
//! then append; a failing batch therefore writes nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::fraction::Fraction;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Prior withdrawals plus the requested fraction exceed one whole.
    InsufficientSource {
        source: String,
        withdrawn: Fraction,
        requested: Fraction,
    },
    /// A container cannot transfer into itself.
    SelfTransfer { resource: String },
    /// `aliquot_type` was blank.
    EmptyAliquotType { source: String, target: String },
    /// The transfer was offered to another source's account.
    WrongAccount { account: String, source: String },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientSource {
                source,
                withdrawn,
                requested,
            } => write!(
                f,
                "insufficient source {source}: {withdrawn} already withdrawn, {requested} requested"
            ),
            Self::SelfTransfer { resource } => {
                write!(f, "resource {resource} cannot transfer into itself")
            }
            Self::EmptyAliquotType { source, target } => {
                write!(f, "transfer {source} -> {target}: aliquot_type must not be empty")
            }
            Self::WrongAccount { account, source } => write!(
                f,
                "transfer from {source} offered to the account of {account}"
            ),
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// Transfer specs and records
// ---------------------------------------------------------------------------

/// A requested movement, before it is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSpec {
    pub source: String,
    pub target: String,
    pub fraction: Fraction,
    pub aliquot_type: String,
}

impl TransferSpec {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        fraction: Fraction,
        aliquot_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            fraction,
            aliquot_type: aliquot_type.into(),
        }
    }
}

/// An immutable history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    /// Global recording order, assigned by the caller.
    pub seq: u64,
    pub source: String,
    pub target: String,
    #[serde(serialize_with = "fraction_as_f64")]
    pub fraction: Fraction,
    pub aliquot_type: String,
    pub recorded_at: DateTime<Utc>,
}

fn fraction_as_f64<S: serde::Serializer>(f: &Fraction, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(f.to_f64())
}

/// Shape checks that do not depend on history.
pub fn validate_spec(spec: &TransferSpec) -> Result<(), LedgerError> {
    if spec.source == spec.target {
        return Err(LedgerError::SelfTransfer {
            resource: spec.source.clone(),
        });
    }
    if spec.aliquot_type.trim().is_empty() {
        return Err(LedgerError::EmptyAliquotType {
            source: spec.source.clone(),
            target: spec.target.clone(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SourceAccount
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAccount {
    source: String,
    entries: Vec<TransferRecord>,
}

impl SourceAccount {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            entries: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Outgoing transfers, oldest first.
    pub fn entries(&self) -> &[TransferRecord] {
        &self.entries
    }

    /// Sum of every recorded outgoing fraction.
    pub fn withdrawn(&self) -> Fraction {
        let ppm: u32 = self.entries.iter().map(|e| e.fraction.ppm()).sum();
        // append() keeps the sum within one whole.
        Fraction::from_ppm(ppm).unwrap_or(Fraction::ONE)
    }

    pub fn remaining(&self) -> Fraction {
        self.withdrawn().complement()
    }

    /// Outgoing transfers that landed in `target`.
    pub fn sent_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a TransferRecord> {
        self.entries.iter().filter(move |e| e.target == target)
    }

    /// Record one transfer, enforcing conservation against this account.
    pub fn append(
        &mut self,
        spec: TransferSpec,
        seq: u64,
        recorded_at: DateTime<Utc>,
    ) -> Result<&TransferRecord, LedgerError> {
        if spec.source != self.source {
            return Err(LedgerError::WrongAccount {
                account: self.source.clone(),
                source: spec.source,
            });
        }
        validate_spec(&spec)?;

        let withdrawn = self.withdrawn();
        if withdrawn.checked_add(spec.fraction).is_none() {
            return Err(LedgerError::InsufficientSource {
                source: spec.source,
                withdrawn,
                requested: spec.fraction,
            });
        }

        self.entries.push(TransferRecord {
            seq,
            source: spec.source,
            target: spec.target,
            fraction: spec.fraction,
            aliquot_type: spec.aliquot_type,
            recorded_at,
        });
        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }
}

// ---------------------------------------------------------------------------
// Batch validation
// ---------------------------------------------------------------------------

/// Validate `specs` as one unit.
///
/// `withdrawn_of` reports the already-recorded withdrawal of a source.
/// Fractions accumulate across the batch, so two `0.6` transfers from the
/// same fresh source fail even though each alone would fit.
///
/// Returns the projected withdrawn total per source after the batch.
pub fn check_batch<F>(
    specs: &[TransferSpec],
    mut withdrawn_of: F,
) -> Result<BTreeMap<String, Fraction>, LedgerError>
where
    F: FnMut(&str) -> Fraction,
{
    let mut running: BTreeMap<String, Fraction> = BTreeMap::new();

    for spec in specs {
        validate_spec(spec)?;

        let withdrawn = match running.get(&spec.source) {
            Some(w) => *w,
            None => withdrawn_of(&spec.source),
        };
        let total = withdrawn.checked_add(spec.fraction).ok_or_else(|| {
            LedgerError::InsufficientSource {
                source: spec.source.clone(),
                withdrawn,
                requested: spec.fraction,
            }
        })?;
        running.insert(spec.source.clone(), total);
    }

    Ok(running)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn frac(v: f64) -> Fraction {
        Fraction::from_f64(v).unwrap()
    }

    #[test]
    fn fresh_account_has_everything_remaining() {
        let acct = SourceAccount::new("A");
        assert_eq!(acct.withdrawn(), Fraction::ZERO);
        assert_eq!(acct.remaining(), Fraction::ONE);
    }

    #[test]
    fn append_accumulates_withdrawn() {
        let mut acct = SourceAccount::new("A");
        acct.append(TransferSpec::new("A", "B", frac(0.25), "NA"), 1, ts())
            .unwrap();
        acct.append(TransferSpec::new("A", "C", frac(0.5), "DNA"), 2, ts())
            .unwrap();
        assert_eq!(acct.withdrawn(), frac(0.75));
        assert_eq!(acct.remaining(), frac(0.25));
        assert_eq!(acct.entries().len(), 2);
    }

    #[test]
    fn append_past_one_is_rejected_and_history_untouched() {
        let mut acct = SourceAccount::new("A");
        acct.append(TransferSpec::new("A", "B", frac(0.7), "NA"), 1, ts())
            .unwrap();
        let err = acct
            .append(TransferSpec::new("A", "C", frac(0.4), "NA"), 2, ts())
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientSource {
                source: "A".into(),
                withdrawn: frac(0.7),
                requested: frac(0.4),
            }
        );
        assert_eq!(acct.entries().len(), 1);
    }

    #[test]
    fn half_then_just_over_half_never_reaches_the_account() {
        let mut acct = SourceAccount::new("A");
        acct.append(TransferSpec::new("A", "B", frac(0.5), "NA"), 1, ts())
            .unwrap();

        assert!(Fraction::from_f64(0.500_000_4).is_err());

        let one_ppm_over = frac(0.500_001);
        let err = acct
            .append(TransferSpec::new("A", "C", one_ppm_over, "NA"), 2, ts())
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientSource {
                source: "A".into(),
                withdrawn: frac(0.5),
                requested: one_ppm_over,
            }
        );
        assert_eq!(acct.withdrawn(), frac(0.5));
    }

    #[test]
    fn single_ppm_fills_the_last_gap() {
        let mut acct = SourceAccount::new("A");
        acct.append(TransferSpec::new("A", "B", frac(0.999_999), "NA"), 1, ts())
            .unwrap();
        acct.append(TransferSpec::new("A", "C", frac(1e-6), "NA"), 2, ts())
            .unwrap();
        assert_eq!(acct.remaining(), Fraction::ZERO);
    }

    #[test]
    fn self_transfer_rejected() {
        let mut acct = SourceAccount::new("A");
        let err = acct
            .append(TransferSpec::new("A", "A", frac(0.1), "NA"), 1, ts())
            .unwrap_err();
        assert_eq!(err, LedgerError::SelfTransfer { resource: "A".into() });
    }

    #[test]
    fn blank_aliquot_type_rejected() {
        let spec = TransferSpec::new("A", "B", frac(0.1), " ");
        assert!(matches!(
            validate_spec(&spec),
            Err(LedgerError::EmptyAliquotType { .. })
        ));
    }

    #[test]
    fn wrong_account_rejected() {
        let mut acct = SourceAccount::new("A");
        let err = acct
            .append(TransferSpec::new("X", "B", frac(0.1), "NA"), 1, ts())
            .unwrap_err();
        assert!(matches!(err, LedgerError::WrongAccount { .. }));
    }

    #[test]
    fn batch_accumulates_within_itself() {
        let specs = vec![
            TransferSpec::new("A", "B", frac(0.6), "NA"),
            TransferSpec::new("A", "C", frac(0.6), "NA"),
        ];
        let err = check_batch(&specs, |_| Fraction::ZERO).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientSource { ref source, .. } if source == "A"
        ));
    }

    #[test]
    fn batch_sees_prior_history() {
        let specs = vec![TransferSpec::new("C", "D", frac(1.0), "NA")];
        let projected = check_batch(&specs, |_| Fraction::ZERO).unwrap();
        assert_eq!(projected.get("C"), Some(&Fraction::ONE));

        let err = check_batch(&specs, |_| frac(0.01)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientSource { .. }));
    }

    #[test]
    fn sent_to_filters_by_target() {
        let mut acct = SourceAccount::new("A");
        acct.append(TransferSpec::new("A", "B", frac(0.5), "NA"), 1, ts())
            .unwrap();
        acct.append(TransferSpec::new("A", "C", frac(0.5), "DNA"), 2, ts())
            .unwrap();
        let to_c: Vec<_> = acct.sent_to("C").map(|r| r.seq).collect();
        assert_eq!(to_c, vec![2]);
    }

    #[test]
    fn record_serializes_fraction_as_number() {
        let mut acct = SourceAccount::new("A");
        let rec = acct
            .append(TransferSpec::new("A", "B", frac(0.5), "NA"), 7, ts())
            .unwrap();
        let v = serde_json::to_value(rec).unwrap();
        assert_eq!(v["fraction"], serde_json::json!(0.5));
        assert_eq!(v["seq"], 7);
    }
}
