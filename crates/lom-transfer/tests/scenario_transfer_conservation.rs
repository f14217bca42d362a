//! Scenario: conservation of source content across transfers
//!
//! # Invariant under test
//! For a source S with prior withdrawn fraction F, a transfer of fraction f
//! succeeds iff F + f <= 1.0, and the withdrawn total is always the sum of
//! the recorded history. Replays the reference extraction: A splits 0.5/0.5
//! into B and C, then C moves its whole content into D.
//!
//! All tests are pure in-process; no network required.

use chrono::{DateTime, Utc};
use lom_transfer::{check_batch, Fraction, LedgerError, SourceAccount, TransferSpec};

fn ts() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn frac(v: f64) -> Fraction {
    Fraction::from_f64(v).unwrap()
}

/// Validate then append, the way a caller holding the account lock does.
fn commit(
    account: &mut SourceAccount,
    specs: Vec<TransferSpec>,
    seq: &mut u64,
) -> Result<(), LedgerError> {
    let withdrawn = account.withdrawn();
    check_batch(&specs, |_| withdrawn)?;
    for spec in specs {
        *seq += 1;
        account.append(spec, *seq, ts())?;
    }
    Ok(())
}

#[test]
fn extraction_split_then_full_transfer() {
    let mut seq = 0;
    let mut a = SourceAccount::new("A");
    let mut c = SourceAccount::new("C");

    commit(
        &mut a,
        vec![
            TransferSpec::new("A", "B", frac(0.5), "NA"),
            TransferSpec::new("A", "C", frac(0.5), "DNA"),
        ],
        &mut seq,
    )
    .unwrap();
    assert_eq!(a.withdrawn(), Fraction::ONE);
    assert_eq!(a.remaining(), Fraction::ZERO);

    // C received material but has never been a source: nothing withdrawn.
    assert_eq!(c.withdrawn(), Fraction::ZERO);
    commit(&mut c, vec![TransferSpec::new("C", "D", frac(1.0), "NA")], &mut seq).unwrap();
    assert_eq!(c.withdrawn(), Fraction::ONE);

    let seqs: Vec<u64> = a.entries().iter().chain(c.entries()).map(|r| r.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[test]
fn depleted_source_refuses_any_further_fraction() {
    let mut seq = 0;
    let mut a = SourceAccount::new("A");
    commit(&mut a, vec![TransferSpec::new("A", "B", frac(1.0), "NA")], &mut seq).unwrap();

    let err = commit(&mut a, vec![TransferSpec::new("A", "C", frac(0.000_001), "NA")], &mut seq)
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientSource {
            source: "A".into(),
            withdrawn: Fraction::ONE,
            requested: frac(0.000_001),
        }
    );
    assert_eq!(a.entries().len(), 1);
}

#[test]
fn failing_batch_records_nothing() {
    let mut seq = 0;
    let mut a = SourceAccount::new("A");
    commit(&mut a, vec![TransferSpec::new("A", "B", frac(0.3), "NA")], &mut seq).unwrap();

    let err = commit(
        &mut a,
        vec![
            TransferSpec::new("A", "C", frac(0.4), "NA"),
            TransferSpec::new("A", "D", frac(0.4), "NA"),
        ],
        &mut seq,
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientSource { .. }));
    assert_eq!(a.entries().len(), 1);
    assert_eq!(a.withdrawn(), frac(0.3));
}

#[test]
fn withdrawn_matches_sum_of_history() {
    let mut seq = 0;
    let mut a = SourceAccount::new("A");
    for (target, f) in [("B", 0.125), ("C", 0.25), ("D", 0.5)] {
        commit(&mut a, vec![TransferSpec::new("A", target, frac(f), "NA")], &mut seq).unwrap();
    }
    let summed: u32 = a.entries().iter().map(|r| r.fraction.ppm()).sum();
    assert_eq!(a.withdrawn().ppm(), summed);
    assert_eq!(a.remaining(), frac(0.125));
}
