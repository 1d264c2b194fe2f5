//! [`SqliteLedger`]: the [`Ledger`] implementation over an open SQLite
//! transaction, and the helper that scopes one.

use chrono::{DateTime, Utc};
use patron_core::{
  donation::Donation,
  donor::Donor,
  recorder::Ledger,
  retention::DonorAggregate,
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    DONATION_COLUMNS, DONOR_COLUMNS, RawDonation, RawDonor, decode_uuid,
    encode_decimal, encode_donation_type, encode_dt, encode_risk, encode_uuid,
  },
};

/// Run `operation` inside a `BEGIN IMMEDIATE` transaction.
///
/// The write lock is taken before the first read, so two recorders can never
/// both read the same donation history and then race to write the aggregate.
/// Commits on `Ok`; on `Err` the transaction is dropped, which rolls back.
pub(crate) fn execute_in_transaction<T>(
  conn: &mut Connection,
  operation: impl FnOnce(&mut SqliteLedger<'_>) -> Result<T>,
) -> Result<T> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let output = {
    let mut ledger = SqliteLedger { conn: &tx };
    operation(&mut ledger)?
  };
  tx.commit()?;
  Ok(output)
}

pub(crate) struct SqliteLedger<'a> {
  conn: &'a Connection,
}

impl<'a> SqliteLedger<'a> {
  /// A ledger over a bare connection, for read-only use outside a
  /// transaction.
  pub(crate) fn reader(conn: &'a Connection) -> Self { Self { conn } }

  pub(crate) fn recent_donations(
    &mut self,
    donor_id: Uuid,
    limit: u32,
  ) -> Result<Vec<Donation>> {
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {DONATION_COLUMNS} FROM donations
       WHERE donor_id = ?1
       ORDER BY date DESC, rowid DESC
       LIMIT ?2"
    ))?;
    let raws = stmt
      .query_map(rusqlite::params![encode_uuid(donor_id), limit], RawDonation::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawDonation::into_donation).collect()
  }

  pub(crate) fn donor_ids(&mut self, organization_id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = self.conn.prepare(
      "SELECT donor_id FROM donors WHERE organization_id = ?1 ORDER BY rowid",
    )?;
    let ids = stmt
      .query_map(rusqlite::params![encode_uuid(organization_id)], |r| {
        r.get::<_, String>(0)
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    ids.iter().map(|s| decode_uuid(s)).collect()
  }
}

impl Ledger for SqliteLedger<'_> {
  type Error = crate::Error;

  fn find_donor(&mut self, organization_id: Uuid, donor_id: Uuid) -> Result<Option<Donor>> {
    let raw = self
      .conn
      .query_row(
        &format!(
          "SELECT {DONOR_COLUMNS} FROM donors
           WHERE donor_id = ?1 AND organization_id = ?2"
        ),
        rusqlite::params![encode_uuid(donor_id), encode_uuid(organization_id)],
        RawDonor::from_row,
      )
      .optional()?;
    raw.map(RawDonor::into_donor).transpose()
  }

  fn find_donation_by_key(&mut self, donor_id: Uuid, key: &str) -> Result<Option<Donation>> {
    let raw = self
      .conn
      .query_row(
        &format!(
          "SELECT {DONATION_COLUMNS} FROM donations
           WHERE donor_id = ?1 AND idempotency_key = ?2"
        ),
        rusqlite::params![encode_uuid(donor_id), key],
        RawDonation::from_row,
      )
      .optional()?;
    raw.map(RawDonation::into_donation).transpose()
  }

  fn insert_donation(&mut self, d: &Donation) -> Result<()> {
    self.conn.execute(
      "INSERT INTO donations (
         donation_id, donor_id, campaign_id, amount, date,
         donation_type, method, notes, idempotency_key, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
      rusqlite::params![
        encode_uuid(d.donation_id),
        encode_uuid(d.donor_id),
        d.campaign_id.map(encode_uuid),
        encode_decimal(d.amount),
        encode_dt(d.date),
        encode_donation_type(d.donation_type),
        d.method,
        d.notes,
        d.idempotency_key,
        encode_dt(d.created_at),
      ],
    )?;
    Ok(())
  }

  fn donations_for_donor(&mut self, donor_id: Uuid) -> Result<Vec<Donation>> {
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {DONATION_COLUMNS} FROM donations WHERE donor_id = ?1 ORDER BY rowid"
    ))?;
    let raws = stmt
      .query_map(rusqlite::params![encode_uuid(donor_id)], RawDonation::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawDonation::into_donation).collect()
  }

  fn update_donor_aggregate(
    &mut self,
    donor_id: Uuid,
    aggregate: &DonorAggregate,
    updated_at: DateTime<Utc>,
  ) -> Result<()> {
    self.conn.execute(
      "UPDATE donors SET
         total_gifts     = ?2,
         total_amount    = ?3,
         first_gift_date = ?4,
         last_gift_date  = ?5,
         retention_risk  = ?6,
         updated_at      = ?7
       WHERE donor_id = ?1",
      rusqlite::params![
        encode_uuid(donor_id),
        aggregate.total_gifts,
        encode_decimal(aggregate.total_amount),
        aggregate.first_gift_date.map(encode_dt),
        aggregate.last_gift_date.map(encode_dt),
        encode_risk(aggregate.retention_risk),
        encode_dt(updated_at),
      ],
    )?;
    Ok(())
  }
}
