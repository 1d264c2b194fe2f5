//! The donation-recording unit of work.
//!
//! [`record`] is written against [`Ledger`], a synchronous view of the record
//! store that a backend hands out for the lifetime of one storage
//! transaction. The backend commits only when [`record`] returns `Ok`; any
//! error must roll the whole transaction back, so a donation is never visible
//! without the recomputed aggregate that accounts for it.

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use crate::{
  Error,
  donation::{Donation, NewDonation},
  donor::Donor,
  retention::{self, DonorAggregate},
};

/// Transactional record-store operations used while recording a donation.
///
/// Every call made through one `Ledger` value must observe the writes made
/// earlier through the same value, and no write from a concurrent ledger may
/// interleave between [`Ledger::donations_for_donor`] and
/// [`Ledger::update_donor_aggregate`].
pub trait Ledger {
  type Error: From<Error>;

  /// Look up a donor, returning `None` if it is absent or belongs to a
  /// different organization.
  fn find_donor(
    &mut self,
    organization_id: Uuid,
    donor_id: Uuid,
  ) -> Result<Option<Donor>, Self::Error>;

  fn find_donation_by_key(
    &mut self,
    donor_id: Uuid,
    key: &str,
  ) -> Result<Option<Donation>, Self::Error>;

  fn insert_donation(&mut self, donation: &Donation) -> Result<(), Self::Error>;

  /// All donations of `donor_id`, in insertion order.
  fn donations_for_donor(
    &mut self,
    donor_id: Uuid,
  ) -> Result<Vec<Donation>, Self::Error>;

  fn update_donor_aggregate(
    &mut self,
    donor_id: Uuid,
    aggregate: &DonorAggregate,
    updated_at: DateTime<Utc>,
  ) -> Result<(), Self::Error>;
}

/// Record `input` for a donor of `organization_id` and resynchronise that
/// donor's aggregate, classifying risk as of `now`.
///
/// Validation and the scoped donor lookup happen before any write. When the
/// input carries an idempotency key that was already used for this donor,
/// the original donation is returned and nothing is written.
pub fn record<L: Ledger>(
  ledger: &mut L,
  organization_id: Uuid,
  input: NewDonation,
  now: DateTime<Utc>,
) -> Result<Donation, L::Error> {
  input.validate()?;

  let donor_id = input.donor_id;
  if ledger.find_donor(organization_id, donor_id)?.is_none() {
    return Err(Error::DonorNotFound(donor_id).into());
  }

  if let Some(key) = input.idempotency_key.as_deref()
    && let Some(existing) = ledger.find_donation_by_key(donor_id, key)?
  {
    return Ok(existing);
  }

  let now = now.trunc_subsecs(6);
  let donation = Donation {
    donation_id:     Uuid::new_v4(),
    donor_id,
    campaign_id:     input.campaign_id,
    amount:          input.amount,
    date:            input.date.trunc_subsecs(6),
    donation_type:   input.donation_type,
    method:          input.method,
    notes:           input.notes,
    idempotency_key: input.idempotency_key,
    created_at:      now,
  };

  ledger.insert_donation(&donation)?;
  sync_aggregate(ledger, donor_id, now)?;

  Ok(donation)
}

/// Recompute a donor's aggregate from its stored history without recording
/// anything. Running it twice over the same history is a no-op.
pub fn recompute<L: Ledger>(
  ledger: &mut L,
  organization_id: Uuid,
  donor_id: Uuid,
  as_of: DateTime<Utc>,
) -> Result<DonorAggregate, L::Error> {
  if ledger.find_donor(organization_id, donor_id)?.is_none() {
    return Err(Error::DonorNotFound(donor_id).into());
  }
  sync_aggregate(ledger, donor_id, as_of.trunc_subsecs(6))
}

fn sync_aggregate<L: Ledger>(
  ledger: &mut L,
  donor_id: Uuid,
  as_of: DateTime<Utc>,
) -> Result<DonorAggregate, L::Error> {
  let history = ledger.donations_for_donor(donor_id)?;
  if retention::checked_total(&history).is_none() {
    return Err(Error::TotalOverflow(donor_id).into());
  }
  let aggregate = retention::compute(&history, as_of);
  ledger.update_donor_aggregate(donor_id, &aggregate, as_of)?;
  Ok(aggregate)
}
