//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone as _, Utc};
use patron_core::{
  donation::{DonationType, NewDonation},
  donor::{DonorStatus, NewDonor, RetentionRisk},
  store::{
    DonationQuery, DonationSort, DonorQuery, DonorSort, DonorStore, FailureKind,
    PageRequest, SortOrder, StoreError as _,
  },
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{SqliteStore, StoreOptions};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn dollars(cents: i64) -> Decimal { Decimal::new(cents, 2) }

fn gift(donor_id: Uuid, cents: i64, days_ago: i64) -> NewDonation {
  NewDonation::new(donor_id, dollars(cents), Utc::now() - Duration::days(days_ago))
}

async fn donation_count(s: &SqliteStore, donor_id: Uuid) -> i64 {
  let id = donor_id.hyphenated().to_string();
  s.conn
    .call(move |conn| {
      Ok(conn.query_row(
        "SELECT COUNT(*) FROM donations WHERE donor_id = ?1",
        rusqlite::params![id],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap()
}

// ─── Donors ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_donor() {
  let s = store().await;
  let org = Uuid::new_v4();

  let mut input = NewDonor::new("Mary", "Jackson");
  input.email = Some("mary@example.com".into());
  let donor = s.add_donor(org, input).await.unwrap();
  assert_eq!(donor.retention_risk, RetentionRisk::Unknown);
  assert_eq!(donor.total_gifts, 0);

  let fetched = s.get_donor(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(fetched.donor_id, donor.donor_id);
  assert_eq!(fetched.email.as_deref(), Some("mary@example.com"));
  assert_eq!(fetched.created_at, donor.created_at);
  assert_eq!(fetched.total_amount, Decimal::ZERO);
}

#[tokio::test]
async fn get_donor_is_scoped_to_organization() {
  let s = store().await;
  let donor = s.add_donor(Uuid::new_v4(), NewDonor::new("A", "B")).await.unwrap();
  let other = s.get_donor(Uuid::new_v4(), donor.donor_id).await.unwrap();
  assert!(other.is_none());
}

#[tokio::test]
async fn add_donor_rejects_invalid_input() {
  let s = store().await;
  let err = s.add_donor(Uuid::new_v4(), NewDonor::new("", "B")).await.unwrap_err();
  assert_eq!(err.kind(), FailureKind::Validation);
}

// ─── Recording ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_donation_updates_aggregate() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("Ruth", "Bader")).await.unwrap();

  let first = s.record_donation(org, gift(donor.donor_id, 10_050, 300)).await.unwrap();
  let d = s.get_donor(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(d.total_gifts, 1);
  assert_eq!(d.total_amount, dollars(10_050));
  assert_eq!(d.first_gift_date, Some(first.date));
  assert_eq!(d.last_gift_date, Some(first.date));
  assert_eq!(d.retention_risk, RetentionRisk::High);

  let second = s.record_donation(org, gift(donor.donor_id, 2_525, 10)).await.unwrap();
  let d = s.get_donor(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(d.total_gifts, 2);
  assert_eq!(d.total_amount, dollars(12_575));
  assert_eq!(d.first_gift_date, Some(first.date));
  assert_eq!(d.last_gift_date, Some(second.date));
  assert_eq!(d.retention_risk, RetentionRisk::Low);
}

#[tokio::test]
async fn backdated_donation_does_not_move_last_gift() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("Ida", "Wells")).await.unwrap();

  let recent = s.record_donation(org, gift(donor.donor_id, 100, 5)).await.unwrap();
  let old = s.record_donation(org, gift(donor.donor_id, 100, 900)).await.unwrap();

  let d = s.get_donor(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(d.first_gift_date, Some(old.date));
  assert_eq!(d.last_gift_date, Some(recent.date));
  assert_eq!(d.retention_risk, RetentionRisk::Low);
}

#[tokio::test]
async fn stale_aggregate_is_recomputed_from_history() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("Ada", "Lovelace")).await.unwrap();
  s.record_donation(org, gift(donor.donor_id, 1_000, 1)).await.unwrap();

  // Corrupt the stored aggregate behind the store's back.
  let id = donor.donor_id.hyphenated().to_string();
  s.conn
    .call(move |conn| {
      conn.execute(
        "UPDATE donors SET total_gifts = 99, total_amount = '12345' WHERE donor_id = ?1",
        rusqlite::params![id],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  s.record_donation(org, gift(donor.donor_id, 333, 0)).await.unwrap();
  let d = s.get_donor(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(d.total_gifts, 2);
  assert_eq!(d.total_amount, dollars(1_333));
  assert_eq!(donation_count(&s, donor.donor_id).await, 2);
}

#[tokio::test]
async fn record_for_unknown_donor_is_not_found() {
  let s = store().await;
  let missing = Uuid::new_v4();
  let err = s
    .record_donation(Uuid::new_v4(), gift(missing, 500, 0))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), FailureKind::NotFound);
  assert_eq!(donation_count(&s, missing).await, 0);
}

#[tokio::test]
async fn record_for_other_organization_is_not_found() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("Kate", "Sheppard")).await.unwrap();

  let err = s
    .record_donation(Uuid::new_v4(), gift(donor.donor_id, 500, 0))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), FailureKind::NotFound);
  assert_eq!(donation_count(&s, donor.donor_id).await, 0);

  let d = s.get_donor(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(d.total_gifts, 0);
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("A", "B")).await.unwrap();

  let err = s.record_donation(org, gift(donor.donor_id, 0, 0)).await.unwrap_err();
  assert_eq!(err.kind(), FailureKind::Validation);
  assert_eq!(donation_count(&s, donor.donor_id).await, 0);
}

#[tokio::test]
async fn failed_aggregate_update_rolls_back_donation() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("Rosa", "Parks")).await.unwrap();

  s.conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER reject_aggregate BEFORE UPDATE ON donors
         BEGIN SELECT RAISE(ABORT, 'aggregate update rejected'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let err = s.record_donation(org, gift(donor.donor_id, 500, 0)).await.unwrap_err();
  assert_eq!(err.kind(), FailureKind::Storage);
  assert_eq!(donation_count(&s, donor.donor_id).await, 0);
}

#[tokio::test]
async fn oversized_amount_is_rejected_and_store_keeps_serving() {
  let s = store().await;
  let org = Uuid::new_v4();
  let a = s.add_donor(org, NewDonor::new("Big", "Giver")).await.unwrap();
  let b = s.add_donor(org, NewDonor::new("Small", "Giver")).await.unwrap();

  let err = s
    .record_donation(org, NewDonation::new(a.donor_id, Decimal::MAX, Utc::now()))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), FailureKind::Validation);
  let err = s
    .record_donation(org, NewDonation::new(a.donor_id, Decimal::MAX, Utc::now()))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), FailureKind::Validation);
  assert_eq!(donation_count(&s, a.donor_id).await, 0);

  let max = patron_core::donation::MAX_AMOUNT;
  s.record_donation(org, NewDonation::new(a.donor_id, max, Utc::now())).await.unwrap();
  s.record_donation(org, NewDonation::new(a.donor_id, max, Utc::now())).await.unwrap();
  let d = s.get_donor(org, a.donor_id).await.unwrap().unwrap();
  assert_eq!(d.total_amount, max * Decimal::TWO);

  s.record_donation(org, gift(b.donor_id, 500, 0)).await.unwrap();
  let d = s.get_donor(org, b.donor_id).await.unwrap().unwrap();
  assert_eq!(d.total_amount, dollars(500));
}

#[tokio::test]
async fn out_of_range_gift_year_is_a_validation_error() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("A", "B")).await.unwrap();

  let far_future = Utc.with_ymd_and_hms(10_000, 1, 1, 0, 0, 0).unwrap();
  let err = s
    .record_donation(org, NewDonation::new(donor.donor_id, dollars(100), far_future))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), FailureKind::Validation);
  assert_eq!(donation_count(&s, donor.donor_id).await, 0);
  s.record_donation(org, gift(donor.donor_id, 100, 0)).await.unwrap();
}

#[tokio::test]
async fn idempotency_key_prevents_double_count() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("A", "B")).await.unwrap();

  let mut input = gift(donor.donor_id, 2_000, 3);
  input.idempotency_key = Some("checkout-7781".into());

  let first = s.record_donation(org, input.clone()).await.unwrap();
  let replay = s.record_donation(org, input).await.unwrap();
  assert_eq!(first.donation_id, replay.donation_id);

  let d = s.get_donor(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(d.total_gifts, 1);
  assert_eq!(d.total_amount, dollars(2_000));
}

#[tokio::test]
async fn recorded_donation_roundtrips_all_fields() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("A", "B")).await.unwrap();

  let mut input = gift(donor.donor_id, 123_456, 40);
  input.donation_type = DonationType::InKind;
  input.campaign_id = Some(Uuid::new_v4());
  input.method = Some("Check".into());
  input.notes = Some("Office furniture".into());
  let recorded = s.record_donation(org, input).await.unwrap();

  let page = s
    .list_donations(org, &DonationQuery { donor_id: Some(donor.donor_id), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(page.items, vec![recorded]);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_recorders_on_separate_connections_lose_no_update() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("patron.db");
  let options = StoreOptions { busy_timeout: StdDuration::from_secs(30) };

  let a = SqliteStore::open_with(&path, options).await.unwrap();
  let b = SqliteStore::open_with(&path, options).await.unwrap();

  let org = Uuid::new_v4();
  let donor = a.add_donor(org, NewDonor::new("Frances", "Perkins")).await.unwrap();

  for round in 0..10 {
    let (ra, rb) = tokio::join!(
      a.record_donation(org, gift(donor.donor_id, 100, round)),
      b.record_donation(org, gift(donor.donor_id, 250, round)),
    );
    ra.unwrap();
    rb.unwrap();
  }

  let d = b.get_donor(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(d.total_gifts, 20);
  assert_eq!(d.total_amount, dollars(3_500));
}

#[tokio::test]
async fn concurrent_recorders_sharing_a_store() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("A", "B")).await.unwrap();

  let handles: Vec<_> = (0..25)
    .map(|i| {
      let s = s.clone();
      tokio::spawn(async move { s.record_donation(org, gift(donor.donor_id, 1 + i, i)).await })
    })
    .collect();
  for h in handles {
    h.await.unwrap().unwrap();
  }

  let d = s.get_donor(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(d.total_gifts, 25);
  // 1 + 2 + ... + 25 cents
  assert_eq!(d.total_amount, dollars(325));
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_donors_filters_and_sorts() {
  let s = store().await;
  let org = Uuid::new_v4();

  let zed = s.add_donor(org, NewDonor::new("Zed", "Adams")).await.unwrap();
  let amy = s.add_donor(org, NewDonor::new("amy", "Baker")).await.unwrap();
  let mut lapsed = NewDonor::new("Bob", "Carter");
  lapsed.status = DonorStatus::Lapsed;
  lapsed.email = Some("bob@carter.org".into());
  s.add_donor(org, lapsed).await.unwrap();
  s.add_donor(Uuid::new_v4(), NewDonor::new("Other", "Org")).await.unwrap();

  s.record_donation(org, gift(zed.donor_id, 50_000, 1)).await.unwrap();
  s.record_donation(org, gift(amy.donor_id, 900, 1)).await.unwrap();

  let all = s.list_donors(org, &DonorQuery::default()).await.unwrap();
  assert_eq!(all.total, 3);
  let names: Vec<_> = all.items.iter().map(|d| d.first_name.as_str()).collect();
  assert_eq!(names, ["amy", "Bob", "Zed"]);

  let by_amount = s
    .list_donors(org, &DonorQuery {
      sort_by: DonorSort::TotalAmount,
      sort_order: SortOrder::Desc,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_amount.items[0].donor_id, zed.donor_id);

  let medium = s
    .list_donors(org, &DonorQuery {
      retention_risk: Some(RetentionRisk::Medium),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(medium.total, 2);

  let lapsed = s
    .list_donors(org, &DonorQuery { status: Some(DonorStatus::Lapsed), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(lapsed.items.len(), 1);

  let search = s
    .list_donors(org, &DonorQuery { search: Some("BAK".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(search.items.len(), 1);
  assert_eq!(search.items[0].donor_id, amy.donor_id);

  let by_email = s
    .list_donors(org, &DonorQuery { search: Some("bob@carter".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_email.items.len(), 1);

  for wildcard in ["%", "_", "\\"] {
    let none = s
      .list_donors(org, &DonorQuery { search: Some(wildcard.into()), ..Default::default() })
      .await
      .unwrap();
    assert_eq!(none.total, 0, "search {wildcard:?}");
  }
}

#[tokio::test]
async fn search_matches_metacharacters_literally() {
  let s = store().await;
  let org = Uuid::new_v4();
  let underscored = s.add_donor(org, NewDonor::new("Liam", "O_Neil")).await.unwrap();
  s.add_donor(org, NewDonor::new("Liam", "OxNeil")).await.unwrap();
  let percent = s.add_donor(org, NewDonor::new("100%", "Club")).await.unwrap();

  let page = s
    .list_donors(org, &DonorQuery { search: Some("o_n".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.items[0].donor_id, underscored.donor_id);

  let page = s
    .list_donors(org, &DonorQuery { search: Some("0%".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.items[0].donor_id, percent.donor_id);
}

#[tokio::test]
async fn list_donors_paginates() {
  let s = store().await;
  let org = Uuid::new_v4();
  for i in 0..5 {
    s.add_donor(org, NewDonor::new(format!("Donor{i}"), "X")).await.unwrap();
  }

  let page = s
    .list_donors(org, &DonorQuery { page: PageRequest::new(Some(2), Some(2)), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(page.total, 5);
  assert_eq!(page.total_pages, 3);
  assert_eq!(page.items.len(), 2);
  assert_eq!(page.items[0].first_name, "Donor2");
}

#[tokio::test]
async fn list_donations_is_scoped_and_sorted() {
  let s = store().await;
  let org = Uuid::new_v4();
  let a = s.add_donor(org, NewDonor::new("A", "A")).await.unwrap();
  let b = s.add_donor(org, NewDonor::new("B", "B")).await.unwrap();
  let foreign_org = Uuid::new_v4();
  let foreign = s.add_donor(foreign_org, NewDonor::new("C", "C")).await.unwrap();

  s.record_donation(org, gift(a.donor_id, 100, 30)).await.unwrap();
  let newest = s.record_donation(org, gift(b.donor_id, 700, 1)).await.unwrap();
  s.record_donation(org, gift(a.donor_id, 300, 10)).await.unwrap();
  s.record_donation(foreign_org, gift(foreign.donor_id, 999, 0)).await.unwrap();

  let page = s.list_donations(org, &DonationQuery::default()).await.unwrap();
  assert_eq!(page.total, 3);
  assert_eq!(page.items[0].donation_id, newest.donation_id);

  let for_a = s
    .list_donations(org, &DonationQuery {
      donor_id: Some(a.donor_id),
      sort_by: DonationSort::Amount,
      sort_order: SortOrder::Asc,
      ..Default::default()
    })
    .await
    .unwrap();
  let amounts: Vec<_> = for_a.items.iter().map(|d| d.amount).collect();
  assert_eq!(amounts, [dollars(100), dollars(300)]);

  let cross = s
    .list_donations(org, &DonationQuery { donor_id: Some(foreign.donor_id), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(cross.total, 0);
}

// ─── Snapshot and refresh ────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_carries_recent_gifts_newest_first() {
  let s = store().await;
  let org = Uuid::new_v4();
  let donor = s.add_donor(org, NewDonor::new("A", "B")).await.unwrap();
  for day in 0..12 {
    s.record_donation(org, gift(donor.donor_id, 100 + day, day)).await.unwrap();
  }

  let snap = s.donor_snapshot(org, donor.donor_id).await.unwrap().unwrap();
  assert_eq!(snap.total_gifts, 12);
  assert_eq!(snap.recent_donations.len(), 10);
  assert_eq!(snap.recent_donations[0].amount, dollars(100));
  assert!(snap.recent_donations.windows(2).all(|w| w[0].date >= w[1].date));

  assert!(s.donor_snapshot(Uuid::new_v4(), donor.donor_id).await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_reclassifies_as_time_passes() {
  let s = store().await;
  let org = Uuid::new_v4();
  let one = s.add_donor(org, NewDonor::new("One", "Gift")).await.unwrap();
  let never = s.add_donor(org, NewDonor::new("No", "Gifts")).await.unwrap();
  s.record_donation(org, gift(one.donor_id, 100, 0)).await.unwrap();

  let refreshed = s
    .refresh_aggregates(org, Utc::now() + Duration::days(400))
    .await
    .unwrap();
  assert_eq!(refreshed, 2);

  let d = s.get_donor(org, one.donor_id).await.unwrap().unwrap();
  assert_eq!(d.retention_risk, RetentionRisk::Critical);
  assert_eq!(d.total_gifts, 1);
  let n = s.get_donor(org, never.donor_id).await.unwrap().unwrap();
  assert_eq!(n.retention_risk, RetentionRisk::Unknown);

  assert_eq!(s.refresh_aggregates(Uuid::new_v4(), Utc::now()).await.unwrap(), 0);
}
