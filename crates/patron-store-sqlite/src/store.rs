//! [`SqliteStore`]: the SQLite implementation of [`DonorStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::Value;
use uuid::Uuid;

use patron_core::{
  donation::{Donation, NewDonation},
  donor::{Donor, NewDonor},
  recorder::{self, Ledger as _},
  store::{
    DonationQuery, DonationSort, DonorQuery, DonorSnapshot, DonorSort, DonorStore,
    Page, SNAPSHOT_RECENT_DONATIONS, SortOrder,
  },
};

use crate::{
  Result,
  encode::{
    DONATION_COLUMNS, DONOR_COLUMNS, RawDonation, RawDonor, encode_decimal, encode_dt,
    encode_risk, encode_status, encode_uuid,
  },
  ledger::{SqliteLedger, execute_in_transaction},
  schema::SCHEMA,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Connection tuning for [`SqliteStore::open_with`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// How long a writer waits for another connection's lock before failing.
  pub busy_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self { Self { busy_timeout: Duration::from_secs(5) } }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Patron donor store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Clones share
/// one connection thread, so their calls are serialised; separate stores
/// opened on the same file coordinate through SQLite's locks.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema(options).await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema(StoreOptions::default()).await?;
    Ok(store)
  }

  async fn init_schema(&self, options: StoreOptions) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread, surfacing both connection failures and
  /// the closure's own error through [`crate::Error`].
  async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── Query building ──────────────────────────────────────────────────────────

fn direction(order: SortOrder) -> &'static str {
  match order {
    SortOrder::Asc => "ASC",
    SortOrder::Desc => "DESC",
  }
}

fn donor_sort_column(sort: DonorSort) -> &'static str {
  match sort {
    DonorSort::FirstName => "first_name COLLATE NOCASE",
    DonorSort::LastName => "last_name COLLATE NOCASE",
    DonorSort::TotalAmount => "CAST(total_amount AS REAL)",
    DonorSort::LastGiftDate => "last_gift_date",
    DonorSort::CreatedAt => "created_at",
  }
}

fn donation_sort_column(sort: DonationSort) -> &'static str {
  match sort {
    DonationSort::Date => "date",
    DonationSort::Amount => "CAST(amount AS REAL)",
    DonationSort::CreatedAt => "created_at",
  }
}

/// Escape `LIKE` metacharacters so the term matches literally under
/// `ESCAPE '\\'`.
fn escape_like(term: &str) -> String {
  let mut out = String::with_capacity(term.len());
  for c in term.chars() {
    if matches!(c, '\\' | '%' | '_') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

/// Build the `WHERE` clause and positional parameters for a donor listing.
fn donor_filter(organization_id: Uuid, query: &DonorQuery) -> (String, Vec<Value>) {
  let mut conds = vec!["organization_id = ?".to_owned()];
  let mut params = vec![Value::Text(encode_uuid(organization_id))];

  if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
    let mut columns = vec!["first_name", "last_name"];
    if term.contains('@') {
      columns.push("email");
    }
    let clauses: Vec<_> = columns
      .iter()
      .map(|c| format!("LOWER({c}) LIKE ? ESCAPE '\\'"))
      .collect();
    conds.push(format!("({})", clauses.join(" OR ")));
    params.extend(std::iter::repeat_n(Value::Text(pattern), columns.len()));
  }
  if let Some(status) = query.status {
    conds.push("status = ?".to_owned());
    params.push(Value::Text(encode_status(status).to_owned()));
  }
  if let Some(risk) = query.retention_risk {
    conds.push("retention_risk = ?".to_owned());
    params.push(Value::Text(encode_risk(risk).to_owned()));
  }

  (format!("WHERE {}", conds.join(" AND ")), params)
}

fn page_bounds(page: patron_core::store::PageRequest) -> [Value; 2] {
  [
    Value::Integer(i64::from(page.limit)),
    Value::Integer(i64::try_from(page.offset()).unwrap_or(i64::MAX)),
  ]
}

// ─── DonorStore impl ─────────────────────────────────────────────────────────

impl DonorStore for SqliteStore {
  type Error = crate::Error;

  // ── Donors ────────────────────────────────────────────────────────────────

  async fn add_donor(&self, organization_id: Uuid, input: NewDonor) -> Result<Donor> {
    input.validate()?;

    let now = Utc::now().trunc_subsecs(6);
    let donor = Donor {
      donor_id: Uuid::new_v4(),
      organization_id,
      first_name: input.first_name.trim().to_owned(),
      last_name: input.last_name.trim().to_owned(),
      email: input.email,
      phone: input.phone,
      address: input.address,
      city: input.city,
      state: input.state,
      zip_code: input.zip_code,
      status: input.status,
      total_gifts: 0,
      total_amount: Default::default(),
      first_gift_date: None,
      last_gift_date: None,
      retention_risk: Default::default(),
      created_at: now,
      updated_at: now,
    };

    let row = donor.clone();
    self
      .with_conn(move |conn| {
        conn.execute(
          "INSERT INTO donors (
             donor_id, organization_id, first_name, last_name, email, phone,
             address, city, state, zip_code, status, total_gifts, total_amount,
             retention_risk, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
          rusqlite::params![
            encode_uuid(row.donor_id),
            encode_uuid(row.organization_id),
            row.first_name,
            row.last_name,
            row.email,
            row.phone,
            row.address,
            row.city,
            row.state,
            row.zip_code,
            encode_status(row.status),
            row.total_gifts,
            encode_decimal(row.total_amount),
            encode_risk(row.retention_risk),
            encode_dt(row.created_at),
            encode_dt(row.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(donor_id = %donor.donor_id, %organization_id, "donor created");
    Ok(donor)
  }

  async fn get_donor(&self, organization_id: Uuid, donor_id: Uuid) -> Result<Option<Donor>> {
    self
      .with_conn(move |conn| SqliteLedger::reader(conn).find_donor(organization_id, donor_id))
      .await
  }

  async fn list_donors(&self, organization_id: Uuid, query: &DonorQuery) -> Result<Page<Donor>> {
    let (where_clause, params) = donor_filter(organization_id, query);
    let order = format!(
      "ORDER BY {} {}, rowid ASC",
      donor_sort_column(query.sort_by),
      direction(query.sort_order),
    );
    let request = query.page;

    let (raws, total) = self
      .with_conn(move |conn| {
        let total: u64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM donors {where_clause}"),
          rusqlite::params_from_iter(params.iter()),
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {DONOR_COLUMNS} FROM donors {where_clause} {order} LIMIT ? OFFSET ?"
        ))?;
        let raws = stmt
          .query_map(
            rusqlite::params_from_iter(params.iter().chain(page_bounds(request).iter())),
            RawDonor::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((raws, total))
      })
      .await?;

    let donors = raws.into_iter().map(RawDonor::into_donor).collect::<Result<_>>()?;
    Ok(Page::new(donors, total, request))
  }

  // ── Donations ─────────────────────────────────────────────────────────────

  async fn record_donation(
    &self,
    organization_id: Uuid,
    input: NewDonation,
  ) -> Result<Donation> {
    let donor_id = input.donor_id;
    let now = Utc::now();

    let outcome = self
      .with_conn(move |conn| {
        execute_in_transaction(conn, |ledger| {
          recorder::record(ledger, organization_id, input, now)
        })
      })
      .await;

    match &outcome {
      Ok(donation) => tracing::info!(
        %donor_id,
        donation_id = %donation.donation_id,
        amount = %donation.amount,
        "donation recorded"
      ),
      Err(e) => tracing::warn!(%donor_id, %organization_id, error = %e, "donation not recorded"),
    }
    outcome
  }

  async fn list_donations(
    &self,
    organization_id: Uuid,
    query: &DonationQuery,
  ) -> Result<Page<Donation>> {
    let mut where_clause =
      "WHERE donor_id IN (SELECT donor_id FROM donors WHERE organization_id = ?)".to_owned();
    let mut params = vec![Value::Text(encode_uuid(organization_id))];
    if let Some(donor_id) = query.donor_id {
      where_clause.push_str(" AND donor_id = ?");
      params.push(Value::Text(encode_uuid(donor_id)));
    }
    let order = format!(
      "ORDER BY {} {}, rowid {}",
      donation_sort_column(query.sort_by),
      direction(query.sort_order),
      direction(query.sort_order),
    );
    let request = query.page;

    let (raws, total) = self
      .with_conn(move |conn| {
        let total: u64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM donations {where_clause}"),
          rusqlite::params_from_iter(params.iter()),
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {DONATION_COLUMNS} FROM donations {where_clause} {order} LIMIT ? OFFSET ?"
        ))?;
        let raws = stmt
          .query_map(
            rusqlite::params_from_iter(params.iter().chain(page_bounds(request).iter())),
            RawDonation::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((raws, total))
      })
      .await?;

    let donations = raws.into_iter().map(RawDonation::into_donation).collect::<Result<_>>()?;
    Ok(Page::new(donations, total, request))
  }

  // ── Derived views ─────────────────────────────────────────────────────────

  async fn donor_snapshot(
    &self,
    organization_id: Uuid,
    donor_id: Uuid,
  ) -> Result<Option<DonorSnapshot>> {
    self
      .with_conn(move |conn| {
        let mut ledger = SqliteLedger::reader(conn);
        let Some(donor) = ledger.find_donor(organization_id, donor_id)? else {
          return Ok(None);
        };
        let recent = ledger.recent_donations(donor_id, SNAPSHOT_RECENT_DONATIONS)?;
        Ok(Some(DonorSnapshot::new(&donor, &recent)))
      })
      .await
  }

  async fn refresh_aggregates(
    &self,
    organization_id: Uuid,
    as_of: DateTime<Utc>,
  ) -> Result<usize> {
    let refreshed = self
      .with_conn(move |conn| {
        let donor_ids = SqliteLedger::reader(conn).donor_ids(organization_id)?;
        for donor_id in &donor_ids {
          execute_in_transaction(conn, |ledger| {
            recorder::recompute(ledger, organization_id, *donor_id, as_of)
          })?;
        }
        Ok(donor_ids.len())
      })
      .await?;

    tracing::info!(%organization_id, refreshed, "donor aggregates refreshed");
    Ok(refreshed)
  }
}
