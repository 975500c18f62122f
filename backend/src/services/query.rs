//! Typed list queries
//!
//! Each listable entity has a filter struct naming the fields it recognises and a
//! sort enum with a fixed column whitelist. Predicates are pushed into a
//! [`QueryBuilder`] that always starts with the plant scope, so no list query can
//! leave it out.

use chrono::NaiveDate;
use serde::Deserialize;
use shared::{
    ApprovalState, ContainerType, Pagination, ProcessStatus, RequisitionStatus, RmBatchStatus,
    SortOrder, StockLevel,
};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppResult;

/// Sort column whitelist for an entity
pub trait SortColumn: Copy {
    fn column(&self) -> &'static str;
}

/// Predicates contributed by a filter, appended after the plant scope
pub trait Filter {
    fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>);
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Sort<S> {
    #[serde(default)]
    pub sort_by: S,
    #[serde(default)]
    pub order: SortOrder,
}

/// `SELECT {columns} FROM {table} WHERE plant_id = $1`
pub fn scoped<'args>(columns: &str, table: &str, plant_id: Uuid) -> QueryBuilder<'args, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM {} WHERE plant_id = ", columns, table));
    qb.push_bind(plant_id);
    qb
}

fn push_search(qb: &mut QueryBuilder<'_, Postgres>, columns: &[&str], search: &Option<String>) {
    let Some(term) = search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return;
    };
    let pattern = format!("%{}%", term.replace('%', "\\%").replace('_', "\\_"));
    qb.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
    }
    qb.push(")");
}

/// Count and fetch one page of a filtered, plant-scoped listing
pub async fn fetch_page<T, F, S>(
    db: &PgPool,
    table: &str,
    plant_id: Uuid,
    filter: &F,
    sort: Sort<S>,
    pagination: &Pagination,
) -> AppResult<(Vec<T>, u64)>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    F: Filter,
    S: SortColumn,
{
    let mut count = scoped("COUNT(*)", table, plant_id);
    filter.push_predicates(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(db).await?;

    let mut select = scoped("*", table, plant_id);
    filter.push_predicates(&mut select);
    push_order_and_page(&mut select, sort, pagination);
    let rows = select.build_query_as::<T>().fetch_all(db).await?;

    Ok((rows, total.max(0) as u64))
}

pub fn push_order_and_page<S: SortColumn>(
    qb: &mut QueryBuilder<'_, Postgres>,
    sort: Sort<S>,
    pagination: &Pagination,
) {
    // Column and direction come from whitelists, never from the request text.
    qb.push(format!(
        " ORDER BY {} {}, id ASC",
        sort.sort_by.column(),
        sort.order.as_sql()
    ));
    qb.push(" LIMIT ").push_bind(pagination.limit());
    qb.push(" OFFSET ").push_bind(pagination.offset());
}

// ============================================================================
// Containers
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerFilter {
    #[serde(rename = "type")]
    pub container_type: Option<ContainerType>,
    pub stock_level: Option<StockLevel>,
    pub approved: Option<bool>,
    pub store_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub search: Option<String>,
}

impl Filter for ContainerFilter {
    fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(container_type) = self.container_type {
            qb.push(" AND container_type = ").push_bind(container_type.as_str());
        }
        if let Some(level) = self.stock_level {
            qb.push(" AND stock_level = ").push_bind(level.as_str());
        }
        if let Some(approved) = self.approved {
            qb.push(" AND approved = ").push_bind(approved);
        }
        if let Some(store_id) = self.store_id {
            qb.push(" AND store_id = ").push_bind(store_id);
        }
        if let Some(product_id) = self.product_id {
            qb.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(location_id) = self.location_id {
            qb.push(" AND location_id = ").push_bind(location_id);
        }
        push_search(qb, &["code", "name"], &self.search);
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerSort {
    Code,
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortColumn for ContainerSort {
    fn column(&self) -> &'static str {
        match self {
            ContainerSort::Code => "code",
            ContainerSort::Name => "name",
            ContainerSort::CreatedAt => "created_at",
            ContainerSort::UpdatedAt => "updated_at",
        }
    }
}

// ============================================================================
// Requisitions
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequisitionFilter {
    pub store_id: Option<Uuid>,
    pub status: Option<RequisitionStatus>,
    pub approved: Option<ApprovalState>,
    pub search: Option<String>,
    /// Restrict to these stores; set by the service, never read from the request
    #[serde(skip)]
    pub store_ids: Option<Vec<Uuid>>,
}

impl Filter for RequisitionFilter {
    fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(store_id) = self.store_id {
            qb.push(" AND store_id = ").push_bind(store_id);
        }
        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(approved) = self.approved {
            qb.push(" AND approved = ").push_bind(approved.as_str());
        }
        if let Some(store_ids) = &self.store_ids {
            qb.push(" AND store_id = ANY(").push_bind(store_ids.clone()).push(")");
        }
        push_search(qb, &["order_no", "department"], &self.search);
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequisitionSort {
    OrderNo,
    IssuedDate,
    #[default]
    CreatedAt,
}

impl SortColumn for RequisitionSort {
    fn column(&self) -> &'static str {
        match self {
            RequisitionSort::OrderNo => "order_no",
            RequisitionSort::IssuedDate => "issued_date",
            RequisitionSort::CreatedAt => "created_at",
        }
    }
}

// ============================================================================
// Batchlabels and stickers
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchlabelFilter {
    pub customer_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub process_status: Option<ProcessStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl Filter for BatchlabelFilter {
    fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(customer_id) = self.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(product_id) = self.product_id {
            qb.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(machine_id) = self.machine_id {
            qb.push(" AND machine_id = ").push_bind(machine_id);
        }
        if let Some(status) = self.process_status {
            qb.push(" AND process_status = ").push_bind(status.as_str());
        }
        if let Some(from) = self.from {
            qb.push(" AND batch_date >= ").push_bind(from);
        }
        if let Some(to) = self.to {
            qb.push(" AND batch_date <= ").push_bind(to);
        }
        push_search(qb, &["batch_no", "po_category"], &self.search);
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchlabelSort {
    BatchNo,
    BatchDate,
    #[default]
    CreatedAt,
}

impl SortColumn for BatchlabelSort {
    fn column(&self) -> &'static str {
        match self {
            BatchlabelSort::BatchNo => "batch_no",
            BatchlabelSort::BatchDate => "batch_date",
            BatchlabelSort::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StickerFilter {
    /// Set from the path on the batchlabel route
    #[serde(skip)]
    pub batchlabel_id: Option<Uuid>,
    pub shift: Option<String>,
    pub is_used: Option<bool>,
}

impl Filter for StickerFilter {
    fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(batchlabel_id) = self.batchlabel_id {
            qb.push(" AND batchlabel_id = ").push_bind(batchlabel_id);
        }
        if let Some(shift) = &self.shift {
            qb.push(" AND shift = ").push_bind(shift.clone());
        }
        if let Some(is_used) = self.is_used {
            qb.push(" AND is_used = ").push_bind(is_used);
        }
    }
}

/// Stickers always list in packet order
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickerSort {
    #[default]
    PacketNo,
}

impl SortColumn for StickerSort {
    fn column(&self) -> &'static str {
        "packet_no"
    }
}

// ============================================================================
// Raw-material batches
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RmBatchFilter {
    pub store_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub status: Option<RmBatchStatus>,
    pub search: Option<String>,
}

impl Filter for RmBatchFilter {
    fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(store_id) = self.store_id {
            qb.push(" AND store_id = ").push_bind(store_id);
        }
        if let Some(product_id) = self.product_id {
            qb.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        push_search(qb, &["batch_number"], &self.search);
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmBatchSort {
    BatchNumber,
    #[default]
    CreatedAt,
}

impl SortColumn for RmBatchSort {
    fn column(&self) -> &'static str {
        match self {
            RmBatchSort::BatchNumber => "batch_number",
            RmBatchSort::CreatedAt => "created_at",
        }
    }
}
