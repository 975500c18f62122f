//! Raw-material batch ledger
//!
//! The cached `quantity` on `rm_batches` only ever moves together with an appended
//! row in `rm_batch_transactions`, inside the same database transaction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    ledger_balance, plan_posting, DomainError, LedgerCheck, LedgerPosting, PaginatedResponse,
    Pagination, RmBatch, RmBatchTransaction, RmBatchWithTransactions, RmTransactionType,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::external::{MasterDataResolver, ReferenceValidator};
use crate::services::query::{fetch_page, RmBatchFilter, RmBatchSort, Sort};

pub(crate) const RM_BATCH_COLUMNS: &str = "\
    id, plant_id, batch_number, quantity, unit, container_id, store_id, product_id, status, \
    created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "\
    id, rm_batch_id, transaction_type, quantity, notes, product_id, created_at";

/// Raw-material batch service
#[derive(Clone)]
pub struct RmBatchService {
    db: PgPool,
}

/// Input for opening a raw-material batch
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRmBatchInput {
    #[validate(length(min = 1, max = 50))]
    pub batch_number: String,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub container_id: Option<Uuid>,
    #[serde(default)]
    #[validate(custom = "shared::non_negative_decimal")]
    pub opening_quantity: Decimal,
}

/// Input for appending a ledger transaction
#[derive(Debug, Deserialize, Validate)]
pub struct RecordRmTransactionInput {
    pub transaction_type: RmTransactionType,
    /// Magnitude for IN/OUT, signed amount for ADJUSTMENT
    #[validate(custom = "shared::storable_decimal")]
    pub quantity: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Batch after a posting, with the appended transaction
#[derive(Debug, Clone, Serialize)]
pub struct RmPostingResult {
    pub batch: RmBatch,
    pub transaction: RmBatchTransaction,
}

pub(crate) async fn lock_by_number(
    conn: &mut PgConnection,
    plant_id: Uuid,
    batch_number: &str,
) -> AppResult<Option<RmBatch>> {
    let batch = sqlx::query_as::<_, RmBatch>(&format!(
        "SELECT {} FROM rm_batches WHERE plant_id = $1 AND batch_number = $2 FOR UPDATE",
        RM_BATCH_COLUMNS
    ))
    .bind(plant_id)
    .bind(batch_number)
    .fetch_optional(conn)
    .await?;
    Ok(batch)
}

async fn lock_by_id(conn: &mut PgConnection, plant_id: Uuid, id: Uuid) -> AppResult<RmBatch> {
    sqlx::query_as::<_, RmBatch>(&format!(
        "SELECT {} FROM rm_batches WHERE plant_id = $1 AND id = $2 FOR UPDATE",
        RM_BATCH_COLUMNS
    ))
    .bind(plant_id)
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DomainError::not_found("rm_batch", id).into())
}

/// Append a transaction and move the cached quantity by the same delta
///
/// The caller must hold the batch row lock and have planned `posting` from the locked quantity.
pub(crate) async fn append_transaction(
    conn: &mut PgConnection,
    batch: &RmBatch,
    transaction_type: RmTransactionType,
    posting: LedgerPosting,
    notes: Option<&str>,
    container_id: Option<Uuid>,
) -> AppResult<(RmBatch, RmBatchTransaction)> {
    let transaction = sqlx::query_as::<_, RmBatchTransaction>(&format!(
        r#"
        INSERT INTO rm_batch_transactions
            (rm_batch_id, transaction_type, quantity, notes, product_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(batch.id)
    .bind(transaction_type.as_str())
    .bind(posting.delta)
    .bind(notes)
    .bind(batch.product_id)
    .fetch_one(&mut *conn)
    .await?;

    let updated = sqlx::query_as::<_, RmBatch>(&format!(
        r#"
        UPDATE rm_batches
        SET quantity = quantity + $2,
            status = $3,
            container_id = COALESCE($4, container_id),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        RM_BATCH_COLUMNS
    ))
    .bind(batch.id)
    .bind(posting.delta)
    .bind(posting.status.as_str())
    .bind(container_id)
    .fetch_one(&mut *conn)
    .await?;

    if updated.quantity != posting.new_quantity {
        tracing::warn!(
            rm_batch_id = %batch.id,
            expected = %posting.new_quantity,
            actual = %updated.quantity,
            "rm batch quantity moved outside the lock"
        );
    }

    Ok((updated, transaction))
}

impl RmBatchService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a batch; any opening quantity is posted as an `in` transaction
    pub async fn create(
        &self,
        plant_id: Uuid,
        input: CreateRmBatchInput,
    ) -> AppResult<RmBatchWithTransactions> {
        input.validate()?;
        shared::validate_code("batch_number", &input.batch_number)?;

        let references =
            ReferenceValidator::new(MasterDataResolver::new(self.db.clone()), plant_id);
        references.product("product_id", input.product_id).await?;
        references.store("store_id", input.store_id).await?;

        if let Some(container_id) = input.container_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM containers WHERE id = $1 AND plant_id = $2)",
            )
            .bind(container_id)
            .bind(plant_id)
            .fetch_one(&self.db)
            .await?;
            if !exists {
                return Err(DomainError::validation(
                    "container_id",
                    "container not exists",
                    container_id,
                )
                .into());
            }
        }

        let duplicate = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM rm_batches WHERE plant_id = $1 AND batch_number = $2)",
        )
        .bind(plant_id)
        .bind(&input.batch_number)
        .fetch_one(&self.db)
        .await?;
        if duplicate {
            return Err(DomainError::conflict(
                "rm_batch",
                format!("batch number '{}' already exists", input.batch_number),
            )
            .into());
        }

        let mut tx = self.db.begin().await?;

        let mut batch = sqlx::query_as::<_, RmBatch>(&format!(
            r#"
            INSERT INTO rm_batches
                (plant_id, batch_number, quantity, unit, container_id, store_id, product_id, status)
            VALUES ($1, $2, 0, $3, $4, $5, $6, 'depleted')
            RETURNING {}
            "#,
            RM_BATCH_COLUMNS
        ))
        .bind(plant_id)
        .bind(&input.batch_number)
        .bind(&input.unit)
        .bind(input.container_id)
        .bind(input.store_id)
        .bind(input.product_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut transactions = Vec::new();
        if input.opening_quantity > Decimal::ZERO {
            let posting =
                plan_posting(batch.quantity, RmTransactionType::In, input.opening_quantity)?;
            let (updated, transaction) = append_transaction(
                &mut tx,
                &batch,
                RmTransactionType::In,
                posting,
                Some("opening balance"),
                None,
            )
            .await?;
            batch = updated;
            transactions.push(transaction);
        }

        tx.commit().await?;

        tracing::info!(
            plant_id = %plant_id,
            batch_number = %batch.batch_number,
            quantity = %batch.quantity,
            "rm batch opened"
        );

        Ok(RmBatchWithTransactions { batch, transactions })
    }

    /// Append an IN, OUT or ADJUSTMENT transaction
    pub async fn record_transaction(
        &self,
        plant_id: Uuid,
        id: Uuid,
        input: RecordRmTransactionInput,
    ) -> AppResult<RmPostingResult> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let batch = lock_by_id(&mut tx, plant_id, id).await?;
        let posting = plan_posting(batch.quantity, input.transaction_type, input.quantity)?;
        let (batch, transaction) = append_transaction(
            &mut tx,
            &batch,
            input.transaction_type,
            posting,
            input.notes.as_deref(),
            None,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            rm_batch_id = %batch.id,
            transaction_type = input.transaction_type.as_str(),
            delta = %posting.delta,
            quantity = %batch.quantity,
            "rm batch transaction recorded"
        );

        Ok(RmPostingResult { batch, transaction })
    }

    /// Recompute the ledger fold and compare it with the cached quantity
    pub async fn verify(&self, plant_id: Uuid, id: Uuid) -> AppResult<LedgerCheck> {
        let detail = self.get_by_id(plant_id, id).await?;
        let check = LedgerCheck::new(detail.batch.quantity, ledger_balance(&detail.transactions));

        if !check.consistent {
            tracing::warn!(
                rm_batch_id = %id,
                cached = %check.cached,
                computed = %check.computed,
                "rm batch ledger mismatch"
            );
        }
        Ok(check)
    }

    /// Get a batch with its transactions, newest first
    pub async fn get_by_id(&self, plant_id: Uuid, id: Uuid) -> AppResult<RmBatchWithTransactions> {
        let batch = sqlx::query_as::<_, RmBatch>(&format!(
            "SELECT {} FROM rm_batches WHERE plant_id = $1 AND id = $2",
            RM_BATCH_COLUMNS
        ))
        .bind(plant_id)
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("rm_batch", id))?;

        let transactions = sqlx::query_as::<_, RmBatchTransaction>(&format!(
            r#"
            SELECT {} FROM rm_batch_transactions
            WHERE rm_batch_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(batch.id)
        .fetch_all(&self.db)
        .await?;

        Ok(RmBatchWithTransactions { batch, transactions })
    }

    /// List batches in the plant
    pub async fn list(
        &self,
        plant_id: Uuid,
        filter: RmBatchFilter,
        sort: Sort<RmBatchSort>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<RmBatch>> {
        let (data, total) =
            fetch_page(&self.db, "rm_batches", plant_id, &filter, sort, &pagination).await?;
        Ok(PaginatedResponse::new(data, &pagination, total))
    }
}
