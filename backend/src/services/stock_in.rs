//! Stock-in engine
//!
//! Each stock-in runs in one database transaction: the target container (and, for
//! finished goods, every sticker) is locked, the plan is computed from the locked
//! rows, and only then is anything written. A second stock-in racing on the same
//! container code blocks on the row lock and then sees the committed state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    adopt_raced_container, check_auto_create_name, check_receipt_batch, plan_finished_goods,
    plan_posting, plan_raw_material, validate_shift, Container, ContainerContent, ContainerType,
    DomainError, RmBatch, RmTransactionType, StockInPlan, Sticker, TargetContainer,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::StockInConfig;
use crate::error::AppResult;
use crate::external::{MasterDataResolver, ReferenceValidator};
use crate::services::container::{
    contents_of, insert_content, lock_by_code, write_state, CONTAINER_COLUMNS,
};
use crate::services::rm_batch::{append_transaction, lock_by_number};
use crate::services::sticker::STICKER_COLUMNS;

/// Stock-in service
#[derive(Clone)]
pub struct StockInService {
    db: PgPool,
    config: StockInConfig,
}

/// Input for a raw-material receipt
#[derive(Debug, Deserialize, Validate)]
pub struct RawMaterialStockInInput {
    pub store_id: Uuid,
    pub product_id: Uuid,
    #[validate(custom = "shared::positive_decimal")]
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub container_code: String,
    pub shift: String,
    #[validate(length(max = 255))]
    pub supervisor: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub batch_no: String,
    /// Unit for a newly opened raw-material batch; defaults to the product's unit
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
}

/// Input for a single finished-goods receipt
#[derive(Debug, Deserialize, Validate)]
pub struct FinishedGoodsStockInInput {
    #[validate(length(min = 1, max = 50))]
    pub container_code: String,
    pub barcode: String,
    pub store_id: Option<Uuid>,
}

/// Input for a bulk finished-goods receipt
#[derive(Debug, Deserialize, Validate)]
pub struct BulkFinishedGoodsStockInInput {
    #[validate(length(min = 1, max = 50))]
    pub container_code: String,
    pub barcodes: Vec<String>,
    pub store_id: Option<Uuid>,
}

/// Container state after a stock-in
#[derive(Debug, Clone, Serialize)]
pub struct StockInResult {
    pub container: Container,
    pub contents: Vec<ContainerContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rm_batch: Option<RmBatch>,
}

impl StockInService {
    pub fn new(db: PgPool, config: StockInConfig) -> Self {
        Self { db, config }
    }

    /// Receive raw material into a container and post it to the batch ledger
    pub async fn raw_material(
        &self,
        plant_id: Uuid,
        input: RawMaterialStockInInput,
    ) -> AppResult<StockInResult> {
        input.validate()?;
        validate_shift(&input.shift)?;

        let references =
            ReferenceValidator::new(MasterDataResolver::new(self.db.clone()), plant_id);
        references.store("store_id", input.store_id).await?;
        references.product("product_id", input.product_id).await?;

        let mut tx = self.db.begin().await?;

        let existing = lock_by_code(&mut tx, plant_id, &input.container_code).await?;
        let plan = plan_raw_material(
            existing.as_ref(),
            &input.container_code,
            self.config.raw_material_container_type,
            input.product_id,
            input.quantity,
            &input.batch_no,
        )?;

        let (container, contents) =
            apply_plan(&mut tx, plant_id, existing, &plan, Some(input.store_id)).await?;

        let notes = receipt_notes(&input.shift, input.supervisor.as_deref(), &container.code);
        let rm_batch = post_receipt(&mut tx, plant_id, &container, &input, &notes).await?;

        tx.commit().await?;

        tracing::info!(
            plant_id = %plant_id,
            container = %container.code,
            product_id = %input.product_id,
            quantity = %input.quantity,
            batch_no = %input.batch_no,
            "raw material received"
        );

        Ok(StockInResult {
            container,
            contents,
            rm_batch: Some(rm_batch),
        })
    }

    /// Receive one finished-goods sticker into a container
    pub async fn finished_goods(
        &self,
        plant_id: Uuid,
        input: FinishedGoodsStockInInput,
    ) -> AppResult<StockInResult> {
        input.validate()?;
        self.finished_goods_bulk(
            plant_id,
            BulkFinishedGoodsStockInInput {
                container_code: input.container_code,
                barcodes: vec![input.barcode],
                store_id: input.store_id,
            },
        )
        .await
    }

    /// Receive a set of stickers into one container; all of them or none
    pub async fn finished_goods_bulk(
        &self,
        plant_id: Uuid,
        input: BulkFinishedGoodsStockInInput,
    ) -> AppResult<StockInResult> {
        input.validate()?;
        shared::validate_barcode_list("barcodes", &input.barcodes)?;

        if let Some(store_id) = input.store_id {
            ReferenceValidator::new(MasterDataResolver::new(self.db.clone()), plant_id)
                .store("store_id", store_id)
                .await?;
        }

        let mut tx = self.db.begin().await?;

        // Container before stickers, matching the raw-material path.
        let existing = lock_by_code(&mut tx, plant_id, &input.container_code).await?;
        let stickers = lock_stickers(&mut tx, plant_id, &input.barcodes).await?;

        let plan = plan_finished_goods(
            existing.as_ref(),
            &input.container_code,
            self.config.finished_goods_container_type,
            &input.barcodes,
            &stickers,
        )?;

        let store_id = input
            .store_id
            .or_else(|| existing.as_ref().and_then(|c| c.store_id));
        let (container, contents) =
            apply_plan(&mut tx, plant_id, existing, &plan, store_id).await?;

        let consumed = sqlx::query(
            r#"
            UPDATE stickers SET is_used = TRUE
            WHERE id = ANY($1) AND plant_id = $2 AND NOT is_used
            "#,
        )
        .bind(&plan.consumed_stickers)
        .bind(plant_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if consumed != plan.consumed_stickers.len() as u64 {
            // Rows are locked above, so this only trips if the lock discipline is broken.
            return Err(DomainError::conflict("sticker", "sticker already consumed").into());
        }

        tx.commit().await?;

        tracing::info!(
            plant_id = %plant_id,
            container = %container.code,
            stickers = consumed,
            "finished goods received"
        );

        Ok(StockInResult {
            container,
            contents,
            rm_batch: None,
        })
    }
}

fn receipt_notes(shift: &str, supervisor: Option<&str>, container_code: &str) -> String {
    match supervisor {
        Some(supervisor) => format!(
            "stock-in to {} (shift {}, supervisor {})",
            container_code, shift, supervisor
        ),
        None => format!("stock-in to {} (shift {})", container_code, shift),
    }
}

async fn lock_stickers(
    conn: &mut PgConnection,
    plant_id: Uuid,
    barcodes: &[String],
) -> AppResult<Vec<Sticker>> {
    let stickers = sqlx::query_as::<_, Sticker>(&format!(
        r#"
        SELECT {} FROM stickers
        WHERE plant_id = $1 AND barcode = ANY($2)
        ORDER BY id
        FOR UPDATE
        "#,
        STICKER_COLUMNS
    ))
    .bind(plant_id)
    .bind(barcodes)
    .fetch_all(conn)
    .await?;
    Ok(stickers)
}

/// Create the target container when the plan asks for it, then write content and state
async fn apply_plan(
    conn: &mut PgConnection,
    plant_id: Uuid,
    existing: Option<Container>,
    plan: &StockInPlan,
    store_id: Option<Uuid>,
) -> AppResult<(Container, Vec<ContainerContent>)> {
    let container = match (&plan.target, existing) {
        (TargetContainer::Existing(_), Some(container)) => container,
        (TargetContainer::Existing(id), None) => {
            return Err(DomainError::not_found("container", id).into());
        }
        (TargetContainer::Create { code, name, container_type }, _) => {
            create_or_lock(conn, plant_id, code, name, *container_type).await?
        }
    };

    for line in &plan.lines {
        insert_content(
            conn,
            plant_id,
            container.id,
            line.product_id,
            line.quantity,
            line.barcode.as_deref(),
        )
        .await?;
    }

    let container = write_state(
        conn,
        container.id,
        plan.next_state,
        Some(plan.product_id),
        store_id,
    )
    .await?;
    let contents = contents_of(conn, container.id).await?;
    Ok((container, contents))
}

/// Insert an empty container, or lock the one a concurrent request created first
async fn create_or_lock(
    conn: &mut PgConnection,
    plant_id: Uuid,
    code: &str,
    name: &str,
    container_type: ContainerType,
) -> AppResult<Container> {
    // ON CONFLICT covers the code only; the name is checked first.
    let name_holder = sqlx::query_scalar::<_, String>(
        "SELECT code FROM containers WHERE plant_id = $1 AND name = $2",
    )
    .bind(plant_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;
    check_auto_create_name(code, name, name_holder.as_deref())?;

    let created = sqlx::query_as::<_, Container>(&format!(
        r#"
        INSERT INTO containers (plant_id, container_type, code, name, stock_level, approved)
        VALUES ($1, $2, $3, $4, 'empty', TRUE)
        ON CONFLICT (plant_id, code) DO NOTHING
        RETURNING {}
        "#,
        CONTAINER_COLUMNS
    ))
    .bind(plant_id)
    .bind(container_type.as_str())
    .bind(code)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    match created {
        Some(container) => {
            tracing::debug!(plant_id = %plant_id, code = %code, "container created on stock-in");
            Ok(container)
        }
        None => {
            let locked = lock_by_code(conn, plant_id, code).await?;
            Ok(adopt_raced_container(code, locked)?)
        }
    }
}

/// Append an `in` posting for the receipt, opening the batch when it does not exist yet
async fn post_receipt(
    conn: &mut PgConnection,
    plant_id: Uuid,
    container: &Container,
    input: &RawMaterialStockInInput,
    notes: &str,
) -> AppResult<RmBatch> {
    // Open the batch if needed; a concurrent receipt opening the same number waits
    // on the unique index, then both lock the one committed row.
    sqlx::query(
        r#"
        INSERT INTO rm_batches
            (plant_id, batch_number, quantity, unit, container_id, store_id, product_id, status)
        SELECT $1, $2, 0, COALESCE($3, p.unit, 'unit'), $4, $5, p.id, 'depleted'
        FROM products p
        WHERE p.id = $6 AND p.plant_id = $1
        ON CONFLICT (plant_id, batch_number) DO NOTHING
        "#,
    )
    .bind(plant_id)
    .bind(&input.batch_no)
    .bind(&input.unit)
    .bind(container.id)
    .bind(input.store_id)
    .bind(input.product_id)
    .execute(&mut *conn)
    .await?;

    let batch = lock_by_number(&mut *conn, plant_id, &input.batch_no)
        .await?
        .ok_or_else(|| DomainError::not_found("rm_batch", &input.batch_no))?;
    check_receipt_batch(&batch, input.product_id)?;

    let posting = plan_posting(batch.quantity, RmTransactionType::In, input.quantity)?;
    let (batch, _) = append_transaction(
        conn,
        &batch,
        RmTransactionType::In,
        posting,
        Some(notes),
        Some(container.id),
    )
    .await?;
    Ok(batch)
}
