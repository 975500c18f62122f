//! Sticker issuance, lookup and print tracking

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    plan_stickers, validate_shift, Batchlabel, DomainError, IssuancePolicy, PaginatedResponse,
    Pagination, Sticker, StickerIssuance,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::services::batchlabel::BATCHLABEL_COLUMNS;
use crate::services::query::{fetch_page, Sort, StickerFilter, StickerSort};

pub(crate) const STICKER_COLUMNS: &str = "\
    id, plant_id, batchlabel_id, barcode, packet_no, shift, supervisor, product_line, batch_no, \
    machine_no, quantity, print_count, is_used, product_id, created_at";

/// Sticker service
#[derive(Clone)]
pub struct StickerService {
    db: PgPool,
    policy: IssuancePolicy,
}

/// Per-sticker quantity override
#[derive(Debug, Deserialize)]
pub struct StickerItemInput {
    pub quantity: Decimal,
}

/// Input for issuing stickers against a batchlabel
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStickersInput {
    #[validate(range(min = 1, max = 1000))]
    pub count: u32,
    pub shift: String,
    #[validate(length(max = 255))]
    pub supervisor: Option<String>,
    #[validate(length(max = 100))]
    pub product_line: Option<String>,
    #[serde(default)]
    pub items: Vec<StickerItemInput>,
    #[serde(default)]
    pub allow_over_issue: bool,
}

/// Query for the per-shift sticker count
#[derive(Debug, Deserialize)]
pub struct ShiftCountQuery {
    pub shift: String,
    pub date: NaiveDate,
}

/// Newly issued stickers and the batch's issuance after them
#[derive(Debug, Clone, Serialize)]
pub struct IssuedStickers {
    pub stickers: Vec<Sticker>,
    pub issuance: StickerIssuance,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShiftCount {
    pub batchlabel_id: Uuid,
    pub shift: String,
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, FromRow)]
struct IssuanceRow {
    total_printed: i64,
    used: i64,
    last_packet_no: Option<i32>,
}

async fn issuance_row(conn: &mut PgConnection, batchlabel_id: Uuid) -> AppResult<IssuanceRow> {
    let row = sqlx::query_as::<_, IssuanceRow>(
        r#"
        SELECT COUNT(*) AS total_printed,
               COUNT(*) FILTER (WHERE is_used) AS used,
               MAX(packet_no) AS last_packet_no
        FROM stickers
        WHERE batchlabel_id = $1
        "#,
    )
    .bind(batchlabel_id)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Required vs issued vs consumed stickers for a batch
pub(crate) async fn issuance_for(
    conn: &mut PgConnection,
    batch: &Batchlabel,
) -> AppResult<StickerIssuance> {
    let row = issuance_row(conn, batch.id).await?;
    Ok(StickerIssuance::new(
        batch.required_sticker_count(),
        row.total_printed,
        row.used,
    ))
}

impl StickerService {
    pub fn new(db: PgPool, policy: IssuancePolicy) -> Self {
        Self { db, policy }
    }

    /// Issue `count` stickers with the next packet numbers of the batch
    pub async fn create_stickers(
        &self,
        plant_id: Uuid,
        batchlabel_id: Uuid,
        input: CreateStickersInput,
    ) -> AppResult<IssuedStickers> {
        input.validate()?;
        validate_shift(&input.shift)?;

        let mut tx = self.db.begin().await?;

        // The batch row lock serializes packet number allocation.
        let batch = sqlx::query_as::<_, Batchlabel>(&format!(
            "SELECT {} FROM batchlabels WHERE plant_id = $1 AND id = $2 FOR UPDATE",
            BATCHLABEL_COLUMNS
        ))
        .bind(plant_id)
        .bind(batchlabel_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DomainError::not_found("batchlabel", batchlabel_id))?;

        let machine_no = sqlx::query_scalar::<_, String>("SELECT code FROM machines WHERE id = $1")
            .bind(batch.machine_id)
            .fetch_one(&mut *tx)
            .await?;

        let row = issuance_row(&mut tx, batch.id).await?;
        let current =
            StickerIssuance::new(batch.required_sticker_count(), row.total_printed, row.used);
        let issuance = self
            .policy
            .check(&current, i64::from(input.count), input.allow_over_issue)?;

        let quantities: Vec<Decimal> = input.items.iter().map(|i| i.quantity).collect();
        let planned = plan_stickers(&batch, row.last_packet_no, input.count, &quantities)?;

        let mut stickers = Vec::with_capacity(planned.len());
        for new in planned {
            let sticker = sqlx::query_as::<_, Sticker>(&format!(
                r#"
                INSERT INTO stickers (
                    plant_id, batchlabel_id, barcode, packet_no, shift, supervisor, product_line,
                    batch_no, machine_no, quantity, product_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING {}
                "#,
                STICKER_COLUMNS
            ))
            .bind(plant_id)
            .bind(batch.id)
            .bind(&new.barcode)
            .bind(new.packet_no)
            .bind(&input.shift)
            .bind(&input.supervisor)
            .bind(&input.product_line)
            .bind(&batch.batch_no)
            .bind(&machine_no)
            .bind(new.quantity)
            .bind(batch.product_id)
            .fetch_one(&mut *tx)
            .await?;
            stickers.push(sticker);
        }

        tx.commit().await?;

        if issuance.over_issued {
            tracing::warn!(
                batch_no = %batch.batch_no,
                labels_to_print = issuance.labels_to_print,
                total_printed = issuance.total_printed,
                "stickers issued beyond the required count"
            );
        } else {
            tracing::info!(
                batch_no = %batch.batch_no,
                count = stickers.len(),
                total_printed = issuance.total_printed,
                "stickers issued"
            );
        }

        Ok(IssuedStickers { stickers, issuance })
    }

    pub async fn get_by_barcode(&self, plant_id: Uuid, barcode: &str) -> AppResult<Sticker> {
        sqlx::query_as::<_, Sticker>(&format!(
            "SELECT {} FROM stickers WHERE plant_id = $1 AND barcode = $2",
            STICKER_COLUMNS
        ))
        .bind(plant_id)
        .bind(barcode)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("sticker", barcode).into())
    }

    /// List stickers, in packet order
    pub async fn list(
        &self,
        plant_id: Uuid,
        filter: StickerFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Sticker>> {
        let sort = Sort {
            sort_by: StickerSort::PacketNo,
            order: shared::SortOrder::Asc,
        };
        let (data, total) =
            fetch_page(&self.db, "stickers", plant_id, &filter, sort, &pagination).await?;
        Ok(PaginatedResponse::new(data, &pagination, total))
    }

    /// Count a reprint; reprints never create rows
    pub async fn record_print(&self, plant_id: Uuid, barcode: &str) -> AppResult<Sticker> {
        sqlx::query_as::<_, Sticker>(&format!(
            r#"
            UPDATE stickers SET print_count = print_count + 1
            WHERE plant_id = $1 AND barcode = $2
            RETURNING {}
            "#,
            STICKER_COLUMNS
        ))
        .bind(plant_id)
        .bind(barcode)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("sticker", barcode).into())
    }

    /// Stickers issued for the batch in one shift on one UTC calendar day
    pub async fn count_for_shift(
        &self,
        plant_id: Uuid,
        batchlabel_id: Uuid,
        query: ShiftCountQuery,
    ) -> AppResult<ShiftCount> {
        validate_shift(&query.shift)?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM batchlabels WHERE id = $1 AND plant_id = $2)",
        )
        .bind(batchlabel_id)
        .bind(plant_id)
        .fetch_one(&self.db)
        .await?;
        if !exists {
            return Err(DomainError::not_found("batchlabel", batchlabel_id).into());
        }

        let start = query.date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1);

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM stickers
            WHERE batchlabel_id = $1 AND shift = $2 AND created_at >= $3 AND created_at < $4
            "#,
        )
        .bind(batchlabel_id)
        .bind(&query.shift)
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;

        Ok(ShiftCount {
            batchlabel_id,
            shift: query.shift,
            date: query.date,
            count,
        })
    }
}
