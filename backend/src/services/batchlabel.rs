//! Batchlabel (production run) service

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_code, Batchlabel, DomainError, PaginatedResponse, Pagination, ProcessStatus,
    StickerIssuance,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::external::{MasterDataResolver, ReferenceValidator};
use crate::services::query::{fetch_page, BatchlabelFilter, BatchlabelSort, Sort};
use crate::services::sticker::issuance_for;

pub(crate) const BATCHLABEL_COLUMNS: &str = "\
    id, plant_id, batch_no, batch_date, po_category, customer_id, product_id, machine_id, \
    job_order_id, job_order_item_id, unit, unit_weight, target_quantity, package_quantity, \
    process_status, created_at, updated_at";

/// Batchlabel service
#[derive(Clone)]
pub struct BatchlabelService {
    db: PgPool,
}

/// Input for creating a batchlabel
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchlabelInput {
    #[validate(length(min = 1, max = 50))]
    pub batch_no: String,
    pub batch_date: NaiveDate,
    #[validate(length(min = 1, max = 50))]
    pub po_category: String,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub machine_id: Uuid,
    pub job_order_id: Option<Uuid>,
    pub job_order_item_id: Option<Uuid>,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    #[validate(custom = "shared::positive_decimal")]
    pub unit_weight: Option<Decimal>,
    #[validate(custom = "shared::non_negative_decimal")]
    pub target_quantity: Decimal,
    #[validate(custom = "shared::non_negative_decimal")]
    pub package_quantity: Decimal,
    pub process_status: Option<ProcessStatus>,
}

/// Batchlabel with its sticker issuance
#[derive(Debug, Clone, Serialize)]
pub struct BatchlabelDetail {
    #[serde(flatten)]
    pub batchlabel: Batchlabel,
    pub issuance: StickerIssuance,
}

impl BatchlabelService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a batchlabel after checking every reference it names
    pub async fn create(
        &self,
        plant_id: Uuid,
        input: CreateBatchlabelInput,
    ) -> AppResult<BatchlabelDetail> {
        input.validate()?;
        validate_code("batch_no", &input.batch_no)?;

        if input.job_order_item_id.is_some() && input.job_order_id.is_none() {
            return Err(DomainError::missing(
                "job_order_id",
                "required when job_order_item_id is given",
            )
            .into());
        }

        let references =
            ReferenceValidator::new(MasterDataResolver::new(self.db.clone()), plant_id);
        references.customer("customer_id", input.customer_id).await?;
        references.product("product_id", input.product_id).await?;
        references.machine("machine_id", input.machine_id).await?;
        if let Some(job_order_id) = input.job_order_id {
            references.job_order(job_order_id, input.job_order_item_id).await?;
        }

        let duplicate = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM batchlabels WHERE plant_id = $1 AND batch_no = $2)",
        )
        .bind(plant_id)
        .bind(&input.batch_no)
        .fetch_one(&self.db)
        .await?;
        if duplicate {
            return Err(DomainError::conflict(
                "batchlabel",
                format!("batch number '{}' already exists", input.batch_no),
            )
            .into());
        }

        let batchlabel = sqlx::query_as::<_, Batchlabel>(&format!(
            r#"
            INSERT INTO batchlabels (
                plant_id, batch_no, batch_date, po_category, customer_id, product_id, machine_id,
                job_order_id, job_order_item_id, unit, unit_weight, target_quantity,
                package_quantity, process_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            BATCHLABEL_COLUMNS
        ))
        .bind(plant_id)
        .bind(&input.batch_no)
        .bind(input.batch_date)
        .bind(&input.po_category)
        .bind(input.customer_id)
        .bind(input.product_id)
        .bind(input.machine_id)
        .bind(input.job_order_id)
        .bind(input.job_order_item_id)
        .bind(&input.unit)
        .bind(input.unit_weight)
        .bind(input.target_quantity)
        .bind(input.package_quantity)
        .bind(input.process_status.unwrap_or_default().as_str())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            plant_id = %plant_id,
            batch_no = %batchlabel.batch_no,
            labels_to_print = batchlabel.required_sticker_count(),
            "batchlabel created"
        );

        let issuance = StickerIssuance::new(batchlabel.required_sticker_count(), 0, 0);
        Ok(BatchlabelDetail { batchlabel, issuance })
    }

    /// Get a batchlabel with how many stickers are required, printed and used
    pub async fn get(&self, plant_id: Uuid, id: Uuid) -> AppResult<BatchlabelDetail> {
        let mut conn = self.db.acquire().await?;

        let batchlabel = sqlx::query_as::<_, Batchlabel>(&format!(
            "SELECT {} FROM batchlabels WHERE plant_id = $1 AND id = $2",
            BATCHLABEL_COLUMNS
        ))
        .bind(plant_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DomainError::not_found("batchlabel", id))?;

        let issuance = issuance_for(&mut conn, &batchlabel).await?;
        Ok(BatchlabelDetail { batchlabel, issuance })
    }

    pub async fn list(
        &self,
        plant_id: Uuid,
        filter: BatchlabelFilter,
        sort: Sort<BatchlabelSort>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Batchlabel>> {
        let (data, total) =
            fetch_page(&self.db, "batchlabels", plant_id, &filter, sort, &pagination).await?;
        Ok(PaginatedResponse::new(data, &pagination, total))
    }
}
