//! Container store: lookups, listing and the non-stock-in state transitions

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    plan_unload, validate_code, Container, ContainerContent, ContainerDetail, ContainerState,
    ContainerTransition, ContainerType, DomainError, PaginatedResponse, Pagination,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::MasterDataResolver;
use crate::services::query::{fetch_page, ContainerFilter, ContainerSort, Sort};

pub(crate) const CONTAINER_COLUMNS: &str = "\
    id, plant_id, container_type, code, name, address, enabled, stock_level, approved, \
    product_id, store_id, location_id, created_at, updated_at";

const CONTENT_COLUMNS: &str = "\
    id, plant_id, container_id, product_id, quantity, barcode, created_at";

/// Container service for lookups and state transitions outside stock-in
#[derive(Clone)]
pub struct ContainerService {
    db: PgPool,
}

/// Input for creating a container
#[derive(Debug, Deserialize, Validate)]
pub struct CreateContainerInput {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(rename = "type")]
    pub container_type: ContainerType,
    pub address: Option<String>,
}

/// Input for updating a container's descriptive fields
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContainerInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub enabled: Option<bool>,
}

/// Input for releasing stock from one content row
#[derive(Debug, Deserialize, Validate)]
pub struct UnloadInput {
    pub content_id: Uuid,
    #[validate(custom = "shared::positive_decimal")]
    pub quantity: Decimal,
}

/// Input for binding a container to a store location
#[derive(Debug, Deserialize, Validate)]
pub struct AttachLocationInput {
    #[validate(length(min = 1, max = 50))]
    pub location_code: String,
}

// ============================================================================
// Row helpers shared with stock-in and approval
// ============================================================================

/// Lock a container row by code for the rest of the transaction
pub(crate) async fn lock_by_code(
    conn: &mut PgConnection,
    plant_id: Uuid,
    code: &str,
) -> AppResult<Option<Container>> {
    let container = sqlx::query_as::<_, Container>(&format!(
        "SELECT {} FROM containers WHERE plant_id = $1 AND code = $2 FOR UPDATE",
        CONTAINER_COLUMNS
    ))
    .bind(plant_id)
    .bind(code)
    .fetch_optional(conn)
    .await?;
    Ok(container)
}

pub(crate) async fn lock_existing(
    conn: &mut PgConnection,
    plant_id: Uuid,
    code: &str,
) -> AppResult<Container> {
    lock_by_code(conn, plant_id, code)
        .await?
        .ok_or_else(|| DomainError::not_found("container", code).into())
}

pub(crate) async fn contents_of(
    conn: &mut PgConnection,
    container_id: Uuid,
) -> AppResult<Vec<ContainerContent>> {
    let contents = sqlx::query_as::<_, ContainerContent>(&format!(
        "SELECT {} FROM container_contents WHERE container_id = $1 ORDER BY created_at, id",
        CONTENT_COLUMNS
    ))
    .bind(container_id)
    .fetch_all(conn)
    .await?;
    Ok(contents)
}

pub(crate) async fn insert_content(
    conn: &mut PgConnection,
    plant_id: Uuid,
    container_id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    barcode: Option<&str>,
) -> AppResult<ContainerContent> {
    let content = sqlx::query_as::<_, ContainerContent>(&format!(
        r#"
        INSERT INTO container_contents (plant_id, container_id, product_id, quantity, barcode)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        CONTENT_COLUMNS
    ))
    .bind(plant_id)
    .bind(container_id)
    .bind(product_id)
    .bind(quantity)
    .bind(barcode)
    .fetch_one(conn)
    .await?;
    Ok(content)
}

/// Write a new state together with the current product and store references
pub(crate) async fn write_state(
    conn: &mut PgConnection,
    container_id: Uuid,
    state: ContainerState,
    product_id: Option<Uuid>,
    store_id: Option<Uuid>,
) -> AppResult<Container> {
    let container = sqlx::query_as::<_, Container>(&format!(
        r#"
        UPDATE containers
        SET stock_level = $2, approved = $3, product_id = $4, store_id = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        CONTAINER_COLUMNS
    ))
    .bind(container_id)
    .bind(state.stock_level.as_str())
    .bind(state.approved)
    .bind(product_id)
    .bind(store_id)
    .fetch_one(conn)
    .await?;
    Ok(container)
}

impl ContainerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an empty, approved container
    pub async fn create(
        &self,
        plant_id: Uuid,
        input: CreateContainerInput,
    ) -> AppResult<Container> {
        input.validate()?;
        validate_code("code", &input.code)?;

        self.ensure_unique(plant_id, "code", &input.code, None).await?;
        self.ensure_unique(plant_id, "name", &input.name, None).await?;

        let initial = ContainerState::initial();
        let container = sqlx::query_as::<_, Container>(&format!(
            r#"
            INSERT INTO containers
                (plant_id, container_type, code, name, address, stock_level, approved)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            CONTAINER_COLUMNS
        ))
        .bind(plant_id)
        .bind(input.container_type.as_str())
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.address)
        .bind(initial.stock_level.as_str())
        .bind(initial.approved)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(plant_id = %plant_id, code = %container.code, "container created");
        Ok(container)
    }

    async fn ensure_unique(
        &self,
        plant_id: Uuid,
        column: &'static str,
        value: &str,
        except: Option<Uuid>,
    ) -> AppResult<()> {
        // `column` is one of two literals above
        let taken = sqlx::query_scalar::<_, bool>(&format!(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM containers
                WHERE plant_id = $1 AND {} = $2 AND id IS DISTINCT FROM $3
            )
            "#,
            column
        ))
        .bind(plant_id)
        .bind(value)
        .bind(except)
        .fetch_one(&self.db)
        .await?;

        if taken {
            return Err(DomainError::conflict(
                "container",
                format!("container {} '{}' already exists", column, value),
            )
            .into());
        }
        Ok(())
    }

    /// Get a container by code, optionally with its content rows
    pub async fn get_by_code(
        &self,
        plant_id: Uuid,
        code: &str,
        include_content: bool,
    ) -> AppResult<ContainerDetail> {
        let container = self.find_by_code(plant_id, code).await?;

        let contents = if include_content {
            let mut conn = self.db.acquire().await?;
            Some(contents_of(&mut conn, container.id).await?)
        } else {
            None
        };

        let location = match container.location_id {
            Some(location_id) => {
                MasterDataResolver::new(self.db.clone())
                    .store_location(plant_id, location_id)
                    .await?
            }
            None => None,
        };

        Ok(ContainerDetail {
            container,
            contents,
            location,
        })
    }

    pub async fn find_by_code(&self, plant_id: Uuid, code: &str) -> AppResult<Container> {
        sqlx::query_as::<_, Container>(&format!(
            "SELECT {} FROM containers WHERE plant_id = $1 AND code = $2",
            CONTAINER_COLUMNS
        ))
        .bind(plant_id)
        .bind(code)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("container", code).into())
    }

    /// List containers in the plant
    pub async fn list(
        &self,
        plant_id: Uuid,
        filter: ContainerFilter,
        sort: Sort<ContainerSort>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Container>> {
        let (data, total) =
            fetch_page(&self.db, "containers", plant_id, &filter, sort, &pagination).await?;
        Ok(PaginatedResponse::new(data, &pagination, total))
    }

    /// Update name, address or enabled status
    pub async fn update(
        &self,
        plant_id: Uuid,
        code: &str,
        input: UpdateContainerInput,
    ) -> AppResult<Container> {
        input.validate()?;
        let existing = self.find_by_code(plant_id, code).await?;

        if let Some(ref name) = input.name {
            if name != &existing.name {
                self.ensure_unique(plant_id, "name", name, Some(existing.id)).await?;
            }
        }

        let container = sqlx::query_as::<_, Container>(&format!(
            r#"
            UPDATE containers
            SET name = COALESCE($3, name),
                address = COALESCE($4, address),
                enabled = COALESCE($5, enabled),
                updated_at = NOW()
            WHERE id = $1 AND plant_id = $2
            RETURNING {}
            "#,
            CONTAINER_COLUMNS
        ))
        .bind(existing.id)
        .bind(plant_id)
        .bind(&input.name)
        .bind(&input.address)
        .bind(input.enabled)
        .fetch_one(&self.db)
        .await?;

        Ok(container)
    }

    /// Delete a container together with its content rows
    pub async fn delete(&self, plant_id: Uuid, code: &str) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let container = lock_existing(&mut tx, plant_id, code).await?;

        let removed = sqlx::query("DELETE FROM container_contents WHERE container_id = $1")
            .bind(container.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM containers WHERE id = $1")
            .bind(container.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(plant_id = %plant_id, code = %code, contents = removed, "container deleted");
        Ok(())
    }

    /// Close a non-empty container; approval is left as it was
    pub async fn mark_full(&self, plant_id: Uuid, code: &str) -> AppResult<Container> {
        let mut tx = self.db.begin().await?;

        let container = lock_existing(&mut tx, plant_id, code).await?;
        let next = container.state().apply(ContainerTransition::MarkFull)?;

        let updated = if next == container.state() {
            container
        } else {
            write_state(&mut tx, container.id, next, container.product_id, container.store_id)
                .await?
        };

        tx.commit().await?;
        Ok(updated)
    }

    /// Release stock from one content row
    pub async fn unload(
        &self,
        plant_id: Uuid,
        code: &str,
        input: UnloadInput,
    ) -> AppResult<ContainerDetail> {
        input.validate()?;
        let mut tx = self.db.begin().await?;

        let container = lock_existing(&mut tx, plant_id, code).await?;
        let contents = contents_of(&mut tx, container.id).await?;
        let plan = plan_unload(&container, &contents, input.content_id, input.quantity)?;

        if plan.deletes_row() {
            sqlx::query("DELETE FROM container_contents WHERE id = $1")
                .bind(plan.content_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("UPDATE container_contents SET quantity = $2 WHERE id = $1")
                .bind(plan.content_id)
                .bind(plan.remaining_quantity)
                .execute(&mut *tx)
                .await?;
        }

        let (product_id, store_id) = if plan.clears_container() {
            (None, None)
        } else {
            (container.product_id, container.store_id)
        };
        let updated =
            write_state(&mut tx, container.id, plan.next_state, product_id, store_id).await?;
        let remaining = contents_of(&mut tx, container.id).await?;

        tx.commit().await?;

        tracing::info!(
            plant_id = %plant_id,
            code = %code,
            quantity = %input.quantity,
            stock_level = %updated.stock_level,
            "container unloaded"
        );

        Ok(ContainerDetail {
            container: updated,
            contents: Some(remaining),
            location: None,
        })
    }

    /// Bind a container to a store location; re-attaching to the same location is a no-op
    pub async fn attach_to_location(
        &self,
        plant_id: Uuid,
        code: &str,
        input: AttachLocationInput,
    ) -> AppResult<ContainerDetail> {
        input.validate()?;

        let location = MasterDataResolver::new(self.db.clone())
            .store_location_by_code(plant_id, &input.location_code)
            .await?
            .ok_or_else(|| {
                AppError::from(DomainError::not_found("store location", &input.location_code))
            })?;

        let mut tx = self.db.begin().await?;
        let container = lock_existing(&mut tx, plant_id, code).await?;

        let container = if container.location_id == Some(location.id) {
            container
        } else {
            sqlx::query_as::<_, Container>(&format!(
                r#"
                UPDATE containers SET location_id = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING {}
                "#,
                CONTAINER_COLUMNS
            ))
            .bind(container.id)
            .bind(location.id)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;

        Ok(ContainerDetail {
            container,
            contents: None,
            location: Some(location),
        })
    }
}
