//! Approval gate for containers and requisitions
//!
//! Bulk approval is all-or-nothing: the requested rows are locked, every id must
//! exist in the plant, and the update re-checks the pending flag so a row that was
//! approved concurrently is not written twice.

use serde::Deserialize;
use shared::{
    outside_approver_stores, plan_bulk_approval, ApprovalReport, ApprovalRow, ApprovalState,
    Container, DomainError, PaginatedResponse, Pagination, Requisition,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::MasterDataResolver;
use crate::services::query::{
    fetch_page, ContainerFilter, ContainerSort, RequisitionFilter, RequisitionSort, Sort,
};

/// Entity kinds that pass through the approval gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Container,
    Requisition,
}

impl Gate {
    fn resource(&self) -> &'static str {
        match self {
            Gate::Container => "container",
            Gate::Requisition => "requisition",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            Gate::Container => "containers",
            Gate::Requisition => "requisitions",
        }
    }

    /// SQL boolean for "already approved"
    fn approved_expr(&self) -> &'static str {
        match self {
            Gate::Container => "approved",
            Gate::Requisition => "approved = 'approved'",
        }
    }

    fn approve_assignment(&self) -> &'static str {
        match self {
            Gate::Container => "approved = TRUE",
            Gate::Requisition => "approved = 'approved'",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkApprovalInput {
    #[validate(length(min = 1, max = 500))]
    pub ids: Vec<Uuid>,
}

#[derive(Debug, FromRow)]
struct GateRow {
    id: Uuid,
    approved: bool,
    store_id: Option<Uuid>,
}

impl From<GateRow> for ApprovalRow {
    fn from(row: GateRow) -> Self {
        ApprovalRow {
            id: row.id,
            approved: row.approved,
            store_id: row.store_id,
        }
    }
}

/// Approval service
#[derive(Clone)]
pub struct ApprovalService {
    db: PgPool,
}

impl ApprovalService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Approve pending rows of one gate
    ///
    /// When `allowed_stores` is given, every requested row must belong to one of them.
    async fn approve(
        &self,
        gate: Gate,
        plant_id: Uuid,
        ids: &[Uuid],
        allowed_stores: Option<&[Uuid]>,
    ) -> AppResult<ApprovalReport> {
        let mut tx = self.db.begin().await?;

        // Lock in id order so two overlapping bulk approvals cannot deadlock.
        let rows: Vec<ApprovalRow> = sqlx::query_as::<_, GateRow>(&format!(
            r#"
            SELECT id, {} AS approved, store_id FROM {}
            WHERE plant_id = $1 AND id = ANY($2)
            ORDER BY id
            FOR UPDATE
            "#,
            gate.approved_expr(),
            gate.table()
        ))
        .bind(plant_id)
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(ApprovalRow::from)
        .collect();

        let report = plan_bulk_approval(gate.resource(), ids, &rows)?;

        if let Some(allowed) = allowed_stores {
            if let Some(id) = outside_approver_stores(&rows, allowed).first() {
                return Err(AppError::InsufficientPermissions(format!(
                    "approver of the store for {} {}",
                    gate.resource(),
                    id
                )));
            }
        }

        if !report.approved.is_empty() {
            let updated = sqlx::query(&format!(
                r#"
                UPDATE {} SET {}, updated_at = NOW()
                WHERE plant_id = $1 AND id = ANY($2) AND NOT ({})
                "#,
                gate.table(),
                gate.approve_assignment(),
                gate.approved_expr()
            ))
            .bind(plant_id)
            .bind(&report.approved)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            report.ensure_applied(gate.resource(), updated)?;
        }

        tx.commit().await?;

        tracing::info!(
            plant_id = %plant_id,
            resource = gate.resource(),
            approved = report.approved.len(),
            already_approved = report.already_approved.len(),
            "approval applied"
        );

        Ok(report)
    }

    /// Containers waiting for approval
    pub async fn pending_containers(
        &self,
        plant_id: Uuid,
        filter: ContainerFilter,
        sort: Sort<ContainerSort>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Container>> {
        let filter = ContainerFilter {
            approved: Some(false),
            ..filter
        };
        let (data, total) =
            fetch_page(&self.db, "containers", plant_id, &filter, sort, &pagination).await?;
        Ok(PaginatedResponse::new(data, &pagination, total))
    }

    pub async fn approve_containers(
        &self,
        plant_id: Uuid,
        input: BulkApprovalInput,
    ) -> AppResult<ApprovalReport> {
        input.validate()?;
        self.approve(Gate::Container, plant_id, &input.ids, None).await
    }

    /// Approve one container by code
    pub async fn approve_container(
        &self,
        plant_id: Uuid,
        code: &str,
    ) -> AppResult<ApprovalReport> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM containers WHERE plant_id = $1 AND code = $2",
        )
        .bind(plant_id)
        .bind(code)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("container", code))?;

        self.approve(Gate::Container, plant_id, &[id], None).await
    }

    /// Requisitions waiting for approval in stores the user approves for
    pub async fn pending_requisitions(
        &self,
        plant_id: Uuid,
        user_id: Uuid,
        filter: RequisitionFilter,
        sort: Sort<RequisitionSort>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Requisition>> {
        let stores = MasterDataResolver::new(self.db.clone())
            .stores_approvable_by(plant_id, user_id)
            .await?;
        if stores.is_empty() {
            return Ok(PaginatedResponse::new(Vec::new(), &pagination, 0));
        }

        let filter = RequisitionFilter {
            approved: Some(ApprovalState::Waiting),
            store_ids: Some(stores),
            ..filter
        };
        let (data, total) =
            fetch_page(&self.db, "requisitions", plant_id, &filter, sort, &pagination).await?;
        Ok(PaginatedResponse::new(data, &pagination, total))
    }

    /// Approve requisitions; the user must approve for each requisition's store
    pub async fn approve_requisitions(
        &self,
        plant_id: Uuid,
        user_id: Uuid,
        input: BulkApprovalInput,
    ) -> AppResult<ApprovalReport> {
        input.validate()?;
        let stores = MasterDataResolver::new(self.db.clone())
            .stores_approvable_by(plant_id, user_id)
            .await?;
        self.approve(Gate::Requisition, plant_id, &input.ids, Some(&stores))
            .await
    }

    pub async fn approve_requisition(
        &self,
        plant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> AppResult<ApprovalReport> {
        self.approve_requisitions(plant_id, user_id, BulkApprovalInput { ids: vec![id] })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_sql_fragments() {
        assert_eq!(Gate::Container.table(), "containers");
        assert_eq!(Gate::Requisition.table(), "requisitions");
        assert_eq!(Gate::Container.approved_expr(), "approved");
        assert_eq!(Gate::Requisition.approve_assignment(), "approved = 'approved'");
    }

    #[test]
    fn test_bulk_input_requires_ids() {
        let input = BulkApprovalInput { ids: vec![] };
        assert!(input.validate().is_err());
    }
}
