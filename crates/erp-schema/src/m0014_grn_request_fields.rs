//! 收货申请关联领料申请
//!
//! `material_request` 不存在时只加列不加外键，迁移仍记为已应用

use nobal_migration_core::{ColumnDef, ForeignKeyDef, Migration, ReferentialAction, Step};

pub(crate) fn migration() -> Migration {
    Migration::new(14, "grn_request_fields")
        .description("Department, purpose and material request link on GRN requests")
        .step(Step::add_column(
            "grn_requests",
            ColumnDef::new("department", "VARCHAR(100)"),
        ))
        .step(Step::add_column(
            "grn_requests",
            ColumnDef::new("purpose", "VARCHAR(100)"),
        ))
        .step(Step::add_referencing_column(
            "grn_requests",
            ColumnDef::new("material_request_id", "VARCHAR(50)"),
            ForeignKeyDef::new(
                "fk_grn_requests_material_request",
                "material_request_id",
                "material_request",
                "mr_id",
            )
            .on_delete(ReferentialAction::SetNull),
        ))
}
