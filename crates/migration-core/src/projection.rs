//! 试运行用的 schema 投影
//!
//! 在真实 schema 之上叠加已规划步骤的效果，使后续迁移的判断
//! 能看到前面迁移将要创建的表和列

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use nobal_errors::AppResult;
use nobal_ports::{ColumnInfo, SchemaInspector};

use crate::report::PlannedAction;
use crate::schema::ColumnDef;
use crate::step::Step;

#[derive(Debug, Default)]
struct ProjectedTable {
    created: bool,
    columns: HashMap<String, ColumnInfo>,
    indexes: HashSet<String>,
    foreign_keys: HashSet<String>,
    dropped_foreign_keys: HashSet<String>,
}

pub(crate) struct Projection<'a> {
    base: &'a dyn SchemaInspector,
    tables: HashMap<String, ProjectedTable>,
}

fn column_info(column: &ColumnDef) -> ColumnInfo {
    ColumnInfo {
        name: column.name.clone(),
        column_type: column.sql_type.clone(),
        nullable: column.nullable,
        default: None,
    }
}

impl<'a> Projection<'a> {
    pub(crate) fn new(base: &'a dyn SchemaInspector) -> Self {
        Self {
            base,
            tables: HashMap::new(),
        }
    }

    fn table_mut(&mut self, table: &str) -> &mut ProjectedTable {
        self.tables.entry(table.to_string()).or_default()
    }

    /// 记录步骤将产生的效果
    pub(crate) fn record(&mut self, step: &Step, action: &PlannedAction) {
        let degraded = match action {
            PlannedAction::WillApply => false,
            PlannedAction::WillDegrade { .. } => true,
            PlannedAction::AlreadyPresent | PlannedAction::WillFail { .. } => return,
        };

        match step {
            Step::CreateTable(def) => {
                let table = self.table_mut(&def.name);
                table.created = true;
                for column in &def.columns {
                    table
                        .columns
                        .insert(column.name.to_ascii_lowercase(), column_info(column));
                }
                table.indexes.extend(def.indexes.iter().map(|i| i.name.clone()));
                if !degraded {
                    table
                        .foreign_keys
                        .extend(def.foreign_keys.iter().map(|fk| fk.name.clone()));
                }
            }
            Step::AddColumn { table, column } | Step::ModifyColumn { table, column } => {
                self.table_mut(table)
                    .columns
                    .insert(column.name.to_ascii_lowercase(), column_info(column));
            }
            Step::AddReferencingColumn {
                table,
                column,
                foreign_key,
            } => {
                let table = self.table_mut(table);
                table
                    .columns
                    .insert(column.name.to_ascii_lowercase(), column_info(column));
                if !degraded {
                    table.foreign_keys.insert(foreign_key.name.clone());
                }
            }
            Step::CreateIndex { table, index } => {
                self.table_mut(table).indexes.insert(index.name.clone());
            }
            Step::AddForeignKey { table, foreign_key } => {
                if !degraded {
                    let table = self.table_mut(table);
                    table.dropped_foreign_keys.remove(&foreign_key.name);
                    table.foreign_keys.insert(foreign_key.name.clone());
                }
            }
            Step::DropForeignKey { table, name } => {
                let table = self.table_mut(table);
                table.foreign_keys.remove(name);
                table.dropped_foreign_keys.insert(name.clone());
            }
            Step::Execute { .. } => {}
        }
    }
}

#[async_trait]
impl SchemaInspector for Projection<'_> {
    async fn table_exists(&self, table: &str) -> AppResult<bool> {
        if self.tables.get(table).is_some_and(|t| t.created) {
            return Ok(true);
        }
        self.base.table_exists(table).await
    }

    async fn column(&self, table: &str, column: &str) -> AppResult<Option<ColumnInfo>> {
        if let Some(projected) = self.tables.get(table) {
            if let Some(info) = projected.columns.get(&column.to_ascii_lowercase()) {
                return Ok(Some(info.clone()));
            }
            if projected.created {
                return Ok(None);
            }
        }
        self.base.column(table, column).await
    }

    async fn index_exists(&self, table: &str, index: &str) -> AppResult<bool> {
        if let Some(projected) = self.tables.get(table) {
            if projected.indexes.contains(index) {
                return Ok(true);
            }
            if projected.created {
                return Ok(false);
            }
        }
        self.base.index_exists(table, index).await
    }

    async fn foreign_key_exists(&self, table: &str, constraint: &str) -> AppResult<bool> {
        if let Some(projected) = self.tables.get(table) {
            if projected.foreign_keys.contains(constraint) {
                return Ok(true);
            }
            if projected.created || projected.dropped_foreign_keys.contains(constraint) {
                return Ok(false);
            }
        }
        self.base.foreign_key_exists(table, constraint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKeyDef, TableDef};
    use crate::testing::FakeDatabase;

    #[tokio::test]
    async fn test_projection_sees_planned_tables() {
        let db = FakeDatabase::new().with_table("item", &[("item_code", "varchar(100)")]);
        let mut projection = Projection::new(&db);

        let create = Step::create_table(
            TableDef::new("bom")
                .column(ColumnDef::new("bom_id", "VARCHAR(50)").not_null())
                .column(ColumnDef::new("item_code", "VARCHAR(100)"))
                .foreign_key(ForeignKeyDef::new("fk_bom_item", "item_code", "item", "item_code")),
        );
        let action = create.plan(&projection).await.unwrap();
        assert_eq!(action, PlannedAction::WillApply);
        projection.record(&create, &action);

        let add = Step::add_column("bom", ColumnDef::new("revision", "INT"));
        assert_eq!(add.plan(&projection).await.unwrap(), PlannedAction::WillApply);
        assert!(projection.foreign_key_exists("bom", "fk_bom_item").await.unwrap());
        assert!(db.table("bom").is_none());
    }

    #[tokio::test]
    async fn test_projection_tracks_dropped_foreign_keys() {
        let db = FakeDatabase::new()
            .with_table("selling_customer", &[("customer_id", "varchar(50)")])
            .with_table("selling_sales_order", &[("customer_id", "varchar(50)")])
            .with_foreign_key("selling_sales_order", "selling_sales_order_ibfk_1", "selling_customer");
        let mut projection = Projection::new(&db);

        let drop = Step::drop_foreign_key("selling_sales_order", "selling_sales_order_ibfk_1");
        let action = drop.plan(&projection).await.unwrap();
        assert_eq!(action, PlannedAction::WillApply);
        projection.record(&drop, &action);

        let add = Step::add_foreign_key(
            "selling_sales_order",
            ForeignKeyDef::new(
                "selling_sales_order_ibfk_1",
                "customer_id",
                "selling_customer",
                "customer_id",
            ),
        );
        assert_eq!(add.plan(&projection).await.unwrap(), PlannedAction::WillApply);
    }
}
