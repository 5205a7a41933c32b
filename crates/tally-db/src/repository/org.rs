//! Branches and suppliers. Reference data the ledger and receipt workflow
//! validate against; full CRUD lives with the back-office tooling, not here.

use sqlx::SqlitePool;

use tally_core::{Branch, Supplier};

use crate::error::DbResult;

/// Repository for branch and supplier reference data.
#[derive(Debug, Clone)]
pub struct OrgRepository {
    pool: SqlitePool,
}

impl OrgRepository {
    /// Creates a new OrgRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrgRepository { pool }
    }

    /// Inserts a branch.
    pub async fn insert_branch(&self, branch: &Branch) -> DbResult<Branch> {
        sqlx::query(
            "INSERT INTO branches (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&branch.id)
        .bind(&branch.name)
        .bind(branch.is_active)
        .bind(branch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(branch.clone())
    }

    /// Gets a branch by ID.
    pub async fn get_branch(&self, id: &str) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as::<_, Branch>(
            "SELECT id, name, is_active, created_at FROM branches WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(branch)
    }

    /// Lists active branches.
    pub async fn list_branches(&self) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(
            "SELECT id, name, is_active, created_at FROM branches WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(branches)
    }

    /// Inserts a supplier.
    pub async fn insert_supplier(&self, supplier: &Supplier) -> DbResult<Supplier> {
        sqlx::query(
            "INSERT INTO suppliers (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(supplier.is_active)
        .bind(supplier.created_at)
        .execute(&self.pool)
        .await?;

        Ok(supplier.clone())
    }

    /// Gets a supplier by ID.
    pub async fn get_supplier(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, is_active, created_at FROM suppliers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(supplier)
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use crate::testutil;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let org = db.org();

        let branch_id = testutil::seed_branch(&db, "Main").await;
        let supplier_id = testutil::seed_supplier(&db, "Acme").await;

        assert_eq!(org.get_branch(&branch_id).await.unwrap().unwrap().name, "Main");
        assert_eq!(
            org.get_supplier(&supplier_id).await.unwrap().unwrap().name,
            "Acme"
        );
        assert_eq!(org.list_branches().await.unwrap().len(), 1);
    }
}
