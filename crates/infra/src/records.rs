//! Table mappings for every stored type.

use sqlx::PgPool;

use flagplane_account::{Account, AdminAccount, Environment, Project};
use flagplane_core::AggregateRoot;
use flagplane_experiment::Experiment;
use flagplane_push::Push;

use crate::storage::{Record, StorageError, ensure_table};

impl Record for Push {
    const TABLE: &'static str = "pushes";

    fn record_id(&self) -> &str {
        self.id().as_str()
    }

    fn record_version(&self) -> u64 {
        self.version()
    }

    fn is_deleted(&self) -> bool {
        Push::is_deleted(self)
    }
}

impl Record for Experiment {
    const TABLE: &'static str = "experiments";

    fn record_id(&self) -> &str {
        self.id().as_str()
    }

    fn record_version(&self) -> u64 {
        self.version()
    }

    fn is_deleted(&self) -> bool {
        Experiment::is_deleted(self)
    }
}

impl Record for Account {
    const TABLE: &'static str = "accounts";

    fn record_id(&self) -> &str {
        self.id().as_str()
    }

    fn record_version(&self) -> u64 {
        self.version()
    }

    fn is_deleted(&self) -> bool {
        Account::is_deleted(self)
    }
}

impl Record for AdminAccount {
    const TABLE: &'static str = "admin_accounts";

    fn record_id(&self) -> &str {
        AggregateRoot::id(self).as_str()
    }

    fn record_version(&self) -> u64 {
        AggregateRoot::version(self)
    }

    fn is_deleted(&self) -> bool {
        self.account().is_deleted()
    }
}

// Projects and environments are reference data: written once, never versioned.

impl Record for Project {
    const TABLE: &'static str = "projects";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn record_version(&self) -> u64 {
        0
    }

    fn is_deleted(&self) -> bool {
        false
    }
}

impl Record for Environment {
    const TABLE: &'static str = "environments";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn record_version(&self) -> u64 {
        0
    }

    fn is_deleted(&self) -> bool {
        false
    }
}

/// Create every table the services use.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    ensure_table::<Push>(pool).await?;
    ensure_table::<Experiment>(pool).await?;
    ensure_table::<Account>(pool).await?;
    ensure_table::<AdminAccount>(pool).await?;
    ensure_table::<Project>(pool).await?;
    ensure_table::<Environment>(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, InMemoryDatabase, Repository};
    use flagplane_core::TenantId;

    #[tokio::test]
    async fn admin_accounts_and_accounts_use_separate_tables() {
        let db = InMemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();
        conn.create(&TenantId::global(), &AdminAccount::empty("a@example.com"))
            .await
            .unwrap();

        let missing = conn
            .get::<Account>(&TenantId::global(), "a@example.com")
            .await
            .unwrap_err();
        assert_eq!(missing, StorageError::NotFound);
        assert_eq!(db.row_count(AdminAccount::TABLE).unwrap(), 1);
    }
}
