//! Project and environment catalog.
//!
//! Both tables live in the global scope and are read in full on every call;
//! nothing here caches, so a newly disabled project is excluded immediately.

use async_trait::async_trait;

use flagplane_account::{Environment, Project};
use flagplane_core::TenantId;

use crate::storage::{Database, StorageError, scan_all};

#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError>;

    async fn list_environments(&self) -> Result<Vec<Environment>, StorageError>;
}

#[async_trait]
impl<T> ProjectDirectory for std::sync::Arc<T>
where
    T: ProjectDirectory + ?Sized,
{
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        (**self).list_projects().await
    }

    async fn list_environments(&self) -> Result<Vec<Environment>, StorageError> {
        (**self).list_environments().await
    }
}

/// Directory backed by the `projects` and `environments` tables.
#[derive(Debug, Clone)]
pub struct StorageDirectory<D> {
    db: D,
}

impl<D: Database> StorageDirectory<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }
}

#[async_trait]
impl<D: Database> ProjectDirectory for StorageDirectory<D> {
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        let mut conn = self.db.connection().await?;
        scan_all(&mut conn, &TenantId::global(), &[]).await
    }

    async fn list_environments(&self) -> Result<Vec<Environment>, StorageError> {
        let mut conn = self.db.connection().await?;
        scan_all(&mut conn, &TenantId::global(), &[]).await
    }
}
