use async_trait::async_trait;
use chrono::Utc;
use dashboard_engine::{sort_chronologically, ReportingWindow};
use models::{Client, ClientPatch, ClientStatus, Manager, MetricRecord, NewClient, StoredMetric};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ApiError, Result};

/// Storage collaborator for clients, managers and metric rows.
/// Implementations may be file-backed or talk to a hosted database.
#[async_trait]
pub trait StorageRepository: Send + Sync {
    /// Validates, assigns an id and stores the record.
    async fn create_metric(&self, record: MetricRecord) -> Result<MetricRecord>;
    /// The client's rows inside `window`, ascending by (period, date).
    async fn list_metrics(
        &self,
        client_id: &str,
        window: &ReportingWindow,
    ) -> Result<Vec<MetricRecord>>;
    /// Newest first.
    async fn list_clients(&self) -> Result<Vec<Client>>;
    async fn get_client(&self, id: &str) -> Result<Client>;
    async fn client_by_user(&self, user_id: &str) -> Result<Option<Client>>;
    async fn create_client(&self, new: NewClient, user_id: &str) -> Result<Client>;
    async fn update_client(&self, id: &str, patch: ClientPatch) -> Result<Client>;
    /// Sorted by name.
    async fn list_managers(&self) -> Result<Vec<Manager>>;
}

/// On-disk layout. Metric rows of the first schema are accepted and migrated
/// on load; writes always use the current schema.
#[derive(Debug, Default, Deserialize)]
struct DatabaseFile {
    #[serde(default)]
    clients: Vec<Client>,
    #[serde(default)]
    managers: Vec<Manager>,
    #[serde(default)]
    metrics: Vec<StoredMetric>,
}

#[derive(Debug, Default, Clone, Serialize)]
struct Database {
    clients: Vec<Client>,
    managers: Vec<Manager>,
    metrics: Vec<MetricRecord>,
}

impl From<DatabaseFile> for Database {
    fn from(file: DatabaseFile) -> Self {
        Self {
            clients: file.clients,
            managers: file.managers,
            metrics: file
                .metrics
                .into_iter()
                .map(StoredMetric::into_current)
                .collect(),
        }
    }
}

/// JSON document database. Keeps everything in memory and rewrites the file
/// after each change; purely in-memory when constructed without a path.
pub struct JsonFileRepository {
    path: Option<PathBuf>,
    db: Arc<RwLock<Database>>,
}

impl JsonFileRepository {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            db: Arc::new(RwLock::new(Database::default())),
        }
    }

    /// Opens `path`, starting empty when the file does not exist yet.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            let file: DatabaseFile = serde_json::from_str(&content)?;
            Database::from(file)
        } else {
            tracing::info!("database file {} not found, starting empty", path.display());
            Database::default()
        };
        Ok(Self {
            path: Some(path),
            db: Arc::new(RwLock::new(db)),
        })
    }

    pub async fn add_manager(&self, name: &str, email: Option<String>) -> Result<Manager> {
        let now = Utc::now();
        let manager = Manager {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email,
            phone: None,
            created_at: now,
            updated_at: now,
        };
        let mut db = self.db.write().await;
        let mut next = db.clone();
        next.managers.push(manager.clone());
        self.commit(&mut db, next).await?;
        Ok(manager)
    }

    /// Writes `next` to disk and only then makes it the in-memory state, so a
    /// failed write leaves both unchanged.
    async fn commit(&self, db: &mut Database, next: Database) -> Result<()> {
        self.persist(&next).await?;
        *db = next;
        Ok(())
    }

    async fn persist(&self, db: &Database) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(db)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageRepository for JsonFileRepository {
    async fn create_metric(&self, mut record: MetricRecord) -> Result<MetricRecord> {
        record.validate()?;
        let mut db = self.db.write().await;
        if !db.clients.iter().any(|c| c.id == record.client_id) {
            return Err(ApiError::ClientNotFound(record.client_id));
        }
        record.id = Some(uuid::Uuid::new_v4().to_string());
        let mut next = db.clone();
        next.metrics.push(record.clone());
        self.commit(&mut db, next).await?;
        tracing::info!(
            client_id = %record.client_id,
            period = %record.period_type,
            "metric record stored"
        );
        Ok(record)
    }

    async fn list_metrics(
        &self,
        client_id: &str,
        window: &ReportingWindow,
    ) -> Result<Vec<MetricRecord>> {
        let db = self.db.read().await;
        let mut rows: Vec<MetricRecord> = db
            .metrics
            .iter()
            .filter(|r| r.client_id == client_id && window.contains(&r.period_type))
            .cloned()
            .collect();
        sort_chronologically(&mut rows);
        Ok(rows)
    }

    async fn list_clients(&self) -> Result<Vec<Client>> {
        let db = self.db.read().await;
        let mut clients = db.clients.clone();
        clients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(clients)
    }

    async fn get_client(&self, id: &str) -> Result<Client> {
        let db = self.db.read().await;
        db.clients
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| ApiError::ClientNotFound(id.to_string()))
    }

    async fn client_by_user(&self, user_id: &str) -> Result<Option<Client>> {
        let db = self.db.read().await;
        Ok(db.clients.iter().find(|c| c.user_id == user_id).cloned())
    }

    async fn create_client(&self, new: NewClient, user_id: &str) -> Result<Client> {
        if new.company_name.trim().is_empty() {
            return Err(ApiError::BadRequest("company_name is required".to_string()));
        }
        let now = Utc::now();
        let client = Client {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            company_name: new.company_name,
            client_name: Some(new.client_name),
            manager_name: new.manager_name,
            phone: Some(new.phone),
            email: new.email,
            status: Some(ClientStatus::Active),
            ai_status: None,
            created_at: now,
            updated_at: now,
        };
        let mut db = self.db.write().await;
        let mut next = db.clone();
        next.clients.push(client.clone());
        self.commit(&mut db, next).await?;
        tracing::info!(client_id = %client.id, "client created");
        Ok(client)
    }

    async fn update_client(&self, id: &str, patch: ClientPatch) -> Result<Client> {
        let mut db = self.db.write().await;
        let mut next = db.clone();
        let client = next
            .clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ApiError::ClientNotFound(id.to_string()))?;
        patch.apply(client, Utc::now());
        let updated = client.clone();
        self.commit(&mut db, next).await?;
        Ok(updated)
    }

    async fn list_managers(&self) -> Result<Vec<Manager>> {
        let db = self.db.read().await;
        let mut managers = db.managers.clone();
        managers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(managers)
    }
}
