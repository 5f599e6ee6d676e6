//! Shared test doubles: an in-memory store implementing every repository, and scripted
//! rasterizers. Nothing here needs Postgres or Chromium.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;

use poster_gen_server::auth::model::{User, ROLE_ADMIN, ROLE_USER};
use poster_gen_server::auth::UserRepository;
use poster_gen_server::catalog::model::{
    CreateAssetRequest, CreateTemplateRequest, UpdateTemplateRequest,
};
use poster_gen_server::order::model::{NewOrder, Order, UpdateOrderRequest};
use poster_gen_server::order::OrderRepository;
use poster_gen_server::poster::model::{Asset, Layout, NewPoster, Poster, Template};
use poster_gen_server::poster::{
    AssetRepository, LayoutRepository, PosterRepository, RasterError, Rasterizer,
    TemplateRepository,
};
use poster_gen_server::storage::ArtifactKind;
use poster_gen_server::{AppConfig, AppError, AppState, Repositories};

pub const FAKE_PDF: &[u8] = b"%PDF-1.7 fake poster";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    revoked: Vec<(String, DateTime<Utc>)>,
    orders: Vec<Order>,
    layouts: Vec<Layout>,
    templates: Vec<Template>,
    assets: Vec<Asset>,
    posters: Vec<Poster>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn layout_path(&self, layout_id: i64) -> String {
        self.layouts
            .iter()
            .find(|l| l.id == layout_id)
            .map(|l| l.file_path.clone())
            .unwrap_or_default()
    }
}

/// In-memory stand-in for every Postgres repository.
#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
    /// When set, `PosterRepository::create` fails with a database-class error.
    pub fail_poster_insert: Mutex<bool>,
}

impl InMemoryDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            users: self.clone(),
            orders: self.clone(),
            templates: self.clone(),
            layouts: self.clone(),
            assets: self.clone(),
            posters: self.clone(),
        }
    }

    pub fn insert_layout(&self, name: &str, file_path: &str) -> Layout {
        let mut tables = self.tables.lock();
        let layout = Layout {
            id: tables.next_id(),
            name: name.to_string(),
            file_path: file_path.to_string(),
            created_at: Utc::now(),
        };
        tables.layouts.push(layout.clone());
        layout
    }

    pub fn insert_template(
        &self,
        layout: &Layout,
        required_fields: Value,
        default_customization: Value,
    ) -> Template {
        let mut tables = self.tables.lock();
        let template = Template {
            id: tables.next_id(),
            name: "Test Template".to_string(),
            template_type: "standard".to_string(),
            layout_id: layout.id,
            layout_file_path: layout.file_path.clone(),
            price: 0,
            thumbnail_url: None,
            is_active: true,
            required_fields,
            default_customization,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.templates.push(template.clone());
        template
    }

    pub fn set_template_active(&self, id: i64, active: bool) {
        let mut tables = self.tables.lock();
        if let Some(t) = tables.templates.iter_mut().find(|t| t.id == id) {
            t.is_active = active;
        }
    }

    pub fn insert_asset(&self, asset_type: &str, data: &str, default_color: Option<&str>) -> Asset {
        let mut tables = self.tables.lock();
        let asset = Asset {
            id: tables.next_id(),
            name: format!("{} asset", asset_type),
            asset_type: asset_type.to_string(),
            data: data.to_string(),
            default_color: default_color.map(str::to_string),
            created_at: Utc::now(),
        };
        tables.assets.push(asset.clone());
        asset
    }

    pub fn insert_user(&self, email: &str, role: &str) -> User {
        let mut tables = self.tables.lock();
        let user = User {
            id: tables.next_id(),
            email: email.to_string(),
            password_hash: bcrypt::hash("correct-horse", 4).unwrap(),
            role: role.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        tables.users.push(user.clone());
        user
    }

    /// Stored row for `id`, soft-deleted or not.
    pub fn stored_user(&self, id: i64) -> Option<User> {
        self.tables.lock().users.iter().find(|u| u.id == id).cloned()
    }

    pub fn posters(&self) -> Vec<Poster> {
        self.tables.lock().posters.clone()
    }

    pub fn poster_count(&self) -> usize {
        self.tables.lock().posters.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryDb {
    async fn register(&self, email: &str, password_hash: &str) -> Result<User, AppError> {
        let mut tables = self.tables.lock();
        if tables.users.iter().any(|u| u.email == email) {
            return Err(AppError::Conflict("record already exists".to_string()));
        }
        let role = if tables.users.is_empty() {
            ROLE_ADMIN
        } else {
            ROLE_USER
        };
        let user = User {
            id: tables.next_id(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .tables
            .lock()
            .users
            .iter()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self
            .tables
            .lock()
            .users
            .iter()
            .find(|u| u.id == id && u.deleted_at.is_none())
            .cloned())
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), AppError> {
        let tables = self.tables.lock();
        let active: Vec<&User> = tables.users.iter().filter(|u| u.deleted_at.is_none()).collect();
        let page = active
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|u| (*u).clone())
            .collect();
        Ok((page, active.len() as i64))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError> {
        let mut tables = self.tables.lock();
        match tables
            .users
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
        {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.lock();
        match tables
            .users
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
        {
            Some(user) => {
                user.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn restore(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.lock();
        match tables
            .users
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_some())
        {
            Some(user) => {
                user.deleted_at = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_token(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        self.tables.lock().revoked.push((jti.to_string(), expires_at));
        Ok(())
    }

    async fn is_token_revoked(&self, jti: &str) -> Result<bool, AppError> {
        let now = Utc::now();
        Ok(self
            .tables
            .lock()
            .revoked
            .iter()
            .any(|(id, expires)| id == jti && *expires > now))
    }
}

#[async_trait]
impl OrderRepository for InMemoryDb {
    async fn create(&self, order: NewOrder) -> Result<Order, AppError> {
        let mut tables = self.tables.lock();
        let order = Order {
            id: tables.next_id(),
            user_id: order.user_id,
            order_number: order.order_number,
            total_amount: order.total_amount,
            status: order.status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.orders.push(order.clone());
        Ok(order)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>, AppError> {
        Ok(self.tables.lock().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn update(&self, id: i64, changes: &UpdateOrderRequest) -> Result<Option<Order>, AppError> {
        let mut tables = self.tables.lock();
        Ok(tables.orders.iter_mut().find(|o| o.id == id).map(|order| {
            if let Some(amount) = changes.total_amount {
                order.total_amount = amount;
            }
            if let Some(status) = &changes.status {
                order.status = status.clone();
            }
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.lock();
        let before = tables.orders.len();
        tables.orders.retain(|o| o.id != id);
        Ok(tables.orders.len() < before)
    }
}

#[async_trait]
impl TemplateRepository for InMemoryDb {
    async fn get_by_id(&self, id: i64) -> Result<Option<Template>, AppError> {
        Ok(self.tables.lock().templates.iter().find(|t| t.id == id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Template>, AppError> {
        Ok(self
            .tables
            .lock()
            .templates
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn create(&self, request: &CreateTemplateRequest) -> Result<Template, AppError> {
        let mut tables = self.tables.lock();
        let template = Template {
            id: tables.next_id(),
            name: request.name.clone(),
            template_type: request.template_type.clone(),
            layout_id: request.layout_id,
            layout_file_path: tables.layout_path(request.layout_id),
            price: request.price,
            thumbnail_url: request.thumbnail_url.clone(),
            is_active: request.is_active,
            required_fields: request.required_fields.clone(),
            default_customization: request.default_customization.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.templates.push(template.clone());
        Ok(template)
    }

    async fn update(
        &self,
        id: i64,
        request: &UpdateTemplateRequest,
    ) -> Result<Option<Template>, AppError> {
        let mut tables = self.tables.lock();
        let layout_path = request.layout_id.map(|layout_id| tables.layout_path(layout_id));
        Ok(tables.templates.iter_mut().find(|t| t.id == id).map(|t| {
            if let Some(name) = &request.name {
                t.name = name.clone();
            }
            if let Some(kind) = &request.template_type {
                t.template_type = kind.clone();
            }
            if let (Some(layout_id), Some(path)) = (request.layout_id, layout_path) {
                t.layout_id = layout_id;
                t.layout_file_path = path;
            }
            if let Some(price) = request.price {
                t.price = price;
            }
            if let Some(url) = &request.thumbnail_url {
                t.thumbnail_url = Some(url.clone());
            }
            if let Some(active) = request.is_active {
                t.is_active = active;
            }
            if let Some(fields) = &request.required_fields {
                t.required_fields = fields.clone();
            }
            if let Some(customization) = &request.default_customization {
                t.default_customization = customization.clone();
            }
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.lock();
        if tables.posters.iter().any(|p| p.template_id == id) {
            return Err(AppError::Conflict(
                "record is referenced by other records".to_string(),
            ));
        }
        let before = tables.templates.len();
        tables.templates.retain(|t| t.id != id);
        Ok(tables.templates.len() < before)
    }
}

#[async_trait]
impl LayoutRepository for InMemoryDb {
    async fn create(&self, name: &str, file_path: &str) -> Result<Layout, AppError> {
        Ok(self.insert_layout(name, file_path))
    }

    async fn list(&self) -> Result<Vec<Layout>, AppError> {
        Ok(self.tables.lock().layouts.clone())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Layout>, AppError> {
        Ok(self.tables.lock().layouts.iter().find(|l| l.id == id).cloned())
    }
}

#[async_trait]
impl AssetRepository for InMemoryDb {
    async fn create(&self, request: &CreateAssetRequest) -> Result<Asset, AppError> {
        let mut asset = self.insert_asset(
            &request.asset_type,
            &request.data,
            request.default_color.as_deref(),
        );
        asset.name = request.name.clone();
        let mut tables = self.tables.lock();
        if let Some(stored) = tables.assets.iter_mut().find(|a| a.id == asset.id) {
            stored.name = asset.name.clone();
        }
        Ok(asset)
    }

    async fn list(&self, asset_type: Option<&str>) -> Result<Vec<Asset>, AppError> {
        Ok(self
            .tables
            .lock()
            .assets
            .iter()
            .filter(|a| asset_type.map_or(true, |t| a.asset_type == t))
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Asset>, AppError> {
        Ok(self.tables.lock().assets.iter().find(|a| a.id == id).cloned())
    }
}

#[async_trait]
impl PosterRepository for InMemoryDb {
    async fn create(&self, poster: NewPoster) -> Result<Poster, AppError> {
        if *self.fail_poster_insert.lock() {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut tables = self.tables.lock();
        let poster = Poster {
            id: tables.next_id(),
            template_id: poster.template_id,
            business_name: poster.business_name,
            user_input_data: poster.user_input_data,
            final_customization: poster.final_customization,
            artifact_url: poster.artifact_url,
            status: poster.status,
            created_at: Utc::now(),
        };
        tables.posters.push(poster.clone());
        Ok(poster)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Poster>, AppError> {
        Ok(self.tables.lock().posters.iter().find(|p| p.id == id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.lock();
        let before = tables.posters.len();
        tables.posters.retain(|p| p.id != id);
        Ok(tables.posters.len() < before)
    }
}

/// Records every HTML document it is asked to capture and returns fixed bytes.
#[derive(Default)]
pub struct FakeRasterizer {
    pub calls: AtomicUsize,
    pub last_html: Mutex<Option<String>>,
    pub last_kind: Mutex<Option<ArtifactKind>>,
}

impl FakeRasterizer {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn capture(&self, html: &str, kind: ArtifactKind) -> Result<Vec<u8>, RasterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_html.lock() = Some(html.to_string());
        *self.last_kind.lock() = Some(kind);
        Ok(FAKE_PDF.to_vec())
    }
}

/// Never finishes within any reasonable deadline.
pub struct StalledRasterizer(pub Duration);

#[async_trait]
impl Rasterizer for StalledRasterizer {
    async fn capture(&self, _html: &str, _kind: ArtifactKind) -> Result<Vec<u8>, RasterError> {
        tokio::time::sleep(self.0).await;
        Ok(FAKE_PDF.to_vec())
    }
}

/// Fails the way a crashed browser does.
pub struct BrokenRasterizer;

#[async_trait]
impl Rasterizer for BrokenRasterizer {
    async fn capture(&self, _html: &str, _kind: ArtifactKind) -> Result<Vec<u8>, RasterError> {
        Err(RasterError::Config("browser crashed".to_string()))
    }
}

pub fn test_config(root: &Path, render_timeout: Duration) -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        db_max_connections: 1,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        jwt_secret: "integration-test-secret".to_string(),
        access_token_ttl_secs: 900,
        refresh_token_ttl_secs: 3600,
        templates_dir: root.join("templates"),
        output_dir: root.join("posters"),
        render_timeout,
        render_settle: Duration::from_millis(0),
        chrome_executable: None,
        cors_origins: Vec::new(),
    }
}

/// Everything a pipeline or HTTP test needs, rooted in a scratch directory.
pub struct TestContext {
    pub dir: TempDir,
    pub db: Arc<InMemoryDb>,
    pub config: AppConfig,
    pub state: AppState,
}

impl TestContext {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self::with_timeout(rasterizer, Duration::from_secs(5))
    }

    pub fn with_timeout(rasterizer: Arc<dyn Rasterizer>, render_timeout: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), render_timeout);
        config.ensure_directories().unwrap();

        let db = InMemoryDb::new();
        let state = AppState::from_parts(&config, db.repositories(), rasterizer);
        Self {
            dir,
            db,
            config,
            state,
        }
    }

    pub fn write_layout(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.config.templates_dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Layout file plus a template using it.
    pub fn seed_template(
        &self,
        layout_name: &str,
        layout_contents: &str,
        required_fields: Value,
        default_customization: Value,
    ) -> Template {
        self.write_layout(layout_name, layout_contents);
        let layout = self.db.insert_layout("Layout", layout_name);
        self.db
            .insert_template(&layout, required_fields, default_customization)
    }

    /// The shipped `templates/standard.html` with a phone schema.
    pub fn seed_standard_template(&self) -> Template {
        let contents = std::fs::read_to_string(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("templates/standard.html"),
        )
        .unwrap();
        self.seed_template(
            "standard.html",
            &contents,
            json!([{"name": "phone", "pattern": "^[0-9]{10}$", "label": "Phone"}]),
            json!({}),
        )
    }

    pub fn artifact_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.config.output_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    pub fn token_for(&self, user: &User) -> String {
        self.state.jwt.generate_access_token(user).unwrap()
    }

    pub fn admin_token(&self) -> String {
        let admin = self.db.insert_user("admin@example.com", ROLE_ADMIN);
        self.token_for(&admin)
    }

    pub fn user_token(&self, email: &str) -> (User, String) {
        let user = self.db.insert_user(email, ROLE_USER);
        let token = self.token_for(&user);
        (user, token)
    }
}
