// src/facade/mod.rs
// External-data Facade (§4.J, §6) — narrow interfaces the core consumes.
// The real collaborators (cart/order/review CRUD, SQL models, auth) are an
// explicit non-goal; this module only defines the traits the workflow nodes
// and tools depend on, plus one lightweight in-memory implementation of
// each so the crate runs standalone and tests can exercise the full graph.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_no: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub amount: f64,
    pub product_titles: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub logistics_status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub title: String,
    pub price: f64,
    pub status: String,
    pub difficulty: Option<String>,
    pub tech_stack: Vec<String>,
    pub rating: f32,
    pub description: String,
    pub inventory: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechInterest {
    pub tech: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInterest {
    pub category_id: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInterests {
    pub tech_stack: Vec<TechInterest>,
    pub categories: Vec<CategoryInterest>,
}

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn list(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
        status: Option<OrderStatus>,
    ) -> anyhow::Result<OrderPage>;

    async fn get(&self, order_no: &str) -> anyhow::Result<Option<Order>>;
}

#[derive(Debug, Clone, Default)]
pub struct ProductSearchParams {
    pub keyword: Option<String>,
    pub status: Option<String>,
    pub max_price: Option<f64>,
    pub difficulty: Option<String>,
    pub tech_stack: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[async_trait]
pub trait ProductService: Send + Sync {
    async fn search(&self, params: ProductSearchParams) -> anyhow::Result<ProductPage>;
    async fn get(&self, product_id: &str) -> anyhow::Result<Option<Product>>;
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn get(&self, user_id: &str) -> anyhow::Result<Option<User>>;
}

#[async_trait]
pub trait BrowseService: Send + Sync {
    async fn get_user_interests(&self, user_id: &str) -> anyhow::Result<UserInterests>;
}

#[async_trait]
pub trait RecommendationService: Send + Sync {
    async fn get_personalized(
        &self,
        user_id: &str,
        limit: usize,
        exclude: Option<Vec<String>>,
    ) -> anyhow::Result<Vec<Product>>;
}

#[async_trait]
pub trait AttachmentService: Send + Sync {
    async fn extract_text(&self, file_path: &str) -> anyhow::Result<String>;
}
