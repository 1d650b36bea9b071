// src/facade/memory.rs
// In-memory implementation of the external-data facade traits. Good enough
// to run the crate standalone and to exercise the full workflow graph in
// tests; a real deployment swaps these out for the actual collaborator
// services (out of scope here per spec.md §1).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{
    AttachmentService, BrowseService, CategoryInterest, Order, OrderPage, OrderService,
    OrderStatus, Product, ProductPage, ProductSearchParams, ProductService,
    RecommendationService, TechInterest, User, UserInterests, UserService,
};

pub struct InMemoryOrderService {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderService {
    pub fn new(orders: Vec<Order>) -> Self {
        let map = orders.into_iter().map(|o| (o.order_no.clone(), o)).collect();
        Self {
            orders: RwLock::new(map),
        }
    }

    pub fn insert(&self, order: Order) {
        self.orders.write().unwrap().insert(order.order_no.clone(), order);
    }
}

#[async_trait]
impl OrderService for InMemoryOrderService {
    async fn list(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
        status: Option<OrderStatus>,
    ) -> anyhow::Result<OrderPage> {
        let orders = self.orders.read().unwrap();
        let mut matched: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        matched.sort_by_key(|o| std::cmp::Reverse(o.created_at));

        let total = matched.len();
        let start = ((page.max(1) - 1) * page_size) as usize;
        let items = matched.into_iter().skip(start).take(page_size as usize).collect();

        Ok(OrderPage { items, total })
    }

    async fn get(&self, order_no: &str) -> anyhow::Result<Option<Order>> {
        Ok(self.orders.read().unwrap().get(order_no).cloned())
    }
}

pub struct InMemoryProductService {
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryProductService {
    pub fn new(products: Vec<Product>) -> Self {
        let map = products
            .into_iter()
            .map(|p| (p.product_id.clone(), p))
            .collect();
        Self {
            products: RwLock::new(map),
        }
    }
}

#[async_trait]
impl ProductService for InMemoryProductService {
    async fn search(&self, params: ProductSearchParams) -> anyhow::Result<ProductPage> {
        let products = self.products.read().unwrap();
        let keyword = params.keyword.map(|k| k.to_lowercase());

        let mut matched: Vec<Product> = products
            .values()
            .filter(|p| {
                params
                    .status
                    .as_ref()
                    .is_none_or(|s| &p.status == s)
            })
            .filter(|p| params.max_price.is_none_or(|m| p.price <= m))
            .filter(|p| {
                params
                    .difficulty
                    .as_ref()
                    .is_none_or(|d| p.difficulty.as_deref() == Some(d.as_str()))
            })
            .filter(|p| {
                params.tech_stack.as_ref().is_none_or(|t| {
                    p.tech_stack.iter().any(|ts| ts.eq_ignore_ascii_case(t))
                })
            })
            .filter(|p| {
                keyword.as_ref().is_none_or(|k| {
                    p.title.to_lowercase().contains(k.as_str())
                        || p.description.to_lowercase().contains(k.as_str())
                        || p.tech_stack.iter().any(|ts| ts.to_lowercase().contains(k.as_str()))
                })
            })
            .cloned()
            .collect();

        match params.sort_by.as_deref() {
            Some("price") => matched.sort_by(|a, b| a.price.total_cmp(&b.price)),
            Some("rating") => matched.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
            _ => {}
        }
        if params.order.as_deref() == Some("desc") {
            matched.reverse();
        }

        let total = matched.len();
        let page_size = if params.page_size == 0 { 20 } else { params.page_size };
        let start = ((params.page.max(1) - 1) * page_size) as usize;
        let products = matched.into_iter().skip(start).take(page_size as usize).collect();

        Ok(ProductPage { products, total })
    }

    async fn get(&self, product_id: &str) -> anyhow::Result<Option<Product>> {
        Ok(self.products.read().unwrap().get(product_id).cloned())
    }
}

pub struct InMemoryUserService {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserService {
    pub fn new(users: Vec<User>) -> Self {
        let map = users.into_iter().map(|u| (u.user_id.clone(), u)).collect();
        Self {
            users: RwLock::new(map),
        }
    }
}

#[async_trait]
impl UserService for InMemoryUserService {
    async fn get(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().unwrap().get(user_id).cloned())
    }
}

pub struct InMemoryBrowseService {
    interests: RwLock<HashMap<String, UserInterests>>,
}

impl InMemoryBrowseService {
    pub fn new() -> Self {
        Self {
            interests: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_interests(&self, user_id: &str, tech_stack: Vec<(&str, u32)>, categories: Vec<(&str, u32)>) {
        self.interests.write().unwrap().insert(
            user_id.to_string(),
            UserInterests {
                tech_stack: tech_stack
                    .into_iter()
                    .map(|(tech, count)| TechInterest { tech: tech.to_string(), count })
                    .collect(),
                categories: categories
                    .into_iter()
                    .map(|(category_id, count)| CategoryInterest { category_id: category_id.to_string(), count })
                    .collect(),
            },
        );
    }
}

impl Default for InMemoryBrowseService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowseService for InMemoryBrowseService {
    async fn get_user_interests(&self, user_id: &str) -> anyhow::Result<UserInterests> {
        Ok(self.interests.read().unwrap().get(user_id).cloned().unwrap_or_default())
    }
}

pub struct InMemoryRecommendationService {
    products: RwLock<Vec<Product>>,
}

impl InMemoryRecommendationService {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: RwLock::new(products),
        }
    }
}

#[async_trait]
impl RecommendationService for InMemoryRecommendationService {
    async fn get_personalized(
        &self,
        _user_id: &str,
        limit: usize,
        exclude: Option<Vec<String>>,
    ) -> anyhow::Result<Vec<Product>> {
        let excluded = exclude.unwrap_or_default();
        Ok(self
            .products
            .read()
            .unwrap()
            .iter()
            .filter(|p| !excluded.contains(&p.product_id))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Reads attachment text straight off disk. Format-specific extraction
/// (PDF, DOCX, …) is deliberately out of scope — file upload plumbing is a
/// non-goal (spec.md §1) — so this treats every attachment as plain text.
pub struct FileAttachmentService;

#[async_trait]
impl AttachmentService for FileAttachmentService {
    async fn extract_text(&self, file_path: &str) -> anyhow::Result<String> {
        let bytes = tokio::fs::read(file_path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
