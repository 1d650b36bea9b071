// src/tools/mod.rs
// Tool Registry (§4.D) — the fixed catalogue of callable, side-effecting
// functions the function-calling node may invoke. Each tool delegates to
// the external-data facade and never panics: failures are caught and
// returned as `{success: false, error}`, the registry never throws into
// the caller.

pub mod schema;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::facade::{OrderService, ProductSearchParams, ProductService, RecommendationService, UserService};
use schema::{properties, ToolBuilder};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> Value;
    async fn call(&self, args: Value) -> Value;
}

fn fail(error: impl Into<String>) -> Value {
    json!({ "success": false, "error": error.into() })
}

fn missing_arg(name: &str) -> Value {
    fail(format!("missing required argument: {name}"))
}

struct QueryOrderTool {
    orders: Arc<dyn OrderService>,
}

#[async_trait]
impl Tool for QueryOrderTool {
    fn name(&self) -> &'static str {
        "query_order"
    }

    fn schema(&self) -> Value {
        ToolBuilder::new("query_order", "根据订单号查询一笔订单")
            .param("order_no", properties::string("人类可读的订单号"), true)
            .build()
    }

    async fn call(&self, args: Value) -> Value {
        let Some(order_no) = args.get("order_no").and_then(|v| v.as_str()) else {
            return missing_arg("order_no");
        };
        match self.orders.get(order_no).await {
            Ok(Some(order)) => json!({ "success": true, "order": order }),
            Ok(None) => fail(format!("未找到订单: {order_no}")),
            Err(e) => fail(e.to_string()),
        }
    }
}

struct SearchProductsTool {
    products: Arc<dyn ProductService>,
}

#[async_trait]
impl Tool for SearchProductsTool {
    fn name(&self) -> &'static str {
        "search_products"
    }

    fn schema(&self) -> Value {
        ToolBuilder::new("search_products", "按关键词和过滤条件搜索商品目录")
            .param("keyword", properties::string("搜索关键词"), false)
            .param("max_price", properties::number("最高价格"), false)
            .param("difficulty", properties::string("难度：easy/medium/hard"), false)
            .param("tech_stack", properties::string("技术栈筛选"), false)
            .build()
    }

    async fn call(&self, args: Value) -> Value {
        let params = ProductSearchParams {
            keyword: args.get("keyword").and_then(|v| v.as_str()).map(String::from),
            status: Some("published".to_string()),
            max_price: args.get("max_price").and_then(|v| v.as_f64()),
            difficulty: args.get("difficulty").and_then(|v| v.as_str()).map(String::from),
            tech_stack: args.get("tech_stack").and_then(|v| v.as_str()).map(String::from),
            page: 1,
            page_size: 20,
            sort_by: None,
            order: None,
        };

        match self.products.search(params).await {
            Ok(page) => json!({ "success": true, "products": page.products, "total": page.total }),
            Err(e) => fail(e.to_string()),
        }
    }
}

struct GetUserInfoTool {
    users: Arc<dyn UserService>,
}

#[async_trait]
impl Tool for GetUserInfoTool {
    fn name(&self) -> &'static str {
        "get_user_info"
    }

    fn schema(&self) -> Value {
        ToolBuilder::new("get_user_info", "获取用户身份与资料信息")
            .param("user_id", properties::string("用户 ID"), true)
            .build()
    }

    async fn call(&self, args: Value) -> Value {
        let Some(user_id) = args.get("user_id").and_then(|v| v.as_str()) else {
            return missing_arg("user_id");
        };
        match self.users.get(user_id).await {
            Ok(Some(user)) => json!({ "success": true, "user": user }),
            Ok(None) => fail(format!("未找到用户: {user_id}")),
            Err(e) => fail(e.to_string()),
        }
    }
}

struct CheckInventoryTool {
    products: Arc<dyn ProductService>,
}

#[async_trait]
impl Tool for CheckInventoryTool {
    fn name(&self) -> &'static str {
        "check_inventory"
    }

    fn schema(&self) -> Value {
        ToolBuilder::new("check_inventory", "查询某个商品的库存情况")
            .param("product_id", properties::string("商品 ID"), true)
            .build()
    }

    async fn call(&self, args: Value) -> Value {
        let Some(product_id) = args.get("product_id").and_then(|v| v.as_str()) else {
            return missing_arg("product_id");
        };
        match self.products.get(product_id).await {
            Ok(Some(product)) => json!({
                "success": true,
                "product_id": product.product_id,
                "inventory": product.inventory,
                "in_stock": product.inventory > 0,
            }),
            Ok(None) => fail(format!("未找到商品: {product_id}")),
            Err(e) => fail(e.to_string()),
        }
    }
}

struct GetLogisticsTool {
    orders: Arc<dyn OrderService>,
}

#[async_trait]
impl Tool for GetLogisticsTool {
    fn name(&self) -> &'static str {
        "get_logistics"
    }

    fn schema(&self) -> Value {
        ToolBuilder::new("get_logistics", "查询某笔订单的物流状态")
            .param("order_no", properties::string("订单号"), true)
            .build()
    }

    async fn call(&self, args: Value) -> Value {
        let Some(order_no) = args.get("order_no").and_then(|v| v.as_str()) else {
            return missing_arg("order_no");
        };
        match self.orders.get(order_no).await {
            Ok(Some(order)) => json!({
                "success": true,
                "order_no": order.order_no,
                "status": order.status.as_str(),
                "logistics_status": order.logistics_status,
            }),
            Ok(None) => fail(format!("未找到订单: {order_no}")),
            Err(e) => fail(e.to_string()),
        }
    }
}

struct CalculatePriceTool {
    products: Arc<dyn ProductService>,
}

#[async_trait]
impl Tool for CalculatePriceTool {
    fn name(&self) -> &'static str {
        "calculate_price"
    }

    fn schema(&self) -> Value {
        ToolBuilder::new("calculate_price", "计算一组商品的总价，可选应用优惠码")
            .param("product_ids", properties::string_array("商品 ID 列表"), true)
            .param("coupon_code", properties::string("优惠码（可选）"), false)
            .build()
    }

    async fn call(&self, args: Value) -> Value {
        let Some(ids) = args.get("product_ids").and_then(|v| v.as_array()) else {
            return missing_arg("product_ids");
        };
        let ids: Vec<String> = ids.iter().filter_map(|v| v.as_str().map(String::from)).collect();
        if ids.is_empty() {
            return missing_arg("product_ids");
        }

        let mut subtotal = 0.0;
        let mut missing = Vec::new();
        for id in &ids {
            match self.products.get(id).await {
                Ok(Some(product)) => subtotal += product.price,
                Ok(None) => missing.push(id.clone()),
                Err(e) => return fail(e.to_string()),
            }
        }

        if !missing.is_empty() {
            return fail(format!("未找到商品: {}", missing.join(", ")));
        }

        // A coupon code, when present, applies a flat 10% discount — the
        // source leaves coupon logic unspecified beyond "optional"; this is
        // the simplest rule that exercises the argument (see DESIGN.md).
        let coupon_code = args.get("coupon_code").and_then(|v| v.as_str()).filter(|c| !c.is_empty());
        let discount = if coupon_code.is_some() { subtotal * 0.1 } else { 0.0 };
        let total = subtotal - discount;

        json!({
            "success": true,
            "subtotal": subtotal,
            "discount": discount,
            "total": total,
            "coupon_code": coupon_code,
        })
    }
}

struct GetPersonalizedRecommendationsTool {
    recommendations: Arc<dyn RecommendationService>,
}

#[async_trait]
impl Tool for GetPersonalizedRecommendationsTool {
    fn name(&self) -> &'static str {
        "get_personalized_recommendations"
    }

    fn schema(&self) -> Value {
        ToolBuilder::new("get_personalized_recommendations", "基于用户历史生成个性化推荐")
            .param("user_id", properties::string("用户 ID"), true)
            .param("limit", properties::integer("返回结果数量上限"), true)
            .build()
    }

    async fn call(&self, args: Value) -> Value {
        let Some(user_id) = args.get("user_id").and_then(|v| v.as_str()) else {
            return missing_arg("user_id");
        };
        let limit = args.get("limit").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

        match self.recommendations.get_personalized(user_id, limit, None).await {
            Ok(products) => json!({ "success": true, "products": products }),
            Err(e) => fail(e.to_string()),
        }
    }
}

/// Dispatches tool calls by name. Unknown names degrade to `{success:false,
/// error}` rather than panicking — the same contract every tool upholds.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(
        orders: Arc<dyn OrderService>,
        products: Arc<dyn ProductService>,
        users: Arc<dyn UserService>,
        recommendations: Arc<dyn RecommendationService>,
    ) -> Self {
        let mut tools: HashMap<&'static str, Box<dyn Tool>> = HashMap::new();

        let order_tool: Box<dyn Tool> = Box::new(QueryOrderTool { orders: orders.clone() });
        tools.insert(order_tool.name(), order_tool);

        let search_tool: Box<dyn Tool> = Box::new(SearchProductsTool { products: products.clone() });
        tools.insert(search_tool.name(), search_tool);

        let user_tool: Box<dyn Tool> = Box::new(GetUserInfoTool { users });
        tools.insert(user_tool.name(), user_tool);

        let inventory_tool: Box<dyn Tool> = Box::new(CheckInventoryTool { products: products.clone() });
        tools.insert(inventory_tool.name(), inventory_tool);

        let logistics_tool: Box<dyn Tool> = Box::new(GetLogisticsTool { orders });
        tools.insert(logistics_tool.name(), logistics_tool);

        let price_tool: Box<dyn Tool> = Box::new(CalculatePriceTool { products });
        tools.insert(price_tool.name(), price_tool);

        let recs_tool: Box<dyn Tool> = Box::new(GetPersonalizedRecommendationsTool { recommendations });
        tools.insert(recs_tool.name(), recs_tool);

        Self { tools }
    }

    pub fn schemas(&self) -> Vec<Value> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    /// Invokes the named tool. Never panics: an unknown name or a tool that
    /// fails internally both yield `{success: false, error}`.
    pub async fn call(&self, name: &str, args: Value) -> Value {
        match self.tools.get(name) {
            Some(tool) => tool.call(args).await,
            None => fail(format!("unknown tool: {name}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{sample_order, sample_products};
    use crate::facade::memory::{
        InMemoryOrderService, InMemoryProductService, InMemoryRecommendationService, InMemoryUserService,
    };

    fn registry() -> ToolRegistry {
        ToolRegistry::new(
            Arc::new(InMemoryOrderService::new(vec![sample_order()])),
            Arc::new(InMemoryProductService::new(sample_products())),
            Arc::new(InMemoryUserService::new(vec![])),
            Arc::new(InMemoryRecommendationService::new(sample_products())),
        )
    }

    #[tokio::test]
    async fn unknown_tool_returns_failure_not_panic() {
        let registry = registry();
        let result = registry.call("does_not_exist", json!({})).await;
        assert_eq!(result["success"], json!(false));
    }

    #[tokio::test]
    async fn query_order_missing_arg_fails_gracefully() {
        let registry = registry();
        let result = registry.call("query_order", json!({})).await;
        assert_eq!(result["success"], json!(false));
    }

    #[tokio::test]
    async fn query_order_finds_known_order() {
        let registry = registry();
        let result = registry
            .call("query_order", json!({ "order_no": "ORD20240207123456ABCDEF" }))
            .await;
        assert_eq!(result["success"], json!(true));
    }

    #[tokio::test]
    async fn calculate_price_applies_coupon_discount() {
        let registry = registry();
        let result = registry
            .call(
                "calculate_price",
                json!({ "product_ids": ["p-1"], "coupon_code": "SAVE10" }),
            )
            .await;
        assert_eq!(result["success"], json!(true));
        assert!(result["discount"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn calculate_price_without_coupon_has_no_discount() {
        let registry = registry();
        let result = registry.call("calculate_price", json!({ "product_ids": ["p-1"] })).await;
        assert_eq!(result["discount"], json!(0.0));
    }

    #[test]
    fn schemas_cover_all_seven_canonical_tools() {
        let registry = registry();
        assert_eq!(registry.names().len(), 7);
    }
}
