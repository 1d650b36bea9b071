// src/workflow/nodes/order_query.rs
// OrderQueryNode (§4.E.5) — extracts an order number from the user's
// message and reports its status with status-appropriate quick actions.
// With no order number in the message, lists the user's recent orders
// instead. Not streamable (spec.md §4.F).

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::facade::{Order, OrderService, OrderStatus};
use crate::workflow::state::{ConversationState, QuickAction};

const RECENT_ORDERS_PAGE_SIZE: u32 = 5;

lazy_static! {
    static ref ORDER_NO_RE: Regex = Regex::new(r"ORD\d{14}[A-Z0-9]{6}").unwrap();
}

pub struct OrderQueryNode {
    orders: Arc<dyn OrderService>,
}

impl OrderQueryNode {
    pub fn new(orders: Arc<dyn OrderService>) -> Self {
        Self { orders }
    }

    fn status_actions(order: &Order) -> Vec<QuickAction> {
        let data = serde_json::json!({ "order_no": order.order_no });
        match order.status {
            OrderStatus::Pending => vec![QuickAction {
                kind: "order_action".to_string(),
                label: "去支付".to_string(),
                action: "pay_order".to_string(),
                data: Some(data),
                icon: None,
            }],
            OrderStatus::Paid => vec![QuickAction {
                kind: "order_action".to_string(),
                label: "查看物流".to_string(),
                action: "view_logistics".to_string(),
                data: Some(data),
                icon: None,
            }],
            OrderStatus::Shipped => vec![QuickAction {
                kind: "order_action".to_string(),
                label: "查看物流".to_string(),
                action: "view_logistics".to_string(),
                data: Some(data),
                icon: None,
            }],
            OrderStatus::Delivered | OrderStatus::Completed => vec![QuickAction {
                kind: "order_action".to_string(),
                label: "申请售后".to_string(),
                action: "request_refund".to_string(),
                data: Some(data),
                icon: None,
            }],
            OrderStatus::Cancelled | OrderStatus::Refunded => Vec::new(),
        }
    }

    fn status_label(status: OrderStatus) -> &'static str {
        match status {
            OrderStatus::Pending => "待支付",
            OrderStatus::Paid => "已支付",
            OrderStatus::Shipped => "已发货",
            OrderStatus::Delivered => "已送达",
            OrderStatus::Completed => "已完成",
            OrderStatus::Cancelled => "已取消",
            OrderStatus::Refunded => "已退款",
        }
    }

    fn describe(order: &Order) -> String {
        let titles = order.product_titles.join("、");
        let mut lines = vec![format!(
            "订单 {}：{}，共 {:.2} 元，状态：{}。",
            order.order_no,
            titles,
            order.amount,
            Self::status_label(order.status)
        )];
        if let Some(logistics) = &order.logistics_status {
            lines.push(format!("物流：{logistics}"));
        }
        lines.join(" ")
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        if let Some(m) = ORDER_NO_RE.find(&state.user_message) {
            let order_no = m.as_str();
            match self.orders.get(order_no).await {
                Ok(Some(order)) => {
                    state.response = Self::describe(&order);
                    state.quick_actions = Self::status_actions(&order);
                    return;
                }
                Ok(None) => {
                    state.response = format!("没有找到订单号为 {order_no} 的订单，请核对后重试。");
                    state.quick_actions = Vec::new();
                    return;
                }
                Err(e) => {
                    warn!("order_query: lookup failed: {}", e);
                    state.response = crate::error::APOLOGY.to_string();
                    return;
                }
            }
        }

        match self.orders.list(&state.user_id, 1, RECENT_ORDERS_PAGE_SIZE, None).await {
            Ok(page) if !page.items.is_empty() => {
                let listing = page
                    .items
                    .iter()
                    .map(|o| format!("{}（{}）", o.order_no, Self::status_label(o.status)))
                    .collect::<Vec<_>>()
                    .join("\n");
                state.response = format!("没有在消息中找到具体订单号，这是您最近的订单：\n{listing}");
                state.quick_actions = vec![QuickAction {
                    kind: "order_action".to_string(),
                    label: "选择订单".to_string(),
                    action: "select_order".to_string(),
                    data: Some(serde_json::json!({ "orders": page.items.iter().map(|o| &o.order_no).collect::<Vec<_>>() })),
                    icon: None,
                }];
            }
            Ok(_) => {
                state.response = "没有找到您的任何订单记录。".to_string();
                state.quick_actions = Vec::new();
            }
            Err(e) => {
                warn!("order_query: listing failed: {}", e);
                state.response = crate::error::APOLOGY.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::memory::InMemoryOrderService;
    use crate::testing::fixtures::sample_order;

    #[tokio::test]
    async fn known_order_number_returns_status_and_actions() {
        let orders = Arc::new(InMemoryOrderService::new(vec![sample_order()]));
        let node = OrderQueryNode::new(orders);
        let mut state = ConversationState::new(
            "user-1".into(),
            "s".into(),
            "我的订单 ORD20240207123456ABCDEF 到哪了".into(),
            Vec::new(),
        );
        node.execute(&mut state).await;
        assert!(state.response.contains("已发货"));
        assert_eq!(state.quick_actions[0].action, "view_logistics");
    }

    #[tokio::test]
    async fn unknown_order_number_reports_not_found() {
        let orders = Arc::new(InMemoryOrderService::new(vec![sample_order()]));
        let node = OrderQueryNode::new(orders);
        let mut state = ConversationState::new("user-1".into(), "s".into(), "ORD99999999999999ZZZZZZ 呢".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(state.response.contains("没有找到订单号"));
    }

    #[tokio::test]
    async fn no_order_number_lists_recent_orders() {
        let orders = Arc::new(InMemoryOrderService::new(vec![sample_order()]));
        let node = OrderQueryNode::new(orders);
        let mut state = ConversationState::new("user-1".into(), "s".into(), "我的订单怎么样了".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(state.response.contains("ORD20240207123456ABCDEF"));
    }
}
