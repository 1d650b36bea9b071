// src/testing/fixtures.rs
// Sample data used by workflow and facade tests.

use chrono::Utc;

use crate::facade::{Order, OrderStatus, Product};

pub fn sample_order() -> Order {
    Order {
        order_no: "ORD20240207123456ABCDEF".to_string(),
        user_id: "user-1".to_string(),
        status: OrderStatus::Shipped,
        amount: 299.0,
        product_titles: vec!["Vue + SpringBoot 毕业设计".to_string()],
        created_at: Utc::now(),
        logistics_status: Some("运输中".to_string()),
    }
}

pub fn sample_products() -> Vec<Product> {
    vec![
        Product {
            product_id: "p-1".to_string(),
            title: "Python 数据分析毕业设计".to_string(),
            price: 199.0,
            status: "published".to_string(),
            difficulty: Some("medium".to_string()),
            tech_stack: vec!["python".to_string(), "pandas".to_string()],
            rating: 4.7,
            description: "A python-based graduation project with data analysis pipeline.".to_string(),
            inventory: 10,
        },
        Product {
            product_id: "p-2".to_string(),
            title: "Vue + SpringBoot 电商系统".to_string(),
            price: 299.0,
            status: "published".to_string(),
            difficulty: Some("hard".to_string()),
            tech_stack: vec!["vue".to_string(), "springboot".to_string()],
            rating: 4.9,
            description: "Full-stack e-commerce platform.".to_string(),
            inventory: 5,
        },
    ]
}
