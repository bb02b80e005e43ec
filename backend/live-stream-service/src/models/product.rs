use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MAX_ACTIVE_FEATURED_PRODUCTS: usize = 10;

/// Upper bound for the revenue of a single purchase
pub const MAX_PURCHASE_REVENUE: f64 = 1_000_000.0;

pub fn validate_purchase_revenue(revenue: f64) -> Result<()> {
    if !revenue.is_finite() || !(0.0..=MAX_PURCHASE_REVENUE).contains(&revenue) {
        return Err(AppError::Validation(format!(
            "revenue must be between 0 and {}",
            MAX_PURCHASE_REVENUE
        )));
    }
    Ok(())
}

/// A catalog product pinned to a store stream's overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedProduct {
    pub id: Uuid,
    pub stream_id: Uuid,
    pub product_id: Uuid,
    pub featured_at: DateTime<Utc>,
    /// End marker; `None` while the product is on screen
    pub unfeatured_at: Option<DateTime<Utc>>,
    pub display_position: i32,
    pub display_priority: i32,
    pub view_count: i64,
    pub click_count: i64,
    pub purchase_count: i64,
    pub revenue_generated: f64,
}

impl FeaturedProduct {
    pub fn new(
        stream_id: Uuid,
        product_id: Uuid,
        display_position: i32,
        display_priority: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream_id,
            product_id,
            featured_at: now,
            unfeatured_at: None,
            display_position,
            display_priority,
            view_count: 0,
            click_count: 0,
            purchase_count: 0,
            revenue_generated: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.unfeatured_at.is_none()
    }

    /// Counters only change when every new total is representable
    pub fn apply_event(&mut self, event: ProductEvent) -> Result<()> {
        let overflow = || AppError::Validation("product counters would overflow".to_string());
        match event {
            ProductEvent::View => {
                self.view_count = self.view_count.checked_add(1).ok_or_else(overflow)?;
            }
            ProductEvent::Click => {
                self.click_count = self.click_count.checked_add(1).ok_or_else(overflow)?;
            }
            ProductEvent::Purchase { revenue } => {
                validate_purchase_revenue(revenue)?;
                let revenue_generated = self.revenue_generated + revenue;
                if !revenue_generated.is_finite() {
                    return Err(overflow());
                }
                self.purchase_count = self.purchase_count.checked_add(1).ok_or_else(overflow)?;
                self.revenue_generated = revenue_generated;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProductEvent {
    View,
    Click,
    Purchase { revenue: f64 },
}

impl ProductEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProductEvent::View => "view",
            ProductEvent::Click => "click",
            ProductEvent::Purchase { .. } => "purchase",
        }
    }
}

/// Outcome of the atomic count-then-insert on a stream's active features
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureInsert {
    Inserted(FeaturedProduct),
    AtCapacity { current: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Priority,
    Revenue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductPerformance {
    pub conversion_rate: f64,
    pub click_through_rate: f64,
    pub average_order_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeaturedProductView {
    #[serde(flatten)]
    pub product: FeaturedProduct,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<ProductPerformance>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revenue_total_stays_finite() {
        let mut product = FeaturedProduct::new(Uuid::new_v4(), Uuid::new_v4(), 0, 0, Utc::now());
        product.revenue_generated = f64::MAX;
        product.purchase_count = 7;

        let oversized = product.apply_event(ProductEvent::Purchase { revenue: 1e308 });
        assert!(matches!(oversized, Err(AppError::Validation(_))));
        assert_eq!(product.purchase_count, 7);
        assert_eq!(product.revenue_generated, f64::MAX);

        product
            .apply_event(ProductEvent::Purchase {
                revenue: MAX_PURCHASE_REVENUE,
            })
            .unwrap();
        assert!(product.revenue_generated.is_finite());
        assert_eq!(product.purchase_count, 8);
    }

    #[test]
    fn test_purchase_updates_counters() {
        let mut product = FeaturedProduct::new(Uuid::new_v4(), Uuid::new_v4(), 0, 0, Utc::now());
        product.apply_event(ProductEvent::View).unwrap();
        product.apply_event(ProductEvent::Click).unwrap();
        product
            .apply_event(ProductEvent::Purchase { revenue: 12.5 })
            .unwrap();
        assert_eq!(
            (product.view_count, product.click_count, product.purchase_count),
            (1, 1, 1)
        );
        assert_eq!(product.revenue_generated, 12.5);
    }
}
