//! Commerce catalog lookups used before a product can be featured

use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn product_exists(&self, product_id: Uuid) -> Result<bool>;
}

/// Catalog service client: `GET {base_url}/products/{id}`
pub struct HttpProductCatalog {
    client: Client,
    base_url: String,
}

impl HttpProductCatalog {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build catalog client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn product_url(&self, product_id: Uuid) -> String {
        format!("{}/products/{}", self.base_url, product_id)
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    async fn product_exists(&self, product_id: Uuid) -> Result<bool> {
        let url = self.product_url(product_id);
        debug!(%product_id, %url, "Checking product in catalog");

        let response = self.client.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(AppError::Upstream(format!(
                "catalog returned {} for product {}",
                status, product_id
            ))),
        }
    }
}

/// Fixed catalog for local runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticProductCatalog {
    known: Option<HashSet<Uuid>>,
}

impl StaticProductCatalog {
    /// Every product id exists
    pub fn allow_all() -> Self {
        Self { known: None }
    }

    pub fn with_products(products: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            known: Some(products.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ProductCatalog for StaticProductCatalog {
    async fn product_exists(&self, product_id: Uuid) -> Result<bool> {
        Ok(self
            .known
            .as_ref()
            .map_or(true, |known| known.contains(&product_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_catalog_lookup() {
        let known = Uuid::new_v4();
        let catalog = StaticProductCatalog::with_products([known]);
        assert!(tokio_test::block_on(catalog.product_exists(known)).unwrap());
        assert!(!tokio_test::block_on(catalog.product_exists(Uuid::new_v4())).unwrap());

        let open = StaticProductCatalog::allow_all();
        assert!(tokio_test::block_on(open.product_exists(Uuid::new_v4())).unwrap());
    }

    #[test]
    fn test_product_url_strips_trailing_slash() {
        let catalog =
            HttpProductCatalog::new("http://catalog:8080/api/v1/", Duration::from_secs(2)).unwrap();
        let id = Uuid::nil();
        assert_eq!(
            catalog.product_url(id),
            format!("http://catalog:8080/api/v1/products/{}", id)
        );
    }
}
