//! Product repository.
//!
//! Three operations over a [`DocumentStore`] container: insert, point read, and price update
//! with history append. Every store failure is mapped onto [`RepositoryError`] and logged
//! once, where the mapping happens.

use crate::{
    clock::{Clock, SystemClock},
    config::RepositoryConfig,
    error::RepositoryError,
    product::{self, NewProduct, Product},
    store::{DocumentClient, DocumentStore, ReplaceGuard, RequestContext, StoreError, StoredDocument},
};

use rust_decimal::Decimal;
use serde_json::Value;
use tokio::time;
use uuid::Uuid;

/// A product read back from the store with the etag of that version.
struct Versioned {
    product: Product,
    etag: Option<String>,
}

/// Serialize `product` with `id` as the text of both identity attributes.
fn encode(product: &Product, id: &str) -> Result<Value, RepositoryError> {
    let mut body = serde_json::to_value(product).map_err(|err| {
        RepositoryError::InvalidDocument {
            product_id: id.to_string(),
            reason: err.to_string(),
        }
    })?;
    if let Some(object) = body.as_object_mut() {
        for attribute in ["id", "productId"] {
            object.insert(attribute.to_string(), Value::String(id.to_string()));
        }
    }
    Ok(body)
}

fn decode(document: StoredDocument, product_id: &str) -> Result<Versioned, RepositoryError> {
    let invalid = |reason: String| RepositoryError::InvalidDocument {
        product_id: product_id.to_string(),
        reason,
    };
    let product: Product =
        serde_json::from_value(document.body).map_err(|err| invalid(err.to_string()))?;
    product.check().map_err(invalid)?;
    Ok(Versioned {
        product,
        etag: document.etag,
    })
}

/// Repository of product documents, partitioned by `categoryName`.
///
/// ```rust,no_run
/// use product_store::{
///     config::RepositoryConfig,
///     product::NewProduct,
///     repository::ProductRepository,
///     store::{RequestContext, memory::MemoryClient},
/// };
/// use rust_decimal::Decimal;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = MemoryClient::default();
/// let repository = ProductRepository::connect(&client, RepositoryConfig::default())?;
/// let ctx = RequestContext::default();
/// let product = repository
///     .insert_product(
///         NewProduct {
///             name: "UnSmart Phone".to_string(),
///             category_name: "Devices, Smartphones".to_string(),
///             current_price: Decimal::new(9993, 2),
///             ..Default::default()
///         },
///         &ctx,
///     )
///     .await?;
/// let id = product.id.to_string();
/// let updated = repository
///     .update_product_price("Devices, Smartphones", &id, Decimal::new(7999, 2), &ctx)
///     .await?;
/// assert_eq!(updated.price_history.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ProductRepository<S, C = SystemClock> {
    container: S,
    clock: C,
    config: RepositoryConfig,
}

impl<S: DocumentStore> ProductRepository<S> {
    /// Repository over `container` with the default settings.
    pub fn new(container: S) -> Self {
        Self {
            container,
            clock: SystemClock,
            config: RepositoryConfig::default(),
        }
    }

    /// Repository over `container` with the given settings.
    pub fn with_config(container: S, config: RepositoryConfig) -> Result<Self, RepositoryError> {
        config.validate()?;
        Ok(Self {
            container,
            clock: SystemClock,
            config,
        })
    }

    /// Repository over the container named by `config`, obtained from `client`.
    pub fn connect<D>(client: &D, config: RepositoryConfig) -> Result<Self, RepositoryError>
    where
        D: DocumentClient<Container = S>,
    {
        let container = client.get_container(&config.database_name, &config.container_name);
        Self::with_config(container, config)
    }
}

impl<S: DocumentStore, C: Clock> ProductRepository<S, C> {
    /// Replace the time source.
    pub fn with_clock<T: Clock>(self, clock: T) -> ProductRepository<S, T> {
        ProductRepository {
            container: self.container,
            clock,
            config: self.config,
        }
    }

    /// The underlying container.
    pub fn container(&self) -> &S {
        &self.container
    }

    /// The settings in use.
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Create a product document.
    ///
    /// A fresh id is generated when `product.product_id` is absent; `firstAvailable` and the
    /// first history entry default to now.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "product_store.insert_product",
            skip_all,
            fields(category_name = %product.category_name)
        )
    )]
    pub async fn insert_product(
        &self,
        product: NewProduct,
        ctx: &RequestContext,
    ) -> Result<Product, RepositoryError> {
        const OPERATION: &str = "insert_product";
        let id = product.product_id.unwrap_or_else(Uuid::new_v4);
        let product_id = id.to_string();
        let product = product
            .into_product(id, self.clock.now_seconds())
            .map_err(|err| err.report(OPERATION))?;
        let body = encode(&product, &product_id).map_err(|err| err.report(OPERATION))?;
        let stored = self
            .container
            .create_item(body, ctx)
            .await
            .map_err(|err| {
                RepositoryError::from_store(err, &product.category_name, &product_id)
                    .report(OPERATION)
            })?;
        let inserted = decode(stored, &product_id).map_err(|err| err.report(OPERATION))?;
        Ok(inserted.product)
    }

    /// Point read of a product by exact category and id.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "product_store.get_product", skip(self, ctx))
    )]
    pub async fn get_product(
        &self,
        category_name: &str,
        product_id: &str,
        ctx: &RequestContext,
    ) -> Result<Product, RepositoryError> {
        let versioned = self
            .read(category_name, product_id, ctx)
            .await
            .map_err(|err| err.report("get_product"))?;
        Ok(versioned.product)
    }

    /// Set a new current price and append it to the price history.
    ///
    /// Read-modify-write. With optimistic concurrency enabled the write only succeeds if the
    /// document is unchanged since the read; otherwise the whole cycle is retried up to
    /// [`RepositoryConfig::max_update_attempts`] times before failing with a conflict.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "product_store.update_product_price", skip(self, ctx))
    )]
    pub async fn update_product_price(
        &self,
        category_name: &str,
        product_id: &str,
        new_price: Decimal,
        ctx: &RequestContext,
    ) -> Result<Product, RepositoryError> {
        const OPERATION: &str = "update_product_price";
        product::check_price("newPrice", new_price).map_err(|err| err.report(OPERATION))?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Versioned { mut product, etag } = self
                .read(category_name, product_id, ctx)
                .await
                .map_err(|err| err.report(OPERATION))?;
            product.apply_price(new_price, self.clock.now_seconds());
            // keep the id exactly as stored, it is part of the key
            let body = encode(&product, product_id).map_err(|err| err.report(OPERATION))?;
            let guard = if self.config.optimistic_concurrency {
                ReplaceGuard::IfMatch(etag)
            } else {
                ReplaceGuard::Unconditional
            };
            // a cancelled caller must never see its update applied
            let written = match ctx.check() {
                Ok(()) => {
                    self.container
                        .replace_item(product_id, body, guard, ctx)
                        .await
                }
                Err(err) => Err(err),
            };
            match written {
                Ok(stored) => {
                    let updated = decode(stored, product_id).map_err(|err| err.report(OPERATION))?;
                    return Ok(updated.product);
                }
                Err(StoreError::PreconditionFailed) if attempt < self.config.max_update_attempts => {
                    let backoff = self.config.backoff(attempt);
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, ?backoff, "etag mismatch, retrying price update");
                    ctx.run(async {
                        time::sleep(backoff).await;
                        Ok(())
                    })
                    .await
                    .map_err(|err| {
                        RepositoryError::from_store(err, category_name, product_id)
                            .report(OPERATION)
                    })?;
                }
                Err(err @ StoreError::PreconditionFailed) => {
                    let err = RepositoryError::Conflict {
                        product_id: product_id.to_string(),
                        attempts: attempt,
                        source: err,
                    };
                    return Err(err.report(OPERATION));
                }
                Err(err) => {
                    return Err(
                        RepositoryError::from_store(err, category_name, product_id)
                            .report(OPERATION),
                    );
                }
            }
        }
    }

    async fn read(
        &self,
        category_name: &str,
        product_id: &str,
        ctx: &RequestContext,
    ) -> Result<Versioned, RepositoryError> {
        let stored = self
            .container
            .read_item(product_id, category_name, ctx)
            .await
            .map_err(|err| RepositoryError::from_store(err, category_name, product_id))?;
        decode(stored, product_id)
    }
}
