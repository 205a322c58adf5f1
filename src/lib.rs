#![deny(missing_docs)]
#![deny(warnings)]

//! # Product Store
//!
//! A typed repository for product documents kept in a partitioned document database.
//!
//! ## Overview
//!
//! Products are JSON documents partitioned by `categoryName` and identified by `id`.
//! This library provides:
//! - Insert, point read and price update of products, with a price history appended on
//!   every update
//! - Optimistic concurrency on updates, retried with exponential backoff
//! - Cancellation and deadlines honoured by every store call
//! - A [`store::DocumentStore`] abstraction with a DynamoDB and an in-memory backend
//!
//! ## Quick Example
//!
//! ```no_run
//! use aws_sdk_dynamodb::Client;
//! use product_store::{
//!     config::RepositoryConfig,
//!     product::{NewProduct, parse_price},
//!     repository::ProductRepository,
//!     store::{RequestContext, dynamodb::DynamoDbClient},
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::from_conf(aws_sdk_dynamodb::config::Config::builder().build());
//! let config = RepositoryConfig {
//!     database_name: "shop".to_string(),
//!     ..Default::default()
//! };
//! // products live in the `shop.SampleData` table
//! let repository = ProductRepository::connect(&DynamoDbClient::new(client), config)?;
//! let ctx = RequestContext::default().with_timeout(Duration::from_secs(5));
//! let product = repository
//!     .insert_product(
//!         NewProduct {
//!             name: "UnSmart Phone".to_string(),
//!             category_name: "Devices, Smartphones".to_string(),
//!             current_price: parse_price(99.93)?,
//!             ..Default::default()
//!         },
//!         &ctx,
//!     )
//!     .await?;
//! let id = product.id.to_string();
//! repository
//!     .update_product_price("Devices, Smartphones", &id, parse_price(79.99)?, &ctx)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@repository`] - Product operations
//! - [`mod@product`] - Product document model
//! - [`mod@store`] - Document store abstraction and backends
//! - [`mod@error`] - Error taxonomy
//! - [`mod@config`] - Repository settings
//! - [`mod@clock`] - Time source

/// Time source used for product timestamps.
pub mod clock;

/// Repository settings.
pub mod config;

/// Errors returned by repository operations.
pub mod error;

/// Product document model and validation.
pub mod product;

/// Product operations on top of a document store.
///
/// This module provides operations for:
/// - Inserting new products
/// - Reading a product by category and id
/// - Updating the price of a product
pub mod repository;

/// Document store abstraction.
///
/// This module provides:
/// - The [`store::DocumentStore`] and [`store::DocumentClient`] traits
/// - A DynamoDB backend
/// - An in-memory backend
pub mod store;
