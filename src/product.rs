//! Product document model.
//!
//! The persisted layout is camelCase JSON:
//!
//! ```json
//! {
//!   "id": "8a82f850-a33b-4734-80ce-740ba16c39f1",
//!   "docType": "product",
//!   "productId": "8a82f850-a33b-4734-80ce-740ba16c39f1",
//!   "name": "UnSmart Phone",
//!   "description": "...",
//!   "categoryName": "Devices, Smartphones",
//!   "countryOfOrigin": "China",
//!   "inventory": 279,
//!   "firstAvailable": "2024-05-01T09:30:00Z",
//!   "currentPrice": 99.93,
//!   "priceHistory": [{"date": "2024-05-01T09:30:00Z", "price": 99.93}]
//! }
//! ```

use crate::error::RepositoryError;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize, de};
use uuid::Uuid;

/// Discriminator stored in `docType`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum DocType {
    /// A product record.
    #[default]
    #[serde(rename = "product")]
    Product,
}

/// One entry of a product's price history.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PricePoint {
    /// When the price took effect.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date: DateTime<Utc>,
    /// The price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// A stored product document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Document identity.
    pub id: Uuid,
    /// Always [`DocType::Product`].
    pub doc_type: DocType,
    /// Same value as `id`.
    pub product_id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Category, also the partition key.
    pub category_name: String,
    /// Country the product is made in.
    pub country_of_origin: String,
    /// Units in stock.
    pub inventory: u32,
    /// When the product was first offered.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub first_available: DateTime<Utc>,
    /// Price currently charged.
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    /// Every price the product had, oldest first.
    pub price_history: Vec<PricePoint>,
}

impl Product {
    /// Set a new current price and record it in the history.
    ///
    /// The entry is appended even when the price does not change. Its date is never earlier
    /// than the last recorded one.
    pub fn apply_price(&mut self, price: Decimal, date: DateTime<Utc>) {
        let date = self
            .price_history
            .last()
            .map_or(date, |last| last.date.max(date));
        self.current_price = price;
        self.price_history.push(PricePoint { date, price });
    }

    /// Check the invariants every stored product satisfies.
    pub fn check(&self) -> Result<(), String> {
        if self.id != self.product_id {
            return Err(format!(
                "id `{}` differs from productId `{}`",
                self.id, self.product_id
            ));
        }
        match self.price_history.last() {
            None => Err("priceHistory is empty".to_string()),
            Some(last) if last.price != self.current_price => Err(format!(
                "last priceHistory price {} differs from currentPrice {}",
                last.price, self.current_price
            )),
            Some(_) => Ok(()),
        }
    }
}

/// Input of an insert: a product whose identity and timestamps may be left to the repository.
///
/// ```rust
/// use product_store::product::NewProduct;
/// use rust_decimal::Decimal;
///
/// let product = NewProduct {
///     name: "UnSmart Phone".to_string(),
///     category_name: "Devices, Smartphones".to_string(),
///     current_price: Decimal::new(9993, 2),
///     ..Default::default()
/// };
/// assert!(product.product_id.is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewProduct {
    /// Identity to use; a random one is generated when absent.
    pub product_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Category, also the partition key.
    pub category_name: String,
    /// Country the product is made in.
    pub country_of_origin: String,
    /// Units in stock.
    pub inventory: u32,
    /// Defaults to the insertion time.
    pub first_available: Option<DateTime<Utc>>,
    /// Price currently charged.
    pub current_price: Decimal,
    /// Defaults to a single entry `{insertion time, current_price}`.
    pub price_history: Vec<PricePoint>,
}

impl NewProduct {
    /// Validate and complete the input into a [`Product`].
    ///
    /// Supplied timestamps are truncated to whole seconds, like generated ones.
    pub fn into_product(self, id: Uuid, now: DateTime<Utc>) -> Result<Product, RepositoryError> {
        if self.category_name.is_empty() {
            return Err(RepositoryError::invalid_argument(
                "categoryName",
                "must not be empty",
            ));
        }
        check_price("currentPrice", self.current_price)?;
        let now = now.trunc_subsecs(0);
        let price_history = if self.price_history.is_empty() {
            vec![PricePoint {
                date: now,
                price: self.current_price,
            }]
        } else {
            let history: Vec<PricePoint> = self
                .price_history
                .into_iter()
                .map(|point| PricePoint {
                    date: point.date.trunc_subsecs(0),
                    price: point.price,
                })
                .collect();
            check_history(&history, self.current_price)?;
            history
        };
        let product = Product {
            id,
            doc_type: DocType::Product,
            product_id: id,
            name: self.name,
            description: self.description,
            category_name: self.category_name,
            country_of_origin: self.country_of_origin,
            inventory: self.inventory,
            first_available: self
                .first_available
                .map_or(now, |date| date.trunc_subsecs(0)),
            current_price: self.current_price,
            price_history,
        };
        Ok(product)
    }
}

fn check_history(history: &[PricePoint], current_price: Decimal) -> Result<(), RepositoryError> {
    for point in history {
        check_price("priceHistory", point.price)?;
    }
    if history.windows(2).any(|pair| pair[0].date > pair[1].date) {
        return Err(RepositoryError::invalid_argument(
            "priceHistory",
            "entries must be in chronological order",
        ));
    }
    match history.last() {
        Some(last) if last.price != current_price => Err(RepositoryError::invalid_argument(
            "priceHistory",
            "last entry must match currentPrice",
        )),
        _ => Ok(()),
    }
}

/// Reject negative prices, and prices a stored document cannot hold exactly.
///
/// Prices are persisted as JSON numbers, so only values surviving the trip through an `f64`
/// are accepted.
pub fn check_price(argument: &'static str, price: Decimal) -> Result<(), RepositoryError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(RepositoryError::invalid_argument(
            argument,
            format!("must not be negative, got {price}"),
        ));
    }
    if persisted(price) != Some(price) {
        return Err(RepositoryError::invalid_argument(
            argument,
            format!("not representable as a stored price, got {price}"),
        ));
    }
    Ok(())
}

/// The price read back after storing `price` as a JSON number.
fn persisted(price: Decimal) -> Option<Decimal> {
    price.to_f64()?.to_string().parse().ok()
}

/// Parse a stored timestamp.
///
/// Besides RFC 3339, accepts an offset followed by a redundant `Z` (`...+00:00Z`) and naive
/// timestamps without offset, both read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Some(date) = text
        .strip_suffix('Z')
        .and_then(|stripped| DateTime::parse_from_rfc3339(stripped).ok())
    {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text)
        .ok_or_else(|| de::Error::invalid_value(de::Unexpected::Str(&text), &"an ISO 8601 timestamp"))
}

/// Convert a caller-supplied floating point price into a [`Decimal`].
///
/// ```rust
/// use product_store::product::parse_price;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse_price(79.99).unwrap(), Decimal::new(7999, 2));
/// assert!(parse_price(f64::NAN).is_err());
/// assert!(parse_price(-1.0).is_err());
/// ```
pub fn parse_price(price: f64) -> Result<Decimal, RepositoryError> {
    if !price.is_finite() {
        return Err(RepositoryError::invalid_argument(
            "price",
            format!("must be finite, got {price}"),
        ));
    }
    let decimal: Decimal = price.to_string().parse().map_err(|err| {
        RepositoryError::invalid_argument("price", format!("not representable: {err}"))
    })?;
    check_price("price", decimal)?;
    Ok(decimal)
}
