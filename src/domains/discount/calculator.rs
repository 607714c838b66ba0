use crate::config::AppConfig;
use crate::domains::discount::repository::DiscountRepository;
use crate::domains::discount::types::{Discount, DiscountValueType, PRICING_UNAVAILABLE};
use crate::domains::property::Property;
use crate::domains::user::User;
use crate::errors::DomainResult;
use chrono::{DateTime, Utc};
use log::{debug, error};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Target currency for displayed prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    /// Multiplier from the base currency into this one
    pub rate_to_base: Decimal,
}

/// Price of a single property with every discount that was considered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub final_price: Decimal,
    pub base_price: Decimal,
    pub base_discounts: Vec<Discount>,
    pub other_discounts: Vec<Discount>,
    pub current_discount: Option<Discount>,
    pub incompatible_with: HashMap<Uuid, HashSet<Uuid>>,
    pub detail: String,
}

impl PriceQuote {
    fn undiscounted(price: Decimal, detail: &str) -> Self {
        Self {
            final_price: price,
            base_price: price,
            base_discounts: Vec::new(),
            other_discounts: Vec::new(),
            current_discount: None,
            incompatible_with: HashMap::new(),
            detail: detail.to_string(),
        }
    }
}

/// Price of one property in a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPrice {
    pub property_id: Uuid,
    pub final_price: Decimal,
    pub base_price: Decimal,
    pub detail: String,
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Listed price plus taxes and fees.
pub fn base_price(property: &Property) -> Decimal {
    round_money(property.base_price + property.taxes_fees)
}

/// Pick the discount with the largest saving, lowest priority on ties.
///
/// Discounts that would push the price under `min_price_percent` of the base price are skipped.
pub fn select_best<'a>(base_price: Decimal, discounts: &'a [Discount], min_price_percent: Decimal) -> Option<&'a Discount> {
    let min_allowed = round_money(base_price * (min_price_percent / dec!(100)));
    let mut best_saving = Decimal::ZERO;
    let mut best: Option<&Discount> = None;

    for discount in discounts {
        let saving = discount.saving(base_price);
        if round_money(base_price - saving) < min_allowed {
            continue;
        }

        if saving > best_saving {
            best_saving = saving;
            best = Some(discount);
        } else if saving == best_saving {
            if let Some(current) = best {
                if discount.priority < current.priority {
                    best = Some(discount);
                }
            }
        }
    }

    best
}

pub fn final_price(base_price: Decimal, discount: Option<&Discount>) -> Decimal {
    match discount {
        None => base_price,
        Some(d) => match d.value_type {
            DiscountValueType::Percentage => round_money(base_price - base_price * (d.value / dec!(100))),
            DiscountValueType::Fixed => round_money(base_price - d.value),
        },
    }
}

pub fn convert(price: Decimal, currency: Option<&Currency>) -> Decimal {
    match currency {
        Some(c) => round_money(price * c.rate_to_base),
        None => price,
    }
}

/// Split into discounts that reduce the price and the rest.
fn partition(discounts: Vec<Discount>) -> (Vec<Discount>, Vec<Discount>) {
    discounts.into_iter().partition(|d| d.discount_type.is_base())
}

fn incompatibility_map(discounts: &[Discount]) -> HashMap<Uuid, HashSet<Uuid>> {
    discounts
        .iter()
        .filter(|d| d.compatible && !d.incompatible_with.is_empty())
        .map(|d| (d.id, d.incompatible_with.iter().copied().collect()))
        .collect()
}

/// Resolves applicable discounts and prices properties with them
pub struct DiscountCalculator {
    repo: Arc<dyn DiscountRepository>,
    min_price_percent: Decimal,
}

impl DiscountCalculator {
    pub fn new(repo: Arc<dyn DiscountRepository>, config: &AppConfig) -> Self {
        Self {
            repo,
            min_price_percent: config.min_price_percent,
        }
    }

    /// Price a single property for an optional user. Never fails: a lookup error
    /// yields the undiscounted price with an explanatory detail.
    pub async fn calculate(
        &self,
        property: &Property,
        user: Option<&User>,
        currency: Option<&Currency>,
        now: DateTime<Utc>,
    ) -> PriceQuote {
        let base = base_price(property);

        match self.try_calculate(property, base, user, currency, now).await {
            Ok(quote) => quote,
            Err(e) => {
                error!("Calculate discount failed for property {}: {}", property.id, e);
                PriceQuote::undiscounted(convert(base, currency), PRICING_UNAVAILABLE)
            }
        }
    }

    async fn try_calculate(
        &self,
        property: &Property,
        base: Decimal,
        user: Option<&User>,
        currency: Option<&Currency>,
        now: DateTime<Utc>,
    ) -> DomainResult<PriceQuote> {
        let discounts = self.repo.find_applicable(property.id, user.map(|u| u.id), now).await?;
        if discounts.is_empty() {
            return Ok(PriceQuote::undiscounted(convert(base, currency), ""));
        }

        let incompatible_with = incompatibility_map(&discounts);
        let (base_discounts, other_discounts) = partition(discounts);
        let current_discount = select_best(base, &base_discounts, self.min_price_percent).cloned();
        let final_price = final_price(base, current_discount.as_ref());

        debug!(
            "Property {} priced at {} with discount {:?}",
            property.id,
            final_price,
            current_discount.as_ref().map(|d| d.id)
        );

        Ok(PriceQuote {
            final_price: convert(final_price, currency),
            base_price: convert(base, currency),
            base_discounts,
            other_discounts,
            current_discount,
            incompatible_with,
            detail: String::new(),
        })
    }

    /// Price every property of a listing with one discount lookup.
    pub async fn calculate_bulk(
        &self,
        properties: &[Property],
        currency: Option<&Currency>,
        now: DateTime<Utc>,
    ) -> Vec<ListingPrice> {
        let ids: Vec<Uuid> = properties.iter().map(|p| p.id).collect();

        let (mut by_property, detail) = match self.repo.find_base_for_properties(&ids, now).await {
            Ok(map) => (map, ""),
            Err(e) => {
                error!("Calculate discounts list failed: {}", e);
                (HashMap::new(), PRICING_UNAVAILABLE)
            }
        };

        properties
            .iter()
            .map(|property| {
                let base = base_price(property);
                let discounts = by_property.remove(&property.id).unwrap_or_default();
                let best = select_best(base, &discounts, self.min_price_percent);
                ListingPrice {
                    property_id: property.id,
                    final_price: convert(final_price(base, best), currency),
                    base_price: convert(base, currency),
                    detail: detail.to_string(),
                }
            })
            .collect()
    }
}
