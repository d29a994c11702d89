//! Active government schemes relevant to farmers

use super::{normalize_key, Tool};
use crate::schema::{Field, Schema};
use crate::Result;
use serde_json::{json, Value};

const STATUSES: [&str; 3] = ["open", "ongoing", "closing-soon"];

type SchemeRow = (&'static str, &'static str, &'static str);

const NATIONAL: &[SchemeRow] = &[
    ("PM-KISAN", "Rs 6,000 per year income support in three instalments", "ongoing"),
    ("Pradhan Mantri Fasal Bima Yojana", "Crop insurance against yield loss for kharif and rabi crops", "closing-soon"),
    ("Kisan Credit Card", "Short-term crop loans at subsidised interest", "open"),
    ("Soil Health Card", "Free soil testing with nutrient recommendations", "open"),
];

const NORTH_EAST: &[SchemeRow] = &[(
    "Mission Organic Value Chain Development (North East)",
    "Assistance for organic inputs, certification and marketing",
    "open",
)];

const NORTH_EAST_STATES: &[&str] = &[
    "assam", "meghalaya", "manipur", "mizoram", "nagaland", "tripura", "arunachalpradesh", "sikkim",
];

pub struct SubsidySchemesTool;

impl SubsidySchemesTool {
    pub const NAME: &'static str = "subsidy_schemes";
}

#[async_trait::async_trait]
impl Tool for SubsidySchemesTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "List government subsidy and support schemes currently open to farmers in a location"
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![Field::new("location", Schema::non_empty_string())])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![Field::new(
            "schemes",
            Schema::array(Schema::object(vec![
                Field::new("name", Schema::non_empty_string()),
                Field::new("benefit", Schema::non_empty_string()),
                Field::new("status", Schema::enumeration(&STATUSES)),
            ])),
        )])
    }

    async fn execute(&self, input: &Value) -> Result<Value> {
        let key = normalize_key(input["location"].as_str().unwrap_or_default());
        let regional: &[SchemeRow] = if NORTH_EAST_STATES.iter().any(|s| key.ends_with(s)) {
            NORTH_EAST
        } else {
            &[]
        };

        let schemes: Vec<Value> = NATIONAL
            .iter()
            .chain(regional.iter())
            .map(|(name, benefit, status)| {
                json!({ "name": name, "benefit": benefit, "status": status })
            })
            .collect();

        Ok(json!({ "schemes": schemes }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_regional_schemes_for_north_east() {
        let tool = SubsidySchemesTool;

        let assam = tool.execute(&json!({ "location": "Assam" })).await.unwrap();
        let punjab = tool.execute(&json!({ "location": "Punjab" })).await.unwrap();

        assert_eq!(assam["schemes"].as_array().map(|s| s.len()), Some(NATIONAL.len() + 1));
        assert_eq!(punjab["schemes"].as_array().map(|s| s.len()), Some(NATIONAL.len()));
    }
}
