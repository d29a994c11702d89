//! Catalog of government forms and the fields each one requires

use super::{normalize_key, Tool};
use crate::schema::{Field, Schema};
use crate::Result;
use serde_json::{json, Value};

struct FormSpec {
    name: &'static str,
    aliases: &'static [&'static str],
    fields: &'static [&'static str],
}

const FORMS: &[FormSpec] = &[
    FormSpec {
        name: "PM-KISAN Registration",
        aliases: &["pmkisan", "pmkisanregistration", "kisansammannidhi"],
        fields: &[
            "farmerName",
            "fatherName",
            "aadhaarNumber",
            "mobileNumber",
            "bankAccountNumber",
            "ifscCode",
            "village",
            "district",
            "state",
            "landAreaAcres",
        ],
    },
    FormSpec {
        name: "Kisan Credit Card Application",
        aliases: &["kcc", "kisancreditcard", "kisancreditcardapplication"],
        fields: &[
            "farmerName",
            "mobileNumber",
            "aadhaarNumber",
            "landAreaAcres",
            "cropsGrown",
            "loanAmountRequested",
            "bankBranch",
        ],
    },
    FormSpec {
        name: "Crop Insurance Claim",
        aliases: &["pmfby", "cropinsurance", "cropinsuranceclaim", "fasalbima"],
        fields: &[
            "farmerName",
            "policyNumber",
            "crop",
            "affectedAreaAcres",
            "causeOfLoss",
            "dateOfLoss",
            "village",
            "district",
        ],
    },
    FormSpec {
        name: "Soil Health Card Request",
        aliases: &["soilhealthcard", "soilhealthcardrequest", "soiltest"],
        fields: &["farmerName", "mobileNumber", "village", "district", "surveyNumber", "cropPlanned"],
    },
];

fn find(form_name: &str) -> Option<&'static FormSpec> {
    let key = normalize_key(form_name);
    FORMS
        .iter()
        .find(|f| normalize_key(f.name) == key || f.aliases.iter().any(|a| *a == key))
}

/// Required field names for a known form
pub fn required_fields(form_name: &str) -> Option<&'static [&'static str]> {
    find(form_name).map(|f| f.fields)
}

pub struct FormCatalogTool;

impl FormCatalogTool {
    pub const NAME: &'static str = "form_fields";
}

#[async_trait::async_trait]
impl Tool for FormCatalogTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Look up the field names a government form requires. Returns known=false for forms outside the catalog."
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("formName", Schema::non_empty_string()).describe("Name of the government form"),
        ])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("formName", Schema::non_empty_string()),
            Field::new("known", Schema::boolean()),
            Field::new("fields", Schema::array(Schema::non_empty_string())),
        ])
    }

    async fn execute(&self, input: &Value) -> Result<Value> {
        let requested = input["formName"].as_str().unwrap_or_default();

        Ok(match find(requested) {
            Some(form) => json!({ "formName": form.name, "known": true, "fields": form.fields }),
            None => json!({ "formName": requested, "known": false, "fields": [] }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve() {
        assert_eq!(required_fields("PM Kisan").map(|f| f.len()), Some(10));
        assert_eq!(required_fields("KCC"), required_fields("Kisan Credit Card Application"));
        assert!(required_fields("Driving Licence").is_none());
    }

    #[test]
    fn test_unknown_form_is_not_an_error() {
        let out = tokio_test::block_on(FormCatalogTool.execute(&json!({ "formName": "Tractor Loan" })));
        assert_eq!(out.unwrap()["known"], false);

        let known = tokio_test::block_on(FormCatalogTool.execute(&json!({ "formName": "pmfby" })));
        assert_eq!(known.unwrap()["formName"], "Crop Insurance Claim");
    }
}
