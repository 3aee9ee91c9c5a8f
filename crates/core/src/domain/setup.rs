use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::coupon::CouponId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectSetupId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddOnId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOn {
    pub id: AddOnId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub extra_delivery_days: u32,
    pub category: Option<String>,
    pub required: bool,
}

/// Priced template for one client engagement. A quotation references
/// exactly one setup version; confirmed setups are never edited in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSetup {
    pub id: ProjectSetupId,
    pub client_id: ClientId,
    pub client_code: String,
    pub project_name: String,
    pub description: String,
    pub features: Vec<String>,
    pub base_price: Decimal,
    pub base_delivery_days: u32,
    pub add_ons: Vec<AddOn>,
    pub coupon_ids: Vec<CouponId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectSetup {
    pub fn find_add_on(&self, id: &AddOnId) -> Option<&AddOn> {
        self.add_ons.iter().find(|add_on| &add_on.id == id)
    }

    pub fn allows_coupon(&self, id: &CouponId) -> bool {
        self.coupon_ids.contains(id)
    }

    /// Resolves a client's selection against the catalog. Ids outside the
    /// catalog and duplicates are validation failures, never dropped;
    /// required add-ons must be part of the selection.
    pub fn resolve_selection(&self, selected: &[AddOnId]) -> Result<Vec<AddOn>, DomainError> {
        let mut resolved = Vec::with_capacity(selected.len());
        for id in selected {
            if resolved.iter().any(|add_on: &AddOn| &add_on.id == id) {
                return Err(DomainError::Validation(format!(
                    "add-on `{}` was selected more than once",
                    id.0
                )));
            }
            let Some(add_on) = self.find_add_on(id) else {
                return Err(DomainError::Validation(format!(
                    "add-on `{}` is not part of setup `{}`",
                    id.0, self.id.0
                )));
            };
            resolved.push(add_on.clone());
        }

        for add_on in &self.add_ons {
            if add_on.required && !resolved.iter().any(|chosen| chosen.id == add_on.id) {
                return Err(DomainError::Validation(format!(
                    "required add-on `{}` is missing from the selection",
                    add_on.id.0
                )));
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::client::ClientId;
    use crate::errors::DomainError;

    use super::{AddOn, AddOnId, ProjectSetup, ProjectSetupId};

    fn add_on(id: &str, price: i64, days: u32, required: bool) -> AddOn {
        AddOn {
            id: AddOnId(id.to_string()),
            name: id.to_string(),
            description: String::new(),
            price: Decimal::new(price, 0),
            extra_delivery_days: days,
            category: None,
            required,
        }
    }

    fn setup() -> ProjectSetup {
        ProjectSetup {
            id: ProjectSetupId("setup-1".to_string()),
            client_id: ClientId("cl-1".to_string()),
            client_code: "CLI001AB".to_string(),
            project_name: "Marketing site".to_string(),
            description: String::new(),
            features: vec!["responsive layout".to_string()],
            base_price: Decimal::new(1200, 0),
            base_delivery_days: 21,
            add_ons: vec![
                add_on("seo", 99, 0, false),
                add_on("cms", 149, 3, false),
                add_on("hosting", 49, 0, true),
            ],
            coupon_ids: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn resolves_known_add_ons_in_selection_order() {
        let resolved = setup()
            .resolve_selection(&[
                AddOnId("cms".to_string()),
                AddOnId("hosting".to_string()),
                AddOnId("seo".to_string()),
            ])
            .expect("selection resolves");

        let ids: Vec<&str> = resolved.iter().map(|a| a.id.0.as_str()).collect();
        assert_eq!(ids, ["cms", "hosting", "seo"]);
    }

    #[test]
    fn unknown_add_on_id_is_a_validation_error() {
        let error = setup()
            .resolve_selection(&[AddOnId("hosting".to_string()), AddOnId("vr-tour".to_string())])
            .expect_err("unknown id");

        assert!(matches!(error, DomainError::Validation(message) if message.contains("vr-tour")));
    }

    #[test]
    fn duplicate_selection_is_a_validation_error() {
        let error = setup()
            .resolve_selection(&[
                AddOnId("hosting".to_string()),
                AddOnId("seo".to_string()),
                AddOnId("seo".to_string()),
            ])
            .expect_err("duplicate id");

        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn missing_required_add_on_is_a_validation_error() {
        let error =
            setup().resolve_selection(&[AddOnId("seo".to_string())]).expect_err("missing required");

        assert!(matches!(error, DomainError::Validation(message) if message.contains("hosting")));
    }
}
