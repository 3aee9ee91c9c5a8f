//! SQLite-backed implementations of the engine storage capabilities.
//! Every shared counter is guarded by a conditional `UPDATE`; the
//! `rows_affected` count is what decides who won a race.

pub mod access_code;
pub mod client;
pub mod coupon;
pub mod project;
pub mod quotation;
pub mod setup;
pub mod workflow;

pub use access_code::SqlAccessCodeStore;
pub use client::SqlClientStore;
pub use coupon::SqlCouponStore;
pub use project::SqlRunningProjectStore;
pub use quotation::SqlQuotationStore;
pub use setup::SqlProjectSetupStore;
pub use workflow::SqlWorkflowStatusStore;

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use offerdesk_core::domain::coupon::DiscountKind;
use offerdesk_core::domain::setup::{AddOn, AddOnId};
use offerdesk_core::store::StoreError;

pub(crate) fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

pub(crate) fn decode(message: impl Into<String>) -> StoreError {
    StoreError::Decode(message.into())
}

pub(crate) fn parse_decimal(value: &str, column: &str) -> Result<Decimal, StoreError> {
    value
        .parse::<Decimal>()
        .map_err(|error| decode(format!("column `{column}` held `{value}`: {error}")))
}

pub(crate) fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, StoreError> {
    let raw: String = row.try_get(column).map_err(backend)?;
    parse_decimal(&raw, column)
}

pub(crate) fn get_u32(row: &SqliteRow, column: &str) -> Result<u32, StoreError> {
    let raw: i64 = row.try_get(column).map_err(backend)?;
    u32::try_from(raw).map_err(|_| decode(format!("column `{column}` held `{raw}`")))
}

pub(crate) fn discount_kind_columns(kind: &DiscountKind) -> (&'static str, String) {
    match kind {
        DiscountKind::Percentage(value) => ("percentage", value.to_string()),
        DiscountKind::Fixed(value) => ("fixed", value.to_string()),
    }
}

pub(crate) fn discount_kind_from_columns(
    discount_type: &str,
    discount_value: &str,
) -> Result<DiscountKind, StoreError> {
    let value = parse_decimal(discount_value, "discount_value")?;
    match discount_type {
        "percentage" => Ok(DiscountKind::Percentage(value)),
        "fixed" => Ok(DiscountKind::Fixed(value)),
        other => Err(decode(format!("unknown discount type `{other}`"))),
    }
}

pub(crate) fn add_on_from_row(row: &SqliteRow) -> Result<AddOn, StoreError> {
    Ok(AddOn {
        id: AddOnId(row.try_get("add_on_id").map_err(backend)?),
        name: row.try_get("name").map_err(backend)?,
        description: row.try_get("description").map_err(backend)?,
        price: get_decimal(row, "price")?,
        extra_delivery_days: get_u32(row, "extra_delivery_days")?,
        category: row.try_get("category").map_err(backend)?,
        required: row.try_get("required").map_err(backend)?,
    })
}
