//! Inventory record and the response projection sent back to requesters.

use serde::{Deserialize, Serialize};

use super::de;

/// One inventory document as stored in the projection collection.
///
/// Attributes absent from a stored document, or stored as `null`, take their
/// zero value. Integer attributes accept integral floats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    #[serde(deserialize_with = "de::null_as_default")]
    pub item_id: String,
    #[serde(deserialize_with = "de::lenient_i64")]
    pub upc: i64,
    #[serde(deserialize_with = "de::lenient_i64")]
    pub sku: i64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub origin: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub device_id: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub total_weight: f64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub price: f64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub lot: String,
    #[serde(deserialize_with = "de::lenient_i64")]
    pub date_arrived: i64,
    #[serde(deserialize_with = "de::lenient_i64")]
    pub expiry_date: i64,
    #[serde(deserialize_with = "de::lenient_i64")]
    pub timestamp: i64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub rs_customer_id: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub waste_weight: f64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub donate_weight: f64,
    #[serde(deserialize_with = "de::lenient_i64")]
    pub date_sold: i64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub sale_price: f64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub sold_weight: f64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub prod_quantity: f64,
}

/// Minimal per-record shape in a search response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventorySummary {
    #[serde(rename = "SKU")]
    pub sku: i64,
    pub name: String,
    pub total_weight: f64,
    pub sold_weight: f64,
    pub price: f64,
}

impl From<&Inventory> for InventorySummary {
    fn from(inv: &Inventory) -> Self {
        Self {
            sku: inv.sku,
            name: inv.name.clone(),
            total_weight: inv.total_weight,
            sold_weight: inv.sold_weight,
            price: inv.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_document_fills_zero_values() {
        let inv: Inventory = serde_json::from_value(json!({"sku": 343434, "name": "test"})).unwrap();
        assert_eq!(inv.sku, 343434);
        assert_eq!(inv.name, "test");
        assert_eq!(inv.price, 0.0);
        assert!(inv.lot.is_empty());
    }

    #[test]
    fn integral_weights_decode_as_floats() {
        let inv: Inventory =
            serde_json::from_value(json!({"total_weight": 2000, "sold_weight": 800})).unwrap();
        assert_eq!(inv.total_weight, 2000.0);
        assert_eq!(inv.sold_weight, 800.0);
    }

    #[test]
    fn integral_float_ids_and_null_attributes_decode() {
        let inv: Inventory = serde_json::from_value(json!({
            "sku": 343434.0,
            "upc": 222222222.0,
            "name": null,
            "price": null
        }))
        .unwrap();
        assert_eq!(inv.sku, 343434);
        assert_eq!(inv.upc, 222222222);
        assert!(inv.name.is_empty());
        assert_eq!(inv.price, 0.0);
    }

    #[test]
    fn fractional_sku_is_rejected() {
        assert!(serde_json::from_value::<Inventory>(json!({"sku": 343434.5})).is_err());
    }

    #[test]
    fn summary_uses_response_keys() {
        let inv = Inventory {
            sku: 343434,
            name: "test".into(),
            total_weight: 2000.0,
            sold_weight: 800.0,
            price: 100.0,
            ..Inventory::default()
        };
        let value = serde_json::to_value(InventorySummary::from(&inv)).unwrap();
        assert_eq!(
            value,
            json!({
                "SKU": 343434,
                "Name": "test",
                "TotalWeight": 2000.0,
                "SoldWeight": 800.0,
                "Price": 100.0
            })
        );
    }
}
