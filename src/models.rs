use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ProductId = i64;

/// Where a product currently sits: on the shelf or in the shopper's cart.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductState {
    #[default]
    Stock,
    Cart,
}

impl ProductState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductState::Stock => "stock",
            ProductState::Cart => "cart",
        }
    }
}

impl fmt::Display for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock" => Ok(ProductState::Stock),
            "cart" => Ok(ProductState::Cart),
            other => Err(format!("unknown product state '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub discount: u8,
    pub image: String,
    #[serde(default)]
    pub section_id: Option<i64>,
    #[serde(default)]
    pub brand_id: Option<i64>,
    #[serde(default)]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub state: ProductState,
    #[serde(default)]
    pub deleted: bool,
}

/// Fields an admin may set when creating or editing a product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub discount: u8,
    pub section_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub collection_id: Option<i64>,
}

impl Product {
    /// A freshly created product starts in stock and not deleted.
    pub fn new(id: ProductId, fields: ProductFields, image: String) -> Self {
        Product {
            id,
            name: fields.name,
            description: fields.description,
            price: fields.price,
            discount: fields.discount,
            image,
            section_id: fields.section_id,
            brand_id: fields.brand_id,
            collection_id: fields.collection_id,
            state: ProductState::Stock,
            deleted: false,
        }
    }

    /// Overwrites every editable field. The image is only replaced when a new
    /// one was uploaded; id, state and the deleted flag are never touched.
    pub fn apply_edit(&mut self, fields: ProductFields, image: Option<String>) {
        self.name = fields.name;
        self.description = fields.description;
        self.price = fields.price;
        self.discount = fields.discount;
        self.section_id = fields.section_id;
        self.brand_id = fields.brand_id;
        self.collection_id = fields.collection_id;
        if let Some(image) = image {
            self.image = image;
        }
    }

    pub fn final_price(&self) -> f64 {
        self.price * f64::from(100 - self.discount.min(100)) / 100.0
    }

    pub fn is_listed(&self, state: ProductState) -> bool {
        !self.deleted && self.state == state
    }
}

#[cfg(test)]
pub(crate) fn sample_fields(name: &str) -> ProductFields {
    ProductFields {
        name: name.to_string(),
        description: format!("{} description", name),
        price: 100.0,
        discount: 0,
        section_id: Some(1),
        brand_id: Some(2),
        collection_id: None,
    }
}
