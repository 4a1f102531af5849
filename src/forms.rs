use std::path::Path;
use std::sync::OnceLock;
use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use chrono::Utc;
use regex::Regex;
use tracing::{debug, error, info};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::ProductFields;

/// Admin product submission as posted by the create and edit forms.
#[derive(MultipartForm)]
pub struct ProductUpload {
    pub name: Text<String>,
    pub description: Option<Text<String>>,
    pub price: Text<String>,
    pub discount: Option<Text<String>>,
    #[multipart(rename = "sectionId")]
    pub section_id: Option<Text<String>>,
    #[multipart(rename = "brandId")]
    pub brand_id: Option<Text<String>>,
    #[multipart(rename = "collectionId")]
    pub collection_id: Option<Text<String>>,
    pub image: Option<TempFile>,
}

#[derive(Debug, Validate)]
pub struct ProductForm {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: String,
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: f64,
    #[validate(range(max = 100, message = "discount must be between 0 and 100"))]
    pub discount: u8,
    pub section_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub collection_id: Option<i64>,
}

impl From<ProductForm> for ProductFields {
    fn from(form: ProductForm) -> Self {
        ProductFields {
            name: form.name,
            description: form.description,
            price: form.price,
            discount: form.discount,
            section_id: form.section_id,
            brand_id: form.brand_id,
            collection_id: form.collection_id,
        }
    }
}

fn optional_text(field: Option<Text<String>>) -> Option<String> {
    field
        .map(|text| text.into_inner().trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{} must be a number, got '{}'", name, raw)))
}

fn parse_optional_id(name: &str, field: Option<Text<String>>) -> Result<Option<i64>> {
    optional_text(field)
        .map(|raw| parse_number(name, &raw))
        .transpose()
}

impl ProductUpload {
    /// Splits the submission into validated fields and the uploaded file, if any.
    pub fn into_submission(self) -> Result<(ProductFields, Option<TempFile>)> {
        let form = ProductForm {
            name: self.name.into_inner().trim().to_string(),
            description: optional_text(self.description).unwrap_or_default(),
            price: parse_number("price", &self.price)?,
            discount: optional_text(self.discount)
                .map(|raw| parse_number("discount", &raw))
                .transpose()?
                .unwrap_or(0),
            section_id: parse_optional_id("sectionId", self.section_id)?,
            brand_id: parse_optional_id("brandId", self.brand_id)?,
            collection_id: parse_optional_id("collectionId", self.collection_id)?,
        };

        form.validate()
            .map_err(|errors| AppError::Validation(errors.to_string()))?;

        // Browsers send an empty file part when no image was picked.
        let image = self
            .image
            .filter(|file| file.size > 0 && file.file_name.as_deref().is_some_and(|n| !n.is_empty()));

        Ok((form.into(), image))
    }
}

fn image_extension(file_name: &str) -> Option<String> {
    static IMAGE_EXT: OnceLock<Regex> = OnceLock::new();
    let re = IMAGE_EXT.get_or_init(|| Regex::new(r"(?i)\.(jpe?g|png|gif|webp)$").expect("valid image pattern"));
    re.captures(file_name)
        .map(|caps| caps[1].to_ascii_lowercase())
}

/// Copies an uploaded image into `images_dir` under a generated name and
/// returns that name.
pub async fn save_image(file: Option<TempFile>, images_dir: &Path) -> Result<Option<String>> {
    let Some(file) = file else {
        return Ok(None);
    };

    let original = file.file_name.clone().unwrap_or_default();
    let extension = image_extension(&original)
        .ok_or_else(|| AppError::Validation(format!("Unsupported image type: {}", original)))?;
    let stored_name = format!(
        "product-{}-{:04x}.{}",
        Utc::now().timestamp_millis(),
        rand::random::<u16>(),
        extension
    );

    debug!("Storing uploaded image {} as {}", original, stored_name);
    tokio::fs::create_dir_all(images_dir).await?;
    tokio::fs::copy(file.file.path(), images_dir.join(&stored_name))
        .await
        .map_err(|e| {
            error!("Failed to store image {}: {}", stored_name, e);
            AppError::Upload(e)
        })?;

    info!("Image stored: {}", stored_name);
    Ok(Some(stored_name))
}
