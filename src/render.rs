use actix_web::http::header::ContentType;
use actix_web::HttpResponse;
use serde_json::{json, Value};

use crate::error::{AppError, Result};

/// Turns a view name plus its data into a response body.
pub trait Renderer: Send + Sync {
    fn render(&self, view: &str, context: &Value) -> Result<String>;

    fn content_type(&self) -> ContentType;
}

/// Emits the view name and its context as a JSON document.
#[derive(Debug, Default, Clone)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, view: &str, context: &Value) -> Result<String> {
        serde_json::to_string(&json!({ "view": view, "context": context }))
            .map_err(|e| AppError::Render(format!("{}: {}", view, e)))
    }

    fn content_type(&self) -> ContentType {
        ContentType::json()
    }
}

pub fn render_view(renderer: &dyn Renderer, view: &str, context: Value) -> Result<HttpResponse> {
    let body = renderer.render(view, &context)?;
    Ok(HttpResponse::Ok().content_type(renderer.content_type()).body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_renderer_wraps_view_and_context() {
        let body = JsonRenderer.render("products/listProducts", &json!({ "products": [] })).unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["view"], "products/listProducts");
        assert_eq!(parsed["context"]["products"], json!([]));
    }
}
