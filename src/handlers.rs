use actix_multipart::form::MultipartForm;
use actix_web::{http::header, web, HttpResponse};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::{AdminGate, CurrentUser};
use crate::error::{AppError, Result};
use crate::forms::{save_image, ProductUpload};
use crate::models::{Product, ProductId, ProductState};
use crate::render::render_view;
use crate::state::AppState;

fn parse_id(raw: &str) -> Result<ProductId> {
    raw.parse().map_err(|_| {
        debug!("Invalid product ID: {}", raw);
        AppError::NotFound(format!("Product {} not found", raw))
    })
}

fn redirect(location: impl Into<String>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.into()))
        .finish()
}

/// Product as shown to shoppers: deleted products do not exist for them.
async fn visible_product(state: &AppState, id: ProductId) -> Result<Product> {
    let product = state.store.get_by_id(id).await?;
    if product.deleted {
        debug!("Product {} is deleted", id);
        return Err(AppError::NotFound(format!("Product {} not found", id)));
    }
    Ok(product)
}

async fn similar_products(state: &AppState) -> Result<Vec<Product>> {
    Ok(state.store.list_discounted(state.config.suggested_limit).await?)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn list_products(state: web::Data<AppState>) -> Result<HttpResponse> {
    debug!("Fetching products in stock");
    let products = state.store.list_by_state(ProductState::Stock).await?;

    info!("Retrieved {} products", products.len());
    render_view(state.renderer.as_ref(), "products/listProducts", json!({ "products": products }))
}

pub async fn product_cart(state: web::Data<AppState>) -> Result<HttpResponse> {
    debug!("Fetching products in cart");
    let products = state.store.list_by_state(ProductState::Cart).await?;
    let similar = similar_products(&state).await?;
    let total: f64 = products.iter().map(Product::final_price).sum();

    info!("Cart holds {} products", products.len());
    render_view(
        state.renderer.as_ref(),
        "products/productCart",
        json!({ "products": products, "similarProducts": similar, "total": total }),
    )
}

pub async fn product_detail(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse> {
    let id = parse_id(&id)?;
    debug!("Fetching product with ID: {}", id);

    let product = visible_product(&state, id).await?;
    let similar = similar_products(&state).await?;
    render_view(
        state.renderer.as_ref(),
        "products/productDetail",
        json!({ "product": product, "similarProducts": similar }),
    )
}

pub async fn add_to_cart(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse> {
    let id = parse_id(&id)?;
    visible_product(&state, id).await?;
    state.store.set_state(id, ProductState::Cart).await?;

    info!("Product {} added to cart", id);
    Ok(redirect("/products"))
}

pub async fn remove_from_cart(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse> {
    let id = parse_id(&id)?;
    visible_product(&state, id).await?;
    state.store.set_state(id, ProductState::Stock).await?;

    info!("Product {} returned to stock", id);
    Ok(redirect("/products/cart"))
}

async fn section(state: web::Data<AppState>) -> Result<HttpResponse> {
    render_view(state.renderer.as_ref(), "products/sectionProducts", json!({}))
}

async fn collections(state: web::Data<AppState>) -> Result<HttpResponse> {
    render_view(state.renderer.as_ref(), "products/collections", json!({}))
}

async fn best_sellers(state: web::Data<AppState>) -> Result<HttpResponse> {
    render_view(state.renderer.as_ref(), "products/bestSellers", json!({}))
}

async fn sales(state: web::Data<AppState>) -> Result<HttpResponse> {
    render_view(state.renderer.as_ref(), "products/sales", json!({}))
}

pub async fn create_form(state: web::Data<AppState>, user: web::ReqData<CurrentUser>) -> Result<HttpResponse> {
    render_view(
        state.renderer.as_ref(),
        "admin/createProduct",
        json!({ "user": user.into_inner() }),
    )
}

pub async fn create_product(
    state: web::Data<AppState>,
    MultipartForm(upload): MultipartForm<ProductUpload>,
) -> Result<HttpResponse> {
    let (fields, file) = upload.into_submission()?;
    debug!("Creating new product: {:?}", fields);

    let image = save_image(file, &state.config.images_dir).await?;
    if image.is_none() {
        warn!("Product submission without image rejected");
    }
    let product = state.store.create(fields, image).await?;

    Ok(redirect(format!("/products/{}", product.id)))
}

pub async fn edit_form(
    state: web::Data<AppState>,
    id: web::Path<String>,
    user: web::ReqData<CurrentUser>,
) -> Result<HttpResponse> {
    let id = parse_id(&id)?;
    let product = state.store.get_by_id(id).await?;
    render_view(
        state.renderer.as_ref(),
        "admin/editProduct",
        json!({ "product": product, "user": user.into_inner() }),
    )
}

pub async fn update_product(
    state: web::Data<AppState>,
    id: web::Path<String>,
    MultipartForm(upload): MultipartForm<ProductUpload>,
) -> Result<HttpResponse> {
    let id = parse_id(&id)?;
    let (fields, file) = upload.into_submission()?;
    debug!("Updating product {}: {:?}", id, fields);

    // Fail before storing a new image for a product that does not exist.
    state.store.get_by_id(id).await?;
    let image = save_image(file, &state.config.images_dir).await?;
    let product = state.store.update(id, fields, image).await?;

    Ok(redirect(format!("/products/{}", product.id)))
}

pub async fn delete_product(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse> {
    let id = parse_id(&id)?;
    state.store.soft_delete(id).await?;

    info!("Product deleted successfully: {}", id);
    Ok(redirect("/products"))
}

pub fn configure(cfg: &mut web::ServiceConfig, gate: AdminGate) {
    cfg.route("/health", web::get().to(health))
        .service(
            web::scope("/products")
                .route("", web::get().to(list_products))
                .route("/cart", web::get().to(product_cart))
                .route("/section", web::get().to(section))
                .route("/collections", web::get().to(collections))
                .route("/best-sellers", web::get().to(best_sellers))
                .route("/sales", web::get().to(sales))
                .route("/{id}", web::get().to(product_detail))
                .route("/{id}/cart", web::post().to(add_to_cart))
                .route("/{id}/stock", web::post().to(remove_from_cart)),
        )
        .service(
            web::scope("/admin/products")
                .wrap(gate)
                .route("", web::post().to(create_product))
                .route("/create", web::get().to(create_form))
                .route("/{id}/edit", web::get().to(edit_form))
                .route("/{id}", web::post().to(update_product))
                .route("/{id}", web::put().to(update_product))
                .route("/{id}/delete", web::post().to(delete_product)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{issue_token, ADMIN_ROLE};
    use crate::config::AppConfig;
    use crate::models::sample_fields;
    use crate::render::JsonRenderer;
    use crate::store::{JsonFileStore, ProductStore};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SECRET: &str = "handler-secret";
    const BOUNDARY: &str = "----catalog-boundary";

    struct Fixture {
        dir: TempDir,
        state: AppState,
    }

    impl Fixture {
        async fn new(products: &[Product]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let data = dir.path().join("products.json");
            std::fs::write(&data, serde_json::to_vec(products).unwrap()).unwrap();
            let images = dir.path().join("images");
            let config = AppConfig::from_lookup(|name| match name {
                "JWT_SECRET" => Some(SECRET.to_string()),
                "PRODUCTS_FILE" => Some(data.display().to_string()),
                "IMAGES_DIR" => Some(images.display().to_string()),
                _ => None,
            })
            .unwrap();

            let store = JsonFileStore::open(&data).await.unwrap();
            let state = AppState {
                store: Arc::new(store),
                renderer: Arc::new(JsonRenderer),
                config: Arc::new(config),
            };
            Fixture { dir, state }
        }

        fn store(&self) -> &dyn ProductStore {
            self.state.store.as_ref()
        }
    }

    macro_rules! app {
        ($fixture:expr) => {{
            let state = $fixture.state.clone();
            let gate = AdminGate::new(SECRET, state.config.login_path.clone());
            test::init_service(
                App::new()
                    .app_data(web::Data::new(state))
                    .configure(move |cfg| configure(cfg, gate)),
            )
            .await
        }};
    }

    fn product(id: ProductId, discount: u8) -> Product {
        let mut product = Product::new(id, sample_fields(&format!("product {}", id)), format!("{}.png", id));
        product.discount = discount;
        product
    }

    fn admin_header() -> (header::HeaderName, String) {
        let token = issue_token(SECRET, "1", ADMIN_ROLE, chrono::Duration::hours(1)).unwrap();
        (header::AUTHORIZATION, format!("Bearer {}", token))
    }

    fn multipart(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn multipart_request(uri: &str, body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .insert_header((header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(body)
    }

    fn context_ids(body: &Value, key: &str) -> Vec<i64> {
        body["context"][key]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_i64().unwrap())
            .collect()
    }

    fn location<B>(res: &actix_web::dev::ServiceResponse<B>) -> &str {
        res.headers().get(header::LOCATION).unwrap().to_str().unwrap()
    }

    #[actix_web::test]
    async fn listing_hides_cart_and_deleted_products() {
        let mut deleted = product(3, 0);
        deleted.deleted = true;
        let mut in_cart = product(2, 0);
        in_cart.state = ProductState::Cart;
        let fixture = Fixture::new(&[product(1, 0), in_cart, deleted]).await;
        let app = app!(fixture);

        let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/products").to_request()).await;
        assert_eq!(body["view"], "products/listProducts");
        assert_eq!(context_ids(&body, "products"), vec![1]);
    }

    #[actix_web::test]
    async fn cart_flow_moves_products_between_views() {
        let fixture = Fixture::new(&[product(1, 0), product(2, 10)]).await;
        let app = app!(fixture);

        let res = test::call_service(&app, test::TestRequest::post().uri("/products/2/cart").to_request()).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/products");

        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/products/cart").to_request()).await;
        assert_eq!(context_ids(&body, "products"), vec![2]);
        assert_eq!(context_ids(&body, "similarProducts"), vec![2]);
        assert_eq!(body["context"]["total"], 90.0);

        let res = test::call_service(&app, test::TestRequest::post().uri("/products/2/stock").to_request()).await;
        assert_eq!(location(&res), "/products/cart");
        assert_eq!(fixture.store().get_by_id(2).await.unwrap(), product(2, 10));
    }

    #[actix_web::test]
    async fn detail_resolves_visible_products_only() {
        let mut deleted = product(2, 0);
        deleted.deleted = true;
        let fixture = Fixture::new(&[product(1, 5), deleted]).await;
        let app = app!(fixture);

        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/products/1").to_request()).await;
        assert_eq!(body["view"], "products/productDetail");
        assert_eq!(body["context"]["product"]["name"], "product 1");

        for uri in ["/products/2", "/products/99", "/products/nonexistent"] {
            let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", uri);
        }

        let res = test::call_service(&app, test::TestRequest::post().uri("/products/99/cart").to_request()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn admin_routes_redirect_anonymous_users() {
        let fixture = Fixture::new(&[product(1, 0)]).await;
        let app = app!(fixture);

        let res = test::call_service(&app, test::TestRequest::get().uri("/admin/products/create").to_request()).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/users/login");

        let res = test::call_service(&app, test::TestRequest::post().uri("/admin/products/1/delete").to_request()).await;
        assert_eq!(location(&res), "/users/login");
        assert!(!fixture.store().get_by_id(1).await.unwrap().deleted);
    }

    #[actix_web::test]
    async fn admin_creates_product_with_image() {
        let fixture = Fixture::new(&[product(7, 0)]).await;
        let app = app!(fixture);

        let body = multipart(
            &[("name", "Audifonos Beats Pro"), ("price", "48000"), ("discount", "10"), ("sectionId", "3")],
            Some(("beats.png", b"\x89PNG")),
        );
        let req = multipart_request("/admin/products", body).insert_header(admin_header()).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/products/8");

        let created = fixture.store().get_by_id(8).await.unwrap();
        assert_eq!(created.name, "Audifonos Beats Pro");
        assert_eq!(created.discount, 10);
        assert_eq!(created.section_id, Some(3));
        assert_eq!(created.state, ProductState::Stock);
        assert!(fixture.dir.path().join("images").join(&created.image).exists());
    }

    #[actix_web::test]
    async fn admin_create_requires_image() {
        let fixture = Fixture::new(&[]).await;
        let app = app!(fixture);

        let body = multipart(&[("name", "iPad Air"), ("price", "79230")], None);
        let req = multipart_request("/admin/products", body).insert_header(admin_header()).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(fixture.store().list_by_state(ProductState::Stock).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn admin_edit_keeps_image_and_delete_is_soft() {
        let fixture = Fixture::new(&[product(1, 0), product(2, 0)]).await;
        let app = app!(fixture);

        let req = test::TestRequest::get()
            .uri("/admin/products/1/edit")
            .insert_header(admin_header())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["view"], "admin/editProduct");
        assert_eq!(body["context"]["user"]["role"], ADMIN_ROLE);

        let body = multipart(&[("name", "Playstation 5"), ("price", "61700")], None);
        let req = multipart_request("/admin/products/1", body).insert_header(admin_header()).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(location(&res), "/products/1");

        let edited = fixture.store().get_by_id(1).await.unwrap();
        assert_eq!(edited.name, "Playstation 5");
        assert_eq!(edited.price, 61700.0);
        assert_eq!(edited.image, "1.png");

        let req = test::TestRequest::post()
            .uri("/admin/products/1/delete")
            .insert_header(admin_header())
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(location(&res), "/products");

        let listed = fixture.store().list_by_state(ProductState::Stock).await.unwrap();
        assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2]);
        assert!(fixture.store().get_by_id(1).await.unwrap().deleted);
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let fixture = Fixture::new(&[]).await;
        let app = app!(fixture);
        let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(body["status"], "ok");
    }
}
