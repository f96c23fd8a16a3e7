//! Product controller and the upload relay.

use axum_test::multipart::{MultipartForm, Part};
use cookie::Cookie;
use serde_json::{Value, json};

use emporium_integration_tests::TestContext;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n0000";

fn png(name: &str) -> Part {
    Part::bytes(PNG).file_name(name).mime_type("image/png")
}

fn product_form(category: &Value) -> MultipartForm {
    MultipartForm::new()
        .add_text("name", "Desk Lamp")
        .add_text("description", "Warm light")
        .add_text("price", "19.99")
        .add_text("stock", "5")
        .add_text("category", category["id"].to_string())
}

async fn setup() -> (TestContext, Cookie<'static>, Value) {
    let ctx = TestContext::new();
    let admin = ctx.admin().await;
    let category = ctx.create_category(&admin, "Lighting").await;
    (ctx, admin, category)
}

async fn create_product(
    ctx: &TestContext,
    admin: &Cookie<'static>,
    form: MultipartForm,
) -> Value {
    let response = ctx
        .server
        .post("/api/products")
        .add_cookie(admin.clone())
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    response.json::<Value>()["product"].clone()
}

fn staged_files(ctx: &TestContext) -> usize {
    std::fs::read_dir(ctx.upload_dir()).unwrap().count()
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_with_image() {
    let (ctx, admin, category) = setup().await;

    let product = create_product(&ctx, &admin, product_form(&category).add_part("image", png("lamp.png"))).await;

    assert_eq!(product["name"], "Desk Lamp");
    assert_eq!(product["price"], "19.99");
    assert_eq!(product["stock"], 5);
    assert_eq!(product["category"], category["id"]);
    assert_eq!(product["image"]["publicId"], "ecommerce/products/img-1");
    assert_eq!(ctx.images.upload_count(), 1);
    assert!(ctx.images.destroyed().is_empty());
    assert_eq!(staged_files(&ctx), 0);
}

#[tokio::test]
async fn test_staged_file_named_and_removed() {
    let (ctx, admin, category) = setup().await;

    create_product(&ctx, &admin, product_form(&category).add_part("image", png("lamp.png"))).await;

    let paths = ctx.images.uploaded_paths();
    let name = paths[0].file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("image-"));
    assert!(name.ends_with(".png"));
    assert!(!paths[0].exists());
}

#[tokio::test]
async fn test_create_without_image() {
    let (ctx, admin, category) = setup().await;

    let product = create_product(&ctx, &admin, product_form(&category)).await;

    assert!(product["image"].is_null());
    assert_eq!(ctx.images.upload_count(), 0);
}

#[tokio::test]
async fn test_create_requires_all_fields() {
    let (ctx, admin, _) = setup().await;

    let form = MultipartForm::new()
        .add_text("name", "Desk Lamp")
        .add_part("image", png("lamp.png"));
    let response = ctx
        .server
        .post("/api/products")
        .add_cookie(admin)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(
        response.json::<Value>()["message"],
        "Please fill all required fields"
    );
    assert_eq!(ctx.images.upload_count(), 0);
    assert_eq!(staged_files(&ctx), 0);
}

#[tokio::test]
async fn test_unsupported_image_type_rejected_before_upload() {
    let (ctx, admin, category) = setup().await;

    let gif = Part::bytes(b"GIF89a".as_slice())
        .file_name("lamp.gif")
        .mime_type("image/gif");
    let response = ctx
        .server
        .post("/api/products")
        .add_cookie(admin)
        .multipart(product_form(&category).add_part("image", gif))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(
        response.json::<Value>()["message"],
        "Only .jpg, .jpeg and .png images are allowed"
    );
    assert_eq!(ctx.images.upload_count(), 0);
    assert_eq!(staged_files(&ctx), 0);
}

#[tokio::test]
async fn test_oversized_image_rejected() {
    let (ctx, admin, category) = setup().await;

    let big = Part::bytes(vec![0_u8; 5 * 1024 * 1024 + 1])
        .file_name("big.jpg")
        .mime_type("image/jpeg");
    let response = ctx
        .server
        .post("/api/products")
        .add_cookie(admin)
        .multipart(product_form(&category).add_part("image", big))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["message"], "Image must be at most 5 MB");
    assert_eq!(ctx.images.upload_count(), 0);
    assert_eq!(staged_files(&ctx), 0);
}

#[tokio::test]
async fn test_price_beyond_storable_range_rejected() {
    let (ctx, admin, category) = setup().await;

    let form = MultipartForm::new()
        .add_text("name", "Desk Lamp")
        .add_text("description", "Warm light")
        .add_text("price", "79228162514264337593543950335")
        .add_text("stock", "5")
        .add_text("category", category["id"].to_string())
        .add_part("image", png("lamp.png"));
    let response = ctx
        .server
        .post("/api/products")
        .add_cookie(admin)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["message"], "Price is too large");
    assert_eq!(ctx.images.upload_count(), 0);
}

#[tokio::test]
async fn test_failed_insert_destroys_uploaded_image() {
    let (ctx, admin, _) = setup().await;

    let form = MultipartForm::new()
        .add_text("name", "Desk Lamp")
        .add_text("description", "Warm light")
        .add_text("price", "19.99")
        .add_text("stock", "5")
        .add_text("category", "999")
        .add_part("image", png("lamp.png"));
    let response = ctx
        .server
        .post("/api/products")
        .add_cookie(admin)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["message"], "Category not found");
    assert_eq!(ctx.images.upload_count(), 1);
    assert_eq!(ctx.images.destroyed(), vec!["ecommerce/products/img-1"]);
}

#[tokio::test]
async fn test_failed_upload_leaves_no_row_and_no_staged_file() {
    let (ctx, admin, category) = setup().await;
    ctx.images.fail_uploads();

    let response = ctx
        .server
        .post("/api/products")
        .add_cookie(admin)
        .multipart(product_form(&category).add_part("image", png("lamp.png")))
        .await;

    assert_eq!(response.status_code(), 500);
    assert_eq!(
        response.json::<Value>(),
        json!({ "success": false, "message": "Image storage error" })
    );
    assert_eq!(staged_files(&ctx), 0);
    assert!(ctx.images.destroyed().is_empty());

    let listing = ctx.server.get("/api/products").await.json::<Value>();
    assert_eq!(listing["total"], 0);
    assert!(listing["products"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_upload_on_update_keeps_existing_image() {
    let (ctx, admin, category) = setup().await;
    let product = create_product(&ctx, &admin, product_form(&category).add_part("image", png("a.png"))).await;
    ctx.images.fail_uploads();

    let response = ctx
        .server
        .put(&format!("/api/products/{}", product["id"]))
        .add_cookie(admin)
        .multipart(
            MultipartForm::new()
                .add_text("price", "1.00")
                .add_part("image", png("b.png")),
        )
        .await;

    assert_eq!(response.status_code(), 500);
    assert_eq!(staged_files(&ctx), 0);
    assert!(ctx.images.destroyed().is_empty());

    let current = ctx
        .server
        .get(&format!("/api/products/{}", product["id"]))
        .await
        .json::<Value>();
    assert_eq!(current["product"]["price"], "19.99");
    assert_eq!(current["product"]["image"]["publicId"], "ecommerce/products/img-1");
}

// =============================================================================
// Read
// =============================================================================

#[tokio::test]
async fn test_list_and_get_are_public() {
    let (ctx, admin, category) = setup().await;
    let product = create_product(&ctx, &admin, product_form(&category)).await;

    let response = ctx.server.get("/api/products").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
    assert_eq!(body["pages"], 1);

    let response = ctx.server.get(&format!("/api/products/{}", product["id"])).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["product"]["name"], "Desk Lamp");

    let response = ctx.server.get("/api/products/999").await;
    assert_eq!(response.status_code(), 404);

    let response = ctx.server.get("/api/products/lamp").await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["success"], false);
}

#[tokio::test]
async fn test_list_filters_by_category_and_sorts_by_price() {
    let (ctx, admin, lighting) = setup().await;
    let seating = ctx.create_category(&admin, "Seating").await;

    for (name, price, category) in [
        ("Desk Lamp", "19.99", &lighting),
        ("Floor Lamp", "49.00", &lighting),
        ("Stool", "25.00", &seating),
    ] {
        let form = MultipartForm::new()
            .add_text("name", name)
            .add_text("description", "x")
            .add_text("price", price)
            .add_text("stock", "1")
            .add_text("category", category["id"].to_string());
        create_product(&ctx, &admin, form).await;
    }

    let response = ctx
        .server
        .get("/api/products")
        .add_query_param("category", lighting["id"].as_i64().unwrap())
        .add_query_param("sort", "-price")
        .await;

    let body: Value = response.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["products"][0]["name"], "Floor Lamp");
    assert_eq!(body["products"][1]["name"], "Desk Lamp");

    let response = ctx
        .server
        .get("/api/products")
        .add_query_param("keyword", "lamp")
        .await;
    assert_eq!(response.json::<Value>()["total"], 2);
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_fields_only() {
    let (ctx, admin, category) = setup().await;
    let product = create_product(&ctx, &admin, product_form(&category)).await;

    let response = ctx
        .server
        .put(&format!("/api/products/{}", product["id"]))
        .add_cookie(admin)
        .multipart(MultipartForm::new().add_text("price", "15.50"))
        .await;

    assert_eq!(response.status_code(), 200);
    let updated = &response.json::<Value>()["product"];
    assert_eq!(updated["price"], "15.50");
    assert_eq!(updated["name"], "Desk Lamp");
    assert_eq!(updated["stock"], 5);
}

#[tokio::test]
async fn test_update_replaces_image_after_write() {
    let (ctx, admin, category) = setup().await;
    let product = create_product(&ctx, &admin, product_form(&category).add_part("image", png("a.png"))).await;

    let response = ctx
        .server
        .put(&format!("/api/products/{}", product["id"]))
        .add_cookie(admin)
        .multipart(MultipartForm::new().add_part("image", png("b.png")))
        .await;

    assert_eq!(response.status_code(), 200);
    let updated = &response.json::<Value>()["product"];
    assert_eq!(updated["image"]["publicId"], "ecommerce/products/img-2");
    assert_eq!(ctx.images.destroyed(), vec!["ecommerce/products/img-1"]);
}

#[tokio::test]
async fn test_each_replacement_destroys_the_image_it_overwrote() {
    let (ctx, admin, category) = setup().await;
    let product = create_product(&ctx, &admin, product_form(&category).add_part("image", png("a.png"))).await;
    let path = format!("/api/products/{}", product["id"]);

    for name in ["b.png", "c.png"] {
        let response = ctx
            .server
            .put(&path)
            .add_cookie(admin.clone())
            .multipart(MultipartForm::new().add_part("image", png(name)))
            .await;
        assert_eq!(response.status_code(), 200);
    }

    assert_eq!(
        ctx.images.destroyed(),
        vec!["ecommerce/products/img-1", "ecommerce/products/img-2"]
    );
    let current = ctx.server.get(&path).await.json::<Value>();
    assert_eq!(current["product"]["image"]["publicId"], "ecommerce/products/img-3");
}

#[tokio::test]
async fn test_update_missing_product() {
    let (ctx, admin, _) = setup().await;

    let response = ctx
        .server
        .put("/api/products/999")
        .add_cookie(admin)
        .multipart(MultipartForm::new().add_part("image", png("a.png")))
        .await;

    assert_eq!(response.status_code(), 404);
    assert_eq!(ctx.images.upload_count(), 0);
}

#[tokio::test]
async fn test_update_to_unknown_category_discards_new_image() {
    let (ctx, admin, category) = setup().await;
    let product = create_product(&ctx, &admin, product_form(&category).add_part("image", png("a.png"))).await;

    let response = ctx
        .server
        .put(&format!("/api/products/{}", product["id"]))
        .add_cookie(admin)
        .multipart(
            MultipartForm::new()
                .add_text("category", "999")
                .add_part("image", png("b.png")),
        )
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(ctx.images.destroyed(), vec!["ecommerce/products/img-2"]);

    let current = ctx.server.get(&format!("/api/products/{}", product["id"])).await;
    assert_eq!(
        current.json::<Value>()["product"]["image"]["publicId"],
        "ecommerce/products/img-1"
    );
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_destroys_image_exactly_once() {
    let (ctx, admin, category) = setup().await;
    let product = create_product(&ctx, &admin, product_form(&category).add_part("image", png("a.png"))).await;

    let response = ctx
        .server
        .delete(&format!("/api/products/{}", product["id"]))
        .add_cookie(admin.clone())
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.json::<Value>(),
        json!({ "success": true, "message": "Product deleted successfully" })
    );
    assert_eq!(ctx.images.destroyed(), vec!["ecommerce/products/img-1"]);

    let again = ctx
        .server
        .delete(&format!("/api/products/{}", product["id"]))
        .add_cookie(admin)
        .await;
    assert_eq!(again.status_code(), 404);
    assert_eq!(ctx.images.destroyed().len(), 1);
}

#[tokio::test]
async fn test_delete_without_image_makes_no_host_call() {
    let (ctx, admin, category) = setup().await;
    let product = create_product(&ctx, &admin, product_form(&category)).await;

    let response = ctx
        .server
        .delete(&format!("/api/products/{}", product["id"]))
        .add_cookie(admin)
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(ctx.images.destroyed().is_empty());
}

#[tokio::test]
async fn test_category_with_products_cannot_be_deleted() {
    let (ctx, admin, category) = setup().await;
    create_product(&ctx, &admin, product_form(&category)).await;

    let response = ctx
        .server
        .delete("/api/categories/lighting")
        .add_cookie(admin)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(
        response.json::<Value>()["message"],
        "Category still has products"
    );
}
