mod test_utils;

use actix_web::{http::StatusCode, middleware::NormalizePath, test, web, App};
use serde_json::{json, Value};
use uuid::Uuid;

use image_service::{middlewares::auth::AuthMiddleware, routes::configure_routes};
use test_utils::{bearer_token, lazy_state, test_config};

macro_rules! test_app {
    ($config:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_state(&$config)))
                .wrap(AuthMiddleware)
                .wrap(NormalizePath::trim())
                .configure(configure_routes),
        )
        .await
    };
}

fn transform_uri(id: Uuid) -> String {
    format!("/api/v1/images/{}/transform", id)
}

#[actix_rt::test]
async fn home_is_public() {
    let config = test_config();
    let app = test_app!(config);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn images_require_a_token() {
    let config = test_config();
    let app = test_app!(config);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/images").to_request()).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn garbage_token_is_rejected() {
    let config = test_config();
    let app = test_app!(config);

    let req = test::TestRequest::post()
        .uri(&transform_uri(Uuid::new_v4()))
        .insert_header(("Authorization", "Bearer not.a.jwt"))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn wrong_field_types_are_unprocessable() {
    let config = test_config();
    let app = test_app!(config);

    for body in [
        json!({"resize": {"width": "wide", "height": 10}}),
        json!({"rotate": "ninety"}),
        json!({"format": "tiff"}),
        json!({"crop": {"x": -1, "y": 0, "width": 5, "height": 5}}),
    ] {
        let req = test::TestRequest::post()
            .uri(&transform_uri(Uuid::new_v4()))
            .insert_header(("Authorization", bearer_token(&config)))
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "body {body}");
    }
}

#[actix_rt::test]
async fn out_of_range_values_fail_validation_before_dispatch() {
    let config = test_config();
    let app = test_app!(config);

    let req = test::TestRequest::post()
        .uri(&format!("{}/", transform_uri(Uuid::new_v4())))
        .insert_header(("Authorization", bearer_token(&config)))
        .set_json(json!({"resize": {"width": 0, "height": 10}}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["details"][0]["field"], "resize.width");
}

#[actix_rt::test]
async fn zero_page_is_rejected() {
    let config = test_config();
    let app = test_app!(config);

    let req = test::TestRequest::get()
        .uri("/api/v1/images?page=0")
        .insert_header(("Authorization", bearer_token(&config)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn register_validates_before_touching_storage() {
    let config = test_config();
    let app = test_app!(config);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"username": "ab", "password": "short"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn upload_requires_multipart() {
    let config = test_config();
    let app = test_app!(config);

    let req = test::TestRequest::post()
        .uri("/api/v1/images")
        .insert_header(("Authorization", bearer_token(&config)))
        .set_json(json!({"file": "nope"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_client_error());
    assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
}
