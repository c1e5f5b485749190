use actix_web::web;

use crate::handlers::images;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/images")
            .service(images::upload_image)
            .service(images::list_images)
            .service(images::get_image_content)
            .service(images::transform_image)
            .service(images::get_image)
    );
}
