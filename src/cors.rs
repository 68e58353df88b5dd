use tower_http::cors::CorsLayer;

/// The northbound surface is meant for trusted in-cluster clients, so CORS
/// is permissive rather than driven by a configured allow-list (unlike the
/// teacher's `cors.rs`, §6 does not define an `allowed_origins` setting for
/// this service).
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}
