//! OpenAPI documentation configuration

use domain_wines::WinesApiDoc;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wine Recommender API",
        version = "0.1.0",
        description = "Wine search, two-tower recommendation, targeted scoring and label OCR",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(crate::api::health::ready_handler)
)]
struct ApiInfo;

/// Combined OpenAPI documentation. Wine routes are mounted at the root, so
/// their document is merged rather than nested.
pub struct ApiDoc;

impl OpenApi for ApiDoc {
    fn openapi() -> utoipa::openapi::OpenApi {
        ApiInfo::openapi().merge_from(WinesApiDoc::openapi())
    }
}
