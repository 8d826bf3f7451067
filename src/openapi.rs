use crate::models::SearchHit;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(crate::routes::api::search),
    components(schemas(SearchHit)),
    tags((name = "search", description = "Live title search over published content"))
)]
pub struct ApiDoc;
