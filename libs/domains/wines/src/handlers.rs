//! HTTP handlers for wine search, recommendation, scoring and OCR.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    routing::post,
};
use axum_helpers::{AppError, ErrorResponse};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::error::{WineError, WineResult};
use crate::features::{SimpleWine, UserFeatures, WineType};
use crate::models::{DotProducts, OcrResponse, Recommendations};
use crate::ocr::TextExtractor;
use crate::service::WineService;

const MISSING_BODY: &str = "Missing request body.";

/// Upload limit for OCR images.
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Multipart form accepted by `/ocr`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ImageUpload {
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    image: String,
}

#[derive(Clone)]
pub struct WinesState {
    pub service: Arc<WineService>,
    pub ocr: Arc<dyn TextExtractor>,
}

/// OpenAPI documentation for the wine API
#[derive(OpenApi)]
#[openapi(
    paths(recommend, score_wines, legacy_search, extract_text),
    components(schemas(
        Recommendations,
        DotProducts,
        OcrResponse,
        SimpleWine,
        WineType,
        ImageUpload,
        ErrorResponse
    )),
    tags(
        (name = "wines", description = "Wine search, recommendation and scoring"),
        (name = "ocr", description = "Wine label text extraction")
    )
)]
pub struct WinesApiDoc;

pub fn router(service: Arc<WineService>, ocr: Arc<dyn TextExtractor>) -> Router {
    let state = WinesState { service, ocr };

    Router::new()
        .route("/wines", post(recommend))
        .route("/wines/recommend", post(recommend))
        .route("/wines/score", post(score_wines))
        .route("/wines/legacy", post(legacy_search))
        .route(
            "/ocr",
            post(extract_text).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .with_state(state)
}

/// Recommend wines from the 55 user-preference features
#[utoipa::path(
    post,
    path = "/wines/recommend",
    tag = "wines",
    request_body(
        content = serde_json::Value,
        description = "All 55 user features as a flat object, plus an optional `user_id` string"
    ),
    responses(
        (status = 200, description = "Recommended wines", body = Recommendations),
        (status = 400, description = "Missing body or invalid features", body = ErrorResponse),
        (status = 500, description = "Model or vector search failure", body = ErrorResponse)
    )
)]
pub async fn recommend(
    State(state): State<WinesState>,
    body: Bytes,
) -> WineResult<Json<Recommendations>> {
    let mut payload = parse_body(&body).inspect_err(|e| {
        warn!(error = %e, "Wine recommendation request rejected");
    })?;
    let user_id = take_user_id(&mut payload)?;

    let features = UserFeatures::from_preferences(&payload).inspect_err(|e| {
        warn!(error = %e, user_id = user_id.as_deref(), "User preferences validation failed");
    })?;

    let result = state.service.recommend(&features, user_id.as_deref()).await?;
    Ok(Json(result))
}

/// Dot products between the user's embedding and the named wines
#[utoipa::path(
    post,
    path = "/wines/score",
    tag = "wines",
    request_body(
        content = serde_json::Value,
        description = "`{\"user_data\": {55 features}, \"wine_ids\": [\"...\"], \"user_id\": \"optional\"}`"
    ),
    responses(
        (status = 200, description = "Dot product per wine found in the store", body = DotProducts),
        (status = 400, description = "Missing or invalid user_data / wine_ids", body = ErrorResponse),
        (status = 500, description = "Store not loaded or model failure", body = ErrorResponse)
    )
)]
pub async fn score_wines(
    State(state): State<WinesState>,
    body: Bytes,
) -> WineResult<Json<DotProducts>> {
    let mut payload = parse_body(&body)?;
    let user_id = take_user_id(&mut payload)?;
    let map = as_object(&payload)?;

    let user_data = map
        .get("user_data")
        .filter(|v| !v.is_null())
        .ok_or_else(|| WineError::Validation("Missing required field: user_data".into()))?;
    let wine_ids = parse_wine_ids(map.get("wine_ids"))?;

    let features = UserFeatures::from_preferences(user_data)?;
    let dot_products = state
        .service
        .score_wines(&features, &wine_ids, user_id.as_deref())
        .await?;

    Ok(Json(DotProducts { dot_products }))
}

/// [Deprecated] Similar wines from basic attributes
#[utoipa::path(
    post,
    path = "/wines/legacy",
    tag = "wines",
    request_body = SimpleWine,
    responses(
        (status = 200, description = "Similar wines with min-max scores", body = Recommendations),
        (status = 400, description = "Missing or invalid attributes", body = ErrorResponse),
        (status = 500, description = "Vector search failure", body = ErrorResponse)
    )
)]
pub async fn legacy_search(
    State(state): State<WinesState>,
    body: Bytes,
) -> WineResult<Json<Recommendations>> {
    let payload = parse_body(&body)?;
    let wine = SimpleWine::from_value(&payload).inspect_err(|e| {
        warn!(error = %e, "Wine vector validation failed");
    })?;

    let result = state.service.legacy_search(&wine).await?;
    Ok(Json(result))
}

/// Extract text from an uploaded label image
#[utoipa::path(
    post,
    path = "/ocr",
    tag = "ocr",
    request_body(content = ImageUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Extracted text, empty when none was found", body = OcrResponse),
        (status = 400, description = "No image provided", body = ErrorResponse),
        (status = 500, description = "Vision API failure", body = ErrorResponse)
    )
)]
pub async fn extract_text(
    State(state): State<WinesState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OcrResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "OCR request is not multipart");
        AppError::BadRequest("No image file provided".to_string())
    })?;

    while let Some(field) = multipart.next_field().await? {
        // A plain form value named "image" is not a file upload.
        if field.name() != Some("image") || field.file_name().is_none() {
            continue;
        }

        if field.file_name() == Some("") {
            warn!("OCR request with empty filename");
            return Err(AppError::BadRequest("No image file selected".to_string()));
        }

        let image = field.bytes().await?;
        info!(image_size = image.len(), "Processing OCR request");

        let text = state.ocr.extract_text(&image).await?;
        info!(text_length = text.len(), "OCR extraction successful");

        return Ok(Json(OcrResponse { text }));
    }

    warn!("OCR request missing image file");
    Err(AppError::BadRequest("No image file provided".to_string()))
}

/// Rejects empty, `null` and `{}` bodies the same way.
fn parse_body(body: &Bytes) -> WineResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(WineError::Validation(MISSING_BODY.to_string()));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| WineError::Validation(format!("Invalid JSON body: {}", e)))?;

    match &value {
        Value::Null => Err(WineError::Validation(MISSING_BODY.to_string())),
        Value::Object(map) if map.is_empty() => Err(WineError::Validation(MISSING_BODY.to_string())),
        _ => Ok(value),
    }
}

fn as_object(value: &Value) -> WineResult<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| WineError::Validation("Request body must be a JSON object".to_string()))
}

/// Removes `user_id` from the payload so the feature schema stays closed.
fn take_user_id(payload: &mut Value) -> WineResult<Option<String>> {
    let Some(map) = payload.as_object_mut() else {
        return Ok(None);
    };

    match map.remove("user_id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(_) => Err(WineError::Validation(
            "Field 'user_id' must be a string".to_string(),
        )),
    }
}

/// Ids may be strings or integers, matching how the embeddings file stores them.
fn parse_wine_ids(value: Option<&Value>) -> WineResult<Vec<String>> {
    let items = match value {
        None | Some(Value::Null) => {
            return Err(WineError::Validation(
                "Missing required field: wine_ids".to_string(),
            ));
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(WineError::Validation(
                "Field 'wine_ids' must be an array".to_string(),
            ));
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(id) => Ok(id.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            _ => Err(WineError::Validation(
                "Field 'wine_ids' must contain only strings".to_string(),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_treats_blank_null_and_empty_object_as_missing() {
        for raw in ["", "  \n", "null", "{}"] {
            let err = parse_body(&Bytes::from(raw)).unwrap_err();
            assert_eq!(err.to_string(), MISSING_BODY, "input {:?}", raw);
        }
    }

    #[test]
    fn test_parse_body_rejects_malformed_json() {
        let err = parse_body(&Bytes::from("{not json")).unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON body"));
    }

    #[test]
    fn test_take_user_id() {
        let mut payload = json!({"user_id": "u-1", "rating_mean": 4.0});
        assert_eq!(take_user_id(&mut payload).unwrap().as_deref(), Some("u-1"));
        assert!(payload.get("user_id").is_none());

        let mut numeric = json!({"user_id": 7});
        assert!(take_user_id(&mut numeric).is_err());
    }

    #[test]
    fn test_parse_wine_ids() {
        assert_eq!(
            parse_wine_ids(Some(&json!(["a", 12]))).unwrap(),
            vec!["a".to_string(), "12".to_string()]
        );
        assert!(parse_wine_ids(Some(&json!([]))).unwrap().is_empty());
        assert_eq!(
            parse_wine_ids(None).unwrap_err().to_string(),
            "Missing required field: wine_ids"
        );
        assert!(parse_wine_ids(Some(&json!("a"))).is_err());
        assert!(parse_wine_ids(Some(&json!([true]))).is_err());
    }
}
