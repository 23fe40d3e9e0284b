//! Vision proxy and label matching handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use warung_core::{detection_labels, match_label, DetectResponse, Product};

use crate::error::ApiError;
use crate::state::AppState;

/// Prompts used when no product carries a detection label.
const FALLBACK_PROMPTS: [&str; 3] = ["box", "tube", "bottle"];

/// Detection request.
#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    /// Base64-encoded frame, with or without a data-URL prefix.
    pub image: Option<String>,
    /// Candidate labels; defaults to the catalog's detection labels.
    #[serde(default)]
    pub prompts: Option<Vec<String>>,
}

/// Label match request.
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    /// Label reported by the detector.
    #[serde(alias = "detectedLabel", alias = "detected_name")]
    pub detected_label: String,
}

/// Label match response.
#[derive(Debug, Serialize)]
pub struct MatchResponse {
    /// Whether a product was found.
    pub matched: bool,
    /// The matched product.
    pub product: Option<Product>,
}

/// Detection labels response.
#[derive(Debug, Serialize)]
pub struct LabelsResponse {
    /// Distinct labels, sorted.
    pub labels: Vec<String>,
}

/// Run object detection on a frame.
///
/// An unconfigured or failing detector yields `{success: false, results: []}`.
pub async fn detect(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let image = body
        .image
        .filter(|i| !i.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("image is required".into()))?;

    let Some(vision) = &state.vision else {
        tracing::debug!("Detection requested but no vision backend is configured");
        return Ok(Json(DetectResponse::unavailable()));
    };

    let prompts = match body.prompts.filter(|p| !p.is_empty()) {
        Some(prompts) => prompts,
        None => default_prompts(&state.store.list_products()?),
    };

    match vision.segment(strip_data_url(&image), &prompts).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::warn!(error = %e, "Object detection failed");
            Ok(Json(DetectResponse::unavailable()))
        }
    }
}

/// Resolve a detected label to a catalog product.
pub async fn match_product(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, ApiError> {
    if body.detected_label.trim().is_empty() {
        return Err(ApiError::BadRequest("detected_label is required".into()));
    }

    let products = state.store.list_products()?;
    let product = match_label(&products, &body.detected_label).cloned();

    tracing::debug!(
        label = %body.detected_label,
        product_id = ?product.as_ref().map(|p| p.id),
        "Label matched"
    );

    Ok(Json(MatchResponse {
        matched: product.is_some(),
        product,
    }))
}

/// Detection labels configured across the catalog.
pub async fn list_detection_labels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LabelsResponse>, ApiError> {
    let products = state.store.list_products()?;
    Ok(Json(LabelsResponse {
        labels: detection_labels(&products),
    }))
}

fn default_prompts(products: &[Product]) -> Vec<String> {
    let labels = detection_labels(products);
    if labels.is_empty() {
        FALLBACK_PROMPTS.iter().map(ToString::to_string).collect()
    } else {
        labels
    }
}

fn strip_data_url(image: &str) -> &str {
    match image.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_is_removed() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }

    #[test]
    fn empty_catalog_uses_fallback_prompts() {
        assert_eq!(default_prompts(&[]), vec!["box", "tube", "bottle"]);
    }

    #[test]
    fn match_request_accepts_camel_case() {
        let req: MatchRequest = serde_json::from_str(r#"{"detectedLabel": "bottle"}"#).unwrap();
        assert_eq!(req.detected_label, "bottle");
    }
}
