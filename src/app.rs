//! HTTP API.
//!
//! Handlers stay thin: request extraction and response shaping live here,
//! the work happens in [queries](crate::queries) and
//! [projects](crate::projects).

use crate::app_state::{AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::error::ExpressionQueryError;
use crate::metrics;
use crate::models;
use crate::projects;
use crate::queries;
use crate::table;
use crate::validated_json::ValidatedJson;
use crate::widgets::ListEntry;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::Layer;
use tower::ServiceBuilder;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

/// The app service type, with trailing slashes normalized away.
pub type Service = NormalizePath<Router>;

/// Initialise the application.
///
/// Ensures the published plot directory exists.
pub fn init(args: &CommandLineArgs) {
    std::fs::create_dir_all(&args.plot_dir).expect("failed to create the plot directory");
}

/// Returns the app [Service], with shared state attached.
pub fn service(args: &CommandLineArgs) -> Service {
    let shared_state = Arc::new(AppState::new(args));
    NormalizePathLayer::trim_trailing_slash().layer(router(shared_state))
}

/// Returns the app [Router].
pub fn router(state: SharedAppState) -> Router {
    fn v1(state: SharedAppState) -> Router {
        Router::new()
            .route("/search/gene", post(search_gene))
            .route("/search/gene/isoforms", post(gene_isoforms))
            .route("/search/transcript", post(search_transcript))
            .route("/search/feature", post(search_feature))
            .route("/search/condition", post(search_condition))
            .route("/search/diff-fold-expr", post(search_diff_fold_expr))
            .route("/plot/gene", post(plot_gene))
            .route("/projects", get(get_projects))
            .route("/projects/overview", get(projects_overview))
            .route("/genes/:bioproject", get(genes))
            .route("/transcripts/:bioproject", get(transcripts))
            .route("/features", get(features))
            .route("/measures", get(measures))
            .route("/covariates/:bioproject", get(covariates))
            .route(
                "/covariate-values/:bioproject/:covariate",
                get(covariate_values),
            )
            .route("/downloads", get(downloads))
            .route("/cache/clear", post(clear_cache))
            .with_state(state)
            .layer(
                ServiceBuilder::new().layer(
                    TraceLayer::new_for_http()
                        .on_request(metrics::request_counter)
                        .on_response(metrics::record_response_metrics),
                ),
            )
    }

    Router::new()
        .route("/.well-known/expressionist-schema", get(schema))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/v1", v1(state))
}

async fn schema() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

async fn search_gene(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::GeneSearchRequest>,
) -> Result<Json<table::RenderedTable>, ExpressionQueryError> {
    queries::search_by_gene(&state, request).await.map(Json)
}

async fn gene_isoforms(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::GeneSearchRequest>,
) -> Result<Json<table::RenderedTable>, ExpressionQueryError> {
    queries::gene_isoforms(&state, request).await.map(Json)
}

async fn search_transcript(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::TranscriptSearchRequest>,
) -> Result<Json<table::RenderedTable>, ExpressionQueryError> {
    queries::search_by_transcript(&state, request).await.map(Json)
}

async fn search_feature(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::FeatureSearchRequest>,
) -> Result<Json<table::RenderedTable>, ExpressionQueryError> {
    queries::search_by_feature(&state, request).await.map(Json)
}

async fn search_condition(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::ConditionSearchRequest>,
) -> Result<Json<table::RenderedTable>, ExpressionQueryError> {
    queries::search_by_condition(&state, request).await.map(Json)
}

async fn search_diff_fold_expr(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::DiffFoldExprRequest>,
) -> Result<Json<table::RenderedTable>, ExpressionQueryError> {
    queries::search_by_diff_fold_expr(&state, request)
        .await
        .map(Json)
}

async fn plot_gene(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::GenePlotRequest>,
) -> Result<Response, ExpressionQueryError> {
    match queries::plot_gene(&state, request).await? {
        Some(widget) => Ok(Json(widget).into_response()),
        None => Ok(Json(table::empty_table()).into_response()),
    }
}

async fn get_projects(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<ListEntry>>, ExpressionQueryError> {
    projects::list_projects(&state.data_dir()).map(Json)
}

async fn projects_overview(
    State(state): State<SharedAppState>,
) -> Result<Json<projects::Overview>, ExpressionQueryError> {
    projects::dataset_overview(&state.data_dir()).map(Json)
}

/// Optional substring filter for the typeahead lists.
#[derive(Debug, Default, Deserialize)]
struct PrefixParams {
    #[serde(default)]
    prefix: String,
}

async fn genes(
    State(state): State<SharedAppState>,
    Path(bioproject): Path<String>,
    Query(params): Query<PrefixParams>,
) -> Result<Json<Vec<ListEntry>>, ExpressionQueryError> {
    models::validate_bioproject(&bioproject)?;
    queries::list_genes(&state, &bioproject, &params.prefix)
        .await
        .map(Json)
}

async fn transcripts(
    State(state): State<SharedAppState>,
    Path(bioproject): Path<String>,
    Query(params): Query<PrefixParams>,
) -> Result<Json<Vec<ListEntry>>, ExpressionQueryError> {
    models::validate_bioproject(&bioproject)?;
    queries::list_transcripts(&state, &bioproject, &params.prefix)
        .await
        .map(Json)
}

async fn features() -> Json<Vec<ListEntry>> {
    Json(queries::list_features())
}

async fn measures() -> Json<Vec<ListEntry>> {
    Json(queries::list_measures())
}

async fn covariates(
    State(state): State<SharedAppState>,
    Path(bioproject): Path<String>,
) -> Result<Json<Vec<ListEntry>>, ExpressionQueryError> {
    models::validate_bioproject(&bioproject)?;
    queries::list_covariates(&state, &bioproject).await.map(Json)
}

async fn covariate_values(
    State(state): State<SharedAppState>,
    Path((bioproject, covariate)): Path<(String, String)>,
) -> Result<Json<Vec<ListEntry>>, ExpressionQueryError> {
    models::validate_bioproject(&bioproject)?;
    queries::list_covariate_values(&state, &bioproject, &covariate)
        .await
        .map(Json)
}

async fn downloads() -> Json<table::RenderedTable> {
    Json(table::empty_table())
}

async fn clear_cache(State(state): State<SharedAppState>) -> &'static str {
    state.cache.clear().await;
    "OK"
}
