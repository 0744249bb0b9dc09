//! Client and seller provisioning endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::PersonId;
use domain::{CreateClient, CreateSeller, PersonDetails, UpdateClient, UpdateSeller};
use saga::{CommandResult, CredentialStore, PaymentGateway};
use serde::{Deserialize, Serialize};
use store::BusinessStore;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

/// Body of `PUT /clients/{id}`; the id comes from the path.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    #[serde(flatten)]
    pub details: PersonDetails,
    #[serde(default)]
    pub seller_id: Option<PersonId>,
}

/// Body of `PUT /sellers/{id}`; the id comes from the path.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSellerRequest {
    #[serde(flatten)]
    pub details: PersonDetails,
    #[serde(default)]
    pub parent_seller_id: Option<PersonId>,
    #[serde(default)]
    pub commission: f64,
}

// -- Response types --

#[derive(Debug, Clone, Serialize)]
pub struct PersonResponse {
    pub id: PersonId,
}

type Envelope = Json<CommandResult<PersonResponse>>;

// -- Handlers --

/// POST /clients
#[tracing::instrument(skip_all)]
pub async fn create_client<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    payload: Result<Json<CreateClient>, JsonRejection>,
) -> Result<(StatusCode, Envelope), ApiError>
where
    S: BusinessStore,
    C: CredentialStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let Json(command) = payload.map_err(bad_body)?;
    let id = state.provisioning.create_client(&command).await?;
    Ok(created("Client created", id))
}

/// PUT /clients/{id}
#[tracing::instrument(skip_all)]
pub async fn update_client<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    id: Result<Path<PersonId>, PathRejection>,
    payload: Result<Json<UpdateClientRequest>, JsonRejection>,
) -> Result<Envelope, ApiError>
where
    S: BusinessStore,
    C: CredentialStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let Path(id) = id.map_err(bad_path)?;
    let Json(body) = payload.map_err(bad_body)?;
    let command = UpdateClient {
        id,
        details: body.details,
        seller_id: body.seller_id,
    };
    let id = state.provisioning.update_client(&command).await?;
    Ok(Json(CommandResult::success(
        "Client updated",
        PersonResponse { id },
    )))
}

/// POST /sellers
#[tracing::instrument(skip_all)]
pub async fn create_seller<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    payload: Result<Json<CreateSeller>, JsonRejection>,
) -> Result<(StatusCode, Envelope), ApiError>
where
    S: BusinessStore,
    C: CredentialStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let Json(command) = payload.map_err(bad_body)?;
    let id = state.provisioning.create_seller(&command).await?;
    Ok(created("Seller created", id))
}

/// PUT /sellers/{id}
#[tracing::instrument(skip_all)]
pub async fn update_seller<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    id: Result<Path<PersonId>, PathRejection>,
    payload: Result<Json<UpdateSellerRequest>, JsonRejection>,
) -> Result<Envelope, ApiError>
where
    S: BusinessStore,
    C: CredentialStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let Path(id) = id.map_err(bad_path)?;
    let Json(body) = payload.map_err(bad_body)?;
    let command = UpdateSeller {
        id,
        details: body.details,
        parent_seller_id: body.parent_seller_id,
        commission: body.commission,
    };
    let id = state.provisioning.update_seller(&command).await?;
    Ok(Json(CommandResult::success(
        "Seller updated",
        PersonResponse { id },
    )))
}

fn created(message: &str, id: PersonId) -> (StatusCode, Envelope) {
    (
        StatusCode::CREATED,
        Json(CommandResult::success(message, PersonResponse { id })),
    )
}

pub(crate) fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

fn bad_path(rejection: PathRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid ID format: {}", rejection.body_text()))
}
