use std::{collections::HashMap, sync::Arc};

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use domain::{
    prescriptions::{
        inputs::{DispenseInput, DispenseItemInput, FulfillInput},
        Attachment, DispenseWorkflow, PrescriptionFilter, PrescriptionStatus,
    },
    roles::{self, Capability, SessionUser},
    Error,
};
use serde::Deserialize;
use ulid::Ulid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<DispenseWorkflow>,
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/prescriptions", get(list_prescriptions))
        .route("/prescriptions/summary", get(prescription_summary))
        .route("/prescriptions/:id", get(get_prescription))
        .route("/prescriptions/:id/fulfill", post(fulfill_prescription))
        .route("/prescriptions/:id/dispense", post(upload_dispense_details))
        .route("/activity", get(list_activity))
        .route("/routes/resolve", get(resolve_route))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Identity forwarded by the identity provider in request headers.
pub struct Caller(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        SessionUser::from_profile(&header(USER_ROLE_HEADER), &header(USER_ID_HEADER))
            .map(Caller)
            .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))
    }
}

impl Caller {
    fn require(&self, capability: Capability) -> Result<(), (StatusCode, String)> {
        if self.0.can(capability) {
            Ok(())
        } else {
            Err((
                StatusCode::FORBIDDEN,
                format!("Role {} may not access this resource", self.0.role),
            ))
        }
    }

    fn metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("command_id".to_string(), Ulid::new().to_string()),
            ("user_id".to_string(), self.0.user_id.clone()),
            ("role".to_string(), self.0.role.to_string()),
        ])
    }
}

fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Conflict { .. } => StatusCode::CONFLICT,
        Error::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    status: Option<String>,
    search: Option<String>,
}

// List prescriptions
async fn list_prescriptions(
    caller: Caller,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    caller.require(Capability::DispensePrescriptions)?;

    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(status) => Some(
            status
                .parse::<PrescriptionStatus>()
                .map_err(error_response)?,
        ),
    };
    let filter = PrescriptionFilter {
        status,
        search: params.search,
    };

    let store = state.workflow.store();
    let prescriptions = store.get_all(&filter).await;
    let total = store.summary().await.total;
    let filtered = prescriptions.len();

    Ok(Json(serde_json::json!({
        "prescriptions": prescriptions,
        "total": total,
        "filtered": filtered,
    })))
}

// Dashboard counters
async fn prescription_summary(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    caller.require(Capability::DispensePrescriptions)?;

    Ok(Json(state.workflow.store().summary().await))
}

// Get prescription
async fn get_prescription(
    caller: Caller,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    caller.require(Capability::DispensePrescriptions)?;

    let prescription = state
        .workflow
        .store()
        .get_by_id(&id)
        .await
        .map_err(error_response)?;

    Ok(Json(serde_json::json!({ "prescription": prescription })))
}

// Mark as fulfilled
async fn fulfill_prescription(
    caller: Caller,
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(input): Json<FulfillInput>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    caller.require(Capability::DispensePrescriptions)?;

    let prescription = state
        .workflow
        .mark_fulfilled(&id, input, caller.metadata())
        .await
        .map_err(error_response)?;

    Ok(Json(serde_json::json!({
        "prescription": prescription,
        "message": "Prescription fulfilled successfully",
    })))
}

// Upload dispense details
async fn upload_dispense_details(
    caller: Caller,
    Path(id): Path<String>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    caller.require(Capability::DispensePrescriptions)?;

    let input = read_dispense_form(multipart).await?;
    let receipt = state
        .workflow
        .upload_dispense_details(&id, input, caller.metadata())
        .await
        .map_err(error_response)?;

    Ok(Json(serde_json::json!({
        "prescription": receipt.prescription,
        "dispense_id": receipt.dispense_id,
        "message": "Dispense details uploaded successfully",
    })))
}

/// Reads `dispense_items` (JSON) plus any number of `photos` / `documents` file parts.
async fn read_dispense_form(
    mut multipart: Multipart,
) -> Result<DispenseInput, (StatusCode, String)> {
    let mut input = DispenseInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

        match name.as_str() {
            "dispense_items" => {
                input.items = serde_json::from_slice::<Vec<DispenseItemInput>>(&data).map_err(|e| {
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        format!("Invalid dispense_items: {e}"),
                    )
                })?;
            }
            "photos" => input
                .photos
                .push(Attachment::new(file_name, content_type, data.len() as u64)),
            "documents" => input
                .documents
                .push(Attachment::new(file_name, content_type, data.len() as u64)),
            other => tracing::warn!("Ignoring unexpected form field {}", other),
        }
    }

    Ok(input)
}

#[derive(Debug, Deserialize)]
struct ActivityParams {
    limit: Option<usize>,
}

// Recent activity
async fn list_activity(
    caller: Caller,
    State(state): State<AppState>,
    Query(params): Query<ActivityParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    caller.require(Capability::DispensePrescriptions)?;

    let events = state
        .workflow
        .activity()
        .recent(params.limit.unwrap_or(50))
        .await;

    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
struct ResolveParams {
    path: String,
}

// Role router decision for the caller
async fn resolve_route(
    caller: Option<Caller>,
    Query(params): Query<ResolveParams>,
) -> impl IntoResponse {
    let user = caller.map(|Caller(user)| user);
    Json(roles::resolve(user.as_ref(), &params.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use chrono::{Duration, Utc};
    use domain::{
        persistence::{MemoryPort, PersistencePort},
        prescriptions::cqrs,
        Config,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "dispense-form-boundary";

    async fn app() -> Router {
        let port: Arc<dyn PersistencePort> = Arc::new(MemoryPort::new());
        let config = Config::default();
        let (workflow, _) = cqrs::init(port, &config).await.unwrap();
        router(AppState { workflow }, config.max_body_bytes)
    }

    fn request(method: &str, uri: &str, role: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match role {
            Some(role) => builder
                .header(USER_ID_HEADER, "user-1")
                .header(USER_ROLE_HEADER, role),
            None => builder,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn json_body(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    fn fulfill_request(fulfilled_by: &str) -> Request<Body> {
        request("POST", "/prescriptions/RX-2001/fulfill", Some("pharmacist"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "fulfilled_by": fulfilled_by, "fulfilled_date": "2025-09-15" }).to_string(),
            ))
            .unwrap()
    }

    fn dispense_request(photo_type: &str) -> Request<Body> {
        let expiry = (Utc::now() + Duration::days(30)).format("%Y-%m-%d").to_string();
        let items = json!([
            {
                "medicine_id": "med_0",
                "dispensed_qty": 1,
                "batch_no": "BT001",
                "expiry_date": expiry,
            },
            {
                "medicine_id": "med_1",
                "dispensed_qty": 2,
                "batch_no": "BT002",
                "expiry_date": expiry,
            },
        ]);
        let body = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"dispense_items\"\r\n\r\n\
             {items}\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"photos\"; filename=\"counter.jpg\"\r\n\
             Content-Type: {photo_type}\r\n\r\n\
             not-really-a-jpeg\r\n\
             --{b}--\r\n",
            b = BOUNDARY,
        );

        request("POST", "/prescriptions/RX-2001/dispense", Some("pharmacist"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let app = app().await;
        let (status, _) = send(
            &app,
            request("GET", "/prescriptions", None)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            request("GET", "/prescriptions", Some("janitor")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn other_roles_are_forbidden() {
        let app = app().await;
        let (status, _) = send(
            &app,
            request("GET", "/prescriptions", Some("doctor")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn lists_and_filters_prescriptions() {
        let app = app().await;

        let (status, body) = send(
            &app,
            request("GET", "/prescriptions?status=all&search=ravi", Some("pharmacist"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        assert_eq!(body["total"], 1);
        assert_eq!(body["filtered"], 1);
        assert_eq!(body["prescriptions"][0]["prescription_id"], "RX-2001");

        let (_, body) = send(
            &app,
            request("GET", "/prescriptions?status=Dispensed", Some("pharmacist"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(json_body(&body)["filtered"], 0);

        let (status, _) = send(
            &app,
            request("GET", "/prescriptions?status=Lost", Some("pharmacist"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_prescription_is_404() {
        let app = app().await;
        let (status, _) = send(
            &app,
            request("GET", "/prescriptions/RX-9999", Some("pharmacist"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fulfill_then_refulfill_conflicts() {
        let app = app().await;

        let (status, body) = send(&app, fulfill_request("Pharmacy Staff")).await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        assert_eq!(body["prescription"]["status"], "Dispensed");
        assert!(body["prescription"].get("dispense_id").is_none());

        let (status, _) = send(&app, fulfill_request("Pharmacy Staff")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = send(
            &app,
            request("GET", "/prescriptions/summary", Some("pharmacist"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(json_body(&body), json!({ "total": 1, "pending": 0, "dispensed": 1 }));
    }

    #[tokio::test]
    async fn invalid_fulfillment_is_422_with_message() {
        let app = app().await;
        let (status, body) = send(&app, fulfill_request("   ")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(String::from_utf8(body).unwrap(), "Fulfilled by is required");
    }

    #[tokio::test]
    async fn multipart_dispense_upload_succeeds() {
        let app = app().await;
        let (status, body) = send(&app, dispense_request("image/jpeg")).await;

        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        let dispense_id = body["dispense_id"].as_str().unwrap();
        assert!(dispense_id.starts_with("D-"));
        assert_eq!(body["prescription"]["dispense_id"], dispense_id);
        assert_eq!(body["prescription"]["photos"][0]["file_name"], "counter.jpg");
        assert_eq!(body["prescription"]["dispense_items"][1]["dispensed_qty"], 2);
    }

    #[tokio::test]
    async fn non_image_photo_is_rejected() {
        let app = app().await;
        let (status, body) = send(&app, dispense_request("text/plain")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "counter.jpg is not a valid image format"
        );
    }

    #[tokio::test]
    async fn activity_reflects_submissions() {
        let app = app().await;
        send(&app, fulfill_request("Pharmacy Staff")).await;

        let (status, body) = send(
            &app,
            request("GET", "/activity?limit=2", Some("pharmacist"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        assert_eq!(body[0]["event_name"], "fulfill_success");
        assert_eq!(body[0]["user_id"], "user-1");
        assert_eq!(body[1]["event_name"], "fulfill_request");
    }

    #[tokio::test]
    async fn resolve_route_applies_role_table() {
        let app = app().await;

        let (_, body) = send(
            &app,
            request("GET", "/routes/resolve?path=/pharmacy/dashboard", None)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(json_body(&body), json!({ "decision": "redirect", "view": "entry" }));

        let (_, body) = send(
            &app,
            request("GET", "/routes/resolve?path=/pharmacy/dashboard", Some("pharmacist"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(
            json_body(&body),
            json!({ "decision": "enter", "view": "pharmacy_dashboard" })
        );
    }
}
