use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use serde::Deserialize;
use std::sync::Arc;
use vitalid_core::{
    BiometricSample, Embedding, EmbeddingExtractor, Enroller, EnrollmentRequest, Error,
    FingerprintHash, IdentifierAllocator, IdentityResolver, SubjectId,
};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Face embedding as a JSON array or the comma-separated text form
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingInput {
    Values(Vec<f32>),
    Text(String),
}

impl EmbeddingInput {
    fn into_embedding(self) -> vitalid_core::Result<Embedding> {
        match self {
            EmbeddingInput::Values(values) => Embedding::try_new(values),
            EmbeddingInput::Text(text) => Embedding::parse(&text),
        }
    }
}

#[derive(Deserialize)]
struct BiometricRequest {
    face_embedding: Option<EmbeddingInput>,
    fingerprint_hash: Option<String>,
}

impl BiometricRequest {
    fn fingerprint(&self) -> Option<&str> {
        self.fingerprint_hash.as_deref().filter(|h| !h.is_empty())
    }

    fn into_sample(self) -> vitalid_core::Result<BiometricSample> {
        // same canonical form as enrollment, so any spelling a client enrolled with matches
        let fingerprint_hash = self.fingerprint().map(FingerprintHash::normalized).transpose()?;
        let embedding = match (&fingerprint_hash, self.face_embedding) {
            (None, Some(input)) => Some(input.into_embedding()?),
            _ => None,
        };
        Ok(BiometricSample {
            fingerprint_hash,
            embedding,
        })
    }

    fn into_enrollment(self) -> vitalid_core::Result<EnrollmentRequest> {
        let fingerprint_hash = self.fingerprint().map(str::to_string);
        let embedding = match self.face_embedding {
            Some(input) => Some(input.into_embedding()?.into_inner()),
            None => None,
        };
        Ok(EnrollmentRequest {
            embedding,
            fingerprint_hash,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] Error),

    #[error("image identification is not configured")]
    ExtractorUnavailable,

    #[error("no matching subject found")]
    NoMatch,

    #[error("blocking task failed: {0}")]
    Blocking(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => match e {
                Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                Error::AllocationExhausted { .. }
                | Error::PersistenceExhausted { .. }
                | Error::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
                Error::Extraction(_) => StatusCode::BAD_GATEWAY,
                Error::StoreIntegrityViolation { .. } | Error::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::ExtractorUnavailable => StatusCode::NOT_IMPLEMENTED,
            ApiError::NoMatch => StatusCode::NOT_FOUND,
            ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let retryable = matches!(self, ApiError::Core(e) if e.is_retryable());
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
            "retryable": retryable,
        }))
    }
}

/// Shared handles for request handlers. Stateless apart from the stores.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<IdentityResolver>,
    pub allocator: Arc<IdentifierAllocator>,
    pub enroller: Arc<Enroller>,
    pub extractor: Option<Arc<dyn EmbeddingExtractor>>,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(state: AppState, port: u16) -> std::io::Result<()> {
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .configure(Self::configure(state.clone()))
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }

    /// Register state and routes; shared by the server and tests
    pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
        move |cfg| {
            cfg.app_data(web::Data::new(state))
                .app_data(web::PayloadConfig::new(MAX_IMAGE_BYTES))
                .route("/health", web::get().to(health))
                .route("/subjects/{id}/biometrics", web::put().to(enroll))
                .route("/subjects/{id}/emergency-id", web::post().to(ensure_emergency_id))
                .route("/resolve", web::post().to(resolve))
                .route("/resolve/face-image", web::post().to(resolve_face_image))
                .route("/emergency/verify-biometric", web::post().to(verify_biometric_public));
        }
    }
}

async fn run_blocking<F, R>(f: F) -> Result<R, ApiError>
where
    F: FnOnce() -> vitalid_core::Result<R> + Send + 'static,
    R: Send + 'static,
{
    let result = web::block(f)
        .await
        .map_err(|e| ApiError::Blocking(e.to_string()))?;
    Ok(result?)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn enroll(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<BiometricRequest>,
) -> Result<HttpResponse, ApiError> {
    let subject = SubjectId::from(path.into_inner());
    let request = req.into_inner().into_enrollment()?;
    let enroller = state.enroller.clone();

    let update = run_blocking(move || enroller.enroll(&subject, request)).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "face": update.embedding.is_some(),
        "fingerprint": update.fingerprint_hash.is_some(),
    })))
}

async fn ensure_emergency_id(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let subject = SubjectId::from(path.into_inner());
    let allocator = state.allocator.clone();

    let emergency_id = run_blocking(move || allocator.ensure_identifier(&subject)).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "emergency_id": emergency_id })))
}

/// Trusted resolution: the full match result
async fn resolve(
    state: web::Data<AppState>,
    req: web::Json<BiometricRequest>,
) -> Result<HttpResponse, ApiError> {
    let sample = req.into_inner().into_sample()?;
    let resolver = state.resolver.clone();

    let result = run_blocking(move || resolver.resolve(&sample)).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn resolve_face_image(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let extractor = state.extractor.clone().ok_or(ApiError::ExtractorUnavailable)?;
    let resolver = state.resolver.clone();

    let result =
        run_blocking(move || resolver.resolve_by_face_image(extractor.as_ref(), &body)).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Untrusted (kiosk) resolution: discloses only the emergency identifier
async fn verify_biometric_public(
    state: web::Data<AppState>,
    req: web::Json<BiometricRequest>,
) -> Result<HttpResponse, ApiError> {
    let sample = req.into_inner().into_sample()?;
    let resolver = state.resolver.clone();
    let allocator = state.allocator.clone();

    let emergency_id = run_blocking(move || {
        let result = resolver.resolve(&sample)?;
        match result.subject_id() {
            Some(subject) => allocator.ensure_identifier(subject).map(Some),
            None => Ok(None),
        }
    })
    .await?;

    match emergency_id {
        Some(id) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "match": true,
            "emergency_id": id,
        }))),
        None => Err(ApiError::NoMatch),
    }
}
