use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
    pub providers: ProviderModes,
    pub jobs_in_flight: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub storage: ComponentHealth,
    pub registry: ComponentHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

/// `"live"` or `"offline"` per provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderModes {
    pub identification: String,
    pub market_lookup: String,
}

/// GET /health: dependency status. Offline providers are not a failure.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let orchestrator = &state.orchestrator;

    let start = std::time::Instant::now();
    let storage_check = match orchestrator.store().health_check().await {
        Ok(()) => ComponentHealth {
            status: "ok".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Artifact store health check failed");
            ComponentHealth {
                status: "error".to_string(),
                latency_ms: None,
            }
        }
    };

    let registry_start = std::time::Instant::now();
    let registry_check = match orchestrator.registry().count().await {
        Ok(_) => ComponentHealth {
            status: "ok".to_string(),
            latency_ms: Some(registry_start.elapsed().as_millis() as u64),
        },
        Err(_) => ComponentHealth {
            status: "error".to_string(),
            latency_ms: None,
        },
    };

    let all_healthy = storage_check.status == "ok" && registry_check.status == "ok";
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let uptime = Utc::now().signed_duration_since(state.started_at);

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        checks: HealthChecks {
            storage: storage_check,
            registry: registry_check,
        },
        providers: ProviderModes {
            identification: orchestrator.identifier_mode().to_string(),
            market_lookup: orchestrator.market_mode().to_string(),
        },
        jobs_in_flight: orchestrator.in_flight(),
    };

    (status_code, Json(response))
}
