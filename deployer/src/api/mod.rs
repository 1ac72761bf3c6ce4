use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use shared_types::{ErrorResponse, OperationKind, StatusResponse};
use std::sync::Arc;
use tracing::error;

use crate::{
    gate::{GateOutcome, Rejection},
    AppState,
};

/// Routes for `/{route_token}/deploy` and `/{route_token}/reset`.
///
/// Nothing else is mounted; any other path gets axum's default 404.
pub fn router(route_token: &str) -> Router<AppState> {
    Router::new()
        .route(&operation_path(route_token, OperationKind::Deploy), get(deploy))
        .route(&operation_path(route_token, OperationKind::Reset), get(reset))
}

pub fn operation_path(route_token: &str, kind: OperationKind) -> String {
    format!("/{route_token}/{}", kind.path_segment())
}

/// GET /{token}/deploy — fetch, unpack, down, up
pub async fn deploy(State(state): State<AppState>) -> Response {
    run_gated(&state, OperationKind::Deploy).await
}

/// GET /{token}/reset — down -v, up
pub async fn reset(State(state): State<AppState>) -> Response {
    run_gated(&state, OperationKind::Reset).await
}

async fn run_gated(state: &AppState, kind: OperationKind) -> Response {
    let deployer = Arc::clone(&state.deployer);
    let outcome = state
        .gate
        .try_run(kind, state.operation_timeout, move || async move {
            deployer.run(kind).await
        })
        .await;
    outcome_response(kind, outcome)
}

fn outcome_response(kind: OperationKind, outcome: GateOutcome<()>) -> Response {
    match outcome {
        GateOutcome::Success(()) => Json(StatusResponse::for_operation(kind)).into_response(),
        GateOutcome::Rejected(Rejection::Busy) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse::new("another deploy or reset is in progress")),
        )
            .into_response(),
        GateOutcome::Rejected(Rejection::CoolingDown { retry_after }) => {
            // Round up so a client honouring the header never arrives early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, secs.to_string())],
                Json(ErrorResponse::new(format!("too many requests, retry in {secs}s"))),
            )
                .into_response()
        }
        GateOutcome::TimedOut(limit) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(ErrorResponse::new(format!(
                "{kind} did not finish within {}s",
                limit.as_secs()
            ))),
        )
            .into_response(),
        GateOutcome::Failed(e) => {
            error!(%kind, "request failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use std::time::Duration;

    #[test]
    fn paths_embed_the_token() {
        assert_eq!(operation_path("t0k3n", OperationKind::Deploy), "/t0k3n/deploy");
        assert_eq!(operation_path("t0k3n", OperationKind::Reset), "/t0k3n/reset");
    }

    #[test]
    fn outcomes_map_to_status_codes() {
        let cases = [
            (GateOutcome::Success(()), StatusCode::OK),
            (
                GateOutcome::Rejected(Rejection::Busy),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                GateOutcome::TimedOut(Duration::from_secs(1)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                GateOutcome::Failed(DeployError::Unexpected("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (outcome, expected) in cases {
            assert_eq!(
                outcome_response(OperationKind::Deploy, outcome).status(),
                expected
            );
        }
    }

    #[test]
    fn cooldown_sets_retry_after() {
        let response = outcome_response(
            OperationKind::Reset,
            GateOutcome::Rejected(Rejection::CoolingDown {
                retry_after: Duration::from_millis(4_200),
            }),
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");
    }
}
