use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Json;
use serde_json::{Value, json};
use services::auth::{AuthClient, AuthConfig, SignUpOutcome};
use services::error::{AuthError, InferenceError};
use services::inference::{InferenceClient, InferenceConfig, TextGenerator};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: String) -> InferenceClient {
    InferenceClient::new(InferenceConfig {
        base_url,
        model: "test-model".into(),
    })
}

#[tokio::test]
async fn generate_returns_the_response_field() {
    let router = Router::new().route(
        "/api/generate",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "test-model");
            assert_eq!(body["stream"], false);
            Json(json!({ "response": format!("  echo: {}  ", body["prompt"].as_str().unwrap()) }))
        }),
    );
    let base = serve(router).await;

    let text = client(base).generate("hello").await.unwrap();
    assert_eq!(text, "echo: hello");
}

#[tokio::test]
async fn server_errors_surface_the_status() {
    let router = Router::new().route(
        "/api/generate",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
    );
    let base = serve(router).await;

    let err = client(base).generate("hello").await.unwrap_err();
    assert!(matches!(
        err,
        InferenceError::HttpStatus(StatusCode::INTERNAL_SERVER_ERROR)
    ));
}

#[tokio::test]
async fn missing_or_blank_response_is_empty() {
    let router = Router::new()
        .route("/missing/api/generate", post(|| async { Json(json!({ "done": true })) }))
        .route(
            "/blank/api/generate",
            post(|| async { Json(json!({ "response": "   " })) }),
        );
    let base = serve(router).await;

    for prefix in ["missing", "blank"] {
        let err = client(format!("{base}/{prefix}"))
            .generate("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::EmptyResponse), "{prefix}");
    }
}

#[tokio::test]
async fn unreachable_server_is_an_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(format!("http://{addr}"))
        .generate("hello")
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::Http(_)));
}

const USER_ID: &str = "6f1c1c3e-8a55-4c1e-9f59-2b8f7c1d0a11";

fn auth_router() -> Router {
    Router::new()
        .route(
            "/auth/v1/token",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["apikey"], "anon");
                if body["password"] == "correct horse" {
                    (
                        StatusCode::OK,
                        Json(json!({
                            "access_token": "jwt",
                            "user": { "id": USER_ID, "email": body["email"] },
                        })),
                    )
                } else {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error_description": "Invalid login credentials" })),
                    )
                }
            }),
        )
        .route(
            "/auth/v1/signup",
            post(|| async { Json(json!({ "id": USER_ID, "email": "new@example.com" })) }),
        )
}

fn auth_client(base_url: String) -> AuthClient {
    AuthClient::new(Some(AuthConfig {
        base_url,
        anon_key: "anon".into(),
    }))
}

#[tokio::test]
async fn sign_in_yields_a_session_or_the_provider_reason() {
    let auth = auth_client(serve(auth_router()).await);

    let session = auth
        .sign_in("learner@example.com", "correct horse")
        .await
        .unwrap();
    assert_eq!(session.user_id.to_string(), USER_ID);
    assert_eq!(session.email, "learner@example.com");
    assert_eq!(session.access_token, "jwt");

    let err = auth.sign_in("learner@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected(reason) if reason == "Invalid login credentials"));
}

#[tokio::test]
async fn sign_up_without_session_needs_confirmation() {
    let auth = auth_client(serve(auth_router()).await);
    let outcome = auth.sign_up("new@example.com", "secret123").await.unwrap();
    assert_eq!(
        outcome,
        SignUpOutcome::ConfirmationRequired {
            email: "new@example.com".into()
        }
    );
}

#[tokio::test]
async fn disabled_auth_refuses_without_a_request() {
    let auth = AuthClient::new(None);
    assert!(!auth.enabled());
    assert!(matches!(
        auth.sign_in("a@b.c", "pw").await,
        Err(AuthError::Disabled)
    ));
}
