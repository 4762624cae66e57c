mod common;

use std::collections::BTreeSet;

use axum::{
    body::Body,
    http::{self, Request, header},
};
use http_body_util::BodyExt;
use rstest::*;
use tower::ServiceExt;
use admission_validators::admission_response::StatusReason;
use webhook_server::{api::admission_review::AdmissionReviewResponse, config::Webhook};

use crate::common::{app, default_test_config};

const POD_PATH: &str = "/validate-v1-pod";
const CRONJOB_PATH: &str = "/validate-batch-tutorial-kubebuilder-io-v1-cronjob";

fn validate_request(uri: &str, payload: &str) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .header(header::CONTENT_TYPE, "application/json")
        .uri(uri)
        .body(Body::from(payload.to_owned()))
        .unwrap()
}

async fn admission_review_response(
    response: axum::response::Response,
) -> AdmissionReviewResponse {
    serde_json::from_slice(&response.into_body().collect().await.unwrap().to_bytes()).unwrap()
}

#[tokio::test]
#[rstest]
#[case::pod_with_annotation(
    POD_PATH,
    include_str!("data/pod_with_annotation.json"),
    "1299d386-525b-4032-98ae-1949f69f9cfc",
    true,
    None,
)]
#[case::pod_without_annotation(
    POD_PATH,
    include_str!("data/pod_without_annotation.json"),
    "3e5a6ad6-2c37-45c5-8e61-8d0a5a2d1c7e",
    false,
    Some("missing annotation example-mutating-admission-webhook"),
)]
#[case::pod_with_wrong_annotation_value(
    POD_PATH,
    include_str!("data/pod_with_wrong_annotation_value.json"),
    "b2fd5b8a-4f0b-4a38-9f0f-6a3f1e9d4d21",
    false,
    Some("annotation example-mutating-admission-webhook did not have value \"foo\""),
)]
#[case::valid_cronjob(
    CRONJOB_PATH,
    include_str!("data/valid_cronjob.json"),
    "0df28fbd-5f5f-4b38-a4c2-6a1e3b5a1f10",
    true,
    None,
)]
#[case::cronjob_with_long_name(
    CRONJOB_PATH,
    include_str!("data/cronjob_with_long_name.json"),
    "f6a51d3e-8c5b-4a0e-9a55-25b0c1d3a7e2",
    false,
    Some("must be no more than 63 characters"),
)]
async fn test_validate(
    #[case] uri: &str,
    #[case] payload: &str,
    #[case] expected_uid: &str,
    #[case] expected_allowed: bool,
    #[case] expected_message: Option<&str>,
) {
    let app = app(default_test_config()).await;

    let response = app.oneshot(validate_request(uri, payload)).await.unwrap();

    assert_eq!(response.status(), 200);

    let admission_review_response = admission_review_response(response).await;
    assert_eq!(admission_review_response.api_version, "admission.k8s.io/v1");
    assert_eq!(admission_review_response.kind, "AdmissionReview");
    assert_eq!(admission_review_response.response.uid, expected_uid);
    assert_eq!(admission_review_response.response.allowed, expected_allowed);

    if let Some(expected_message) = expected_message {
        let message = admission_review_response
            .response
            .status
            .expect("status should be filled")
            .message
            .expect("message should be filled");
        assert!(
            message.contains(expected_message),
            "{message:?} does not contain {expected_message:?}"
        );
    }
}

#[tokio::test]
async fn test_validate_undecodable_object() {
    let app = app(default_test_config()).await;
    let mut payload: serde_json::Value =
        serde_json::from_str(include_str!("data/pod_with_annotation.json")).unwrap();
    payload["request"]["object"]["metadata"]["annotations"] = serde_json::json!("not a map");

    let response = app
        .oneshot(validate_request(POD_PATH, &payload.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);

    let admission_review_response = admission_review_response(response).await;
    assert!(!admission_review_response.response.allowed);
    let status = admission_review_response
        .response
        .status
        .expect("status should be filled");
    assert_eq!(status.code, Some(400));
    assert_eq!(status.reason, Some(StatusReason::BadRequest));
}

#[tokio::test]
async fn test_validate_delete_is_allowed() {
    let app = app(default_test_config()).await;
    let mut payload: serde_json::Value =
        serde_json::from_str(include_str!("data/cronjob_with_long_name.json")).unwrap();
    payload["request"]["operation"] = serde_json::json!("DELETE");
    payload["request"]["oldObject"] = payload["request"]["object"].take();

    let response = app
        .oneshot(validate_request(CRONJOB_PATH, &payload.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(admission_review_response(response).await.response.allowed);
}

#[tokio::test]
async fn test_validate_invalid_payload() {
    let app = app(default_test_config()).await;

    let response = app
        .oneshot(validate_request(POD_PATH, "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), 422);

    let body: serde_json::Value =
        serde_json::from_slice(&response.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["status"], 422);
    assert!(body["message"].is_string());
}

#[tokio::test]
#[rstest]
#[case::v1beta1_review("apiVersion", Some("admission.k8s.io/v1beta1"))]
#[case::wrong_kind("kind", Some("ConversionReview"))]
#[case::missing_api_version("apiVersion", None)]
async fn test_validate_unsupported_envelope(#[case] field: &str, #[case] value: Option<&str>) {
    let app = app(default_test_config()).await;
    let mut payload: serde_json::Value =
        serde_json::from_str(include_str!("data/pod_with_annotation.json")).unwrap();
    match value {
        Some(value) => payload[field] = serde_json::json!(value),
        None => {
            payload.as_object_mut().unwrap().remove(field);
        }
    }

    let response = app
        .oneshot(validate_request(POD_PATH, &payload.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), 400);

    let body: serde_json::Value =
        serde_json::from_slice(&response.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["status"], 400);
    let message = body["message"].as_str().unwrap();
    assert!(
        message.contains("expected admission.k8s.io/v1/AdmissionReview"),
        "{message:?}"
    );
}

#[tokio::test]
async fn test_validate_malformed_json() {
    let app = app(default_test_config()).await;

    let response = app
        .oneshot(validate_request(POD_PATH, "this is not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_validate_missing_content_type() {
    let app = app(default_test_config()).await;

    let request = Request::builder()
        .method(http::Method::POST)
        .uri(POD_PATH)
        .body(Body::from(include_str!("data/pod_with_annotation.json")))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 415);
}

#[tokio::test]
async fn test_disabled_webhook_is_not_routed() {
    let mut config = default_test_config();
    config.webhooks = BTreeSet::from([Webhook::CronJob]);
    let app = app(config).await;

    let response = app
        .clone()
        .oneshot(validate_request(
            POD_PATH,
            include_str!("data/pod_with_annotation.json"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = app
        .oneshot(validate_request(
            CRONJOB_PATH,
            include_str!("data/valid_cronjob.json"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = app(default_test_config()).await;

    let response = app
        .oneshot(validate_request(
            "/validate/does_not_exist",
            include_str!("data/pod_with_annotation.json"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_readiness() {
    let app = app(default_test_config()).await;

    let request = Request::builder()
        .uri("/readiness")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 200);
}

// helper functions for the HTTPS tests, certificate hot reload is supported only on Linux
#[cfg(target_os = "linux")]
mod certificate_reload_helpers {
    use std::net::SocketAddr;
    use std::time::Duration;

    pub struct TlsData {
        pub key: String,
        pub cert: String,
    }

    /// Self-signed certificate for `localhost`, clients trust it directly.
    pub fn create_cert(common_name: &str) -> TlsData {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(vec!["localhost".to_owned()]).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, common_name);
        let cert = params.self_signed(&key_pair).unwrap();

        TlsData {
            key: key_pair.serialize_pem(),
            cert: cert.pem(),
        }
    }

    pub fn free_local_address() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    /// A client that accepts only the given certificate.
    pub fn client_trusting(cert: &str, address: SocketAddr) -> reqwest::Client {
        reqwest::Client::builder()
            .add_root_certificate(reqwest::Certificate::from_pem(cert.as_bytes()).unwrap())
            .resolve("localhost", address)
            .build()
            .unwrap()
    }

    pub async fn is_served_with(cert: &str, address: SocketAddr) -> bool {
        let url = format!("https://localhost:{}/readiness", address.port());
        client_trusting(cert, address)
            .get(url)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    pub async fn wait_until_served_with(cert: &str, address: SocketAddr) -> bool {
        let sleep_interval = Duration::from_millis(500);
        let max_retries = 20;
        for _ in 0..max_retries {
            if is_served_with(cert, address).await {
                return true;
            }
            tokio::time::sleep(sleep_interval).await;
        }
        false
    }
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread")]
async fn test_https_validation_and_certificate_rotation() {
    use certificate_reload_helpers::*;
    use webhook_server::{WebhookServer, config::TlsConfig};

    // the server picks its provider explicitly, the HTTPS client relies on the process default
    let _ = rustls::crypto::ring::default_provider().install_default();

    let certs_dir = tempfile::tempdir().unwrap();
    let cert_file = certs_dir.path().join("tls.crt");
    let key_file = certs_dir.path().join("tls.key");

    let tls_data1 = create_cert("cert1.example.com");
    std::fs::write(&cert_file, &tls_data1.cert).unwrap();
    std::fs::write(&key_file, &tls_data1.key).unwrap();

    let address = free_local_address();
    let mut config = default_test_config();
    config.addr = address;
    config.tls_config = Some(TlsConfig {
        cert_file: cert_file.clone(),
        key_file: key_file.clone(),
        client_ca_file: vec![],
    });

    let server = WebhookServer::new_from_config(config).await.unwrap();
    tokio::spawn(async move {
        server.run().await.unwrap();
    });
    assert!(wait_until_served_with(&tls_data1.cert, address).await);

    // a full admission review over HTTPS
    let response = client_trusting(&tls_data1.cert, address)
        .post(format!("https://localhost:{}{POD_PATH}", address.port()))
        .header(header::CONTENT_TYPE, "application/json")
        .body(include_str!("data/pod_without_annotation.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let admission_review_response: AdmissionReviewResponse =
        serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert!(!admission_review_response.response.allowed);

    let tls_data2 = create_cert("cert2.example.com");

    // write only the cert file
    std::fs::write(&cert_file, &tls_data2.cert).unwrap();

    // give inotify some time to ensure it detected the cert change
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    // the old certificate is still in use, the key did not change yet
    assert!(is_served_with(&tls_data1.cert, address).await);

    std::fs::write(&key_file, &tls_data2.key).unwrap();

    assert!(wait_until_served_with(&tls_data2.cert, address).await);
    assert!(!is_served_with(&tls_data1.cert, address).await);
}
