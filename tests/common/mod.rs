#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use image::{GrayImage, ImageFormat, Luma};
use serde_json::Value;
use tower::ServiceExt;
use watchtower::{
    AppState,
    config::Config,
    create_router,
    detection::{Cascade, DetectorParams, FaceDetector, FaceRect, HaarDetector},
};

/// 4x4 window, single stump: fires where dark pixels sit left of bright ones.
pub const EDGE_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier"><stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>4</height>
  <width>4</width>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 -0.1</internalNodes>
          <leafValues>
            1. -1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 2 4 1.</_>
        <_>
          2 0 2 4 -1.</_></rects></_></features></cascade>
</opencv_storage>
"#;

pub const BOUNDARY: &str = "watchtower-test-boundary";

pub struct FixedDetector(pub Vec<FaceRect>);

impl FaceDetector for FixedDetector {
    fn detect(&self, _image: &GrayImage) -> Vec<FaceRect> {
        self.0.clone()
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "SECRET_KEY" => Some("integration-test-secret".into()),
        "BCRYPT_COST" => Some("4".into()),
        "MAX_UPLOAD_BYTES" => Some("65536".into()),
        "MAX_IMAGE_DIMENSION" => Some("64".into()),
        _ => None,
    })
    .expect("test config")
}

/// Router backed by the edge cascade, evaluated at a single scale with no
/// grouping so hit counts are exact.
pub fn edge_app() -> Router {
    let cascade = Cascade::from_xml(EDGE_CASCADE).expect("edge cascade");
    let detector = HaarDetector::new(
        cascade,
        DetectorParams {
            scale_factor: 10.0,
            min_neighbors: 0,
        },
    );
    create_router(AppState::new(test_config(), Arc::new(detector)))
}

pub fn app_with_detector(detector: impl FaceDetector + 'static) -> Router {
    create_router(AppState::new(test_config(), Arc::new(detector)))
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("router is infallible")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("session={}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("session={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// A multipart form with one file field.
pub fn multipart_request(field: &str, bytes: &[u8], cookie: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/detect_face")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("session={}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn session_token(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.trim().strip_prefix("session="))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

pub async fn signup(app: &Router, username: &str, password: &str) -> Response<Body> {
    send(
        app,
        json_request(
            "POST",
            "/signup",
            serde_json::json!({ "username": username, "password": password }),
            None,
        ),
    )
    .await
}

pub async fn login(app: &Router, username: &str, password: &str) -> Response<Body> {
    send(
        app,
        json_request(
            "POST",
            "/login",
            serde_json::json!({ "username": username, "password": password }),
            None,
        ),
    )
    .await
}

/// Signs up and logs in, returning the session token.
pub async fn logged_in(app: &Router, username: &str) -> String {
    signup(app, username, "pa55word").await;
    let response = login(app, username, "pa55word").await;
    session_token(&response).expect("login sets a session cookie")
}

/// Dark left of `edge`, bright from `edge` on, PNG encoded.
pub fn edge_png(width: u32, height: u32, edge: u32) -> Vec<u8> {
    let image = GrayImage::from_fn(width, height, |x, _| Luma([if x < edge { 0 } else { 255 }]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}
