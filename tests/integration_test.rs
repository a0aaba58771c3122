use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::io::Cursor;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

// Use atomic counter to give each test a unique port
static PORT_COUNTER: AtomicU16 = AtomicU16::new(9500);

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct InfoResponse {
    version: String,
    supported_formats: Vec<String>,
    max_file_size_bytes: usize,
    default_config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

struct TestServer {
    child: Child,
    port: u16,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(&[])
    }

    fn start_with(extra_args: &[&str]) -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);

        let child = Command::new(env!("CARGO_BIN_EXE_docprep-server"))
            .args(["--host", "127.0.0.1", "--port", &port.to_string()])
            .args(extra_args)
            .spawn()
            .expect("Failed to start server");

        Self { child, port }
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Poll the health endpoint until the server accepts connections
    async fn wait_ready(&self, client: &reqwest::Client) {
        let url = format!("{}/health", self.base_url());
        for _ in 0..100 {
            if client.get(&url).send().await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("Server on port {} never became ready", self.port);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn png_bytes(image: DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode fixture");
    buf.into_inner()
}

fn gray_page() -> Vec<u8> {
    png_bytes(DynamicImage::ImageRgb8(RgbImage::from_pixel(
        100,
        100,
        Rgb([128, 128, 128]),
    )))
}

fn file_part(bytes: Vec<u8>) -> Part {
    Part::bytes(bytes)
        .file_name("page.png")
        .mime_str("image/png")
        .unwrap()
}

async fn post_form(client: &reqwest::Client, server: &TestServer, form: Form) -> reqwest::Response {
    client
        .post(format!("{}/preprocess", server.base_url()))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start();
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let response: HealthResponse = client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(response.status, "ok");
    assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_info_endpoint() {
    let server = TestServer::start_with(&["--max-file-size", "1048576"]);
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let response: InfoResponse = client
        .get(format!("{}/info", server.base_url()))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(response.max_file_size_bytes, 1_048_576);
    assert!(response.supported_formats.contains(&"image/png".to_string()));
    assert_eq!(response.default_config["threshold"], 160);
    assert_eq!(response.default_config["denoise_kernel"], 5);
    assert_eq!(response.default_config["use_deskew"], true);
}

#[tokio::test]
async fn test_preprocess_uniform_gray_page() {
    let server = TestServer::start();
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let form = Form::new().part("file", file_part(gray_page()));
    let response = post_form(&client, &server, form).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["x-grayscale-requested"], "true");
    assert!(response.headers().contains_key("x-processing-time-ms"));
    // Binarized page is uniform, so deskew finds no ink
    assert!(!response.headers().contains_key("x-deskew-angle"));

    let body = response.bytes().await.expect("Failed to read body");
    let output = image::load_from_memory(&body)
        .expect("Response is not an image")
        .to_luma8();
    assert_eq!(output.dimensions(), (100, 100));
    assert!(output.pixels().all(|p| p.0[0] == 255));
}

#[tokio::test]
async fn test_preprocess_form_fields_override_defaults() {
    let server = TestServer::start();
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    // 128 * 1.5 = 192 stays below a threshold of 200
    let form = Form::new()
        .text("threshold", "200")
        .text("use_grayscale", "false")
        .part("file", file_part(gray_page()));
    let response = post_form(&client, &server, form).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-grayscale-requested"], "false");
    let body = response.bytes().await.expect("Failed to read body");
    let output = image::load_from_memory(&body).unwrap().to_luma8();
    assert!(output.pixels().all(|p| p.0[0] == 0));
}

#[tokio::test]
async fn test_preprocess_config_json_field() {
    let server = TestServer::start();
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let input = GrayImage::from_fn(8, 8, |x, _| Luma([(x * 30) as u8]));
    let form = Form::new()
        .text(
            "config",
            r#"{"use_denoise": false, "use_contrast": false, "use_binarize": false, "use_deskew": false}"#,
        )
        .part("file", file_part(png_bytes(DynamicImage::ImageLuma8(input.clone()))));
    let response = post_form(&client, &server, form).await;

    assert_eq!(response.status(), 200);
    let body = response.bytes().await.expect("Failed to read body");
    let output = image::load_from_memory(&body).unwrap().to_luma8();
    assert_eq!(output, input);
}

#[tokio::test]
async fn test_preprocess_skewed_page_reports_angle() {
    let server = TestServer::start();
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let (sin, cos) = 8.0_f32.to_radians().sin_cos();
    let page = GrayImage::from_fn(200, 200, |x, y| {
        let dx = x as f32 - 100.0;
        let dy = y as f32 - 100.0;
        let along = dx * cos - dy * sin;
        let across = dx * sin + dy * cos;
        if along.abs() <= 70.0 && across.abs() <= 6.0 {
            Luma([10])
        } else {
            Luma([245])
        }
    });
    let form = Form::new()
        .text("use_denoise", "false")
        .part("file", file_part(png_bytes(DynamicImage::ImageLuma8(page))));
    let response = post_form(&client, &server, form).await;

    assert_eq!(response.status(), 200);
    let angle: f32 = response.headers()["x-deskew-angle"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((angle - -8.0).abs() < 1.0, "Unexpected angle {}", angle);
}

#[tokio::test]
async fn test_out_of_range_threshold_is_configuration_error() {
    let server = TestServer::start();
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let form = Form::new()
        .text("threshold", "300")
        .part("file", file_part(gray_page()));
    let response = post_form(&client, &server, form).await;

    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.expect("Failed to parse error");
    assert_eq!(error.code, "CONFIGURATION_ERROR");
    assert!(error.error.contains("threshold"));
}

#[tokio::test]
async fn test_invalid_alpha_is_configuration_error() {
    let server = TestServer::start();
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let form = Form::new()
        .text("contrast_alpha", "0")
        .part("file", file_part(gray_page()));
    let response = post_form(&client, &server, form).await;

    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.expect("Failed to parse error");
    assert_eq!(error.code, "CONFIGURATION_ERROR");
}

#[tokio::test]
async fn test_corrupt_image_is_decode_error() {
    let server = TestServer::start();
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let form = Form::new().part("file", file_part(b"definitely not an image".to_vec()));
    let response = post_form(&client, &server, form).await;

    assert_eq!(response.status(), 422);
    let error: ErrorResponse = response.json().await.expect("Failed to parse error");
    assert_eq!(error.code, "INPUT_DECODE_ERROR");
}

#[tokio::test]
async fn test_missing_file_is_rejected() {
    let server = TestServer::start();
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let form = Form::new().text("threshold", "100");
    let response = post_form(&client, &server, form).await;

    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.expect("Failed to parse error");
    assert_eq!(error.code, "MISSING_FILE");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let server = TestServer::start_with(&["--max-file-size", "16"]);
    let client = reqwest::Client::new();
    server.wait_ready(&client).await;

    let form = Form::new().part("file", file_part(gray_page()));
    let response = post_form(&client, &server, form).await;

    assert_eq!(response.status(), 413);
    let error: ErrorResponse = response.json().await.expect("Failed to parse error");
    assert_eq!(error.code, "IMAGE_TOO_LARGE");
}
