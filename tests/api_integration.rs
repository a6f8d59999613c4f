//! End-to-end tests for the HTTP surface, with every upstream mocked

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{Value, json};
use solarcast::{ForecastService, ServiceConfig, web};
use tower::ServiceExt;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Upstreams {
    geocoder: MockServer,
    osm: MockServer,
    weather: MockServer,
}

impl Upstreams {
    async fn start() -> Self {
        Self {
            geocoder: MockServer::start().await,
            osm: MockServer::start().await,
            weather: MockServer::start().await,
        }
    }

    fn app(&self) -> Router {
        let mut config = ServiceConfig::default();
        config.geocoding.open_meteo_url = self.geocoder.uri();
        config.geocoding.nominatim_url = self.osm.uri();
        config.geocoding.geocode_xyz_url = self.osm.uri();
        config.geocoding.google_api_key = None;
        config.geocoding.nominatim_min_interval_ms = 0;
        config.weather.forecast_base_url = self.weather.uri();
        config.weather.archive_base_url = self.weather.uri();
        config.weather.max_retries = 0;
        config.model.forest_trees = 10;
        config.model.forest_max_depth = 8;
        config.model.boosting_stages = 10;
        config.model.boosting_max_depth = 4;

        web::app(Arc::new(ForecastService::new(config).unwrap()))
    }

    async fn mount_weather(&self, historical_days: i64, forecast_days: i64) {
        let today = Utc::now().date_naive();
        let archive_end = today - Duration::days(3);
        let archive_start = archive_end - Duration::days(historical_days);

        Mock::given(method("GET"))
            .and(path("/archive"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(hourly_payload(archive_start, historical_days * 24)),
            )
            .mount(&self.weather)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(hourly_payload(today, forecast_days * 24)),
            )
            .mount(&self.weather)
            .await;
    }

    /// Nominatim answers, but knows nothing at the coordinates
    async fn mount_empty_reverse(&self) {
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "Unable to geocode"})),
            )
            .mount(&self.osm)
            .await;
    }

    async fn mount_pune(&self) {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("name", "Pune"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"name": "Pune", "latitude": 18.52, "longitude": 73.86,
                             "country": "India", "admin1": "Maharashtra"}]
            })))
            .mount(&self.geocoder)
            .await;
    }
}

fn hourly_payload(start: NaiveDate, hours: i64) -> Value {
    let start = start.and_hms_opt(0, 0, 0).unwrap();
    let time: Vec<String> = (0..hours)
        .map(|h| (start + Duration::hours(h)).format("%Y-%m-%dT%H:%M").to_string())
        .collect();
    let hour_angle = |h: i64| std::f64::consts::TAU * (h % 24) as f64 / 24.0;

    json!({
        "latitude": 18.5,
        "longitude": 73.875,
        "elevation": 560.0,
        "hourly": {
            "time": time,
            "temperature_2m": (0..hours).map(|h| 24.0 + 6.0 * hour_angle(h).sin()).collect::<Vec<_>>(),
            "shortwave_radiation": (0..hours).map(|h| (800.0 * hour_angle(h - 6).sin()).max(0.0)).collect::<Vec<_>>(),
            "wind_speed_10m": (0..hours).map(|h| 10.0 + (h % 5) as f64).collect::<Vec<_>>(),
            "relative_humidity_2m": vec![60.0; hours as usize],
            "cloud_cover": vec![20.0; hours as usize],
            "precipitation": vec![0.0; hours as usize],
            "pressure_msl": vec![1012.0; hours as usize],
        }
    })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_data(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/data")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let upstreams = Upstreams::start().await;
    let (status, body) = send(upstreams.app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_empty_body_rejected_before_any_provider_call() {
    let upstreams = Upstreams::start().await;
    for server in [&upstreams.geocoder, &upstreams.osm, &upstreams.weather] {
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(server)
            .await;
    }

    let (status, body) = send(upstreams.app(), post_data(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Invalid input"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let upstreams = Upstreams::start().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/data")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(upstreams.app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_text_query_produces_aligned_bundle() {
    let upstreams = Upstreams::start().await;
    upstreams.mount_pune().await;
    upstreams.mount_weather(60, 7).await;

    let (status, body) = send(
        upstreams.app(),
        post_data(json!({"location": "Pune", "historical_days": 60, "forecast_days": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");

    assert_eq!(body["location"]["resolved_name"], "Pune");
    assert_eq!(body["location"]["country"], "India");
    // geocoder had no elevation, the forecast provider did
    assert_eq!(body["location"]["elevation"], 560.0);

    assert_eq!(body["historical"].as_array().unwrap().len(), 60 * 24);

    let api = body["api_forecast"].as_array().unwrap();
    let ml = body["ml_forecast"].as_array().unwrap();
    let blended = body["blended_forecast"].as_array().unwrap();
    assert_eq!(api.len(), 7 * 24);
    assert_eq!(ml.len(), api.len());
    assert_eq!(blended.len(), api.len());
    for ((a, m), b) in api.iter().zip(ml).zip(blended) {
        assert_eq!(a["time"], m["time"]);
        assert_eq!(a["time"], b["time"]);
    }

    assert!(ml.iter().all(|p| p["temperature_2m"].is_number()));
    // not a model target, passes through from the API
    assert_eq!(blended[0]["pressure_msl"], 1012.0);
    assert!(body["current"]["temperature_2m"].is_number());
}

#[tokio::test]
async fn test_coordinate_query_gets_readable_name() {
    let upstreams = Upstreams::start().await;
    upstreams.mount_weather(10, 2).await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lat": "18.5204", "lon": "73.8567",
            "address": {"city": "Pune", "state": "Maharashtra", "country": "India"}
        })))
        .mount(&upstreams.osm)
        .await;

    let (status, body) = send(
        upstreams.app(),
        post_data(json!({"latitude": 18.52, "longitude": 73.85, "historical_days": 10, "forecast_days": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["location"]["resolved_name"], "Pune, Maharashtra, India");
    assert_eq!(body["location"]["latitude"], 18.52);
    assert_eq!(body["api_forecast"].as_array().unwrap().len(), 48);
}

#[tokio::test]
async fn test_unlabelled_coordinates_still_forecast() {
    let upstreams = Upstreams::start().await;
    upstreams.mount_weather(5, 1).await;
    upstreams.mount_empty_reverse().await;

    let (status, body) = send(
        upstreams.app(),
        post_data(json!({"latitude": -45.0, "longitude": -140.0, "historical_days": 5, "forecast_days": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["location"]["resolved_name"], "-45.0000, -140.0000");
    assert_eq!(body["ml_forecast"].as_array().unwrap().len(), 24);
}

#[tokio::test]
async fn test_unknown_place_is_not_found() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"generationtime_ms": 0.4})))
        .mount(&upstreams.geocoder)
        .await;

    let (status, body) = send(upstreams.app(), post_data(json!({"location": "Qwxyzzy"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("Qwxyzzy"));
}

#[tokio::test]
async fn test_forecast_outage_is_server_error() {
    let upstreams = Upstreams::start().await;
    upstreams.mount_pune().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstreams.weather)
        .await;

    let (status, body) = send(upstreams.app(), post_data(json!({"location": "Pune"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("try again later"));
}

#[tokio::test]
async fn test_geocoder_outage_is_server_error() {
    let upstreams = Upstreams::start().await;
    for server in [&upstreams.geocoder, &upstreams.osm] {
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .mount(server)
            .await;
    }

    let (status, body) = send(upstreams.app(), post_data(json!({"location": "Pune"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("geocoding"));
    assert!(detail.contains("try again later"));

    let (status, body) = send(
        upstreams.app(),
        get("/api/reverse-geocode?latitude=-45.0&longitude=-140.0"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("reverse geocoding"));
}

#[tokio::test]
async fn test_autocomplete_returns_suggestions() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("name", "Pun"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"name": "Pune", "latitude": 18.52, "longitude": 73.86, "country": "India"},
                {"name": "Punta Arenas", "latitude": -53.16, "longitude": -70.91, "country": "Chile"}
            ]
        })))
        .mount(&upstreams.geocoder)
        .await;

    let (status, body) = send(upstreams.app(), get("/api/autocomplete?q=Pun")).await;
    assert_eq!(status, StatusCode::OK);
    let suggestions = body["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0]["display_name"], "Pune, India");
}

#[tokio::test]
async fn test_autocomplete_never_errors() {
    let upstreams = Upstreams::start().await;
    let (status, body) = send(upstreams.app(), get("/api/autocomplete?q=Pun")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"suggestions": []}));

    let (status, _) = send(upstreams.app(), get("/api/autocomplete")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reverse_geocode_without_answer_is_not_found() {
    let upstreams = Upstreams::start().await;
    upstreams.mount_empty_reverse().await;
    let (status, _) = send(
        upstreams.app(),
        get("/api/reverse-geocode?latitude=-45.0&longitude=-140.0"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(upstreams.app(), get("/api/reverse-geocode?latitude=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
