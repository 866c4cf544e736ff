// Route definitions

use axum::{routing::get, Router};

use crate::AppState;

mod api;
mod pages;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/options", get(api::get_options))
        .route("/records", get(api::get_records))
        .route("/prices", get(api::get_prices))
        .route("/recent", get(api::get_recent))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(pages::dashboard_page))
        .route("/health", get(api::health))
        .nest("/api", api_router)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Settings,
        dataset::Dataset,
        models::ServiceRecord,
        session::{SessionStore, SESSION_COOKIE},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn record(car: &str, service: &str, actual: f64, discounted: f64) -> ServiceRecord {
        ServiceRecord {
            car: car.to_string(),
            fuel_type: Some("Petrol".to_string()),
            service: service.to_string(),
            service_category: 0,
            actual_price: actual,
            discounted_price: discounted,
            time_taken: Some(4.0),
            warranty: "Warranty: 1 Month".to_string(),
            interval: "Every 5000 Kms".to_string(),
            condition: String::new(),
            extra: Default::default(),
        }
    }

    fn test_state() -> AppState {
        let dataset = Dataset {
            records: vec![
                record("swift", "Basic Service", 3000.0, 2500.0),
                record("city", "Basic Service", 4000.0, 3500.0),
                record("city", "Bonnet Paint", 5000.0, 4500.0),
            ],
            has_fuel_type: true,
            ..Default::default()
        };
        AppState {
            settings: Arc::new(Settings::default()),
            dataset: Arc::new(dataset),
            sessions: Arc::new(SessionStore::from_settings(&Settings::default())),
        }
    }

    async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        app.clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("new session sets a cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn dashboard_starts_with_empty_history() {
        let app = create_router(test_state());
        let response = get(&app, "/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        assert!(cookie.starts_with(SESSION_COOKIE));

        let html = body_text(response).await;
        assert!(html.contains("No recent searches yet"));
        assert!(html.contains("Basic Service (Actual"));
        assert!(html.contains("₹3,500.00"));
        assert!(html.contains("₹3,000.00"));
    }

    #[tokio::test]
    async fn filter_change_is_recorded_in_session_history() {
        let app = create_router(test_state());
        let first = get(&app, "/", None).await;
        let cookie = session_cookie(&first);

        let filtered = get(&app, "/?car=city&fuel=All&service=All", Some(&cookie)).await;
        assert!(filtered.headers().get(header::SET_COOKIE).is_none());
        let html = body_text(filtered).await;
        assert!(html.contains("Service Details"));
        assert!(html.contains("Service Interval"));
        assert!(html.contains("₹4,000.00"));

        let back = get(&app, "/", Some(&cookie)).await;
        let html = body_text(back).await;
        assert!(html.contains("Recent Searches"));
        assert!(!html.contains("No recent searches yet"));

        let recent = get(&app, "/api/recent", Some(&cookie)).await;
        let entries: Value = serde_json::from_str(&body_text(recent).await).unwrap();
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["car"], "city");
        assert_eq!(entries[0]["fuelType"], "All");
    }

    #[tokio::test]
    async fn history_is_per_session() {
        let app = create_router(test_state());
        let a = session_cookie(&get(&app, "/", None).await);
        let b = session_cookie(&get(&app, "/", None).await);
        assert_ne!(a, b);

        get(&app, "/?car=swift", Some(&a)).await;
        let recent_b = get(&app, "/api/recent", Some(&b)).await;
        let entries: Value = serde_json::from_str(&body_text(recent_b).await).unwrap();
        assert!(entries.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn options_and_records_endpoints() {
        let app = create_router(test_state());
        let options: Value =
            serde_json::from_str(&body_text(get(&app, "/api/options", None).await).await).unwrap();
        assert_eq!(options["cars"], serde_json::json!(["All", "city", "swift"]));
        assert_eq!(options["fuelTypes"], serde_json::json!(["All", "Petrol"]));

        let all: Value =
            serde_json::from_str(&body_text(get(&app, "/api/records", None).await).await).unwrap();
        assert_eq!(all["count"], 3);

        let city: Value = serde_json::from_str(
            &body_text(get(&app, "/api/records?car=city&service=Bonnet%20Paint", None).await).await,
        )
        .unwrap();
        assert_eq!(city["count"], 1);
        assert_eq!(city["records"][0]["actualPrice"], 5000.0);
    }

    #[tokio::test]
    async fn prices_endpoint() {
        let app = create_router(test_state());
        let average: Value = serde_json::from_str(
            &body_text(get(&app, "/api/prices?service=Basic%20Service", None).await).await,
        )
        .unwrap();
        assert_eq!(average["summary"]["kind"], "average");
        assert_eq!(average["formatted"], "₹3,500.00 / ₹3,000.00");

        let listing: Value = serde_json::from_str(
            &body_text(get(&app, "/api/prices?service=Basic%20Service&car=swift", None).await).await,
        )
        .unwrap();
        assert_eq!(listing["summary"]["kind"], "listing");
        assert_eq!(listing["summary"]["actual"], 3000.0);

        let none: Value = serde_json::from_str(
            &body_text(get(&app, "/api/prices?service=Bonnet%20Paint&car=swift", None).await).await,
        )
        .unwrap();
        assert_eq!(none["formatted"], "No data");

        let missing = get(&app, "/api/prices", None).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_record_count() {
        let app = create_router(test_state());
        let health: Value =
            serde_json::from_str(&body_text(get(&app, "/health", None).await).await).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["records"], 3);
        assert_eq!(health["sessions"], 0);
    }
}
