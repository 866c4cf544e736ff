use askama::Template;
use axum::{
    extract::{Query, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, Html, IntoResponse},
};
use chrono::Local;

use crate::{
    dashboard::{self, DashboardView, DetailView, MetricCard, Table, EMPTY_HISTORY_MESSAGE},
    error::AppError,
    models::{FilterQuery, Selection},
    session::SessionHandle,
    AppState,
};

struct SelectOption {
    value: String,
    selected: bool,
}

// One sidebar select box
struct FilterControl {
    name: &'static str,
    label: &'static str,
    options: Vec<SelectOption>,
}

impl FilterControl {
    fn new(name: &'static str, label: &'static str, values: &[String], current: &Selection) -> Self {
        let current = current.to_string();
        let options = values
            .iter()
            .map(|v| SelectOption {
                selected: *v == current,
                value: v.clone(),
            })
            .collect();
        Self { name, label, options }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    controls: Vec<FilterControl>,
    cards: Vec<MetricCard>,
    detail_title: &'static str,
    table: Table,
    empty_message: Option<&'static str>,
}

impl From<DashboardView> for DashboardTemplate {
    fn from(view: DashboardView) -> Self {
        let controls = vec![
            FilterControl::new("car", "Select Car Model", &view.options.cars, &view.selection.car),
            FilterControl::new(
                "fuel",
                "Select Fuel Type",
                &view.options.fuel_types,
                &view.selection.fuel_type,
            ),
            FilterControl::new(
                "service",
                "Select Service Type",
                &view.options.services,
                &view.selection.service,
            ),
        ];

        let (detail_title, table, empty_message) = match view.detail {
            DetailView::RecentSearches(table) => {
                let empty = table.rows.is_empty().then_some(EMPTY_HISTORY_MESSAGE);
                ("Recent Searches", table, empty)
            }
            DetailView::ServiceDetails(table) => ("Service Details", table, None),
        };

        Self {
            controls,
            cards: view.cards,
            detail_title,
            table,
            empty_message,
        }
    }
}

// Renders the dashboard for the caller's session. Query parameters carry the
// current values of the three select boxes.
pub async fn dashboard_page(
    State(app_state): State<AppState>,
    session: SessionHandle,
    Query(query): Query<FilterQuery>,
) -> Result<impl IntoResponse, AppError> {
    let selection = query.selection();

    let history = {
        let mut state = session.session.lock().await;
        if state.apply_selection(&selection, Local::now()) {
            tracing::info!(?selection, "Recorded recent search");
        }
        tracing::debug!(session = %session.id, state = ?state.state(), "Applied filter selection");
        state.recent_searches()
    };

    let view = dashboard::build_view(
        &app_state.dataset,
        &selection,
        &history,
        &app_state.settings.featured_services,
    );

    let template = DashboardTemplate::from(view);
    match template.render() {
        Ok(html) => Ok((
            AppendHeaders(session.set_cookie().map(|c| (SET_COOKIE, c))),
            Html(html),
        )),
        Err(e) => {
            tracing::error!("Failed to render dashboard template: {}", e);
            Err(AppError::InternalServerError(anyhow::Error::new(e)))
        }
    }
}
