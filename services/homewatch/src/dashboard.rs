//! Web dashboard with JSON API endpoints and LED controls

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregator::StateHandle;
use crate::classifier::{Classifier, Status};
use crate::error::HomewatchError;
use crate::field::SensorField;
use crate::gateway::{ActuatorGateway, PendingWrite};
use crate::view::{history_view, DashboardView};

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub state: StateHandle,
    pub classifier: Arc<Classifier>,
    pub gateway: ActuatorGateway,
    pub fields: Arc<Vec<SensorField>>,
    pub refresh_interval_ms: u64,
}

impl DashboardState {
    async fn view(&self) -> DashboardView {
        let state = self.state.read().await;
        DashboardView::build(&state, &self.classifier, &self.fields)
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BrightnessRequest {
    percent: i64,
}

/// Build the dashboard axum router
pub fn build_router(dashboard_state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/history", get(history_handler))
        .route("/api/led/toggle", post(toggle_handler))
        .route("/api/led/brightness", post(brightness_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(dashboard_state)
}

fn status_colors(status: Option<Status>) -> (&'static str, &'static str) {
    match status {
        Some(Status::Safe) => ("#155724", "#d4edda"),
        Some(Status::Warning) => ("#856404", "#fff3cd"),
        Some(Status::Danger) => ("#721c24", "#f8d7da"),
        Some(Status::Loading) | None => ("#383d41", "#e2e3e5"),
    }
}

/// Escape text interpolated into the page; fault messages come from the remote side
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let view = dashboard.view().await;

    let field_rows: String = view
        .fields
        .iter()
        .map(|f| {
            let (color, bg) = status_colors(f.status);
            let value = match &f.value {
                Some(v) => format!("{} {}", v, f.unit),
                None => "Loading...".to_string(),
            };
            let status = f.status.map(|s| s.to_string()).unwrap_or_default();
            let fault = f
                .fault
                .as_ref()
                .map(|fault| fault.message.clone())
                .unwrap_or_default();
            format!(
                r#"<tr style="border-bottom: 1px solid #dee2e6;">
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">
                        <span style="display: inline-block; padding: 0.25em 0.6em; border-radius: 0.25rem; font-size: 0.85em; font-weight: 600; color: {}; background-color: {};">{}</span>
                    </td>
                    <td style="padding: 0.5rem; color: #721c24;">{}</td>
                </tr>"#,
                f.field,
                escape_html(&value),
                color,
                bg,
                status,
                escape_html(&fault)
            )
        })
        .collect();

    let alert_banner = match (view.alerts.proximity, view.alerts.fire) {
        (false, false) => String::new(),
        (proximity, fire) => {
            let mut alerts = Vec::new();
            if proximity {
                alerts.push("Motion detected nearby");
            }
            if fire {
                alerts.push("Fire risk: smoke level critical");
            }
            format!(
                r#"<div style="padding: 0.75rem; margin-bottom: 1rem; color: #721c24; background-color: #f8d7da; border-radius: 0.25rem;">{}</div>"#,
                alerts.join(" / ")
            )
        }
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Homewatch Dashboard</title>
    <script>
        const colors = {{
            'safe': ['#155724', '#d4edda'],
            'warning': ['#856404', '#fff3cd'],
            'danger': ['#721c24', '#f8d7da'],
        }};
        const labels = {{ 'loading': 'Loading', 'safe': 'Safe', 'warning': 'Warning', 'danger': 'Danger' }};
        function refreshData() {{
            fetch('/api/snapshot')
                .then(r => r.json())
                .then(data => {{
                    const tbody = document.getElementById('field-body');
                    tbody.replaceChildren(...data.fields.map(f => {{
                        const [color, bg] = colors[f.status] || ['#383d41', '#e2e3e5'];
                        const row = document.createElement('tr');
                        row.style.borderBottom = '1px solid #dee2e6';
                        const cell = text => {{
                            const td = document.createElement('td');
                            td.style.padding = '0.5rem';
                            td.textContent = text;
                            row.appendChild(td);
                            return td;
                        }};
                        cell(f.field);
                        cell(f.value === null ? 'Loading...' : `${{f.value}} ${{f.unit}}`);
                        const badge = document.createElement('span');
                        badge.style.cssText = `display: inline-block; padding: 0.25em 0.6em; border-radius: 0.25rem; font-size: 0.85em; font-weight: 600; color: ${{color}}; background-color: ${{bg}};`;
                        badge.textContent = f.status ? labels[f.status] : '';
                        cell('').appendChild(badge);
                        cell(f.fault ? f.fault.message : '').style.color = '#721c24';
                        return row;
                    }}));
                    const alerts = [];
                    if (data.alerts.proximity) alerts.push('Motion detected nearby');
                    if (data.alerts.fire) alerts.push('Fire risk: smoke level critical');
                    const banner = document.getElementById('alerts');
                    if (alerts.length === 0) {{
                        banner.replaceChildren();
                    }} else {{
                        const div = document.createElement('div');
                        div.style.cssText = 'padding: 0.75rem; margin-bottom: 1rem; color: #721c24; background-color: #f8d7da; border-radius: 0.25rem;';
                        div.textContent = alerts.join(' / ');
                        banner.replaceChildren(div);
                    }}
                    document.getElementById('last-updated').textContent =
                        data.lastUpdated === null ? 'Never' : new Date(data.lastUpdated).toLocaleTimeString();
                }});
        }}
        function toggleLed() {{
            fetch('/api/led/toggle', {{ method: 'POST' }});
        }}
        function setBrightness(percent) {{
            fetch('/api/led/brightness', {{
                method: 'POST',
                headers: {{ 'Content-Type': 'application/json' }},
                body: JSON.stringify({{ percent: Number(percent) }}),
            }});
        }}
        setInterval(refreshData, {refresh_ms});
    </script>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem;">
    <h1>Homewatch Dashboard</h1>
    <div id="alerts">{alert_banner}</div>
    <section>
        <h2>Sensors</h2>
        <table style="width: 100%; border-collapse: collapse;">
            <thead>
                <tr style="border-bottom: 2px solid #dee2e6;">
                    <th style="padding: 0.5rem; text-align: left;">Field</th>
                    <th style="padding: 0.5rem; text-align: left;">Value</th>
                    <th style="padding: 0.5rem; text-align: left;">Status</th>
                    <th style="padding: 0.5rem; text-align: left;">Fault</th>
                </tr>
            </thead>
            <tbody id="field-body">{field_rows}</tbody>
        </table>
        <p>Last Updated: <span id="last-updated">{last_updated}</span></p>
    </section>
    <section>
        <h2>LED Control</h2>
        <button onclick="toggleLed()">Toggle LED</button>
        <label style="margin-left: 1rem;">Brightness
            <input type="range" min="0" max="100" onchange="setBrightness(this.value)">
        </label>
    </section>
</body>
</html>"#,
        alert_banner = alert_banner,
        field_rows = field_rows,
        refresh_ms = dashboard.refresh_interval_ms,
        last_updated = match view.last_updated {
            Some(ms) => format!(
                r#"<script>document.write(new Date({}).toLocaleTimeString())</script>"#,
                ms
            ),
            None => "Never".to_string(),
        },
    );

    Html(html)
}

async fn snapshot_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    Json(dashboard.view().await)
}

async fn history_handler(
    State(dashboard): State<DashboardState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let field = match query.field.as_deref().map(str::parse::<SensorField>) {
        None => None,
        Some(Ok(field)) => Some(field),
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let state = dashboard.state.read().await;
    Json(history_view(&state, field)).into_response()
}

async fn toggle_handler(State(dashboard): State<DashboardState>) -> Response {
    match dashboard.gateway.toggle_led().await {
        Ok(pending) => accepted(&pending),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

async fn brightness_handler(
    State(dashboard): State<DashboardState>,
    Json(request): Json<BrightnessRequest>,
) -> Response {
    match dashboard.gateway.set_brightness(request.percent) {
        Ok(pending) => accepted(&pending),
        Err(e @ HomewatchError::InvalidBrightness(_)) => {
            error_response(StatusCode::BAD_REQUEST, &e)
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}

/// The write is left running; its outcome is observed through the subscription
fn accepted(pending: &PendingWrite) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "path": pending.path, "value": pending.value })),
    )
        .into_response()
}

fn error_response(status: StatusCode, error: &HomewatchError) -> Response {
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
