use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::instrument;

use crate::config::TransitConfig;
use crate::error::InkboardError;
use crate::models::{Alert, Departure, TransitBoard};
use crate::{API_CLIENT, Result, localtime};

/// Departures shown on the board
const MAX_DEPARTURES: usize = 10;

/// Alerts shown under the board
const MAX_ALERTS: usize = 3;

/// Departures effectively already gone are filtered at the query level by
/// anchoring the window a few minutes into the future.
const DEPARTURE_ANCHOR_MINUTES: i64 = 6;

/// Fetch the next hour of departures for the configured stop and normalize
/// them into the display board.
#[instrument(skip(config))]
pub async fn fetch_transit(
    config: &TransitConfig,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<TransitBoard> {
    let url = format!(
        "{}/stops/{}/departures",
        config.base_url,
        urlencoding::encode(&config.stop_id)
    );
    let anchor = (now + Duration::minutes(DEPARTURE_ANCHOR_MINUTES)).to_rfc3339();

    // Suburban and regional rail only; everything else excluded at the query
    let response = API_CLIENT
        .get(&url)
        .query(&[
            ("duration", "60"),
            ("results", "20"),
            ("suburban", "true"),
            ("subway", "false"),
            ("tram", "false"),
            ("bus", "false"),
            ("ferry", "false"),
            ("regional", "true"),
            ("express", "false"),
            ("when", anchor.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(InkboardError::provider(format!(
            "transit provider returned {} for stop {}",
            response.status(),
            config.stop_id
        )));
    }

    let departures: hafas::DeparturesResponse = response
        .json()
        .await
        .map_err(|err| InkboardError::provider(format!("undecodable transit payload: {err}")))?;

    Ok(build_board(&departures.into_departures(), now, tz))
}

/// Normalize raw departures into the board: first 10 entries become rows
/// (minus malformed ones), every raw entry's remarks feed the alert list.
fn build_board(raw: &[hafas::HafasDeparture], now: DateTime<Utc>, tz: Tz) -> TransitBoard {
    let departures = raw
        .iter()
        .take(MAX_DEPARTURES)
        .enumerate()
        .filter_map(|(i, dep)| {
            // No line name means the entry is malformed; drop it
            let line = dep.line.as_ref()?;
            let line_name = line.name.clone()?;
            let cancelled = dep.cancelled.unwrap_or(false);

            Some(Departure {
                id: dep.trip_id.clone().unwrap_or_else(|| i.to_string()),
                line_name,
                line_product: line
                    .product
                    .clone()
                    .unwrap_or_else(|| "suburban".to_string()),
                direction: dep.direction.clone().unwrap_or_else(|| "—".to_string()),
                when_display: when_display(dep.planned_when, dep.when, cancelled, now, tz),
                delay_minutes: dep.delay.map(|seconds| (seconds as f64 / 60.0).round() as i64),
                platform: dep.platform.clone().or_else(|| dep.planned_platform.clone()),
                cancelled,
            })
        })
        .collect();

    TransitBoard {
        departures,
        alerts: collect_alerts(raw),
    }
}

/// Display string for a departure. The real-time timestamp wins over the
/// planned one; a missing pair renders as a placeholder dash.
fn when_display(
    planned: Option<DateTime<Utc>>,
    actual: Option<DateTime<Utc>>,
    cancelled: bool,
    now: DateTime<Utc>,
    tz: Tz,
) -> String {
    if cancelled {
        return "Cancelled".to_string();
    }

    let Some(departure) = actual.or(planned) else {
        return "—".to_string();
    };

    let minutes = ((departure - now).num_seconds() as f64 / 60.0).round() as i64;
    if minutes <= 0 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min")
    } else {
        localtime::format_hm(departure, tz)
    }
}

/// Deduplicated warnings from every raw departure's remarks, routine hints
/// excluded, capped at 3. First occurrence wins so ids stay stable.
fn collect_alerts(raw: &[hafas::HafasDeparture]) -> Vec<Alert> {
    let mut seen = std::collections::HashSet::new();
    let mut alerts = Vec::new();

    for dep in raw {
        for remark in dep.remarks.iter().flatten() {
            let text = remark
                .text
                .clone()
                .or_else(|| remark.summary.clone())
                .unwrap_or_default();
            let clean = strip_markup(&text);
            let clean = clean.trim();
            if clean.is_empty() {
                continue;
            }

            let category = remark.kind.as_deref().unwrap_or("hint");
            if !matches!(category, "warning" | "disruption" | "status") {
                continue;
            }

            if seen.insert(clean.to_string()) {
                alerts.push(Alert {
                    id: remark
                        .id
                        .clone()
                        .unwrap_or_else(|| clean.chars().take(32).collect()),
                    text: clean.to_string(),
                    category: category.to_string(),
                });
            }
        }
    }

    alerts.truncate(MAX_ALERTS);
    alerts
}

/// Drop embedded markup tags, keeping only the text between them.
fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// HAFAS departures endpoint response structures
pub(crate) mod hafas {
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    /// The v6 API returns either a bare array or an object with a
    /// `departures` key.
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum DeparturesResponse {
        Bare(Vec<HafasDeparture>),
        Keyed { departures: Vec<HafasDeparture> },
    }

    impl DeparturesResponse {
        pub fn into_departures(self) -> Vec<HafasDeparture> {
            match self {
                Self::Bare(departures) | Self::Keyed { departures } => departures,
            }
        }
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct HafasDeparture {
        pub trip_id: Option<String>,
        /// Real-time departure when available
        pub when: Option<DateTime<Utc>>,
        pub planned_when: Option<DateTime<Utc>>,
        /// Delay in seconds
        pub delay: Option<i64>,
        pub cancelled: Option<bool>,
        pub direction: Option<String>,
        pub platform: Option<String>,
        pub planned_platform: Option<String>,
        pub line: Option<HafasLine>,
        pub remarks: Option<Vec<HafasRemark>>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct HafasLine {
        pub name: Option<String>,
        pub product: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct HafasRemark {
        pub id: Option<String>,
        #[serde(rename = "type")]
        pub kind: Option<String>,
        pub text: Option<String>,
        pub summary: Option<String>,
    }
}

#[cfg(test)]
mod tests {
    use super::hafas::{HafasDeparture, HafasLine, HafasRemark};
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;
    use rstest::rstest;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn departure(minutes_out: i64) -> HafasDeparture {
        HafasDeparture {
            trip_id: Some(format!("trip-{minutes_out}")),
            when: Some(noon() + Duration::minutes(minutes_out)),
            direction: Some("S Spandau".to_string()),
            line: Some(HafasLine {
                name: Some("S9".to_string()),
                product: Some("suburban".to_string()),
            }),
            ..Default::default()
        }
    }

    fn remark(kind: &str, text: &str) -> HafasRemark {
        HafasRemark {
            kind: Some(kind.to_string()),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[rstest]
    #[case(0, "now")]
    #[case(-3, "now")]
    #[case(1, "1 min")]
    #[case(59, "59 min")]
    // 60 minutes out flips to an absolute local time: 13:00 UTC = 15:00 CEST
    #[case(60, "15:00")]
    #[case(75, "15:15")]
    fn test_when_display_boundaries(#[case] minutes_out: i64, #[case] expected: &str) {
        let target = noon() + Duration::minutes(minutes_out);
        assert_eq!(
            when_display(None, Some(target), false, noon(), Berlin),
            expected
        );
    }

    #[test]
    fn test_cancelled_beats_timing_and_delay() {
        // Scenario: cancelled with a 300 s delay still shows "Cancelled"
        let mut dep = departure(10);
        dep.cancelled = Some(true);
        dep.delay = Some(300);

        let board = build_board(&[dep], noon(), Berlin);
        assert_eq!(board.departures[0].when_display, "Cancelled");
        assert!(board.departures[0].cancelled);
        // The delay stays in its own field, not the display string
        assert_eq!(board.departures[0].delay_minutes, Some(5));
    }

    #[test]
    fn test_actual_time_wins_over_planned() {
        let mut dep = departure(10);
        dep.planned_when = Some(noon() + Duration::minutes(5));
        let board = build_board(&[dep], noon(), Berlin);
        assert_eq!(board.departures[0].when_display, "10 min");
    }

    #[test]
    fn test_planned_time_is_the_fallback() {
        let mut dep = departure(0);
        dep.when = None;
        dep.planned_when = Some(noon() + Duration::minutes(42));
        let board = build_board(&[dep], noon(), Berlin);
        assert_eq!(board.departures[0].when_display, "42 min");
    }

    #[test]
    fn test_missing_timestamps_render_a_dash() {
        let mut dep = departure(0);
        dep.when = None;
        let board = build_board(&[dep], noon(), Berlin);
        assert_eq!(board.departures[0].when_display, "—");
    }

    #[test]
    fn test_departures_without_line_name_are_dropped() {
        let mut nameless = departure(5);
        nameless.line = Some(HafasLine::default());
        let mut lineless = departure(6);
        lineless.line = None;

        let board = build_board(&[nameless, lineless, departure(7)], noon(), Berlin);
        assert_eq!(board.departures.len(), 1);
        assert_eq!(board.departures[0].when_display, "7 min");
    }

    #[test]
    fn test_board_caps_at_ten_departures_in_provider_order() {
        let raw: Vec<HafasDeparture> = (1..=15).map(departure).collect();
        let board = build_board(&raw, noon(), Berlin);
        assert_eq!(board.departures.len(), 10);
        assert_eq!(board.departures[0].when_display, "1 min");
        assert_eq!(board.departures[9].when_display, "10 min");
    }

    #[test]
    fn test_platform_falls_back_to_planned_platform() {
        let mut dep = departure(5);
        dep.planned_platform = Some("4".to_string());
        let board = build_board(&[dep], noon(), Berlin);
        assert_eq!(board.departures[0].platform.as_deref(), Some("4"));

        let mut dep = departure(5);
        dep.platform = Some("2".to_string());
        dep.planned_platform = Some("4".to_string());
        let board = build_board(&[dep], noon(), Berlin);
        assert_eq!(board.departures[0].platform.as_deref(), Some("2"));
    }

    #[test]
    fn test_alerts_strip_markup_and_dedupe() {
        let mut first = departure(5);
        first.remarks = Some(vec![remark("warning", "<p>Track <b>work</b></p>")]);
        let mut second = departure(6);
        second.remarks = Some(vec![remark("warning", "Track work")]);

        let board = build_board(&[first, second], noon(), Berlin);
        assert_eq!(board.alerts.len(), 1);
        assert_eq!(board.alerts[0].text, "Track work");
        assert_eq!(board.alerts[0].category, "warning");
    }

    #[test]
    fn test_hints_and_empty_remarks_are_excluded() {
        let mut dep = departure(5);
        dep.remarks = Some(vec![
            remark("hint", "Bicycle conveyance possible"),
            remark("warning", "<br/>"),
            HafasRemark {
                kind: None,
                text: Some("Untyped remark".to_string()),
                ..Default::default()
            },
            remark("status", "Elevator out of service"),
        ]);

        let board = build_board(&[dep], noon(), Berlin);
        assert_eq!(board.alerts.len(), 1);
        assert_eq!(board.alerts[0].text, "Elevator out of service");
    }

    #[test]
    fn test_alerts_cap_at_three_and_scan_beyond_kept_departures() {
        // 12 departures: only 10 become rows, but the 11th's remark still
        // feeds the alert list
        let mut raw: Vec<HafasDeparture> = (1..=12).map(departure).collect();
        raw[10].remarks = Some(vec![remark("disruption", "Replacement bus service")]);
        for (i, dep) in raw.iter_mut().take(4).enumerate() {
            dep.remarks = Some(vec![remark("warning", &format!("Notice {i}"))]);
        }

        let board = build_board(&raw, noon(), Berlin);
        assert_eq!(board.departures.len(), 10);
        assert_eq!(board.alerts.len(), 3);
        assert_eq!(board.alerts[0].text, "Notice 0");
    }

    #[test]
    fn test_alert_summary_is_the_text_fallback() {
        let mut dep = departure(5);
        dep.remarks = Some(vec![HafasRemark {
            id: Some("r1".to_string()),
            kind: Some("disruption".to_string()),
            text: None,
            summary: Some("Signalling fault".to_string()),
        }]);
        let board = build_board(&[dep], noon(), Berlin);
        assert_eq!(board.alerts[0].text, "Signalling fault");
        assert_eq!(board.alerts[0].id, "r1");
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::config::TransitConfig;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> TransitConfig {
        TransitConfig {
            stop_id: "900003201".to_string(),
            base_url,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn departure_json(now: DateTime<Utc>) -> serde_json::Value {
        json!({
            "tripId": "trip-1",
            "when": (now + Duration::minutes(12)).to_rfc3339(),
            "plannedWhen": (now + Duration::minutes(10)).to_rfc3339(),
            "delay": 120,
            "direction": "Flughafen BER",
            "platform": "2",
            "line": { "name": "S9", "product": "suburban" },
            "remarks": [ { "type": "warning", "text": "<p>Construction work</p>" } ]
        })
    }

    #[tokio::test]
    async fn test_fetch_accepts_keyed_response_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops/900003201/departures"))
            .and(query_param("duration", "60"))
            .and(query_param("suburban", "true"))
            .and(query_param("subway", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "departures": [departure_json(noon())]
            })))
            .mount(&server)
            .await;

        let board = fetch_transit(&test_config(server.uri()), Berlin, noon())
            .await
            .unwrap();
        assert_eq!(board.departures.len(), 1);
        assert_eq!(board.departures[0].line_name, "S9");
        assert_eq!(board.departures[0].when_display, "12 min");
        assert_eq!(board.departures[0].delay_minutes, Some(2));
        assert_eq!(board.alerts[0].text, "Construction work");
    }

    #[tokio::test]
    async fn test_fetch_accepts_bare_array_response_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops/900003201/departures"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([departure_json(noon())])),
            )
            .mount(&server)
            .await;

        let board = fetch_transit(&test_config(server.uri()), Berlin, noon())
            .await
            .unwrap();
        assert_eq!(board.departures.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_fails_on_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops/900003201/departures"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = fetch_transit(&test_config(server.uri()), Berlin, noon()).await;
        assert!(matches!(result, Err(InkboardError::Provider { .. })));
    }
}
