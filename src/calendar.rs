use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use google_calendar3::{
    CalendarHub,
    api::{Event, Scope},
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use tracing::instrument;

use crate::auth::RefreshAuthenticator;
use crate::config::CalendarConfig;
use crate::error::InkboardError;
use crate::models::{AgendaEvent, CalendarAgenda, DayGroup};
use crate::{Result, localtime};

pub type CalendarHubType =
    CalendarHub<HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Events per calendar per refresh cycle
const MAX_RESULTS_PER_CALENDAR: i32 = 20;

/// Agenda window in days
const AGENDA_WINDOW_DAYS: i64 = 7;

/// Fetch the next week's events from all configured calendars and fold them
/// into one day-grouped agenda. A calendar that errors is skipped for this
/// cycle; only missing credentials fail the whole adapter.
#[instrument(skip(config))]
pub async fn fetch_agenda(
    config: &CalendarConfig,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<CalendarAgenda> {
    // Credential check happens before any network call
    let credentials = config.credentials().ok_or_else(|| {
        InkboardError::config(
            "Google Calendar credentials not configured; \
             set calendar client_id, client_secret, and refresh_token",
        )
    })?;

    let hub = build_hub(credentials)?;
    let time_min = now;
    let time_max = now + Duration::days(AGENDA_WINDOW_DAYS);

    let results = join_all(
        config
            .ids
            .iter()
            .map(|id| list_events(&hub, id, time_min, time_max)),
    )
    .await;

    let mut events: Vec<Event> = Vec::new();
    for (id, outcome) in config.ids.iter().zip(results) {
        match outcome {
            Ok(items) => events.extend(items),
            Err(err) => {
                tracing::warn!(calendar = %id, error = %err, "skipping calendar for this cycle");
            }
        }
    }

    Ok(build_agenda(&events, now, tz))
}

fn build_hub(credentials: crate::config::GoogleCredentials) -> Result<CalendarHubType> {
    let connector = HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|err| InkboardError::provider(format!("Failed to build HTTPS connector: {err}")))?
        .https_only()
        .enable_http2()
        .build();

    let hyper_client = Client::builder(TokioExecutor::new()).build(connector);
    let auth = RefreshAuthenticator::new(credentials);

    Ok(CalendarHub::new(hyper_client, auth))
}

async fn list_events(
    hub: &CalendarHubType,
    calendar_id: &str,
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
) -> std::result::Result<Vec<Event>, google_calendar3::Error> {
    let (_, events) = hub
        .events()
        .list(calendar_id)
        .add_scopes(&[
            Scope::EventReadonly,
            Scope::Readonly,
            Scope::EventPublicReadonly,
        ])
        .time_min(time_min)
        .time_max(time_max)
        .max_results(MAX_RESULTS_PER_CALENDAR)
        .single_events(true)
        .order_by("startTime")
        .doit()
        .await?;

    Ok(events.items.unwrap_or_default())
}

/// A provider event reduced to the fields the agenda needs, with all-day
/// bounds already synthesized.
struct ParsedEvent {
    id: String,
    title: String,
    location: Option<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    all_day: bool,
}

/// All-day status comes from a date-only start field. All-day events span
/// local midnight to local 23:59:59 of the end date; timed events keep the
/// provider's timestamps. Events without id or summary are dropped.
fn parse_event(event: &Event, tz: Tz) -> Option<ParsedEvent> {
    let id = event.id.clone()?;
    let title = event.summary.clone()?;
    let start = event.start.as_ref()?;

    let all_day = start.date.is_some() && start.date_time.is_none();
    let (start_at, end_at) = if all_day {
        let start_date = start.date?;
        let end_date = event
            .end
            .as_ref()
            .and_then(|e| e.date)
            .unwrap_or(start_date);
        (
            localtime::local_midnight(start_date, tz)?,
            localtime::local_end_of_day(end_date, tz)?,
        )
    } else {
        let start_at = start.date_time?;
        let end_at = event
            .end
            .as_ref()
            .and_then(|e| e.date_time)
            .unwrap_or(start_at);
        (start_at, end_at)
    };

    Some(ParsedEvent {
        id,
        title,
        location: event.location.clone(),
        start: start_at,
        end: end_at,
        all_day,
    })
}

/// Merge events across calendars (last write wins per id), sort globally by
/// start instant, and group consecutive events sharing a day label.
pub(crate) fn build_agenda(events: &[Event], now: DateTime<Utc>, tz: Tz) -> CalendarAgenda {
    let mut merged: HashMap<String, ParsedEvent> = HashMap::new();
    for event in events {
        if let Some(parsed) = parse_event(event, tz) {
            merged.insert(parsed.id.clone(), parsed);
        }
    }

    let mut sorted: Vec<ParsedEvent> = merged.into_values().collect();
    // Id as tiebreak keeps the unordered merge deterministic
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    let mut days: Vec<DayGroup> = Vec::new();
    for parsed in sorted {
        let label = localtime::day_label(parsed.start, now, tz);
        let is_now = !parsed.all_day && parsed.start <= now && now < parsed.end;

        let entry = AgendaEvent {
            start_time: (!parsed.all_day).then(|| localtime::format_hm(parsed.start, tz)),
            end_time: (!parsed.all_day).then(|| localtime::format_hm(parsed.end, tz)),
            id: parsed.id,
            title: parsed.title,
            location: parsed.location,
            is_now,
            is_all_day: parsed.all_day,
        };

        match days.last_mut() {
            Some(group) if group.label == label => group.events.push(entry),
            _ => days.push(DayGroup {
                label,
                events: vec![entry],
            }),
        }
    }

    CalendarAgenda { days }
}
