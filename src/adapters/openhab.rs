//! OpenHAB adapter (C4): REST snapshot + SSE live-event stream, normalized
//! into [`Signal`]s.
//!
//! Grounded on `lumehaven/adapters/openhab/adapter.py`. The biggest
//! departure from it: `httpx`'s lazy get-or-recreate-client dance existed
//! to cope with a client that can be closed out from under you; `reqwest`'s
//! `Client` has no such state; a client built once in `new` covers both the
//! REST calls and (a second instance, with no read timeout) the SSE stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

use crate::error::AdapterError;
use crate::signal::{is_unavailable_sentinel, Signal, SignalType, SignalValue};
use crate::units::{self, extract_unit_from_pattern, format_value, MeasurementSystem};

use super::SmartHomeAdapter;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const ITEM_FIELDS: &str = "name%2Clabel%2Cstate%2Ctype%2CstateDescription%2CtransformedState";

/// Cached per-item formatting info, built at snapshot time, consumed by
/// every subsequent live event for that item.
#[derive(Debug, Clone)]
struct ItemMetadata {
    unit: String,
    format: String,
    is_quantity_type: bool,
    event_state_contains_unit: bool,
    label: String,
    signal_type: SignalType,
}

#[derive(Debug, Deserialize)]
struct StateDescription {
    #[serde(default)]
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemRecord {
    name: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    state: String,
    #[serde(default, rename = "type")]
    item_type: String,
    #[serde(default, rename = "stateDescription")]
    state_description: Option<StateDescription>,
    #[serde(default, rename = "transformedState")]
    transformed_state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EventPayload {
    state: Option<String>,
    #[serde(rename = "displayState")]
    display_state: Option<String>,
}

pub struct OpenHabAdapter {
    name: String,
    prefix: String,
    base_url: String,
    tag: String,
    client: reqwest::Client,
    sse_client: reqwest::Client,
    default_units: OnceCell<HashMap<&'static str, &'static str>>,
    item_metadata: Mutex<HashMap<String, ItemMetadata>>,
    connected: AtomicBool,
}

impl OpenHabAdapter {
    pub fn new(
        base_url: impl Into<String>,
        tag: impl Into<String>,
        name: Option<String>,
        prefix: Option<String>,
    ) -> Self {
        OpenHabAdapter {
            name: name.unwrap_or_else(|| "openhab".to_string()),
            prefix: prefix.unwrap_or_else(|| "oh".to_string()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tag: tag.into(),
            client: build_client(Some(REQUEST_TIMEOUT)),
            sse_client: build_client(None),
            default_units: OnceCell::new(),
            item_metadata: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
        }
    }

    fn prefixed_id(&self, item_name: &str) -> String {
        format!("{}:{}", self.prefix, item_name)
    }

    async fn ensure_initialized(&self) -> Result<&HashMap<&'static str, &'static str>, AdapterError> {
        self.default_units
            .get_or_try_init(|| async {
                let system = self.measurement_system().await?;
                Ok::<_, AdapterError>(units::default_units(system))
            })
            .await
    }

    async fn measurement_system(&self) -> Result<MeasurementSystem, AdapterError> {
        let url = format!("{}/rest/", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;
        self.connected.store(true, Ordering::Relaxed);
        let response = response
            .error_for_status()
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;

        let raw = data
            .get("measurementSystem")
            .and_then(|v| v.as_str())
            .unwrap_or("SI");
        if raw != "SI" && raw != "US" {
            warn!(value = raw, "unknown measurementSystem, defaulting to SI");
        }
        Ok(MeasurementSystem::parse(raw))
    }

    fn extract_signal(
        &self,
        item: &ItemRecord,
        default_units: &HashMap<&'static str, &'static str>,
    ) -> (Signal, ItemMetadata) {
        let id = self.prefixed_id(&item.name);
        let mut parts = item.item_type.splitn(2, ':');
        let base_type = parts.next().unwrap_or("");
        let quantity_suffix = parts.next();

        struct Branch {
            unit: String,
            format: String,
            is_quantity_type: bool,
            event_state_contains_unit: bool,
            signal_type: SignalType,
            display_value: String,
        }

        let branch = if let Some(transformed) = &item.transformed_state {
            Branch {
                unit: String::new(),
                format: "%s".to_string(),
                is_quantity_type: false,
                event_state_contains_unit: false,
                signal_type: SignalType::String,
                display_value: transformed.clone(),
            }
        } else if base_type == "DateTime" {
            Branch {
                unit: String::new(),
                format: "%s".to_string(),
                is_quantity_type: false,
                event_state_contains_unit: false,
                signal_type: SignalType::DateTime,
                display_value: item.state.clone(),
            }
        } else if let Some(pattern) = item
            .state_description
            .as_ref()
            .and_then(|sd| sd.pattern.clone())
        {
            let is_quantity_type = quantity_suffix.is_some();
            let (unit, format) = extract_unit_from_pattern(&pattern);
            let display_value = format_value(&item.state, &unit, &format, is_quantity_type);
            Branch {
                unit,
                format,
                is_quantity_type,
                event_state_contains_unit: true,
                signal_type: signal_type_for_base_type(base_type),
                display_value,
            }
        } else if let Some(suffix) = quantity_suffix {
            let unit = default_units.get(suffix).copied().unwrap_or("").to_string();
            let display_value = format_value(&item.state, &unit, "%s", true);
            Branch {
                unit,
                format: "%s".to_string(),
                is_quantity_type: true,
                event_state_contains_unit: true,
                signal_type: signal_type_for_base_type(base_type),
                display_value,
            }
        } else if matches!(base_type, "Rollershutter" | "Dimmer") {
            Branch {
                unit: "%".to_string(),
                format: "%d".to_string(),
                is_quantity_type: false,
                event_state_contains_unit: false,
                signal_type: SignalType::Number,
                display_value: item.state.clone(),
            }
        } else {
            Branch {
                unit: String::new(),
                format: "%s".to_string(),
                is_quantity_type: false,
                event_state_contains_unit: false,
                signal_type: signal_type_for_base_type(base_type),
                display_value: item.state.clone(),
            }
        };

        let metadata = ItemMetadata {
            unit: branch.unit.clone(),
            format: branch.format,
            is_quantity_type: branch.is_quantity_type,
            event_state_contains_unit: branch.event_state_contains_unit,
            label: item.label.clone(),
            signal_type: branch.signal_type,
        };

        let signal = if is_unavailable_sentinel(&item.state) {
            Signal::new(id, SignalValue::Absent, branch.signal_type)
                .with_unit(branch.unit)
                .with_label(item.label.clone())
        } else {
            let value = coerce(&branch.display_value, branch.signal_type);
            Signal::new(id, value, branch.signal_type)
                .with_unit(branch.unit)
                .with_label(item.label.clone())
                .with_display_value(branch.display_value)
        };

        (signal, metadata)
    }

    /// Fetch a single item by its raw upstream name. Not part of the
    /// `SmartHomeAdapter` trait (the manager never calls it); kept for the
    /// reserved write-back command path a future release may wire up.
    pub async fn get_signal(&self, item_name: &str) -> Result<Signal, AdapterError> {
        let default_units = self.ensure_initialized().await?.clone();
        let url = format!(
            "{}/rest/items/{}?fields={}",
            self.base_url, item_name, ITEM_FIELDS
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AdapterError::SignalNotFound {
                id: item_name.to_string(),
            });
        }
        let response = response
            .error_for_status()
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;
        let item: ItemRecord = response
            .json()
            .await
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;

        let (signal, metadata) = self.extract_signal(&item, &default_units);
        self.item_metadata
            .lock()
            .await
            .insert(item.name.clone(), metadata);
        Ok(signal)
    }
}

#[async_trait]
impl SmartHomeAdapter for OpenHabAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn adapter_type(&self) -> &str {
        "openhab"
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn snapshot(&self) -> Result<HashMap<String, Signal>, AdapterError> {
        let default_units = self.ensure_initialized().await?.clone();

        let mut query = format!("recursive=false&fields={ITEM_FIELDS}");
        if !self.tag.is_empty() {
            query = format!("tags={}&{}", self.tag, query);
        }
        let url = format!("{}/rest/items?{}", self.base_url, query);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;
        self.connected.store(true, Ordering::Relaxed);
        let response = response
            .error_for_status()
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;
        let items: Vec<ItemRecord> = response
            .json()
            .await
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;

        let mut signals = HashMap::with_capacity(items.len());
        let mut metadata = self.item_metadata.lock().await;
        for item in &items {
            let (signal, item_metadata) = self.extract_signal(item, &default_units);
            metadata.insert(item.name.clone(), item_metadata);
            signals.insert(signal.id.clone(), signal);
        }
        drop(metadata);

        info!(count = signals.len(), "loaded signals from openhab");
        Ok(signals)
    }

    async fn subscribe_events(&self) -> Result<BoxStream<'static, Signal>, AdapterError> {
        self.ensure_initialized().await?;
        if self.item_metadata.lock().await.is_empty() {
            self.snapshot().await?;
        }

        let url = format!("{}/rest/events/states", self.base_url);
        let response = self
            .sse_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;

        let mut reader = LineReader::new(response);

        let connection_id = loop {
            match reader
                .next_line()
                .await
                .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?
            {
                Some(line) => {
                    if let Some(data) = line.strip_prefix("data:") {
                        break data.trim().to_string();
                    }
                }
                None => {
                    return Err(AdapterError::connection_failure(
                        "openhab",
                        &self.base_url,
                        "stream ended before connection id arrived",
                    ))
                }
            }
        };

        let item_names: Vec<String> = self.item_metadata.lock().await.keys().cloned().collect();
        let subscribe_url = format!("{}/rest/events/states/{}", self.base_url, connection_id);
        self.client
            .post(&subscribe_url)
            .json(&item_names)
            .send()
            .await
            .map_err(|e| AdapterError::connection_failure("openhab", &self.base_url, e))?;
        info!(count = item_names.len(), "subscribed to items");
        self.connected.store(true, Ordering::Relaxed);

        let prefix = self.prefix.clone();
        let metadata_source: Arc<Mutex<HashMap<String, ItemMetadata>>> = {
            // Event processing only needs read access to the metadata this
            // adapter already owns; cloning the cache once up front avoids
            // holding the adapter alive across the stream's lifetime.
            let snapshot = self.item_metadata.lock().await.clone();
            Arc::new(Mutex::new(snapshot))
        };

        let state = EventStreamState {
            reader,
            metadata: metadata_source,
            prefix,
            pending: std::collections::VecDeque::new(),
        };

        let stream = futures::stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(signal) = state.pending.pop_front() {
                    return Some((signal, state));
                }

                let line = match state.reader.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => return None,
                    Err(_) => return None,
                };

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                let events: HashMap<String, EventPayload> = match serde_json::from_str(data) {
                    Ok(events) => events,
                    Err(_) => {
                        let preview: String = data.chars().take(100).collect();
                        warn!(preview, "failed to parse SSE event");
                        continue;
                    }
                };

                for (item_name, payload) in events {
                    if !state.metadata.lock().await.contains_key(&item_name) {
                        continue;
                    }
                    if let Some(signal) =
                        process_event(&state.metadata, &state.prefix, &item_name, &payload).await
                    {
                        state.pending.push_back(signal);
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

struct EventStreamState {
    reader: LineReader,
    metadata: Arc<Mutex<HashMap<String, ItemMetadata>>>,
    prefix: String,
    pending: std::collections::VecDeque<Signal>,
}

async fn process_event(
    metadata: &Mutex<HashMap<String, ItemMetadata>>,
    prefix: &str,
    item_name: &str,
    payload: &EventPayload,
) -> Option<Signal> {
    let meta = metadata.lock().await.get(item_name).cloned()?;
    let id = format!("{prefix}:{item_name}");

    let state_absent = match &payload.state {
        None => true,
        Some(s) => is_unavailable_sentinel(s),
    };

    if state_absent {
        return Some(
            Signal::new(id, SignalValue::Absent, meta.signal_type)
                .with_unit(meta.unit)
                .with_label(meta.label),
        );
    }

    let display_value = if meta.event_state_contains_unit {
        let raw = repair_mojibake(payload.state.as_deref().unwrap_or(""));
        format_value(&raw, &meta.unit, &meta.format, meta.is_quantity_type)
    } else if let Some(display_state) = &payload.display_state {
        repair_mojibake(display_state)
    } else {
        repair_mojibake(payload.state.as_deref().unwrap_or(""))
    };

    let value = coerce(&display_value, meta.signal_type);

    Some(
        Signal::new(id, value, meta.signal_type)
            .with_unit(meta.unit)
            .with_label(meta.label)
            .with_display_value(display_value),
    )
}

fn signal_type_for_base_type(base_type: &str) -> SignalType {
    match base_type {
        "Number" | "Dimmer" | "Rollershutter" => SignalType::Number,
        "Switch" | "Contact" => SignalType::Boolean,
        "DateTime" => SignalType::DateTime,
        "Player" => SignalType::Enum,
        _ => SignalType::String,
    }
}

fn coerce(display_value: &str, signal_type: SignalType) -> SignalValue {
    match signal_type {
        SignalType::Number => match display_value.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => SignalValue::Integer(f as i64),
            Ok(f) => SignalValue::Float(f),
            Err(_) => SignalValue::String(display_value.to_string()),
        },
        SignalType::Boolean => match display_value {
            "ON" | "OPEN" => SignalValue::Boolean(true),
            "OFF" | "CLOSED" => SignalValue::Boolean(false),
            other => SignalValue::String(other.to_string()),
        },
        SignalType::String | SignalType::Enum | SignalType::DateTime => {
            SignalValue::String(display_value.to_string())
        }
    }
}

/// Repair a string that was originally valid UTF-8, got decoded as
/// windows-1252 somewhere upstream, and is now mojibake. Encodes back to
/// the assumed windows-1252 bytes and re-decodes as UTF-8; leaves the input
/// untouched when either step fails.
fn repair_mojibake(input: &str) -> String {
    let (bytes, _, had_unmappable) = encoding_rs::WINDOWS_1252.encode(input);
    if had_unmappable {
        return input.to_string();
    }
    match std::str::from_utf8(&bytes) {
        Ok(repaired) if repaired != input => repaired.to_string(),
        _ => input.to_string(),
    }
}

fn build_client(overall_timeout: Option<Duration>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);
    if let Some(timeout) = overall_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .expect("reqwest client configuration is always valid")
}

/// Buffers a `reqwest::Response`'s body and yields it line by line. SSE
/// framing is newline-delimited; `reqwest`'s streaming body only hands us
/// raw chunks, so this is the minimal line reader that sits between them.
struct LineReader {
    response: reqwest::Response,
    buffer: Vec<u8>,
}

impl LineReader {
    fn new(response: reqwest::Response) -> Self {
        LineReader {
            response,
            buffer: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> Result<Option<String>, reqwest::Error> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop(); // trailing \n
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            match self.response.chunk().await? {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => {
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    let rest = std::mem::take(&mut self.buffer);
                    return Ok(Some(String::from_utf8_lossy(&rest).into_owned()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_type_mapping_matches_table() {
        assert_eq!(signal_type_for_base_type("Number"), SignalType::Number);
        assert_eq!(signal_type_for_base_type("Dimmer"), SignalType::Number);
        assert_eq!(signal_type_for_base_type("Rollershutter"), SignalType::Number);
        assert_eq!(signal_type_for_base_type("Switch"), SignalType::Boolean);
        assert_eq!(signal_type_for_base_type("Contact"), SignalType::Boolean);
        assert_eq!(signal_type_for_base_type("DateTime"), SignalType::DateTime);
        assert_eq!(signal_type_for_base_type("Player"), SignalType::Enum);
        assert_eq!(signal_type_for_base_type("String"), SignalType::String);
    }

    #[test]
    fn coerce_number_splits_integer_and_float() {
        assert_eq!(coerce("21.5", SignalType::Number), SignalValue::Float(21.5));
        assert_eq!(coerce("3", SignalType::Number), SignalValue::Integer(3));
        assert_eq!(
            coerce("not-a-number", SignalType::Number),
            SignalValue::String("not-a-number".to_string())
        );
    }

    #[test]
    fn coerce_boolean_recognizes_on_off_open_closed() {
        assert_eq!(coerce("ON", SignalType::Boolean), SignalValue::Boolean(true));
        assert_eq!(coerce("OPEN", SignalType::Boolean), SignalValue::Boolean(true));
        assert_eq!(coerce("OFF", SignalType::Boolean), SignalValue::Boolean(false));
        assert_eq!(coerce("CLOSED", SignalType::Boolean), SignalValue::Boolean(false));
        assert_eq!(
            coerce("weird", SignalType::Boolean),
            SignalValue::String("weird".to_string())
        );
    }

    fn adapter() -> OpenHabAdapter {
        OpenHabAdapter::new("http://localhost:8080", "", None, None)
    }

    fn item(name: &str, item_type: &str, state: &str, label: &str) -> ItemRecord {
        ItemRecord {
            name: name.to_string(),
            label: label.to_string(),
            state: state.to_string(),
            item_type: item_type.to_string(),
            state_description: None,
            transformed_state: None,
        }
    }

    fn si_units() -> HashMap<&'static str, &'static str> {
        units::default_units(MeasurementSystem::Si)
    }

    #[test]
    fn snapshot_temperature_with_pattern() {
        let adapter = adapter();
        let mut it = item("LR_Temp", "Number:Temperature", "21.5 \u{b0}C", "Living Room");
        it.state_description = Some(StateDescription {
            pattern: Some("%.1f \u{b0}C".to_string()),
        });
        let (signal, meta) = adapter.extract_signal(&it, &si_units());

        assert_eq!(signal.id, "oh:LR_Temp");
        assert_eq!(signal.value, SignalValue::Float(21.5));
        assert_eq!(signal.display_value, "21.5");
        assert_eq!(signal.unit, "\u{b0}C");
        assert!(signal.available);
        assert_eq!(signal.signal_type, SignalType::Number);
        assert!(meta.is_quantity_type);
        assert!(meta.event_state_contains_unit);
    }

    #[test]
    fn snapshot_switch_on() {
        let adapter = adapter();
        let it = item("LR_Light", "Switch", "ON", "Living Room Light");
        let (signal, _) = adapter.extract_signal(&it, &si_units());

        assert_eq!(signal.id, "oh:LR_Light");
        assert_eq!(signal.value, SignalValue::Boolean(true));
        assert_eq!(signal.display_value, "ON");
        assert_eq!(signal.unit, "");
        assert_eq!(signal.signal_type, SignalType::Boolean);
    }

    #[test]
    fn snapshot_contact_closed() {
        let adapter = adapter();
        let it = item("Door", "Contact", "CLOSED", "Front Door");
        let (signal, _) = adapter.extract_signal(&it, &si_units());

        assert_eq!(signal.value, SignalValue::Boolean(false));
        assert_eq!(signal.signal_type, SignalType::Boolean);
        assert_eq!(signal.display_value, "CLOSED");
    }

    #[test]
    fn snapshot_undef_temperature() {
        let adapter = adapter();
        let it = item("Off", "Number:Temperature", "UNDEF", "Offline Sensor");
        let (signal, meta) = adapter.extract_signal(&it, &si_units());

        assert_eq!(signal.id, "oh:Off");
        assert_eq!(signal.value, SignalValue::Absent);
        assert_eq!(signal.display_value, "");
        assert_eq!(signal.unit, "\u{b0}C");
        assert!(!signal.available);
        assert_eq!(signal.signal_type, SignalType::Number);
        assert_eq!(meta.unit, "\u{b0}C");
    }

    #[test]
    fn snapshot_transformed_state_overrides_to_string() {
        let adapter = adapter();
        let mut it = item("Uptime", "Number", "172800", "Uptime");
        it.transformed_state = Some("2d 0h".to_string());
        let (signal, meta) = adapter.extract_signal(&it, &si_units());

        assert_eq!(signal.value, SignalValue::String("2d 0h".to_string()));
        assert_eq!(signal.signal_type, SignalType::String);
        assert!(!meta.event_state_contains_unit);
    }

    #[test]
    fn snapshot_rollershutter_is_percent_number() {
        let adapter = adapter();
        let it = item("Blinds", "Rollershutter", "42", "Blinds");
        let (signal, _) = adapter.extract_signal(&it, &si_units());

        assert_eq!(signal.unit, "%");
        assert_eq!(signal.value, SignalValue::Integer(42));
        assert_eq!(signal.signal_type, SignalType::Number);
    }

    #[test]
    fn repair_mojibake_fixes_double_encoded_text() {
        // "°C" encoded as UTF-8 bytes [0xC2, 0xB0, b'C'], then those bytes
        // misread one-at-a-time as windows-1252 code points.
        let mojibake = "\u{c2}\u{b0}C";
        assert_eq!(repair_mojibake(mojibake), "\u{b0}C");
    }

    #[test]
    fn repair_mojibake_is_a_no_op_on_clean_text() {
        assert_eq!(repair_mojibake("21.5"), "21.5");
    }

    async fn mock_measurement_system(server: &wiremock::MockServer) {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/rest/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"measurementSystem": "SI"})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn get_signal_returns_the_signal_on_success() {
        let server = wiremock::MockServer::start().await;
        mock_measurement_system(&server).await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/rest/items/LR_Light"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "LR_Light",
                "label": "Living Room Light",
                "state": "ON",
                "type": "Switch",
            })))
            .mount(&server)
            .await;

        let adapter = OpenHabAdapter::new(server.uri(), "", None, None);
        let signal = adapter.get_signal("LR_Light").await.unwrap();

        assert_eq!(signal.id, "oh:LR_Light");
        assert_eq!(signal.value, SignalValue::Boolean(true));
        assert_eq!(signal.signal_type, SignalType::Boolean);
    }

    #[tokio::test]
    async fn get_signal_404_is_signal_not_found() {
        let server = wiremock::MockServer::start().await;
        mock_measurement_system(&server).await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/rest/items/Missing"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = OpenHabAdapter::new(server.uri(), "", None, None);
        let err = adapter.get_signal("Missing").await.unwrap_err();

        assert!(matches!(err, AdapterError::SignalNotFound { id } if id == "Missing"));
    }

    #[tokio::test]
    async fn get_signal_server_error_is_connection_failure() {
        let server = wiremock::MockServer::start().await;
        mock_measurement_system(&server).await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/rest/items/Broken"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let adapter = OpenHabAdapter::new(server.uri(), "", None, None);
        let err = adapter.get_signal("Broken").await.unwrap_err();

        assert!(matches!(err, AdapterError::ConnectionFailure { .. }));
    }
}
