use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;
use sizepreview_core::{SurfaceTarget, TelemetryEvent, TelemetryEventType, TelemetrySink};
use tracing::{debug, warn};

pub const SINK_ENV: &str = "SIZEPREVIEW_TELEMETRY_SINK";
pub const FILE_ENV: &str = "SIZEPREVIEW_TELEMETRY_FILE";
pub const ENDPOINT_ENV: &str = "SIZEPREVIEW_TELEMETRY_ENDPOINT";

/// Previews run on the host's UI thread, so a slow collector must not stall a click.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(2);

const SOURCE: &str = "sizepreview";

/// Where preview events go, as configured by the `SIZEPREVIEW_TELEMETRY_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryTarget {
    Stdout,
    File(PathBuf),
    Http(String),
}

impl TelemetryTarget {
    /// Reads the target through `lookup`; `None` when telemetry is off or
    /// the selected sink is missing its path or endpoint.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_blank = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mode = non_blank(SINK_ENV)?.to_ascii_lowercase();
        match mode.as_str() {
            "stdout" => Some(Self::Stdout),
            "file" => non_blank(FILE_ENV).map(|path| Self::File(PathBuf::from(path))),
            "http" => non_blank(ENDPOINT_ENV).map(Self::Http),
            _ => None,
        }
    }

    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn into_sink(self) -> Result<Box<dyn TelemetrySink>> {
        Ok(match self {
            Self::Stdout => Box::new(WriterSink::new(io::stdout())),
            Self::File(path) => Box::new(FileSink::new(path)),
            Self::Http(endpoint) => Box::new(HttpSink::new(endpoint)?),
        })
    }
}

pub fn sink_from_env() -> Option<Box<dyn TelemetrySink>> {
    let target = TelemetryTarget::from_env()?;
    match target.clone().into_sink() {
        Ok(sink) => Some(sink),
        Err(err) => {
            warn!(?target, error = %err, "telemetry sink unavailable");
            None
        }
    }
}

/// One JSON line per preview event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewEventLine<'a> {
    source: &'static str,
    event_type: TelemetryEventType,
    surface: SurfaceTarget,
    width: Option<u32>,
    height: Option<u32>,
    megapixels: Option<f64>,
    duration_ms: Option<u64>,
    detail: Option<&'a str>,
}

impl<'a> From<&'a TelemetryEvent> for PreviewEventLine<'a> {
    fn from(event: &'a TelemetryEvent) -> Self {
        Self {
            source: SOURCE,
            event_type: event.event_type,
            surface: event.surface,
            width: event.dimensions.map(|d| d.width()),
            height: event.dimensions.map(|d| d.height()),
            megapixels: event.dimensions.map(|d| d.megapixels()),
            duration_ms: event.duration_ms,
            detail: event.detail.as_deref(),
        }
    }
}

fn encode_line(event: &TelemetryEvent) -> Result<String> {
    serde_json::to_string(&PreviewEventLine::from(event)).context("encoding telemetry event")
}

/// Writes JSON lines to any writer; stdout in production.
pub struct WriterSink<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: RefCell::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write_event(&self, event: &TelemetryEvent) -> Result<()> {
        let line = encode_line(event)?;
        let mut out = self.out.borrow_mut();
        writeln!(out, "{}", line).context("writing telemetry line")?;
        out.flush().context("flushing telemetry writer")
    }
}

impl<W: Write> TelemetrySink for WriterSink<W> {
    fn emit(&self, event: TelemetryEvent) {
        if let Err(err) = self.write_event(&event) {
            debug!(error = %err, "dropped telemetry event");
        }
    }
}

/// Appends JSON lines to a file, creating parent directories on first use.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn append(&self, event: &TelemetryEvent) -> Result<()> {
        let line = encode_line(event)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating telemetry directory {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening telemetry file {}", self.path.display()))?;
        writeln!(file, "{}", line).context("appending telemetry line")
    }
}

impl TelemetrySink for FileSink {
    fn emit(&self, event: TelemetryEvent) {
        if let Err(err) = self.append(&event) {
            debug!(error = %err, "dropped telemetry event");
        }
    }
}

/// Posts each event as JSON to a collector endpoint.
pub struct HttpSink {
    endpoint: String,
    client: Client,
}

impl HttpSink {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building telemetry http client")?;
        Ok(Self { endpoint, client })
    }

    fn post(&self, event: &TelemetryEvent) -> Result<()> {
        let status = self
            .client
            .post(&self.endpoint)
            .json(&PreviewEventLine::from(event))
            .send()
            .with_context(|| format!("posting telemetry to {}", self.endpoint))?
            .status();
        if !status.is_success() {
            bail!("telemetry endpoint {} answered {}", self.endpoint, status);
        }
        Ok(())
    }
}

impl TelemetrySink for HttpSink {
    fn emit(&self, event: TelemetryEvent) {
        if let Err(err) = self.post(&event) {
            debug!(error = %err, "dropped telemetry event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Read};
    use std::net::TcpListener;
    use std::sync::Mutex;

    use sizepreview_core::Dimensions;

    use super::*;

    // Tests that touch process env run one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn success_event() -> TelemetryEvent {
        TelemetryEvent {
            event_type: TelemetryEventType::PreviewSuccess,
            surface: SurfaceTarget::Html,
            dimensions: Some(Dimensions::new(1920, 1080).expect("dimensions")),
            duration_ms: Some(3),
            detail: Some("suggestion=HD wallpaper / small-format print".to_string()),
        }
    }

    fn error_event() -> TelemetryEvent {
        TelemetryEvent {
            event_type: TelemetryEventType::PreviewError,
            surface: SurfaceTarget::Command,
            dimensions: None,
            duration_ms: Some(0),
            detail: Some("invalid width: missing".to_string()),
        }
    }

    fn target(vars: &[(&str, &str)]) -> Option<TelemetryTarget> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        TelemetryTarget::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn event_line_is_kebab_tagged_camel_case_json() {
        let line = encode_line(&success_event()).expect("encodable");
        let value: serde_json::Value = serde_json::from_str(&line).expect("valid json");
        assert_eq!(value["source"], "sizepreview");
        assert_eq!(value["eventType"], "preview-success");
        assert_eq!(value["surface"], "html");
        assert_eq!(value["width"], 1920);
        assert_eq!(value["height"], 1080);
        assert!((value["megapixels"].as_f64().expect("megapixels") - 2.0736).abs() < 1e-9);
        assert_eq!(value["durationMs"], 3);
    }

    #[test]
    fn target_selection_from_variables() {
        assert_eq!(target(&[]), None);
        assert_eq!(target(&[(SINK_ENV, " Stdout ")]), Some(TelemetryTarget::Stdout));
        assert_eq!(
            target(&[(SINK_ENV, "file"), (FILE_ENV, "/tmp/preview.jsonl")]),
            Some(TelemetryTarget::File(PathBuf::from("/tmp/preview.jsonl")))
        );
        assert_eq!(
            target(&[(SINK_ENV, "HTTP"), (ENDPOINT_ENV, "http://collector/events")]),
            Some(TelemetryTarget::Http("http://collector/events".to_string()))
        );
    }

    #[test]
    fn target_is_off_for_unknown_mode_or_blank_location() {
        assert_eq!(target(&[(SINK_ENV, "syslog")]), None);
        assert_eq!(target(&[(SINK_ENV, "  ")]), None);
        assert_eq!(target(&[(SINK_ENV, "file")]), None);
        assert_eq!(target(&[(SINK_ENV, "file"), (FILE_ENV, "   ")]), None);
        assert_eq!(target(&[(SINK_ENV, "http"), (ENDPOINT_ENV, "")]), None);
    }

    #[test]
    fn sink_from_env_follows_process_variables() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("env.jsonl");

        std::env::remove_var(SINK_ENV);
        assert!(sink_from_env().is_none());

        std::env::set_var(SINK_ENV, "file");
        std::env::remove_var(FILE_ENV);
        assert!(sink_from_env().is_none());

        std::env::set_var(FILE_ENV, &path);
        let sink = sink_from_env().expect("file sink selected");
        sink.emit(success_event());
        let contents = std::fs::read_to_string(&path).expect("telemetry file written");
        assert!(contents.contains("\"eventType\":\"preview-success\""));

        std::env::set_var(SINK_ENV, "carrier-pigeon");
        assert!(sink_from_env().is_none());

        std::env::remove_var(SINK_ENV);
        std::env::remove_var(FILE_ENV);
    }

    #[test]
    fn writer_sink_writes_one_line_per_event() {
        let sink = WriterSink::new(Vec::new());
        sink.emit(success_event());
        sink.emit(error_event());
        let text = String::from_utf8(sink.into_inner()).expect("utf8");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"surface\":\"html\""));
        assert!(lines[1].contains("\"eventType\":\"preview-error\""));
    }

    #[test]
    fn file_sink_appends_one_line_per_event() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("telemetry.jsonl");
        let sink = FileSink::new(path.clone());
        sink.emit(success_event());
        sink.emit(error_event());
        let contents = std::fs::read_to_string(&path).expect("telemetry file written");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"eventType\":\"preview-error\""));
        assert!(lines[1].contains("\"width\":null"));
    }

    /// Accepts one request, answers `status`, and hands back the request body.
    fn one_shot_collector(status: &'static str) -> (String, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind collector");
        let endpoint = format!("http://{}/events", listener.local_addr().expect("local addr"));
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut content_length = 0usize;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).expect("read header");
                let header = header.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().expect("content length");
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).expect("read body");
            let mut stream = stream;
            write!(stream, "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status)
                .expect("write response");
            String::from_utf8(body).expect("utf8 body")
        });
        (endpoint, handle)
    }

    #[test]
    fn http_sink_posts_event_json() {
        let (endpoint, collector) = one_shot_collector("200 OK");
        let sink = HttpSink::new(endpoint).expect("client");
        sink.post(&success_event()).expect("collector accepts");
        let body: serde_json::Value = serde_json::from_str(&collector.join().expect("collector")).expect("json body");
        assert_eq!(body["eventType"], "preview-success");
        assert_eq!(body["width"], 1920);
    }

    #[test]
    fn http_sink_reports_rejection_without_panicking() {
        let (endpoint, collector) = one_shot_collector("503 Service Unavailable");
        let sink = HttpSink::new(endpoint).expect("client");
        let err = sink.post(&error_event()).expect_err("503 is a failure");
        assert!(err.to_string().contains("503"));
        collector.join().expect("collector");
        sink.emit(error_event());
    }
}
