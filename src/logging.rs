// Logging - Subscriber setup and host log forwarding
//
// `init_logging` installs the process-wide `tracing` subscriber. Hosts that
// embed the engine (a web backend, a desktop shell) can additionally register
// a callback to receive every event as a single formatted line.

use std::fmt::Write as FmtWrite;
use std::sync::RwLock;

use lazy_static::lazy_static;

use crate::llm::config::EngineConfig;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Host log callback: receives the level and a formatted message
pub type LogCallback = fn(level: Level, message: &str);

/// Messages longer than this are cut before forwarding
const MAX_MESSAGE_LEN: usize = 4096;

lazy_static! {
    static ref LOG_CALLBACK: RwLock<Option<LogCallback>> = RwLock::new(None);
}

/// Register the host log callback, replacing any previous one
pub fn register_log_callback(callback: LogCallback) {
    if let Ok(mut slot) = LOG_CALLBACK.write() {
        *slot = Some(callback);
    }
}

pub fn clear_log_callback() {
    if let Ok(mut slot) = LOG_CALLBACK.write() {
        *slot = None;
    }
}

pub fn has_log_callback() -> bool {
    LOG_CALLBACK.read().map(|slot| slot.is_some()).unwrap_or(false)
}

/// Install the global subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g. `"info"` or
/// `"summary_engine=debug"`) is used. Returns `false` if a subscriber was
/// already installed, in which case nothing changes.
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(HostLogLayer::new(Level::TRACE))
        .try_init()
        .is_ok()
}

/// Install the global subscriber using the configured `log_filter`
///
/// Typical host setup:
///
/// ```no_run
/// use summary_engine::llm::EngineConfig;
///
/// let config = EngineConfig::load_or_default();
/// summary_engine::logging::init_from_config(&config);
/// ```
pub fn init_from_config(config: &EngineConfig) -> bool {
    init_logging(&config.log_filter)
}

/// Layer forwarding events to the registered host callback
pub struct HostLogLayer {
    /// Least severe level to forward
    min_level: Level,
}

impl HostLogLayer {
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }

    fn forward(level: Level, message: &str) {
        let callback = match LOG_CALLBACK.read() {
            Ok(slot) => *slot,
            Err(_) => return,
        };
        let Some(callback) = callback else {
            return;
        };

        if message.len() > MAX_MESSAGE_LEN {
            let cut = floor_char_boundary(message, MAX_MESSAGE_LEN - 96);
            callback(level, &format!("{}... [truncated]", &message[..cut]));
        } else {
            callback(level, message);
        }
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

impl<S> Layer<S> for HostLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();

        if level > self.min_level || !has_log_callback() {
            return;
        }

        let mut message = String::with_capacity(256);
        let target = metadata.target();
        let target = target.strip_prefix("summary_engine::").unwrap_or(target);
        write!(message, "[{}] ", target).ok();

        event.record(&mut MessageVisitor::new(&mut message));

        Self::forward(level, &message);
    }
}

/// Collects the `message` field first, then any structured fields
struct MessageVisitor<'a> {
    message: &'a mut String,
}

impl<'a> MessageVisitor<'a> {
    fn new(message: &'a mut String) -> Self {
        Self { message }
    }

    fn separate(&mut self) {
        if !self.message.is_empty() && !self.message.ends_with(' ') {
            self.message.push(' ');
        }
    }
}

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.separate();
        if field.name() == "message" {
            write!(self.message, "{:?}", value).ok();
        } else {
            write!(self.message, "{}={:?}", field.name(), value).ok();
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.separate();
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            write!(self.message, "{}={}", field.name(), value).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    lazy_static! {
        static ref CAPTURED: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());
    }

    fn capture(level: Level, message: &str) {
        CAPTURED.lock().unwrap().push((level, message.to_string()));
    }

    #[test]
    fn test_init_from_config_installs_once() {
        let config = EngineConfig {
            log_filter: "off".to_string(),
            ..EngineConfig::default()
        };

        init_from_config(&config);
        assert!(!init_logging("debug"));
        assert!(!init_from_config(&config));
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "aé";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 3), 3);
    }

    #[test]
    fn test_layer_forwards_formatted_events() {
        register_log_callback(capture);
        assert!(has_log_callback());

        let subscriber = tracing_subscriber::registry().with(HostLogLayer::new(Level::INFO));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(chunks = 3, "invoke: Planned");
            tracing::debug!("invoke: Too verbose to forward");
            tracing::warn!(target: "summary_engine::llm::engine", "invoke_chunk: chunk=2 failed");
            let long = "x".repeat(MAX_MESSAGE_LEN + 10);
            tracing::error!("{}", long);
        });
        clear_log_callback();

        // Only events raised above; other tests may log through a global subscriber
        let captured: Vec<(Level, String)> = CAPTURED
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| {
                m.contains("invoke: Planned")
                    || m.contains("Too verbose")
                    || m.contains("chunk=2 failed")
                    || m.contains("xxxx")
            })
            .cloned()
            .collect();
        assert_eq!(captured.len(), 3);

        assert_eq!(captured[0].0, Level::INFO);
        assert!(captured[0].1.contains("invoke: Planned"));
        assert!(captured[0].1.contains("chunks=3"));

        assert_eq!(captured[1].0, Level::WARN);
        assert_eq!(captured[1].1, "[llm::engine] invoke_chunk: chunk=2 failed");

        assert!(captured[2].1.ends_with("... [truncated]"));
        assert!(captured[2].1.len() < MAX_MESSAGE_LEN);
    }
}
