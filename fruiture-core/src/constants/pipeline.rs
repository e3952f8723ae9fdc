//! Pipeline Parameters
//!
//! Timing, gating and transport defaults of the reference deployment.

// ===== SUMMARIZER =====

/// Interval between periodic summaries (seconds).
pub const SUMMARY_INTERVAL_SECS: u64 = 600;

/// Decimal places kept in summary statistics.
pub const SUMMARY_DECIMALS: i32 = 3;

/// Minimum classifier confidence before the actuator is driven.
pub const MIN_ACTION_CONFIDENCE: f64 = 0.7;

// ===== PREDICTION =====

/// First predicted ripening day.
pub const MIN_PREDICTED_DAY: u8 = 1;

/// Last predicted ripening day (spoiled).
pub const MAX_PREDICTED_DAY: u8 = 5;

/// Servo degrees per predicted day, so days 1..5 map onto 0..180.
pub const ACTUATOR_DEGREES_PER_DAY: u16 = 45;

/// Notify when fewer than this many days of shelf life remain.
pub const ALERT_REMAINING_DAYS: f64 = 4.0;

// ===== TRANSPORT =====

/// Public broker used by the reference device.
pub const DEFAULT_BROKER_HOST: &str = "test.mosquitto.org";

/// Plain MQTT port.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Subscription covering every device channel.
pub const DEFAULT_SUBSCRIPTION: &str = "fruiture/#";

/// Topic carrying the periodic summary.
pub const SUMMARY_TOPIC: &str = "fruiture/ml_input";

/// Topic carrying the predicted day and servo angle.
pub const ACTUATION_TOPIC: &str = "fruiture/servo_angle";

/// Keep-alive for the broker session (seconds).
pub const KEEP_ALIVE_SECS: u64 = 60;

/// Delay before reconnecting after a transport error (seconds).
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Capacity of the channel between the transport and the ingestion worker.
pub const INGEST_CHANNEL_CAPACITY: usize = 64;
