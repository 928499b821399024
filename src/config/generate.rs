pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# STREAMSTAT CONFIGURATION
# =============================================================================
# streamstat watches a directory for JSON event files and keeps one streaming
# estimator up to date, printing a new estimate as a JSON line whenever the
# estimator has something new to say.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/streamstat/config.yml
#   3. /etc/streamstat/config.yml
#
# Paths may use ~ and $env{VAR_NAME} references.

# =============================================================================
# SOURCE
# =============================================================================
# Each file holds either one event object or an array of event objects:
#   {"service": "monitoring", "timestamp": 1700000000.5,
#    "message": "HTTP Status Code: 200"}
# Files are read once; malformed files are logged and skipped for good.

source:
  path: /var/spool/streamstat
  # Glob matched against file names (not recursive)
  pattern: "*.json"
  # How long to wait before rescanning when nothing new was found
  poll_interval: 500ms
  # Parsed files buffered ahead of the estimator. When full, the watcher waits.
  channel_capacity: 64

# =============================================================================
# ESTIMATOR
# =============================================================================
# Exactly one estimator per process. Available kinds:
#
#   batch_rate      cumulative share of 2xx status codes
#   sliding_window  failures for one service in a trailing time window
#   reservoir       most common status code in a uniform random sample
#   bloom           share of messages matching a pattern file, per batch

estimator:
  kind: sliding_window
  window_seconds: 60
  target_service: monitoring

# estimator:
#   kind: reservoir
#   reservoir_size: 10

# estimator:
#   kind: bloom
#   filter_file: /etc/streamstat/forwardable.txt
#   bit_count: 1000000
#   hash_count: 7
"#
    .to_string()
}
