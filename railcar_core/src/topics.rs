//! Topic routing between the pub/sub transport and the controller's command
//! channel, plus the reverse mapping from notices to outbound publishes.
//!
//! All topics live under a per-device prefix, e.g. `trains/trainA/pid/kp`.

use crate::command::{Command, CommandSender, ExperimentMode, ParamKey};
use crate::controller::Notice;
use crate::status::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Set(ParamKey),
    Sync(ExperimentMode),
    Request(ExperimentMode),
    Apply,
}

const ROUTES: &[(&str, Route)] = &[
    ("pid/sync", Route::Sync(ExperimentMode::PidControl)),
    ("pid/kp", Route::Set(ParamKey::PidKp)),
    ("pid/ki", Route::Set(ParamKey::PidKi)),
    ("pid/kd", Route::Set(ParamKey::PidKd)),
    ("pid/ref", Route::Set(ParamKey::PidReference)),
    (
        "pid/request_params",
        Route::Request(ExperimentMode::PidControl),
    ),
    ("step/sync", Route::Sync(ExperimentMode::StepResponse)),
    ("step/amplitude", Route::Set(ParamKey::StepAmplitude)),
    ("step/time", Route::Set(ParamKey::StepDuration)),
    ("step/direction", Route::Set(ParamKey::StepDirection)),
    ("step/vbatt", Route::Set(ParamKey::StepVbatt)),
    (
        "step/request_params",
        Route::Request(ExperimentMode::StepResponse),
    ),
    (
        "deadband/sync",
        Route::Sync(ExperimentMode::DeadbandCalibration),
    ),
    (
        "deadband/direction",
        Route::Set(ParamKey::DeadbandDirection),
    ),
    (
        "deadband/threshold",
        Route::Set(ParamKey::DeadbandThreshold),
    ),
    (
        "deadband/request_params",
        Route::Request(ExperimentMode::DeadbandCalibration),
    ),
    ("deadband/apply", Route::Apply),
];

/// Suffix of the status topic a stored parameter is echoed back on.
fn status_suffix(key: ParamKey) -> &'static str {
    match key {
        ParamKey::PidKp => "pid/kp/status",
        ParamKey::PidKi => "pid/ki/status",
        ParamKey::PidKd => "pid/kd/status",
        ParamKey::PidReference => "pid/ref/status",
        ParamKey::StepAmplitude => "step/amplitude/status",
        ParamKey::StepDuration => "step/time/status",
        ParamKey::StepDirection => "step/direction/status",
        ParamKey::StepVbatt => "step/vbatt/status",
        ParamKey::DeadbandDirection => "deadband/direction/status",
        ParamKey::DeadbandThreshold => "deadband/threshold/status",
    }
}

/// Binds a topic prefix to the controller's command channel.
pub struct ParameterChannel {
    prefix: String,
    sender: CommandSender,
}

impl ParameterChannel {
    pub fn new(prefix: impl Into<String>, sender: CommandSender) -> Self {
        Self {
            prefix: prefix.into(),
            sender,
        }
    }

    /// Full topic list the transport must subscribe to.
    pub fn subscriptions(&self) -> Vec<String> {
        ROUTES
            .iter()
            .map(|(suffix, _)| format!("{}/{suffix}", self.prefix))
            .collect()
    }

    /// Route one inbound message. Unknown topics and unparseable payloads
    /// are logged and dropped; they never reach the controller.
    pub fn on_message(&self, topic: &str, payload: &str) {
        let Some(suffix) = topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|s| s.strip_prefix('/'))
        else {
            tracing::debug!(topic, "message outside our prefix ignored");
            return;
        };
        let Some(route) = ROUTES
            .iter()
            .find(|(s, _)| *s == suffix)
            .map(|(_, r)| *r)
        else {
            tracing::debug!(topic, "unknown topic ignored");
            return;
        };

        let cmd = match route {
            Route::Set(key) => match payload.trim().parse::<f32>() {
                Ok(value) => Command::SetParam { key, value },
                Err(_) => {
                    tracing::warn!(topic, payload, "unparseable parameter payload dropped");
                    return;
                }
            },
            Route::Sync(mode) => match parse_bool(payload) {
                Some(start) => Command::Mode { mode, start },
                None => {
                    tracing::warn!(topic, payload, "unparseable sync payload dropped");
                    return;
                }
            },
            Route::Request(mode) => Command::RequestParams { mode },
            Route::Apply => Command::ApplyDeadband,
        };
        if self.sender.send(cmd).is_err() {
            tracing::error!(topic, "controller command channel closed");
        }
    }

    /// Map one notice to the publishes it produces.
    pub fn outbound(&self, notice: &Notice) -> Vec<(String, String)> {
        let t = |suffix: &str| format!("{}/{suffix}", self.prefix);
        match notice {
            Notice::Confirm { key, value } => {
                vec![(t(status_suffix(*key)), format_value(*value))]
            }
            Notice::ParamDump { mode: _, params } => params
                .iter()
                .map(|(key, value)| (t(status_suffix(*key)), format_value(*value)))
                .collect(),
            Notice::Result(Outcome::StepComplete) => vec![(t("step/result"), "done".into())],
            Notice::Result(Outcome::DeadbandFound { pwm }) => {
                vec![(t("deadband/result"), pwm.to_string())]
            }
            Notice::Result(Outcome::DeadbandTimedOut { fallback_pwm }) => vec![
                (t("deadband/error"), "timeout".into()),
                (t("deadband/result"), fallback_pwm.to_string()),
            ],
            Notice::DeadbandApplied { pwm } => {
                vec![(t("deadband/applied"), pwm.to_string())]
            }
            Notice::DeadbandError { message } => {
                vec![(t("deadband/error"), message.clone())]
            }
        }
    }
}

/// Case-insensitive: desktop dashboards publish Python-style `True`/`False`.
fn parse_bool(payload: &str) -> Option<bool> {
    match payload.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn format_value(v: f32) -> String {
    // Integral values publish without a fractional part.
    if v.fract() == 0.0 && v.abs() < 1e7 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriptions_cover_all_routes_under_prefix() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let ch = ParameterChannel::new("trains/t1", tx);
        let subs = ch.subscriptions();
        assert_eq!(subs.len(), ROUTES.len());
        assert!(subs.iter().all(|s| s.starts_with("trains/t1/")));
        assert!(subs.contains(&"trains/t1/deadband/apply".to_string()));
    }

    #[test]
    fn format_value_drops_trailing_zero_fraction() {
        assert_eq!(format_value(2.0), "2");
        assert_eq!(format_value(2.5), "2.5");
        assert_eq!(format_value(-1.0), "-1");
    }
}
