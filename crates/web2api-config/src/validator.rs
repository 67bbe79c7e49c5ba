//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{Config, SEND_BUTTON_TARGET, SiteConfig, StepAction};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_pool(config, &mut result);
        Self::validate_stream(config, &mut result);
        Self::validate_input(config, &mut result);

        let mut domains: Vec<&String> = config.sites.keys().collect();
        domains.sort();
        for domain in domains {
            Self::validate_site(domain, &config.sites[domain], &mut result);
        }

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }

        if let Some(ref site) = config.server.default_site {
            if !config.sites.contains_key(site) {
                result.add_error(ValidationError::new(
                    "server.default_site",
                    format!("Default site '{}' is not configured", site),
                ));
            }
        }
    }

    fn validate_pool(config: &Config, result: &mut ValidationResult) {
        if config.pool.max_instances == 0 {
            result.add_error(ValidationError::new(
                "pool.max_instances",
                "max_instances must be greater than 0",
            ));
        }

        if config.pool.min_instances > config.pool.max_instances {
            result.add_error(ValidationError::new(
                "pool.min_instances",
                "min_instances cannot exceed max_instances",
            ));
        }

        if config.tabs.max_tabs == 0 {
            result.add_error(ValidationError::new(
                "tabs.max_tabs",
                "max_tabs must be greater than 0",
            ));
        }

        if config.tabs.min_tabs > config.tabs.max_tabs {
            result.add_error(ValidationError::new(
                "tabs.min_tabs",
                "min_tabs cannot exceed max_tabs",
            ));
        }
    }

    fn validate_stream(config: &Config, result: &mut ValidationResult) {
        let stream = &config.stream;

        for (path, value) in [
            ("stream.poll_interval_secs", stream.poll_interval_secs),
            ("stream.confirm_poll_secs", stream.confirm_poll_secs),
        ] {
            if !(value.is_finite() && value > 0.0) {
                result.add_error(ValidationError::new(path, "poll interval must be positive"));
            }
        }

        if stream.poll_interval_secs > 0.0 && !(0.1..=1.0).contains(&stream.poll_interval_secs) {
            result.add_warning(ValidationWarning::new(
                "stream.poll_interval_secs",
                "poll interval outside 0.1-1.0s, detection may be sluggish or noisy",
            ));
        }

        if stream.stability_threshold == 0 {
            result.add_error(ValidationError::new(
                "stream.stability_threshold",
                "stability_threshold must be greater than 0",
            ));
        }

        if stream.confirm_stable_polls == 0 {
            result.add_error(ValidationError::new(
                "stream.confirm_stable_polls",
                "confirm_stable_polls must be greater than 0",
            ));
        }

        if stream.silence_threshold_secs <= 0.0 {
            result.add_error(ValidationError::new(
                "stream.silence_threshold_secs",
                "silence_threshold_secs must be positive",
            ));
        }

        if stream.hard_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "stream.hard_timeout_secs",
                "hard_timeout_secs must be greater than 0",
            ));
        }

        for (path, value) in [
            ("stealth.min_delay_secs", config.stealth.min_delay_secs),
            ("stealth.max_delay_secs", config.stealth.max_delay_secs),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                result.add_error(ValidationError::new(path, "delay must be a non-negative number"));
            }
        }

        if config.stealth.min_delay_secs > config.stealth.max_delay_secs {
            result.add_error(ValidationError::new(
                "stealth.min_delay_secs",
                "min_delay_secs cannot exceed max_delay_secs",
            ));
        }
    }

    fn validate_input(config: &Config, result: &mut ValidationResult) {
        if config.input.chunk_size == 0 {
            result.add_error(ValidationError::new(
                "input.chunk_size",
                "chunk_size must be greater than 0",
            ));
        }

        if config.input.verify_attempts == 0 {
            result.add_error(ValidationError::new(
                "input.verify_attempts",
                "verify_attempts must be greater than 0",
            ));
        }
    }

    fn validate_site(domain: &str, site: &SiteConfig, result: &mut ValidationResult) {
        let base = format!("sites.{}", domain);

        match url::Url::parse(&site.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => result.add_error(ValidationError::new(
                format!("{}.url", base),
                format!("'{}' is not an http(s) URL", site.url),
            )),
        }

        if site.workflow.is_empty() {
            result.add_error(ValidationError::new(
                format!("{}.workflow", base),
                "Workflow cannot be empty",
            ));
            return;
        }

        if site.reply_target().is_none() {
            result.add_warning(ValidationWarning::new(
                format!("{}.workflow", base),
                "No STREAM_WAIT step, replies will be empty",
            ));
        }

        for (index, step) in site.workflow.iter().enumerate() {
            let path = format!("{}.workflow[{}]", base, index);

            if step.action == StepAction::Wait
                && step.value.as_ref().and_then(|v| v.as_seconds()).is_none()
            {
                result.add_error(ValidationError::new(
                    path.clone(),
                    "WAIT needs a non-negative number of seconds",
                ));
            }

            if step.action == StepAction::KeyPress && step.value.is_none() {
                result.add_error(ValidationError::new(path.clone(), "KEY_PRESS needs a key"));
            }

            if !step.action.needs_target() {
                continue;
            }

            match step.target.as_deref() {
                None => result.add_error(ValidationError::new(
                    path,
                    format!("{} needs a target", step.action),
                )),
                Some(target) if site.selectors_for(target).is_empty() => {
                    let falls_back =
                        step.action == StepAction::Click && target == SEND_BUTTON_TARGET;
                    if step.optional || falls_back {
                        result.add_warning(ValidationWarning::new(
                            path,
                            format!("No selector for optional target '{}'", target),
                        ));
                    } else {
                        result.add_error(ValidationError::new(
                            path,
                            format!("No selector for target '{}'", target),
                        ));
                    }
                }
                Some(_) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
