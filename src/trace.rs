use std::sync::OnceLock;

static TRACE_CONFIG: OnceLock<TraceConfig> = OnceLock::new();

/// Which interpreter phases emit `[TRACE:...]` lines, read once from `PHPVIS_TRACE`.
struct TraceConfig {
    all: bool,
    phases: Vec<String>,
}

impl TraceConfig {
    fn from_env_value(val: &str) -> Self {
        match val.trim() {
            "" | "0" => TraceConfig {
                all: false,
                phases: vec![],
            },
            "1" | "all" => TraceConfig {
                all: true,
                phases: vec![],
            },
            list => TraceConfig {
                all: false,
                phases: list
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        }
    }

    fn allows(&self, phase: &str) -> bool {
        self.all || self.phases.iter().any(|p| p == phase)
    }
}

fn config() -> &'static TraceConfig {
    TRACE_CONFIG.get_or_init(|| {
        let val = std::env::var("PHPVIS_TRACE").unwrap_or_default();
        TraceConfig::from_env_value(&val)
    })
}

pub fn is_enabled(phase: &str) -> bool {
    config().allows(phase)
}

macro_rules! trace_log {
    ($phase:expr, $($arg:tt)*) => {
        if $crate::trace::is_enabled($phase) {
            eprintln!("[TRACE:{}] {}", $phase, format!($($arg)*));
        }
    };
}
pub(crate) use trace_log;

#[cfg(test)]
mod tests {
    use super::TraceConfig;

    #[test]
    fn empty_and_zero_disable_tracing() {
        assert!(!TraceConfig::from_env_value("").allows("parse"));
        assert!(!TraceConfig::from_env_value("0").allows("parse"));
    }

    #[test]
    fn one_enables_every_phase() {
        let config = TraceConfig::from_env_value("1");
        assert!(config.allows("parse"));
        assert!(config.allows("access"));
    }

    #[test]
    fn phase_list_is_comma_separated() {
        let config = TraceConfig::from_env_value("access, call");
        assert!(config.allows("access"));
        assert!(config.allows("call"));
        assert!(!config.allows("lex"));
    }
}
