use std::fmt;

/// Topic strings derived once from the configured prefix
///
/// Frozen for the process lifetime; every publish and subscribe goes through
/// these so the tree stays consistent:
///
/// ```text
/// <prefix>/cmnd/<name>   inbound commands
/// <prefix>/stat/<name>   outbound status
/// <prefix>/err           outbound command errors
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    err: String,
    stat: String,
    cmnd: String,
}

impl Topics {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            err: format!("{}/err", prefix),
            stat: format!("{}/stat", prefix),
            cmnd: format!("{}/cmnd", prefix),
        }
    }

    pub fn err(&self) -> &str {
        &self.err
    }

    pub fn stat(&self) -> &str {
        &self.stat
    }

    pub fn cmnd(&self) -> &str {
        &self.cmnd
    }

    pub fn stat_topic(&self, name: &str) -> String {
        format!("{}/{}", self.stat, name)
    }

    pub fn cmnd_topic(&self, name: &str) -> String {
        format!("{}/{}", self.cmnd, name)
    }

    pub fn availability(&self) -> String {
        self.stat_topic("availability")
    }

    /// Single-level wildcard covering every command topic
    pub fn command_filter(&self) -> String {
        self.cmnd_topic("+")
    }

    /// Strips `<cmnd>/` from a topic. Whatever remains is the command name,
    /// including any further `/` segments.
    pub fn command_name<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.cmnd.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

impl fmt::Display for Topics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "err={} stat={} cmnd={}", self.err, self.stat, self.cmnd)
    }
}
