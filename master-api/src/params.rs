//! Parameters for the streaming pod endpoints
use chrono::{DateTime, SecondsFormat, Utc};
use form_urlencoded::Serializer;

/// Params for following a pod log
#[derive(Clone, Debug)]
pub struct LogParams {
    /// The container for which to stream logs. Defaults to the only container if there is one container in the pod.
    pub container: Option<String>,
    /// Only return logs newer than this time.
    pub since_time: Option<DateTime<Utc>>,
    /// The number of lines from the end of the logs to show. Defaults to `10000`.
    pub tail_lines: i64,
    /// Add an RFC3339 timestamp at the beginning of every line. Defaults to `true`.
    pub timestamps: bool,
}

impl Default for LogParams {
    fn default() -> Self {
        Self {
            container: None,
            since_time: None,
            tail_lines: 10000,
            timestamps: true,
        }
    }
}

impl LogParams {
    /// Stream logs of a specific container
    #[must_use]
    pub fn container<S: Into<String>>(mut self, container: S) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Only stream logs newer than `since`
    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since_time = Some(since);
        self
    }

    pub(crate) fn populate_qp(&self, qp: &mut Serializer<String>) {
        qp.append_pair("follow", "true");
        qp.append_pair("tailLines", &self.tail_lines.to_string());
        if self.timestamps {
            qp.append_pair("timestamps", "true");
        }
        if let Some(container) = &self.container {
            qp.append_pair("container", container);
        }
        if let Some(since) = &self.since_time {
            qp.append_pair("sinceTime", &since.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }
}

/// Params for running a command in a pod.
///
/// Every stream is attached and a TTY allocated unless switched off.
#[derive(Clone, Debug)]
pub struct ExecParams {
    /// The container to run the command in. Defaults to the only container if there is one container in the pod.
    pub container: Option<String>,
    /// The command and its arguments.
    pub command: Vec<String>,
    /// Attach stdin. Defaults to `true`.
    pub stdin: bool,
    /// Attach stdout. Defaults to `true`.
    pub stdout: bool,
    /// Attach stderr. Defaults to `true`.
    pub stderr: bool,
    /// Allocate a TTY. Defaults to `true`.
    pub tty: bool,
}

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            container: None,
            command: vec![],
            stdin: true,
            stdout: true,
            stderr: true,
            tty: true,
        }
    }
}

impl ExecParams {
    /// Run `command` with its arguments
    pub fn command<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Run in a specific container
    #[must_use]
    pub fn container<S: Into<String>>(mut self, container: S) -> Self {
        self.container = Some(container.into());
        self
    }

    pub(crate) fn populate_qp(&self, qp: &mut Serializer<String>) {
        for (name, enabled) in [
            ("stdout", self.stdout),
            ("stdin", self.stdin),
            ("stderr", self.stderr),
            ("tty", self.tty),
        ] {
            if enabled {
                qp.append_pair(name, "1");
            }
        }
        if let Some(container) = &self.container {
            qp.append_pair("container", container);
        }
        for c in &self.command {
            qp.append_pair("command", c);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ExecParams, LogParams};
    use chrono::{TimeZone, Utc};

    fn query(populate: impl FnOnce(&mut form_urlencoded::Serializer<String>)) -> String {
        let mut qp = form_urlencoded::Serializer::new(String::new());
        populate(&mut qp);
        qp.finish()
    }

    #[test]
    fn log_params_defaults() {
        let lp = LogParams::default();
        assert_eq!(
            query(|qp| lp.populate_qp(qp)),
            "follow=true&tailLines=10000&timestamps=true"
        );
    }

    #[test]
    fn log_params_container_and_since() {
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let lp = LogParams::default().container("sidecar").since(since);
        assert_eq!(
            query(|qp| lp.populate_qp(qp)),
            "follow=true&tailLines=10000&timestamps=true&container=sidecar&sinceTime=2024-05-01T12%3A30%3A00Z"
        );
    }

    #[test]
    fn exec_params_repeat_command() {
        let ep = ExecParams::command(["sh", "-c", "echo hi"]).container("app");
        assert_eq!(
            query(|qp| ep.populate_qp(qp)),
            "stdout=1&stdin=1&stderr=1&tty=1&container=app&command=sh&command=-c&command=echo+hi"
        );

        let ep = ExecParams {
            tty: false,
            stdin: false,
            ..ExecParams::command(["ls"])
        };
        assert_eq!(query(|qp| ep.populate_qp(qp)), "stdout=1&stderr=1&command=ls");
    }
}
