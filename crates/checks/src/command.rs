//! Checks implemented by external commands.
//!
//! A command receives a JSON request on stdin:
//!
//! ```json
//! { "check": "cog", "input": "/data/tile.tif", "specification": true, "options": {} }
//! ```
//!
//! and prints its result on stdout, either as `[passed, message]`,
//! `{"passed": .., "message": ..}` or the structured result fields.

use geoqc_core::{CheckResult, ExternalCheckSpec, Specification};
use serde_json::{json, Value};
use std::future::Future;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::check::{CheckContext, CheckError, CheckInput, InputKind, QcCheck};

/// Time an external check may run when its definition sets none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A check backed by an external program.
pub struct CommandCheck {
    id: String,
    description: String,
    spec: ExternalCheckSpec,
    input_kind: InputKind,
    timeout: Duration,
}

impl CommandCheck {
    /// Create a command check.
    ///
    /// Unknown `input` names fall back to the file path.
    pub fn new(id: impl Into<String>, spec: ExternalCheckSpec) -> Self {
        let id = id.into();
        let input_kind = InputKind::parse(&spec.input).unwrap_or_else(|| {
            tracing::warn!(check = %id, input = %spec.input, "Unknown input kind, passing the file path");
            InputKind::File
        });
        Self {
            description: format!("External check `{}`", spec.command),
            timeout: spec.timeout.map(Duration::from_secs).unwrap_or(DEFAULT_TIMEOUT),
            id,
            spec,
            input_kind,
        }
    }

    fn arguments(&self, input: &CheckInput<'_>, specification: &Specification, ctx: &CheckContext<'_>) -> Vec<String> {
        let input_text = match input {
            CheckInput::File(path) => path.display().to_string(),
            _ => String::new(),
        };
        self.spec
            .args
            .iter()
            .map(|arg| substitute(arg, &input_text, specification, ctx))
            .collect()
    }

    /// Run the command, feeding the request while its output is drained.
    /// `None` when it overran the timeout.
    async fn execute(&self, args: Vec<String>, request: Vec<u8>) -> Result<Option<Output>, CheckError> {
        let mut child = Command::new(&self.spec.command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A command that ignores stdin may exit before reading it.
                if let Err(e) = stdin.write_all(&request).await {
                    tracing::debug!(check = %self.id, error = %e, "Request not consumed by external check");
                }
            }
        };
        let run = async {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(output) => Ok(Some(output?)),
            Err(_) => Ok(None),
        }
    }

    fn request(&self, input: &CheckInput<'_>, specification: &Specification, ctx: &CheckContext<'_>) -> Result<Value, CheckError> {
        let input = match input {
            CheckInput::File(path) => Value::String(path.display().to_string()),
            CheckInput::RasterProfile(profile) => serialize(profile)?,
            CheckInput::VectorLayer(layer) => serialize(layer)?,
            CheckInput::RasterHandle(_) => {
                return Err(CheckError::Command(format!(
                    "{}: an open raster cannot be passed to an external command",
                    self.id
                )))
            }
        };
        Ok(json!({
            "check": self.id,
            "input": input,
            "specification": specification.value(),
            "options": ctx.options.to_json(),
        }))
    }
}

impl QcCheck for CommandCheck {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_kind(&self) -> InputKind {
        self.input_kind
    }

    fn run(
        &self,
        ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        if input.kind() != self.input_kind {
            return Err(CheckError::mismatch(self.input_kind, input.kind()));
        }

        let request = self.request(input, specification, ctx)?;
        let args = self.arguments(input, specification, ctx);
        tracing::debug!(check = %self.id, command = %self.spec.command, ?args, "Running external check");

        let Some(output) = block_on(self.execute(args, request.to_string().into_bytes()))?? else {
            tracing::warn!(
                check = %self.id,
                command = %self.spec.command,
                timeout_secs = self.timeout.as_secs(),
                "External check timed out and was killed"
            );
            return Ok(CheckResult::not_completed());
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CheckError::Command(format!(
                "{} exited with {}: {}",
                self.spec.command,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = serde_json::from_str::<Value>(stdout.trim())
            .ok()
            .and_then(|value| CheckResult::from_value(&value));

        match parsed {
            Some(result) => Ok(result),
            None => {
                tracing::warn!(check = %self.id, output = %stdout.trim(), "External check returned a malformed result");
                Ok(CheckResult::not_completed())
            }
        }
    }
}

/// Drive a future to completion from synchronous check code.
///
/// Inside a runtime this must run on a blocking thread (the engine runs check
/// sequences through `spawn_blocking`); outside one a private runtime is used.
fn block_on<F: Future>(future: F) -> Result<F::Output, CheckError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            Ok(runtime.block_on(future))
        }
    }
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<Value, CheckError> {
    serde_json::to_value(value).map_err(|e| CheckError::Command(e.to_string()))
}

fn substitute(arg: &str, input: &str, specification: &Specification, ctx: &CheckContext<'_>) -> String {
    let mut out = arg.replace("{input}", input).replace("{spec}", &specification.display());
    for (key, value) in ctx.options.iter() {
        let placeholder = format!("{{option:{}}}", key);
        if out.contains(&placeholder) {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out = out.replace(&placeholder, &text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::check::CheckOptions;
    use std::path::Path;

    fn spec(command: &str, args: &[&str]) -> ExternalCheckSpec {
        ExternalCheckSpec {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            input: "file".to_string(),
            timeout: None,
        }
    }

    fn run(check: &CommandCheck, options: CheckOptions) -> Result<CheckResult, CheckError> {
        let backend = MemoryBackend::new();
        let ctx = CheckContext { backend: &backend, options: &options };
        check.run(&ctx, &CheckInput::File(Path::new("/data/a.tif")), &Specification::from(true))
    }

    #[test]
    fn test_substitution() {
        let options = CheckOptions::new().with("band", 1).with("mode", "strict");
        let backend = MemoryBackend::new();
        let ctx = CheckContext { backend: &backend, options: &options };
        let spec = Specification::from("lzw");
        assert_eq!(
            substitute("{input}:{spec}:{option:band}:{option:mode}", "/a.tif", &spec, &ctx),
            "/a.tif:lzw:1:strict"
        );
    }

    #[test]
    fn test_unknown_input_kind() {
        let mut external = spec("true", &[]);
        external.input = "reader".to_string();
        assert_eq!(CommandCheck::new("x", external).input_kind(), InputKind::File);
    }

    #[cfg(unix)]
    #[test]
    fn test_pair_output() {
        let check = CommandCheck::new(
            "cog",
            spec(
                "sh",
                &["-c", "printf '%s' '[true, \"Passed.\\nSpecifications: x\\nTested file: {input}\"]'"],
            ),
        );
        let result = run(&check, CheckOptions::new()).unwrap();
        assert!(result.is_passed());
        assert_eq!(result.tested, "/data/a.tif");
    }

    #[cfg(unix)]
    #[test]
    fn test_malformed_output_is_not_completed() {
        let check = CommandCheck::new("cog", spec("sh", &["-c", "echo oops"]));
        let result = run(&check, CheckOptions::new()).unwrap();
        assert_eq!(result, CheckResult::not_completed());
    }

    #[cfg(unix)]
    #[test]
    fn test_large_request_with_chatty_command() {
        let mut external = spec(
            "sh",
            &["-c", "head -c 200000 /dev/zero | tr '\\0' ' '; cat >/dev/null; printf '%s' '[true, \"done\"]'"],
        );
        external.input = "vector".to_string();
        let check = CommandCheck::new("aggregation_vector", external);

        let feature = geoqc_core::Feature { area: 1.0, valid: true, ..Default::default() };
        let layer = geoqc_core::VectorLayer {
            driver: "GPKG".to_string(),
            features: vec![feature; 5000],
            ..Default::default()
        };
        let backend = MemoryBackend::new();
        let options = CheckOptions::new();
        let ctx = CheckContext { backend: &backend, options: &options };

        let result = check.run(&ctx, &CheckInput::VectorLayer(&layer), &Specification::from(true)).unwrap();
        assert!(result.is_passed());
        assert_eq!(result.info, vec!["done"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_command_is_killed() {
        let mut external = spec("sh", &["-c", "sleep 30"]);
        external.timeout = Some(1);
        let check = CommandCheck::new("cog", external);

        let started = std::time::Instant::now();
        let result = run(&check, CheckOptions::new()).unwrap();
        assert_eq!(result, CheckResult::not_completed());
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_runs_on_blocking_thread_of_runtime() {
        let check = CommandCheck::new("cog", spec("sh", &["-c", "printf '%s' '[false, \"nope\"]'"]));
        let result = tokio::task::spawn_blocking(move || run(&check, CheckOptions::new()))
            .await
            .unwrap()
            .unwrap();
        assert!(!result.is_passed());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_is_error() {
        let check = CommandCheck::new("cog", spec("sh", &["-c", "exit 3"]));
        assert!(matches!(run(&check, CheckOptions::new()), Err(CheckError::Command(_))));
    }
}
