//! Extraction through an external program.
//!
//! The program is invoked once per batch with placeholders substituted in
//! its arguments:
//!
//! | placeholder | value                                              |
//! |-------------|----------------------------------------------------|
//! | `{input}`   | path of the sub-document PDF                       |
//! | `{output}`  | path where the program must leave its results      |
//! | `{kinds}`   | requested kinds, comma separated (`text,table`)    |
//! | `{start}`   | first page of the batch in the original document   |
//! | `{end}`     | last page of the batch in the original document    |
//!
//! Results may be a ZIP archive written to `{output}` or a directory created
//! at `{output}`; either way the content is read as a bundle (see
//! [`super::bundle`]).

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::bundle::batch_result_from_bundle;
use super::{ExtractionService, ServiceError};
use crate::archive::{is_zip, sanitize_name, unpack_zip_file, Bundle};
use crate::error::{Error, Result};
use crate::model::{BatchResult, KindSet, PageRange, SubDocument};

/// Exit code (`EX_TEMPFAIL`) an extractor uses to report an exhausted quota.
pub const TEMPFAIL_EXIT_CODE: i32 = 75;

const STDERR_TAIL: usize = 2000;

/// How often a running extractor is checked for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Program and argument template for [`CommandService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    /// Create a template from a program and its argument templates.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a command line such as `extract-pdf --in {input} --out "{output}"`.
    ///
    /// Words are split on whitespace; single and double quotes group words
    /// and a backslash escapes the next character outside single quotes.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut words = split_words(command_line)?.into_iter();
        let program = words
            .next()
            .ok_or_else(|| Error::InvalidConfig("extractor command is empty".to_string()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    /// Program to run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Argument templates.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Substitute placeholders for one batch.
    pub fn render(&self, input: &Path, output: &Path, kinds: &KindSet, range: PageRange) -> Vec<String> {
        let kinds = kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let start = range.start().to_string();
        let end = range.end().to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{kinds}", &kinds)
                    .replace("{start}", &start)
                    .replace("{end}", &end)
            })
            .collect()
    }
}

fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('\''), c) => current.push(c),
            (Some('"'), '"') => quote = None,
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    in_word = true;
                }
            }
            (Some(_), c) => current.push(c),
            (None, '\'') | (None, '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(Error::InvalidConfig(format!(
            "unterminated quote in extractor command: {}",
            line
        )));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// [`ExtractionService`] backed by an external extractor program.
///
/// Each call works in its own temporary directory, removed afterwards.
/// The program inherits this process's environment, which is where vendor
/// credentials are expected to come from.
///
/// Under a time limit the program is killed when the limit passes. On Unix
/// it runs in its own process group and the whole group is killed, so
/// helpers it started go down with it.
#[derive(Debug, Clone)]
pub struct CommandService {
    template: CommandTemplate,
    name: String,
    envs: Vec<(String, String)>,
}

impl CommandService {
    /// Create a service from a template.
    pub fn new(template: CommandTemplate) -> Self {
        let name = Path::new(template.program())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| template.program().to_string());
        Self {
            template,
            name,
            envs: Vec::new(),
        }
    }

    /// Parse a command line into a service (see [`CommandTemplate::parse`]).
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        Ok(Self::new(CommandTemplate::parse(command_line)?))
    }

    /// Set an extra environment variable for the program.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The command template.
    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }

    fn run(
        &self,
        document: &SubDocument,
        kinds: &KindSet,
        deadline: Option<Instant>,
    ) -> std::result::Result<Bundle, ServiceError> {
        let range = document.range();
        let workdir = tempfile::Builder::new()
            .prefix("pdfbatch-")
            .tempdir()
            .map_err(|e| ServiceError::other(format!("cannot create work directory: {}", e)))?;
        let input = workdir
            .path()
            .join(format!("pages_{}-{}.pdf", range.start(), range.end()));
        let output = workdir.path().join("result");
        let stderr_path = workdir.path().join("stderr.log");

        document
            .write_to(&input)
            .map_err(|e| ServiceError::other(format!("cannot write sub-document: {}", e)))?;
        let stderr = fs::File::create(&stderr_path)
            .map_err(|e| ServiceError::other(format!("cannot create log file: {}", e)))?;

        let args = self.template.render(&input, &output, kinds, range);
        log::debug!("{}: running {} {:?}", range, self.template.program(), args);

        let mut command = Command::new(self.template.program());
        command
            .args(&args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ServiceError::other(format!(
                "extractor program not found: {}",
                self.template.program()
            )),
            _ => ServiceError::other(format!("cannot run extractor: {}", e)),
        })?;

        let status = wait_until(&mut child, deadline)
            .map_err(|e| ServiceError::other(format!("cannot wait for extractor: {}", e)))?;
        let Some(status) = status else {
            log::warn!("{}: {} killed at its time limit", range, self.name);
            return Err(ServiceError::timeout(format!(
                "{} was killed at its time limit",
                self.name
            )));
        };

        if !status.success() {
            let stderr = fs::read(&stderr_path).unwrap_or_default();
            let stderr = String::from_utf8_lossy(&stderr);
            let stderr = tail(stderr.trim(), STDERR_TAIL);
            let reason = match status.code() {
                Some(code) => format!("extractor exited with code {}: {}", code, stderr),
                None => format!("extractor was terminated by a signal: {}", stderr),
            };
            return Err(match status.code() {
                Some(TEMPFAIL_EXIT_CODE) => ServiceError::quota(reason),
                _ => ServiceError::other(reason),
            });
        }

        read_output(&output)
    }
}

/// Wait for `child` to exit, killing it once `deadline` passes.
///
/// Returns `None` when the child was killed.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            terminate(child);
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    match i32::try_from(child.id()) {
        // A negative pid addresses the child's process group.
        Ok(pid) => unsafe {
            libc::kill(-pid, libc::SIGKILL);
        },
        Err(_) => {
            let _ = child.kill();
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
}

impl ExtractionService for CommandService {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(
        &self,
        document: &SubDocument,
        kinds: &KindSet,
    ) -> std::result::Result<BatchResult, ServiceError> {
        let bundle = self.run(document, kinds, None)?;
        batch_result_from_bundle(bundle, kinds)
    }

    fn extract_within(
        &self,
        document: &SubDocument,
        kinds: &KindSet,
        timeout: Duration,
    ) -> std::result::Result<BatchResult, ServiceError> {
        let bundle = self.run(document, kinds, Instant::now().checked_add(timeout))?;
        batch_result_from_bundle(bundle, kinds)
    }
}

fn read_output(output: &Path) -> std::result::Result<Bundle, ServiceError> {
    let metadata = fs::metadata(output).map_err(|_| {
        ServiceError::other(format!(
            "extractor left no result at {}",
            output.display()
        ))
    })?;

    if metadata.is_dir() {
        read_dir_bundle(output)
            .map_err(|e| ServiceError::other(format!("cannot read extractor output: {}", e)))
    } else {
        let mut magic = [0u8; 4];
        let looks_like_zip = fs::File::open(output)
            .and_then(|mut f| f.read_exact(&mut magic))
            .map(|_| is_zip(&magic))
            .unwrap_or(false);
        if !looks_like_zip {
            return Err(ServiceError::malformed(format!(
                "extractor output {} is not a ZIP archive",
                output.display()
            )));
        }
        unpack_zip_file(output).map_err(|e| ServiceError::malformed(e.to_string()))
    }
}

/// Read every file under `root` into a bundle keyed by relative path.
fn read_dir_bundle(root: &Path) -> io::Result<Bundle> {
    let mut bundle = Bundle::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path);
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(&path);
            if let Some(name) = sanitize_name(&relative.to_string_lossy()) {
                bundle.insert(name, fs::read(&path)?);
            }
        }
    }

    Ok(bundle)
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
