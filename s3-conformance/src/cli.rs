/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Third-party command line tools driven against the same buckets as the SDK.
//!
//! Commands are rendered from whitespace separated templates whose `{placeholder}` tokens are
//! filled from the profile and the [`CliArgs`]. A tool that is not installed yields
//! [`ErrorKind::ToolUnavailable`](crate::error::ErrorKind::ToolUnavailable), which callers treat
//! as a skip.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::config::Profile;
use crate::error::{self, Error, ErrorKind};

const DEFAULT_MGC_PROGRAM: &str = "mgc";

/// A supported command line tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// The AWS CLI (`aws`)
    AwsCli,
    /// `rclone`, with a remote named after the profile
    Rclone,
    /// The Magalu Cloud CLI, taken from the profile's `mgc_path` or `mgc` on `PATH`
    Mgc,
}

impl Tool {
    /// Every supported tool
    pub const ALL: [Tool; 3] = [Tool::AwsCli, Tool::Rclone, Tool::Mgc];

    fn program<'a>(&self, profile: &'a Profile) -> &'a str {
        match self {
            Tool::AwsCli => "aws",
            Tool::Rclone => "rclone",
            Tool::Mgc => profile.mgc_path().unwrap_or(DEFAULT_MGC_PROGRAM),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tool::AwsCli => "aws",
            Tool::Rclone => "rclone",
            Tool::Mgc => "mgc",
        })
    }
}

/// What to ask a tool to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CliAction {
    /// List the buckets of the profile
    ListBuckets,
    /// Delete `{bucket}/{key}`
    DeleteObject,
    /// Delete `{bucket}`, which is expected to fail while it holds versions
    DeleteBucket,
    /// Set a default object lock retention of `{days}` on `{bucket}`
    SetBucketLock,
    /// Read the default object lock retention of `{bucket}`
    GetBucketLock,
}

/// Values substituted into command templates.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    bucket: Option<String>,
    key: Option<String>,
    days: Option<u32>,
}

impl CliArgs {
    /// Target bucket
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Target key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Retention in days
    pub fn days(mut self, days: u32) -> Self {
        self.days = Some(days);
        self
    }
}

/// The command template for `action` with `tool`, `None` when the tool has no such command.
pub fn template(tool: Tool, action: CliAction) -> Option<&'static str> {
    let template = match (tool, action) {
        (Tool::AwsCli, CliAction::ListBuckets) => "{program} s3 ls --profile {profile}",
        (Tool::AwsCli, CliAction::DeleteObject) => {
            "{program} --profile {profile} s3 rm s3://{bucket}/{key}"
        }
        (Tool::AwsCli, CliAction::DeleteBucket) => {
            "{program} --profile {profile} s3 rb s3://{bucket}"
        }
        (Tool::Rclone, CliAction::ListBuckets) => "{program} lsd {profile}:",
        (Tool::Rclone, CliAction::DeleteObject) => "{program} delete {profile}:{bucket}/{key}",
        (Tool::Rclone, CliAction::DeleteBucket) => "{program} rmdir {profile}:{bucket}",
        (Tool::Mgc, CliAction::ListBuckets) => "{program} object-storage buckets list",
        (Tool::Mgc, CliAction::DeleteObject) => {
            "{program} object-storage objects delete {bucket}/{key} --no-confirm"
        }
        (Tool::Mgc, CliAction::DeleteBucket) => {
            "{program} object-storage buckets delete {bucket} --no-confirm --recursive --raw"
        }
        (Tool::Mgc, CliAction::SetBucketLock) => {
            "{program} object-storage buckets object-lock set {bucket} --days {days}"
        }
        (Tool::Mgc, CliAction::GetBucketLock) => {
            "{program} object-storage buckets object-lock get {bucket}"
        }
        _ => return None,
    };
    Some(template)
}

/// Split `template` on whitespace and substitute every `{name}` from `vars`.
///
/// A placeholder without a value is [`ErrorKind::InputInvalid`].
pub fn render(template: &str, vars: &HashMap<&str, String>) -> Result<Vec<String>, Error> {
    template
        .split_whitespace()
        .map(|token| render_token(token, vars))
        .collect()
}

fn render_token(token: &str, vars: &HashMap<&str, String>) -> Result<String, Error> {
    let mut rendered = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        let value = vars
            .get(name)
            .ok_or_else(|| error::invalid_input(format!("no value for placeholder {{{name}}}")))?;
        rendered.push_str(&rest[..start]);
        rendered.push_str(value);
        rest = &rest[start + len + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn vars(tool: Tool, profile: &Profile, args: &CliArgs) -> HashMap<&'static str, String> {
    let mut vars = HashMap::new();
    vars.insert("program", tool.program(profile).to_owned());
    vars.insert("profile", profile.name().to_owned());
    if let Some(bucket) = &args.bucket {
        vars.insert("bucket", bucket.clone());
    }
    if let Some(key) = &args.key {
        vars.insert("key", key.clone());
    }
    if let Some(days) = args.days {
        vars.insert("days", days.to_string());
    }
    vars
}

/// Resolve `program` to an executable path. Paths are checked as given, bare names are looked
/// up on `PATH`.
pub fn find_program(program: &str) -> Result<PathBuf, Error> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(error::tool_unavailable(program))
        };
    }

    let path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
        .ok_or_else(|| error::tool_unavailable(program))
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOutput {
    command: String,
    status: Option<i32>,
    stdout: String,
    stderr: String,
}

impl CliOutput {
    /// The rendered command line
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Exit code, `None` when the process was killed by a signal
    pub fn status(&self) -> Option<i32> {
        self.status
    }

    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Captured standard output
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Captured standard error
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// `Ok` on a zero exit code, otherwise [`ErrorKind::ToolFailed`] carrying stderr.
    pub fn into_result(self) -> Result<CliOutput, Error> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::new(
                ErrorKind::ToolFailed,
                format!(
                    "`{}` exited with {:?}: {}",
                    self.command,
                    self.status,
                    self.stderr.trim()
                ),
            ))
        }
    }
}

async fn execute(program: &Path, args: &[String]) -> Result<CliOutput, Error> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await?;
    let command = std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(CliOutput {
        command,
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run `action` with `tool` as `profile` and capture its output.
///
/// A non-zero exit is returned as a [`CliOutput`], since several checks expect the tool to
/// fail. Use [`CliOutput::into_result`] to require success.
#[tracing::instrument(skip(profile, args), fields(profile = profile.name()))]
pub async fn run(
    tool: Tool,
    action: CliAction,
    profile: &Profile,
    args: &CliArgs,
) -> Result<CliOutput, Error> {
    let template = template(tool, action).ok_or_else(|| {
        error::invalid_input(format!("{tool} has no command for {action:?}"))
    })?;
    let mut argv = render(template, &vars(tool, profile, args))?.into_iter();
    let program = argv
        .next()
        .ok_or_else(|| error::invalid_input("empty command template"))?;
    let program = find_program(&program)?;
    let args: Vec<String> = argv.collect();

    let output = execute(&program, &args).await?;
    tracing::debug!(
        command = output.command(),
        status = ?output.status(),
        "ran command line tool"
    );
    tracing::trace!(stdout = output.stdout(), stderr = output.stderr());
    Ok(output)
}
