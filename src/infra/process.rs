//! External process execution
//!
//! All mutating OS commands (mount, mkfs, mkswap, tar, ...) go through the
//! [`Runner`] so a dry run can report them instead of executing them.

use anyhow::{bail, Context, Result};
use std::ffi::OsStr;
use std::process::{Command, Stdio};

/// Captured output of an external command
#[derive(Debug)]
pub struct CmdOutput {
    /// Whether the command exited with status zero
    pub success: bool,
    /// Captured stdout, lossily decoded
    pub stdout: String,
    /// Captured stderr, lossily decoded
    pub stderr: String,
}

impl CmdOutput {
    fn dry_run() -> Self {
        Self {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Runs external commands, honoring dry-run mode
#[derive(Debug, Clone)]
pub struct Runner {
    dry_run: bool,
}

impl Runner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run a command and capture its output
    pub fn run<S: AsRef<OsStr>>(&self, program: &str, args: &[S]) -> Result<CmdOutput> {
        if self.dry_run {
            println!("[dry-run] would run: {}", render(program, args));
            return Ok(CmdOutput::dry_run());
        }

        tracing::debug!("running: {}", render(program, args));
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute '{program}'"))?;

        Ok(CmdOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run a command, treating a non-zero exit as an error
    pub fn run_checked<S: AsRef<OsStr>>(&self, program: &str, args: &[S]) -> Result<CmdOutput> {
        let output = self.run(program, args)?;
        if !output.success {
            bail!(
                "'{}' failed: {}",
                render(program, args),
                first_line(&output.stderr)
            );
        }
        Ok(output)
    }

    /// Pipe one command's stdout into another's stdin and wait for both.
    ///
    /// Used for the attribute-preserving overlay copy (`tar -C src -cf - . |
    /// tar -C dst -xf -`).
    pub fn pipe<S: AsRef<OsStr>, T: AsRef<OsStr>>(
        &self,
        producer: (&str, &[S]),
        consumer: (&str, &[T]),
    ) -> Result<()> {
        if self.dry_run {
            println!(
                "[dry-run] would run: {} | {}",
                render(producer.0, producer.1),
                render(consumer.0, consumer.1)
            );
            return Ok(());
        }

        tracing::debug!(
            "running: {} | {}",
            render(producer.0, producer.1),
            render(consumer.0, consumer.1)
        );

        let mut src = Command::new(producer.0)
            .args(producer.1)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute '{}'", producer.0))?;

        let src_stdout = src
            .stdout
            .take()
            .context("Failed to capture producer stdout")?;

        let dst = Command::new(consumer.0)
            .args(consumer.1)
            .stdin(Stdio::from(src_stdout))
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute '{}'", consumer.0))?;

        let src_status = src.wait().context("Failed to wait for producer")?;

        if !src_status.success() {
            bail!("'{}' failed during copy", producer.0);
        }
        if !dst.status.success() {
            bail!(
                "'{}' failed during copy: {}",
                consumer.0,
                first_line(&String::from_utf8_lossy(&dst.stderr))
            );
        }
        Ok(())
    }
}

fn render<S: AsRef<OsStr>>(program: &str, args: &[S]) -> String {
    let mut out = String::from(program);
    for arg in args {
        out.push(' ');
        out.push_str(&arg.as_ref().to_string_lossy());
    }
    out
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        "exited with non-zero status".to_string()
    } else {
        line.to_string()
    }
}
