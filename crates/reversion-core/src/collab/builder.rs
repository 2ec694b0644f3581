//! External package builder.
//!
//! Wraps a packer executable that turns published wheels into a single
//! self-contained executable for one platform. The builder is run offline
//! against explicit find-links indexes only.

use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use reversion_schema::wheel::{WheelFilename, builder_platform};
use thiserror::Error;

/// Flags passed on every invocation: no cache, no public index, no source
/// builds, a portable shebang and a venv-style layout.
const FIXED_ARGS: &[&str] = &[
    "--disable-cache",
    "--no-build",
    "--no-pypi",
    "--no-strip-pex-env",
    "--venv",
];

const SHEBANG: &str = "/usr/bin/env python";

/// Builder failure.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The executable could not be started.
    #[error("failed to launch {}: {source}", .program.display())]
    Spawn {
        /// Program that was invoked.
        program: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The executable ran and reported failure.
    #[error("builder exited with {status} while producing {}", .output.display())]
    Failed {
        /// Exit status.
        status: ExitStatus,
        /// Output that was requested.
        output: PathBuf,
    },
}

/// One build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Requirement to install, e.g. `pkg==2.0`.
    pub requirement: String,
    /// Target platform string understood by the builder.
    pub platform: String,
    /// Where the executable is written.
    pub output: PathBuf,
    /// Find-links locations, in priority order.
    pub index_urls: Vec<String>,
    /// Entry point exposed by the executable, if any.
    pub console_script: Option<String>,
}

impl BuildRequest {
    /// A request for `name==version` on `platform`.
    pub fn new(
        name: &str,
        version: &str,
        platform: impl Into<String>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            requirement: format!("{name}=={version}"),
            platform: platform.into(),
            output: output.into(),
            index_urls: Vec::new(),
            console_script: None,
        }
    }

    /// A request targeting the platform `wheel` was built for, or `None` if
    /// `wheel` is not a wheel filename.
    ///
    /// The builder's platform string is `<platform>-cp-<python>-<abi>`, e.g.
    /// `linux_x86_64-cp-39-cp39` for a `cp39-cp39-manylinux2014_x86_64` wheel.
    pub fn for_wheel(wheel: &str, output: impl Into<PathBuf>) -> Option<Self> {
        let parsed = WheelFilename::parse(wheel)?;
        let platform = builder_platform(wheel)?;
        let python = parsed.python.strip_prefix("cp").unwrap_or(&parsed.python);
        Some(Self::new(
            &parsed.name,
            &parsed.version,
            format!("{platform}-cp-{python}-{}", parsed.abi),
            output,
        ))
    }

    /// Add a find-links location.
    pub fn index(mut self, url: impl Into<String>) -> Self {
        self.index_urls.push(url.into());
        self
    }

    /// Set the exposed entry point.
    pub fn console_script(mut self, name: impl Into<String>) -> Self {
        self.console_script = Some(name.into());
        self
    }
}

/// Runs builds with a given executable.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    program: PathBuf,
}

impl PackageBuilder {
    /// Use `program` (looked up on `PATH` if relative).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The command line for `request`, not yet started.
    pub fn command(&self, request: &BuildRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--python-shebang").arg(SHEBANG);
        cmd.arg("-o").arg(&request.output);
        for url in &request.index_urls {
            cmd.arg("-f").arg(url);
        }
        cmd.arg(&request.requirement);
        cmd.args(FIXED_ARGS);
        if let Some(script) = &request.console_script {
            cmd.arg(format!("--console-script={script}"));
        }
        cmd.arg(format!("--platform={}", request.platform));
        cmd
    }

    /// Run one build to completion. There is no retry.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Spawn`] if the program cannot start and
    /// [`BuildError::Failed`] on a non-zero exit.
    pub fn build(&self, request: &BuildRequest) -> Result<(), BuildError> {
        tracing::info!(
            program = %self.program.display(),
            requirement = %request.requirement,
            platform = %request.platform,
            "running package builder"
        );
        let status = self
            .command(request)
            .status()
            .map_err(|source| BuildError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(BuildError::Failed {
                status,
                output: request.output.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    fn request() -> BuildRequest {
        BuildRequest::new("pkg", "2.0", "linux_x86_64-cp-39-cp39", "out/pkg.pex")
            .index("https://wheels.example.org/simple")
            .index("links.html")
            .console_script("pkg")
    }

    #[test]
    fn command_line_layout() {
        let builder = PackageBuilder::new("pex");
        let cmd = builder.command(&request());
        assert_eq!(cmd.get_program(), OsStr::new("pex"));

        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "--python-shebang",
                "/usr/bin/env python",
                "-o",
                "out/pkg.pex",
                "-f",
                "https://wheels.example.org/simple",
                "-f",
                "links.html",
                "pkg==2.0",
                "--disable-cache",
                "--no-build",
                "--no-pypi",
                "--no-strip-pex-env",
                "--venv",
                "--console-script=pkg",
                "--platform=linux_x86_64-cp-39-cp39",
            ]
        );
    }

    #[test]
    fn request_from_wheel_name() {
        let wheel = "pkg-2.0-cp39-cp39-manylinux2014_x86_64.whl";
        let req = BuildRequest::for_wheel(wheel, "pkg.pex").unwrap();
        assert_eq!(req.requirement, "pkg==2.0");
        assert_eq!(req.platform, "linux_x86_64-cp-39-cp39");
        assert!(BuildRequest::for_wheel("pkg.tar.gz", "x").is_none());
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let builder = PackageBuilder::new("/nonexistent/reversion-test-builder");
        let err = builder.build(&request()).unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_failure() {
        let builder = PackageBuilder::new("false");
        let err = builder.build(&request()).unwrap_err();
        assert!(matches!(err, BuildError::Failed { ref status, .. } if !status.success()));
    }

    #[cfg(unix)]
    #[test]
    fn zero_exit_is_success() {
        PackageBuilder::new("true").build(&request()).unwrap();
    }
}
