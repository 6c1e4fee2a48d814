//! External archiver to extract the parts of a package.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::device::Device;

/// Path of the `cpio` program used by [`Cpio::default`].
pub const CPIO_PROGRAM: &str = "/usr/bin/cpio";

/// Operation requested to the archiver.
#[derive(Clone, Copy, Debug)]
pub enum ArchiverMode<'a> {
    /// Extract the next archive of the stream in `target`.
    ///
    /// If `patterns` is not empty, only the matching files are written.
    Extract {
        target: &'a Path,
        patterns: &'a [String],
    },

    /// Read the next archive of the stream, and discard it.
    Skip,
}

/// Result of an archiver execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiverOutput {
    /// Command line, for diagnostics.
    pub command: String,

    /// Exit code. `None` if the process was killed by a signal.
    pub status: Option<i32>,

    /// Messages from the archiver (usually, its standard error).
    pub diagnostics: String,
}

impl ArchiverOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

impl fmt::Display for ArchiverOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` ", self.command)?;

        match self.status {
            Some(code) => write!(f, "exited with code {code}")?,
            None => f.write_str("was killed by a signal")?,
        }

        if !self.diagnostics.is_empty() {
            write!(f, ": {}", self.diagnostics)?;
        }

        Ok(())
    }
}

/// Program to read the archives in a datastream.
///
/// Each invocation must consume exactly one archive from `device`.
pub trait Archiver {
    fn run(
        &mut self,
        device: &mut Device,
        mode: ArchiverMode<'_>,
        block_size: usize,
    ) -> io::Result<ArchiverOutput>;
}

/// [`Archiver`] that launches a SVR4 `cpio` process.
///
/// The standard input of the process is the device, so both share
/// the same offset.
#[derive(Clone, Debug)]
pub struct Cpio {
    program: PathBuf,
}

impl Default for Cpio {
    fn default() -> Self {
        Cpio::new(CPIO_PROGRAM)
    }
}

impl Cpio {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Cpio {
            program: program.into(),
        }
    }

    /// Arguments for `cpio` to run the operation in `mode`.
    fn arguments(mode: &ArchiverMode<'_>, block_size: usize) -> Vec<String> {
        let flags = match mode {
            ArchiverMode::Extract { .. } => "-icdumD",
            ArchiverMode::Skip => "-ictD",
        };

        let mut args = vec![flags.to_owned(), "-C".to_owned(), block_size.to_string()];

        if let ArchiverMode::Extract { patterns, .. } = mode {
            args.extend(patterns.iter().cloned());
        }

        args
    }
}

impl Archiver for Cpio {
    fn run(
        &mut self,
        device: &mut Device,
        mode: ArchiverMode<'_>,
        block_size: usize,
    ) -> io::Result<ArchiverOutput> {
        let args = Self::arguments(&mode, block_size);

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(device.stdin()?)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if let ArchiverMode::Extract { target, .. } = mode {
            command.current_dir(target);
        }

        let text = format!("{} {}", self.program.display(), args.join(" "));
        log::debug!("Running {text}");

        let output = command.output()?;

        Ok(ArchiverOutput {
            command: text,
            status: output.status.code(),
            diagnostics: String::from_utf8_lossy(&output.stderr).trim_end().to_owned(),
        })
    }
}

#[test]
fn cpio_arguments() {
    let patterns = ["SUNWfoo/*".to_owned(), "signature".to_owned()];
    let extract = ArchiverMode::Extract {
        target: Path::new("/tmp"),
        patterns: &patterns,
    };

    assert_eq!(
        Cpio::arguments(&extract, 512),
        ["-icdumD", "-C", "512", "SUNWfoo/*", "signature"]
    );

    assert_eq!(
        Cpio::arguments(&ArchiverMode::Skip, 512),
        ["-ictD", "-C", "512"]
    );
}

#[test]
fn describe_failures() {
    let mut output = ArchiverOutput {
        command: "cpio -ictD -C 512".to_owned(),
        status: Some(2),
        diagnostics: "Out of phase".to_owned(),
    };

    assert!(!output.success());
    assert_eq!(
        output.to_string(),
        "`cpio -ictD -C 512` exited with code 2: Out of phase"
    );

    output.status = None;
    output.diagnostics.clear();
    assert_eq!(
        output.to_string(),
        "`cpio -ictD -C 512` was killed by a signal"
    );
}
