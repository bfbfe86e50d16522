use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::error::SrefError;

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub program: Option<String>,
    pub version: Option<String>,
}

pub trait Converter {
    /// Writes a NetCDF rendition of `raw` to `converted`. Succeeds only when
    /// the output exists and is non-empty.
    fn convert(&self, raw: &Path, converted: &Path) -> Result<(), SrefError>;
    fn tool_info(&self) -> ToolInfo;
}

#[derive(Debug, Clone)]
pub struct Wgrib2Converter {
    program: Option<PathBuf>,
    leading_args: Vec<String>,
}

impl Wgrib2Converter {
    /// Looks `wgrib2` up on `PATH`.
    pub fn locate() -> Self {
        Self {
            program: find_in_path("wgrib2"),
            leading_args: Vec::new(),
        }
    }

    /// A bare program name is looked up on `PATH`; anything else is taken as a path.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let program = if program.components().count() == 1 {
            find_in_path(&program.to_string_lossy()).unwrap_or(program)
        } else {
            program
        };
        Self {
            program: Some(program),
            leading_args: Vec::new(),
        }
    }

    /// Runs `program leading_args... <raw> -netcdf <converted>`.
    pub fn with_command(program: impl Into<PathBuf>, leading_args: Vec<String>) -> Self {
        Self {
            program: Some(program.into()),
            leading_args,
        }
    }

    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    /// True when the configured program exists on disk. Does not run it.
    pub fn is_available(&self) -> bool {
        self.program.as_ref().is_some_and(|path| path.is_file())
    }

    fn require_program(&self) -> Result<&PathBuf, SrefError> {
        match &self.program {
            Some(path) if path.is_file() => Ok(path),
            Some(path) => Err(SrefError::MissingTool(path.display().to_string())),
            None => Err(SrefError::MissingTool("wgrib2".to_string())),
        }
    }

    fn run_cmd(&self, program: &Path, args: &[String]) -> Result<(), SrefError> {
        tracing::debug!(program = %program.display(), ?args, "wgrib2.exec");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| SrefError::Conversion(format!("{}: {err}", program.display())))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", program.display(), output.status)
        } else {
            stderr
        };
        Err(SrefError::Conversion(message))
    }
}

impl Converter for Wgrib2Converter {
    fn convert(&self, raw: &Path, converted: &Path) -> Result<(), SrefError> {
        let program = self.require_program()?;
        let parent = converted
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        // wgrib2 writes beside the target; only a verified file replaces it.
        let temp = tempfile::Builder::new()
            .prefix(".sref-convert")
            .suffix(".nc")
            .tempfile_in(parent)
            .map_err(|err| SrefError::Filesystem(err.to_string()))?
            .into_temp_path();

        let mut args = self.leading_args.clone();
        args.push(raw.to_string_lossy().to_string());
        args.push("-netcdf".to_string());
        args.push(temp.to_string_lossy().to_string());

        self.run_cmd(program, &args)?;
        ensure_non_empty(&temp, converted)?;
        temp.persist(converted)
            .map_err(|err| SrefError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            program: self
                .program
                .as_ref()
                .map(|path| path.display().to_string()),
            version: self
                .program
                .as_ref()
                .and_then(|path| tool_version(path, &["-version"])),
        }
    }
}

fn ensure_non_empty(path: &Path, target: &Path) -> Result<(), SrefError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(SrefError::EmptyConversionOutput(target.to_path_buf())),
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        None
    } else {
        Some(stdout)
    }
}
