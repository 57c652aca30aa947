use std::{path::PathBuf, process::Stdio};

use clap::ValueEnum;
use ethers::solc::{hh::HardhatArtifacts, Project, ProjectPathsConfig};
use tokio::process::Command;

use crate::error::{DeployError, Result};

/// The build task run before any artifact is resolved.
pub trait Compile {
    async fn compile(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompilerKind {
    /// Compile in-process with solc, auto-installing the pragma's version
    Solc,
    /// Shell out to `npx hardhat compile`
    Hardhat,
}

pub enum Compiler {
    Solc(SolcCompiler),
    Hardhat(HardhatCompiler),
}

impl Compiler {
    pub fn new(kind: CompilerKind, root: impl Into<PathBuf>) -> Self {
        match kind {
            CompilerKind::Solc => Compiler::Solc(SolcCompiler::new(root)),
            CompilerKind::Hardhat => Compiler::Hardhat(HardhatCompiler::new(root)),
        }
    }
}

impl Compile for Compiler {
    async fn compile(&self) -> Result<()> {
        match self {
            Compiler::Solc(compiler) => compiler.compile().await,
            Compiler::Hardhat(compiler) => compiler.compile().await,
        }
    }
}

/// Compiles `<root>/contracts` into Hardhat-format artifacts under `<root>/artifacts`.
pub struct SolcCompiler {
    root: PathBuf,
}

impl SolcCompiler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn compile_blocking(root: PathBuf) -> Result<()> {
        let paths = ProjectPathsConfig::hardhat(&root).map_err(compilation_error)?;
        let project = Project::builder()
            .paths(paths)
            .artifacts(HardhatArtifacts::default())
            .build()
            .map_err(compilation_error)?;

        let output = project.compile().map_err(compilation_error)?;
        if output.has_compiler_errors() {
            let errors = output
                .output()
                .errors
                .iter()
                .filter(|error| error.severity.is_error())
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            return Err(DeployError::Compilation(errors.join("\n")));
        }

        if output.is_unchanged() {
            log::info!("nothing to compile");
        } else {
            log::info!("compiled solidity sources in {:?}", root);
        }
        Ok(())
    }
}

impl Compile for SolcCompiler {
    async fn compile(&self) -> Result<()> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::compile_blocking(root))
            .await
            .map_err(compilation_error)?
    }
}

/// Runs an external build command in the project root.
pub struct HardhatCompiler {
    root: PathBuf,
    program: String,
    args: Vec<String>,
}

impl HardhatCompiler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_command(root, "npx", ["hardhat", "compile"])
    }

    pub fn with_command<I, S>(root: impl Into<PathBuf>, program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Compile for HardhatCompiler {
    async fn compile(&self) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        log::debug!("running command: {:?}", cmd);

        let output = cmd.output().await.map_err(|e| {
            DeployError::Compilation(format!("failed to run {}: {}", self.program, e))
        })?;

        // stdout is reserved for the address line
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            log::info!("{}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Compilation(format!(
                "{} {} exited with {}: {}",
                self.program,
                self.args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn compilation_error(e: impl ToString) -> DeployError {
    DeployError::Compilation(e.to_string())
}
