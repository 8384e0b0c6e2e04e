//! Render command: capture the site's deliverables

use anyhow::Context;
use clap::Args;
use colored::Colorize;
use lh4h_capture::{
    CaptureConfig, CaptureOrchestrator, CaptureReport, ChromeEngine, LaunchSettings,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args)]
pub struct RenderCommand {
    /// Directory containing index.html and poster.html
    #[arg(long, env = "LH4H_PROJECT_ROOT", default_value = ".")]
    pub project_root: PathBuf,

    /// Where JPEGs are written; relative paths are taken from the project root
    #[arg(long, env = "LH4H_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// YAML or JSON manifest replacing the built-in shots
    #[arg(long, env = "LH4H_SHOTS")]
    pub shots: Option<PathBuf>,

    /// Chrome or Chromium binary to launch
    #[arg(long, env = "LH4H_CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Launch Chrome without its sandbox (required in most containers)
    #[arg(long, env = "LH4H_NO_SANDBOX")]
    pub no_sandbox: bool,
}

impl RenderCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.build_config()?;

        info!(
            "Rendering {} shot(s) from {}",
            config.shots.len(),
            config.project_root.display()
        );

        let rt = tokio::runtime::Runtime::new()?;
        let orchestrator = CaptureOrchestrator::from_config(Arc::new(ChromeEngine::new()), &config);
        let report = rt
            .block_on(orchestrator.run(&config.shots))
            .context("Capture run failed")?;

        print_summary(&report);
        Ok(())
    }

    fn build_config(&self) -> anyhow::Result<CaptureConfig> {
        let mut config = CaptureConfig::for_project(&self.project_root).with_context(|| {
            format!("Invalid project root {}", self.project_root.display())
        })?;

        if let Some(output_dir) = &self.output_dir {
            config = config.with_output_dir(output_dir)?;
        }
        if let Some(manifest) = &self.shots {
            config = config
                .with_manifest(manifest)
                .with_context(|| format!("Failed to load shots from {}", manifest.display()))?;
        }

        Ok(config.with_launch(LaunchSettings {
            sandbox: !self.no_sandbox,
            chrome_path: self.chrome_path.clone(),
            ..LaunchSettings::default()
        }))
    }
}

fn print_summary(report: &CaptureReport) {
    println!();
    println!(
        "{} {}",
        "✓".bright_green(),
        format!("Wrote {} deliverable(s)", report.shots.len())
            .bright_white()
            .bold()
    );
    for shot in &report.shots {
        let note = if shot.used_load_fallback {
            " (load fallback)".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {} {}{}",
            shot.name.bright_cyan(),
            shot.path.display(),
            format!("{} bytes", shot.bytes).bright_black(),
            note
        );
    }
}
