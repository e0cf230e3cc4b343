//! Codecast CLI - GitHub repository podcasts
//!
//! A command-line tool that turns a public GitHub repository into a narrated
//! podcast episode for junior developers.

use clap::Parser;
use codecast_core::config::default_config;
use codecast_core::{
    AudioAssembler, Config, GitHubCollector, KokoroSynthesizer, NarrationSource, OpenAiNarrator,
    PodcastPipeline, ProgressCallback, ProgressEvent, ScriptOutcome, output_filename,
};
use colored::Colorize;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "codecast",
    version,
    about = "Turn a GitHub repository into a narrated podcast",
    long_about = "Analyses a public GitHub repository, writes a narration script with an OpenAI-compatible API and renders it to audio with a local TTS model."
)]
struct Cli {
    /// The repository URL, e.g. https://github.com/owner/repo
    #[arg(value_name = "REPO_URL")]
    url: String,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chat model used for the narration script
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Voice ID for the narrator (e.g. pf_dora)
    #[arg(long, value_name = "VOICE")]
    voice: Option<String>,

    /// Audio file (MP3 or WAV) played at every cue marker; without it cues are silent
    #[arg(long, value_name = "FILE")]
    cue: Option<PathBuf>,

    /// Output path for the podcast audio
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output path for the narration script
    #[arg(long, value_name = "FILE")]
    script_output: Option<PathBuf>,

    /// Only write the script; skip speech synthesis
    #[arg(long)]
    script_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    apply_overrides(&mut config, &cli);
    tracing::debug!(model = %config.generation.model, voice = %config.speech.voice, "Configuration loaded");

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. A fallback script will be used.".yellow()
        );
        String::new()
    });
    let github_token = env::var("GITHUB_TOKEN").ok();

    print_header(&cli.url, &config);

    // Load the TTS model before any network work so a bad voice fails fast
    let mut synthesizer = if cli.script_only {
        None
    } else {
        println!("{}", "Loading TTS model...".dimmed());
        Some(KokoroSynthesizer::new(config.speech.clone()).await?)
    };

    let collector = GitHubCollector::new(github_token.as_deref(), config.limits.clone())?;
    let narrator = OpenAiNarrator::new(config.generation.clone(), api_key);
    let mut pipeline = PodcastPipeline::new(config.clone(), Box::new(collector), Box::new(narrator))
        .with_callback(create_console_callback());

    let outcome = match synthesizer.as_mut() {
        None => {
            let script = pipeline.prepare_script(&cli.url).await?;
            print_script_summary(&script);
            write_script(&cli, &script)?;
            script
        }
        Some(synthesizer) => {
            let assembler = AudioAssembler::from_config(config.audio.clone());
            if !assembler.has_cue() {
                eprintln!(
                    "{}",
                    "Warning: no cue audio loaded (see --cue), cue markers will be silent.".yellow()
                );
            }

            let output = pipeline.run(&cli.url, &assembler, synthesizer).await?;
            print_script_summary(&output.script);
            write_script(&cli, &output.script)?;

            let audio_path = cli.output.clone().unwrap_or_else(|| {
                PathBuf::from(output_filename(&output.script.identity.name, "podcast.wav"))
            });
            fs::write(&audio_path, &output.assembly.encoded)?;

            println!();
            println!(
                "{} {} ({}, {} segments, {} skipped)",
                "Podcast saved to:".bright_green().bold(),
                audio_path.display(),
                format_duration(output.assembly.duration_ms()),
                output.assembly.narration_segments,
                output.assembly.skipped_segments,
            );
            output.script
        }
    };

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  Episode for {} ready.", outcome.identity.name)
            .bright_green()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.generation.model = model.clone();
    }
    if let Some(voice) = &cli.voice {
        config.speech.voice = voice.clone();
    }
    if let Some(cue) = &cli.cue {
        config.audio.cue_path = Some(cue.clone());
    }
    if let Ok(api_base) = env::var("OPENAI_API_BASE").or_else(|_| env::var("OPENAI_BASE_URL")) {
        config.generation.api_base = api_base;
    }
}

fn print_header(url: &str, config: &Config) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - Código Aberto Explica", "Codecast".bold())
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Repository:".bold(), url.bright_white());
    println!("{} {}", "Model:".bold(), config.generation.model.dimmed());
    println!("{} {}", "Voice:".bold(), config.speech.voice.dimmed());
    println!();
    println!("{}", "─".repeat(70).dimmed());
}

fn print_script_summary(script: &ScriptOutcome) {
    println!();
    println!(
        "{} {} (score {:.2}) - {}",
        "Complexity:".bold(),
        script.complexity.to_string().bright_cyan(),
        script.score,
        script.template.display_name().yellow()
    );
    match &script.source {
        NarrationSource::Generated => {
            println!("{} {}", "Narration:".bold(), "generated".bright_green());
        }
        NarrationSource::Fallback(reason) => {
            println!(
                "{} {} ({})",
                "Narration:".bold(),
                "fallback script".yellow(),
                reason.dimmed()
            );
        }
    }
}

fn write_script(cli: &Cli, script: &ScriptOutcome) -> std::io::Result<()> {
    let path = cli
        .script_output
        .clone()
        .unwrap_or_else(|| PathBuf::from(output_filename(&script.identity.name, "roteiro.md")));
    fs::write(&path, &script.script)?;
    println!("{} {}", "Script saved to:".bright_green().bold(), path.display());
    Ok(())
}

/// Create a callback that prints progress events to the console.
fn create_console_callback() -> ProgressCallback {
    Box::new(move |event: ProgressEvent| {
        println!(
            "{} {}",
            format!("[{:>3.0}%]", event.fraction * 100.0).bright_cyan(),
            event.message
        );
    })
}

fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
