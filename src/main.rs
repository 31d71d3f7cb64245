use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use env_logger::{Builder, Env};
use log::info;
use tokio_util::sync::CancellationToken;

use speakvault::batch::{run_batch, BatchRequest};
use speakvault::config::{EngineKind, LineRange, OutputFormat, TransformParams};
use speakvault::notification::{CompositeProgressObserver, ConsoleProgressObserver, FileProgressObserver};
use speakvault::settings::{Settings, DEFAULT_SETTINGS_FILE};
use speakvault::utils::ffmpeg;
use speakvault::{EventLog, Generator, RunStatus};

#[derive(Parser)]
#[command(name = "speakvault", version, about = "Turn text, CSV and subtitle files into speech")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize speech from a txt, csv or srt file
    Generate(GenerateArgs),
    /// Trim, clean up and re-time existing audio files
    Batch(BatchArgs),
}

#[derive(Args)]
struct TransformArgs {
    /// Tempo multiplier
    #[arg(long)]
    tempo: Option<f32>,
    /// Pitch multiplier
    #[arg(long)]
    pitch: Option<f32>,
    /// Gain multiplier, shifts loudness by 20 * (gain - 1) dB
    #[arg(long)]
    gain: Option<f32>,
}

#[derive(Args)]
struct GenerateArgs {
    /// Source file
    source: PathBuf,
    /// Output directory, must exist
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// google, espeak or elevenlabs
    #[arg(short, long)]
    engine: Option<EngineKind>,
    /// ogg, mp3 or wav
    #[arg(short, long)]
    format: Option<OutputFormat>,
    /// Merge all fragments into one file
    #[arg(long)]
    merge: bool,
    /// First line, 1-based
    #[arg(long, default_value_t = 1)]
    start: usize,
    /// Last line, inclusive; 0 means to the end
    #[arg(long, default_value_t = 0)]
    end: usize,
    #[command(flatten)]
    transform: TransformArgs,
    /// Local engine voice
    #[arg(long)]
    voice: Option<String>,
    /// ElevenLabs API key
    #[arg(long, env = "ELEVENLABS_API_KEY")]
    eleven_api_key: Option<String>,
    /// ElevenLabs voice id
    #[arg(long)]
    eleven_voice_id: Option<String>,
    /// Append one second of silence after each subtitle (split mode)
    #[arg(long)]
    subtitle_silence: bool,
    /// Stretch merged subtitle audio to the subtitle timeline
    #[arg(long)]
    global_stretch: bool,
    /// Language code
    #[arg(long)]
    lang: Option<String>,
    /// Settings file
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,
    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_settings: bool,
    /// Also append progress lines to this file
    #[arg(long)]
    progress_log: Option<PathBuf>,
}

#[derive(Args)]
struct BatchArgs {
    /// Input audio files
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Output directory, must exist
    #[arg(short, long)]
    out: PathBuf,
    #[arg(short, long, default_value = "ogg")]
    format: OutputFormat,
    #[command(flatten)]
    transform: TransformArgs,
    /// Remove pauses longer than 400 ms
    #[arg(long)]
    remove_silence: bool,
    /// Trim start in seconds
    #[arg(long, default_value_t = 0.0)]
    trim_start: f64,
    /// Trim end in seconds, 0 means the end of the file
    #[arg(long, default_value_t = 0.0)]
    trim_end: f64,
    /// Also append progress lines to this file
    #[arg(long)]
    progress_log: Option<PathBuf>,
}

fn init_logger() {
    let env = Env::default().filter_or("RUST_LOG", "warn,speakvault=info");
    Builder::from_env(env)
        .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
        .target(env_logger::Target::Stderr)
        .init();
}

impl TransformArgs {
    fn apply_to(&self, params: &mut TransformParams) {
        if let Some(tempo) = self.tempo {
            params.tempo = tempo;
        }
        if let Some(pitch) = self.pitch {
            params.pitch = pitch;
        }
        if let Some(gain) = self.gain {
            params.gain = gain;
        }
    }
}

/// Консоль плюс, если задан, файл журнала прогресса
fn progress_observer(console: ConsoleProgressObserver, progress_log: Option<PathBuf>) -> CompositeProgressObserver {
    let mut observer = CompositeProgressObserver::new();
    observer.add_observer(Box::new(console));
    if let Some(path) = progress_log {
        observer.add_observer(Box::new(FileProgressObserver::new(path)));
    }
    observer
}

/// Ctrl-C отменяет запуск; повторное нажатие не нужно
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current chunk");
            token.cancel();
        }
    });
}

async fn generate(args: GenerateArgs, event_log: Arc<EventLog>) -> anyhow::Result<()> {
    let settings = Settings::load(&args.settings);
    let mut request = settings.to_request(&args.source);

    if let Some(out) = args.out {
        request.output_dir = out;
    }
    if let Some(engine) = args.engine {
        request.engine = engine;
    }
    if let Some(format) = args.format {
        request.format = format;
    }
    request.merge |= args.merge;
    request.range = LineRange::new(args.start, Some(args.end));
    args.transform.apply_to(&mut request.transform);
    if let Some(voice) = args.voice {
        request.voice_id = voice;
    }
    if let Some(key) = args.eleven_api_key {
        request.eleven_api_key = key;
    }
    if let Some(voice) = args.eleven_voice_id {
        request.eleven_voice_id = voice;
    }
    request.subtitle_silence |= args.subtitle_silence;
    request.global_stretch |= args.global_stretch;
    if let Some(lang) = args.lang {
        request.language = lang;
    }

    if args.save_settings {
        Settings::from_request(&request)
            .save(&args.settings, &event_log)
            .with_context(|| format!("saving {}", args.settings.display()))?;
    }

    let handle = Generator::new(request)
        .with_observer(Box::new(progress_observer(ConsoleProgressObserver::new(), args.progress_log)))
        .with_event_log(event_log)
        .spawn();
    cancel_on_ctrl_c(handle.cancellation_token());

    let report = handle.join().await?;
    if report.status == RunStatus::Cancelled {
        info!("Generation was cancelled");
    }
    Ok(())
}

async fn batch(args: BatchArgs) -> anyhow::Result<()> {
    let mut request = BatchRequest::new(args.files, args.out);
    request.format = args.format;
    args.transform.apply_to(&mut request.transform);
    request.remove_silence = args.remove_silence;
    request.trim_start_s = args.trim_start;
    request.trim_end_s = args.trim_end;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let observer = progress_observer(ConsoleProgressObserver::with_prefix("[batch] "), args.progress_log);
    let report = run_batch(&request, &observer, &cancel).await?;
    if !report.failed.is_empty() {
        bail!("{} of {} file(s) failed", report.failed.len(), request.files.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    let cli = Cli::parse();

    let version = ffmpeg::get_ffmpeg_version().unwrap_or_else(|_| "not found".to_string());
    info!("FFmpeg: {}", version);

    let event_log = Arc::new(EventLog::new());
    let result = match cli.command {
        Command::Generate(args) => generate(args, event_log.clone()).await,
        Command::Batch(args) => batch(args).await,
    };

    if !event_log.is_empty() {
        eprintln!("--- events ---");
        for line in event_log.lines() {
            eprintln!("{}", line);
        }
    }
    result
}
