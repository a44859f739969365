use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use bilitv_dl_lib::bilibili::client::BilibiliClient;
use bilitv_dl_lib::config::{
  ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_COOKIE_FILE, DEFAULT_DOWNLOAD_DIR,
  DEFAULT_FFMPEG_PATH,
};
use bilitv_dl_lib::cookies::load_cookie_header;
use bilitv_dl_lib::download::{LogWriter, ProgressReporter, StreamAcquirer};
use bilitv_dl_lib::ffmpeg::Ffmpeg;
use bilitv_dl_lib::prompt::{LinePrompt, Preset};
use bilitv_dl_lib::Pipeline;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
enum LogLevel {
  Trace,
  Debug,
  Info,
  Warn,
  Error,
}

impl From<LogLevel> for LevelFilter {
  fn from(level: LogLevel) -> Self {
    match level {
      LogLevel::Trace => LevelFilter::TRACE,
      LogLevel::Debug => LevelFilter::DEBUG,
      LogLevel::Info => LevelFilter::INFO,
      LogLevel::Warn => LevelFilter::WARN,
      LogLevel::Error => LevelFilter::ERROR,
    }
  }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Download a bilibili.tv video as one mp4")]
struct Args {
  /// Page link; asked interactively when omitted
  #[arg(long)]
  link: Option<String>,
  /// Quality index; asked interactively when omitted
  #[arg(short, long)]
  quality: Option<usize>,
  /// Newline-separated cookie file
  #[arg(long, default_value = DEFAULT_COOKIE_FILE)]
  cookies: PathBuf,
  /// Directory for intermediates and the final file
  #[arg(short, long, default_value = DEFAULT_DOWNLOAD_DIR)]
  output_dir: PathBuf,
  #[arg(long, env = "BILITV_FFMPEG", default_value = DEFAULT_FFMPEG_PATH)]
  ffmpeg: PathBuf,
  #[arg(long, env = "BILITV_API_BASE", default_value = DEFAULT_API_BASE_URL)]
  api_base: String,
  /// Connect timeout in seconds; transfers themselves are never timed out
  #[arg(long)]
  connect_timeout: Option<u64>,
  /// Hide download progress bars
  #[arg(long)]
  no_progress: bool,
  #[arg(short, long, default_value = "info")]
  log_level: LogLevel,
}

fn init_logging(level: LogLevel, writer: LogWriter) {
  let fmt_layer = tracing_subscriber::fmt::layer()
    .compact()
    .with_target(false)
    .with_writer(move || writer.clone())
    .with_filter(LevelFilter::from(level));
  tracing_subscriber::registry().with(fmt_layer).init();
}

#[tokio::main]
async fn main() -> ExitCode {
  let args = Args::parse();
  let progress = if args.no_progress {
    ProgressReporter::Silent
  } else {
    ProgressReporter::terminal()
  };
  init_logging(args.log_level, progress.log_writer());

  let cookie = load_cookie_header(&args.cookies);
  let config = ClientConfig {
    api_base_url: args.api_base.clone(),
    connect_timeout: args.connect_timeout.map(Duration::from_secs),
    ..ClientConfig::default()
  }
  .with_cookie(cookie);

  let client = match config.build_client() {
    Ok(client) => client,
    Err(err) => {
      error!("http_client_init_failed err={}", err);
      return ExitCode::FAILURE;
    }
  };

  let mut pipeline = Pipeline::new(
    BilibiliClient::new(client.clone(), &config.api_base_url),
    StreamAcquirer::new(client, progress),
    Ffmpeg::new(&args.ffmpeg),
    &args.output_dir,
  );
  let mut prompt = Preset::new(
    vec![args.link.clone(), args.quality.map(|index| index.to_string())],
    LinePrompt::stdio(),
  );
  let interrupt = async {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt_received");
    } else {
      std::future::pending::<()>().await;
    }
  };

  match pipeline.run(&mut prompt, interrupt).await {
    Ok(outcome) => {
      for warning in &outcome.warnings {
        warn!("cleanup_incomplete {}", warning);
      }
      info!("saved path={}", outcome.paths.output.display());
      println!("[DONE] Saved as {}", outcome.paths.output.display());
      ExitCode::SUCCESS
    }
    Err(failure) => {
      error!("pipeline_failed stage={} err={}", failure.stage, failure.error);
      eprintln!("[ERROR] {}", failure);
      ExitCode::from(failure.exit_code())
    }
  }
}
