use std::path::PathBuf;

use chat_with_llm::{Category, GeminiClient, Generate, Session, StubBackend, config};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Command,
	/// Answer from an offline stub instead of calling the API
	#[clap(long)]
	stub: bool,
	#[command(flatten)]
	settings: config::SettingsFlags,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Send a single text prompt
	Text { prompt: String },
	/// Upload a file and ask a question about it
	File {
		path: PathBuf,
		/// Asked on stdin when omitted
		#[clap(short, long)]
		question: Option<String>,
	},
	/// Multi-turn chat on stdin; the whole history is resent every turn
	Chat,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();
	let _ = dotenvy::dotenv();
	let cli = Cli::parse();

	config::init(cli.settings)?;
	let config = config::get();
	let mut session = Session::from_config(&config);

	match cli.stub {
		true => run(&mut session, &StubBackend, cli.command).await,
		false => {
			let client = GeminiClient::new(config.require_api_key()?);
			run(&mut session, &client, cli.command).await
		}
	}
}

async fn run<B: Generate>(session: &mut Session, backend: &B, command: Command) -> eyre::Result<()> {
	let mut stdin = BufReader::new(tokio::io::stdin()).lines();

	match command {
		Command::Text { prompt } => match session.ask_text(backend, &prompt).await {
			Ok(response) => println!("{response}"),
			Err(e) => eprintln!("{e}"),
		},
		Command::File { path, question } => {
			let bytes = match tokio::fs::read(&path).await {
				Ok(bytes) => bytes,
				Err(e) => {
					eprintln!("Failed to upload file: {e}");
					return Ok(());
				}
			};
			let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
			let artifact = match session.upload(&bytes, &filename) {
				Ok(artifact) => artifact,
				Err(e) => {
					eprintln!("Failed to upload file: {e}");
					return Ok(());
				}
			};
			println!("File uploaded successfully!");
			if let Err(e) = artifact.ensure_supported() {
				println!("{e}");
				return Ok(());
			}
			if artifact.category == Category::Image {
				println!("Uploaded Image.");
			}

			let question = match question {
				Some(q) => q,
				None => match prompt(&mut stdin, &format!("Enter your question about the {}: ", artifact.mime_label())).await? {
					Some(q) => q,
					None => return Ok(()),
				},
			};
			match session.ask_about(backend, &question).await {
				Ok(response) => println!("{response}"),
				Err(e) => eprintln!("{e}"),
			}
		}
		Command::Chat => {
			while let Some(input) = prompt(&mut stdin, "Input: ").await? {
				let input = input.trim();
				match input {
					"" => continue,
					"/exit" => break,
					_ => {}
				}
				match session.submit_turn(backend, input).await {
					Ok(response) => println!("The Response is\n{}", response.text),
					Err(e) => eprintln!("{e}"),
				}
				println!("The Chat History is\n{}", session.render_transcript());
			}
		}
	}
	Ok(())
}

async fn prompt(stdin: &mut Lines<BufReader<Stdin>>, label: &str) -> eyre::Result<Option<String>> {
	let mut stdout = tokio::io::stdout();
	stdout.write_all(label.as_bytes()).await?;
	stdout.flush().await?;
	Ok(stdin.next_line().await?)
}
