use anyhow::{bail, Context, Result};
use bizyair_rs::{codec, formatter, nodes, BizyAirClient, BizyAirConfig, ImageTensor, ResampleMethod};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "bizyair", version, about = "Run BizyAir web-app tasks from the shell")]
struct Cli {
    /// Plugin directory holding `key/` and used to locate the image cache.
    #[arg(long, global = true, default_value = ".")]
    plugin_dir: PathBuf,

    /// Override the API host.
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a task built from formatted input tokens.
    Submit(SubmitArgs),
    /// Check the status of a task.
    Status(StatusArgs),
    /// Print a string input token.
    FormatString { node_ref: String, text: String },
    /// Print a numeric input token.
    FormatNumber {
        node_ref: String,
        value: f64,
        /// Keep one decimal digit instead of truncating.
        #[arg(long)]
        float: bool,
    },
    /// Print an image input token from a URL or a local image file.
    FormatImage(FormatImageArgs),
    /// Resize a local image.
    Resize(ResizeArgs),
    /// Add an API key to the key file.
    SaveKey { key: String },
}

#[derive(Debug, Args)]
struct SubmitArgs {
    #[arg(long, default_value_t = nodes::DEFAULT_WEB_APP_ID)]
    app_id: u32,
    /// API key; saved to the key file when given.
    #[arg(long, default_value = "")]
    api_key: String,
    /// `<node_ref>|<value>` token, up to nine.
    #[arg(long = "input")]
    inputs: Vec<String>,
    /// Write the output image here as PNG.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct StatusArgs {
    task_id: String,
    #[arg(long, default_value = "")]
    api_key: String,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct FormatImageArgs {
    #[arg(default_value = formatter::DEFAULT_IMAGE_REF)]
    node_ref: String,
    #[arg(long, conflicts_with = "file")]
    url: Option<String>,
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ResizeArgs {
    input: PathBuf,
    output: PathBuf,
    #[arg(long, default_value_t = 1536)]
    width: u32,
    #[arg(long, default_value_t = 1536)]
    height: u32,
    /// LANCZOS, BILINEAR, BICUBIC or NEAREST.
    #[arg(long, default_value = "LANCZOS")]
    method: ResampleMethod,
    /// Use the exact target size instead of keeping the aspect ratio.
    #[arg(long)]
    stretch: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("bizyair error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = BizyAirConfig::for_plugin_dir(&cli.plugin_dir);
    if let Some(base) = cli.api_base {
        config = config.api_base(base);
    }
    let client = BizyAirClient::new(config);

    match cli.command {
        Command::Submit(args) => {
            if args.inputs.len() > nodes::MAX_INPUTS {
                log::warn!(
                    "Only the first {} inputs are used, {} given",
                    nodes::MAX_INPUTS,
                    args.inputs.len()
                );
            }
            let out = nodes::submit_task(&client, args.app_id, &args.api_key, &args.inputs).await;
            println!("{}", out.response_json);
            println!("task_id: {}", out.task_id);
            println!("image_url: {}", out.image_url);
            save_output(&out.image, args.out.as_deref())?;
        }
        Command::Status(args) => {
            let out = nodes::check_task_status(&client, &args.task_id, &args.api_key).await;
            println!("{}", out.status_info);
            println!("image_url: {}", out.image_url);
            save_output(&out.image, args.out.as_deref())?;
        }
        Command::FormatString { node_ref, text } => {
            println!("{}", nodes::format_string_input(&node_ref, &text));
        }
        Command::FormatNumber {
            node_ref,
            value,
            float,
        } => {
            println!("{}", nodes::format_value_input(&node_ref, value, float));
        }
        Command::FormatImage(args) => {
            let token = match (args.url, args.file) {
                (Some(url), _) => nodes::format_image_input(&client, &args.node_ref, true, None, &url).await,
                (None, Some(file)) => {
                    let tensor = load_image(&file)?;
                    nodes::format_image_input(&client, &args.node_ref, false, Some(&tensor), "").await
                }
                (None, None) => bail!("either --url or --file is required"),
            };
            println!("{}", token);
        }
        Command::Resize(args) => {
            let tensor = load_image(&args.input)?;
            let (resized, info) =
                nodes::resize_image(&tensor, args.width, args.height, args.method, !args.stretch);
            println!("{}", info);
            save_output(&resized, Some(&args.output))?;
        }
        Command::SaveKey { key } => {
            let added = client.keys().save_key(&key).await?;
            if !added {
                println!("Key already present in {}", client.keys().path().display());
            }
        }
    }
    Ok(())
}

fn load_image(path: &Path) -> Result<ImageTensor> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    codec::decode_bytes(&bytes).with_context(|| format!("decoding {}", path.display()))
}

fn save_output(image: &ImageTensor, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if image.is_placeholder() {
        log::warn!("No image produced, writing placeholder to {}", path.display());
    }
    image
        .first_frame_rgb8()?
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
