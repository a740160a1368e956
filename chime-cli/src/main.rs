mod store;
mod ui;

use anyhow::Context;
use chime_core::{
    load_checkout, load_robot_page, ChimeClient, Config, CourseCreator, CourseForm, Decision, PaymentMethod,
    QueryParams, Route, Session, SubmissionPhase, UploadContext, UploadEvent, UploadFile, UploadStatus, UploadType,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use indicatif::ProgressBar;
use owo_colors::OwoColorize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use store::FileFlags;
use tokio::sync::mpsc;
use ui::*;

#[derive(Parser)]
#[command(name = "chime")]
#[command(about = "Chime course admin and checkout CLI", long_about = None)]
struct Cli {
    /// Where persisted flags (telegram, country) live
    #[arg(long, global = true, env = "CHIME_FLAGS_FILE")]
    flags_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a single file through the chunked assembly endpoint
    Upload {
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "type")]
        upload_type: Option<UploadType>,
    },
    /// Upload course media and create the course
    CreateCourse {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        price: String,
        #[arg(long, default_value = "")]
        usd: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, env = "CHIME_AUTHOR")]
        author: String,
        #[arg(long, default_value = chime_core::DEFAULT_CATEGORY)]
        category: String,
        #[arg(long = "type", default_value = "")]
        course_type: String,
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long = "video")]
        videos: Vec<PathBuf>,
        #[arg(long = "quiz")]
        quizzes: Vec<PathBuf>,
        #[arg(long = "live-session")]
        live_sessions: Vec<PathBuf>,
    },
    /// Load the checkout page for a user
    Checkout {
        #[arg(long, env = "CHIME_EMAIL")]
        email: Option<String>,
        /// Return-trip query string, e.g. "status=failed&message=..."
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        method: Option<PaymentMethod>,
    },
    /// Open a purchased robot
    Robot {
        slug: String,
        #[arg(long, env = "CHIME_EMAIL")]
        email: Option<String>,
    },
    /// Inspect or change persisted flags
    Flags {
        #[command(subcommand)]
        command: FlagCommands,
    },
}

#[derive(Subcommand)]
enum FlagCommands {
    /// Print all flags
    List,
    /// Set a flag
    Set { key: String, value: String },
}

fn load_config() -> anyhow::Result<Config> {
    let defaults = Config::default();
    let chunk_size = match env::var("CHIME_CHUNK_SIZE") {
        Ok(value) => value
            .parse::<u64>()
            .with_context(|| format!("parsing CHIME_CHUNK_SIZE value `{}`", value))?,
        Err(env::VarError::NotPresent) => defaults.chunk_size,
        Err(err) => return Err(err).context("reading CHIME_CHUNK_SIZE"),
    };

    let config = Config {
        upload_base_url: env::var("CHIME_UPLOAD_URL").unwrap_or(defaults.upload_base_url),
        admin_base_url: env::var("CHIME_ADMIN_URL").unwrap_or(defaults.admin_base_url),
        user_base_url: env::var("CHIME_USER_URL").unwrap_or(defaults.user_base_url),
        cart_base_url: env::var("CHIME_CART_URL").unwrap_or(defaults.cart_base_url),
        robot_base_url: env::var("CHIME_ROBOT_URL").unwrap_or(defaults.robot_base_url),
        support_channel_url: env::var("CHIME_SUPPORT_URL").unwrap_or(defaults.support_channel_url),
        chunk_size,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn open_all(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = UploadFile::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        files.push(file);
    }
    Ok(files)
}

/// Draw upload and submission events until the sender side is dropped.
async fn render_progress(mut rx: mpsc::Receiver<UploadEvent>) {
    let mut progress_bar: Option<ProgressBar> = None;
    let mut spinner: Option<ProgressBar> = None;

    while let Some(event) = rx.recv().await {
        match event.status {
            UploadStatus::Phase(SubmissionPhase::Submitting) => {
                spinner = Some(create_spinner("Creating course..."));
            }
            UploadStatus::Phase(_) => {}
            UploadStatus::FileStarted {
                file_name,
                upload_type,
                total_size,
                total_chunks,
            } => {
                println!(
                    "  {} {} ({}, {} chunk(s){})",
                    "📁".cyan(),
                    file_name.cyan(),
                    human_bytes::human_bytes(total_size as f64).yellow(),
                    total_chunks.to_string().green(),
                    upload_type.map(|t| format!(", {}", t)).unwrap_or_default()
                );
                progress_bar = Some(create_upload_pb(total_size, &file_name));
            }
            UploadStatus::ChunkCompleted { bytes, .. } => {
                if let Some(pb) = &progress_bar {
                    pb.inc(bytes);
                }
            }
            UploadStatus::FileCompleted {
                file_name,
                assembled_name,
            } => {
                if let Some(pb) = progress_bar.take() {
                    pb.finish_and_clear();
                }
                print_success(&format!("{} assembled as {}", file_name, assembled_name));
            }
            UploadStatus::Created { title } => {
                if let Some(s) = spinner.take() {
                    s.finish_and_clear();
                }
                print_success(&format!("Course '{}' created successfully!", title));
            }
            UploadStatus::Failed { error } => {
                if let Some(pb) = progress_bar.take() {
                    pb.finish_and_clear();
                }
                if let Some(s) = spinner.take() {
                    s.finish_and_clear();
                }
                print_error(&error);
            }
        }
    }
}

/// Turn a finished job into the process result so failures exit non-zero.
/// The progress renderer has already shown the details.
fn job_outcome<T>(result: chime_core::Result<T>, failure: &str) -> anyhow::Result<T> {
    result.map_err(|e| {
        log::debug!("{}: {:?}", failure, e);
        anyhow::Error::new(e).context(failure.to_string())
    })
}

/// Print a navigation decision. Returns true when the page would render.
fn print_decision(decision: &Decision) -> bool {
    match decision {
        Decision::Render => true,
        Decision::ShowInactiveModal => {
            print_warning("Your account is inactive. Contact support to reactivate it.");
            true
        }
        Decision::ExternalRedirect { url } => {
            println!("  {} Redirecting to support: {}", "↪".cyan(), url.cyan());
            false
        }
        Decision::Navigate { route, alert } => {
            if let Some(alert) = alert {
                print_error(alert);
            }
            let target = match route {
                Route::Login => "login",
                Route::Home => "home",
            };
            println!("  {} Redirecting to {} ({})", "↪".cyan(), target, route.path());
            false
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Cli::parse();

    print_banner();

    let config = load_config()?;
    let client = Arc::new(ChimeClient::new(&config).context("Failed to initialize HTTP client")?);
    let flags_path = args.flags_file.unwrap_or_else(FileFlags::default_path);

    match args.command {
        // ===================================================================
        // Upload
        // ===================================================================
        Commands::Upload {
            path,
            title,
            upload_type,
        } => {
            let file = UploadFile::open(&path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            println!("🚀 Starting upload for: {}", file.name().cyan());

            let context = UploadContext {
                course_title: title,
                upload_type,
            };
            let uploader = chime_core::ChunkedUploader::new(client, config.chunk_size);
            let (tx, rx) = mpsc::channel(256);

            let upload_handle = tokio::spawn(async move { uploader.upload(&file, &context, &tx).await });
            render_progress(rx).await;

            let assembled = job_outcome(upload_handle.await?, "Upload failed")?;
            println!("    File name: {}", assembled.file_name.green());
        }

        // ===================================================================
        // Create course
        // ===================================================================
        Commands::CreateCourse {
            title,
            price,
            usd,
            description,
            author,
            category,
            course_type,
            image,
            videos,
            quizzes,
            live_sessions,
        } => {
            let mut form = CourseForm::new(author);
            form.title = title;
            form.price = price;
            form.usd = usd;
            form.description = description;
            form.category = category;
            form.course_type = course_type;
            form.image = match image {
                Some(path) => Some(open_all(&[path]).await?.remove(0)),
                None => None,
            };
            form.videos = open_all(&videos).await?;
            form.quizzes = open_all(&quizzes).await?;
            form.live_sessions = open_all(&live_sessions).await?;

            println!(
                "🚀 Creating {} in {}",
                form.title.cyan(),
                form.category.green()
            );
            print_warning("Please do not interrupt while uploading. This may take a few minutes.");

            let creator = CourseCreator::new(client, config.chunk_size);
            let (tx, rx) = mpsc::channel(256);

            let submit_handle = tokio::spawn(async move {
                let result = creator.submit(&mut form, &tx).await;
                (result, form)
            });
            render_progress(rx).await;

            let (result, form) = submit_handle.await?;
            let created = job_outcome(
                result,
                &format!("Course '{}' was not created; re-run to retry", form.title),
            )?;
            println!(
                "    {} file(s) at {}",
                created.submission.file_count(),
                created.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            );
        }

        // ===================================================================
        // Checkout
        // ===================================================================
        Commands::Checkout {
            email,
            query,
            method,
        } => {
            let mut flags = FileFlags::load(&flags_path)?;
            let session = email.map(|email| Session { email });
            let spinner = create_spinner("Loading checkout...");
            let page = load_checkout(
                &*client,
                session.as_ref(),
                QueryParams::parse(&query),
                &mut flags,
                &config.support_channel_url,
            )
            .await
            .inspect_err(|_| spinner.finish_and_clear())?;
            spinner.finish_and_clear();

            if !print_decision(&page.decision) {
                return Ok(());
            }

            println!("{} checkout ({:?})", "🛒".cyan(), page.view);
            if let Some(details) = page.context.loader.details() {
                print_user(details, &page.context.country);
            }
            match &page.context.cart {
                Some(cart) if !cart.products.is_empty() => print_cart(cart),
                _ => println!("  Cart is empty"),
            }
            if let Some(method) = method {
                println!("  {} {}", "Payment method:".bold(), method.to_string().green());
            }
        }

        // ===================================================================
        // Robot
        // ===================================================================
        Commands::Robot { slug, email } => {
            let session = email.map(|email| Session { email });
            let spinner = create_spinner(&format!("Loading {}...", slug));
            let page = load_robot_page(&*client, session.as_ref(), &slug).await;
            spinner.finish_and_clear();

            if !print_decision(&page.decision) {
                return Ok(());
            }

            match page.robot {
                Some(robot) => {
                    println!("{} {}", "🤖".cyan(), robot.title.bold());
                    if !robot.description.is_empty() {
                        println!("  {}", robot.description);
                    }
                    println!("  {} {}", "Download:".bold(), robot.zip.green());
                    print_warning("Instructions on how to install the robot are inside the download.");
                }
                None => println!("No data available"),
            }
        }

        // ===================================================================
        // Flags
        // ===================================================================
        Commands::Flags { command } => {
            let mut flags = FileFlags::load(&flags_path)?;
            match command {
                FlagCommands::List => {
                    for (key, value) in flags.entries() {
                        println!("{}={}", key.cyan(), value);
                    }
                }
                FlagCommands::Set { key, value } => {
                    use chime_core::FlagStore;
                    flags.set(&key, &value)?;
                    print_success(&format!("{} set to {}", key, value));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::ChimeError;

    #[test]
    fn failed_job_becomes_an_error() {
        let result: chime_core::Result<()> = Err(ChimeError::AssemblyIncomplete {
            file_name: "intro.mp4".into(),
            total_chunks: 3,
        });

        let err = job_outcome(result, "Upload failed").unwrap_err();

        assert_eq!(err.to_string(), "Upload failed");
        assert!(matches!(
            err.downcast_ref::<ChimeError>(),
            Some(ChimeError::AssemblyIncomplete { total_chunks: 3, .. })
        ));
    }

    #[test]
    fn successful_job_passes_through() {
        assert_eq!(job_outcome(Ok(7), "Upload failed").unwrap(), 7);
    }
}
