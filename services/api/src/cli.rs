use crate::demo::{run_demo, run_survey_status, DemoArgs, SurveyStatusArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use wacho::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Wacho",
    about = "Run the festival survey service or walk through a survey lifecycle from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect the survey window for a festival end date
    Survey {
        #[command(subcommand)]
        command: SurveyCommand,
    },
    /// Run an end-to-end demo: questions, responses, statistics and badge closure
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum SurveyCommand {
    /// Print the availability state and closing time of a survey
    Status(SurveyStatusArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Survey {
            command: SurveyCommand::Status(args),
        } => {
            run_survey_status(args);
            Ok(())
        }
        Command::Demo(args) => run_demo(args).await,
    }
}
