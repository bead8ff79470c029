//! A terminal client for live Q&A events.
//! This uses the same synchronisation store as any other client, so whatever
//! it shows is exactly what the server pushes.

use std::io::BufRead;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command as CliCommand};
use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use rocket::tokio::{select, sync::mpsc, task};

use qna_backend::{
    client::{ClientCache, ClientConfig, Command, Error, HttpApi, Reply, Result, SyncStore},
    model::api::{id::ApiId, question::QuestionDescription},
};

const PROGRAM_NAME: &str = "qna-cli";

const ABOUT_TEXT: &str = "Join a live Q&A event from the terminal.

The server address defaults to QNA_BASE_URL, or http://127.0.0.1:8000.
This device keeps the same computer ID across runs: QNA_COMPUTER_ID if set,
otherwise one generated on first use and saved under QNA_DATA_DIR.

EXIT CODES:
     0: Success.
     1: The server could not be reached, refused the request, or sent
        something unreadable.
     2: Bad arguments.";

const BASE_URL: &str = "BASE_URL";
const COMPUTER_ID: &str = "COMPUTER_ID";
const VERBOSE: &str = "VERBOSE";
const CODE: &str = "CODE";
const NAME: &str = "NAME";
const TEXT: &str = "TEXT";
const QUESTION_ID: &str = "QUESTION_ID";
const RETRACT: &str = "RETRACT";

/// Why a run failed.
#[derive(Debug)]
enum Failure {
    /// The command line was well-formed but its contents weren't usable.
    Usage(String),
    /// The client failed while talking to the server.
    Client(Error),
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Self::Client(err)
    }
}

/// Construct the CLI configuration.
fn cli() -> CliCommand {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    let code = Arg::new(CODE)
        .help("The event's join code")
        .action(ArgAction::Set)
        .required(true);
    let name = Arg::new(NAME)
        .long("name")
        .help("Ask under this name rather than anonymously")
        .action(ArgAction::Set);
    let question_id = Arg::new(QUESTION_ID)
        .help("ID of the question, as shown by `join`")
        .action(ArgAction::Set)
        .required(true);

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(BASE_URL)
                .long("base-url")
                .help("Where the server lives")
                .action(ArgAction::Set)
                .global(true),
        )
        .arg(
            Arg::new(COMPUTER_ID)
                .long("computer-id")
                .help("Identify this device as this rather than the saved computer ID")
                .action(ArgAction::Set)
                .global(true),
        )
        .arg(
            Arg::new(VERBOSE)
                .short('v')
                .long("verbose")
                .help("Log what the client is doing")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            CliCommand::new("join")
                .about("Watch an event's questions and ask new ones, one per line")
                .arg(code.clone())
                .arg(name.clone()),
        )
        .subcommand(
            CliCommand::new("ask")
                .about("Ask a single question")
                .arg(code.clone())
                .arg(
                    Arg::new(TEXT)
                        .help("The question")
                        .action(ArgAction::Set)
                        .required(true),
                )
                .arg(name),
        )
        .subcommand(
            CliCommand::new("vote")
                .about("Vote for a question")
                .arg(code.clone())
                .arg(question_id.clone())
                .arg(
                    Arg::new(RETRACT)
                        .long("retract")
                        .help("Take the vote back instead")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            CliCommand::new("withdraw")
                .about("Withdraw a question you asked")
                .arg(code)
                .arg(question_id),
        )
}

/// Send all logging to stderr, keeping stdout for the questions.
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{h({l})} {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));
    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("Failed to initialise logging: {e}");
            }
        }
        Err(e) => eprintln!("Invalid logging config: {e}"),
    }
}

/// One line per question.
fn format_question(question: &QuestionDescription) -> String {
    format!(
        "{}[{:>3}] {} ({}) {}",
        if question.highlighted { "*" } else { " " },
        question.votes,
        question.text,
        question.author,
        question.id
    )
}

fn print_event(cache: &ClientCache) {
    let Some(event) = &cache.event else {
        return;
    };
    println!("== {} ({}) ==", event.name, event.code);
    if event.questions.is_empty() {
        println!("No questions yet.");
    }
    for question in &event.questions {
        println!("{}", format_question(question));
    }
}

/// Select the event with the given join code.
async fn select_event(store: &Arc<SyncStore<HttpApi>>, code: &str) -> Result<ApiId> {
    let event_id = match store
        .dispatch(Command::FetchEventIdByCode(code.to_string()))
        .await?
    {
        Reply::EventId(event_id) => event_id,
        _ => return Err(Error::NoEvent),
    };
    store.dispatch(Command::SetEventId(event_id)).await?;
    Ok(event_id)
}

/// Print every update until stdin closes, asking each line as a question.
async fn watch(store: &Arc<SyncStore<HttpApi>>, name: Option<String>) -> Result<()> {
    let _handle = match store.dispatch(Command::JoinEvent).await? {
        Reply::Joined(handle) => handle,
        _ => return Err(Error::Push("join did not subscribe".to_string())),
    };

    let (tx, mut lines) = mpsc::channel::<String>(16);
    task::spawn_blocking(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("Failed to read stdin: {e}");
                    break;
                }
            }
        }
    });

    let mut changes = store.watch();
    let mut shown = changes.borrow_and_update().clone();
    print_event(&shown);
    loop {
        select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                // Loading flips and session changes don't need a reprint.
                let snapshot = changes.borrow_and_update().clone();
                if snapshot.event != shown.event {
                    print_event(&snapshot);
                    shown = snapshot;
                }
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    break;
                };
                let question = line.trim().to_string();
                if question.is_empty() {
                    continue;
                }
                let command = Command::SubmitQuestion {
                    question,
                    name: name.clone(),
                };
                if let Err(e) = store.dispatch(command).await {
                    eprintln!("Could not ask that: {e}");
                }
            }
        }
    }
    Ok(())
}

/// Client configuration, with command line overrides applied.
fn client_config(args: &ArgMatches) -> Result<ClientConfig> {
    let mut config = ClientConfig::load()?;
    if let Some(base_url) = args.get_one::<String>(BASE_URL) {
        config.base_url = base_url.clone();
    }
    if let Some(computer_id) = args.get_one::<String>(COMPUTER_ID) {
        config.computer_id = Some(computer_id.clone());
    }
    Ok(config)
}

async fn execute(args: &ArgMatches) -> std::result::Result<(), Failure> {
    // Check the arguments before anything touches the network.
    let question_id = match args.subcommand() {
        Some(("vote" | "withdraw", sub)) => Some(parse_question_id(sub)?),
        _ => None,
    };

    let config = client_config(args)?;
    let computer_id = config.computer_id()?;
    let api = HttpApi::new(&config.base_url)?;
    let store = Arc::new(SyncStore::with_backoff(api, config.backoff));
    store.bootstrap(computer_id).await?;

    match (args.subcommand(), question_id) {
        (Some(("join", sub)), _) => {
            let code = sub.get_one::<String>(CODE).map_or("", String::as_str);
            select_event(&store, code).await?;
            watch(&store, sub.get_one::<String>(NAME).cloned()).await?;
        }
        (Some(("ask", sub)), _) => {
            let code = sub.get_one::<String>(CODE).map_or("", String::as_str);
            select_event(&store, code).await?;
            let command = Command::SubmitQuestion {
                question: sub.get_one::<String>(TEXT).cloned().unwrap_or_default(),
                name: sub.get_one::<String>(NAME).cloned(),
            };
            if let Reply::Question(question) = store.dispatch(command).await? {
                println!("{}", format_question(&question));
            }
        }
        (Some(("vote", sub)), Some(question_id)) => {
            let code = sub.get_one::<String>(CODE).map_or("", String::as_str);
            select_event(&store, code).await?;
            let command = Command::Vote {
                question_id,
                vote: !sub.get_flag(RETRACT),
            };
            if let Reply::Question(question) = store.dispatch(command).await? {
                println!("{}", format_question(&question));
            }
        }
        (Some(("withdraw", sub)), Some(question_id)) => {
            let code = sub.get_one::<String>(CODE).map_or("", String::as_str);
            select_event(&store, code).await?;
            store
                .dispatch(Command::WithdrawQuestion(question_id))
                .await?;
            println!("Withdrawn.");
        }
        _ => {}
    }
    Ok(())
}

fn parse_question_id(args: &ArgMatches) -> std::result::Result<ApiId, Failure> {
    let raw = args.get_one::<String>(QUESTION_ID).map_or("", String::as_str);
    raw.parse()
        .map_err(|_| Failure::Usage(format!("'{raw}' is not a question ID")))
}

/// Run the CLI with the given arguments, returning the exit code.
fn run(args: &ArgMatches) -> u8 {
    init_logging(args.get_flag(VERBOSE));
    match rocket::execute(execute(args)) {
        Ok(()) => 0,
        Err(Failure::Usage(msg)) => {
            eprintln!("{msg}");
            2
        }
        Err(Failure::Client(e)) => {
            eprintln!("{e}");
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
