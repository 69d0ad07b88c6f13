use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::model::{GET_DESIRED_PROPERTIES, GET_REPORTED_PROPERTIES};
use crate::util::console::{Console, Level};

/// An operation requested from the menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `T`
    UpdateTwin,
    /// `Q <query>`
    QueryDevices(String),
    /// `I <method>`
    InvokeMethod(String),
    /// `E`
    ExportDevices,
    /// `U <condition>`
    StartUpdateJob(String),
    /// `S <container>`
    ContainerSas(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Quit,
    Command(Command),
    Unrecognized,
}

impl Input {
    /// Interpret one line of user input, without its line terminator.
    ///
    /// Commands are a single case-insensitive letter. Those taking an
    /// argument need a space after the letter and a non-blank remainder,
    /// which is trimmed.
    pub fn parse(line: &str) -> Input {
        if line.trim().is_empty() {
            return Input::Quit;
        }

        if line.eq_ignore_ascii_case("t") {
            return Input::Command(Command::UpdateTwin);
        }
        if line.eq_ignore_ascii_case("e") {
            return Input::Command(Command::ExportDevices);
        }

        let Some((head, rest)) = line.split_at_checked(2) else {
            return Input::Unrecognized;
        };
        let argument = rest.trim();
        if argument.is_empty() {
            return Input::Unrecognized;
        }
        let argument = argument.to_owned();

        match head.to_ascii_uppercase().as_str() {
            "Q " => Input::Command(Command::QueryDevices(argument)),
            "I " => Input::Command(Command::InvokeMethod(argument)),
            "U " => Input::Command(Command::StartUpdateJob(argument)),
            "S " => Input::Command(Command::ContainerSas(argument)),
            _ => Input::Unrecognized,
        }
    }
}

/// What the menu can do. Implementations report their own failures to
/// the console, so every action always returns to the menu.
#[async_trait]
pub trait Actions: Send + Sync {
    async fn update_twin(&self);
    async fn query_devices(&self, query: &str);
    async fn invoke_method(&self, method_name: &str);
    async fn export_devices(&self);
    async fn start_update_job(&self, query_condition: &str);
    async fn container_sas(&self, container: &str);
}

fn print_prompt(console: &Console) {
    let lines = [
        "*** Press 'T' to send a twin update ***".to_owned(),
        "*** Press 'Q' followed by a query to find devices ***".to_owned(),
        format!(
            "*** Press 'I' followed by a method name ({GET_DESIRED_PROPERTIES} or {GET_REPORTED_PROPERTIES}) to invoke a direct method ***"
        ),
        "*** Press 'E' to export all devices to blob storage ***".to_owned(),
        "*** Press 'U' followed by a device query condition, to launch a twin update job ***"
            .to_owned(),
        "*** Press 'S' followed by a blob container name, to get a blob URI including SAS ***"
            .to_owned(),
        "*** Press ENTER to quit ***".to_owned(),
    ];

    console.blank();
    for line in lines {
        console.write(line, Level::Plain);
    }
    console.blank();
}

/// Read commands from `input` and run them until the user quits.
///
/// After a twin update the loop pauses for `twin_settle` so the device's
/// desired property handler gets to print first.
pub async fn run<R, A>(
    input: R,
    actions: &A,
    console: &Console,
    twin_settle: Duration,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    A: Actions + ?Sized,
{
    let mut lines = input.lines();

    loop {
        print_prompt(console);

        let Some(line) = lines.next_line().await? else {
            debug!("end of input");
            break;
        };

        match Input::parse(&line) {
            Input::Quit => break,
            Input::Command(command) => {
                debug!(?command, "running command");
                match command {
                    Command::UpdateTwin => {
                        actions.update_twin().await;
                        tokio::time::sleep(twin_settle).await;
                    }
                    Command::QueryDevices(query) => actions.query_devices(&query).await,
                    Command::InvokeMethod(name) => actions.invoke_method(&name).await,
                    Command::ExportDevices => actions.export_devices().await,
                    Command::StartUpdateJob(condition) => {
                        actions.start_update_job(&condition).await
                    }
                    Command::ContainerSas(container) => actions.container_sas(&container).await,
                }
            }
            Input::Unrecognized => console.write(
                "*** Sorry, I didn't understand that input ***",
                Level::Error,
            ),
        }
    }

    Ok(())
}
