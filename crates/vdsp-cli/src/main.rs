//! `vdsp` command-line control surface for VelocityDRIVE-SP devices (§6).
//!
//! Every subcommand but `list-ports` opens its own connection: there is no
//! persisted state across invocations (§6 "Persisted state: none required
//! by the core"), so `<port>` is given once per command.
//!
//! # Usage
//!
//! ```bash
//! vdsp list-ports
//! vdsp connect /dev/ttyACM0
//! vdsp info /dev/ttyACM0
//! vdsp get /dev/ttyACM0 /ietf-interfaces:interfaces
//! vdsp set /dev/ttyACM0 /mchp-velocitysp-port:config/port[name='1']/speed '"1000"'
//! ```

mod json;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vdsp_client::{Config, FacadeError, ManagementFacade};
use vdsp_core::CoreError;
use vdsp_serial::{SerialTransport, SystemEnv};

/// VelocityDRIVE-SP host control CLI.
#[derive(Parser, Debug)]
#[command(name = "vdsp")]
#[command(about = "Control surface for VelocityDRIVE-SP devices")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports the host currently sees.
    ListPorts,
    /// Open the connection handshake and report success.
    Connect {
        /// Serial port device path, e.g. `/dev/ttyACM0`.
        port: String,
    },
    /// Identify the device: YANG library checksum, interface count, model.
    Info {
        /// Serial port device path.
        port: String,
    },
    /// `GET` a YANG instance path, printing the result as JSON.
    Get {
        /// Serial port device path.
        port: String,
        /// YANG instance path, e.g. `/ietf-interfaces:interfaces`.
        path: String,
    },
    /// `PUT` a JSON-encoded value at a YANG instance path.
    Set {
        /// Serial port device path.
        port: String,
        /// YANG instance path.
        path: String,
        /// JSON literal to encode as the new value.
        value: String,
    },
    /// `DELETE` a YANG instance path.
    Delete {
        /// Serial port device path.
        port: String,
        /// YANG instance path.
        path: String,
    },
    /// Invoke a YANG `rpc`/`action` path with optional JSON parameters.
    Rpc {
        /// Serial port device path.
        port: String,
        /// YANG rpc/action path.
        path: String,
        /// JSON literal carrying the rpc's input parameters.
        params: Option<String>,
    },
    /// Stream a firmware image to the device.
    Firmware {
        /// Serial port device path.
        port: String,
        /// Path to the firmware image on disk.
        file: String,
    },
}

impl Command {
    /// The serial port this command targets, `None` for `list-ports`.
    fn port(&self) -> Option<&str> {
        match self {
            Self::ListPorts => None,
            Self::Connect { port }
            | Self::Info { port }
            | Self::Get { port, .. }
            | Self::Set { port, .. }
            | Self::Delete { port, .. }
            | Self::Rpc { port, .. }
            | Self::Firmware { port, .. } => Some(port.as_str()),
        }
    }
}

/// Exit codes match §6: 0 success, 1 usage, 2 transport, 3 protocol error, 4
/// device error.
const EXIT_USAGE: i32 = 1;
const EXIT_TRANSPORT: i32 = 2;
const EXIT_PROTOCOL: i32 = 3;
const EXIT_DEVICE: i32 = 4;

/// Errors `run_command` can surface, beyond what the facade itself raises.
#[derive(thiserror::Error, Debug)]
enum CliError {
    /// The facade reported a connection, protocol or device-level failure.
    #[error(transparent)]
    Facade(#[from] FacadeError),

    /// The user supplied a malformed argument (bad JSON, unreadable file).
    #[error("{0}")]
    Usage(String),
}

fn exit_code(err: &CliError) -> i32 {
    match err {
        CliError::Usage(_) => EXIT_USAGE,
        CliError::Facade(FacadeError::Transport(_)) => EXIT_TRANSPORT,
        CliError::Facade(FacadeError::Sid(_)) => EXIT_PROTOCOL,
        CliError::Facade(FacadeError::Core(core)) => match core {
            CoreError::TransportDown | CoreError::Timeout { .. } => EXIT_TRANSPORT,
            CoreError::ClientError { .. } | CoreError::ServerError { .. } | CoreError::Reset { .. } => {
                EXIT_DEVICE
            },
            CoreError::ParseError(_)
            | CoreError::UnknownSid(_)
            | CoreError::Cancelled
            | CoreError::InvalidState { .. } => EXIT_PROTOCOL,
        },
    }
}

#[allow(clippy::print_stdout)]
fn print_line(line: &str) {
    println!("{line}");
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    std::process::exit(run(args.command).await);
}

async fn run(command: Command) -> i32 {
    let Some(port) = command.port() else {
        return run_list_ports();
    };

    let transport = match SerialTransport::open(port) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "failed to open serial port");
            return EXIT_TRANSPORT;
        },
    };

    let mut facade = ManagementFacade::new(transport, SystemEnv::new(), Config::default());

    if let Err(e) = facade.connect().await {
        tracing::error!(error = %e, "connection handshake failed");
        return exit_code(&CliError::Facade(e));
    }

    match run_command(&mut facade, command).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            exit_code(&e)
        },
    }
}

fn run_list_ports() -> i32 {
    match vdsp_serial::list_ports() {
        Ok(ports) => {
            for port in ports {
                print_line(&port.name);
            }
            0
        },
        Err(e) => {
            tracing::error!(error = %e, "failed to list serial ports");
            EXIT_TRANSPORT
        },
    }
}

async fn run_command(
    facade: &mut ManagementFacade<SerialTransport, SystemEnv>,
    command: Command,
) -> Result<(), CliError> {
    match command {
        Command::ListPorts => unreachable!("handled in run() before a port is opened"),
        Command::Connect { .. } => {
            print_line("connected");
            Ok(())
        },
        Command::Info { .. } => {
            let identify = facade.identify().await?;
            print_line(&format!(
                "model={:?} checksum={} interfaces={}",
                identify.model, identify.checksum, identify.interface_count
            ));
            Ok(())
        },
        Command::Get { path, .. } => {
            let value = facade.yang_get(&path).await?;
            print_line(&json::render(&value));
            Ok(())
        },
        Command::Set { path, value, .. } => {
            let parsed =
                json::parse(&value).map_err(|e| CliError::Usage(format!("malformed JSON value: {e}")))?;
            facade.yang_set(&path, &parsed).await?;
            Ok(())
        },
        Command::Delete { path, .. } => {
            facade.yang_delete(&path).await?;
            Ok(())
        },
        Command::Rpc { path, params, .. } => {
            let parsed = params
                .as_deref()
                .map(json::parse)
                .transpose()
                .map_err(|e| CliError::Usage(format!("malformed JSON params: {e}")))?;
            let result = facade.yang_rpc(&path, parsed.as_ref()).await?;
            print_line(&json::render(&result));
            Ok(())
        },
        Command::Firmware { file, .. } => {
            let blob = std::fs::read(&file)
                .map_err(|e| CliError::Usage(format!("failed to read {file}: {e}")))?;
            facade
                .firmware_update(&blob, |sent, total| {
                    tracing::info!(sent, total, "firmware block acknowledged");
                })
                .await?;
            Ok(())
        },
    }
}
