//! Main steering executable entry point.
//!
//! # Architecture
//!
//! The executable serves a WebSocket and waits for the driving simulator to connect, then for
//! every telemetry frame:
//!
//!     - Steering control processing:
//!         - Trial evidence collection and scoring
//!         - Gain search step and gain update
//!         - PID steering correction
//!     - Reset command, if the trial was finalised
//!     - Steer command
//!
//! A disconnection of the simulator abandons the current episode and the executable waits for
//! the next connection.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use structopt::StructOpt;
use color_eyre::{Report, eyre::WrapErr};

// Internal
use steer_lib::{
    params::ExecParams,
    sim_server::{SimServer, SimServerError},
    steer_ctrl::SteerCtrl
};
use util::{
    host,
    module::State,
    logger::logger_init,
    session::Session
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Command line options
#[derive(Debug, StructOpt)]
#[structopt(name = "steer_exec", about = "PID steering controller with online gain tuning")]
struct Opt {
    /// Steering control parameter file, relative to the params directory
    #[structopt(short, long, default_value = "steer_ctrl.toml")]
    params: String,

    /// Drive with the initial gains, without tuning
    #[structopt(long)]
    no_tune: bool
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Report> {

    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "steer_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    let exec_params: ExecParams = util::params::load(
        "steer_exec.toml"
    ).wrap_err("Could not load exec params")?;

    // Initialise logger
    let log_level = exec_params.log_level_filter()
        .wrap_err("Invalid log level in exec params")?;
    logger_init(log_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Steering Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut steer_ctrl = SteerCtrl::default();
    steer_ctrl.init(opt.params.clone(), &session)
        .wrap_err("Failed to initialise SteerCtrl")?;

    if opt.no_tune {
        steer_ctrl.disable_tuning();
    }

    info!("SteerCtrl init complete, tuning {:?}", steer_ctrl.tuning());

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let sim_server = SimServer::bind(&exec_params)
        .await
        .wrap_err("Failed to initialise SimServer")?;

    info!("SimServer listening on {}", exec_params.sim_address);

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        let mut link = match sim_server.accept().await {
            Ok(l) => l,
            Err(e) => {
                warn!("Simulator could not connect: {}", e);
                continue
            }
        };

        match link.peer() {
            Some(p) => info!("Simulator connected from {}", p),
            None => info!("Simulator connected")
        }

        match link.serve(&mut steer_ctrl).await {
            Ok(()) => warn!("Simulator disconnected"),
            Err(e @ SimServerError::SteerCtrlError(_)) => return Err(e)
                .wrap_err("Error during SteerCtrl processing"),
            Err(e) => warn!("Simulator connection lost: {}", e)
        }
    }
}
