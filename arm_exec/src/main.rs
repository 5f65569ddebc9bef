//! Main arm executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Connect to the arm, which starts the dispatcher thread
//!     - Main loop:
//!         - Get the TCs due from the script
//!         - Execute them against arm control
//!     - Shut the dispatcher down once the script ends
//!
//! The dispatcher streams the motion targets to the arm in the background, the main loop only
//! changes the targets.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use structopt::StructOpt;

// Internal
use arm_lib::{arm_ctrl::ArmCtrl, params::ArmExecParams, sim_arm::SimArm};
use util::{
    logger::{logger_init, LevelFilter},
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line arguments.
#[derive(Debug, StructOpt)]
#[structopt(name = "arm_exec", about = "Replays a telecommand script on the arm")]
struct Opts {
    /// Path to the script to run
    #[structopt(parse(from_os_str))]
    script: PathBuf,

    /// Minimum log level, one of info, debug or trace
    #[structopt(short, long, default_value = "debug")]
    log_level: LevelFilter,

    /// Executable parameter file, relative to the params directory
    #[structopt(long, default_value = "arm_exec.toml")]
    params: String,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("arm_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opts.log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Arm Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opts);

    // ---- LOAD PARAMETERS ----

    let exec_params: ArmExecParams =
        util::params::load(&opts.params).wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- LOAD SCRIPT ----

    info!("Loading script from {:?}", opts.script);

    let mut script =
        ScriptInterpreter::new(&opts.script).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} TCs\n",
        script.get_duration(),
        script.get_num_tcs()
    );

    // ---- INITIALISE ARM ----

    let driver = Arc::new(SimArm::new(&exec_params.can_interface));

    let mut arm = ArmCtrl::init(&exec_params.arm_ctrl_params, driver)
        .wrap_err("Failed to initialise ArmCtrl")?;
    info!("ArmCtrl init complete");

    arm.connect().wrap_err("Failed to connect to the arm")?;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let poll_period = arm_lib::arm_ctrl::secs(exec_params.script_poll_period_s);

    loop {
        match script.get_pending_tcs(session::get_elapsed_seconds()) {
            PendingTcs::Some(tcs) => {
                for tc in tcs.iter() {
                    debug!("Executing TC: {:?}", tc);
                    tc_processor::exec(&arm, tc);
                }
            }
            PendingTcs::None => (),
            PendingTcs::EndOfScript => {
                info!("End of script reached");
                break;
            }
        }

        thread::sleep(poll_period);
    }

    // ---- SHUTDOWN ----

    arm.shutdown();

    info!("End of execution");

    Ok(())
}
