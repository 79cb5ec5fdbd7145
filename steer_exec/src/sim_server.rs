//! # Simulation Server
//!
//! Abstracts over the networking side of the steering executable. The driving simulator connects
//! over a WebSocket, sends a telemetry frame every tick and waits for the steer command in reply.
//!
//! One simulator is served at a time. When it disconnects the current episode is abandoned and
//! the server waits for the next connection, with the search state carried over.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::net::SocketAddr;
use comms_if::{
    net::{NetError, WsConnection, WsListener},
    sim::{SimCommand, SimEvent, SimMessageError}
};
use log::{debug, info, trace, warn};

use crate::{
    params::ExecParams,
    steer_ctrl::{InputData, SteerCtrl, SteerCtrlError, TuningStatus}
};
use util::module::State;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network endpoint for the driving simulator.
pub struct SimServer {
    listener: WsListener
}

/// A connected simulator.
pub struct SimLink {
    conn: WsConnection
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`SimServer`]
#[derive(thiserror::Error, Debug)]
pub enum SimServerError {
    #[error("Network error: {0}")]
    NetError(NetError),

    #[error("Could not encode the command: {0}")]
    EncodeError(SimMessageError),

    #[error("Steering control failed: {0}")]
    SteerCtrlError(SteerCtrlError)
}

/// Reasons a frame produced no reply.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(SimMessageError),

    #[error("Invalid telemetry: {0}")]
    InvalidTelemetry(SteerCtrlError),

    #[error("Steering control failed: {0}")]
    SteerCtrl(SteerCtrlError)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServer {

    /// Create a new instance of the simulation server, listening on the configured address.
    ///
    /// This function will not wait for the simulator to connect before returning.
    pub async fn bind(params: &ExecParams) -> Result<Self, SimServerError> {
        let listener = WsListener::bind(&params.sim_address)
            .await
            .map_err(SimServerError::NetError)?;

        Ok(Self { listener })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Wait for a simulator to connect.
    pub async fn accept(&self) -> Result<SimLink, SimServerError> {
        let conn = self.listener.accept()
            .await
            .map_err(SimServerError::NetError)?;

        Ok(SimLink { conn })
    }
}

impl SimLink {
    /// Address of the simulator.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.conn.peer()
    }

    /// Send a command to the simulator.
    pub async fn send_command(&mut self, cmd: &SimCommand) -> Result<(), SimServerError> {
        let frame = cmd.to_frame().map_err(SimServerError::EncodeError)?;

        trace!("Sending frame: {}", frame);

        self.conn.send_text(frame)
            .await
            .map_err(SimServerError::NetError)
    }

    /// Drive the steering controller from this simulator until it disconnects.
    ///
    /// Bad frames are dropped with a warning and get no reply. On return the current episode has
    /// been abandoned, so the next simulator starts a fresh one.
    pub async fn serve(&mut self, steer_ctrl: &mut SteerCtrl) -> Result<(), SimServerError> {
        let result = self.serve_frames(steer_ctrl).await;

        steer_ctrl.restart_episode();

        result
    }

    async fn serve_frames(&mut self, steer_ctrl: &mut SteerCtrl) -> Result<(), SimServerError> {
        let mut converged_reported = false;

        while let Some(frame) = self.conn.recv_text().await {
            let frame = match frame {
                Ok(f) => f,
                Err(NetError::NonUtf8Frame) => {
                    warn!("Dropping frame: not valid UTF-8");
                    continue
                },
                Err(e) => return Err(SimServerError::NetError(e))
            };

            trace!("Recieved frame: {}", frame);

            let cmds = match handle_frame(steer_ctrl, &frame) {
                Ok(c) => c,
                Err(FrameError::SteerCtrl(e)) => return Err(SimServerError::SteerCtrlError(e)),
                Err(e) => {
                    warn!("Dropping frame: {}", e);
                    continue
                }
            };

            if steer_ctrl.tuning() == TuningStatus::Converged && !converged_reported {
                info!("Driving with tuned gains {}", steer_ctrl.gains());
                converged_reported = true;
            }

            for cmd in cmds.iter() {
                self.send_command(cmd).await?;
            }
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Process one frame from the simulator, returning the commands to send back in order.
///
/// - Telemetry runs one steering control cycle and is answered with a steer command, preceded by
///   a reset if the cycle finalised a trial.
/// - A frame without data is answered with a manual command.
/// - Frames of other protocols and other events get no reply.
/// - Malformed frames and non-finite telemetry are errors and get no reply.
pub fn handle_frame(
    steer_ctrl: &mut SteerCtrl,
    frame: &str
) -> Result<Vec<SimCommand>, FrameError> {
    let event = match SimEvent::from_frame(frame) {
        Ok(e) => e,
        Err(SimMessageError::NotAnEvent) => return Ok(vec![]),
        Err(e) => return Err(FrameError::Malformed(e))
    };

    let telemetry = match event {
        SimEvent::Telemetry(t) => t,
        SimEvent::NoPayload => return Ok(vec![SimCommand::Manual]),
        SimEvent::Other(name) => {
            debug!("Ignoring event {}", name);
            return Ok(vec![])
        }
    };

    let (output, _report) = match steer_ctrl.proc(&InputData::from(telemetry)) {
        Ok(r) => r,
        Err(e @ SteerCtrlError::InvalidInput { .. }) => return Err(FrameError::InvalidTelemetry(e)),
        Err(e) => return Err(FrameError::SteerCtrl(e))
    };

    let mut cmds = Vec::with_capacity(2);

    if output.reset {
        info!("Resetting the simulator");
        cmds.push(SimCommand::Reset);
    }

    cmds.push(SimCommand::Steer {
        steering_angle: output.steering_angle,
        throttle: output.throttle
    });

    Ok(cmds)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
