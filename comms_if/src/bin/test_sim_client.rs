//! Simple simulator client test
//!
//! Stands in for the driving simulator: a kinematic bicycle model following a straight path
//! along the x axis. Telemetry is sent to the steering executable, which replies with steer and
//! reset commands.

use comms_if::{
    net::WsConnection,
    sim::{SimCommand, Telemetry}
};
use std::time::Duration;
use structopt::StructOpt;

/// Command line options
#[derive(Debug, StructOpt)]
#[structopt(name = "test_sim_client", about = "Toy driving simulator for the steering exec")]
struct Opt {
    /// WebSocket URL of the steering executable
    #[structopt(short, long, default_value = "ws://localhost:4567/socket.io/?EIO=4&transport=websocket")]
    url: String,

    /// Simulation step in seconds
    #[structopt(long, default_value = "0.05")]
    dt: f64,

    /// Constant steering offset of the vehicle, in normalised steering units
    #[structopt(long, default_value = "0.02")]
    steering_bias: f64,

    /// Initial lateral offset from the path in metres
    #[structopt(long, default_value = "0.75")]
    initial_cte: f64
}

/// Vehicle wheel base in metres
const WHEEL_BASE_M: f64 = 2.5;

/// Steering angle for a normalised steering demand of 1
const MAX_STEER_RAD: f64 = 25.0 * std::f64::consts::PI / 180.0;

/// Speed reached at full throttle, in metres per second
const MAX_SPEED_MS: f64 = 40.0;

/// Vehicle state
#[derive(Debug, Clone, Copy)]
struct Vehicle {
    y_m: f64,
    heading_rad: f64,
    speed_ms: f64
}

impl Vehicle {
    fn new(initial_cte: f64) -> Self {
        Self {
            y_m: initial_cte,
            heading_rad: 0.0,
            speed_ms: 0.0
        }
    }

    fn step(&mut self, steering: f64, throttle: f64, bias: f64, dt: f64) {
        let steer_rad = (steering + bias).max(-1.0).min(1.0) * MAX_STEER_RAD;

        // First order lag towards the throttle speed
        self.speed_ms += (throttle * MAX_SPEED_MS - self.speed_ms) * 0.5 * dt;

        self.heading_rad += self.speed_ms / WHEEL_BASE_M * steer_rad.tan() * dt;
        self.y_m += self.speed_ms * self.heading_rad.sin() * dt;
    }

    fn telemetry(&self) -> Telemetry {
        Telemetry {
            cte: self.y_m,
            speed: self.speed_ms,
            steering_angle: None
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {

    let opt = Opt::from_args();

    // Reconnect whenever the exec goes away
    loop {
        let mut conn = match WsConnection::connect(&opt.url).await {
            Ok(c) => c,
            Err(e) => {
                println!("Waiting for the steering exec: {}", e);
                tokio::time::sleep(Duration::from_millis(1000)).await;
                continue
            }
        };

        println!("Connected to {}", opt.url);

        if let Err(e) = drive(&mut conn, &opt).await {
            println!("Connection lost: {}", e);
        }

        tokio::time::sleep(Duration::from_millis(1000)).await;
    }
}

/// Run the vehicle until the connection drops.
async fn drive(conn: &mut WsConnection, opt: &Opt) -> Result<(), Box<dyn std::error::Error>> {
    let mut vehicle = Vehicle::new(opt.initial_cte);
    let mut steering = 0.0;
    let mut throttle = 0.0;
    let mut tick: u64 = 0;

    loop {
        // Send the telemetry for this tick
        conn.send_text(vehicle.telemetry().to_frame()?).await?;

        // Read commands until the steer (or manual) reply for this tick arrives
        loop {
            let frame = match conn.recv_text().await {
                Some(Ok(s)) => s,
                Some(Err(e)) => return Err(e.into()),
                None => return Err("closed by the steering exec".into())
            };

            match SimCommand::from_frame(&frame) {
                Ok(SimCommand::Steer { steering_angle, throttle: t }) => {
                    steering = steering_angle;
                    throttle = t;
                    break
                },
                Ok(SimCommand::Reset) => {
                    println!("[{:8}] reset", tick);
                    vehicle = Vehicle::new(opt.initial_cte);
                },
                Ok(SimCommand::Manual) => break,
                Err(e) => println!("could not parse reply {:?}: {}", frame, e)
            }
        }

        vehicle.step(steering, throttle, opt.steering_bias, opt.dt);
        tick += 1;
    }
}
