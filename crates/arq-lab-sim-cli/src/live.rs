//! Wall-clock paced runs driven by commands on stdin.
//!
//! The engine itself stays single-threaded: this loop is the only caller, so
//! handler execution never interleaves with a command.

use anyhow::{Result, bail};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{info, warn};

use arq_lab_abstract::RunConfig;
use arq_lab_simulator::{ProtocolEngine, SimulationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Pause,
    Resume,
    Next,
    Reset,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "start" | "s" => Some(Command::Start),
            "pause" | "p" => Some(Command::Pause),
            "resume" | "r" => Some(Command::Resume),
            "next" | "n" => Some(Command::Next),
            "reset" => Some(Command::Reset),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Wall-clock instant at which a queued simulated time is due.
fn wall_deadline(now: Instant, sim_now: u64, due: u64, speed: f64) -> Instant {
    let delta_ms = due.saturating_sub(sim_now) as f64 / speed;
    now + Duration::from_secs_f64(delta_ms / 1000.0)
}

/// Maps the head of the event queue to a wall-clock wake-up.
///
/// A deadline survives commands for as long as the head event is unchanged.
/// Pausing stores the time still left, and resuming waits only that long.
#[derive(Debug)]
struct Pacer {
    speed: f64,
    // (simulated time, wall-clock instant) of the event being waited on.
    deadline: Option<(u64, Instant)>,
    // (simulated time, time left) captured by a pause.
    held: Option<(u64, Duration)>,
}

impl Pacer {
    fn new(speed: f64) -> Self {
        Self {
            speed,
            deadline: None,
            held: None,
        }
    }

    fn wake(&mut self, due: u64, sim_now: u64, now: Instant) -> Instant {
        let at = match (self.deadline, self.held.take()) {
            (Some((t, at)), _) if t == due => at,
            (_, Some((t, remaining))) if t == due => now + remaining,
            // The previous deadline was just processed; pace from it, not from now.
            (Some((t, at)), _) if t == sim_now => wall_deadline(at, t, due, self.speed),
            _ => wall_deadline(now, sim_now, due, self.speed),
        };
        self.deadline = Some((due, at));
        at
    }

    fn hold(&mut self, now: Instant) {
        if let Some((t, at)) = self.deadline.take() {
            self.held = Some((t, at.saturating_duration_since(now)));
        }
    }

    fn clear(&mut self) {
        self.deadline = None;
        self.held = None;
    }
}

pub async fn run(config: RunConfig, speed: f64, max_time: u64) -> Result<SimulationReport> {
    let mut engine = ProtocolEngine::new();
    engine.start(config.clone())?;
    info!("Live mode. Commands: start, pause, resume, next, reset, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut pacer = Pacer::new(speed);

    loop {
        if engine.is_finished() {
            break;
        }

        let due = if engine.is_running() && !engine.is_paused() {
            engine.peek_next_event_time()
        } else {
            None
        };
        if let Some(t) = due
            && t > max_time
        {
            bail!("Simulation exceeded {} ms of simulated time", max_time);
        }
        let wake = due.map(|t| pacer.wake(t, engine.current_time(), Instant::now()));

        if !stdin_open && wake.is_none() {
            // Nobody left to issue commands: release whatever is holding the run.
            if engine.is_awaiting_step() {
                engine.advance_step()?;
            } else if engine.is_paused() {
                engine.resume();
            } else if !engine.is_running() {
                engine.start(config.clone())?;
            } else {
                warn!("Run stalled with no pending events");
                break;
            }
            continue;
        }

        tokio::select! {
            _ = async {
                match wake {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                engine.step();
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match Command::parse(&line) {
                            Some(Command::Quit) => {
                                info!("Quit at {} ms", engine.current_time());
                                break;
                            }
                            Some(command) => apply(&mut engine, &mut pacer, &config, command)?,
                            None => warn!("Unknown command: {}", line.trim()),
                        }
                    }
                    None => {
                        info!("stdin closed, running to completion");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    Ok(engine.export_report())
}

fn apply(
    engine: &mut ProtocolEngine,
    pacer: &mut Pacer,
    config: &RunConfig,
    command: Command,
) -> Result<()> {
    match command {
        Command::Start => {
            if engine.is_running() {
                warn!("A run is already in progress; use reset first");
            } else {
                pacer.clear();
                engine.start(config.clone())?;
            }
        }
        Command::Pause => {
            if engine.pause() {
                pacer.hold(Instant::now());
            } else {
                warn!("Nothing to pause");
            }
        }
        Command::Resume => engine.resume(),
        Command::Next => {
            if let Err(e) = engine.advance_step() {
                warn!("{}", e);
            }
        }
        Command::Reset => {
            pacer.clear();
            engine.reset();
            info!("Type 'start' to run again");
        }
        Command::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(Command::parse("pause"), Some(Command::Pause));
        assert_eq!(Command::parse(" N \n"), Some(Command::Next));
        assert_eq!(Command::parse("exit"), Some(Command::Quit));
        assert_eq!(Command::parse("jump"), None);
    }

    #[test]
    fn deadline_scales_with_speed() {
        let now = Instant::now();
        let at = wall_deadline(now, 1000, 3000, 4.0);
        assert_eq!(at - now, Duration::from_millis(500));
        assert_eq!(wall_deadline(now, 3000, 1000, 1.0), now);
    }

    #[test]
    fn resume_waits_only_for_the_remaining_delay() {
        let start = Instant::now();
        let mut pacer = Pacer::new(1.0);
        assert_eq!(pacer.wake(1000, 0, start), start + Duration::from_millis(1000));

        pacer.hold(start + Duration::from_millis(900));
        let resumed = start + Duration::from_secs(5);
        assert_eq!(
            pacer.wake(1000, 0, resumed),
            resumed + Duration::from_millis(100)
        );
    }

    #[test]
    fn unchanged_head_keeps_its_deadline() {
        let start = Instant::now();
        let mut pacer = Pacer::new(1.0);
        let first = pacer.wake(1000, 0, start);
        assert_eq!(pacer.wake(1000, 0, start + Duration::from_millis(300)), first);
    }

    #[test]
    fn next_event_is_paced_from_previous_deadline() {
        let start = Instant::now();
        let mut pacer = Pacer::new(2.0);
        assert_eq!(pacer.wake(2000, 0, start), start + Duration::from_secs(1));
        // Woken a little late; the next wake-up does not inherit the lag.
        let late = start + Duration::from_millis(1020);
        assert_eq!(
            pacer.wake(3000, 2000, late),
            start + Duration::from_millis(1500)
        );
    }

    #[test]
    fn cleared_pacer_starts_from_now() {
        let start = Instant::now();
        let mut pacer = Pacer::new(1.0);
        pacer.wake(1000, 0, start);
        pacer.hold(start + Duration::from_millis(200));
        pacer.clear();
        let now = start + Duration::from_secs(1);
        assert_eq!(pacer.wake(1000, 0, now), now + Duration::from_millis(1000));
    }
}
