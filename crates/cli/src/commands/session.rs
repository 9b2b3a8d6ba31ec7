//! Commands that talk to a reader

use std::io::BufRead;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use siths_card_core::ReaderEvent;
use siths_manager::{ManagerConfig, SithsManager, SithsManagerState};
use siths_transport_pcsc::{PcscConfig, PcscDriver, PcscMonitor};
use tracing::{debug, info};

use crate::utils::print_certificate;

/// List all available readers
pub(crate) fn list_command() -> Result<(), Box<dyn std::error::Error>> {
    let readers = PcscDriver::list_readers()?;

    if readers.is_empty() {
        println!("No readers found!");
        return Ok(());
    }

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        println!("{}. {}", i + 1, reader);
    }

    Ok(())
}

/// Start a session over the PC/SC reader, fed by a reader monitor
fn start_session(
    pcsc_config: PcscConfig,
    manager_config: ManagerConfig,
) -> Result<(SithsManager, PcscMonitor), Box<dyn std::error::Error>> {
    let manager =
        SithsManager::with_config(PcscDriver::new(pcsc_config.clone()), manager_config)?;

    let events = manager.event_sender();
    let mut monitor = PcscMonitor::create(pcsc_config)?;
    monitor.monitor(move |event| {
        events.send(event);
    })?;

    Ok((manager, monitor))
}

/// Print every state change until Enter is pressed
pub(crate) fn watch_command(
    pcsc_config: PcscConfig,
    manager_config: ManagerConfig,
    log: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (manager, monitor) = start_session(pcsc_config, manager_config)?;

    manager.subscribe_state(|state: SithsManagerState| {
        println!("State: {state}");
        for certificate in state.certificates() {
            print_certificate(certificate);
        }
    });
    if log {
        manager.subscribe_log(|line: String| println!("  {line}"));
    }

    manager.notify(ReaderEvent::AppForeground);
    info!("Watching reader, press Enter to stop");

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    drop(monitor);
    manager.notify(ReaderEvent::AppBackground);
    Ok(())
}

/// Wait for a card and print what was read from it
pub(crate) fn read_command(
    pcsc_config: PcscConfig,
    manager_config: ManagerConfig,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let (manager, _monitor) = start_session(pcsc_config, manager_config)?;

    let (sender, states) = unbounded();
    manager.subscribe_state(move |state: SithsManagerState| {
        let _ = sender.send(state);
    });
    manager.notify(ReaderEvent::AppForeground);

    let deadline = Instant::now() + timeout;
    let mut last = manager.state();
    while let Ok(state) = states.recv_deadline(deadline) {
        debug!(%state, "Session state");
        let done = is_card_outcome(&state);
        last = state;
        if done {
            break;
        }
    }

    match &last {
        SithsManagerState::CardInserted(certificates) => {
            println!("Found {} certificate(s):", certificates.len());
            for certificate in certificates {
                print_certificate(certificate);
            }
            Ok(())
        }
        SithsManagerState::Error(error) => Err(error.clone().into()),
        state => {
            println!("{state}");
            Ok(())
        }
    }
}

/// States that end a one-shot read
const fn is_card_outcome(state: &SithsManagerState) -> bool {
    matches!(
        state,
        SithsManagerState::CardInserted(_)
            | SithsManagerState::CardWithoutCertificatesInserted
            | SithsManagerState::UnknownCardInserted
            | SithsManagerState::Error(_)
    )
}
