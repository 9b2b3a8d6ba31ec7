//! Card sessions against a scripted in-memory card

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, unbounded};
use parking_lot::Mutex;
use siths_card_core::{ProtocolPreference, ReaderDriver, ReaderEvent, SlotStatus, SmartcardStatus};
use siths_manager::{
    EID_APPLICATION_ID, ManagerConfig, ProtocolError, SithsManager, SithsManagerError,
    SithsManagerState,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    match content.len() {
        len @ 0..0x80 => out.push(len as u8),
        len @ 0x80..0x100 => out.extend([0x81, len as u8]),
        len => out.extend([0x82, (len >> 8) as u8, len as u8]),
    }
    out.extend_from_slice(content);
    out
}

fn rdn(oid: &[u8], tag: u8, value: &str) -> Vec<u8> {
    tlv(0x31, &tlv(0x30, &[tlv(0x06, oid), tlv(tag, value.as_bytes())].concat()))
}

fn certificate(key_usage: u8, card_number: &str) -> Vec<u8> {
    let algorithm = tlv(
        0x30,
        &[tlv(0x06, &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x05]), vec![0x05, 0x00]]
            .concat(),
    );
    let serial: Vec<u8> = (0x01..=0x14).collect();
    let tbs = tlv(
        0x30,
        &[
            tlv(0xA0, &tlv(0x02, &[0x02])),
            tlv(0x02, &serial),
            algorithm.clone(),
            tlv(0x30, &rdn(&[0x55, 0x04, 0x03], 0x0C, "SITHS e-id Person ID 3 CA v1")),
            tlv(0x30, &[tlv(0x17, b"240101000000Z"), tlv(0x17, b"290101000000Z")].concat()),
            tlv(
                0x30,
                &[
                    rdn(&[0x55, 0x04, 0x06], 0x13, "SE"),
                    rdn(&[0x55, 0x04, 0x2A], 0x0C, "Karin"),
                    rdn(&[0x55, 0x04, 0x04], 0x0C, "Sjuksköterska"),
                    rdn(&[0x55, 0x04, 0x05], 0x13, "SE2321000016-1003"),
                ]
                .concat(),
            ),
            tlv(0x30, &[algorithm.clone(), tlv(0x03, &[0x00, 0x05, 0x00])].concat()),
            tlv(
                0xA3,
                &tlv(
                    0x30,
                    &[
                        tlv(
                            0x30,
                            &[
                                tlv(0x06, &[0x55, 0x1D, 0x0F]),
                                tlv(0x01, &[0xFF]),
                                tlv(0x04, &tlv(0x03, &[key_usage.trailing_zeros().min(7) as u8, key_usage])),
                            ]
                            .concat(),
                        ),
                        tlv(
                            0x30,
                            &[
                                tlv(0x06, &[0x2A, 0x85, 0x70, 0x22, 0x02, 0x01]),
                                tlv(0x04, &tlv(0x13, card_number.as_bytes())),
                            ]
                            .concat(),
                        ),
                    ]
                    .concat(),
                ),
            ),
        ]
        .concat(),
    );
    tlv(0x30, &[tbs, algorithm, tlv(0x03, &[0x00, 0x01, 0x02, 0x03])].concat())
}

fn padded(mut content: Vec<u8>, length: usize) -> Vec<u8> {
    content.resize(length, 0xFF);
    content
}

/// Files of a card with one authentication certificate at 3F00/4101
fn pkcs15_files(certificate: Vec<u8>) -> HashMap<[u8; 2], Vec<u8>> {
    // EF.ODF: [4] certificates at 3F00/5032
    let odf = tlv(0xA4, &tlv(0x30, &tlv(0x04, &[0x3F, 0x00, 0x50, 0x32])));
    // EF.CDF: one entry with its value path at 3F00/4101
    let cdf = tlv(
        0x30,
        &[
            tlv(0x30, &tlv(0x0C, b"Legitimering")),
            tlv(0x30, &tlv(0x04, &[0x45])),
            tlv(0xA1, &tlv(0x30, &tlv(0x30, &tlv(0x04, &[0x3F, 0x00, 0x41, 0x01])))),
        ]
        .concat(),
    );

    HashMap::from([
        ([0x50, 0x31], padded(odf, 32)),
        ([0x50, 0x32], padded(cdf, 64)),
        ([0x41, 0x01], padded(certificate, 700)),
    ])
}

#[derive(Debug, Default)]
struct CardLog {
    commands: Vec<Vec<u8>>,
    slot_checks: usize,
}

/// Reader holding a card with a PKCS#15 file system
#[derive(Debug)]
struct ScriptedCard {
    files: HashMap<[u8; 2], Vec<u8>>,
    is_eid: bool,
    slot_statuses: VecDeque<SlotStatus>,
    idle_slot_status: SlotStatus,
    connect_error: Option<SmartcardStatus>,
    read_status: Option<[u8; 2]>,
    fci_length: u8,
    selected: Option<[u8; 2]>,
    log: Arc<Mutex<CardLog>>,
}

impl ScriptedCard {
    fn new(files: HashMap<[u8; 2], Vec<u8>>) -> (Self, Arc<Mutex<CardLog>>) {
        let log = Arc::new(Mutex::new(CardLog::default()));
        let card = Self {
            files,
            is_eid: true,
            slot_statuses: VecDeque::new(),
            idle_slot_status: SlotStatus::Present,
            connect_error: None,
            read_status: None,
            fci_length: 6,
            selected: None,
            log: Arc::clone(&log),
        };
        (card, log)
    }

    fn respond(&mut self, command: &[u8]) -> Vec<u8> {
        match *command {
            [0x00, 0xA4, 0x04, 0x00, _, ref aid @ ..] => {
                if self.is_eid && aid == EID_APPLICATION_ID {
                    vec![0x61, 0x20]
                } else {
                    vec![0x6A, 0x82]
                }
            }
            [0x00, 0xA4, 0x00, 0x00, 0x02, high, low] => {
                if self.files.contains_key(&[high, low]) {
                    self.selected = Some([high, low]);
                    vec![0x61, self.fci_length]
                } else {
                    vec![0x6A, 0x82]
                }
            }
            [0x00, 0xC0, 0x00, 0x00, le] if le == self.fci_length => match self.selected {
                Some([high, low]) => {
                    let length = if le == 0 { 256 } else { usize::from(le) };
                    let mut fci = vec![0x62, 0x04, 0x83, 0x02, high, low];
                    fci.resize(length, 0x00);
                    fci.extend([0x90, 0x00]);
                    fci
                }
                None => vec![0x69, 0x85],
            },
            [0x00, 0xB0, p1, p2, le] => {
                if let Some(status) = self.read_status {
                    return status.to_vec();
                }
                let Some(file) = self.selected.and_then(|id| self.files.get(&id)) else {
                    return vec![0x69, 0x86];
                };
                let offset = usize::from(u16::from_be_bytes([p1, p2]));
                if offset >= file.len() {
                    return vec![0x6B, 0x00];
                }
                let le = if le == 0 { 256 } else { usize::from(le) };
                let end = file.len().min(offset + le);
                [&file[offset..end], &[0x90, 0x00][..]].concat()
            }
            _ => vec![0x6D, 0x00],
        }
    }
}

impl ReaderDriver for ScriptedCard {
    fn open(&mut self) -> Result<(), SmartcardStatus> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SmartcardStatus> {
        self.selected = None;
        Ok(())
    }

    fn slot_status(&mut self) -> SlotStatus {
        self.log.lock().slot_checks += 1;
        self.slot_statuses
            .pop_front()
            .unwrap_or(self.idle_slot_status)
    }

    fn connect(&mut self, _protocol: ProtocolPreference) -> Result<(), SmartcardStatus> {
        self.connect_error.map_or(Ok(()), Err)
    }

    fn do_transmit(
        &mut self,
        command: &[u8],
        response_capacity: usize,
    ) -> Result<Bytes, SmartcardStatus> {
        self.log.lock().commands.push(command.to_vec());
        let response = self.respond(command);
        // A real reader fails when the receive buffer is too small
        if response.len() > response_capacity {
            return Err(SmartcardStatus::Undefined);
        }
        Ok(Bytes::from(response))
    }

    fn is_accessory_connected(&self) -> bool {
        true
    }
}

fn watch_states(manager: &SithsManager) -> Receiver<SithsManagerState> {
    let (sender, receiver) = unbounded();
    manager.subscribe_state(move |state: SithsManagerState| {
        let _ = sender.send(state);
    });
    receiver
}

fn watch_log(manager: &SithsManager) -> Receiver<String> {
    let (sender, receiver) = unbounded();
    manager.subscribe_log(move |line: String| {
        let _ = sender.send(line);
    });
    receiver
}

/// Collect states up to and including the next settled one
fn settle(states: &Receiver<SithsManagerState>) -> Vec<SithsManagerState> {
    let mut seen = Vec::new();
    loop {
        let state = states.recv_timeout(TIMEOUT).expect("no state change");
        let settled = state.is_settled();
        seen.push(state);
        if settled {
            return seen;
        }
    }
}

fn wait_for_line(lines: &Receiver<String>, needle: &str) {
    loop {
        let line = lines.recv_timeout(TIMEOUT).expect("no diagnostic line");
        if line.contains(needle) {
            return;
        }
    }
}

#[test]
fn reads_certificate_from_pkcs15_card() {
    let (card, log) = ScriptedCard::new(pkcs15_files(certificate(0xA0, "9752269999000123")));
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);

    manager.notify(ReaderEvent::AppForeground);
    let seen = settle(&states);

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], SithsManagerState::ReadingFromCard);
    let SithsManagerState::CardInserted(certificates) = &seen[1] else {
        panic!("unexpected state {}", seen[1]);
    };
    assert_eq!(certificates.len(), 1);
    assert_eq!(certificates[0].card_number(), "9752269999000123");
    assert_eq!(certificates[0].serial_string(), "05060708090A0B0C0D0E0F1011121314");
    assert_eq!(manager.state(), seen[1]);

    let log = log.lock();
    let selects: Vec<&[u8]> = log
        .commands
        .iter()
        .filter(|command| command.starts_with(&[0x00, 0xA4, 0x00, 0x00]))
        .map(|command| &command[5..])
        .collect();
    assert_eq!(selects, vec![&[0x50, 0x31][..], &[0x50, 0x32][..], &[0x41, 0x01][..]]);
    assert!(log.commands.contains(&vec![0x00, 0xC0, 0x00, 0x00, 0x06]));
}

#[test]
fn certificate_file_is_read_in_chunks() {
    let (card, log) = ScriptedCard::new(pkcs15_files(certificate(0xA0, "9752269999000123")));
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);

    manager.notify(ReaderEvent::AppForeground);
    settle(&states);

    let log = log.lock();
    let reads: Vec<&Vec<u8>> = log
        .commands
        .iter()
        .skip_while(|command| command.as_slice() != [0x00, 0xA4, 0x00, 0x00, 0x02, 0x41, 0x01])
        .filter(|command| command.starts_with(&[0x00, 0xB0]))
        .collect();
    // The second chunk ends inside the 0xFF padding
    assert_eq!(reads.len(), 2);
    assert_eq!(reads[0].as_slice(), &[0x00, 0xB0, 0x00, 0x00, 0xFF]);
    assert_eq!(reads[1].as_slice(), &[0x00, 0xB0, 0x00, 0xFF, 0xFF]);
}

#[test]
fn full_control_information_is_fetched() {
    let (mut card, log) = ScriptedCard::new(pkcs15_files(certificate(0xA0, "9752269999000123")));
    // 61 00 announces 256 bytes
    card.fci_length = 0;
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);

    manager.notify(ReaderEvent::AppForeground);
    let seen = settle(&states);

    assert!(matches!(seen.last(), Some(SithsManagerState::CardInserted(certificates)) if certificates.len() == 1));
    assert!(log.lock().commands.contains(&vec![0x00, 0xC0, 0x00, 0x00, 0x00]));
}

#[test]
fn deeply_nested_file_is_skipped() {
    let levels = 16_000;
    let mut odf = Vec::with_capacity(levels * 4);
    for level in 0..levels {
        let [high, low] = u16::try_from((levels - 1 - level) * 4).unwrap().to_be_bytes();
        odf.extend([0x30, 0x82, high, low]);
    }
    let (card, _log) = ScriptedCard::new(HashMap::from([([0x50, 0x31], odf)]));
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);

    manager.notify(ReaderEvent::AppForeground);

    assert_eq!(
        settle(&states),
        vec![
            SithsManagerState::ReadingFromCard,
            SithsManagerState::CardWithoutCertificatesInserted
        ]
    );
}

#[test]
fn oversized_file_is_internal_error() {
    let (card, _log) = ScriptedCard::new(HashMap::from([([0x50, 0x31], vec![0x30; 70_000])]));
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);

    manager.notify(ReaderEvent::AppForeground);

    assert_eq!(
        settle(&states).last(),
        Some(&SithsManagerState::Error(SithsManagerError::Internal(
            ProtocolError::FileTooLarge {
                identifier: "5031".into(),
                offset: 65536,
            }
        )))
    );
}

#[test]
fn card_without_authentication_certificate() {
    // Signing certificate: non-repudiation only
    let (card, _log) = ScriptedCard::new(pkcs15_files(certificate(0x40, "9752269999000123")));
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);

    manager.notify(ReaderEvent::AppForeground);

    assert_eq!(
        settle(&states),
        vec![
            SithsManagerState::ReadingFromCard,
            SithsManagerState::CardWithoutCertificatesInserted
        ]
    );
}

#[test]
fn unknown_card() {
    let (mut card, _log) = ScriptedCard::new(HashMap::new());
    card.is_eid = false;
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);

    manager.notify(ReaderEvent::AppForeground);

    assert_eq!(
        settle(&states),
        vec![SithsManagerState::ReadingFromCard, SithsManagerState::UnknownCardInserted]
    );
}

#[test]
fn read_failure_is_internal_error() {
    let (mut card, _log) = ScriptedCard::new(pkcs15_files(certificate(0xA0, "1")));
    card.read_status = Some([0x69, 0x82]);
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);

    manager.notify(ReaderEvent::AppForeground);
    let seen = settle(&states);

    assert!(matches!(
        seen.last(),
        Some(SithsManagerState::Error(SithsManagerError::Internal(_)))
    ));
}

#[test]
fn connect_failure_is_smartcard_error() {
    let (mut card, _log) = ScriptedCard::new(HashMap::new());
    card.connect_error = Some(SmartcardStatus::UnresponsiveCard);
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);

    manager.notify(ReaderEvent::AppForeground);

    assert_eq!(
        settle(&states),
        vec![SithsManagerState::Error(SithsManagerError::Smartcard {
            message: "The smart card is not responding to a reset".into(),
            code: 10,
        })]
    );
}

#[test]
fn transient_slot_status_retries_five_times() {
    let (mut card, log) = ScriptedCard::new(HashMap::new());
    card.idle_slot_status = SlotStatus::Other;
    let config = ManagerConfig::default().with_retry_delay(Duration::from_millis(1));
    let manager = SithsManager::with_config(card, config).unwrap();
    let lines = watch_log(&manager);

    manager.notify(ReaderEvent::AppForeground);
    wait_for_line(&lines, "still unsettled after 5 retries");

    assert_eq!(log.lock().slot_checks, 6);
    assert_eq!(manager.state(), SithsManagerState::Unknown);
}

#[test]
fn errors_are_suppressed_while_backgrounded() {
    let (mut card, _log) = ScriptedCard::new(HashMap::new());
    card.slot_statuses = VecDeque::from([SlotStatus::Other, SlotStatus::Present]);
    card.connect_error = Some(SmartcardStatus::UnpoweredCard);
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);
    let lines = watch_log(&manager);

    manager.notify(ReaderEvent::AppForeground);
    manager.notify(ReaderEvent::AppBackground);
    // The pending retry still runs and fails to connect
    wait_for_line(&lines, "Connect failed");
    manager.notify(ReaderEvent::CardRemoved);

    assert_eq!(settle(&states), vec![SithsManagerState::ReaderConnected]);
}

#[test]
fn consecutive_states_are_never_repeated() {
    let (mut card, _log) = ScriptedCard::new(HashMap::new());
    card.idle_slot_status = SlotStatus::Empty;
    let manager = SithsManager::new(card).unwrap();
    let states = watch_states(&manager);
    let sender = manager.event_sender();

    for event in [
        ReaderEvent::AppForeground,
        ReaderEvent::CardRemoved,
        ReaderEvent::CardInserted,
        ReaderEvent::CardRemoved,
        ReaderEvent::AccessoryDisconnected,
        ReaderEvent::AccessoryDisconnected,
        ReaderEvent::AccessoryConnected,
    ] {
        assert!(sender.send(event));
    }
    drop(manager);

    let seen: Vec<SithsManagerState> = states.try_iter().collect();
    assert_eq!(
        seen,
        vec![
            SithsManagerState::ReaderConnected,
            SithsManagerState::ReaderDisconnected,
            SithsManagerState::ReaderConnected
        ]
    );
    assert!(!sender.send(ReaderEvent::CardInserted));
}
