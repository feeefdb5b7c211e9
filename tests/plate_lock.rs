use hamilton_hhs::transport::MockTransport;
use hamilton_hhs::{ConnectionConfig, HeaterShaker};

fn initialized_controller(mock: &MockTransport) -> HeaterShaker {
    let mut hs = HeaterShaker::with_transport(
        ConnectionConfig::serial("/dev/ttyUSB0", 1),
        Box::new(mock.clone()),
    )
    .unwrap();
    mock.push_reply("T1LIid0001");
    mock.push_reply("T1SIid0002");
    hs.connect().unwrap();
    hs.initialize(None).unwrap();
    hs
}

#[test]
fn locking_twice_is_a_noop_success() {
    let mock = MockTransport::new();
    let mut hs = initialized_controller(&mock);
    mock.push_reply("T1LPid0003");

    hs.lock_plate().unwrap();
    hs.lock_plate().unwrap();

    assert!(hs.state().plate_locked);
    let lp_commands: Vec<_> = mock
        .sent()
        .into_iter()
        .filter(|c| c.contains("LP"))
        .collect();
    assert_eq!(lp_commands, vec!["T1LPid0003lp1".to_string()]);
}

#[test]
fn unlocking_an_unlocked_plate_is_a_noop_success() {
    let mock = MockTransport::new();
    let mut hs = initialized_controller(&mock);

    // Fresh controller, plate never locked: nothing goes on the wire.
    hs.unlock_plate().unwrap();
    assert_eq!(mock.sent().len(), 2);
    assert!(!hs.state().plate_locked);
}

#[test]
fn lock_then_unlock_round_trip() {
    let mock = MockTransport::new();
    let mut hs = initialized_controller(&mock);
    mock.push_reply("T1LPid0003");
    mock.push_reply("T1LPid0004");

    hs.lock_plate().unwrap();
    assert!(hs.state().plate_locked);

    hs.unlock_plate().unwrap();
    assert!(!hs.state().plate_locked);

    let sent = mock.sent();
    assert_eq!(sent[2], "T1LPid0003lp1");
    assert_eq!(sent[3], "T1LPid0004lp0");
}
