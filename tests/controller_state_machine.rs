use hamilton_hhs::transport::MockTransport;
use hamilton_hhs::{ConnectionConfig, HeaterShaker, HhsError};

fn controller(mock: &MockTransport) -> HeaterShaker {
    HeaterShaker::with_transport(
        ConnectionConfig::serial("/dev/ttyUSB0", 1),
        Box::new(mock.clone()),
    )
    .unwrap()
}

#[test]
fn operations_require_connection() {
    let mock = MockTransport::new();
    let mut hs = controller(&mock);

    assert!(matches!(hs.initialize(None), Err(HhsError::State(_))));
    assert!(matches!(hs.set_temperature(37.0), Err(HhsError::State(_))));
    assert!(mock.sent().is_empty());
}

#[test]
fn set_temperature_requires_initialize() {
    let mock = MockTransport::new();
    let mut hs = controller(&mock);
    hs.connect().unwrap();

    let err = hs.set_temperature(37.0).unwrap_err();
    assert!(matches!(err, HhsError::State(_)));
    assert!(mock.sent().is_empty(), "no command before initialize");
}

#[test]
fn shaking_and_lock_require_initialize() {
    let mock = MockTransport::new();
    let mut hs = controller(&mock);
    hs.connect().unwrap();

    assert!(matches!(hs.start_shaking(800), Err(HhsError::State(_))));
    assert!(matches!(hs.stop_shaking(), Err(HhsError::State(_))));
    assert!(matches!(hs.lock_plate(), Err(HhsError::State(_))));
    assert!(matches!(hs.get_temperature(), Err(HhsError::State(_))));
    assert!(matches!(
        hs.wait_for_temperature(37.0, 1.0, std::time::Duration::ZERO),
        Err(HhsError::State(_))
    ));
    assert!(mock.sent().is_empty());
}

#[test]
fn initialize_twice_is_rejected() {
    let mock = MockTransport::new();
    let mut hs = controller(&mock);
    mock.push_reply("T1LIid0001");
    mock.push_reply("T1SIid0002");

    hs.connect().unwrap();
    hs.initialize(None).unwrap();

    let err = hs.initialize(None).unwrap_err();
    assert!(matches!(err, HhsError::State(_)));
    assert_eq!(mock.sent().len(), 2, "second initialize must not re-send");
}

#[test]
fn failed_initialize_step_leaves_controller_connected() {
    let mock = MockTransport::new();
    let mut hs = controller(&mock);
    mock.push_reply("T1LIid0001");
    mock.push_timeout(); // SI never answered

    hs.connect().unwrap();
    let err = hs.initialize(Some(25.0)).unwrap_err();
    match &err {
        HhsError::InitializationStep { step, .. } => {
            assert_eq!(*step, "shaker initialization");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_timeout());
    assert!(hs.state().connected);
    assert!(!hs.state().initialized);

    // The controller stays Connected, so initialization can be retried.
    mock.push_reply("T1LIid0003");
    mock.push_reply("T1SIid0004");
    mock.push_reply("T1TAid0005");
    hs.initialize(Some(25.0)).unwrap();
    assert!(hs.state().initialized);
}

#[test]
fn initialize_validates_target_before_any_io() {
    let mock = MockTransport::new();
    let mut hs = controller(&mock);
    hs.connect().unwrap();

    let err = hs.initialize(Some(130.0)).unwrap_err();
    assert!(matches!(err, HhsError::Validation(_)));
    assert!(mock.sent().is_empty());
    assert!(!hs.state().initialized);
}

#[test]
fn initialized_implies_both_subsystems() {
    let mock = MockTransport::new();
    let mut hs = controller(&mock);
    mock.push_reply("T1LIid0001");
    mock.push_reply("T1SIid0002");

    hs.connect().unwrap();
    hs.initialize(None).unwrap();

    let state = hs.state();
    assert!(state.initialized);
    assert!(state.lock_initialized);
    assert!(state.shaker_initialized);
}
