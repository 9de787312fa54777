use std::time::Duration;

use flock::injection::schedule;
use flock::prelude::*;

const README_URL: &str =
    "https://raw.githubusercontent.com/steadybit/extension-gatling/refs/heads/main/README.md";

// Build the scenario run by the basic simulation.
fn basic_example() -> ScenarioWithInjection {
    scenario("Basic Example")
        .unwrap()
        .exec(
            http("Get README.md")
                .unwrap()
                .get(README_URL)
                .unwrap()
                .check(status().is(200).unwrap()),
        )
        .inject_open(vec![at_once_users(1).unwrap()])
        .unwrap()
}

fn request(label: &str) -> HttpRequest {
    http(label)
        .unwrap()
        .get(&format!("http://localhost/{}", label))
        .unwrap()
        .into()
}

#[test]
/// A single GET with a status check, injected with one user.
fn minimal_get_with_status_check() {
    let mut registry = Registry::new();
    let handle = registry.set_up(vec![basic_example()]).unwrap();
    assert_eq!(registry.state(), &WorkloadState::Frozen);

    let populations = handle.workload().populations();
    assert_eq!(populations.len(), 1);

    let scn = populations[0].scenario();
    assert_eq!(scn.name(), "Basic Example");
    assert_eq!(scn.actions().len(), 1);

    let Action::HttpRequest(request) = &scn.actions()[0];
    assert_eq!(request.label(), "Get README.md");
    assert_eq!(request.method(), HttpMethod::Get);
    assert_eq!(request.url().as_str(), README_URL);
    assert_eq!(request.checks(), &[Check::StatusIs { expected: 200 }]);

    assert_eq!(
        populations[0].injection(),
        &[InjectionProfile::AtOnce { count: 1 }]
    );
}

#[test]
/// An empty scenario name is rejected.
fn empty_scenario_name() {
    match scenario("") {
        Err(FlockError::InvalidArgument { call, .. }) => assert_eq!(call, "scenario()"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
/// A URL that can not be parsed is rejected.
fn malformed_url() {
    match http("x").unwrap().get("not a url") {
        Err(FlockError::InvalidUrl { call, url, .. }) => {
            assert_eq!(call, "get()");
            assert_eq!(url, "not a url");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
/// Status codes outside 100 to 599 are rejected.
fn out_of_range_status() {
    for code in [0, 99, 600, 999] {
        match status().is(code) {
            Err(FlockError::InvalidArgument { value, .. }) => assert_eq!(value, code.to_string()),
            other => panic!("unexpected result for {}: {:?}", code, other),
        }
    }
    assert!(status().is(100).is_ok());
    assert!(status().is(599).is_ok());
}

#[test]
/// A workload can only be set up one time.
fn double_set_up() {
    let mut registry = Registry::new();
    let first = registry.set_up(vec![basic_example()]).unwrap();

    match registry.set_up(vec![basic_example()]) {
        Err(FlockError::AlreadyConfigured { .. }) => (),
        other => panic!("unexpected result: {:?}", other),
    }

    // The first workload is unaffected.
    assert_eq!(registry.state(), &WorkloadState::Frozen);
    assert_eq!(first.workload().populations().len(), 1);
}

#[test]
/// Actions keep the order they were appended in.
fn exec_ordering() {
    let (a, b, c) = (request("A"), request("B"), request("C"));
    let scn = scenario("o")
        .unwrap()
        .exec(a.clone())
        .exec(b.clone())
        .exec(c.clone())
        .build()
        .unwrap();
    assert_eq!(
        scn.actions(),
        &[Action::from(a), Action::from(b), Action::from(c)]
    );
}

#[test]
/// Checks keep the order they were added in, later checks are appended.
fn check_ordering() {
    let c1 = status().is(200).unwrap();
    let c2 = status().is_not(404).unwrap();
    let c3 = status().is_in(vec![200, 304]).unwrap();

    let request = http("l")
        .unwrap()
        .get("http://localhost/")
        .unwrap()
        .check_all(vec![c1.clone(), c2.clone()]);
    assert_eq!(request.checks(), &[c1.clone(), c2.clone()]);

    let request = request.check(c3.clone());
    assert_eq!(request.checks(), &[c1, c2, c3]);
}

#[test]
/// Independently built descriptions compare equal.
fn referential_transparency() {
    assert_eq!(basic_example(), basic_example());

    let first = Registry::new().set_up(vec![basic_example()]).unwrap();
    let second = Registry::new().set_up(vec![basic_example()]).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
/// A failed set_up has no visible effect on the registry.
fn failed_set_up_has_no_effect() {
    let mut registry = Registry::new();
    registry.register(basic_example()).unwrap();
    assert_eq!(registry.state(), &WorkloadState::Configuring);

    // The duplicate name is rejected, the registered scenario is kept.
    assert!(registry.set_up(vec![basic_example()]).is_err());
    assert_eq!(registry.state(), &WorkloadState::Configuring);

    let handle = registry.set_up(Vec::new()).unwrap();
    assert_eq!(handle.workload().populations(), &[basic_example()]);

    match registry.register(basic_example()) {
        Err(FlockError::Frozen { .. }) => (),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
/// At once users launches exactly n users at time zero, and rejects zero.
fn at_once_users_count() {
    assert!(matches!(
        at_once_users(0),
        Err(FlockError::InvalidArgument { .. })
    ));
    for n in [1, 2, 10] {
        let profile = at_once_users(n).unwrap();
        assert_eq!(schedule(&[profile]), vec![Duration::ZERO; n]);
    }
}

#[test]
/// Workloads implementing Simulation are set up through a registry.
fn simulation() {
    struct BasicSimulation;
    impl Simulation for BasicSimulation {
        fn set_up(&self, registry: &mut Registry) -> Result<WorkloadHandle, FlockError> {
            registry.set_up(vec![basic_example()])
        }
    }

    let mut registry = Registry::new();
    let handle = BasicSimulation.set_up(&mut registry).unwrap();
    assert_eq!(handle.total_users(), 1);
    assert!(BasicSimulation.set_up(&mut registry).is_err());
}
