//! BDD step definitions for status classification and alert rules

use cucumber::{given, then, when};

use homewatch::classifier::{classify, Classifier, OverflowPolicy, Status, ThresholdProfile};
use homewatch::config::{AlertConfig, ClassifierConfig};
use homewatch::reading::{Reading, ReadingValue};
use homewatch::SensorField;

use crate::world::HomewatchWorld;

pub fn parse_status(s: &str) -> Option<Status> {
    match s {
        "loading" => Some(Status::Loading),
        "safe" => Some(Status::Safe),
        "warning" => Some(Status::Warning),
        "danger" => Some(Status::Danger),
        "none" => None,
        other => panic!("Unknown status: {}", other),
    }
}

fn number(field: SensorField, value: f64) -> Reading {
    Reading::new(field, Some(ReadingValue::Number(value)), 0)
}

#[given(expr = "a threshold profile with safe bound {float} and warning bound {float}")]
fn threshold_profile(world: &mut HomewatchWorld, safe: f64, warning: f64) {
    world.profile = Some(ThresholdProfile::new(safe, warning));
}

#[given("no threshold profile")]
fn no_threshold_profile(world: &mut HomewatchWorld) {
    world.profile = None;
}

#[given(expr = "the overflow policy is {string}")]
fn overflow_policy(world: &mut HomewatchWorld, policy: String) {
    world.overflow = match policy.as_str() {
        "danger" => OverflowPolicy::Danger,
        "warning" => OverflowPolicy::Warning,
        other => panic!("Unknown overflow policy: {}", other),
    };
}

#[when(expr = "the value {float} is classified")]
fn value_classified(world: &mut HomewatchWorld, value: f64) {
    world.classified = Some(classify(Some(value), world.profile.as_ref(), world.overflow));
}

#[when("a missing value is classified")]
fn missing_value_classified(world: &mut HomewatchWorld) {
    world.classified = Some(classify(None, world.profile.as_ref(), world.overflow));
}

#[when(expr = "the distance is {float} cm and the smoke level is {float} percent")]
fn alert_inputs(world: &mut HomewatchWorld, distance: f64, smoke: f64) {
    let classifier = Classifier::new(&ClassifierConfig::default(), &AlertConfig::default());
    world.alerts = Some(classifier.alerts(
        Some(&number(SensorField::Distance, distance)),
        Some(&number(SensorField::SmokeLevel, smoke)),
    ));
}

#[when("neither distance nor smoke level has been reported")]
fn alert_inputs_missing(world: &mut HomewatchWorld) {
    let classifier = Classifier::new(&ClassifierConfig::default(), &AlertConfig::default());
    world.alerts = Some(classifier.alerts(None, None));
}

#[then(expr = "the status should be {string}")]
fn status_should_be(world: &mut HomewatchWorld, expected: String) {
    let classified = world.classified.expect("nothing was classified");
    assert_eq!(classified, parse_status(&expected));
}

#[then(expr = "the proximity alert should be {word}")]
fn proximity_alert_should_be(world: &mut HomewatchWorld, expected: String) {
    let alerts = world.alerts.expect("alerts not evaluated");
    assert_eq!(alerts.proximity, expected == "on");
}

#[then(expr = "the fire alert should be {word}")]
fn fire_alert_should_be(world: &mut HomewatchWorld, expected: String) {
    let alerts = world.alerts.expect("alerts not evaluated");
    assert_eq!(alerts.fire, expected == "on");
}
