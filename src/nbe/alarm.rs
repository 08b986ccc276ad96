//! # Alarm Classification
//!
//! Maps the controller's opaque `(state, substate)` pair onto a stable numeric
//! alarm code and a readable text. States that carry no substate detail use the
//! state itself as the code; states with known substates use
//! `state * 100 + substate`, with `state * 100 + 99` for unknown substates.

use crate::error::PbmError;
use serde::Serialize;

/// A classified burner state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alarm {
    pub code: i32,
    pub text: String,
}

impl Alarm {
    fn new(code: i32, text: impl Into<String>) -> Self {
        Alarm {
            code,
            text: text.into(),
        }
    }
}

/// Substate table of a state: known substates, and the code for all others.
struct SubstateTable {
    prefix: &'static str,
    known: &'static [(i32, i32, &'static str)],
    fallback: (i32, &'static str),
}

const IGNITION: SubstateTable = SubstateTable {
    prefix: "Ignite fire: ",
    known: &[
        (1, 201, "Ventilation of boiler"),
        (2, 202, "Feeding pellets"),
        (4, 204, "Electric ignition"),
        (16, 216, "Using internal auger"),
    ],
    fallback: (299, "Unknown action"),
};

const STOPPED: SubstateTable = SubstateTable {
    prefix: "Boiler is stopped: ",
    known: &[
        (0, 900, "Temperature reached"),
        (8, 908, "Ash cleaning"),
        (13, 913, "Compressor cleaning valve 3"),
        (14, 914, "Valve 3 is active"),
    ],
    fallback: (999, "Unknown action"),
};

const SCHEDULED_STOP: SubstateTable = SubstateTable {
    prefix: "Boiler is on. Stopped as per schedule: ",
    known: &[
        (0, 2300, "No issue"),
        (8, 2308, "Unknown (08)"),
        (13, 2313, "Unknown (13)"),
    ],
    fallback: (2399, "Unknown action"),
};

impl SubstateTable {
    fn classify(&self, substate: i32) -> Alarm {
        let (code, text) = self
            .known
            .iter()
            .find(|(known, _, _)| *known == substate)
            .map(|(_, code, text)| (*code, *text))
            .unwrap_or(self.fallback);
        Alarm::new(code, format!("{}{}", self.prefix, text))
    }
}

/// Classifies a numeric `(state, substate)` pair.
pub fn classify(state: i32, substate: i32) -> Alarm {
    match state {
        0 => Alarm::new(state, "Please wait"),
        2 => IGNITION.classify(substate),
        5 => Alarm::new(state, "Boiler is on. No issues"),
        9 => STOPPED.classify(substate),
        11 => Alarm::new(
            state,
            "Boiler is too hot. Do not restart without fixing the cause!",
        ),
        13 => Alarm::new(state, "Error igniting!"),
        14 => Alarm::new(state, "Boiler is manually turned off"),
        20 => Alarm::new(state, "Boiler failed to ignite fire. Missing pellets?"),
        23 => SCHEDULED_STOP.classify(substate),
        _ => Alarm::new(
            state,
            format!("Unknown state {state} and substate {substate}"),
        ),
    }
}

/// Classifies the textual state fields as reported in operating data.
pub fn classify_text(state: &str, substate: &str) -> Result<Alarm, PbmError> {
    let parse = |s: &str| s.trim().parse::<i32>().ok();
    match (parse(state), parse(substate)) {
        (Some(state), Some(substate)) => Ok(classify(state, substate)),
        _ => Err(PbmError::UnknownBurnerState {
            state: state.to_string(),
            substate: substate.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignition_substates() {
        assert_eq!(
            classify(2, 4),
            Alarm::new(204, "Ignite fire: Electric ignition")
        );
        assert_eq!(classify(2, 1).code, 201);
        assert_eq!(classify(2, 2).code, 202);
        assert_eq!(classify(2, 16).text, "Ignite fire: Using internal auger");
        assert_eq!(classify(2, 7), Alarm::new(299, "Ignite fire: Unknown action"));
    }

    #[test]
    fn test_stopped_substates() {
        assert_eq!(
            classify(9, 0),
            Alarm::new(900, "Boiler is stopped: Temperature reached")
        );
        assert_eq!(classify(9, 8).code, 908);
        assert_eq!(classify(9, 13).code, 913);
        assert_eq!(classify(9, 14).code, 914);
        assert_eq!(classify(9, 3).code, 999);
    }

    #[test]
    fn test_scheduled_stop_substates() {
        assert_eq!(classify(23, 0).code, 2300);
        assert_eq!(classify(23, 8).code, 2308);
        assert_eq!(classify(23, 13).code, 2313);
        assert_eq!(classify(23, 1).code, 2399);
    }

    #[test]
    fn test_states_without_substates() {
        assert_eq!(classify(0, 3), Alarm::new(0, "Please wait"));
        assert_eq!(classify(5, 0), Alarm::new(5, "Boiler is on. No issues"));
        assert_eq!(classify(11, 0).code, 11);
        assert!(classify(11, 0).text.starts_with("Boiler is too hot"));
        assert_eq!(classify(13, 0), Alarm::new(13, "Error igniting!"));
        assert_eq!(classify(14, 0), Alarm::new(14, "Boiler is manually turned off"));
        assert_eq!(classify(20, 0).code, 20);
    }

    #[test]
    fn test_unmapped_state() {
        assert_eq!(
            classify(99, 0),
            Alarm::new(99, "Unknown state 99 and substate 0")
        );
    }

    #[test]
    fn test_classify_text() {
        assert_eq!(classify_text("9", "14").unwrap().code, 914);
        let err = classify_text("x", "y").unwrap_err();
        assert_eq!(
            err,
            PbmError::UnknownBurnerState {
                state: "x".into(),
                substate: "y".into()
            }
        );
        assert!(classify_text("", "0").is_err());
    }
}
