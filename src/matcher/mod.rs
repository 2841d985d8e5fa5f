pub mod engine;
pub mod tap;

pub use engine::{
    ELEMENT_ID_KEYS, MatchError, MatchHit, MatchResult, extract_element_id, locate_and_tap, locate_only,
};
pub use tap::{TapPoint, TouchGesture, tap_point};
