//! Scope classification.
//!
//! Presence, not value, of the scope keys decides the branch. The order is
//! fixed: keys commonly co-occur (`iso` travels with `id1`), so the first
//! matching rule wins and the narrower subdivision scope takes precedence
//! over the country scope.

use crate::model::{RequestParams, Scope};

/// Returns the single scope a parameter set targets. Never fails; a set
/// with none of the scope keys targets the whole world.
pub fn classify(params: &RequestParams) -> Scope {
    if params.contains("iso") && !params.contains("id1") {
        Scope::Iso
    } else if params.contains("iso") && params.contains("id1") {
        Scope::Id1
    } else if params.contains("ifl") {
        Scope::Ifl
    } else if params.contains("ifl_id1") {
        Scope::IflId1
    } else if params.contains("use") {
        Scope::Use
    } else if params.contains("pa") {
        Scope::Pa
    } else if params.contains("wdpaid") {
        Scope::Wdpa
    } else {
        Scope::World
    }
}
